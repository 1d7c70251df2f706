//! Readers for the supported results file formats.
//!
//! Every reader takes the whole file as text and either returns the parsed
//! [`Results`] or fails with [`ResultsError::WrongFileFormat`] when the text
//! is not its format, so that [`parse_results`] can move on to the next one.

pub mod html;
pub mod iof_xml;
pub mod oe_csv;
pub mod sb_csv;
pub mod triple_csv;

use tracing::{debug, info, warn};

use crate::error::{Result, ResultsError};
use crate::results::Results;

pub type ParseFn = fn(&str) -> Result<Results>;

/// Readers in the order they are tried, most specific first
pub const PARSERS: &[(&str, ParseFn)] = &[
    ("SplitsBrowser CSV", sb_csv::parse),
    ("OE CSV", oe_csv::parse),
    ("HTML", html::parse),
    ("triple-column CSV", triple_csv::parse),
    ("IOF XML", iof_xml::parse),
];

/// Parses results in any supported format.
///
/// The first reader that recognises the text decides the outcome, including
/// any `InvalidData` failure it reports.
pub fn parse_results(text: &str) -> Result<Results> {
    let mut rejections = Vec::new();

    for (name, parse) in PARSERS {
        debug!("Trying {} reader", name);
        match parse(text) {
            Ok(results) => {
                info!(
                    "Read {} file: {} class(es), {} course(s), {} competitor(s), {} warning(s)",
                    name,
                    results.classes.len(),
                    results.courses.len(),
                    results.competitor_count(),
                    results.warnings.len()
                );
                return Ok(results);
            }
            Err(err) if err.is_wrong_format() => {
                debug!("{} reader rejected the file: {}", name, err.message());
                rejections.push(format!("{}: {}", name, err.message()));
            }
            Err(err) => return Err(err),
        }
    }

    Err(ResultsError::invalid(format!(
        "Could not find a reader for this file. {}",
        rejections.join("; ")
    )))
}

// ============================================================================
// HELPERS
// ============================================================================

/// Records a per-row problem that does not stop the file loading
pub(crate) fn push_warning(warnings: &mut Vec<String>, message: String) {
    warn!("{}", message);
    warnings.push(message);
}

pub(crate) fn normalise_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Reads a course length in kilometres. Values of 500 or more are taken to
/// be metres.
pub fn parse_course_length(text: &str) -> Option<f64> {
    let text = text.trim().replace(',', ".");
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map_or(text.len(), |(i, _)| i);
    let length: f64 = text[..end].parse().ok()?;
    if !length.is_finite() {
        return None;
    }
    Some(if length >= 500.0 { length / 1000.0 } else { length })
}

/// Reads a course climb in metres from the leading digits of the text
pub fn parse_course_climb(text: &str) -> Option<u32> {
    leading_integer(text).and_then(|climb| u32::try_from(climb).ok())
}

/// The integer at the start of the text, ignoring anything after it
pub(crate) fn leading_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    let digits_start = usize::from(text.starts_with('-') || text.starts_with('+'));
    let end = text[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(text.len(), |pos| pos + digits_start);
    if end == digits_start {
        return None;
    }
    text[..end].parse().ok()
}

/// Whether the text is usable as a control code (letters and digits only)
pub(crate) fn is_control_code(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Drops empty cells from the end of a row
pub(crate) fn trim_trailing_empty<S: AsRef<str>>(cells: &mut Vec<S>) {
    while cells.last().map_or(false, |cell| cell.as_ref().trim().is_empty()) {
        cells.pop();
    }
}
