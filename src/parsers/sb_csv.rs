//! SplitsBrowser's own comma-separated format: one section per class,
//! separated by blank lines. Each section starts with `name,controlCount`
//! followed by rows of `forename,surname,club,start,split...`.

use crate::competitor::{Competitor, CompetitorName};
use crate::course::Course;
use crate::course_class::CourseClass;
use crate::error::{Result, ResultsError};
use crate::parsers::{normalise_line_endings, push_warning};
use crate::results::Results;
use crate::time::Time;
use csv::{ReaderBuilder, StringRecord};

pub fn parse(text: &str) -> Result<Results> {
    if text.to_ascii_lowercase().contains("<html") {
        return Err(ResultsError::wrong_format(
            "Cannot parse this file as CSV as it appears to be HTML",
        ));
    }

    let text = strip_trailing_commas(&normalise_line_endings(text));
    let mut warnings = Vec::new();
    let mut classes = Vec::new();

    for section in text.split("\n\n").map(str::trim).filter(|s| !s.is_empty()) {
        if let Some(class) = parse_class_section(section, &mut warnings)? {
            if !class.is_empty() {
                classes.push(class);
            }
        }
    }

    if classes.is_empty() {
        return Err(ResultsError::invalid("No competitor data was found"));
    }

    // No course details exist in this format, so every class runs its own course
    let courses = classes
        .iter()
        .enumerate()
        .map(|(index, class)| Course::new(class.name.clone(), vec![index], None, None, None))
        .collect();

    Ok(Results::new(classes, courses, warnings))
}

fn strip_trailing_commas(text: &str) -> String {
    text.split('\n')
        .map(|line| line.trim_end_matches(','))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Returns `None` for a section with a negative control count and no
/// competitors, which some exports append as a terminator
fn parse_class_section(section: &str, warnings: &mut Vec<String>) -> Result<Option<CourseClass>> {
    let mut lines = section.lines().filter(|line| !line.trim().is_empty());
    let header = lines.next().unwrap_or_default();
    let header_parts: Vec<&str> = header.split(',').collect();
    if header_parts.len() != 2 {
        return Err(ResultsError::wrong_format(format!(
            "Expected first line to have two parts (class name and number of controls), got {} part(s) instead",
            header_parts.len()
        )));
    }

    let class_name = header_parts[0];
    let control_count: i64 = header_parts[1].trim().parse().map_err(|_| {
        ResultsError::invalid(format!("Could not read control count: '{}'", header_parts[1]))
    })?;

    let rows = read_rows(&lines.collect::<Vec<_>>().join("\n"))?;
    if control_count < 0 {
        if rows.is_empty() {
            return Ok(None);
        }
        return Err(ResultsError::invalid(format!(
            "Expected a non-negative control count, got {} instead",
            control_count
        )));
    }

    let num_controls = control_count as usize;
    let mut competitors: Vec<Competitor> = rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| parse_competitor(index, row, num_controls, class_name, warnings))
        .collect();
    competitors.sort_by(Competitor::compare);

    CourseClass::new(class_name, num_controls, competitors).map(Some)
}

/// Rows vary in length and are never quoted
fn read_rows(body: &str) -> Result<Vec<StringRecord>> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(body.as_bytes())
        .records()
        .map(|record| record.map_err(|err| ResultsError::invalid(format!("Could not read CSV data: {}", err))))
        .collect()
}

fn parse_competitor(
    index: usize,
    row: &StringRecord,
    num_controls: usize,
    class_name: &str,
    warnings: &mut Vec<String>,
) -> Option<Competitor> {
    let expected_parts = num_controls + 5;
    let mut parts: Vec<String> = row.iter().map(str::to_string).collect();

    // Extra cells where a start time should be are a club name containing commas
    while parts.len() > expected_parts && !looks_like_time(&parts[3]) {
        let extra = parts.remove(3);
        parts[2] = format!("{},{}", parts[2], extra);
    }

    let forename = parts.first().map(String::as_str).unwrap_or_default();
    let surname = parts.get(1).map(String::as_str).unwrap_or_default();
    let full_name = format!("{} {}", forename, surname).trim().to_string();

    if parts.len() != expected_parts {
        let name = if full_name.is_empty() { "<name unknown>" } else { &full_name };
        let difference = if parts.len() < expected_parts {
            format!("{} too few", expected_parts - parts.len())
        } else {
            format!("{} too many", parts.len() - expected_parts)
        };
        push_warning(
            warnings,
            format!(
                "Competitor '{}' appears to have the wrong number of split times - {} (row {} of class '{}')",
                name,
                difference,
                index + 1,
                class_name
            ),
        );
        return None;
    }

    let name = if full_name.is_empty() {
        CompetitorName::new("", "<name unknown>")
    } else {
        CompetitorName::new(forename, surname)
    };

    let start_text = parts[3].trim();
    let start_time = match Time::parse(start_text) {
        Some(Time::ZERO) | None => None,
        Some(start) if is_clock_time_with_seconds(start_text) => Some(start),
        // Given as hours and minutes
        Some(start) => Some(start.scale(60.0)),
    };

    let mut cum_times = vec![Some(Time::ZERO)];
    let mut running = Time::ZERO;
    for part in &parts[4..] {
        match Time::parse(part).filter(|split| split.is_positive()) {
            Some(split) => {
                running += split;
                cum_times.push(Some(running));
            }
            None => cum_times.push(None),
        }
    }

    let mut competitor = Competitor::from_original_cum_times(index + 1, name, parts[2].as_str(), start_time, cum_times);
    if running == Time::ZERO {
        competitor.set_non_starter();
    }
    Some(competitor)
}

fn looks_like_time(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | ':' | '-'))
}

fn is_clock_time_with_seconds(text: &str) -> bool {
    let parts: Vec<&str> = text.split(':').collect();
    parts.len() == 3
        && parts.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
        && parts[1].len() == 2
        && parts[2].len() == 2
}
