//! HTML results pages with cumulative and split times in pairs of rows.
//!
//! Three layouts are read. The preformatted layout is a `<pre>` block where
//! each line is a row and the columns before the times are `<font>`
//! elements. The single-table layout has one header table then one table
//! holding every course, with a rank cell after each time. The multi-table
//! layout has a few header tables then three tables per course (course
//! header, column headings, results).

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};

use crate::competitor::{Competitor, CompetitorName};
use crate::course::Course;
use crate::course_class::CourseClass;
use crate::error::{Result, ResultsError};
use crate::parsers::parse_course_length;
use crate::results::Results;
use crate::time::Time;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Lines of a `<pre>` block; `preceding` font columns come before the
    /// times, fixed by the first competitor read
    Preformatted { preceding: Option<usize> },
    /// Exactly two tables; `uses_classes` when a class column is present
    SingleTable { uses_classes: bool },
    /// Five or more tables; times start after `times_offset` leading cells
    MultiTable { times_offset: usize },
}

/// The text content of one table row
#[derive(Debug, Clone, Default)]
struct Row {
    cells: Vec<String>,
    headings: Vec<String>,
    is_club_name_row: bool,
    has_header_cell: bool,
    /// The raw line, for preformatted rows
    source: String,
}

impl Row {
    fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map_or("", String::as_str)
    }

    fn non_empty_cells(&self) -> Vec<&str> {
        self.cells.iter().map(String::as_str).filter(|cell| !cell.is_empty()).collect()
    }

    /// Spacer rows hold at most one blank cell
    fn is_spacer(&self) -> bool {
        self.headings.is_empty() && self.cells.len() <= 1 && self.cells.iter().all(String::is_empty)
    }
}

/// A competitor read from a pair of rows, before the course is complete
#[derive(Debug, Clone)]
struct CompetitorRecord {
    name: String,
    club: String,
    class_name: Option<String>,
    total_time: String,
    cum_times: Vec<Option<Time>>,
    competitive: bool,
}

impl CompetitorRecord {
    /// Rows that carry on the times of the competitor above them
    fn is_continuation(&self) -> bool {
        self.name.is_empty()
            && self.club.is_empty()
            && self.class_name.is_none()
            && self.total_time.is_empty()
            && !self.competitive
    }

    fn into_competitor(self, order: usize) -> Competitor {
        let mut cum_times = Vec::with_capacity(self.cum_times.len() + 1);
        cum_times.push(Some(Time::ZERO));
        cum_times.extend(self.cum_times);

        let mut competitor =
            Competitor::from_original_cum_times(order, CompetitorName::from_full_name(&self.name), self.club, None, cum_times);
        if competitor.completed() && !self.competitive {
            competitor.set_non_competitive();
        }
        if !competitor.has_any_times() {
            competitor.set_non_starter();
        }
        competitor
    }
}

#[derive(Debug, Clone)]
struct CourseRecord {
    name: String,
    length: Option<f64>,
    climb: Option<u32>,
    /// Control codes with `None` for the finish, which comes last
    controls: Vec<Option<String>>,
    competitors: Vec<CompetitorRecord>,
}

impl CourseRecord {
    fn new(name: String, length: Option<f64>, climb: Option<u32>) -> Self {
        CourseRecord {
            name,
            length,
            climb,
            controls: Vec::new(),
            competitors: Vec::new(),
        }
    }

    fn has_all_controls(&self) -> bool {
        matches!(self.controls.last(), Some(None))
    }

    fn add_competitor(&mut self, mut competitor: CompetitorRecord) -> Result<()> {
        // Mispunchers sometimes have no finish cell at all
        if !competitor.competitive && competitor.cum_times.len() + 1 == self.controls.len() {
            competitor.cum_times.push(None);
        }
        if Time::parse(&competitor.total_time).is_none() && competitor.cum_times.is_empty() {
            competitor.cum_times.resize(self.controls.len(), None);
        }

        if competitor.cum_times.len() != self.controls.len() {
            return Err(ResultsError::invalid(format!(
                "Competitor '{}' should have {} cumulative times, but has {} times",
                competitor.name,
                self.controls.len(),
                competitor.cum_times.len()
            )));
        }
        self.competitors.push(competitor);
        Ok(())
    }
}

// ============================================================================
// PARSING
// ============================================================================

pub fn parse(text: &str) -> Result<Results> {
    if text.contains("<pre>") && text.contains("<font") {
        return parse_preformatted(text);
    }

    let document = Html::parse_document(text);
    let table_selector = Selector::parse("table").unwrap();
    let row_selector = Selector::parse("tr").unwrap();

    let tables: Vec<ElementRef> = document.select(&table_selector).collect();
    let layout = match tables.len() {
        2 => {
            let wide_selector = Selector::parse(r#"td[colspan="25"]"#).unwrap();
            Layout::SingleTable {
                uses_classes: document.select(&wide_selector).next().is_some(),
            }
        }
        count if count >= 5 => Layout::MultiTable { times_offset: 0 },
        _ => {
            return Err(ResultsError::wrong_format(
                "No HTML recognizers recognised this as HTML they could parse",
            ))
        }
    };

    // The first table holds event details only
    let rows: Vec<Row> = tables
        .iter()
        .skip(1)
        .flat_map(|table| table.select(&row_selector))
        .map(read_row)
        .filter(|row| !row.is_spacer())
        .collect();

    HtmlReader::new(layout).read(&rows)
}

fn parse_preformatted(text: &str) -> Result<Results> {
    let rows: Vec<Row> = preformatted_body(text)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(read_preformatted_row)
        .collect();
    HtmlReader::new(Layout::Preformatted { preceding: None }).read(&rows)
}

/// The lines after the one holding `<pre>`, up to the line before the last
/// `</pre>`
fn preformatted_body(text: &str) -> Result<&str> {
    let open = text
        .find("<pre>")
        .ok_or_else(|| ResultsError::wrong_format("Cannot find opening <pre> tag"))?;
    let after = match text[open..].find('\n') {
        Some(end) => &text[open + end + 1..],
        None => &text[open + "<pre>".len()..],
    };
    let close = after
        .rfind("</pre>")
        .ok_or_else(|| ResultsError::invalid("Found opening <pre> but no closing </pre>"))?;
    let end = after[..close].rfind('\n').unwrap_or(0);
    Ok(after[..end].trim())
}

fn read_preformatted_row(line: &str) -> Row {
    let font_selector = Selector::parse("font").unwrap();
    let fragment = Html::parse_fragment(line);
    Row {
        cells: fragment.select(&font_selector).map(cell_text).collect(),
        source: line.to_string(),
        ..Row::default()
    }
}

/// What follows the first `count` font elements of a line, as plain text
fn text_after_fonts(line: &str, count: usize) -> String {
    let mut rest = line;
    for _ in 0..count {
        match rest.find("</font>") {
            Some(pos) => rest = &rest[pos + "</font>".len()..],
            None => break,
        }
    }
    Html::parse_fragment(rest).root_element().text().collect::<String>().replace('\u{a0}', " ")
}

/// The text of a line with its font elements cut out
fn without_fonts(line: &str) -> String {
    let mut kept = String::new();
    let mut rest = line;
    while let Some(open) = rest.find("<font") {
        kept.push_str(&rest[..open]);
        match rest[open..].find("</font>") {
            Some(close) => rest = &rest[open + close + "</font>".len()..],
            None => {
                rest = &rest[open..];
                break;
            }
        }
    }
    kept.push_str(rest);
    kept
}

fn read_row(row: ElementRef) -> Row {
    let cell_selector = Selector::parse("td").unwrap();
    let heading_selector = Selector::parse("th").unwrap();

    let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
    Row {
        has_header_cell: cells.iter().any(|cell| cell.value().id() == Some("header")),
        cells: cells.iter().map(|cell| cell_text(*cell)).collect(),
        headings: row.select(&heading_selector).map(cell_text).collect(),
        is_club_name_row: row.value().classes().any(|class| class == "clubName"),
        source: String::new(),
    }
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().replace('\u{a0}', " ").trim().to_string()
}

struct HtmlReader {
    layout: Layout,
    courses: Vec<CourseRecord>,
    current_course: Option<CourseRecord>,
    current_competitor: Option<CompetitorRecord>,
}

impl HtmlReader {
    fn new(layout: Layout) -> Self {
        HtmlReader {
            layout,
            courses: Vec::new(),
            current_course: None,
            current_competitor: None,
        }
    }

    fn read(mut self, rows: &[Row]) -> Result<Results> {
        let mut rows = rows.iter();
        while let Some(row) = rows.next() {
            if !row.headings.is_empty() {
                if let Layout::MultiTable { .. } = self.layout {
                    let times_offset = row.headings.iter().filter(|heading| !heading.is_empty()).count();
                    self.layout = Layout::MultiTable { times_offset };
                }
                continue;
            }

            if self.is_course_header(row) {
                self.finish_course()?;
                self.current_course = Some(self.read_course_header(row)?);
                continue;
            }

            let Some(has_all_controls) = self.current_course.as_ref().map(CourseRecord::has_all_controls) else {
                continue;
            };

            if has_all_controls {
                let second = rows.next().ok_or_else(|| {
                    ResultsError::invalid(format!(
                        "Hit end of input data unexpectedly while parsing competitor: first row was '{}'",
                        row.cells.join(" ")
                    ))
                })?;
                self.read_competitor_rows(row, second)?;
            } else {
                let controls = self.read_controls(row)?;
                if let Some(course) = self.current_course.as_mut() {
                    course.controls.extend(controls);
                }
            }
        }

        self.finish_course()?;
        if self.courses.is_empty() {
            return Err(ResultsError::invalid("No competitor data was found"));
        }
        build_results(self.courses)
    }

    fn is_course_header(&self, row: &Row) -> bool {
        match self.layout {
            Layout::Preformatted { .. } => row.cells.len() == 2,
            Layout::SingleTable { .. } => row.is_club_name_row,
            Layout::MultiTable { .. } => row.has_header_cell,
        }
    }

    fn finish_competitor(&mut self) -> Result<()> {
        if let Some(competitor) = self.current_competitor.take() {
            if let Some(course) = self.current_course.as_mut() {
                course.add_competitor(competitor)?;
            }
        }
        Ok(())
    }

    fn finish_course(&mut self) -> Result<()> {
        self.finish_competitor()?;
        if let Some(course) = self.current_course.take() {
            self.courses.push(course);
        }
        Ok(())
    }

    fn read_course_header(&self, row: &Row) -> Result<CourseRecord> {
        let bits = row.non_empty_cells();
        let first = bits
            .first()
            .ok_or_else(|| ResultsError::invalid("No parts found in course header line"))?;

        match self.layout {
            Layout::Preformatted { .. } => {
                let name = row.cell(0).split('(').next().unwrap_or_default().trim().to_string();
                Ok(CourseRecord::new(name, find_distance(row.cell(1)), find_climb(row.cell(1))))
            }
            Layout::SingleTable { .. } => Ok(match split_course_details(first) {
                Some((name, length, climb)) => CourseRecord::new(name, Some(length), Some(climb)),
                None => CourseRecord::new(first.trim().to_string(), None, None),
            }),
            Layout::MultiTable { .. } => {
                let name = first.split('(').next().unwrap_or_default().trim().to_string();
                let length = bits[1..].iter().find_map(|bit| find_distance(bit));
                let climb = bits[1..].iter().find_map(|bit| find_climb(bit));
                Ok(CourseRecord::new(name, length, climb))
            }
        }
    }

    /// Control codes read from a row, with `None` for the finish
    fn read_controls(&self, row: &Row) -> Result<Vec<Option<String>>> {
        match self.layout {
            // The labels follow the last font element
            Layout::Preformatted { .. } => {
                let labels_text = row
                    .source
                    .rfind("</font>")
                    .map_or(row.source.as_str(), |pos| &row.source[pos + "</font>".len()..]);
                read_bracketed_controls(&labels_text.split_whitespace().collect::<Vec<_>>())
            }
            // Labels such as "3-152"; the finish has no dash
            Layout::SingleTable { .. } => Ok(row
                .non_empty_cells()
                .iter()
                .map(|label| label.split_once('-').map(|(_, code)| code.to_string()))
                .collect()),
            Layout::MultiTable { .. } => read_bracketed_controls(&row.non_empty_cells()),
        }
    }

    fn read_competitor_rows(&mut self, first: &Row, second: &Row) -> Result<()> {
        let record = match self.layout {
            Layout::Preformatted { preceding } => {
                let preceding = preceding.unwrap_or_else(|| preceding_columns(first));
                self.layout = Layout::Preformatted {
                    preceding: Some(preceding),
                };
                read_preformatted_competitor(first, second, preceding)
            }
            Layout::SingleTable { uses_classes } => read_single_table_competitor(first, second, uses_classes)?,
            Layout::MultiTable { times_offset } => read_multi_table_competitor(first, second, times_offset)?,
        };

        if record.is_continuation() {
            match self.current_competitor.as_mut() {
                Some(current) => current.cum_times.extend(record.cum_times),
                None => return Err(ResultsError::invalid("First row of competitor data has no name nor time")),
            }
        } else {
            self.finish_competitor()?;
            self.current_competitor = Some(record);
        }
        Ok(())
    }
}

/// Labels such as "3(152)"; the finish, last, has no brackets
fn read_bracketed_controls(labels: &[&str]) -> Result<Vec<Option<String>>> {
    labels
        .iter()
        .enumerate()
        .map(|(index, label)| match label.find('(').filter(|_| label.ends_with(')')) {
            Some(open) => Ok(Some(label[open + 1..label.len() - 1].trim().to_string())),
            None if index + 1 == labels.len() => Ok(None),
            None => Err(ResultsError::invalid(format!(
                "Unrecognised control header label: '{}'",
                label
            ))),
        })
        .collect()
}

/// Reads "Name (4500m, 150m)"
fn split_course_details(text: &str) -> Option<(String, f64, u32)> {
    let inner = text.strip_suffix(")")?;
    let open = inner.rfind('(')?;
    let name = inner[..open].trim_end();
    if name.len() == inner[..open].len() || name.is_empty() {
        return None;
    }
    let (length, climb) = inner[open + 1..].split_once(',')?;
    let length: u32 = length.trim().strip_suffix('m')?.parse().ok()?;
    let climb: u32 = climb.trim().strip_suffix('m')?.parse().ok()?;
    Some((name.to_string(), f64::from(length) / 1000.0, climb))
}

/// Finds "4.5 km" (or "Km") in text
fn find_distance(text: &str) -> Option<f64> {
    let unit = text.find("km").or_else(|| text.find("Km"))?;
    let before = text[..unit].trim_end();
    let start = before
        .rfind(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .map_or(0, |pos| pos + 1);
    if start == before.len() {
        return None;
    }
    parse_course_length(&before[start..])
}

/// Finds the first number followed by a climb unit: m, hm, Hm or Cm
fn find_climb(text: &str) -> Option<u32> {
    let mut rest = text;
    while let Some(start) = rest.find(|c: char| c.is_ascii_digit()) {
        let digits_end = rest[start..]
            .find(|c: char| !c.is_ascii_digit())
            .map_or(rest.len(), |pos| start + pos);
        let after = rest[digits_end..].trim_start();
        if ["Cm", "Hm", "hm", "m"].iter().any(|unit| after.starts_with(unit)) {
            return rest[start..digits_end].parse().ok();
        }
        rest = &rest[digits_end..];
    }
    None
}

fn has_number(text: &str) -> bool {
    text.trim().parse::<f64>().map_or(false, f64::is_finite)
}

/// Drops "extra" controls punched beyond the course, shown last with a
/// split starting with an asterisk
fn remove_extra_controls(cum_times: &mut Vec<Option<Time>>, splits: &mut Vec<String>) {
    while splits.last().map_or(false, |split| split.starts_with('*')) {
        splits.pop();
        cum_times.pop();
    }
}

fn trimmed_end(cells: &[String]) -> usize {
    cells.iter().rposition(|cell| !cell.is_empty()).map_or(0, |pos| pos + 1)
}

fn read_single_table_competitor(first: &Row, second: &Row, uses_classes: bool) -> Result<CompetitorRecord> {
    let times_start = if uses_classes { 5 } else { 4 };
    let name = first.cell(2).to_string();
    let class_name = (uses_classes && !name.is_empty()).then(|| first.cell(3).to_string());

    // A punch with no split shown still counts as a time
    let mut second_cells = second.cells.clone();
    for index in (times_start..first.cells.len().min(second_cells.len())).step_by(2) {
        if !first.cells[index].is_empty() && second_cells[index].is_empty() {
            second_cells[index] = "----".to_string();
        }
    }

    // Alternate cells hold ranks
    let times = |cells: &[String]| -> Vec<String> {
        let end = trimmed_end(cells);
        (times_start..end)
            .step_by(2)
            .map(|index| cells[index].clone())
            .filter(|cell| !cell.is_empty())
            .collect()
    };

    let mut cum_times: Vec<Option<Time>> = times(&first.cells).iter().map(|cell| Time::parse(cell)).collect();
    let mut splits = times(&second_cells);
    remove_extra_controls(&mut cum_times, &mut splits);

    if cum_times.len() != splits.len() {
        return Err(ResultsError::invalid(format!(
            "Cumulative and split times do not have the same length: {} cumulative times, {} split times",
            cum_times.len(),
            splits.len()
        )));
    }

    Ok(CompetitorRecord {
        competitive: has_number(first.cell(0)),
        total_time: first.cell(if uses_classes { 4 } else { 3 }).to_string(),
        club: second.cell(2).to_string(),
        name,
        class_name,
        cum_times,
    })
}

/// Four leading columns when the second holds a start number (or nothing),
/// otherwise three
fn preceding_columns(first: &Row) -> usize {
    if first.cell(1).chars().all(|c| c.is_ascii_digit()) {
        4
    } else {
        3
    }
}

fn read_preformatted_competitor(first: &Row, second: &Row, preceding: usize) -> CompetitorRecord {
    let name = first.cell(preceding - 2).to_string();

    let mut cum_times: Vec<Option<Time>> = text_after_fonts(&first.source, preceding)
        .split_whitespace()
        .map(Time::parse)
        .collect();
    let mut splits: Vec<String> = text_after_fonts(&second.source, preceding)
        .split_whitespace()
        .map(str::to_string)
        .collect();
    remove_extra_controls(&mut cum_times, &mut splits);

    // The class sits between the font columns before the times
    let class_name = if name.is_empty() {
        None
    } else {
        let mut end = 0;
        for _ in 0..preceding {
            match first.source[end..].find("</font>") {
                Some(pos) => end += pos + "</font>".len(),
                None => break,
            }
        }
        without_fonts(&first.source[..end])
            .split_whitespace()
            .next()
            .map(str::to_string)
    };

    CompetitorRecord {
        competitive: has_number(first.cell(0)),
        total_time: first.cell(preceding - 1).to_string(),
        club: second.cell(preceding - 2).to_string(),
        name,
        class_name,
        cum_times,
    }
}

fn read_multi_table_competitor(first: &Row, second: &Row, times_offset: usize) -> Result<CompetitorRecord> {
    let name_offset = if times_offset == 3 { 1 } else { 2 };
    let name = first.cell(name_offset).to_string();
    let class_name = (times_offset == 5 && !name.is_empty()).then(|| first.cell(3).to_string());

    let times = |row: &Row| -> Vec<String> {
        let end = trimmed_end(&row.cells);
        row.cells
            .get(times_offset.min(end)..end)
            .unwrap_or_default()
            .iter()
            .filter(|cell| !cell.is_empty())
            .cloned()
            .collect()
    };

    let mut cum_times: Vec<Option<Time>> = times(first).iter().map(|cell| Time::parse(cell)).collect();
    let mut splits = times(second);
    remove_extra_controls(&mut cum_times, &mut splits);

    let known_cum_times = cum_times.iter().filter(|time| time.is_some()).count();
    if known_cum_times != splits.len() {
        return Err(ResultsError::invalid(format!(
            "Cumulative and split times do not have the same length: {} cumulative times, {} split times",
            known_cum_times,
            splits.len()
        )));
    }

    Ok(CompetitorRecord {
        competitive: has_number(first.cell(0)),
        total_time: first.cell(times_offset.saturating_sub(1)).to_string(),
        club: second.cell(name_offset).to_string(),
        name,
        class_name,
        cum_times,
    })
}

// ============================================================================
// RESULTS
// ============================================================================

/// Whether no class name appears on two different courses
fn classes_unique_within_courses(courses: &[CourseRecord]) -> bool {
    let mut class_courses: HashMap<&str, &str> = HashMap::new();
    for course in courses {
        for competitor in &course.competitors {
            let class_name = competitor.class_name.as_deref().unwrap_or_default();
            match class_courses.get(class_name) {
                Some(&course_name) if course_name != course.name => return false,
                Some(_) => {}
                None => {
                    class_courses.insert(class_name, &course.name);
                }
            }
        }
    }
    true
}

/// Competitors are split into classes within their course when every
/// competitor has a class and no class spans two courses; otherwise each
/// course is a single class of the same name.
fn build_results(courses: Vec<CourseRecord>) -> Result<Results> {
    let use_class_names = classes_unique_within_courses(&courses)
        && courses
            .iter()
            .all(|course| course.competitors.iter().all(|c| c.class_name.is_some()));

    let mut classes = Vec::new();
    let mut result_courses = Vec::with_capacity(courses.len());

    for course in courses {
        let num_controls = course.controls.len().saturating_sub(1);
        let mut grouped: Vec<(String, Vec<CompetitorRecord>)> = Vec::new();
        for competitor in course.competitors {
            let class_name = match (&competitor.class_name, use_class_names) {
                (Some(class_name), true) => class_name.clone(),
                _ => course.name.clone(),
            };
            match grouped.iter_mut().find(|(name, _)| *name == class_name) {
                Some((_, members)) => members.push(competitor),
                None => grouped.push((class_name, vec![competitor])),
            }
        }

        let mut class_indexes = Vec::with_capacity(grouped.len());
        for (class_name, members) in grouped {
            let competitors = members
                .into_iter()
                .enumerate()
                .map(|(index, member)| member.into_competitor(index + 1))
                .collect();
            class_indexes.push(classes.len());
            classes.push(CourseClass::new(class_name, num_controls, competitors)?);
        }

        let controls = course.controls[..num_controls]
            .iter()
            .map(|code| code.clone().unwrap_or_default())
            .collect();
        result_courses.push(Course::new(
            course.name,
            class_indexes,
            course.length,
            course.climb,
            Some(controls),
        ));
    }

    Ok(Results::new(classes, result_courses, Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_cell(contents: &str) -> String {
        format!("<td align=\"right\">{}</td>", contents)
    }

    fn single_table_competitor(posn: &str, name: &str, club: &str, time: &str, cums: &[&str], splits: &[&str]) -> String {
        let empty = single_cell("");
        let mut first = format!("<tr>{}{}{}{}", single_cell(posn), single_cell(""), single_cell(name), single_cell(time));
        let mut second = format!("<tr>{}{}{}{}", empty, empty, single_cell(club), empty);
        for (cum, split) in cums.iter().zip(splits) {
            first.push_str(&single_cell(cum));
            first.push_str(&single_cell(if *cum == "-----" { "" } else { "(1)" }));
            second.push_str(&single_cell(split));
            second.push_str(&single_cell(if split.is_empty() { "" } else { "(1)" }));
        }
        format!("{}</tr>\n{}</tr>\n", first, second)
    }

    fn single_table_html() -> String {
        let empty = single_cell("");
        let controls = format!(
            "<tr>{}{}{}{}{}{}{}{}{}{}</tr>\n",
            empty,
            empty,
            empty,
            empty,
            single_cell("1-208"),
            empty,
            single_cell("2-227"),
            empty,
            single_cell("F"),
            empty
        );
        format!(
            "<html><head><title>Results</title></head><body>\n\
             <table width=\"100%\" class=\"header\"><tr><td>Title</td></tr></table>\n<hr>\n<table>\n\
             <tr><td colspan=\"24\">&nbsp;</td></tr>\n\
             <tr class=\"clubName\"><td colspan=\"24\">Course 1    (2500m, 95m)</td></tr>\n{}{}{}{}\
             </table>\n</body>\n</html>",
            controls,
            single_table_competitor("1.", "John Smith", "ABC", "09:17", &["03:41", "06:58", "09:17"], &["03:41", "03:17", "02:19"]),
            single_table_competitor("2.", "Fred Baker", "DEF", "10:01", &["03:59", "07:32", "10:01"], &["03:59", "03:33", "02:29"]),
            single_table_competitor("", "Bill Jones", "GHI", "mp", &["04:10", "-----", "11:12"], &["04:10", "", "-----"]),
        )
    }

    #[test]
    fn test_single_table_layout() {
        let results = parse(&single_table_html()).unwrap();
        assert_eq!(results.courses.len(), 1);
        assert_eq!(results.classes.len(), 1);

        let course = &results.courses[0];
        assert_eq!(course.name, "Course 1");
        assert_eq!(course.length, Some(2.5));
        assert_eq!(course.climb, Some(95));
        assert_eq!(course.controls, Some(vec!["208".to_string(), "227".to_string()]));

        let class = &results.classes[0];
        assert_eq!(class.name, "Course 1");
        assert_eq!(class.num_controls, 2);
        assert_eq!(class.competitors.len(), 3);

        let john = &class.competitors[0];
        assert_eq!(john.full_name(), "John Smith");
        assert_eq!(john.club, "ABC");
        assert_eq!(john.total_time, Some(Time::from_secs(557)));
        assert_eq!(john.original_cum_times()[1], Some(Time::from_secs(221)));

        let bill = &class.competitors[2];
        assert_eq!(bill.original_cum_times()[2], None);
        assert_eq!(bill.total_time, None);
    }

    fn multi_cell(contents: &str) -> String {
        format!("<td id=rb><nobr>{}</nobr></td>", contents)
    }

    fn multi_table_course(name: &str, rows: &str) -> String {
        format!(
            "<table width=1105px>\n<tbody>\n<tr>{}{}{}<td id=\"header\" ></td>\n</tr>\n</tbody>\n</table>\n\
             <table width=1105px>\n<thead>\n<tr><th id=rb>Pl</th><th id=rb>Stno</th><th>Name</th><th id=rb>Time</th><th id=rb></th></tr>\n\
             </thead><tbody></tbody></table>\n<table width=1105px>\n<tbody>\n{}\
             <tr><td id=c10><nobr>&nbsp</nobr></td></tr>\n</tbody>\n</table>\n",
            multi_cell(&format!("{} (21)", name)),
            multi_cell("4.1 Km"),
            multi_cell("140 m"),
            rows
        )
    }

    fn multi_table_competitor(posn: &str, name: &str, club: &str, time: &str, cums: &[&str], splits: &[&str]) -> String {
        let mut first = format!("{}{}{}{}", multi_cell(posn), multi_cell("101"), multi_cell(name), multi_cell(time));
        let mut second = format!("{}{}{}{}", multi_cell(""), multi_cell(""), multi_cell(club), multi_cell(""));
        for (cum, split) in cums.iter().zip(splits) {
            first.push_str(&multi_cell(cum));
            second.push_str(&multi_cell(split));
        }
        format!("<tr>{}</tr>\n<tr>{}</tr>\n", first, second)
    }

    fn multi_table_html() -> String {
        let controls = format!(
            "<tr>{}{}{}{}{}{}{}</tr>\n",
            multi_cell(""),
            multi_cell(""),
            multi_cell(""),
            multi_cell(""),
            multi_cell("1(152)"),
            multi_cell("2(188)"),
            multi_cell("F")
        );
        let course_a = multi_table_course(
            "Course A",
            &format!(
                "{}{}{}",
                controls,
                multi_table_competitor("1", "John Smith", "ABC", "10:11", &["02:50", "07:28", "10:11"], &["02:50", "04:38", "02:43"]),
                multi_table_competitor("2", "Fred Baker", "DEF", "12:00", &["03:02", "08:40", "12:00"], &["03:02", "05:38", "03:20"]),
            ),
        );
        let course_b = multi_table_course(
            "Course B",
            &format!(
                "<tr>{}{}{}{}{}{}</tr>\n{}",
                multi_cell(""),
                multi_cell(""),
                multi_cell(""),
                multi_cell(""),
                multi_cell("1(152)"),
                multi_cell("F"),
                multi_table_competitor("1", "Bill Jones", "GHI", "06:30", &["04:00", "06:30"], &["04:00", "02:30"]),
            ),
        );
        format!(
            "<body>\n<div id=reporttop>\n<table width=1105px><tr><td><nobr>Event title</nobr></td></tr>\n</table>\n<hr>\n</div>\n\
             <table id=ln><tr><td>&nbsp</td></tr></table>\n{}{}</body>\n</html>\n",
            course_a, course_b
        )
    }

    #[test]
    fn test_multi_table_layout() {
        let results = parse(&multi_table_html()).unwrap();
        assert_eq!(results.courses.len(), 2);
        assert_eq!(results.classes.len(), 2);

        let course = &results.courses[0];
        assert_eq!(course.name, "Course A");
        assert_eq!(course.length, Some(4.1));
        assert_eq!(course.climb, Some(140));
        assert_eq!(course.controls, Some(vec!["152".to_string(), "188".to_string()]));

        let john = &results.classes[0].competitors[0];
        assert_eq!(john.full_name(), "John Smith");
        assert_eq!(john.club, "ABC");
        assert_eq!(john.total_time, Some(Time::from_secs(611)));

        let bill = &results.classes[1].competitors[0];
        assert_eq!(results.classes[1].num_controls, 1);
        assert_eq!(bill.original_cum_times()[1], Some(Time::from_secs(240)));
    }

    fn pre_cell(contents: &str) -> String {
        format!("<font size=\"2\"><b>   {}</b></font>", contents)
    }

    /// Every fourth time sits in its own font element
    fn pre_competitor(posn: &str, start: &str, name: &str, class: &str, club: &str, time: &str, cums: &[&str], splits: &[&str]) -> String {
        let mut first = format!("{}{}{}{}{}", pre_cell(posn), pre_cell(start), pre_cell(name), class, pre_cell(time));
        let mut second = format!("{}{}{}{}", pre_cell(""), pre_cell(""), pre_cell(club), pre_cell(""));
        for (index, (cum, split)) in cums.iter().zip(splits).enumerate() {
            if index % 5 == 3 {
                first.push_str(&format!("  {}", pre_cell(cum)));
                second.push_str(&format!("  {}", pre_cell(split)));
            } else {
                first.push_str(&format!("  {}  ", cum));
                second.push_str(&format!("  {}  ", split));
            }
        }
        format!("{}\n{}\n", first, second)
    }

    fn preformatted_html(competitors: &str) -> String {
        format!(
            "<html><head></head><body>\n<pre>\n<font>Dummy line</font>\n\n{}{}\n{}{}{}{}   1(138)     2(152)     3(141)      F  \n\n{}</pre></body></html>",
            pre_cell("Test course 1 (2)"),
            pre_cell("2.7 km     35 m"),
            pre_cell(""),
            pre_cell(""),
            pre_cell(""),
            pre_cell(""),
            competitors
        )
    }

    #[test]
    fn test_preformatted_layout() {
        let html = preformatted_html(&format!(
            "{}{}",
            pre_competitor("1", "165", "John Smith", "", "ABC", "09:25", &["01:47", "04:02", "08:13", "09:25"], &["01:47", "02:15", "04:11", "01:12"]),
            pre_competitor("", "182", "Fred Baker", "", "DEF", "mp", &["01:50", "04:30", "-----"], &["01:50", "02:40", ""]),
        ));
        let results = parse(&html).unwrap();
        assert_eq!(results.courses.len(), 1);
        assert_eq!(results.classes.len(), 1);

        let course = &results.courses[0];
        assert_eq!(course.name, "Test course 1");
        assert_eq!(course.length, Some(2.7));
        assert_eq!(course.climb, Some(35));
        assert_eq!(
            course.controls,
            Some(vec!["138".to_string(), "152".to_string(), "141".to_string()])
        );

        let class = &results.classes[0];
        assert_eq!(class.name, "Test course 1");
        assert_eq!(class.num_controls, 3);

        let john = &class.competitors[0];
        assert_eq!(john.full_name(), "John Smith");
        assert_eq!(john.club, "ABC");
        assert_eq!(john.total_time, Some(Time::from_secs(565)));
        assert_eq!(john.original_cum_times()[3], Some(Time::from_secs(493)));

        // The mispuncher's missing finish is filled in
        let fred = &class.competitors[1];
        assert_eq!(fred.club, "DEF");
        assert_eq!(fred.original_cum_times().len(), 5);
        assert_eq!(fred.original_cum_times()[2], Some(Time::from_secs(270)));
        assert_eq!(fred.original_cum_times()[3], None);
        assert!(!fred.completed());
    }

    #[test]
    fn test_preformatted_without_start_numbers() {
        let html = preformatted_html(&pre_competitor(
            "1",
            "",
            "John Smith",
            "",
            "ABC",
            "09:25",
            &["01:47", "04:02", "08:13", "09:25"],
            &["01:47", "02:15", "04:11", "01:12"],
        )
        .replace(&format!("{}{}", pre_cell("1"), pre_cell("")), &pre_cell("1"))
        .replacen(&format!("{}{}", pre_cell(""), pre_cell("")), &pre_cell(""), 1));
        let results = parse(&html).unwrap();

        let john = &results.classes[0].competitors[0];
        assert_eq!(john.full_name(), "John Smith");
        assert_eq!(john.club, "ABC");
        assert_eq!(john.original_cum_times()[1], Some(Time::from_secs(107)));
    }

    #[test]
    fn test_preformatted_class_name() {
        let lines = pre_competitor("1", "165", "John Smith", " M21 ", "ABC", "04:00", &["01:00", "04:00"], &["01:00", "03:00"]);
        let rows: Vec<Row> = lines.lines().map(read_preformatted_row).collect();
        let record = read_preformatted_competitor(&rows[0], &rows[1], preceding_columns(&rows[0]));
        assert_eq!(record.class_name.as_deref(), Some("M21"));
        assert_eq!(record.total_time, "04:00");
        assert_eq!(record.cum_times, vec![Some(Time::from_secs(60)), Some(Time::from_secs(240))]);
    }

    #[test]
    fn test_preformatted_needs_closing_pre() {
        let error = parse("<html><head></head><body>\n<pre>\n<font>blah blah blah</font>\n</body></html>").unwrap_err();
        assert!(!error.is_wrong_format());
    }

    #[test]
    fn test_rejects_other_table_counts() {
        assert!(parse("<html><body><pre>No fonts</pre></body></html>").unwrap_err().is_wrong_format());
        assert!(parse("<html><body><p>No tables</p></body></html>").unwrap_err().is_wrong_format());
        assert!(parse("<table><tr><td>1</td></tr></table>").unwrap_err().is_wrong_format());
        assert!(parse("Course 1,3\nJohn,Smith,ABC,10:00,01:45,04:23,02:52,00:56").unwrap_err().is_wrong_format());
    }

    #[test]
    fn test_course_header_helpers() {
        assert_eq!(
            split_course_details("Course 1    (2500m, 95m)"),
            Some(("Course 1".to_string(), 2.5, 95))
        );
        assert_eq!(split_course_details("Course 1"), None);
        assert_eq!(find_distance("4.1 Km"), Some(4.1));
        assert_eq!(find_distance("7,3km"), Some(7.3));
        assert_eq!(find_distance("140 m"), None);
        assert_eq!(find_climb("140 m"), Some(140));
        assert_eq!(find_climb("4.1 km 120 hm"), Some(120));
        assert_eq!(find_climb("4.1 km"), None);
    }
}
