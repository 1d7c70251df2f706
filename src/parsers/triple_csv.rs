//! Delimited exports that give each control as a triple of cells (code,
//! cumulative time, split time) starting at column 38, with the finish as the
//! last triple.

use std::collections::HashMap;

use crate::competitor::{Competitor, CompetitorName};
use crate::course::Course;
use crate::course_class::CourseClass;
use crate::error::{Result, ResultsError};
use crate::parsers::{is_control_code, normalise_line_endings, push_warning, trim_trailing_empty};
use crate::results::Results;
use crate::time::Time;

const DELIMITERS: [char; 2] = [',', ';'];
const CONTROLS_OFFSET: usize = 38;
const STEP: usize = 3;
const NAME_COLUMN: usize = 3;
const CLUB_COLUMN: usize = 5;
const COURSE_COLUMN: usize = 7;
const START_TIME_COLUMN: usize = 8;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

struct ClassRecord {
    name: String,
    /// Control codes, excluding the finish
    controls: Vec<String>,
    competitors: Vec<Competitor>,
}

pub fn parse(text: &str) -> Result<Results> {
    let text = normalise_line_endings(text);
    let lines: Vec<&str> = text.split('\n').filter(|line| !line.trim().is_empty()).collect();
    if lines.len() < 2 {
        return Err(ResultsError::wrong_format("Data appears not to be in the triple-column CSV format"));
    }

    let delimiter = detect_delimiter(lines[1])?;
    let mut first_row = split_row(lines[1], delimiter);
    merge_split_names(&mut first_row);
    check_first_row(&first_row)?;

    let mut warnings = Vec::new();
    let mut classes: Vec<ClassRecord> = Vec::new();
    let mut class_lookup: HashMap<String, usize> = HashMap::new();

    for line in &lines[1..] {
        let row = split_row(line, delimiter);
        if row.len() < CONTROLS_OFFSET {
            continue;
        }
        read_row(row, &mut classes, &mut class_lookup, &mut warnings);
    }

    build_results(classes, warnings)
}

fn split_row(line: &str, delimiter: char) -> Vec<String> {
    let mut row: Vec<String> = line.split(delimiter).map(str::to_string).collect();
    trim_trailing_empty(&mut row);
    row
}

/// Names with a comma in them spill into the following cells, which then
/// start with a single space
fn merge_split_names(row: &mut Vec<String>) {
    while row.len() > NAME_COLUMN + 1 && starts_with_single_space(&row[NAME_COLUMN + 1]) {
        let extra = row.remove(NAME_COLUMN + 1);
        row[NAME_COLUMN] = format!("{},{}", row[NAME_COLUMN], extra);
    }
}

fn detect_delimiter(line: &str) -> Result<char> {
    DELIMITERS
        .iter()
        .copied()
        .find(|&delimiter| split_row(line, delimiter).len() > CONTROLS_OFFSET)
        .ok_or_else(|| ResultsError::wrong_format("Data appears not to be in the triple-column CSV format"))
}

/// Every control cell on the first data row must hold a control code
fn check_first_row(row: &[String]) -> Result<()> {
    let mut index = CONTROLS_OFFSET;
    while index + STEP < row.len() {
        if !is_control_code(row[index].trim()) {
            return Err(ResultsError::wrong_format(format!(
                "Data appears not to be in the triple-column CSV format: '{}' is not a control code",
                row[index]
            )));
        }
        index += STEP;
    }
    Ok(())
}

fn read_row(
    mut row: Vec<String>,
    classes: &mut Vec<ClassRecord>,
    class_lookup: &mut HashMap<String, usize>,
    warnings: &mut Vec<String>,
) {
    merge_split_names(&mut row);
    if row.len() < CONTROLS_OFFSET {
        return;
    }
    while (row.len() - CONTROLS_OFFSET) % STEP != 0 {
        row.push(String::new());
    }

    let name = row[NAME_COLUMN].trim().to_string();
    let club = row[CLUB_COLUMN].clone();
    let course_name = row[COURSE_COLUMN].trim().to_string();
    let start_time = Time::parse(&row[START_TIME_COLUMN]);

    let mut cum_times = vec![Some(Time::ZERO)];
    let mut controls = Vec::new();
    let mut index = CONTROLS_OFFSET;
    while index < row.len() {
        cum_times.push(Time::parse(&row[index + 1]));
        if index + STEP < row.len() {
            controls.push(row[index].trim().to_string());
        }
        index += STEP;
    }

    if cum_times.len() == 1 {
        if !name.is_empty() {
            let course_label = if course_name.is_empty() { "(unnamed)" } else { &course_name };
            push_warning(
                warnings,
                format!("Competitor '{}' on course '{}' has no times recorded", name, course_label),
            );
        }
        return;
    }

    let class_index = *class_lookup.entry(course_name.clone()).or_insert_with(|| {
        classes.push(ClassRecord {
            name: course_name.clone(),
            controls: controls.clone(),
            competitors: Vec::new(),
        });
        classes.len() - 1
    });
    let class = &mut classes[class_index];

    if cum_times.len() != class.controls.len() + 2 {
        push_warning(
            warnings,
            format!(
                "Competitor '{}' has the wrong number of splits for course '{}': expected {}, actual {}",
                name,
                course_name,
                class.controls.len() + 1,
                cum_times.len() - 1
            ),
        );
        return;
    }

    let has_times = cum_times[1..].iter().any(Option::is_some);
    let order = class.competitors.len() + 1;
    let mut competitor =
        Competitor::from_original_cum_times(order, CompetitorName::from_full_name(&name), club, start_time, cum_times);
    if !has_times {
        competitor.set_non_starter();
    }
    class.competitors.push(competitor);
}

fn starts_with_single_space(text: &str) -> bool {
    let mut chars = text.chars();
    matches!((chars.next(), chars.next()), (Some(c), Some(d)) if c.is_whitespace() && !d.is_whitespace())
}

/// Classes sharing a list of controls share a course, named after the first
/// such class
fn build_results(records: Vec<ClassRecord>, warnings: Vec<String>) -> Result<Results> {
    let mut courses: Vec<Course> = Vec::new();
    let mut course_lookup: HashMap<String, usize> = HashMap::new();
    let mut classes = Vec::with_capacity(records.len());

    for (class_index, record) in records.into_iter().enumerate() {
        let key = record.controls.join(",");
        match course_lookup.get(&key) {
            Some(&course_index) => courses[course_index].classes.push(class_index),
            None => {
                course_lookup.insert(key, courses.len());
                courses.push(Course::new(
                    record.name.clone(),
                    vec![class_index],
                    None,
                    None,
                    Some(record.controls.clone()),
                ));
            }
        }
        classes.push(CourseClass::new(record.name, record.controls.len(), record.competitors)?);
    }

    Ok(Results::new(classes, courses, warnings))
}
