//! Delimited exports from OE-style timing software: one row per competitor,
//! with control codes and punch times in alternating columns from control 1
//! onwards. Three column layouts exist, told apart by where control 1 sits.

use std::collections::{HashMap, HashSet};

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::competitor::{Competitor, CompetitorName, Gender};
use crate::course::Course;
use crate::course_class::CourseClass;
use crate::error::{Result, ResultsError};
use crate::parsers::{
    is_control_code, leading_integer, normalise_line_endings, parse_course_climb, parse_course_length, push_warning,
};
use crate::results::Results;
use crate::time::Time;

const DELIMITERS: [char; 4] = [';', ',', '\t', '\\'];

/// Every row must reach at least this far, even without controls
const MIN_CONTROLS_OFFSET: usize = 37;

// ============================================================================
// COLUMN LAYOUTS
// ============================================================================

/// Where each field lives in one layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnLayout {
    control1: usize,
    course: usize,
    distance: usize,
    climb: usize,
    control_count: usize,
    placing: usize,
    start_punch: usize,
    finish: usize,
    non_competitive: usize,
    start_time: usize,
    time: usize,
    classifier: usize,
    club: usize,
    class_name: usize,
    ecard: usize,
    year_of_birth: usize,
    forename: Option<usize>,
    surname: Option<usize>,
    combined_name: Option<usize>,
    gender: Option<usize>,
    class_name_fallback: Option<usize>,
    club_fallback: Option<usize>,
}

impl ColumnLayout {
    /// Fields from the course name onwards sit just before control 1
    const fn new(control1: usize) -> ColumnLayout {
        ColumnLayout {
            control1,
            course: control1 - 7,
            distance: control1 - 6,
            climb: control1 - 5,
            control_count: control1 - 4,
            placing: control1 - 3,
            start_punch: control1 - 2,
            finish: control1 - 1,
            non_competitive: control1 - 38,
            start_time: control1 - 37,
            time: control1 - 35,
            classifier: control1 - 34,
            club: control1 - 31,
            class_name: control1 - 28,
            ecard: 1,
            year_of_birth: 0,
            forename: None,
            surname: None,
            combined_name: None,
            gender: None,
            class_name_fallback: None,
            club_fallback: None,
        }
    }
}

/// A single name column holding forename and surname together
const LAYOUT_44: ColumnLayout = ColumnLayout {
    combined_name: Some(3),
    year_of_birth: 4,
    ..ColumnLayout::new(44)
};

const LAYOUT_46: ColumnLayout = ColumnLayout {
    surname: Some(3),
    forename: Some(4),
    year_of_birth: 5,
    gender: Some(6),
    ..ColumnLayout::new(46)
};

/// Rows may lack a class name or club, in which case the course name and
/// club number stand in
const LAYOUT_60: ColumnLayout = ColumnLayout {
    ecard: 3,
    surname: Some(5),
    forename: Some(6),
    year_of_birth: 7,
    gender: Some(8),
    combined_name: Some(3),
    non_competitive: 10,
    start_time: 11,
    time: 13,
    classifier: 14,
    club: 20,
    class_name: 26,
    class_name_fallback: Some(53),
    club_fallback: Some(18),
    ..ColumnLayout::new(60)
};

const LAYOUTS: [ColumnLayout; 3] = [LAYOUT_44, LAYOUT_46, LAYOUT_60];

// ============================================================================
// DATA STRUCTURES
// ============================================================================

struct ClassRecord {
    num_controls: usize,
    competitors: Vec<Competitor>,
}

struct CourseDetails {
    length: Option<f64>,
    climb: Option<u32>,
    controls: Vec<String>,
}

#[derive(Default)]
struct Reader {
    classes: HashMap<String, ClassRecord>,
    /// Course names in first-seen order, with their details
    courses: Vec<(String, CourseDetails)>,
    class_course_pairs: Vec<(String, String)>,
    warnings: Vec<String>,
}

pub fn parse(text: &str) -> Result<Results> {
    let text = normalise_line_endings(text);
    let first_data_line = text
        .split('\n')
        .nth(1)
        .ok_or_else(|| ResultsError::wrong_format("No data found to read"))?;

    let delimiter = DELIMITERS
        .iter()
        .copied()
        .find(|&delimiter| first_data_line.split(delimiter).count() > MIN_CONTROLS_OFFSET)
        .ok_or_else(|| ResultsError::wrong_format("Data appears not to be in the OE CSV format"))?;

    let mut csv_reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|err| ResultsError::invalid(format!("Could not read OE CSV data: {}", err)))?;
        if !record.iter().all(str::is_empty) {
            rows.push(record);
        }
    }

    let first_row = rows
        .first()
        .ok_or_else(|| ResultsError::wrong_format("No data found to read"))?;
    let layout = identify_layout(first_row)?;

    let mut reader = Reader::default();
    for row in &rows {
        let line_number = row.position().map_or(0, |position| position.line());
        reader.read_row(row, line_number, layout)?;
    }

    reader.into_results()
}

/// Control 1 must hold a control code, with the start and finish punches
/// before it blank or times, and the control count present
fn identify_layout(first_row: &StringRecord) -> Result<ColumnLayout> {
    let is_blank_or_time = |text: &str| text.is_empty() || Time::parse(text).is_some();
    LAYOUTS
        .iter()
        .copied()
        .find(|layout| {
            layout.control1 < first_row.len()
                && is_control_code(cell(first_row, layout.control1))
                && is_blank_or_time(cell(first_row, layout.start_punch))
                && is_blank_or_time(cell(first_row, layout.finish))
                && !cell(first_row, layout.control_count).is_empty()
        })
        .ok_or_else(|| ResultsError::wrong_format("Did not find control 1 at any of the supported indexes"))
}

fn cell(row: &StringRecord, index: usize) -> &str {
    row.get(index).unwrap_or("")
}

fn cell_opt(row: &StringRecord, index: Option<usize>) -> &str {
    index.map_or("", |index| cell(row, index))
}

// ============================================================================
// ROW READING
// ============================================================================

impl Reader {
    fn read_row(&mut self, row: &StringRecord, line_number: u64, layout: ColumnLayout) -> Result<()> {
        if row.len() < MIN_CONTROLS_OFFSET {
            return Err(ResultsError::invalid(format!(
                "Too few items on line {} of the input file: expected at least {}, got {}",
                line_number,
                MIN_CONTROLS_OFFSET,
                row.len()
            )));
        }

        let Some(num_controls) = self.num_controls(row, line_number, layout) else {
            return Ok(());
        };

        let class_name = class_name(row, layout).to_string();
        let course_name = cell(row, layout.course).to_string();
        let cum_times = read_cum_times(row, layout, num_controls);

        self.classes.entry(class_name.clone()).or_insert_with(|| ClassRecord {
            num_controls,
            competitors: Vec::new(),
        });

        if !self.courses.iter().any(|(name, _)| *name == course_name) {
            let details = CourseDetails {
                length: parse_course_length(cell(row, layout.distance)),
                climb: parse_course_climb(cell(row, layout.climb)),
                controls: (0..num_controls)
                    .map(|index| cell(row, layout.control1 + 2 * index).to_string())
                    .collect(),
            };
            self.courses.push((course_name.clone(), details));
        }

        let pair = (class_name.clone(), course_name);
        if !self.class_course_pairs.contains(&pair) {
            self.class_course_pairs.push(pair);
        }

        let competitor = read_competitor(row, layout, cum_times, self.class_len(&class_name) + 1);
        if let Some(class) = self.classes.get_mut(&class_name) {
            class.competitors.push(competitor);
        }
        Ok(())
    }

    fn class_len(&self, class_name: &str) -> usize {
        self.classes.get(class_name).map_or(0, |class| class.competitors.len())
    }

    /// The class's control count if the class is known, otherwise the row's.
    /// `None`, with a warning, if the row cannot be placed.
    fn num_controls(&mut self, row: &StringRecord, line_number: u64, layout: ColumnLayout) -> Option<usize> {
        let class_name = class_name(row, layout);
        if class_name.is_empty() {
            let name = display_name(&read_name(row, layout));
            push_warning(
                &mut self.warnings,
                format!("Could not find a class for competitor '{}' (line {})", name, line_number),
            );
            return None;
        }

        if let Some(class) = self.classes.get(class_name) {
            return Some(class.num_controls);
        }

        let count_text = cell(row, layout.control_count);
        match leading_integer(count_text).and_then(|count| usize::try_from(count).ok()) {
            Some(count) => Some(count),
            None => {
                let name = display_name(&read_name(row, layout));
                push_warning(
                    &mut self.warnings,
                    format!(
                        "Could not read the control count '{}' for competitor '{}' from line {}",
                        count_text, name, line_number
                    ),
                );
                None
            }
        }
    }

    fn into_results(self) -> Result<Results> {
        let Reader {
            classes: class_records,
            courses: course_details,
            class_course_pairs,
            warnings,
            ..
        } = self;

        if class_records.is_empty() && !warnings.is_empty() {
            return Err(ResultsError::wrong_format(
                "This file may have looked vaguely like an OE CSV file but no data could be read out of it",
            ));
        }

        let mut class_names: Vec<String> = class_records.keys().cloned().collect();
        class_names.sort();
        let mut class_records = class_records;
        let mut classes = Vec::with_capacity(class_names.len());
        for name in &class_names {
            if let Some(record) = class_records.remove(name) {
                classes.push(CourseClass::new(name.clone(), record.num_controls, record.competitors)?);
            }
        }

        let courses = link_courses(&class_names, course_details, &class_course_pairs);
        Ok(Results::new(classes, courses, warnings))
    }
}

fn class_name(row: &StringRecord, layout: ColumnLayout) -> &str {
    let name = cell(row, layout.class_name);
    if name.is_empty() {
        cell_opt(row, layout.class_name_fallback)
    } else {
        name
    }
}

fn start_time(row: &StringRecord, layout: ColumnLayout) -> Option<Time> {
    let punch = cell(row, layout.start_punch);
    if punch.is_empty() {
        Time::parse(cell(row, layout.start_time))
    } else {
        Time::parse(punch)
    }
}

fn read_name(row: &StringRecord, layout: ColumnLayout) -> CompetitorName {
    let forename = cell_opt(row, layout.forename);
    let surname = cell_opt(row, layout.surname);
    if forename.is_empty() && surname.is_empty() {
        CompetitorName::from_full_name(cell_opt(row, layout.combined_name))
    } else {
        CompetitorName::new(forename, surname)
    }
}

fn display_name(name: &CompetitorName) -> String {
    let full_name = name.full_name();
    if full_name.is_empty() {
        "<name unknown>".to_string()
    } else {
        full_name
    }
}

/// Punch times for each control, then the total time. Without a total time
/// the finish punch less the start stands in.
fn read_cum_times(row: &StringRecord, layout: ColumnLayout, num_controls: usize) -> Vec<Option<Time>> {
    let mut cum_times = Vec::with_capacity(num_controls + 2);
    cum_times.push(Some(Time::ZERO));
    for index in 0..num_controls {
        cum_times.push(row.get(layout.control1 + 1 + 2 * index).and_then(Time::parse));
    }

    let total_time = Time::parse(cell(row, layout.time)).or_else(|| {
        let start = start_time(row, layout)?;
        let finish = Time::parse(cell(row, layout.finish))?;
        Some(finish - start)
    });
    cum_times.push(total_time);
    cum_times
}

fn read_competitor(row: &StringRecord, layout: ColumnLayout, cum_times: Vec<Option<Time>>, order: usize) -> Competitor {
    let mut club = cell(row, layout.club);
    if club.is_empty() {
        club = cell_opt(row, layout.club_fallback);
    }

    let mut name = read_name(row, layout);

    // Placings such as "n/c" or "mp" are sometimes appended to the surname too
    let placing = cell(row, layout.placing);
    let placing_is_non_numeric = !placing.is_empty() && leading_integer(placing).is_none();
    if placing_is_non_numeric {
        if let Some(stripped) = name.surname.strip_suffix(placing) {
            name.surname = stripped.trim().to_string();
        }
    }

    let mut competitor = Competitor::from_original_cum_times(order, name, club, start_time(row, layout), cum_times);
    if (cell(row, layout.non_competitive) == "1" || placing_is_non_numeric) && competitor.completed() {
        competitor.set_non_competitive();
    }

    match cell(row, layout.classifier) {
        "" | "0" => {
            if !competitor.has_any_times() {
                competitor.set_non_starter();
            }
        }
        "1" => competitor.set_non_starter(),
        "2" => competitor.set_non_finisher(),
        "4" => competitor.disqualify(),
        "5" => competitor.set_over_max_time(),
        _ => {}
    }

    competitor.year_of_birth = leading_integer(cell(row, layout.year_of_birth)).and_then(|year| i32::try_from(year).ok());
    let ecard = cell(row, layout.ecard);
    competitor.ecard_id = (!ecard.is_empty()).then(|| ecard.to_string());
    competitor.gender = Gender::from_code(cell_opt(row, layout.gender));
    competitor
}

// ============================================================================
// COURSES
// ============================================================================

/// One class may be split over several courses and one course may serve
/// several classes, so each connected group of classes and courses becomes a
/// single course, named after the first course seen in it.
fn link_courses(
    class_names: &[String],
    course_details: Vec<(String, CourseDetails)>,
    pairs: &[(String, String)],
) -> Vec<Course> {
    let mut courses_to_classes: Vec<(&str, Vec<&str>)> = Vec::new();
    let mut classes_to_courses: HashMap<&str, Vec<&str>> = HashMap::new();
    for (class_name, course_name) in pairs {
        let (class_name, course_name) = (class_name.as_str(), course_name.as_str());
        match courses_to_classes.iter_mut().find(|entry| entry.0 == course_name) {
            Some(entry) => entry.1.push(class_name),
            None => courses_to_classes.push((course_name, vec![class_name])),
        }
        classes_to_courses.entry(class_name).or_default().push(course_name);
    }

    let details: HashMap<&str, &CourseDetails> =
        course_details.iter().map(|(name, details)| (name.as_str(), details)).collect();
    let class_index = |name: &str| class_names.iter().position(|class_name| class_name == name);

    let mut done: HashSet<&str> = HashSet::new();
    let mut courses = Vec::new();

    for &(initial_course, _) in &courses_to_classes {
        if done.contains(initial_course) {
            continue;
        }

        let mut courses_to_do = vec![initial_course];
        let mut related_classes: Vec<&str> = Vec::new();
        while let Some(course_name) = courses_to_do.pop() {
            if !done.insert(course_name) {
                continue;
            }
            let linked_classes = courses_to_classes
                .iter()
                .find(|(name, _)| *name == course_name)
                .map_or(&[][..], |(_, classes)| classes.as_slice());
            for &class_name in linked_classes {
                if related_classes.contains(&class_name) {
                    continue;
                }
                related_classes.push(class_name);
                for &other_course in classes_to_courses.get(class_name).into_iter().flatten() {
                    if !done.contains(other_course) {
                        courses_to_do.push(other_course);
                    }
                }
            }
        }

        let class_indexes = related_classes.iter().filter_map(|&name| class_index(name)).collect();
        let course = match details.get(initial_course) {
            Some(details) => Course::new(
                initial_course,
                class_indexes,
                details.length,
                details.climb,
                Some(details.controls.clone()),
            ),
            None => Course::new(initial_course, class_indexes, None, None, None),
        };
        courses.push(course);
    }

    courses
}
