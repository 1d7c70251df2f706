//! IOF XML result lists, versions 2.0.3 and 3.0.
//!
//! Both versions are deserialized into one set of structures whose fields
//! cover the element names of either version; [`Version`] picks the fields
//! to read.

use std::collections::HashMap;

use chrono::{DateTime, NaiveTime, Timelike};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use crate::competitor::{Competitor, CompetitorName, Gender};
use crate::course::Course;
use crate::course_class::CourseClass;
use crate::error::{Result, ResultsError};
use crate::parsers::{leading_integer, parse_course_climb, push_warning};
use crate::results::Results;
use crate::time::Time;

const V3_NAMESPACE: &str = "http://www.orienteering.org/datastandard/3.0";
const V2_DTD: &str = "IOFdata.dtd";
const FEET_PER_KILOMETRE: f64 = 3280.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Version {
    V2,
    V3,
}

// ============================================================================
// XML STRUCTURES
// ============================================================================

#[derive(Debug, Deserialize)]
struct ResultList {
    #[serde(rename = "@iofVersion")]
    iof_version: Option<String>,
    #[serde(rename = "@status")]
    status: Option<String>,
    #[serde(rename = "IOFVersion")]
    version_element: Option<VersionElement>,
    #[serde(rename = "ClassResult", default)]
    class_results: Vec<ClassResult>,
}

#[derive(Debug, Deserialize)]
struct VersionElement {
    #[serde(rename = "@version")]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClassResult {
    #[serde(rename = "Class")]
    class: Option<NamedElement>,
    #[serde(rename = "ClassShortName")]
    class_short_name: Option<String>,
    #[serde(rename = "Course", default)]
    courses: Vec<CourseElement>,
    #[serde(rename = "PersonResult", default)]
    person_results: Vec<PersonResult>,
}

#[derive(Debug, Deserialize)]
struct NamedElement {
    #[serde(rename = "Name")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CourseElement {
    #[serde(rename = "Id")]
    id: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Length")]
    length: Option<String>,
    #[serde(rename = "Climb")]
    climb: Option<String>,
    #[serde(rename = "NumberOfControls")]
    number_of_controls: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PersonResult {
    #[serde(rename = "Person")]
    person: Option<Person>,
    #[serde(rename = "Organisation")]
    organisation: Option<ShortNamed>,
    #[serde(rename = "Club")]
    club: Option<ShortNamed>,
    #[serde(rename = "Result", default)]
    results: Vec<ResultElement>,
}

#[derive(Debug, Deserialize)]
struct Person {
    #[serde(rename = "@sex")]
    sex: Option<String>,
    #[serde(rename = "Name")]
    name: Option<PersonName>,
    #[serde(rename = "PersonName")]
    person_name: Option<PersonName>,
    #[serde(rename = "BirthDate")]
    birth_date: Option<TextOrChild>,
}

#[derive(Debug, Deserialize)]
struct PersonName {
    #[serde(rename = "Family")]
    family: Option<String>,
    #[serde(rename = "Given", default)]
    given: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ShortNamed {
    #[serde(rename = "ShortName")]
    short_name: Option<String>,
}

/// An element holding either its value as text (3.0) or inside a child
/// element such as `Clock` or `Date` (2.0.3)
#[derive(Debug, Default, Deserialize)]
struct TextOrChild {
    #[serde(rename = "$text")]
    text: Option<String>,
    #[serde(rename = "Clock")]
    clock: Option<String>,
    #[serde(rename = "Date")]
    date: Option<String>,
}

impl TextOrChild {
    fn value(&self) -> &str {
        self.text
            .as_deref()
            .or(self.clock.as_deref())
            .or(self.date.as_deref())
            .unwrap_or_default()
            .trim()
    }
}

#[derive(Debug, Deserialize)]
struct ResultElement {
    #[serde(rename = "StartTime")]
    start_time: Option<TextOrChild>,
    #[serde(rename = "Time")]
    time: Option<TextOrChild>,
    #[serde(rename = "Status")]
    status: Option<String>,
    #[serde(rename = "CompetitorStatus")]
    competitor_status: Option<StatusElement>,
    #[serde(rename = "ControlCard")]
    control_card: Option<String>,
    #[serde(rename = "CCard")]
    ccard: Option<CCard>,
    #[serde(rename = "CourseLength")]
    course_length: Option<CourseLength>,
    #[serde(rename = "SplitTime", default)]
    split_times: Vec<SplitTime>,
}

#[derive(Debug, Deserialize)]
struct StatusElement {
    #[serde(rename = "@value")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CCard {
    #[serde(rename = "CCardId")]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CourseLength {
    #[serde(rename = "@unit")]
    unit: Option<String>,
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SplitTime {
    #[serde(rename = "@status")]
    status: Option<String>,
    #[serde(rename = "ControlCode")]
    control_code: Option<String>,
    #[serde(rename = "Control")]
    control: Option<ControlElement>,
    #[serde(rename = "Time")]
    time: Option<TextOrChild>,
}

#[derive(Debug, Deserialize)]
struct ControlElement {
    #[serde(rename = "ControlCode")]
    control_code: Option<String>,
}

// ============================================================================
// PARSING
// ============================================================================

/// Course details read from a class, before classes are merged into courses
#[derive(Debug, Clone)]
struct CourseDetails {
    id: Option<String>,
    name: String,
    length: Option<f64>,
    climb: Option<u32>,
    number_of_controls: Option<usize>,
}

struct ParsedClass {
    name: String,
    course: CourseDetails,
    controls: Vec<String>,
    competitors: Vec<Competitor>,
}

pub fn parse(text: &str) -> Result<Results> {
    let version = if text.contains(V3_NAMESPACE) {
        Version::V3
    } else if text.contains(V2_DTD) {
        Version::V2
    } else {
        return Err(ResultsError::wrong_format("Data apparently not of any recognised IOF XML format"));
    };

    check_root_element(text)?;
    let result_list: ResultList = quick_xml::de::from_str(text)
        .map_err(|err| ResultsError::invalid(format!("Could not read IOF XML data: {}", err)))?;
    check_version(&result_list, version)?;

    if result_list.class_results.is_empty() {
        return Err(ResultsError::invalid("No class result elements found"));
    }

    let mut warnings = Vec::new();
    let mut parsed_classes = Vec::new();
    for class_result in &result_list.class_results {
        if let Some(parsed) = read_class(class_result, version, &mut warnings)? {
            parsed_classes.push(parsed);
        }
    }

    build_results(parsed_classes, warnings)
}

/// The document must be well-formed as far as its root element, which must
/// be a `ResultList`
fn check_root_element(text: &str) -> Result<()> {
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                if name != "ResultList" {
                    return Err(ResultsError::wrong_format(format!(
                        "Root element of XML document does not have expected name 'ResultList', got '{}'",
                        name
                    )));
                }
                return Ok(());
            }
            Ok(Event::Eof) | Err(_) => return Err(ResultsError::invalid("XML data not well-formed")),
            Ok(_) => {}
        }
    }
}

fn check_version(result_list: &ResultList, version: Version) -> Result<()> {
    match version {
        Version::V3 => match result_list.iof_version.as_deref() {
            None => return Err(ResultsError::wrong_format("Could not find IOF version number")),
            Some("3.0") => {}
            Some(other) => {
                return Err(ResultsError::wrong_format(format!(
                    "Found unrecognised IOF XML data format '{}'",
                    other
                )))
            }
        },
        Version::V2 => {
            let element = result_list
                .version_element
                .as_ref()
                .ok_or_else(|| ResultsError::wrong_format("Could not find IOFVersion element"))?;
            match element.version.as_deref() {
                None => {
                    return Err(ResultsError::wrong_format(
                        "Version attribute missing from IOFVersion element",
                    ))
                }
                Some("2.0.3") => {}
                Some(other) => {
                    return Err(ResultsError::wrong_format(format!(
                        "Found unrecognised IOF XML data format '{}'",
                        other
                    )))
                }
            }
        }
    }

    match result_list.status.as_deref() {
        Some(status) if !status.eq_ignore_ascii_case("complete") => Err(ResultsError::invalid(
            "Only complete IOF data supported; snapshot and delta are not supported",
        )),
        _ => Ok(()),
    }
}

fn read_class(class_result: &ClassResult, version: Version, warnings: &mut Vec<String>) -> Result<Option<ParsedClass>> {
    let class_name = match version {
        Version::V3 => class_result.class.as_ref().and_then(|class| class.name.as_deref()),
        Version::V2 => class_result.class_short_name.as_deref(),
    }
    .map(str::trim)
    .filter(|name| !name.is_empty())
    .unwrap_or("<unnamed class>")
    .to_string();

    let mut course = match version {
        Version::V3 => read_v3_course(class_result.courses.first(), warnings),
        Version::V2 => read_v2_course(class_result, warnings),
    };

    if class_result.person_results.is_empty() {
        push_warning(warnings, format!("Class '{}' has no competitors", class_name));
        return Ok(None);
    }

    let mut class_controls: Vec<String> = Vec::new();
    let mut competitors = Vec::new();
    for (index, person_result) in class_result.person_results.iter().enumerate() {
        let Some((competitor, controls)) = read_competitor(person_result, index + 1, version, warnings)? else {
            continue;
        };

        // Until one is accepted, each competitor's controls are taken as the class's
        if competitors.is_empty() {
            class_controls = controls.clone();
            if course.number_of_controls.is_none() {
                course.number_of_controls = Some(class_controls.len());
            }
        }

        let actual_count = controls.len();
        let expected_count = course.number_of_controls.unwrap_or(class_controls.len());
        if actual_count != expected_count {
            push_warning(
                warnings,
                format!(
                    "Competitor '{}' in class '{}' has an unexpected number of controls: expected {}, actual {}",
                    competitor.full_name(),
                    class_name,
                    expected_count,
                    actual_count
                ),
            );
            continue;
        }

        let mismatch = class_controls
            .iter()
            .zip(&controls)
            .position(|(expected, actual)| expected != actual);
        if let Some(position) = mismatch {
            push_warning(
                warnings,
                format!(
                    "Competitor '{}' has an unexpected control code at control {}: expected '{}', actual '{}'",
                    competitor.full_name(),
                    position + 1,
                    class_controls[position],
                    controls[position]
                ),
            );
            continue;
        }

        competitors.push(competitor);
    }

    if course.id.is_none() && !class_controls.is_empty() {
        course.id = Some(class_controls.join(","));
    }

    Ok(Some(ParsedClass {
        name: class_name,
        course,
        controls: class_controls,
        competitors,
    }))
}

fn read_v3_course(element: Option<&CourseElement>, warnings: &mut Vec<String>) -> CourseDetails {
    let text = |field: Option<&String>| field.map(|value| value.trim().to_string()).unwrap_or_default();
    let name = text(element.and_then(|course| course.name.as_ref()));
    let id = Some(text(element.and_then(|course| course.id.as_ref()))).filter(|id| !id.is_empty());

    let length_text = text(element.and_then(|course| course.length.as_ref()));
    let length = if length_text.is_empty() {
        None
    } else {
        match leading_integer(&length_text) {
            Some(metres) => Some(metres as f64 / 1000.0),
            None => {
                push_warning(
                    warnings,
                    format!(
                        "Course '{}' specifies a course length that was not understood: '{}'",
                        name, length_text
                    ),
                );
                None
            }
        }
    };

    CourseDetails {
        climb: element.and_then(|course| course.climb.as_deref()).and_then(parse_course_climb),
        number_of_controls: element
            .and_then(|course| course.number_of_controls.as_deref())
            .and_then(leading_integer)
            .and_then(|count| usize::try_from(count).ok()),
        id,
        name,
        length,
    }
}

/// Version 2.0.3 files give no courses, so the course is named after the
/// class and its length comes from the first result
fn read_v2_course(class_result: &ClassResult, warnings: &mut Vec<String>) -> CourseDetails {
    let name = class_result.class_short_name.as_deref().unwrap_or_default().trim().to_string();
    let first_length = class_result
        .person_results
        .first()
        .and_then(|person_result| person_result.results.first())
        .and_then(|result| result.course_length.as_ref());

    let mut length = None;
    if let Some(course_length) = first_length {
        let value = course_length.value.as_deref().unwrap_or_default().trim();
        if !value.is_empty() {
            match value.parse::<f64>().ok().filter(|length| length.is_finite()) {
                Some(value) => match course_length.unit.as_deref() {
                    None | Some("m") => length = Some(value / 1000.0),
                    Some("km") => length = Some(value),
                    Some("ft") => length = Some(value / FEET_PER_KILOMETRE),
                    Some(unit) => push_warning(
                        warnings,
                        format!(
                            "Course '{}' gives its length in a unit '{}', but this unit was not recognised",
                            name, unit
                        ),
                    ),
                },
                None => push_warning(
                    warnings,
                    format!(
                        "Course '{}' specifies a course length that was not understood: '{}'",
                        name, value
                    ),
                ),
            }
        }
    }

    CourseDetails {
        id: None,
        name,
        length,
        climb: None,
        number_of_controls: None,
    }
}

/// Returns the competitor and the control codes they visited, or `None` if
/// the competitor was skipped with a warning
fn read_competitor(
    person_result: &PersonResult,
    order: usize,
    version: Version,
    warnings: &mut Vec<String>,
) -> Result<Option<(Competitor, Vec<String>)>> {
    let person = person_result.person.as_ref();
    let name_element = person.and_then(|person| match version {
        Version::V3 => person.name.as_ref(),
        Version::V2 => person.person_name.as_ref(),
    });
    let forename = name_element.map(|name| name.given.join(" ")).unwrap_or_default();
    let surname = name_element.and_then(|name| name.family.clone()).unwrap_or_default();
    let name = CompetitorName::new(forename, surname);
    if name.forename.is_empty() && name.surname.is_empty() {
        push_warning(warnings, "Could not find a name for a competitor".to_string());
        return Ok(None);
    }

    let club = match version {
        Version::V3 => person_result.organisation.as_ref(),
        Version::V2 => person_result.club.as_ref(),
    }
    .and_then(|club| club.short_name.clone())
    .unwrap_or_default();

    let Some(result) = person_result.results.first() else {
        push_warning(
            warnings,
            format!("Could not find any result information for competitor '{}'", name.full_name()),
        );
        return Ok(None);
    };

    let start_time = result.start_time.as_ref().and_then(|start| match version {
        Version::V3 => parse_iso_start_time(start.value()),
        Version::V2 => Time::parse(start.value()),
    });
    let total_time = result.time.as_ref().and_then(|time| read_time(time.value(), version));

    let mut controls = Vec::new();
    let mut cum_times = vec![Some(Time::ZERO)];
    for split in &result.split_times {
        let status = split.status.as_deref();
        if version == Version::V3 && status == Some("Additional") {
            continue;
        }
        let code = split
            .control_code
            .as_deref()
            .or_else(|| split.control.as_ref().and_then(|control| control.control_code.as_deref()))
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .ok_or_else(|| ResultsError::invalid("Control code missing for control"))?;
        let time = if version == Version::V3 && status == Some("Missing") {
            None
        } else {
            split.time.as_ref().and_then(|time| read_time(time.value(), version))
        };
        controls.push(code.to_string());
        cum_times.push(time);
    }
    cum_times.push(total_time);

    let mut competitor = Competitor::from_original_cum_times(order, name, club, start_time, cum_times);
    competitor.year_of_birth = person
        .and_then(|person| person.birth_date.as_ref())
        .and_then(|birth_date| read_year(birth_date.value()));
    competitor.gender = person.and_then(|person| person.sex.as_deref()).and_then(Gender::from_code);
    competitor.ecard_id = match version {
        Version::V3 => result.control_card.clone(),
        Version::V2 => result.ccard.as_ref().and_then(|card| card.id.clone()),
    }
    .map(|card| card.trim().to_string())
    .filter(|card| !card.is_empty());

    let status = match version {
        Version::V3 => result.status.as_deref(),
        Version::V2 => result.competitor_status.as_ref().and_then(|status| status.value.as_deref()),
    };
    match status.map(str::trim) {
        Some("NotCompeting") => competitor.set_non_competitive(),
        Some("DidNotStart") => competitor.set_non_starter(),
        Some("DidNotFinish") => competitor.set_non_finisher(),
        Some("Disqualified") => competitor.disqualify(),
        Some("OverTime") => competitor.set_over_max_time(),
        _ => {}
    }

    Ok(Some((competitor, controls)))
}

/// Version 3.0 gives times in seconds, possibly fractional
fn read_time(text: &str, version: Version) -> Option<Time> {
    match version {
        Version::V3 => text.parse::<f64>().ok().and_then(Time::from_secs_f64),
        Version::V2 => Time::parse(text),
    }
}

fn read_year(text: &str) -> Option<i32> {
    text.get(..4)
        .filter(|year| year.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|year| year.parse().ok())
}

/// Reads the time of day of an ISO 8601 date and time, as written (no
/// adjustment for the offset). Basic format and times without seconds are
/// accepted too.
fn parse_iso_start_time(text: &str) -> Option<Time> {
    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Some(seconds_from_midnight(date_time.time()));
    }

    let (date, time) = text.split_once('T')?;
    let date_digits = date.replace('-', "");
    if date_digits.len() != 8 || !date_digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let digits: String = time
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ':')
        .filter(char::is_ascii_digit)
        .collect();
    let field = |range: std::ops::Range<usize>| digits.get(range).and_then(|value| value.parse::<u32>().ok());
    let seconds = if digits.len() >= 6 { field(4..6)? } else { 0 };
    let time = NaiveTime::from_hms_opt(field(0..2)?, field(2..4)?, seconds)?;
    Some(seconds_from_midnight(time))
}

fn seconds_from_midnight(time: NaiveTime) -> Time {
    Time::from_secs(i64::from(time.num_seconds_from_midnight()))
}

/// Classes whose course has the same id and controls share a course; classes
/// whose course has no id always get their own
fn build_results(parsed_classes: Vec<ParsedClass>, warnings: Vec<String>) -> Result<Results> {
    let mut classes = Vec::with_capacity(parsed_classes.len());
    let mut courses: Vec<Course> = Vec::new();
    let mut course_lookup: HashMap<String, usize> = HashMap::new();

    for (class_index, parsed) in parsed_classes.into_iter().enumerate() {
        let key = parsed
            .course
            .id
            .as_ref()
            .map(|id| format!("{},{}", id, parsed.controls.join(",")));

        match key.as_ref().and_then(|key| course_lookup.get(key)) {
            Some(&course_index) => courses[course_index].classes.push(class_index),
            None => {
                if let Some(key) = key {
                    course_lookup.insert(key, courses.len());
                }
                courses.push(Course::new(
                    parsed.course.name.clone(),
                    vec![class_index],
                    parsed.course.length,
                    parsed.course.climb,
                    Some(parsed.controls.clone()),
                ));
            }
        }

        classes.push(CourseClass::new(parsed.name, parsed.controls.len(), parsed.competitors)?);
    }

    Ok(Results::new(classes, courses, warnings))
}
