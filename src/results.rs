use serde::Serialize;

use crate::competitor::Competitor;
use crate::course::{ControlCode, Course};
use crate::course_class::{CompetitorAtControl, CourseClass};
use crate::course_class_set::CourseClassSet;
use crate::error::{Result, ResultsError};
use crate::repairer::Repairer;
use crate::time::Time;

/// A split on a leg, tagged with who ran it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegSplit {
    pub name: String,
    pub class_name: String,
    pub split: Time,
}

/// The controls that follow a control on one course
#[derive(Debug, Clone, PartialEq)]
pub struct NextControls {
    pub course: usize,
    pub next_controls: Vec<ControlCode>,
}

// ============================================================================
// RESULTS
// ============================================================================

/// Everything loaded from one results file
#[derive(Debug, Clone, Default)]
pub struct Results {
    pub classes: Vec<CourseClass>,
    pub courses: Vec<Course>,
    pub warnings: Vec<String>,
}

impl Results {
    /// Creates the results and links each class to the course listing it
    pub fn new(mut classes: Vec<CourseClass>, courses: Vec<Course>, warnings: Vec<String>) -> Results {
        for (course_index, course) in courses.iter().enumerate() {
            for &class_index in &course.classes {
                if let Some(class) = classes.get_mut(class_index) {
                    class.course = Some(course_index);
                }
            }
        }
        Results {
            classes,
            courses,
            warnings,
        }
    }

    pub fn all_competitors(&self) -> impl Iterator<Item = &Competitor> {
        self.classes.iter().flat_map(|class| class.competitors.iter())
    }

    pub fn competitor_count(&self) -> usize {
        self.classes.iter().map(|class| class.competitors.len()).sum()
    }

    pub fn class_index(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|class| class.name == name)
    }

    pub fn course_of(&self, class_index: usize) -> Option<&Course> {
        self.classes
            .get(class_index)
            .and_then(|class| class.course)
            .and_then(|course| self.courses.get(course))
    }

    /// Whether any competitor has non-ascending original times
    pub fn needs_repair(&self) -> bool {
        Repairer::default().needs_repair(self)
    }

    /// Ranks every class and stores the ranks on its competitors
    pub fn compute_ranks(&mut self) {
        for class in &mut self.classes {
            class.compute_ranks();
        }
    }

    pub fn determine_time_losses(&mut self) {
        for class in &mut self.classes {
            class.determine_time_losses();
        }
    }

    /// Read-only ranking view over the given classes
    pub fn course_class_set(&self, class_indexes: &[usize]) -> Result<CourseClassSet<'_>> {
        let classes = class_indexes
            .iter()
            .map(|&index| {
                self.classes
                    .get(index)
                    .ok_or_else(|| ResultsError::invalid(format!("No class with index {}", index)))
            })
            .collect::<Result<Vec<_>>>()?;
        CourseClassSet::new(classes)
    }

    // ------------------------------------------------------------------------
    // Cross-course queries
    // ------------------------------------------------------------------------

    /// Every split on the given leg across all courses, fastest first
    pub fn fastest_splits_for_leg(&self, start: &ControlCode, end: &ControlCode) -> Vec<LegSplit> {
        let mut splits: Vec<LegSplit> = Vec::new();
        for course in &self.courses {
            let Some(leg) = course.leg_number(start, end) else {
                continue;
            };
            for class in course.classes.iter().filter_map(|&c| self.classes.get(c)) {
                for competitor in &class.competitors {
                    if competitor.completed() && !competitor.is_split_time_dubious(leg) {
                        if let Some(split) = competitor.split_time_to(leg) {
                            splits.push(LegSplit {
                                name: competitor.full_name(),
                                class_name: class.name.clone(),
                                split,
                            });
                        }
                    }
                }
            }
        }
        splits.sort_by(|a, b| a.split.cmp(&b.split).then_with(|| a.name.cmp(&b.name)));
        splits
    }

    /// Competitors at the given control between two times of day, across all courses
    pub fn competitors_at_control_in_time_range(
        &self,
        code: &ControlCode,
        from: Time,
        to: Time,
    ) -> Vec<CompetitorAtControl> {
        let mut found = Vec::new();
        for course in &self.courses {
            let controls: Vec<usize> = match code {
                ControlCode::Start => vec![0],
                ControlCode::Finish => match &course.controls {
                    Some(controls) => vec![controls.len() + 1],
                    None => continue,
                },
                ControlCode::Control(code) => match &course.controls {
                    Some(controls) => controls
                        .iter()
                        .enumerate()
                        .filter(|(_, c)| *c == code)
                        .map(|(i, _)| i + 1)
                        .collect(),
                    None => continue,
                },
            };
            for class in course.classes.iter().filter_map(|&c| self.classes.get(c)) {
                for &control in &controls {
                    if let Ok(mut at_control) = class.competitors_at_control_in_time_range(control, from, to) {
                        found.append(&mut at_control);
                    }
                }
            }
        }
        found.sort_by(|a, b| a.time.cmp(&b.time));
        found
    }

    /// For each course visiting `code`, the controls that can follow it
    pub fn next_controls_after(&self, code: &ControlCode) -> Vec<NextControls> {
        self.courses
            .iter()
            .enumerate()
            .filter_map(|(index, course)| {
                course.next_controls(code).ok().map(|next_controls| NextControls {
                    course: index,
                    next_controls,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Searches
    // ------------------------------------------------------------------------

    /// Competitors whose surname, forename or club equals the search text,
    /// or starts with it when the text is longer than one character.
    /// Sorted by forename.
    pub fn find_competitors(&self, text: &str) -> Vec<&Competitor> {
        let Some(search) = Search::new(text) else {
            return Vec::new();
        };
        let mut found: Vec<&Competitor> = self
            .all_competitors()
            .filter(|c| search.matches(&c.name.surname) || search.matches(&c.name.forename) || search.matches(&c.club))
            .collect();
        found.sort_by(|a, b| a.name.forename.cmp(&b.name.forename));
        found
    }

    pub fn find_course_classes(&self, text: &str) -> Vec<&CourseClass> {
        match Search::new(text) {
            Some(search) => self.classes.iter().filter(|c| search.matches(&c.name)).collect(),
            None => Vec::new(),
        }
    }

    pub fn find_courses(&self, text: &str) -> Vec<&Course> {
        match Search::new(text) {
            Some(search) => self.courses.iter().filter(|c| search.matches(&c.name)).collect(),
            None => Vec::new(),
        }
    }

    pub fn find_competitor_by_ecard(&self, ecard_id: &str) -> Option<&Competitor> {
        self.all_competitors()
            .find(|c| c.ecard_id.as_deref() == Some(ecard_id))
    }
}

/// Case-insensitive exact-or-prefix matcher
struct Search {
    text: String,
    allow_prefix: bool,
}

impl Search {
    fn new(text: &str) -> Option<Search> {
        if text.trim().is_empty() {
            return None;
        }
        Some(Search {
            text: text.to_lowercase(),
            allow_prefix: text.chars().count() > 1,
        })
    }

    fn matches(&self, value: &str) -> bool {
        let value = value.to_lowercase();
        value == self.text || (self.allow_prefix && value.starts_with(&self.text))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::competitor::CompetitorName;

    fn competitor(order: usize, forename: &str, surname: &str, club: &str, cum: &[i64]) -> Competitor {
        let times = cum.iter().map(|&v| Some(Time::from_secs(v))).collect();
        let mut comp = Competitor::from_original_cum_times(
            order,
            CompetitorName::new(forename, surname),
            club,
            Some(Time::from_secs(36000 + 60 * order as i64)),
            times,
        );
        comp.ecard_id = Some(format!("{}", 1000 + order));
        comp
    }

    fn results() -> Results {
        let m21 = CourseClass::new(
            "M21",
            2,
            vec![
                competitor(1, "John", "Smith", "ABC", &[0, 65, 221, 300]),
                competitor(2, "Fred", "Baker", "DEF", &[0, 70, 200, 290]),
            ],
        )
        .unwrap();
        let w21 = CourseClass::new("W21", 2, vec![competitor(3, "Jane", "Smythe", "ABC", &[0, 60, 230, 320])]).unwrap();
        let m40 = CourseClass::new("M40", 1, vec![competitor(4, "Bill", "Jones", "GHI", &[0, 100, 190])]).unwrap();

        let long = Course::new("Long", vec![0, 1], Some(4.1), Some(140), Some(vec!["212".into(), "229".into()]));
        let short = Course::new("Short", vec![2], Some(2.0), None, Some(vec!["229".into()]));
        Results::new(vec![m21, w21, m40], vec![long, short], Vec::new())
    }

    #[test]
    fn test_classes_linked_to_courses() {
        let results = results();
        assert_eq!(results.classes[1].course, Some(0));
        assert_eq!(results.classes[2].course, Some(1));
        assert_eq!(results.course_of(2).map(|c| c.name.as_str()), Some("Short"));
        assert_eq!(results.competitor_count(), 4);
    }

    #[test]
    fn test_fastest_splits_for_leg_across_courses() {
        let results = results();
        let splits = results.fastest_splits_for_leg(&ControlCode::control("229"), &ControlCode::Finish);
        let summary: Vec<(&str, i64)> = splits.iter().map(|s| (s.name.as_str(), s.split.hundredths() / 100)).collect();
        assert_eq!(
            summary,
            vec![("John Smith", 79), ("Bill Jones", 90), ("Fred Baker", 90), ("Jane Smythe", 90)]
        );
    }

    #[test]
    fn test_competitors_at_control() {
        let results = results();
        let found = results.competitors_at_control_in_time_range(
            &ControlCode::control("229"),
            Time::from_secs(36200),
            Time::from_secs(36400),
        );
        let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["John Smith", "Fred Baker", "Bill Jones"]);
    }

    #[test]
    fn test_next_controls_after() {
        let results = results();
        let next = results.next_controls_after(&ControlCode::control("229"));
        assert_eq!(next.len(), 2);
        assert_eq!(next[0].next_controls, vec![ControlCode::Finish]);
    }

    #[test]
    fn test_searches() {
        let results = results();
        let names: Vec<String> = results.find_competitors("sm").iter().map(|c| c.full_name()).collect();
        assert_eq!(names, vec!["Jane Smythe", "John Smith"]);
        assert_eq!(results.find_competitors("abc").len(), 2);
        assert!(results.find_competitors("s").is_empty());
        assert!(results.find_competitors("  ").is_empty());

        assert_eq!(results.find_course_classes("m").len(), 0);
        assert_eq!(results.find_course_classes("m21").len(), 1);
        assert_eq!(results.find_courses("lo").len(), 1);
        assert_eq!(
            results.find_competitor_by_ecard("1002").map(|c| c.full_name()),
            Some("Fred Baker".to_string())
        );
    }

    #[test]
    fn test_course_class_set_rejects_bad_index() {
        let results = results();
        assert!(results.course_class_set(&[0, 7]).is_err());
        assert!(results.course_class_set(&[0, 1]).is_ok());
    }
}
