//! Repair of cumulative times that fail to increase, usually from a control
//! punched out of order or a misread card.

use tracing::{debug, warn};

use crate::competitor::Competitor;
use crate::course_class::CourseClass;
use crate::results::Results;
use crate::time::Time;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// How a removed time is placed between its known neighbours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Evenly by control index
    Uniform,
    /// In proportion to leg lengths where the course has them, else uniformly
    LegDistance,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepairConfig {
    pub interpolation: Interpolation,
    /// Treat a finish time equal to the last control's time as valid
    pub allow_equal_finish: bool,
    /// A non-finisher's finish this far or more before the last control is discarded
    pub remove_finish_threshold: Time,
}

impl Default for RepairConfig {
    fn default() -> Self {
        RepairConfig {
            interpolation: Interpolation::LegDistance,
            allow_equal_finish: true,
            remove_finish_threshold: Time::from_mins(5),
        }
    }
}

/// Repaired times for one competitor
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedTimes {
    pub cum_times: Vec<Option<Time>>,
    pub dubious: Vec<bool>,
}

impl RepairedTimes {
    pub fn changed_controls(&self) -> Vec<usize> {
        self.dubious
            .iter()
            .enumerate()
            .filter_map(|(i, &d)| d.then_some(i))
            .collect()
    }
}

// ============================================================================
// REPAIRER
// ============================================================================

/// Detects and corrects cumulative times that fail to increase.
///
/// Every pass starts from the original readings, so repairing twice gives
/// the same result as repairing once. Status flags are never touched and a
/// finish time is never invented.
#[derive(Debug, Clone, Default)]
pub struct Repairer {
    config: RepairConfig,
}

impl Repairer {
    pub fn new(config: RepairConfig) -> Self {
        Repairer { config }
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    pub fn needs_repair(&self, results: &Results) -> bool {
        results
            .all_competitors()
            .any(|c| c.has_non_ascending_times(self.config.allow_equal_finish))
    }

    /// Repairs every class in place. Returns a note per repaired competitor,
    /// also recorded in the results' warnings (once, however often repaired).
    pub fn repair(&self, results: &mut Results) -> Vec<String> {
        let mut notes = Vec::new();
        for class_index in 0..results.classes.len() {
            let leg_lengths = results
                .course_of(class_index)
                .and_then(|course| course.leg_lengths.clone());
            let class = &mut results.classes[class_index];
            notes.extend(self.repair_class(class, leg_lengths.as_deref()));
        }
        for note in &notes {
            if !results.warnings.contains(note) {
                warn!("{}", note);
                results.warnings.push(note.clone());
            }
        }
        notes
    }

    /// Puts every competitor back on their original times, so that ranks,
    /// reference times and charts computed afterwards all use the data as read
    pub fn restore_original_times(results: &mut Results) {
        for competitor in results.classes.iter_mut().flat_map(|class| class.competitors.iter_mut()) {
            competitor.use_original_times();
        }
    }

    pub fn repair_class(&self, class: &mut CourseClass, leg_lengths: Option<&[f64]>) -> Vec<String> {
        let mut notes = Vec::new();
        let mut any_changes = false;
        let class_name = class.name.clone();

        for competitor in &mut class.competitors {
            let repaired = self.repair_competitor(competitor, leg_lengths);
            let changed = repaired.changed_controls();
            if !changed.is_empty() {
                any_changes = true;
                let controls: Vec<String> = changed.iter().map(|c| c.to_string()).collect();
                debug!(
                    competitor = %competitor.full_name(),
                    class = %class_name,
                    controls = %controls.join(","),
                    "repaired non-ascending times"
                );
                notes.push(format!(
                    "Competitor '{}' in class '{}' has dubious times at control(s) {}",
                    competitor.full_name(),
                    class_name,
                    controls.join(", ")
                ));
            }
            competitor.set_repaired_cum_times(repaired.cum_times, repaired.dubious);
        }

        if any_changes {
            class.record_has_dubious_data();
        }
        notes
    }

    /// Computes repaired times for one competitor without modifying it
    pub fn repair_competitor(&self, competitor: &Competitor, leg_lengths: Option<&[f64]>) -> RepairedTimes {
        let original = competitor.original_cum_times();
        let mut working: Vec<Option<Time>> = original.to_vec();
        let mut dubious = vec![false; working.len()];
        if working.len() < 2 {
            return RepairedTimes { cum_times: working, dubious };
        }
        let finish = working.len() - 1;
        let completed = competitor.completed();

        remove_times_equal_to_previous(&mut working, &mut dubious);
        if !completed {
            self.remove_absurd_finish(&mut working, &mut dubious);
        }
        self.remove_non_ascending(&mut working, &mut dubious, completed);

        let positions = control_positions(finish, leg_lengths, self.config.interpolation);
        interpolate_dubious(&mut working, &dubious, &positions);

        RepairedTimes {
            cum_times: working,
            dubious,
        }
    }

    fn remove_absurd_finish(&self, times: &mut [Option<Time>], dubious: &mut [bool]) {
        let finish = times.len() - 1;
        if finish < 2 {
            return;
        }
        if let (Some(finish_time), Some(last_control)) = (times[finish], times[finish - 1]) {
            if finish_time <= last_control - self.config.remove_finish_threshold {
                remove(times, dubious, finish);
            }
        }
    }

    /// Repeatedly removes times around the first non-ascending pair until the
    /// known times ascend.
    fn remove_non_ascending(&self, times: &mut Vec<Option<Time>>, dubious: &mut [bool], completed: bool) {
        let finish = times.len() - 1;
        let allow_equal_finish = self.config.allow_equal_finish;

        while let Some((first, second)) = first_non_ascending(times, allow_equal_finish) {
            let second_removable = !(second == finish && completed);
            let mut attempts: Vec<Vec<usize>> = Vec::new();
            if second_removable {
                attempts.push(vec![second]);
            }
            if first > 0 {
                attempts.push(vec![first]);
            }
            if first > 1 && times[first - 1].is_some() {
                attempts.push(vec![first, first - 1]);
            }

            let progressed = attempts.iter().find(|indexes| {
                let mut trial = times.clone();
                for &i in indexes.iter() {
                    trial[i] = None;
                }
                match first_non_ascending(&trial, allow_equal_finish) {
                    None => true,
                    Some((next_first, _)) => next_first > second,
                }
            });

            let indexes = match progressed {
                Some(indexes) => indexes.clone(),
                // No attempt clears the problem; drop one time so the loop always advances
                None if second_removable || first == 0 => vec![second],
                None => vec![first],
            };
            for i in indexes {
                remove(times, dubious, i);
            }
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn remove(times: &mut [Option<Time>], dubious: &mut [bool], index: usize) {
    times[index] = None;
    dubious[index] = true;
}

/// Marks intermediate times equal to the previous known time as dubious
fn remove_times_equal_to_previous(times: &mut [Option<Time>], dubious: &mut [bool]) {
    let mut last = times[0];
    for index in 1..times.len() - 1 {
        match times[index] {
            Some(time) if Some(time) == last => remove(times, dubious, index),
            Some(time) => last = Some(time),
            None => {}
        }
    }
}

/// First pair of known times (by index) where the second does not exceed the first
fn first_non_ascending(times: &[Option<Time>], allow_equal_finish: bool) -> Option<(usize, usize)> {
    let finish = times.len() - 1;
    let mut last_known = 0;
    for index in 1..times.len() {
        if let Some(time) = times[index] {
            let previous = times[last_known].unwrap_or(Time::ZERO);
            let equal_ok = allow_equal_finish && index == finish;
            if time < previous || (time == previous && !equal_ok) {
                return Some((last_known, index));
            }
            last_known = index;
        }
    }
    None
}

/// Position of each control along the course: cumulative leg length, or the
/// control index when leg lengths are unavailable or unusable.
fn control_positions(finish: usize, leg_lengths: Option<&[f64]>, interpolation: Interpolation) -> Vec<f64> {
    let usable = leg_lengths.filter(|legs| {
        interpolation == Interpolation::LegDistance
            && legs.len() == finish
            && legs.iter().all(|&l| l.is_finite() && l > 0.0)
    });
    match usable {
        Some(legs) => {
            let mut positions = vec![0.0];
            let mut total = 0.0;
            for leg in legs {
                total += leg;
                positions.push(total);
            }
            positions
        }
        None => (0..=finish).map(|i| i as f64).collect(),
    }
}

/// Fills dubious intermediate times between their nearest known neighbours,
/// or extrapolates at the competitor's average pace when nothing known
/// follows. Results that would not lie strictly between the neighbours stay
/// unknown. The finish is never filled.
fn interpolate_dubious(times: &mut [Option<Time>], dubious: &[bool], positions: &[f64]) {
    let finish = times.len() - 1;
    let known: Vec<(usize, Time)> = times
        .iter()
        .enumerate()
        .filter_map(|(i, t)| t.map(|t| (i, t)))
        .collect();

    for index in 1..finish {
        if !dubious[index] {
            continue;
        }
        let left = known.iter().rev().find(|(i, _)| *i < index).copied();
        let right = known.iter().find(|(i, _)| *i > index).copied();

        let estimate = match (left, right) {
            (Some((l, lt)), Some((r, rt))) => {
                let fraction = (positions[index] - positions[l]) / (positions[r] - positions[l]);
                let value = lt + (rt - lt).scale(fraction);
                (lt < value && value < rt).then_some(value)
            }
            (Some((l, lt)), None) if l > 0 && lt.is_positive() => {
                let pace = lt.as_secs_f64() / positions[l];
                Time::from_secs_f64(lt.as_secs_f64() + pace * (positions[index] - positions[l]))
                    .filter(|value| *value > lt)
            }
            _ => None,
        };
        times[index] = estimate;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::competitor::CompetitorName;

    fn secs(values: &[Option<i64>]) -> Vec<Option<Time>> {
        values.iter().map(|v| v.map(Time::from_secs)).collect()
    }

    fn competitor(cum: &[Option<i64>]) -> Competitor {
        Competitor::from_original_cum_times(1, CompetitorName::new("A", "B"), "", None, secs(cum))
    }

    #[test]
    fn test_clean_times_untouched() {
        let comp = competitor(&[Some(0), Some(65), Some(221), Some(300)]);
        let repaired = Repairer::default().repair_competitor(&comp, None);
        assert_eq!(repaired.cum_times, comp.original_cum_times());
        assert!(repaired.changed_controls().is_empty());
    }

    #[test]
    fn test_single_bad_control_interpolated() {
        // Control 3 earlier than control 2
        let comp = competitor(&[Some(0), Some(100), Some(200), Some(150), Some(400), Some(500)]);
        let repaired = Repairer::default().repair_competitor(&comp, None);
        assert_eq!(repaired.changed_controls(), vec![3]);
        assert_eq!(repaired.cum_times[3], Some(Time::from_secs(300)));
    }

    #[test]
    fn test_equal_intermediate_times_removed() {
        let comp = competitor(&[Some(0), Some(100), Some(100), Some(300)]);
        let repaired = Repairer::default().repair_competitor(&comp, None);
        assert_eq!(repaired.changed_controls(), vec![2]);
        assert_eq!(repaired.cum_times[2], Some(Time::from_secs(200)));
    }

    #[test]
    fn test_equal_finish_allowed_by_default() {
        let comp = competitor(&[Some(0), Some(100), Some(200), Some(200)]);
        let repaired = Repairer::default().repair_competitor(&comp, None);
        assert!(repaired.changed_controls().is_empty());

        let strict = Repairer::new(RepairConfig {
            allow_equal_finish: false,
            ..RepairConfig::default()
        });
        let repaired = strict.repair_competitor(&comp, None);
        // The completer keeps their finish; the last control goes instead
        assert_eq!(repaired.changed_controls(), vec![2]);
        assert_eq!(repaired.cum_times[3], Some(Time::from_secs(200)));
        assert_eq!(repaired.cum_times[2], Some(Time::from_secs(150)));
    }

    #[test]
    fn test_leg_distance_interpolation() {
        let comp = competitor(&[Some(0), Some(100), Some(50), Some(400)]);
        let legs = [1.0, 1.0, 3.0];
        let repaired = Repairer::default().repair_competitor(&comp, Some(&legs));
        // Control 2 sits a quarter of the way from control 1 to the finish
        assert_eq!(repaired.cum_times[2], Some(Time::from_secs(175)));

        let uniform = Repairer::new(RepairConfig {
            interpolation: Interpolation::Uniform,
            ..RepairConfig::default()
        });
        let repaired = uniform.repair_competitor(&comp, Some(&legs));
        assert_eq!(repaired.cum_times[2], Some(Time::from_secs(250)));
    }

    #[test]
    fn test_non_finisher_finish_never_fabricated() {
        // Mispunched at control 2, finish far too early
        let mut comp = competitor(&[Some(0), Some(100), None, Some(900), Some(200)]);
        comp.set_non_finisher();
        let repaired = Repairer::default().repair_competitor(&comp, None);
        assert_eq!(repaired.cum_times[4], None);
        assert!(repaired.dubious[4]);
        assert_eq!(repaired.cum_times[2], None);
        assert!(!comp.is_disqualified());
        assert!(comp.is_non_finisher());
    }

    #[test]
    fn test_trailing_dubious_run_extrapolated() {
        let mut comp = competitor(&[Some(0), Some(100), Some(200), Some(150), None]);
        comp.set_non_finisher();
        let repaired = Repairer::default().repair_competitor(&comp, None);
        assert_eq!(repaired.changed_controls(), vec![3]);
        // Average pace 100 s per control
        assert_eq!(repaired.cum_times[3], Some(Time::from_secs(300)));
        assert_eq!(repaired.cum_times[4], None);
    }

    #[test]
    fn test_repair_is_idempotent_and_flags_class() {
        let comp = competitor(&[Some(0), Some(100), Some(90), Some(300)]);
        let mut class = CourseClass::new("M21", 2, vec![comp]).unwrap();
        let repairer = Repairer::default();

        let notes = repairer.repair_class(&mut class, None);
        assert_eq!(notes.len(), 1);
        assert!(class.has_dubious_data);
        let once = class.competitors[0].cum_times().to_vec();

        repairer.repair_class(&mut class, None);
        assert_eq!(class.competitors[0].cum_times(), once.as_slice());
        assert_eq!(class.competitors[0].original_cum_times(), secs(&[Some(0), Some(100), Some(90), Some(300)]).as_slice());
    }

    #[test]
    fn test_repair_results_uses_course_leg_lengths() {
        use crate::course::Course;

        let class = CourseClass::new("W21", 2, vec![competitor(&[Some(0), Some(100), Some(50), Some(400)])]).unwrap();
        let mut course = Course::new("Long", vec![0], None, None, Some(vec!["101".into(), "102".into()]));
        course.set_leg_lengths(vec![1.0, 1.0, 3.0]).unwrap();
        let mut results = Results::new(vec![class], vec![course], Vec::new());
        assert!(results.needs_repair());

        let repairer = Repairer::default();
        repairer.repair(&mut results);
        repairer.repair(&mut results);
        assert_eq!(results.classes[0].competitors[0].cumulative_time_to(2), Some(Time::from_secs(175)));
        assert_eq!(results.warnings.len(), 1);
    }

    #[test]
    fn test_repaired_times_strictly_ascend() {
        let cases: Vec<Vec<Option<i64>>> = vec![
            vec![Some(0), Some(300), Some(100), Some(200), Some(400), Some(500)],
            vec![Some(0), Some(100), Some(90), Some(80), Some(70), Some(500)],
            vec![Some(0), Some(50), Some(40), None, Some(30), Some(600)],
            vec![Some(0), Some(500), Some(100), Some(200), Some(300), Some(400)],
        ];
        for cum in cases {
            let comp = competitor(&cum);
            let repaired = Repairer::default().repair_competitor(&comp, None);
            let known: Vec<Time> = repaired.cum_times.iter().flatten().copied().collect();
            assert!(known.windows(2).all(|w| w[0] < w[1]), "{:?} -> {:?}", cum, repaired.cum_times);
        }
    }

    #[test]
    fn test_restore_original_times() {
        let class = CourseClass::new("M21", 2, vec![competitor(&[Some(0), Some(100), Some(90), Some(300)])]).unwrap();
        let mut results = Results::new(vec![class], Vec::new(), Vec::new());
        Repairer::default().repair(&mut results);
        assert_eq!(results.classes[0].competitors[0].cumulative_time_to(2), Some(Time::from_secs(200)));

        Repairer::restore_original_times(&mut results);
        let comp = &results.classes[0].competitors[0];
        assert_eq!(comp.cumulative_time_to(2), Some(Time::from_secs(90)));
        assert!(!comp.has_dubious_times());
        // Repairing again starts from the originals
        Repairer::default().repair(&mut results);
        assert_eq!(results.classes[0].competitors[0].cumulative_time_to(2), Some(Time::from_secs(200)));
    }
}
