//! Ranking and charting over one or more classes that run the same course.
//!
//! A [`CourseClassSet`] borrows its classes and merges their competitors, so
//! split and cumulative ranks, overall positions and reference times are
//! worked out across everyone on the course rather than per class.

use crate::chart::{extent, ChartData, ChartType, DataColumn, DubiousRange};
use crate::competitor::Competitor;
use crate::course_class::CourseClass;
use crate::error::{Result, ResultsError};
use crate::ranking::{compute_rank_table, positions, RankTable};
use crate::results::LegSplit;
use crate::time::{to_minutes, Time};

/// Default split for a leg nobody has a time for
const DEFAULT_LEG_SPLIT: Time = Time::from_mins(3);
/// Default split for the last leg when nobody has a time for it
const DEFAULT_FINISH_SPLIT: Time = Time::from_mins(1);

/// Y range used when there is nothing to plot
const EMPTY_Y_EXTENT: (f64, f64) = (0.0, 60.0);

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// A competitor in the set, tagged with the position of their class
#[derive(Debug, Clone, Copy)]
struct Member<'a> {
    competitor: &'a Competitor,
    class: usize,
}

/// A run of unknown values between two known ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlankRange {
    start: usize,
    end: usize,
}

/// Read-only view over one or more classes that share a course.
///
/// Competitors from every class are merged into one list (non-starters
/// left out) in result order, and all indexes taken or returned by this
/// type refer to that list. Ranks are computed across the whole set and held
/// here; the classes themselves are never modified.
#[derive(Debug, Clone)]
pub struct CourseClassSet<'a> {
    classes: Vec<&'a CourseClass>,
    members: Vec<Member<'a>>,
    num_controls: usize,
    ranks: RankTable,
    positions: Vec<Option<u32>>,
}

impl<'a> CourseClassSet<'a> {
    /// Fails if the classes differ in control count or course
    pub fn new(classes: Vec<&'a CourseClass>) -> Result<CourseClassSet<'a>> {
        let num_controls = classes.first().map_or(0, |class| class.num_controls);
        if let Some(first) = classes.first() {
            for class in &classes[1..] {
                if class.num_controls != first.num_controls {
                    return Err(ResultsError::invalid(format!(
                        "Cannot merge classes with {} and {} controls",
                        first.num_controls, class.num_controls
                    )));
                }
                if class.course != first.course {
                    return Err(ResultsError::invalid(format!(
                        "Classes '{}' and '{}' are not on the same course",
                        first.name, class.name
                    )));
                }
            }
        }

        let mut members: Vec<Member<'a>> = classes
            .iter()
            .enumerate()
            .flat_map(|(class, course_class)| {
                course_class
                    .competitors
                    .iter()
                    .filter(|c| !c.is_non_starter())
                    .map(move |competitor| Member { competitor, class })
            })
            .collect();
        members.sort_by(|a, b| Competitor::compare(a.competitor, b.competitor));

        let competitors: Vec<&Competitor> = members.iter().map(|m| m.competitor).collect();
        let ranks = compute_rank_table(&competitors, num_controls);
        let positions = positions(&competitors);

        Ok(CourseClassSet {
            classes,
            members,
            num_controls,
            ranks,
            positions,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn num_controls(&self) -> usize {
        self.num_controls
    }

    pub fn classes(&self) -> &[&'a CourseClass] {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Course index shared by the classes
    pub fn course(&self) -> Option<usize> {
        self.classes.first().and_then(|class| class.course)
    }

    pub fn primary_class_name(&self) -> Option<&str> {
        self.classes.first().map(|class| class.name.as_str())
    }

    pub fn has_dubious_data(&self) -> bool {
        self.classes.iter().any(|class| class.has_dubious_data)
    }

    pub fn competitors(&self) -> impl Iterator<Item = &'a Competitor> + '_ {
        self.members.iter().map(|m| m.competitor)
    }

    pub fn competitor(&self, index: usize) -> Option<&'a Competitor> {
        self.members.get(index).map(|m| m.competitor)
    }

    /// Name of the class the competitor at `index` entered
    pub fn class_name_of(&self, index: usize) -> Option<&'a str> {
        self.members.get(index).map(|m| {
            let class: &'a CourseClass = self.classes[m.class];
            class.name.as_str()
        })
    }

    pub fn has_completers(&self) -> bool {
        self.competitors().any(Competitor::completed)
    }

    fn check_competitor(&self, index: usize) -> Result<&Member<'a>> {
        self.members.get(index).ok_or_else(|| {
            ResultsError::invalid(format!(
                "Competitor index {} out of range: the set has {} competitor(s)",
                index,
                self.members.len()
            ))
        })
    }

    fn check_control(&self, control: usize) -> Result<()> {
        if control > self.num_controls + 1 {
            return Err(ResultsError::invalid(format!("Control {} out of range", control)));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Ranks
    // ------------------------------------------------------------------------

    /// Overall position in the set; only competitors who completed are placed
    pub fn position(&self, index: usize) -> Result<Option<u32>> {
        self.check_competitor(index)?;
        Ok(self.positions[index])
    }

    /// Split ranks within the set, one per leg
    pub fn split_ranks(&self, index: usize) -> Result<&[Option<u32>]> {
        self.check_competitor(index)?;
        Ok(&self.ranks.split[index])
    }

    /// Cumulative ranks within the set, one per control after the start
    pub fn cumulative_ranks(&self, index: usize) -> Result<&[Option<u32>]> {
        self.check_competitor(index)?;
        Ok(&self.ranks.cumulative[index])
    }

    pub fn split_rank_to(&self, index: usize, control: usize) -> Result<Option<u32>> {
        self.check_control(control)?;
        let ranks = self.split_ranks(index)?;
        Ok(control.checked_sub(1).and_then(|i| ranks.get(i).copied().flatten()))
    }

    pub fn cumulative_rank_to(&self, index: usize, control: usize) -> Result<Option<u32>> {
        self.check_control(control)?;
        let ranks = self.cumulative_ranks(index)?;
        Ok(control.checked_sub(1).and_then(|i| ranks.get(i).copied().flatten()))
    }

    // ------------------------------------------------------------------------
    // Reference times
    // ------------------------------------------------------------------------

    /// The leading competitor's times with gaps filled, if they completed
    pub fn winner_cum_times(&self) -> Option<Vec<Option<Time>>> {
        let first = self.members.first()?.competitor;
        first.completed().then(|| fill_blank_ranges(first.cum_times()))
    }

    /// Times of an imaginary competitor who ran every leg as fast as anyone
    pub fn fastest_cum_times(&self) -> Option<Vec<Option<Time>>> {
        self.fastest_cum_times_plus_percentage(0.0)
    }

    /// As `fastest_cum_times`, with every leg slowed by `percent`.
    ///
    /// Each leg takes the fastest non-dubious split among competitors who
    /// completed, then among everyone. Legs still without a split take the
    /// fastest average over the shortest run of missing controls covering
    /// them, and anything left gets a default.
    pub fn fastest_cum_times_plus_percentage(&self, percent: f64) -> Option<Vec<Option<Time>>> {
        if self.classes.is_empty() {
            return None;
        }
        let finish = self.num_controls + 1;
        let ratio = 1.0 + percent / 100.0;

        let mut fastest: Vec<Option<Time>> = vec![None; finish + 1];
        fastest[0] = Some(Time::ZERO);
        for (control, fastest_split) in fastest.iter_mut().enumerate().skip(1) {
            let best = |completers_only: bool| {
                self.competitors()
                    .filter(|c| !completers_only || c.completed())
                    .filter(|c| !c.is_split_time_dubious(control))
                    .filter_map(|c| c.split_time_to(control))
                    .min()
            };
            *fastest_split = best(true).or_else(|| best(false));
        }

        if fastest.iter().any(Option::is_none) {
            self.fill_fastest_from_blank_ranges(&mut fastest);
        }

        let mut cum_times = Vec::with_capacity(finish + 1);
        let mut total = Time::ZERO;
        for (control, split) in fastest.iter().enumerate() {
            if control > 0 {
                let default = if control == finish {
                    DEFAULT_FINISH_SPLIT
                } else {
                    DEFAULT_LEG_SPLIT
                };
                total += split.unwrap_or(default).scale(ratio);
            }
            cum_times.push(Some(total));
        }
        Some(cum_times)
    }

    /// Fills missing fastest splits from competitors who skipped (or had
    /// dubious times at) a run of controls covering the missing legs.
    fn fill_fastest_from_blank_ranges(&self, fastest: &mut [Option<Time>]) {
        let covering: Vec<(BlankRange, Time)> = self
            .competitors()
            .flat_map(|competitor| {
                let known = known_cum_times(competitor);
                blank_ranges(&known, false)
                    .into_iter()
                    .filter_map(move |range| {
                        let split = known[range.end]? - known[range.start]?;
                        Some((range, split))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        for missing in blank_ranges(fastest, true) {
            let best = covering
                .iter()
                .filter(|(range, _)| range.start <= missing.start && missing.end <= range.end + 1)
                .min_by_key(|(range, split)| (range.end - range.start, *split));
            if let Some((range, split)) = best {
                let size = (range.end - range.start) as f64;
                let per_leg = split.scale(1.0 / size);
                for value in fastest.iter_mut().take(missing.end).skip(missing.start + 1) {
                    *value = Some(per_leg);
                }
            }
        }
    }

    /// The competitor's cumulative times with gaps filled
    pub fn cumulative_times_for_competitor(&self, index: usize) -> Result<Vec<Option<Time>>> {
        let member = self.check_competitor(index)?;
        Ok(fill_blank_ranges(member.competitor.cum_times()))
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Up to `count` fastest non-dubious splits to the control among
    /// competitors who completed, fastest first, ties by name
    pub fn fastest_splits_to(&self, count: usize, control: usize) -> Result<Vec<LegSplit>> {
        if count == 0 {
            return Err(ResultsError::invalid("The number of splits must be a positive integer"));
        }
        self.check_control(control)?;
        if control == 0 {
            return Ok(Vec::new());
        }

        let mut splits: Vec<LegSplit> = self
            .members
            .iter()
            .filter(|m| m.competitor.completed() && !m.competitor.is_split_time_dubious(control))
            .filter_map(|m| {
                m.competitor.split_time_to(control).map(|split| LegSplit {
                    name: m.competitor.full_name(),
                    class_name: self.classes[m.class].name.clone(),
                    split,
                })
            })
            .collect();
        splits.sort_by(|a, b| a.split.cmp(&b.split).then_with(|| a.name.cmp(&b.name)));
        splits.truncate(count);
        Ok(splits)
    }

    // ------------------------------------------------------------------------
    // Chart data
    // ------------------------------------------------------------------------

    /// Values plotted for one competitor
    fn series(&self, index: usize, reference: &[Option<Time>], chart_type: ChartType) -> Result<Vec<Option<f64>>> {
        let competitor = self.members[index].competitor;
        let ranks_as_values =
            |ranks: &[Option<u32>]| -> Vec<Option<f64>> { ranks.iter().map(|r| r.map(f64::from)).collect() };
        match chart_type {
            ChartType::SplitsGraph => Ok(competitor
                .cum_times_adjusted_to_reference(reference)?
                .into_iter()
                .map(to_minutes)
                .collect()),
            ChartType::RaceGraph => Ok(competitor
                .cum_times_adjusted_to_reference_with_start_added(reference)?
                .into_iter()
                .map(to_minutes)
                .collect()),
            ChartType::PositionAfterLeg => Ok(ranks_as_values(&self.ranks.cumulative[index])),
            ChartType::SplitPosition => Ok(ranks_as_values(&self.ranks.split[index])),
            ChartType::PercentBehind => competitor.split_percents_behind_reference(reference),
            ChartType::ResultsTable => Err(ResultsError::invalid("The results table has no chart data")),
        }
    }

    fn dubious_ranges(&self, index: usize, chart_type: ChartType) -> Vec<DubiousRange> {
        let competitor = self.members[index].competitor;
        let ranges = if chart_type.marks_dubious_cumulative_times() {
            competitor.indexes_around_dubious_cumulative_times()
        } else {
            competitor.indexes_around_dubious_split_times()
        };
        let adjust = usize::from(chart_type.skip_start());
        ranges
            .into_iter()
            .filter(|range| range.start >= adjust)
            .map(|range| DubiousRange {
                start: range.start - adjust,
                end: range.end - adjust,
            })
            .collect()
    }

    /// Plot-ready series for the selected competitors against the reference
    pub fn chart_data(&self, reference: &[Option<Time>], selected: &[usize], chart_type: ChartType) -> Result<ChartData> {
        if chart_type.is_results_table() {
            return Err(ResultsError::invalid("The results table has no chart data"));
        }
        if reference.len() != self.num_controls + 2 {
            return Err(ResultsError::invalid(format!(
                "Reference times have length {}, expected {}",
                reference.len(),
                self.num_controls + 2
            )));
        }
        let reference_secs: Vec<f64> = reference
            .iter()
            .map(|time| time.map(Time::as_secs_f64))
            .collect::<Option<_>>()
            .ok_or_else(|| ResultsError::invalid("Reference cumulative times must not contain unknown values"))?;
        for &index in selected {
            self.check_competitor(index)?;
        }

        let series: Vec<Vec<Option<f64>>> = selected
            .iter()
            .map(|&index| self.series(index, reference, chart_type))
            .collect::<Result<_>>()?;

        let y_extent = if selected.is_empty() {
            if self.is_empty() {
                EMPTY_Y_EXTENT
            } else {
                extent(&self.series(0, reference, chart_type)?).unwrap_or(EMPTY_Y_EXTENT)
            }
        } else {
            extent(series.iter().flatten()).unwrap_or(EMPTY_Y_EXTENT)
        };
        let y_extent = if y_extent.0 == y_extent.1 {
            (y_extent.0, y_extent.0 + 1.0)
        } else {
            y_extent
        };

        let x_extent = reference_secs
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));

        let skip = usize::from(chart_type.skip_start());
        let data_columns = reference_secs
            .iter()
            .skip(skip)
            .enumerate()
            .map(|(column, &x)| DataColumn {
                x,
                ys: series.iter().map(|values| values.get(column).copied().flatten()).collect(),
            })
            .collect();

        Ok(ChartData {
            data_columns,
            competitor_names: selected
                .iter()
                .map(|&index| self.members[index].competitor.full_name())
                .collect(),
            num_controls: self.num_controls,
            x_extent,
            y_extent,
            dubious_times_info: selected
                .iter()
                .map(|&index| self.dubious_ranges(index, chart_type))
                .collect(),
        })
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Repaired times with dubious entries treated as unknown
fn known_cum_times(competitor: &Competitor) -> Vec<Option<Time>> {
    competitor
        .cum_times()
        .iter()
        .enumerate()
        .map(|(i, time)| time.filter(|_| !competitor.is_cumulative_time_dubious(i)))
        .collect()
}

/// Runs of unknown values after the first, as the known indexes either side.
/// A run reaching the end is included (ending one past the last index) only
/// when `include_end` is set.
fn blank_ranges(times: &[Option<Time>], include_end: bool) -> Vec<BlankRange> {
    let mut ranges = Vec::new();
    let mut start = 1;
    while start + 1 < times.len() {
        if times[start].is_some() {
            start += 1;
            continue;
        }
        let mut end = start;
        while end + 1 < times.len() && times[end + 1].is_none() {
            end += 1;
        }
        if end + 1 < times.len() || include_end {
            ranges.push(BlankRange {
                start: start - 1,
                end: end + 1,
            });
        }
        start = end + 1;
    }
    ranges
}

/// Fills gaps by linear interpolation between known times; trailing gaps get
/// 3 minutes per control and 1 minute for the finish.
pub fn fill_blank_ranges(cum_times: &[Option<Time>]) -> Vec<Option<Time>> {
    let mut filled = cum_times.to_vec();
    for range in blank_ranges(cum_times, false) {
        if let (Some(before), Some(after)) = (filled[range.start], filled[range.end]) {
            let legs = (range.end - range.start) as f64;
            for index in range.start + 1..range.end {
                let fraction = (index - range.start) as f64 / legs;
                filled[index] = Some(before + (after - before).scale(fraction));
            }
        }
    }

    let mut last_known = filled.len();
    while last_known > 0 && filled[last_known - 1].is_none() {
        last_known -= 1;
    }
    if last_known > 0 {
        let finish = filled.len() - 1;
        for index in last_known..filled.len() {
            let step = if index == finish {
                DEFAULT_FINISH_SPLIT
            } else {
                DEFAULT_LEG_SPLIT
            };
            filled[index] = filled[index - 1].map(|previous| previous + step);
        }
    }
    filled
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

    fn competitor(order: usize, name: &str, start: i64, cum: &[Option<i64>]) -> Competitor {
        Competitor::from_original_cum_times(
            order,
            CompetitorName::from_full_name(name),
            "ABC",
            Some(Time::from_secs(start)),
            secs(cum),
        )
    }

    fn m21() -> CourseClass {
        let mut non_starter = competitor(4, "Di Nos", 36300, &[Some(0), None, None, None]);
        non_starter.set_non_starter();
        CourseClass::new(
            "M21",
            2,
            vec![
                competitor(1, "Ann Lee", 36000, &[Some(0), Some(60), Some(140), Some(190)]),
                competitor(2, "Bob Ray", 36060, &[Some(0), Some(70), Some(170), Some(210)]),
                competitor(3, "Cy Fox", 36120, &[Some(0), Some(65), None, Some(260)]),
                non_starter,
            ],
        )
        .unwrap()
    }

    fn w21() -> CourseClass {
        CourseClass::new("W21", 2, vec![competitor(5, "Eve Kay", 36180, &[Some(0), Some(75), Some(150), Some(195)])]).unwrap()
    }

    #[test]
    fn test_rejects_mismatched_classes() {
        let m21 = m21();
        let short = CourseClass::new("M40", 1, vec![]).unwrap();
        assert!(CourseClassSet::new(vec![&m21, &short]).is_err());

        let mut other_course = w21();
        other_course.course = Some(3);
        assert!(CourseClassSet::new(vec![&m21, &other_course]).is_err());
    }

    #[test]
    fn test_merges_and_sorts_members() {
        let (m21, w21) = (m21(), w21());
        let set = CourseClassSet::new(vec![&m21, &w21]).unwrap();
        let names: Vec<String> = set.competitors().map(|c| c.full_name()).collect();
        assert_eq!(names, vec!["Ann Lee", "Eve Kay", "Bob Ray", "Cy Fox"]);
        assert_eq!(set.class_name_of(1), Some("W21"));
        assert_eq!(set.primary_class_name(), Some("M21"));
        assert_eq!(set.num_classes(), 2);
    }

    #[test]
    fn test_set_ranks_span_classes_without_touching_them() {
        let (m21, w21) = (m21(), w21());
        let set = CourseClassSet::new(vec![&m21, &w21]).unwrap();
        assert_eq!(set.cumulative_ranks(0).unwrap(), &[Some(1), Some(1), Some(1)]);
        assert_eq!(set.cumulative_ranks(1).unwrap(), &[Some(4), Some(2), Some(2)]);
        assert_eq!(set.cumulative_ranks(3).unwrap(), &[Some(2), None, None]);
        assert_eq!(set.split_rank_to(1, 2).unwrap(), Some(1));
        assert!(set.split_rank_to(1, 4).is_err());
        assert!(m21.competitors[0].cum_ranks().is_empty());
    }

    #[test]
    fn test_positions_leave_out_disqualified() {
        let mut dsq = competitor(1, "Dee Squared", 0, &[Some(0), Some(50), Some(100), Some(150)]);
        dsq.disqualify();
        let class = CourseClass::new(
            "M21",
            2,
            vec![dsq, competitor(2, "Al Clean", 0, &[Some(0), Some(60), Some(120), Some(180)])],
        )
        .unwrap();
        let set = CourseClassSet::new(vec![&class]).unwrap();

        assert_eq!(set.competitor(0).map(Competitor::full_name).as_deref(), Some("Al Clean"));
        assert_eq!(set.position(0).unwrap(), Some(1));
        assert_eq!(set.position(1).unwrap(), None);
        assert!(set.position(2).is_err());
    }

    #[test]
    fn test_winner_cum_times() {
        let (m21, w21) = (m21(), w21());
        let set = CourseClassSet::new(vec![&m21, &w21]).unwrap();
        assert_eq!(set.winner_cum_times(), Some(secs(&[Some(0), Some(60), Some(140), Some(190)])));

        let mut mispunch = competitor(1, "Mp", 0, &[Some(0), None, Some(100), Some(150)]);
        mispunch.set_non_finisher();
        let class = CourseClass::new("M21", 2, vec![mispunch]).unwrap();
        let set = CourseClassSet::new(vec![&class]).unwrap();
        assert_eq!(set.winner_cum_times(), None);
    }

    #[test]
    fn test_fastest_cum_times_compose_fastest_splits() {
        let (m21, w21) = (m21(), w21());
        let set = CourseClassSet::new(vec![&m21, &w21]).unwrap();
        // Fastest splits: 60 (Ann), 75 (Eve), 40 (Bob)
        assert_eq!(set.fastest_cum_times(), Some(secs(&[Some(0), Some(60), Some(135), Some(175)])));
    }

    #[test]
    fn test_fastest_plus_percentage_inflates_each_leg() {
        let class = CourseClass::new(
            "M21",
            2,
            vec![
                competitor(1, "A One", 0, &[Some(0), Some(60), Some(140), Some(190)]),
                competitor(2, "B Two", 0, &[Some(0), Some(70), Some(170), Some(210)]),
            ],
        )
        .unwrap();
        let set = CourseClassSet::new(vec![&class]).unwrap();
        let reference = set.fastest_cum_times_plus_percentage(25.0).unwrap();
        // Fastest leg 2 is 80 s, so the reference leg takes 100 s
        assert_eq!(reference[2].zip(reference[1]).map(|(b, a)| b - a), Some(Time::from_secs(100)));
        assert_eq!(reference[3], Some(Time::from_secs(75 + 100 + 50)));
    }

    #[test]
    fn test_fastest_fills_legs_nobody_completed() {
        // Nobody has a time at control 2, so legs 2 and 3 share the fastest
        // control 1 to finish time
        let class = CourseClass::new(
            "M21",
            2,
            vec![
                competitor(1, "A One", 0, &[Some(0), Some(60), None, Some(260)]),
                competitor(2, "B Two", 0, &[Some(0), Some(50), None, Some(290)]),
            ],
        )
        .unwrap();
        let set = CourseClassSet::new(vec![&class]).unwrap();
        assert_eq!(set.fastest_cum_times(), Some(secs(&[Some(0), Some(50), Some(150), Some(250)])));

        let nobody = CourseClass::new("M21", 2, vec![competitor(1, "A One", 0, &[Some(0), None, None, None])]).unwrap();
        let set = CourseClassSet::new(vec![&nobody]).unwrap();
        assert_eq!(set.fastest_cum_times(), Some(secs(&[Some(0), Some(180), Some(360), Some(420)])));

        let empty = CourseClassSet::new(vec![]).unwrap();
        assert_eq!(empty.fastest_cum_times(), None);
    }

    #[test]
    fn test_fill_blank_ranges() {
        let filled = fill_blank_ranges(&secs(&[Some(0), Some(60), None, None, Some(240), None, None]));
        assert_eq!(
            filled,
            secs(&[Some(0), Some(60), Some(120), Some(180), Some(240), Some(420), Some(480)])
        );
    }

    #[test]
    fn test_fastest_splits_to() {
        let (m21, w21) = (m21(), w21());
        let set = CourseClassSet::new(vec![&m21, &w21]).unwrap();
        let splits = set.fastest_splits_to(2, 1).unwrap();
        let summary: Vec<(&str, &str, i64)> = splits
            .iter()
            .map(|s| (s.name.as_str(), s.class_name.as_str(), s.split.hundredths() / 100))
            .collect();
        assert_eq!(summary, vec![("Ann Lee", "M21", 60), ("Bob Ray", "M21", 70)]);

        assert!(set.fastest_splits_to(0, 1).is_err());
        assert!(set.fastest_splits_to(3, 4).is_err());
        assert!(set.fastest_splits_to(3, 0).unwrap().is_empty());
    }

    #[test]
    fn test_cumulative_times_for_competitor() {
        let (m21, w21) = (m21(), w21());
        let set = CourseClassSet::new(vec![&m21, &w21]).unwrap();
        let filled = set.cumulative_times_for_competitor(3).unwrap();
        assert_eq!(filled[2], Some(Time::from_hundredths(16250)));
        assert_eq!(filled[3], Some(Time::from_secs(260)));
        assert!(set.cumulative_times_for_competitor(4).is_err());
    }

    #[test]
    fn test_splits_graph_data() {
        let (m21, w21) = (m21(), w21());
        let set = CourseClassSet::new(vec![&m21, &w21]).unwrap();
        let reference = set.fastest_cum_times().unwrap();
        let data = set.chart_data(&reference, &[0, 2], ChartType::SplitsGraph).unwrap();

        assert_eq!(data.data_columns.len(), 4);
        assert_eq!(data.data_columns[3].x, 175.0);
        // Ann 190 - 175 = 15 s, Bob 210 - 175 = 35 s
        assert_eq!(data.data_columns[3].ys, vec![Some(0.25), Some(35.0 / 60.0)]);
        assert_eq!(data.competitor_names, vec!["Ann Lee", "Bob Ray"]);
        assert_eq!(data.x_extent, (0.0, 175.0));
        assert_eq!(data.y_extent, (0.0, 35.0 / 60.0));
        assert_eq!(data.num_controls, 2);
    }

    #[test]
    fn test_position_chart_skips_start() {
        let (m21, w21) = (m21(), w21());
        let set = CourseClassSet::new(vec![&m21, &w21]).unwrap();
        let reference = set.fastest_cum_times().unwrap();
        let data = set.chart_data(&reference, &[1], ChartType::PositionAfterLeg).unwrap();
        assert_eq!(data.data_columns.len(), 3);
        assert_eq!(data.data_columns[0].x, 60.0);
        let ys: Vec<Option<f64>> = data.data_columns.iter().map(|c| c.ys[0]).collect();
        assert_eq!(ys, vec![Some(4.0), Some(2.0), Some(2.0)]);
    }

    #[test]
    fn test_chart_data_extents_without_selection() {
        let (m21, w21) = (m21(), w21());
        let set = CourseClassSet::new(vec![&m21, &w21]).unwrap();
        let reference = set.fastest_cum_times().unwrap();
        // Ann's split ranks are 1, 2 and 3
        let data = set.chart_data(&reference, &[], ChartType::SplitPosition).unwrap();
        assert_eq!(data.y_extent, (1.0, 3.0));
        assert!(data.data_columns.iter().all(|c| c.ys.is_empty()));

        let empty = CourseClass::new("M21", 2, vec![]).unwrap();
        let set = CourseClassSet::new(vec![&empty]).unwrap();
        let data = set.chart_data(&reference, &[], ChartType::SplitsGraph).unwrap();
        assert_eq!(data.y_extent, (0.0, 60.0));
    }

    #[test]
    fn test_chart_data_rejects_bad_input() {
        let (m21, w21) = (m21(), w21());
        let set = CourseClassSet::new(vec![&m21, &w21]).unwrap();
        let reference = set.fastest_cum_times().unwrap();
        assert!(set.chart_data(&reference, &[0], ChartType::ResultsTable).is_err());
        assert!(set.chart_data(&reference[..3], &[0], ChartType::SplitsGraph).is_err());
        assert!(set.chart_data(&reference, &[9], ChartType::SplitsGraph).is_err());
        let with_gap = secs(&[Some(0), None, Some(100), Some(200)]);
        assert!(set.chart_data(&with_gap, &[0], ChartType::SplitsGraph).is_err());
    }

    #[test]
    fn test_chart_data_follows_restored_original_times() {
        use crate::repairer::Repairer;
        use crate::results::Results;

        let class = CourseClass::new("M21", 2, vec![competitor(1, "A One", 0, &[Some(0), Some(100), Some(90), Some(300)])]).unwrap();
        let mut results = Results::new(vec![class], Vec::new(), Vec::new());
        let zero_reference = secs(&[Some(0), Some(0), Some(0), Some(0)]);

        Repairer::default().repair(&mut results);
        let set = results.course_class_set(&[0]).unwrap();
        let data = set.chart_data(&zero_reference, &[0], ChartType::SplitsGraph).unwrap();
        assert_eq!(data.data_columns[2].ys[0], Some(200.0 / 60.0));

        Repairer::restore_original_times(&mut results);
        let set = results.course_class_set(&[0]).unwrap();
        let data = set.chart_data(&zero_reference, &[0], ChartType::SplitsGraph).unwrap();
        assert_eq!(data.data_columns[2].ys[0], Some(1.5));
        assert_eq!(data.dubious_times_info, vec![Vec::<DubiousRange>::new()]);
        // Cumulative rank still known after the backwards punch
        assert_eq!(set.cumulative_rank_to(0, 2).unwrap(), Some(1));
    }

    #[test]
    fn test_dubious_ranges_shift_for_position_charts() {
        let mut comp = competitor(1, "A One", 0, &[Some(0), Some(100), Some(90), Some(300), Some(400)]);
        comp.set_repaired_cum_times(
            secs(&[Some(0), Some(100), Some(200), Some(300), Some(400)]),
            vec![false, false, true, false, false],
        );
        let class = CourseClass::new("M21", 3, vec![comp]).unwrap();
        let set = CourseClassSet::new(vec![&class]).unwrap();
        let reference = set.winner_cum_times().unwrap();

        let data = set.chart_data(&reference, &[0], ChartType::SplitsGraph).unwrap();
        assert_eq!(data.dubious_times_info, vec![vec![DubiousRange { start: 1, end: 3 }]]);
        let data = set.chart_data(&reference, &[0], ChartType::PositionAfterLeg).unwrap();
        assert_eq!(data.dubious_times_info, vec![vec![DubiousRange { start: 0, end: 2 }]]);
        let data = set.chart_data(&reference, &[0], ChartType::SplitPosition).unwrap();
        assert_eq!(data.dubious_times_info, vec![vec![DubiousRange { start: 0, end: 3 }]]);
    }
}
