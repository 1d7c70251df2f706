use serde::Serialize;
use std::cmp::Ordering;

use crate::error::{Result, ResultsError};
use crate::time::{subtract, Time};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Reads the single-letter codes used by timing software
    pub fn from_code(code: &str) -> Option<Gender> {
        match code.trim() {
            "M" => Some(Gender::Male),
            "F" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// A competitor's name split into forename and surname
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompetitorName {
    pub forename: String,
    pub surname: String,
}

impl CompetitorName {
    pub fn new(forename: impl Into<String>, surname: impl Into<String>) -> Self {
        CompetitorName {
            forename: forename.into().trim().to_string(),
            surname: surname.into().trim().to_string(),
        }
    }

    /// Splits a combined name at the last space; a name without spaces is all surname
    pub fn from_full_name(full_name: &str) -> Self {
        let full_name = full_name.trim();
        match full_name.rfind(' ') {
            Some(pos) => CompetitorName::new(&full_name[..pos], &full_name[pos + 1..]),
            None => CompetitorName::new("", full_name),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.forename, self.surname).trim().to_string()
    }
}

/// Result status flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompetitorStatus {
    pub non_competitive: bool,
    pub non_starter: bool,
    pub non_finisher: bool,
    pub disqualified: bool,
    pub over_max_time: bool,
}

/// A pair of control indexes surrounding a run of dubious times, both of
/// which hold known times
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DubiousRange {
    pub start: usize,
    pub end: usize,
}

/// One competitor's result.
///
/// Cumulative times are indexed by control: 0 is the start (always zero), the
/// last index is the finish. The original readings are kept untouched; the
/// repaired copy starts identical and is replaced by the repairer.
#[derive(Debug, Clone)]
pub struct Competitor {
    pub order: usize,
    pub name: CompetitorName,
    pub club: String,
    pub start_time: Option<Time>,
    pub total_time: Option<Time>,
    pub status: CompetitorStatus,
    pub year_of_birth: Option<i32>,
    pub gender: Option<Gender>,
    pub ecard_id: Option<String>,
    original_cum_times: Vec<Option<Time>>,
    cum_times: Vec<Option<Time>>,
    dubious: Vec<bool>,
    split_ranks: Vec<Option<u32>>,
    cum_ranks: Vec<Option<u32>>,
    time_losses: Vec<Option<Time>>,
}

// ============================================================================
// CONSTRUCTION AND STATUS
// ============================================================================

impl Competitor {
    /// Creates a competitor from original cumulative times, which must begin
    /// with the zero start time and end with the finish.
    pub fn from_original_cum_times(
        order: usize,
        name: CompetitorName,
        club: impl Into<String>,
        start_time: Option<Time>,
        cum_times: Vec<Option<Time>>,
    ) -> Competitor {
        let total_time = if cum_times.len() < 2 || cum_times.iter().any(Option::is_none) {
            None
        } else {
            cum_times.last().copied().flatten()
        };

        Competitor {
            order,
            name,
            club: club.into().trim().to_string(),
            start_time,
            total_time,
            status: CompetitorStatus::default(),
            year_of_birth: None,
            gender: None,
            ecard_id: None,
            dubious: vec![false; cum_times.len()],
            cum_times: cum_times.clone(),
            original_cum_times: cum_times,
            split_ranks: Vec::new(),
            cum_ranks: Vec::new(),
            time_losses: Vec::new(),
        }
    }

    /// Builds cumulative times from split times and creates the competitor
    pub fn from_split_times(
        order: usize,
        name: CompetitorName,
        club: impl Into<String>,
        start_time: Option<Time>,
        split_times: &[Option<Time>],
    ) -> Competitor {
        let mut cum_times = Vec::with_capacity(split_times.len() + 1);
        cum_times.push(Some(Time::ZERO));
        let mut running = Some(Time::ZERO);
        for split in split_times {
            running = running.zip(*split).map(|(total, split)| total + split);
            cum_times.push(running);
        }
        Competitor::from_original_cum_times(order, name, club, start_time, cum_times)
    }

    pub fn full_name(&self) -> String {
        self.name.full_name()
    }

    pub fn num_controls(&self) -> usize {
        self.original_cum_times.len().saturating_sub(2)
    }

    pub fn set_non_competitive(&mut self) {
        self.status.non_competitive = true;
    }

    pub fn set_non_starter(&mut self) {
        self.status.non_starter = true;
    }

    pub fn set_non_finisher(&mut self) {
        self.status.non_finisher = true;
    }

    pub fn disqualify(&mut self) {
        self.status.disqualified = true;
    }

    pub fn set_over_max_time(&mut self) {
        self.status.over_max_time = true;
    }

    pub fn is_non_competitive(&self) -> bool {
        self.status.non_competitive
    }

    pub fn is_non_starter(&self) -> bool {
        self.status.non_starter
    }

    pub fn is_non_finisher(&self) -> bool {
        self.status.non_finisher
    }

    pub fn is_disqualified(&self) -> bool {
        self.status.disqualified
    }

    pub fn is_over_max_time(&self) -> bool {
        self.status.over_max_time
    }

    /// Has a total time and was neither disqualified nor over time
    pub fn completed(&self) -> bool {
        self.total_time.is_some() && !self.status.disqualified && !self.status.over_max_time
    }

    /// Whether any time beyond the start was recorded
    pub fn has_any_times(&self) -> bool {
        self.original_cum_times.iter().skip(1).any(Option::is_some)
    }

    /// Result ordering: disqualified last, then by total time (unknown last),
    /// then by original order.
    pub fn compare(a: &Competitor, b: &Competitor) -> Ordering {
        a.status
            .disqualified
            .cmp(&b.status.disqualified)
            .then_with(|| match (a.total_time, b.total_time) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.order.cmp(&b.order))
    }
}

// ============================================================================
// TIME ACCESSORS
// ============================================================================

impl Competitor {
    pub fn original_cum_times(&self) -> &[Option<Time>] {
        &self.original_cum_times
    }

    /// Repaired cumulative times (equal to the originals until repaired)
    pub fn cum_times(&self) -> &[Option<Time>] {
        &self.cum_times
    }

    /// Makes the times as read the working times again, none of them dubious
    pub fn use_original_times(&mut self) {
        self.cum_times = self.original_cum_times.clone();
        self.dubious = vec![false; self.cum_times.len()];
    }

    pub fn cumulative_time_to(&self, control: usize) -> Option<Time> {
        self.cum_times.get(control).copied().flatten()
    }

    pub fn original_cumulative_time_to(&self, control: usize) -> Option<Time> {
        self.original_cum_times.get(control).copied().flatten()
    }

    /// Split from the previous control; the split to the start is zero
    pub fn split_time_to(&self, control: usize) -> Option<Time> {
        split_between(&self.cum_times, control)
    }

    pub fn original_split_time_to(&self, control: usize) -> Option<Time> {
        split_between(&self.original_cum_times, control)
    }

    /// Splits for legs 1..=numControls+1
    pub fn split_times(&self) -> Vec<Option<Time>> {
        (1..self.cum_times.len()).map(|i| self.split_time_to(i)).collect()
    }

    pub fn is_cumulative_time_dubious(&self, control: usize) -> bool {
        self.dubious.get(control).copied().unwrap_or(false)
    }

    /// A split is dubious if either cumulative time bounding it is
    pub fn is_split_time_dubious(&self, control: usize) -> bool {
        control > 0
            && (self.is_cumulative_time_dubious(control) || self.is_cumulative_time_dubious(control - 1))
    }

    pub fn has_dubious_times(&self) -> bool {
        self.dubious.iter().any(|&d| d)
    }

    /// Whether the original times ever fail to increase strictly. An equal
    /// finish is tolerated when `allow_equal_finish` is set.
    pub fn has_non_ascending_times(&self, allow_equal_finish: bool) -> bool {
        let finish = self.original_cum_times.len().saturating_sub(1);
        let mut previous: Option<Time> = None;
        for (index, time) in self.original_cum_times.iter().enumerate() {
            if let Some(time) = *time {
                if let Some(prev) = previous {
                    let equal_ok = allow_equal_finish && index == finish;
                    if time < prev || (time == prev && !equal_ok) {
                        return true;
                    }
                }
                previous = Some(time);
            }
        }
        false
    }

    pub(crate) fn set_repaired_cum_times(&mut self, cum_times: Vec<Option<Time>>, dubious: Vec<bool>) {
        self.cum_times = cum_times;
        self.dubious = dubious;
    }

    // ------------------------------------------------------------------------
    // Ranks and time losses
    // ------------------------------------------------------------------------

    /// Rank of the split to the given control (1-based control index)
    pub fn split_rank_to(&self, control: usize) -> Option<u32> {
        control.checked_sub(1).and_then(|i| self.split_ranks.get(i).copied().flatten())
    }

    pub fn cumulative_rank_to(&self, control: usize) -> Option<u32> {
        control.checked_sub(1).and_then(|i| self.cum_ranks.get(i).copied().flatten())
    }

    pub fn split_ranks(&self) -> &[Option<u32>] {
        &self.split_ranks
    }

    pub fn cum_ranks(&self) -> &[Option<u32>] {
        &self.cum_ranks
    }

    pub(crate) fn set_ranks(&mut self, split_ranks: Vec<Option<u32>>, cum_ranks: Vec<Option<u32>>) {
        self.split_ranks = split_ranks;
        self.cum_ranks = cum_ranks;
    }

    pub fn time_loss_at(&self, control: usize) -> Option<Time> {
        control.checked_sub(1).and_then(|i| self.time_losses.get(i).copied().flatten())
    }

    pub fn time_losses(&self) -> &[Option<Time>] {
        &self.time_losses
    }

    /// Estimates the time lost on each leg against the fastest splits
    /// (one per leg). Each split is compared with the fastest split scaled
    /// by the competitor's median pace ratio, rounded to whole seconds.
    pub fn determine_time_losses(&mut self, fastest_splits: &[Option<Time>]) {
        let legs = self.cum_times.len().saturating_sub(1);
        self.time_losses = vec![None; legs];
        if !self.completed() || fastest_splits.len() != legs {
            return;
        }

        let fastest: Option<Vec<Time>> = fastest_splits
            .iter()
            .map(|split| split.filter(|s| s.is_positive()))
            .collect();
        let splits: Option<Vec<Time>> = (1..=legs)
            .map(|i| self.split_time_to(i).filter(|_| !self.is_split_time_dubious(i)))
            .collect();

        let (fastest, splits) = match (fastest, splits) {
            (Some(fastest), Some(splits)) => (fastest, splits),
            _ => return,
        };

        let mut ratios: Vec<f64> = splits
            .iter()
            .zip(&fastest)
            .map(|(split, fast)| split.as_secs_f64() / fast.as_secs_f64())
            .collect();
        ratios.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let median = median_of_sorted(&ratios);

        self.time_losses = splits
            .iter()
            .zip(&fastest)
            .map(|(split, fast)| {
                let loss = split.as_secs_f64() - fast.as_secs_f64() * median;
                Time::from_secs_f64(loss.round())
            })
            .collect();
    }
}

// ============================================================================
// COMPARISON WITH A REFERENCE
// ============================================================================

impl Competitor {
    /// Cumulative times minus the reference's; unknown where this competitor's time is
    pub fn cum_times_adjusted_to_reference(&self, reference: &[Option<Time>]) -> Result<Vec<Option<Time>>> {
        check_reference(reference, self.cum_times.len())?;
        Ok(self
            .cum_times
            .iter()
            .zip(reference)
            .map(|(time, reference)| subtract(*time, *reference))
            .collect())
    }

    /// As `cum_times_adjusted_to_reference`, with the start time of day added
    pub fn cum_times_adjusted_to_reference_with_start_added(
        &self,
        reference: &[Option<Time>],
    ) -> Result<Vec<Option<Time>>> {
        let start = self.start_time.unwrap_or(Time::ZERO);
        Ok(self
            .cum_times_adjusted_to_reference(reference)?
            .into_iter()
            .map(|time| time.map(|t| t + start))
            .collect())
    }

    /// Percentage by which each split is behind the reference's split.
    /// The start is always 0; legs where the reference split is not positive
    /// are unknown.
    pub fn split_percents_behind_reference(&self, reference: &[Option<Time>]) -> Result<Vec<Option<f64>>> {
        check_reference(reference, self.cum_times.len())?;
        let mut percents = vec![Some(0.0)];
        for control in 1..self.cum_times.len() {
            let reference_split = subtract(reference[control], reference[control - 1]);
            let percent = match (self.split_time_to(control), reference_split) {
                (Some(split), Some(reference_split)) if reference_split.is_positive() => {
                    let reference_secs = reference_split.as_secs_f64();
                    Some(100.0 * (split.as_secs_f64() - reference_secs) / reference_secs)
                }
                _ => None,
            };
            percents.push(percent);
        }
        Ok(percents)
    }

    /// Whether the two competitors swap places on the course at some point,
    /// judged by time of day at each control both punched.
    pub fn crosses(&self, other: &Competitor) -> bool {
        if self.cum_times.len() != other.cum_times.len() {
            return false;
        }
        let (own_start, other_start) = match (self.start_time, other.start_time) {
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };

        let mut last_order = Ordering::Equal;
        for (own, theirs) in self.cum_times.iter().zip(&other.cum_times) {
            if let (Some(own), Some(theirs)) = (own, theirs) {
                let order = (own_start + *own).cmp(&(other_start + *theirs));
                if order != Ordering::Equal {
                    if last_order != Ordering::Equal && order != last_order {
                        return true;
                    }
                    last_order = order;
                }
            }
        }
        false
    }

    pub fn indexes_around_dubious_cumulative_times(&self) -> Vec<DubiousRange> {
        ranges_around_dubious(
            self.cum_times.len(),
            |i| self.is_cumulative_time_dubious(i),
            |i| self.cumulative_time_to(i).is_some(),
        )
    }

    pub fn indexes_around_dubious_split_times(&self) -> Vec<DubiousRange> {
        ranges_around_dubious(
            self.cum_times.len(),
            |i| self.is_split_time_dubious(i),
            |i| self.split_time_to(i).is_some(),
        )
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn split_between(cum_times: &[Option<Time>], control: usize) -> Option<Time> {
    if control == 0 {
        return Some(Time::ZERO);
    }
    subtract(cum_times.get(control).copied().flatten(), cum_times.get(control - 1).copied().flatten())
}

fn check_reference(reference: &[Option<Time>], expected: usize) -> Result<()> {
    if reference.len() != expected {
        return Err(ResultsError::invalid(format!(
            "Cannot compare against reference times: expected {} times, got {}",
            expected,
            reference.len()
        )));
    }
    if reference.iter().any(Option::is_none) {
        return Err(ResultsError::invalid("Reference cumulative times must not contain unknown values"));
    }
    Ok(())
}

pub(crate) fn median_of_sorted(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Finds runs of dubious entries between index 1 and the end and returns the
/// known neighbours either side of each run.
fn ranges_around_dubious(
    len: usize,
    is_dubious: impl Fn(usize) -> bool,
    is_known: impl Fn(usize) -> bool,
) -> Vec<DubiousRange> {
    let mut ranges = Vec::new();
    let mut start = 1;
    while start + 1 < len {
        if is_dubious(start) {
            let mut end = start;
            while end + 1 < len && is_dubious(end + 1) {
                end += 1;
            }
            if end + 1 < len && is_known(start - 1) && is_known(end + 1) {
                ranges.push(DubiousRange { start: start - 1, end: end + 1 });
            }
            start = end + 1;
        } else {
            start += 1;
        }
    }
    ranges
}

// ============================================================================
// TESTS
// ============================================================================
