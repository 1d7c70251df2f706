use serde::Serialize;

use crate::competitor::Competitor;
use crate::error::{Result, ResultsError};
use crate::ranking::compute_rank_table;
use crate::time::Time;

/// Fastest split to a control within a class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FastestSplit {
    pub name: String,
    pub split: Time,
}

/// A competitor seen at a control, by time of day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorAtControl {
    pub name: String,
    pub class_name: String,
    pub time: Time,
}

/// A competition class and its competitors
#[derive(Debug, Clone)]
pub struct CourseClass {
    pub name: String,
    pub num_controls: usize,
    pub competitors: Vec<Competitor>,
    /// Index into `Results::courses`
    pub course: Option<usize>,
    pub has_dubious_data: bool,
}

impl CourseClass {
    /// Creates a class, checking every competitor has `num_controls + 2` times
    pub fn new(name: impl Into<String>, num_controls: usize, competitors: Vec<Competitor>) -> Result<CourseClass> {
        let name = name.into();
        if let Some(bad) = competitors
            .iter()
            .find(|c| c.original_cum_times().len() != num_controls + 2)
        {
            return Err(ResultsError::invalid(format!(
                "Competitor '{}' in class '{}' has {} cumulative times, expected {}",
                bad.full_name(),
                name,
                bad.original_cum_times().len(),
                num_controls + 2
            )));
        }

        Ok(CourseClass {
            name,
            num_controls,
            competitors,
            course: None,
            has_dubious_data: false,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.competitors.is_empty()
    }

    pub fn record_has_dubious_data(&mut self) {
        self.has_dubious_data = true;
    }

    fn check_control(&self, control: usize) -> Result<()> {
        if control > self.num_controls + 1 {
            return Err(ResultsError::invalid(format!(
                "Control index {} is out of range for class '{}' with {} control(s)",
                control, self.name, self.num_controls
            )));
        }
        Ok(())
    }

    /// Fastest non-dubious split to the given control, if anyone recorded one
    pub fn fastest_split_to(&self, control: usize) -> Result<Option<FastestSplit>> {
        self.check_control(control)?;
        if control == 0 {
            return Ok(None);
        }
        Ok(self
            .competitors
            .iter()
            .filter(|c| !c.is_split_time_dubious(control))
            .filter_map(|c| c.split_time_to(control).map(|split| (split, c)))
            .min_by_key(|(split, _)| *split)
            .map(|(split, c)| FastestSplit { name: c.full_name(), split }))
    }

    /// Competitors whose time of day at the control lies within `[from, to]`
    pub fn competitors_at_control_in_time_range(
        &self,
        control: usize,
        from: Time,
        to: Time,
    ) -> Result<Vec<CompetitorAtControl>> {
        self.check_control(control)?;
        Ok(self
            .competitors
            .iter()
            .filter_map(|c| {
                let time = c.start_time? + c.cumulative_time_to(control)?;
                (from <= time && time <= to).then(|| CompetitorAtControl {
                    name: c.full_name(),
                    class_name: self.name.clone(),
                    time,
                })
            })
            .collect())
    }

    /// Computes every competitor's time losses against the class's fastest splits
    pub fn determine_time_losses(&mut self) {
        let fastest: Vec<Option<Time>> = (1..=self.num_controls + 1)
            .map(|control| {
                self.fastest_split_to(control)
                    .ok()
                    .flatten()
                    .map(|fastest| fastest.split)
            })
            .collect();
        for competitor in &mut self.competitors {
            competitor.determine_time_losses(&fastest);
        }
    }

    /// Ranks competitors within this class and stores the ranks on them
    pub fn compute_ranks(&mut self) {
        let table = {
            let competitors: Vec<&Competitor> = self.competitors.iter().collect();
            compute_rank_table(&competitors, self.num_controls)
        };
        for ((competitor, split), cumulative) in self
            .competitors
            .iter_mut()
            .zip(table.split)
            .zip(table.cumulative)
        {
            competitor.set_ranks(split, cumulative);
        }
    }
}
