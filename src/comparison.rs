use std::fmt;

use crate::course_class_set::CourseClassSet;
use crate::error::{Result, ResultsError};
use crate::time::Time;

/// Percentages offered as ready-made "fastest time plus" comparisons
pub const FASTEST_PLUS_PRESETS: [u32; 4] = [5, 25, 50, 100];

/// What the chart measures competitors against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Winner,
    FastestTime,
    /// Fastest time with every leg slowed by a percentage
    FastestTimePlus(u32),
    /// A competitor, by index within the course-class set
    Competitor(usize),
}

impl Default for Comparison {
    fn default() -> Self {
        Comparison::FastestTime
    }
}

impl Comparison {
    /// The built-in comparisons, in menu order
    pub fn builtins() -> Vec<Comparison> {
        let mut builtins = vec![Comparison::Winner, Comparison::FastestTime];
        builtins.extend(FASTEST_PLUS_PRESETS.iter().map(|&p| Comparison::FastestTimePlus(p)));
        builtins
    }

    /// Query-string name of a built-in comparison
    pub fn key(&self) -> Option<String> {
        match self {
            Comparison::Winner => Some("Winner".to_string()),
            Comparison::FastestTime => Some("FastestTime".to_string()),
            Comparison::FastestTimePlus(percent) => Some(format!("FastestTimePlus{}", percent)),
            Comparison::Competitor(_) => None,
        }
    }

    /// Reads a built-in comparison name; only the preset percentages are accepted
    pub fn from_key(key: &str) -> Option<Comparison> {
        match key {
            "Winner" => Some(Comparison::Winner),
            "FastestTime" => Some(Comparison::FastestTime),
            _ => key
                .strip_prefix("FastestTimePlus")
                .and_then(|percent| percent.parse::<u32>().ok())
                .filter(|percent| FASTEST_PLUS_PRESETS.contains(percent))
                .map(Comparison::FastestTimePlus),
        }
    }

    /// Parses the command-line form: `winner`, `fastest`, `fastest+N`, or a
    /// competitor name looked up in the set
    pub fn parse(text: &str, set: &CourseClassSet<'_>) -> Result<Comparison> {
        let lower = text.trim().to_lowercase();
        match lower.as_str() {
            "winner" => return Ok(Comparison::Winner),
            "fastest" => return Ok(Comparison::FastestTime),
            _ => {}
        }
        if let Some(percent) = lower.strip_prefix("fastest+") {
            let percent = percent
                .trim_end_matches('%')
                .parse::<u32>()
                .map_err(|_| ResultsError::invalid(format!("Bad percentage in comparison '{}'", text)))?;
            return Ok(Comparison::FastestTimePlus(percent));
        }
        set.competitors()
            .position(|c| c.full_name().eq_ignore_ascii_case(text.trim()))
            .map(Comparison::Competitor)
            .ok_or_else(|| ResultsError::invalid(format!("No competitor named '{}' to compare against", text)))
    }

    /// Reference cumulative times, or `None` when this comparison has no
    /// data (no winner, no classes)
    pub fn reference_cum_times(&self, set: &CourseClassSet<'_>) -> Result<Option<Vec<Option<Time>>>> {
        match *self {
            Comparison::Winner => Ok(set.winner_cum_times()),
            Comparison::FastestTime => Ok(set.fastest_cum_times()),
            Comparison::FastestTimePlus(percent) => Ok(set.fastest_cum_times_plus_percentage(f64::from(percent))),
            Comparison::Competitor(index) => set.cumulative_times_for_competitor(index).map(Some),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Winner => write!(f, "Winner"),
            Comparison::FastestTime => write!(f, "Fastest time"),
            Comparison::FastestTimePlus(percent) => write!(f, "Fastest time + {}%", percent),
            Comparison::Competitor(index) => write!(f, "Competitor #{}", index + 1),
        }
    }
}
