use serde::Serialize;

pub use crate::competitor::DubiousRange;

// ============================================================================
// CHART TYPES
// ============================================================================

/// The ways a set of competitors can be compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChartType {
    /// Cumulative time behind the reference, in minutes
    SplitsGraph,
    /// Time of day at each control relative to the reference, in minutes
    RaceGraph,
    /// Cumulative rank after each leg
    PositionAfterLeg,
    /// Rank of each leg's split
    SplitPosition,
    /// Percentage each split is behind the reference's split
    PercentBehind,
    /// Tabular results; has no chart data
    ResultsTable,
}

impl ChartType {
    pub const ALL: [ChartType; 6] = [
        ChartType::SplitsGraph,
        ChartType::RaceGraph,
        ChartType::PositionAfterLeg,
        ChartType::SplitPosition,
        ChartType::PercentBehind,
        ChartType::ResultsTable,
    ];

    /// Name used in query strings
    pub fn key(self) -> &'static str {
        match self {
            ChartType::SplitsGraph => "SplitsGraph",
            ChartType::RaceGraph => "RaceGraph",
            ChartType::PositionAfterLeg => "PositionAfterLeg",
            ChartType::SplitPosition => "SplitPosition",
            ChartType::PercentBehind => "PercentBehind",
            ChartType::ResultsTable => "ResultsTable",
        }
    }

    pub fn from_key(key: &str) -> Option<ChartType> {
        ChartType::ALL.iter().copied().find(|chart_type| chart_type.key() == key)
    }

    /// Position charts have no value at the start
    pub fn skip_start(self) -> bool {
        matches!(self, ChartType::PositionAfterLeg | ChartType::SplitPosition)
    }

    pub fn is_race_graph(self) -> bool {
        self == ChartType::RaceGraph
    }

    pub fn is_results_table(self) -> bool {
        self == ChartType::ResultsTable
    }

    pub fn min_viewable_control(self) -> usize {
        if self.is_race_graph() {
            0
        } else {
            1
        }
    }

    /// Whether dubious markers surround cumulative times (rather than splits)
    pub fn marks_dubious_cumulative_times(self) -> bool {
        matches!(
            self,
            ChartType::SplitsGraph | ChartType::RaceGraph | ChartType::PositionAfterLeg
        )
    }

    pub fn y_axis_label(self) -> &'static str {
        match self {
            ChartType::SplitsGraph => "Time (min)",
            ChartType::RaceGraph => "Time of day",
            ChartType::PositionAfterLeg | ChartType::SplitPosition => "Position",
            ChartType::PercentBehind => "Percent behind",
            ChartType::ResultsTable => "",
        }
    }
}

// ============================================================================
// CHART DATA
// ============================================================================

/// One x position and the value of every plotted competitor there
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataColumn {
    pub x: f64,
    pub ys: Vec<Option<f64>>,
}

/// Plot-ready series for the selected competitors
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub data_columns: Vec<DataColumn>,
    pub competitor_names: Vec<String>,
    pub num_controls: usize,
    pub x_extent: (f64, f64),
    pub y_extent: (f64, f64),
    /// Per selected competitor, the ranges to draw as dubious
    pub dubious_times_info: Vec<Vec<DubiousRange>>,
}

/// Smallest and largest known values; `None` when nothing is known
pub(crate) fn extent<'a>(values: impl IntoIterator<Item = &'a Option<f64>>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .flatten()
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
