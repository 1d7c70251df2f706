pub mod chart;
pub mod comparison;
pub mod competitor;
pub mod course;
pub mod course_class;
pub mod course_class_set;
pub mod error;
pub mod output;
pub mod parsers;
pub mod query_string;
pub mod ranking;
pub mod repairer;
pub mod results;
pub mod selection;
pub mod time;

use std::error::Error;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================
pub use chart::{ChartData, ChartType, DataColumn};
pub use comparison::Comparison;
pub use competitor::{Competitor, CompetitorName, CompetitorStatus, DubiousRange, Gender};
pub use course::{ControlCode, Course};
pub use course_class::{CourseClass, FastestSplit};
pub use course_class_set::CourseClassSet;
pub use error::{Result, ResultsError};
pub use output::{print_chart_data, print_class_set, print_warnings, split_rows, write_csv, write_csv_file, OutputOptions, SplitRow};
pub use parsers::parse_results;
pub use query_string::{decode_query, encode_query, StatisticsFlags, ViewState};
pub use repairer::{Interpolation, RepairConfig, Repairer};
pub use results::{LegSplit, NextControls, Results};
pub use selection::CompetitorSelection;
pub use time::Time;

// ============================================================================
// LOADING
// ============================================================================

/// Whether the input names an http(s) resource rather than a local file
pub fn is_url(input: &str) -> bool {
    url::Url::parse(input)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Fetch the text of a results file from a URL
pub async fn fetch_text(url: &str) -> std::result::Result<String, Box<dyn Error>> {
    let response = reqwest::get(url).await?.error_for_status()?;
    Ok(response.text().await?)
}

/// Reads a results file from a path or URL
pub async fn load_text(input: &str) -> std::result::Result<String, Box<dyn Error>> {
    if is_url(input) {
        fetch_text(input).await
    } else {
        Ok(tokio::fs::read_to_string(input).await?)
    }
}

/// Reads and parses a results file from a path or URL
pub async fn load_results(input: &str) -> std::result::Result<Results, Box<dyn Error>> {
    let text = load_text(input).await?;
    Ok(parse_results(&text)?)
}
