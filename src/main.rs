use clap::{Parser, ValueEnum};
use orienteering_splits::{
    decode_query, encode_query, load_results, print_chart_data, print_class_set, print_warnings, write_csv_file,
    ChartType, Comparison, CompetitorSelection, Interpolation, OutputOptions, RepairConfig, Repairer, Results,
    ResultsError, ViewState,
};
use std::error::Error;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

// ============================================================================
// COMMAND LINE
// ============================================================================

/// Load an orienteering results file, repair bad punches and rank the splits
#[derive(Parser, Debug)]
#[command(name = "orienteering_splits", version, about)]
struct Cli {
    /// Results file path or http(s) URL
    input: String,

    /// Class to show; repeat to merge classes on the same course
    #[arg(long = "class", value_name = "NAME")]
    classes: Vec<String>,

    /// winner, fastest, fastest+N or a competitor's name
    #[arg(long, value_name = "COMPARISON")]
    compare: Option<String>,

    /// Chart to print below the results
    #[arg(long, value_enum)]
    chart: Option<ChartArg>,

    /// Keep the times as read
    #[arg(long)]
    no_repair: bool,

    /// Interpolate removed times evenly rather than by leg length
    #[arg(long)]
    uniform_interpolation: bool,

    /// Treat a finish time equal to the last control's as bad
    #[arg(long)]
    strict_finish: bool,

    /// Show original rather than repaired times
    #[arg(long)]
    show_original: bool,

    /// Write every split with its ranks to this CSV file
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// Apply a view saved as a query string
    #[arg(long, value_name = "QUERY")]
    query: Option<String>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ChartArg {
    Splits,
    Race,
    Position,
    SplitPosition,
    PercentBehind,
}

impl From<ChartArg> for ChartType {
    fn from(chart: ChartArg) -> Self {
        match chart {
            ChartArg::Splits => ChartType::SplitsGraph,
            ChartArg::Race => ChartType::RaceGraph,
            ChartArg::Position => ChartType::PositionAfterLeg,
            ChartArg::SplitPosition => ChartType::SplitPosition,
            ChartArg::PercentBehind => ChartType::PercentBehind,
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn repair_config(cli: &Cli) -> RepairConfig {
    RepairConfig {
        interpolation: if cli.uniform_interpolation {
            Interpolation::Uniform
        } else {
            Interpolation::LegDistance
        },
        allow_equal_finish: !cli.strict_finish,
        ..RepairConfig::default()
    }
}

/// Builds the view from the query string if given, else from the flags
fn view_state(cli: &Cli, results: &Results) -> Result<ViewState, Box<dyn Error>> {
    if let Some(query) = &cli.query {
        return Ok(decode_query(query, results));
    }

    let mut state = ViewState::default_for(results);
    if !cli.classes.is_empty() {
        state.classes = cli
            .classes
            .iter()
            .map(|name| {
                results
                    .class_index(name)
                    .ok_or_else(|| ResultsError::invalid(format!("No class named '{}'", name)))
            })
            .collect::<Result<Vec<_>, _>>()?;
    }
    if let Some(chart) = cli.chart {
        state.chart_type = chart.into();
    }
    state.show_original = cli.show_original;
    Ok(state)
}

// ============================================================================
// MAIN
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut results = load_results(&cli.input).await?;
    let mut state = view_state(&cli, &results)?;

    if cli.no_repair {
        debug!("Repair disabled, keeping original times");
    } else if results.needs_repair() {
        let notes = Repairer::new(repair_config(&cli)).repair(&mut results);
        info!("Repaired times of {} competitor(s)", notes.len());
    }
    if state.show_original {
        debug!("Showing original times");
        Repairer::restore_original_times(&mut results);
    }
    results.compute_ranks();
    results.determine_time_losses();
    print_warnings(&results.warnings);

    let set = results.course_class_set(&state.classes)?;
    if let Some(compare) = &cli.compare {
        state.comparison = Comparison::parse(compare, &set)?;
    }

    let mut selection = CompetitorSelection::new(set.len());
    selection.set(&state.selected)?;
    if selection.selected_indexes().is_empty() {
        selection.select_all();
    }

    let options = OutputOptions {
        show_original: state.show_original,
        show_ranks: true,
        csv_path: cli.csv.clone(),
    };
    print_class_set(&set, &options);

    if cli.chart.is_some() || cli.query.is_some() {
        if state.chart_type.is_results_table() {
            debug!("Results table selected, no chart to print");
        } else {
            match state.comparison.reference_cum_times(&set)? {
                Some(reference) => {
                    let data = set.chart_data(&reference, &selection.selected_indexes(), state.chart_type)?;
                    println!("\nCompared with: {}", state.comparison);
                    print_chart_data(&data, state.chart_type.y_axis_label());
                }
                None => println!("\nNo reference times for '{}'", state.comparison),
            }
        }
    }

    write_csv_file(&set, &options)?;

    println!("\nQuery: {}", encode_query("", &results, &set, &state));
    Ok(())
}
