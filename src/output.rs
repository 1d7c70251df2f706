use crate::chart::ChartData;
use crate::competitor::Competitor;
use crate::course_class_set::CourseClassSet;
use crate::time::{format_time, Time};
use serde::Serialize;
use std::error::Error;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

// ============================================================================
// OUTPUT OPTIONS
// ============================================================================

/// Configuration for output display and export
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// The results hold the times as read rather than as repaired
    pub show_original: bool,
    pub show_ranks: bool,
    /// Where to write the CSV export, if anywhere
    pub csv_path: Option<PathBuf>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        OutputOptions {
            show_original: false,
            show_ranks: true,
            csv_path: None,
        }
    }
}

// ============================================================================
// CSV OUTPUT
// ============================================================================

/// One leg of one competitor, as written to the CSV export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitRow {
    pub class: String,
    pub position: Option<u32>,
    pub name: String,
    pub club: String,
    pub total_time: String,
    pub control: String,
    pub split_time: String,
    pub split_rank: Option<u32>,
    pub cumulative_time: String,
    pub cumulative_rank: Option<u32>,
    pub dubious: bool,
}

/// Label of the control a leg ends at; the last leg ends at the finish
fn control_label(control: usize, num_controls: usize) -> String {
    if control > num_controls {
        "F".to_string()
    } else {
        control.to_string()
    }
}

fn times_for(competitor: &Competitor) -> (Vec<Option<Time>>, Vec<Option<Time>>) {
    let cum_times = competitor.cum_times().to_vec();
    let splits = (1..cum_times.len())
        .map(|i| crate::time::subtract(cum_times[i], cum_times[i - 1]))
        .collect();
    (cum_times, splits)
}

/// Builds the export rows for every competitor in the set, in set order
pub fn split_rows(set: &CourseClassSet<'_>, options: &OutputOptions) -> Vec<SplitRow> {
    let num_controls = set.num_controls();
    let mut rows = Vec::new();

    for (index, competitor) in set.competitors().enumerate() {
        let (cum_times, splits) = times_for(competitor);
        let class = set.class_name_of(index).unwrap_or_default().to_string();
        let position = set.position(index).ok().flatten();

        for control in 1..=num_controls + 1 {
            let (split_rank, cumulative_rank) = if options.show_ranks {
                (
                    set.split_rank_to(index, control).ok().flatten(),
                    set.cumulative_rank_to(index, control).ok().flatten(),
                )
            } else {
                (None, None)
            };

            rows.push(SplitRow {
                class: class.clone(),
                position,
                name: competitor.full_name(),
                club: competitor.club.clone(),
                total_time: format_time(competitor.total_time),
                control: control_label(control, num_controls),
                split_time: format_time(splits.get(control - 1).copied().flatten()),
                split_rank,
                cumulative_time: format_time(cum_times.get(control).copied().flatten()),
                cumulative_rank,
                dubious: competitor.is_split_time_dubious(control),
            });
        }
    }
    rows
}

/// Writes one row per competitor and leg
pub fn write_csv<W: Write>(writer: W, set: &CourseClassSet<'_>, options: &OutputOptions) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in split_rows(set, options) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the CSV export to `options.csv_path`, if set
pub fn write_csv_file(set: &CourseClassSet<'_>, options: &OutputOptions) -> Result<(), Box<dyn Error>> {
    if let Some(path) = &options.csv_path {
        let file = File::create(path)?;
        write_csv(file, set, options)?;
        println!("Splits written to {}", path.display());
    }
    Ok(())
}

// ============================================================================
// OUTPUT FORMATTING
// ============================================================================

/// Prints any warnings raised while loading or repairing
pub fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!("Warnings:");
    for warning in warnings {
        println!("  {}", warning);
    }
}

/// Prints every competitor of the set with their splits
pub fn print_class_set(set: &CourseClassSet<'_>, options: &OutputOptions) {
    let names: Vec<&str> = set.classes().iter().map(|class| class.name.as_str()).collect();
    let num_controls = set.num_controls();

    println!("\nClass: {} ({} controls)", names.join(", "), num_controls);
    if options.show_original {
        println!("Showing original times");
    }
    println!("{:-<80}", "");

    for (index, competitor) in set.competitors().enumerate() {
        let position = match set.position(index).ok().flatten() {
            Some(p) => format!("{:3}", p),
            None => "---".to_string(),
        };
        let status = if competitor.is_disqualified() {
            " dsq"
        } else if competitor.is_non_competitive() {
            " n/c"
        } else if competitor.is_non_finisher() {
            " dnf"
        } else {
            ""
        };
        println!(
            "{}. {:25} {:20} {}{}",
            position,
            competitor.full_name(),
            competitor.club,
            format_time(competitor.total_time),
            status
        );

        let (cum_times, splits) = times_for(competitor);
        print!("    Splits:");
        for control in 1..=num_controls + 1 {
            let split = format_time(splits.get(control - 1).copied().flatten());
            let marker = if competitor.is_split_time_dubious(control) {
                "?"
            } else {
                ""
            };
            match set.split_rank_to(index, control).ok().flatten().filter(|_| options.show_ranks) {
                Some(rank) => print!(" {}={}{} ({})", control_label(control, num_controls), split, marker, rank),
                None => print!(" {}={}{}", control_label(control, num_controls), split, marker),
            }
        }
        println!();

        print!("    Cumulative:");
        for control in 1..=num_controls + 1 {
            let cumulative = format_time(cum_times.get(control).copied().flatten());
            match set.cumulative_rank_to(index, control).ok().flatten().filter(|_| options.show_ranks) {
                Some(rank) => print!(" {}={} ({})", control_label(control, num_controls), cumulative, rank),
                None => print!(" {}={}", control_label(control, num_controls), cumulative),
            }
        }
        println!();
    }
}

/// Prints chart series as a table, one row per x position
pub fn print_chart_data(data: &ChartData, y_axis_label: &str) {
    println!("\n{} (x from {:.2} to {:.2})", y_axis_label, data.x_extent.0, data.x_extent.1);
    println!("{:-<80}", "");
    print!("{:>10}", "x");
    for name in &data.competitor_names {
        print!(" {:>20}", name);
    }
    println!();

    for column in &data.data_columns {
        print!("{:>10.2}", column.x);
        for y in &column.ys {
            match y {
                Some(y) => print!(" {:>20.2}", y),
                None => print!(" {:>20}", "-"),
            }
        }
        println!();
    }
}
