use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use trip_atlas_timetable::export_stop_locations::export_stop_locations;
use trip_atlas_timetable::pattern_times::PatternTimes;
use trip_atlas_timetable::prepare_gtfs::import_gtfs;
use trip_atlas_timetable::snapshot::write_snapshot;
use trip_atlas_timetable::validation::check_quality;
use trip_atlas_timetable::{ColumnTable, Container, ImportOptions, LoadOptions};

#[derive(Debug, Parser)]
#[command(about = "Build and inspect timetable snapshots")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert a GTFS feed into a timetable snapshot.
    Import {
        gtfs_dir: PathBuf,
        output: PathBuf,

        /// First day of the service calendar (YYYY-MM-DD)
        #[arg(long)]
        calendar_start: Option<NaiveDate>,

        /// Number of days covered by the service calendar
        #[arg(long, default_value_t = 32)]
        days: u32,

        /// UTC offset of the feed's timezone in seconds
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        utc_offset: i32,
    },
    /// Print metadata, table sizes and data quality issues of a snapshot.
    Inspect {
        snapshot: PathBuf,

        /// Skip reference validation while loading
        #[arg(long)]
        no_validate: bool,
    },
    /// Write the stop points of a snapshot as JSON.
    ExportStops { snapshot: PathBuf, output: PathBuf },
    /// List the journey patterns serving a stop point.
    PatternsAtStop { snapshot: PathBuf, stop_id: String },
}

fn main() -> Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()?;

    match Args::parse().command {
        Command::Import {
            gtfs_dir,
            output,
            calendar_start,
            days,
            utc_offset,
        } => {
            let options = ImportOptions {
                calendar_start,
                n_days: days,
                utc_offset,
            };
            let container = import_gtfs(&gtfs_dir, &options)
                .with_context(|| format!("importing GTFS feed {:?}", gtfs_dir))?;
            check_quality(&container);
            write_snapshot(&container, &output)?;
        }
        Command::Inspect {
            snapshot,
            no_validate,
        } => {
            let container = Container::open_with(
                &snapshot,
                LoadOptions {
                    validate: !no_validate,
                    ..LoadOptions::default()
                },
            )
            .with_context(|| format!("loading {:?}", snapshot))?;
            inspect(&container)?;
        }
        Command::ExportStops { snapshot, output } => {
            let container = Container::open(&snapshot)?;
            export_stop_locations(&container, &output)?;
        }
        Command::PatternsAtStop { snapshot, stop_id } => {
            let container = Container::open(&snapshot)?;
            let stop = container
                .find_stop_point(&stop_id)
                .with_context(|| format!("no stop point with id {stop_id:?}"))?;
            let pool = container.pool();
            for &pattern in container.journey_patterns_at_stop(stop) {
                let line = container
                    .journey_patterns()
                    .route(pattern)
                    .and_then(|route| container.routes().line(route));
                let code = line
                    .and_then(|line| container.lines().code(pool, line))
                    .unwrap_or("?");
                let headsign = container
                    .journey_patterns()
                    .points_range(pattern, container.journey_pattern_points().len())
                    .and_then(|points| {
                        container
                            .journey_pattern_points()
                            .headsign(pool, points.start)
                    })
                    .unwrap_or("");
                println!("{pattern}\t{code}\t{headsign}");
            }
        }
    }
    Ok(())
}

fn inspect(container: &Container) -> Result<()> {
    let metadata = container.metadata();
    println!(
        "calendar start: {}",
        container
            .calendar_start()
            .map(|start| start.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    );
    println!("days: {}", metadata.n_days);
    println!(
        "timezone: {} (UTC offset {}s)",
        container.timezone_name().unwrap_or("unknown"),
        metadata.utc_offset
    );
    for (name, size) in container.table_sizes() {
        println!("{name}: {size}");
    }

    let times = PatternTimes::build(container)?;
    println!(
        "latest arrival: {}s after midnight",
        trip_atlas_timetable::index::rtime_to_seconds(times.max_time)
    );

    let report = check_quality(container);
    println!("quality issues: {}", report.issues.len());
    Ok(())
}
