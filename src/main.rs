use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Mutex;
use std::time::Instant;

use color_interp::{build_channels, BatchScheduler, GridSpec, InterpolationConfig, InterpolationResult};

mod cli;
mod io;
mod text;

use cli::Args;

/// Main entry point for the color-interp tool.
///
/// Reads the calibration tables, builds one interpolator per channel, evaluates
/// the query grid in parallel and writes the results to a CSV file.
fn main() -> Result<()> {
    env_logger::init();
    let start_time = Instant::now();
    let args = Args::parse();

    let line = "-".repeat(72);
    let dline = "=".repeat(72);

    println!(
        "\n{}\n{}\nTool for predicting color response from sparse calibration samples.\nPart of the {} toolkit.\n{}\n",
        format!(
            "{} {}",
            text::highlight("Color Response Interpolator"),
            env!("CARGO_PKG_VERSION")
        ),
        line,
        text::highlight("color-interp"),
        dline
    );

    let mut config = InterpolationConfig::from_app_config(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    args.apply(&mut config);
    config.validate()?;

    if !(2..=3).contains(&args.dim) {
        bail!("Unsupported dimension {}. Please use 2 or 3.", args.dim);
    }
    let grid = GridSpec::uniform(args.dim, args.grid_min, args.grid_max, args.grid_step)
        .context("Invalid query grid")?;
    let scheduler = BatchScheduler::from_config(&config);

    println!("{} Configuration:", text::bold("Interpolation"));
    println!("  {:<20} {}", "Calibration Files:", args.inputs.len());
    println!("  {:<20} {}", "Output File:", args.output.display());
    println!("  {:<20} {}", "Strategy:", config.strategy);
    println!("  {:<20} {}", "Outside Hull:", config.outside_hull);
    println!("  {:<20} {}", "Solver:", config.solver);
    println!(
        "  {:<20} {}..={} step {} ({} points)",
        "Query Grid:",
        args.grid_min,
        args.grid_max,
        args.grid_step,
        grid.len()
    );
    println!(
        "  {:<20} {} (chunks of {})",
        "Parallel Jobs:",
        scheduler.jobs(),
        scheduler.chunk_size()
    );
    println!("{}\n", dline);

    let mut part_time = Instant::now();

    let mut tables = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        let pairs = io::read_calibration(path, args.dim)?;
        println!(
            "{}\n  {}",
            io::channel_name(path),
            text::light(format!("└─{} {} samples from {}", text::ARROW, pairs.len(), path.display()))
        );
        tables.push((io::channel_name(path), pairs));
    }
    println!(
        "{} Calibration tables read in {:.2} seconds.",
        text::check_icon(),
        part_time.elapsed().as_secs_f64()
    );
    part_time = Instant::now();

    let build = build_channels(tables, &config);
    for (name, error) in &build.failures {
        println!("{} {}: {}", text::cross_icon(), text::bold(name), text::error(error.to_string()));
    }
    if build.channels.is_empty() {
        bail!("No channel could be built from the calibration data.");
    }
    println!(
        "{} {} of {} channels triangulated in {:.2} seconds.",
        text::check_icon(),
        build.channels.len(),
        build.channels.len() + build.failures.len(),
        part_time.elapsed().as_secs_f64()
    );
    part_time = Instant::now();

    let queries = grid.points();
    let printing = Mutex::new(());
    text::progress("Interpolating", 0, 1);
    let results = scheduler.run_with_progress(&queries, &build.channels, |done, total| {
        if let Ok(_guard) = printing.lock() {
            text::progress("Interpolating", done, total);
        }
    })?;
    text::finish_progress();
    println!(
        "{} {} grid points interpolated in {:.2} seconds.",
        text::check_icon(),
        queries.len(),
        part_time.elapsed().as_secs_f64()
    );
    part_time = Instant::now();

    println!("{}", line);
    for (name, map) in &results {
        let inside = map.values().filter(|r| r.is_inside()).count();
        let failed = map
            .values()
            .filter(|r| matches!(r, InterpolationResult::Failed(_)))
            .count();
        let outside = map.len() - inside - failed;
        let summary = format!("{} inside, {} outside, {} failed", inside, outside, failed);
        if failed > 0 {
            println!("  {:<20} {}", name, text::warning(summary));
        } else {
            println!("  {:<20} {}", name, summary);
        }
    }
    println!("{}", line);

    io::write_results(&args.output, &results, &queries, args.dim)?;
    println!(
        "{} Output file written in {:.2} seconds.",
        text::check_icon(),
        part_time.elapsed().as_secs_f64()
    );

    println!("{}", line);
    if build.failures.is_empty() {
        println!("{}", text::success("Interpolation completed successfully."));
    } else {
        println!(
            "{}: {} channel(s) skipped.",
            text::warning("Warning"),
            build.failures.len()
        );
    }
    println!("Total elapsed time: {:.2} seconds.", start_time.elapsed().as_secs_f64());
    println!();

    Ok(())
}
