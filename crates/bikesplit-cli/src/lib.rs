//! Bikesplit CLI - Command line interface for bike split simulation.

use anyhow::{bail, Context, Result};
use bikesplit_sim::params::presets;
use bikesplit_sim::{
    check_bounds, downsample, simulate_with_limits, summarize, Course, CourseSource, SimLimits,
    SimulationParams, SimulationResult, Units,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Public function that can be called from the main binary
pub fn run_cli_main(args: &[&str]) -> Result<()> {
    let args = Args::try_parse_from(args)?;
    main_inner(args)
}

#[derive(Parser, Debug)]
#[command(name = "bikesplit-cli")]
#[command(about = "Predict a bike split from power, aero and course profile")]
#[command(version)]
pub struct Args {
    /// Course JSON: an http(s) URL or a local file
    #[arg(short, long)]
    course: String,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Output file format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// Units for printed statistics
    #[arg(long, default_value = "metric")]
    units: Units,

    /// Downsample exported states to at most this many rows
    #[arg(long)]
    max_points: Option<usize>,

    /// Sweep average power instead of a single run
    #[arg(long)]
    sweep: bool,

    #[arg(long, default_value_t = 5)]
    sweep_steps: usize,

    /// JSON file with simulation params; replaces the flags below
    #[arg(long)]
    params_file: Option<PathBuf>,

    // ── Rider / equipment ─────────────────────────────────────
    #[arg(long, default_value_t = 250.0)]
    power: f64, // W

    #[arg(long, default_value_t = presets::cda::AERO)]
    cda: f64,

    /// upright, drops, aero, optimized, pro
    #[arg(long)]
    cda_preset: Option<String>,

    #[arg(long, default_value_t = presets::crr::AVERAGE)]
    crr: f64,

    /// bad, average, good, excellent
    #[arg(long)]
    crr_preset: Option<String>,

    #[arg(long, default_value_t = presets::drivetrain::AVERAGE)]
    drivetrain_loss: f64, // %

    /// bad, average, good, excellent
    #[arg(long)]
    drivetrain_preset: Option<String>,

    #[arg(long, default_value_t = 75.0)]
    rider_mass: f64,

    #[arg(long, default_value_t = 10.0)]
    bike_mass: f64,

    // ── Environment ───────────────────────────────────────────
    #[arg(long, default_value_t = 20.0)]
    temperature: f64, // °C

    #[arg(long, default_value_t = 0.0)]
    humidity: f64, // %

    // ── Integration ───────────────────────────────────────────
    #[arg(long, default_value_t = 0.1)]
    timestep: f64,

    #[arg(long, default_value_t = 1.0)]
    velocity_min: f64,

    #[arg(long, default_value_t = 10_000_000)]
    max_iterations: u64,

    /// Abort a run after this many seconds of compute
    #[arg(long)]
    timeout_sec: Option<f64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

fn main_inner(args: Args) -> Result<()> {
    println!("Bikesplit Simulator");
    println!("===================\n");

    let params = build_params(&args)?;
    for v in check_bounds(&params) {
        tracing::warn!("{v}");
    }
    let course = load_course(&args.course)?;

    if args.sweep {
        run_sweep(&args, &course, &params)?;
    } else {
        run_single(&args, &course, &params)?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Single Run
// ---------------------------------------------------------------------------
fn run_single(args: &Args, course: &Course, params: &SimulationParams) -> Result<()> {
    println!("Running single simulation...");

    let result = simulate_with_limits(course, params, &build_limits(args))?;
    print_sim_stats(&result, args.units);
    write_output(args, &result)?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Sweep Run
// ---------------------------------------------------------------------------
fn run_sweep(args: &Args, course: &Course, base: &SimulationParams) -> Result<()> {
    let steps = args.sweep_steps;
    if steps < 2 {
        bail!("--sweep-steps must be at least 2");
    }

    let start_power = base.avg_power_watts * 0.5;
    let end_power = base.avg_power_watts * 1.5;
    let limits = build_limits(args);

    std::fs::create_dir_all(&args.output_dir)?;
    let path = args.output_dir.join("sweep_summary.csv");
    let mut wtr = csv::Writer::from_path(&path)?;
    wtr.write_record(["power", "finish_sec", "avg_speed_kmh", "overrides"])?;

    for i in 0..steps {
        let power = start_power + (end_power - start_power) * (i as f64 / (steps - 1) as f64);
        let params = SimulationParams {
            avg_power_watts: power,
            ..*base
        };

        let res = simulate_with_limits(course, &params, &limits)
            .with_context(|| format!("sweep run at {power:.1} W"))?;
        let summary = summarize(&res, Units::Metric);

        println!(
            "Run {}/{} | Power: {:.1} W -> Finish: {} ({:.1} km/h)",
            i + 1,
            steps,
            power,
            summary.predicted_finish,
            summary.avg_speed
        );

        wtr.write_record(&[
            format!("{:.2}", power),
            format!("{:.2}", summary.finish_sec),
            format!("{:.2}", summary.avg_speed),
            summary.override_count.to_string(),
        ])?;
    }

    wtr.flush()?;
    println!("\nSweep complete. Summary at {:?}", path);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_course(arg: &str) -> Result<Course> {
    let source = CourseSource::parse(arg);
    let rt = tokio::runtime::Runtime::new()?;
    let course = rt
        .block_on(source.load())
        .with_context(|| format!("loading course from {source}"))?;
    println!("Loaded course: {} points, {:.1} km", course.data.len(), course.total_distance() / 1000.0);
    Ok(course)
}

fn build_params(args: &Args) -> Result<SimulationParams> {
    if let Some(path) = &args.params_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading params file {}", path.display()))?;
        return serde_json::from_str(&text)
            .with_context(|| format!("parsing params file {}", path.display()));
    }

    Ok(SimulationParams {
        avg_power_watts: args.power,
        avg_cda: preset_or(&presets::CDA, args.cda_preset.as_deref(), args.cda)?,
        avg_crr: preset_or(&presets::CRR, args.crr_preset.as_deref(), args.crr)?,
        loss_drivetrain: preset_or(
            &presets::DRIVETRAIN,
            args.drivetrain_preset.as_deref(),
            args.drivetrain_loss,
        )?,
        mass_bike_kg: args.bike_mass,
        mass_rider_kg: args.rider_mass,
        ambient_temp_celsius: args.temperature,
        relative_humidity: args.humidity,
        timestep: args.timestep,
        velocity_min: args.velocity_min,
    })
}

fn preset_or(table: &[(&str, f64)], name: Option<&str>, value: f64) -> Result<f64> {
    match name {
        Some(n) => presets::lookup(table, n).with_context(|| format!("unknown preset: {n}")),
        None => Ok(value),
    }
}

fn build_limits(args: &Args) -> SimLimits {
    SimLimits {
        max_iterations: args.max_iterations,
        max_wall_time: args.timeout_sec.map(Duration::from_secs_f64),
        cancel: None,
    }
}

fn print_sim_stats(result: &SimulationResult, units: Units) {
    let s = summarize(result, units);

    println!("\nSimulation Stats:");
    println!("  Steps:          {}", result.states.len());
    println!("  Finish:         {}", s.predicted_finish);
    println!("  Avg Speed:      {:.1} {}", s.avg_speed, units.speed_label());
    println!("  Elevation Gain: {:.0} {}", s.total_gain, units.elevation_label());
    println!("  Drag Losses:    {:.1} W", s.avg_drag_watts);
    println!("  Rolling Losses: {:.1} W", s.avg_roll_watts);
    if s.override_count > 0 {
        println!(
            "  Warning: had to go above target power at {} timesteps to make it up a steep hill",
            s.override_count
        );
    }
    println!("  Compute:        {:.3} s", result.meta.compute_sec);
    println!("-----------------------------");
}

fn write_output(args: &Args, result: &SimulationResult) -> Result<()> {
    std::fs::create_dir_all(&args.output_dir)?;
    let states = match args.max_points {
        Some(n) => downsample(&result.states, n),
        None => result.states.clone(),
    };

    let path = match args.format {
        OutputFormat::Csv => {
            let path = args.output_dir.join("simulation.csv");
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record(["t", "x", "v", "alt", "rho", "F_drag", "F_grav", "F_roll"])?;
            for s in &states {
                wtr.write_record(&[
                    format!("{:.2}", s.t),
                    format!("{:.4}", s.x),
                    format!("{:.4}", s.v),
                    format!("{:.4}", s.alt),
                    format!("{:.6}", s.rho),
                    format!("{:.4}", s.f_drag),
                    format!("{:.4}", s.f_grav),
                    format!("{:.4}", s.f_roll),
                ])?;
            }
            wtr.flush()?;
            path
        }
        OutputFormat::Json => {
            let path = args.output_dir.join("simulation.json");
            let out = SimulationResult {
                states,
                ..result.clone()
            };
            let file = std::fs::File::create(&path)?;
            serde_json::to_writer_pretty(std::io::BufWriter::new(file), &out)?;
            path
        }
    };

    println!("Data written to {:?}", path);
    Ok(())
}
