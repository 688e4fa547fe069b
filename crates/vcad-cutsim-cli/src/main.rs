//! cutsim - run G-code against a stock block and inspect cut data.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nalgebra::Point3;
use tracing::info;
use vcad_cutsim::{spawn_simulation, CuttingTable, JsonArtifactSink};
use vcad_cutsim_gcode::{Dialect, Interpreter};
use vcad_cutsim_index::{CutDataIndex, DEFAULT_THRESHOLD};

mod job;

use job::Job;

const REPORT_FILE: &str = "report.json";

#[derive(Parser)]
#[command(name = "cutsim")]
#[command(about = "G-code material removal simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a G-code file against the stock described by a job file
    Run {
        /// G-code program
        gcode: PathBuf,
        /// Job TOML (stock, tools, dialect, simulation settings)
        #[arg(short, long)]
        job: PathBuf,
        /// Directory for the final workpiece, cutting table and run report
        #[arg(short, long, default_value = "cutsim-out")]
        out: PathBuf,
    },
    /// Print the motion commands and tools found in a G-code file
    Parse {
        /// G-code program
        gcode: PathBuf,
        /// Controller dialect (fanuc or siemens)
        #[arg(short, long, default_value = "fanuc", value_parser = Dialect::from_name)]
        dialect: Dialect,
    },
    /// Look up cut data at a point near the simulated toolpath
    Query {
        /// Cutting table written by `run`
        #[arg(short, long)]
        table: PathBuf,
        /// Largest distance from the toolpath that still matches (mm)
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        #[arg(allow_negative_numbers = true)]
        z: f64,
    },
}

fn main() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vcad_cutsim=info,vcad_cutsim_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { gcode, job, out } => run(&gcode, &job, &out),
        Commands::Parse { gcode, dialect } => parse(&gcode, dialect),
        Commands::Query {
            table,
            threshold,
            x,
            y,
            z,
        } => query(&table, threshold, Point3::new(x, y, z)),
    }
}

fn read_gcode(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn run(gcode: &Path, job_path: &Path, out: &Path) -> Result<()> {
    let job = Job::load(job_path)?;
    let program = Interpreter::new(job.dialect)
        .with_variables(job.variables()?)
        .parse_str(&read_gcode(gcode)?);
    info!(
        commands = program.commands.len(),
        tools = program.tools.len(),
        "program parsed"
    );

    let handle = spawn_simulation(job.simulation()?, program.commands)?;
    while !handle.is_finished() {
        eprint!("\rsimulating {:5.1} %", handle.progress() / 10.0);
        thread::sleep(Duration::from_millis(250));
    }
    eprintln!("\rsimulating 100.0 %");
    let mut output = handle.join()?;

    let mut sink = JsonArtifactSink::new(out);
    if let Err(err) = output.export(&mut sink) {
        eprintln!("warning: {err}");
    }
    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let report_path = out.join(REPORT_FILE);
    fs::write(&report_path, serde_json::to_string_pretty(&output.report)?)
        .with_context(|| format!("writing {}", report_path.display()))?;

    let report = &output.report;
    let elapsed = output.frames.last().map_or(0.0, |f| f.elapsed_time);
    println!(
        "{} substeps ({} cutting, {} air, {} unavailable), machining time {:.1} s",
        report.substeps, report.cut_frames, report.air_frames, report.unavailable_frames, elapsed
    );
    for failure in &report.failures {
        println!("line {}: {}", failure.line, failure.message);
    }
    println!("results written to {}", out.display());
    Ok(())
}

fn parse(gcode: &Path, dialect: Dialect) -> Result<()> {
    let program = Interpreter::new(dialect).parse_str(&read_gcode(gcode)?);
    println!("{}", serde_json::to_string_pretty(&program)?);
    Ok(())
}

fn query(table_path: &Path, threshold: f64, point: Point3<f64>) -> Result<()> {
    let text = fs::read_to_string(table_path)
        .with_context(|| format!("reading {}", table_path.display()))?;
    let table = CuttingTable::from_json(&text)
        .with_context(|| format!("parsing {}", table_path.display()))?;
    let index = CutDataIndex::from_table(&table, threshold)?;

    match index.query(&point) {
        Some(sample) => println!("{}", serde_json::to_string_pretty(&sample)?),
        None => println!("no toolpath within {threshold} mm of {point}"),
    }
    Ok(())
}
