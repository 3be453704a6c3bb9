//! CLI for the calendar extraction pipeline

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ekp_extract::config::EVENTS_JSON;
use ekp_extract::{run_stage_one, run_stage_two, PipelineConfig, StageOneOutput, StageTwoOptions};

#[derive(Debug, Parser)]
#[command(
    name = "ekp-extract",
    version,
    about = "Extract sport events from the Unified Calendar Plan PDF"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Detect anchors and stitch tables; writes anchors.csv and events.csv.
    Stage1(StageOneArgs),
    /// Parse rows from events.csv into events.json.
    Stage2(StageTwoArgs),
    /// Run both stages.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct StageOneArgs {
    /// Calendar PDF.
    pdf: PathBuf,

    /// Directory for the checkpoint files.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Debug logging and an annotated copy of the PDF.
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Args)]
struct LookupArgs {
    /// Keep only this sport. Repeatable; all sports by default.
    #[arg(long = "sport")]
    sports: Vec<String>,

    /// Country list (`id;name`) replacing the built-in one.
    #[arg(long)]
    countries: Option<PathBuf>,

    /// Discipline list (`sport,discipline`) replacing the built-in one.
    #[arg(long)]
    disciplines: Option<PathBuf>,
}

impl LookupArgs {
    fn options(&self) -> StageTwoOptions {
        StageTwoOptions {
            sports: self.sports.clone(),
            countries: self.countries.clone(),
            disciplines: self.disciplines.clone(),
        }
    }
}

#[derive(Debug, Args)]
struct StageTwoArgs {
    /// Stage-one row checkpoint.
    events_csv: PathBuf,

    /// Output JSON file.
    #[arg(long, default_value = EVENTS_JSON)]
    out: PathBuf,

    #[command(flatten)]
    lookup: LookupArgs,

    /// Debug logging.
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    stage1: StageOneArgs,

    #[command(flatten)]
    lookup: LookupArgs,
}

fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if debug {
        builder.filter_module("ekp_extract", log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn stage_one(args: &StageOneArgs) -> Result<StageOneOutput> {
    let output = run_stage_one(&args.pdf, &args.out_dir, &PipelineConfig::default(), args.debug)
        .with_context(|| format!("stage 1 failed on '{}'", args.pdf.display()))?;

    println!(
        "{} sports, {} rows -> {}",
        output.sports.len(),
        output.rows.len(),
        output.events_csv.display()
    );
    if let Some(debug_pdf) = &output.debug_pdf {
        println!("annotated copy -> {}", debug_pdf.display());
    }
    Ok(output)
}

fn stage_two(events_csv: &Path, out: &Path, lookup: &LookupArgs) -> Result<()> {
    let events = run_stage_two(events_csv, out, &lookup.options())
        .with_context(|| format!("stage 2 failed on '{}'", events_csv.display()))?;
    println!("{} events -> {}", events.len(), out.display());
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Stage1(args) => {
            init_logging(args.debug);
            stage_one(&args)?;
        }
        Commands::Stage2(args) => {
            init_logging(args.debug);
            stage_two(&args.events_csv, &args.out, &args.lookup)?;
        }
        Commands::Run(args) => {
            init_logging(args.stage1.debug);
            let output = stage_one(&args.stage1)?;
            let out = args.stage1.out_dir.join(EVENTS_JSON);
            stage_two(&output.events_csv, &out, &args.lookup)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
