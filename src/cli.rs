use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::Settings;
use crate::data::loader::load_spectrum;
use crate::data::normalize::{clean_file, normalize_file, NormalizeReport, Persist};
use crate::state::CalibrationState;

#[derive(Debug, Parser)]
#[command(
    name = "tof-calib",
    about = "Maintain peak and background calibrations for ToF mass spectra",
    version
)]
pub struct Cli {
    /// Settings file; defaults apply when it does not exist.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Normalize calibration files and write them back.
    Clean {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show what normalizing a calibration file would change.
    Check { file: PathBuf },

    /// Integrate a spectrum with a calibration's peaks and backgrounds.
    Integrate(IntegrateArgs),
}

#[derive(Debug, Args)]
pub struct IntegrateArgs {
    /// Calibration file (.json).
    pub calibration: PathBuf,

    /// Spectrum file (.csv or .json).
    pub spectrum: PathBuf,

    /// Override the shot count of the spectrum.
    #[arg(long)]
    pub shots: Option<u64>,
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli, &mut std::io::stdout().lock())
}

pub fn run<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };

    match cli.command {
        Commands::Clean { files } => run_clean(&files, out),
        Commands::Check { file } => run_check(&file, out),
        Commands::Integrate(args) => run_integrate(&args, &settings, out),
    }
}

fn run_clean<W: Write>(files: &[PathBuf], out: &mut W) -> Result<()> {
    for file in files {
        let report = clean_file(file).with_context(|| format!("cleaning {}", file.display()))?;
        writeln!(
            out,
            "{}: {} adjusted, {} removed",
            file.display(),
            report.adjusted_count(),
            report.removed_count()
        )?;
        write_details(out, &report)?;
    }
    Ok(())
}

fn run_check<W: Write>(file: &Path, out: &mut W) -> Result<()> {
    let (_, report) = normalize_file(file, Persist::Never)
        .with_context(|| format!("checking {}", file.display()))?;
    if report.has_changes() {
        writeln!(out, "{}: needs cleaning", file.display())?;
        write_details(out, &report)?;
    } else {
        writeln!(out, "{}: clean", file.display())?;
    }
    Ok(())
}

fn run_integrate<W: Write>(args: &IntegrateArgs, settings: &Settings, out: &mut W) -> Result<()> {
    let (state, report) = CalibrationState::open(&args.calibration, settings)
        .with_context(|| format!("opening {}", args.calibration.display()))?;
    if let Some(msg) = &state.status_message {
        log::warn!("{}: {msg}", args.calibration.display());
    }
    write_details(out, &report)?;

    let spectrum = load_spectrum(&args.spectrum, args.shots)
        .with_context(|| format!("loading {}", args.spectrum.display()))?;

    writeln!(out, "peak\tcounts\terror\tnet\terror")?;
    for i in state.integrals(&spectrum) {
        writeln!(
            out,
            "{}\t{:.1}\t{:.1}\t{:.1}\t{:.1}",
            i.peak_name, i.counts, i.counts_error, i.net, i.net_error
        )?;
    }
    Ok(())
}

fn write_details<W: Write>(out: &mut W, report: &NormalizeReport) -> Result<()> {
    for adjustment in &report.adjustments {
        writeln!(out, "  {adjustment}")?;
    }
    for exclusion in &report.exclusions {
        writeln!(out, "  excluded {exclusion}")?;
    }
    if report.reordered {
        writeln!(out, "  reordered")?;
    }
    if report.migrated {
        writeln!(out, "  migrated from legacy layout")?;
    }
    Ok(())
}
