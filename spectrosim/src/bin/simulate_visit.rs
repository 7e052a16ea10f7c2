//! Simulate one visit of noisy fiber spectra from an ETC table

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use spectrosim::io::ascii::AsciiWriter;
use spectrosim::io::magnitude::MagnitudeSource;
use spectrosim::io::params::RunSettings;
use spectrosim::Simulator;

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulate noisy fiber spectrograph spectra")]
struct Args {
    /// Parameter file in "KEY value" format; flags below override its values
    #[arg(long)]
    params: Option<PathBuf>,

    /// ETC throughput/noise table
    #[arg(long)]
    etc_file: Option<PathBuf>,

    /// Constant AB magnitude, or path to a magnitude table with one column
    /// per object
    #[arg(long)]
    mag_file: Option<String>,

    /// Number of synthetic exposures averaged into each spectrum
    #[arg(long)]
    exp_num: Option<u32>,

    /// Number of noise realizations (single-object input only)
    #[arg(long)]
    nrealize: Option<u32>,

    /// Sky subtraction mode: random, residual, or residual2
    #[arg(long)]
    sky_sub_mode: Option<String>,

    /// Fractional sky subtraction accuracy floor
    #[arg(long)]
    sky_sub_floor: Option<f64>,

    /// Substitute for zero counts in the noise estimate
    #[arg(long)]
    counts_min: Option<f64>,

    /// Visit number recorded in every output identity
    #[arg(long)]
    visit: Option<u32>,

    /// Id of the first fiber; further fibers count up from it
    #[arg(long)]
    fiber_id: Option<u32>,

    /// Output directory, created if missing
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Stem of the per-fiber ASCII tables
    #[arg(long)]
    ascii_table: Option<String>,

    /// Seed for reproducible noise draws
    #[arg(long)]
    seed: Option<u64>,
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = match &args.params {
        Some(path) => RunSettings::from_path(path)?,
        None => RunSettings::default(),
    };

    if let Some(path) = args.etc_file {
        settings.config.etc_path = path;
    }
    if let Some(value) = args.mag_file {
        settings.config.magnitudes = MagnitudeSource::parse(&value);
    }
    if let Some(count) = args.exp_num {
        settings.config.exposure_count = count;
    }
    if let Some(count) = args.nrealize {
        settings.config.realization_count = count;
    }
    if let Some(mode) = args.sky_sub_mode {
        settings.config.sky_sub_mode = mode.parse()?;
    }
    if let Some(floor) = args.sky_sub_floor {
        settings.config.sky_sub_floor = floor;
    }
    if let Some(floor) = args.counts_min {
        settings.config.counts_floor = floor;
    }
    if let Some(visit) = args.visit {
        settings.config.visit = visit;
    }
    if let Some(fiber_id) = args.fiber_id {
        settings.config.base_target.fiber_id = fiber_id;
    }
    if let Some(dir) = args.out_dir {
        settings.out_dir = dir;
    }
    if let Some(stem) = args.ascii_table {
        settings.ascii_stem = Some(stem);
    }

    std::fs::create_dir_all(&settings.out_dir)
        .map_err(|err| format!("unable to create {}: {err}", settings.out_dir.display()))?;

    let simulator = Simulator::new(settings.config)?;
    let visit = simulator.run(args.seed)?;

    let stem = settings.ascii_stem.as_deref().unwrap_or("simulated");
    let mut sink = AsciiWriter::new(&settings.out_dir, stem);
    visit.write_to(&mut sink)?;

    info!(
        "visit {}: {} arms, {} fibers, design 0x{:016x}",
        visit.visit,
        visit.arms.len(),
        visit.design.targets.len(),
        visit.design.design_id
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
