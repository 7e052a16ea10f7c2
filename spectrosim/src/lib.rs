//! Noisy spectrum simulation for a multi-arm fiber spectrograph
//!
//! This crate turns an exposure-time-calculator throughput/noise table and
//! one or more target magnitude spectra into synthetic per-arm spectra:
//! physically scaled flux with drawn noise realizations, a per-pixel
//! variance estimate, sky flux, and a quality mask.

pub mod algo;
pub mod config;
pub mod datamodel;
pub mod io;
pub mod photometry;
pub mod sims;

// Re-exports for easier access
pub use config::{Multiplicity, SimulationConfig, SkySubtractionMode, TargetIdentity};
pub use datamodel::{Arm, ArmSpectrum, DesignRecord, SimulatedVisit, SpectrumSink};
pub use io::etc::EtcTable;
pub use io::magnitude::MagnitudeSource;
pub use photometry::bandpass::{fiber_magnitude, Bandpass, BANDPASSES};
pub use sims::runner::Simulator;
