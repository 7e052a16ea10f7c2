//! Simulation pipeline: sky systematics, flux scaling, realization drawing

pub mod flux;
pub mod runner;
pub mod sky;

pub use flux::{partition_arms, scale_signal, ScaledSignal};
pub use runner::{SimulationError, Simulator};
pub use sky::SkySystematics;
