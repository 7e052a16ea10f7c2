//! Photometry models and utilities

pub mod bandpass;
pub mod trapezoid;

pub use bandpass::{fiber_magnitude, Bandpass, BandpassError, BANDPASSES};
pub use trapezoid::trap_integrate;
