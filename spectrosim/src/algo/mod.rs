//! General-purpose numerical algorithms

pub mod interp;
pub mod window;

pub use interp::{interp_onto, InterpError};
pub use window::{neighbor_max, Edge};
