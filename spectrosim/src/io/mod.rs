//! Table loading and plain-text export

pub mod ascii;
pub mod etc;
pub mod magnitude;
pub mod params;

pub use ascii::AsciiWriter;
pub use etc::{EtcError, EtcTable};
pub use magnitude::{MagnitudeError, MagnitudeSource};
pub use params::{ParamError, RunSettings};
