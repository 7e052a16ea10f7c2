//! In-memory records for simulated spectra and their observation identity.
//!
//! These are the hand-off types between the simulation engine and the
//! persistence collaborators: one [`ArmSpectrum`] per spectrograph arm per
//! visit, described by a [`DesignRecord`] of per-fiber target identities.
//! Records are built once and never mutated afterwards.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};

use ndarray::{Array2, Array3};

use crate::config::TargetIdentity;

/// One wavelength channel of the spectrograph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arm {
    Blue,
    Red,
    /// Medium-resolution red channel; shares the red wavelength range
    RedMr,
    NearInfrared,
}

/// All arms in canonical enumeration order:
/// blue < red < redMR < nearInfrared
pub const ALL_ARMS: [Arm; 4] = [Arm::Blue, Arm::Red, Arm::RedMr, Arm::NearInfrared];

impl Arm {
    /// Numeric code used in ETC tables and exported data products
    pub fn code(&self) -> u8 {
        match self {
            Arm::Blue => 0,
            Arm::Red => 1,
            Arm::NearInfrared => 2,
            Arm::RedMr => 3,
        }
    }

    /// Decode a table arm code
    pub fn from_code(code: u8) -> Option<Arm> {
        match code {
            0 => Some(Arm::Blue),
            1 => Some(Arm::Red),
            2 => Some(Arm::NearInfrared),
            3 => Some(Arm::RedMr),
            _ => None,
        }
    }

    /// Single-letter arm label
    pub fn letter(&self) -> char {
        match self {
            Arm::Blue => 'b',
            Arm::Red => 'r',
            Arm::NearInfrared => 'n',
            Arm::RedMr => 'm',
        }
    }

    /// Position in the canonical ordering. Note redMR sorts between red and
    /// near-infrared even though its table code is 3.
    fn canonical_index(&self) -> usize {
        match self {
            Arm::Blue => 0,
            Arm::Red => 1,
            Arm::RedMr => 2,
            Arm::NearInfrared => 3,
        }
    }
}

impl Ord for Arm {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_index().cmp(&other.canonical_index())
    }
}

impl PartialOrd for Arm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Identity of one simulated arm spectrum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmIdentity {
    pub visit: u32,
    pub design_id: u64,
    pub spectrograph: u32,
    pub arm: Arm,
}

/// One simulated spectrum block: every fiber of one arm for one visit.
///
/// All arrays share the fiber axis; `covar` keeps three rows per fiber of
/// which only row 0 (the variance) is populated.
#[derive(Debug, Clone)]
pub struct ArmSpectrum {
    pub identity: ArmIdentity,

    /// Fiber id per row of the data arrays
    pub fiber_ids: Vec<u32>,

    /// nFiber x nPixel wavelength, nm
    pub wavelength: Array2<f64>,

    /// nFiber x nPixel flux, 10^-17 erg/s/cm^2/A
    pub flux: Array2<f64>,

    /// nFiber x nPixel integer mask, 0 = unmasked
    pub mask: Array2<i32>,

    /// nFiber x nPixel sky flux, 10^-17 erg/s/cm^2/A
    pub sky: Array2<f64>,

    /// nFiber x 3 x nPixel covariance; row 0 is the variance
    pub covar: Array3<f64>,
}

impl ArmSpectrum {
    pub fn fiber_count(&self) -> usize {
        self.fiber_ids.len()
    }

    pub fn pixel_count(&self) -> usize {
        self.wavelength.ncols()
    }
}

/// One fiber entry of the design record
#[derive(Debug, Clone)]
pub struct DesignTarget {
    pub identity: TargetIdentity,

    /// Fiber magnitudes in the five catalog bands, in catalog order.
    /// NaN where a band has no overlap with the simulated grid.
    pub fiber_mags: [f64; 5],
}

/// Per-visit assignment of fibers to targets
#[derive(Debug, Clone)]
pub struct DesignRecord {
    /// Deterministic hash of the fiber identity tuples
    pub design_id: u64,
    pub targets: Vec<DesignTarget>,
}

impl DesignRecord {
    pub fn new(targets: Vec<DesignTarget>) -> Self {
        let mut hasher = DefaultHasher::new();
        for target in &targets {
            target.identity.fiber_id.hash(&mut hasher);
            target.identity.cat_id.hash(&mut hasher);
            target.identity.obj_id.hash(&mut hasher);
            target.identity.ra.to_bits().hash(&mut hasher);
            target.identity.dec.to_bits().hash(&mut hasher);
        }
        Self {
            design_id: hasher.finish(),
            targets,
        }
    }
}

/// Complete in-memory result of one simulated visit, arms in canonical order
#[derive(Debug, Clone)]
pub struct SimulatedVisit {
    pub design: DesignRecord,
    pub visit: u32,
    pub arms: Vec<ArmSpectrum>,
}

impl SimulatedVisit {
    /// Deliver the design record and every arm spectrum to a persistence
    /// collaborator, in canonical arm order.
    pub fn write_to(&self, sink: &mut dyn SpectrumSink) -> Result<(), Box<dyn Error>> {
        sink.write_design(&self.design, self.visit)?;
        for arm in &self.arms {
            sink.write_arm(arm)?;
        }
        sink.finish()
    }
}

/// Persistence collaborator for simulated spectra.
///
/// Implementations own their output format; the engine guarantees the
/// records it hands over are complete and self-consistent.
pub trait SpectrumSink {
    /// Receive the visit's design/config identity before any spectra
    fn write_design(&mut self, design: &DesignRecord, visit: u32) -> Result<(), Box<dyn Error>>;

    /// Receive one complete arm spectrum
    fn write_arm(&mut self, spectrum: &ArmSpectrum) -> Result<(), Box<dyn Error>>;

    /// All records for the visit have been delivered
    fn finish(&mut self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}
