//! Simulation configuration.
//!
//! All run parameters live in one immutable, typed struct that is validated
//! once at construction. String-valued inputs (parameter files, command
//! lines) are converted by the parsers in [`crate::io::params`] before the
//! engine ever sees them.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::io::magnitude::MagnitudeSource;

/// Configuration errors, all fatal before any simulation work
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("exposure count must be at least 1")]
    InvalidExposureCount,

    #[error("realization count must be at least 1")]
    InvalidRealizationCount,

    #[error("sky subtraction floor must be non-negative, got {0}")]
    InvalidSkyFloor(f64),

    #[error("counts floor must be positive, got {0}")]
    InvalidCountsFloor(f64),

    #[error(
        "a multi-object magnitude table needs a realization count of 1, \
         got {nobj} objects and {nrealize} realizations"
    )]
    MultiObjectMultiRealization { nobj: usize, nrealize: usize },

    #[error("unrecognized sky subtraction mode \"{0}\" (expected random, residual, or residual2)")]
    UnknownSkyMode(String),
}

/// How residual sky-subtraction systematics enter the noise model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkySubtractionMode {
    /// Systematics are folded into both the generated and reported variance;
    /// no explicit residual term is drawn
    #[default]
    Random,

    /// A per-arm Gaussian scale of the smoothed sky reference is added to
    /// every exposure
    Residual,

    /// Like `Residual`, but the added term is the reference minus its
    /// 3-pixel-shifted copy, modeling a wavelength registration error
    ShiftedResidual,
}

impl SkySubtractionMode {
    /// True for the modes that draw an explicit sky-residual term
    pub fn draws_residual(&self) -> bool {
        !matches!(self, SkySubtractionMode::Random)
    }
}

impl FromStr for SkySubtractionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(SkySubtractionMode::Random),
            "residual" => Ok(SkySubtractionMode::Residual),
            "residual2" => Ok(SkySubtractionMode::ShiftedResidual),
            other => Err(ConfigError::UnknownSkyMode(other.to_string())),
        }
    }
}

impl fmt::Display for SkySubtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SkySubtractionMode::Random => "random",
            SkySubtractionMode::Residual => "residual",
            SkySubtractionMode::ShiftedResidual => "residual2",
        };
        write!(f, "{name}")
    }
}

/// The fiber axis of a run: several objects simulated once each, or one
/// object simulated several times. Never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    /// One fiber per object column of the magnitude table
    ByObject(usize),
    /// One fiber per independent noise realization of a single object
    ByRealization(usize),
}

impl Multiplicity {
    /// Number of fibers along the object/realization axis
    pub fn count(&self) -> usize {
        match self {
            Multiplicity::ByObject(n) | Multiplicity::ByRealization(n) => *n,
        }
    }

    /// Index of the magnitude-matrix column backing a given fiber
    pub fn column_for(&self, fiber: usize) -> usize {
        match self {
            Multiplicity::ByObject(_) => fiber,
            Multiplicity::ByRealization(_) => 0,
        }
    }

    /// Resolve the fiber axis from the magnitude-table width and the
    /// configured realization count, rejecting the ambiguous combination.
    pub fn resolve(nobj: usize, nrealize: usize) -> Result<Self, ConfigError> {
        if nrealize == 0 {
            return Err(ConfigError::InvalidRealizationCount);
        }
        if nobj > 1 {
            if nrealize > 1 {
                return Err(ConfigError::MultiObjectMultiRealization { nobj, nrealize });
            }
            Ok(Multiplicity::ByObject(nobj))
        } else {
            Ok(Multiplicity::ByRealization(nrealize))
        }
    }
}

/// Catalog identity carried onto each simulated fiber
#[derive(Debug, Clone, PartialEq)]
pub struct TargetIdentity {
    pub cat_id: i32,
    pub obj_id: i64,
    pub fiber_id: u32,
    /// Right ascension, degrees
    pub ra: f64,
    /// Declination, degrees
    pub dec: f64,
    pub tract: i32,
    pub patch: String,
}

impl Default for TargetIdentity {
    fn default() -> Self {
        Self {
            cat_id: 0,
            obj_id: 1,
            fiber_id: 1,
            ra: 150.0,
            dec: 2.0,
            tract: 0,
            patch: "0,0".to_string(),
        }
    }
}

/// Run parameters for one simulated visit
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Path to the ETC throughput/noise table
    pub etc_path: PathBuf,

    /// Where target magnitudes come from
    pub magnitudes: MagnitudeSource,

    /// Number of synthetic exposures averaged into each spectrum
    pub exposure_count: u32,

    /// Number of noise realizations (single-object input only)
    pub realization_count: u32,

    /// Substitute for zero counts in the noise estimate
    pub counts_floor: f64,

    /// Fractional sky-subtraction accuracy
    pub sky_sub_floor: f64,

    pub sky_sub_mode: SkySubtractionMode,

    pub visit: u32,
    pub spectrograph: u32,

    /// Identity of the first fiber; ids of further fibers count up from it
    pub base_target: TargetIdentity,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            etc_path: PathBuf::from("out/ref.snc.dat"),
            magnitudes: MagnitudeSource::Constant(22.5),
            exposure_count: 8,
            realization_count: 1,
            counts_floor: 0.1,
            sky_sub_floor: 0.01,
            sky_sub_mode: SkySubtractionMode::Random,
            visit: 1,
            spectrograph: 1,
            base_target: TargetIdentity::default(),
        }
    }
}

impl SimulationConfig {
    /// Check the scalar fields. The multiplicity invariant is checked
    /// against the magnitude table once its width is known, before any
    /// per-pixel allocation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exposure_count == 0 {
            return Err(ConfigError::InvalidExposureCount);
        }
        if self.realization_count == 0 {
            return Err(ConfigError::InvalidRealizationCount);
        }
        if self.sky_sub_floor < 0.0 || !self.sky_sub_floor.is_finite() {
            return Err(ConfigError::InvalidSkyFloor(self.sky_sub_floor));
        }
        if self.counts_floor <= 0.0 || !self.counts_floor.is_finite() {
            return Err(ConfigError::InvalidCountsFloor(self.counts_floor));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            "random".parse::<SkySubtractionMode>().unwrap(),
            SkySubtractionMode::Random
        );
        assert_eq!(
            "residual".parse::<SkySubtractionMode>().unwrap(),
            SkySubtractionMode::Residual
        );
        assert_eq!(
            "residual2".parse::<SkySubtractionMode>().unwrap(),
            SkySubtractionMode::ShiftedResidual
        );
        assert!(matches!(
            "Random".parse::<SkySubtractionMode>(),
            Err(ConfigError::UnknownSkyMode(_))
        ));
    }

    #[test]
    fn test_mode_display_round_trip() {
        for mode in [
            SkySubtractionMode::Random,
            SkySubtractionMode::Residual,
            SkySubtractionMode::ShiftedResidual,
        ] {
            assert_eq!(mode.to_string().parse::<SkySubtractionMode>(), Ok(mode));
        }
    }

    #[test]
    fn test_multiplicity_resolution() {
        assert_eq!(
            Multiplicity::resolve(1, 1).unwrap(),
            Multiplicity::ByRealization(1)
        );
        assert_eq!(
            Multiplicity::resolve(1, 50).unwrap(),
            Multiplicity::ByRealization(50)
        );
        assert_eq!(
            Multiplicity::resolve(3, 1).unwrap(),
            Multiplicity::ByObject(3)
        );
        assert_eq!(
            Multiplicity::resolve(3, 2),
            Err(ConfigError::MultiObjectMultiRealization {
                nobj: 3,
                nrealize: 2
            })
        );
        assert_eq!(
            Multiplicity::resolve(1, 0),
            Err(ConfigError::InvalidRealizationCount)
        );
    }

    #[test]
    fn test_multiplicity_column_mapping() {
        let by_object = Multiplicity::ByObject(3);
        assert_eq!(by_object.column_for(2), 2);
        let by_realization = Multiplicity::ByRealization(3);
        assert_eq!(by_realization.column_for(2), 0);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_counts_rejected() {
        let mut config = SimulationConfig {
            exposure_count: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidExposureCount));

        config.exposure_count = 1;
        config.realization_count = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidRealizationCount));

        config.realization_count = 1;
        config.sky_sub_floor = -0.5;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSkyFloor(-0.5)));

        config.sky_sub_floor = 0.01;
        config.counts_floor = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidCountsFloor(0.0)));
    }
}
