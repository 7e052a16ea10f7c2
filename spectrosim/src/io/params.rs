//! Key-value parameter file parsing.
//!
//! Run parameters may be supplied as a plain text file of `KEY value`
//! lines (`#` starts a comment). Every key is parsed into its typed field
//! in [`RunSettings`] up front; unknown keys and unparsable values are
//! descriptive errors rather than strings carried into the run.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use thiserror::Error;

use crate::config::{ConfigError, SimulationConfig};
use crate::io::magnitude::MagnitudeSource;

/// Errors raised while parsing a parameter file
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("unable to read parameter file {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },

    #[error("parameter file line {line}: expected \"KEY value\"")]
    MalformedLine { line: usize },

    #[error("parameter file line {line}: unknown parameter \"{key}\"")]
    UnknownKey { key: String, line: usize },

    #[error("parameter file line {line}: bad value \"{value}\" for {key}: {reason}")]
    BadValue {
        key: String,
        value: String,
        line: usize,
        reason: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Parameters that belong to external collaborators (FITS persistence,
/// plotting). They are accepted and ignored so existing parameter files
/// keep loading.
const IGNORED_KEYS: [&str; 5] = [
    "writeFits",
    "writePfsArm",
    "plotArmSet",
    "plotObject",
    "pfsConfigFull",
];

/// A full run description: the engine configuration plus the output options
/// that belong to the command-line boundary.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub config: SimulationConfig,

    /// Where output files go
    pub out_dir: PathBuf,

    /// Stem of the per-fiber ASCII tables; `None` disables the export
    pub ascii_stem: Option<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            config: SimulationConfig::default(),
            out_dir: PathBuf::from("out"),
            ascii_stem: None,
        }
    }
}

impl RunSettings {
    /// Parse a parameter file on top of the defaults.
    pub fn from_path(path: &Path) -> Result<Self, ParamError> {
        let contents = fs::read_to_string(path).map_err(|source| ParamError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;

        let mut settings = RunSettings::default();
        for (index, line) in contents.lines().enumerate() {
            let number = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut fields = trimmed.split_whitespace();
            let (key, value) = match (fields.next(), fields.next()) {
                (Some(key), Some(value)) => (key, value),
                _ => return Err(ParamError::MalformedLine { line: number }),
            };
            settings.apply(key, value, number)?;
        }

        settings.config.validate()?;
        Ok(settings)
    }

    fn apply(&mut self, key: &str, value: &str, line: usize) -> Result<(), ParamError> {
        let bad = |reason: &str| ParamError::BadValue {
            key: key.to_string(),
            value: value.to_string(),
            line,
            reason: reason.to_string(),
        };

        macro_rules! parse {
            ($ty:ty, $what:expr) => {
                value.parse::<$ty>().map_err(|_| bad($what))?
            };
        }

        match key {
            "etcFile" => self.config.etc_path = PathBuf::from(value),
            "MAG_FILE" => self.config.magnitudes = MagnitudeSource::parse(value),
            "EXP_NUM" => self.config.exposure_count = parse!(u32, "expected a positive integer"),
            "nrealize" => self.config.realization_count = parse!(u32, "expected a positive integer"),
            "countsMin" => self.config.counts_floor = parse!(f64, "expected a number"),
            "SKY_SUB_FLOOR" => self.config.sky_sub_floor = parse!(f64, "expected a number"),
            "SKY_SUB_MODE" => {
                self.config.sky_sub_mode = value
                    .parse()
                    .map_err(|_| bad("expected random, residual, or residual2"))?
            }
            "visit" => self.config.visit = parse!(u32, "expected an integer"),
            "spectrograph" => self.config.spectrograph = parse!(u32, "expected an integer"),
            "catId" => self.config.base_target.cat_id = parse!(i32, "expected an integer"),
            "objId" => self.config.base_target.obj_id = parse!(i64, "expected an integer"),
            "fiberId" => self.config.base_target.fiber_id = parse!(u32, "expected an integer"),
            "ra" => self.config.base_target.ra = parse!(f64, "expected degrees"),
            "dec" => self.config.base_target.dec = parse!(f64, "expected degrees"),
            "tract" => self.config.base_target.tract = parse!(i32, "expected an integer"),
            "patch" => self.config.base_target.patch = value.to_string(),
            "outDir" => self.out_dir = PathBuf::from(value),
            "asciiTable" => {
                self.ascii_stem = match value {
                    "None" => None,
                    stem => Some(stem.to_string()),
                }
            }
            ignored if IGNORED_KEYS.contains(&ignored) => {
                warn!("parameter {key} is handled outside the simulation engine; ignoring");
            }
            _ => {
                return Err(ParamError::UnknownKey {
                    key: key.to_string(),
                    line,
                })
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SkySubtractionMode;
    use std::io::Write;

    fn write_params(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_full_file() {
        let file = write_params(
            "# simulation setup\n\
             EXP_NUM 4\n\
             MAG_FILE 21.0\n\
             etcFile out/ref.snc.dat\n\
             nrealize 2\n\
             SKY_SUB_FLOOR 0.02\n\
             SKY_SUB_MODE residual2\n\
             countsMin 0.5\n\
             visit 42\n\
             fiberId 7\n\
             outDir sim_out\n\
             asciiTable spectra\n",
        );
        let settings = RunSettings::from_path(file.path()).unwrap();
        assert_eq!(settings.config.exposure_count, 4);
        assert_eq!(settings.config.magnitudes, MagnitudeSource::Constant(21.0));
        assert_eq!(settings.config.realization_count, 2);
        assert_eq!(settings.config.sky_sub_floor, 0.02);
        assert_eq!(
            settings.config.sky_sub_mode,
            SkySubtractionMode::ShiftedResidual
        );
        assert_eq!(settings.config.counts_floor, 0.5);
        assert_eq!(settings.config.visit, 42);
        assert_eq!(settings.config.base_target.fiber_id, 7);
        assert_eq!(settings.out_dir, PathBuf::from("sim_out"));
        assert_eq!(settings.ascii_stem.as_deref(), Some("spectra"));
    }

    #[test]
    fn test_defaults_match_reference_values() {
        let settings = RunSettings::default();
        assert_eq!(settings.config.exposure_count, 8);
        assert_eq!(settings.config.magnitudes, MagnitudeSource::Constant(22.5));
        assert_eq!(settings.config.counts_floor, 0.1);
        assert_eq!(settings.config.sky_sub_floor, 0.01);
        assert_eq!(settings.config.sky_sub_mode, SkySubtractionMode::Random);
        assert_eq!(settings.config.base_target.ra, 150.0);
        assert_eq!(settings.config.base_target.patch, "0,0");
        assert_eq!(settings.out_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let file = write_params("EXPNUM 4\n");
        assert!(matches!(
            RunSettings::from_path(file.path()),
            Err(ParamError::UnknownKey { line: 1, .. })
        ));
    }

    #[test]
    fn test_bad_value_rejected() {
        let file = write_params("EXP_NUM eight\n");
        assert!(matches!(
            RunSettings::from_path(file.path()),
            Err(ParamError::BadValue { line: 1, .. })
        ));
    }

    #[test]
    fn test_bad_mode_rejected() {
        let file = write_params("SKY_SUB_MODE sometimes\n");
        assert!(matches!(
            RunSettings::from_path(file.path()),
            Err(ParamError::BadValue { line: 1, .. })
        ));
    }

    #[test]
    fn test_ascii_none_sentinel() {
        let file = write_params("asciiTable None\n");
        let settings = RunSettings::from_path(file.path()).unwrap();
        assert_eq!(settings.ascii_stem, None);
    }

    #[test]
    fn test_out_of_scope_keys_ignored() {
        let file = write_params("writeFits t\nplotArmSet f\n");
        assert!(RunSettings::from_path(file.path()).is_ok());
    }

    #[test]
    fn test_validation_applies_to_file_values() {
        let file = write_params("nrealize 0\n");
        assert!(matches!(
            RunSettings::from_path(file.path()),
            Err(ParamError::Config(ConfigError::InvalidRealizationCount))
        ));
    }
}
