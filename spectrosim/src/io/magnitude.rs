//! Target magnitude sources: constant magnitudes or tabulated spectra.
//!
//! A magnitude source is either a single flat AB magnitude or a whitespace
//! table of wavelength plus one magnitude column per object. Either way the
//! engine sees an nWavelength x nObjects matrix after resampling onto the
//! instrument grid.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::debug;
use ndarray::Array2;
use thiserror::Error;

use crate::algo::interp::{interp_onto, InterpError};

/// Errors raised while reading or resampling magnitude tables
#[derive(Debug, Error)]
pub enum MagnitudeError {
    #[error("unable to read magnitude table {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },

    #[error("magnitude table line {line}: expected {expected} columns, found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("magnitude table line {line}: unparsable value \"{value}\"")]
    BadValue { line: usize, value: String },

    #[error("magnitude table {path} needs a wavelength column and at least one magnitude column")]
    TooFewColumns { path: String },

    #[error("magnitude table {path}: {source}")]
    BadGrid {
        path: String,
        source: InterpError,
    },
}

/// Where target magnitudes come from
#[derive(Debug, Clone, PartialEq)]
pub enum MagnitudeSource {
    /// One flat AB magnitude at every wavelength
    Constant(f64),

    /// Whitespace table: wavelength plus one magnitude column per object
    Table(PathBuf),
}

impl MagnitudeSource {
    /// Interpret a parameter value: numeric literals are constant
    /// magnitudes, anything else names a table on disk.
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<f64>() {
            Ok(mag) => MagnitudeSource::Constant(mag),
            Err(_) => MagnitudeSource::Table(PathBuf::from(value)),
        }
    }

    /// Read the source into memory. Constant sources cannot fail; missing
    /// or malformed tables are fatal configuration errors.
    pub fn load(&self) -> Result<MagnitudeSet, MagnitudeError> {
        match self {
            MagnitudeSource::Constant(mag) => Ok(MagnitudeSet::Constant(*mag)),
            MagnitudeSource::Table(path) => MagnitudeSet::from_path(path),
        }
    }
}

/// A magnitude source read into memory
#[derive(Debug, Clone)]
pub enum MagnitudeSet {
    Constant(f64),
    Table {
        path: PathBuf,
        /// Wavelength samples, nm
        wavelength: Vec<f64>,
        /// One magnitude series per object
        objects: Vec<Vec<f64>>,
    },
}

impl MagnitudeSet {
    fn from_path(path: &Path) -> Result<Self, MagnitudeError> {
        let file = File::open(path).map_err(|source| MagnitudeError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;

        let mut wavelength = Vec::new();
        let mut objects: Vec<Vec<f64>> = Vec::new();
        let mut width = None;

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| MagnitudeError::Unreadable {
                path: path.display().to_string(),
                source,
            })?;
            let number = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            let expected = *width.get_or_insert(fields.len());
            if fields.len() != expected {
                return Err(MagnitudeError::RaggedRow {
                    line: number,
                    expected,
                    found: fields.len(),
                });
            }
            if expected < 2 {
                return Err(MagnitudeError::TooFewColumns {
                    path: path.display().to_string(),
                });
            }
            if objects.is_empty() {
                objects = vec![Vec::new(); expected - 1];
            }

            let mut values = Vec::with_capacity(fields.len());
            for field in &fields {
                values.push(field.parse::<f64>().map_err(|_| MagnitudeError::BadValue {
                    line: number,
                    value: field.to_string(),
                })?);
            }
            // First column is the wavelength, the rest are per-object magnitudes
            wavelength.push(values[0]);
            for (column, &value) in objects.iter_mut().zip(&values[1..]) {
                column.push(value);
            }
        }

        if objects.is_empty() {
            return Err(MagnitudeError::TooFewColumns {
                path: path.display().to_string(),
            });
        }

        debug!(
            "read magnitude table {} ({} samples, {} objects)",
            path.display(),
            wavelength.len(),
            objects.len()
        );
        Ok(MagnitudeSet::Table {
            path: path.to_path_buf(),
            wavelength,
            objects,
        })
    }

    /// Number of object columns; decides the fiber multiplicity before any
    /// per-pixel allocation happens.
    pub fn object_count(&self) -> usize {
        match self {
            MagnitudeSet::Constant(_) => 1,
            MagnitudeSet::Table { objects, .. } => objects.len(),
        }
    }

    /// Resample every object column onto the instrument wavelength grid.
    ///
    /// Grid points outside the table domain clamp to the nearest edge
    /// sample, so partial coverage degrades rather than fails.
    pub fn resample(&self, grid: &[f64]) -> Result<Array2<f64>, MagnitudeError> {
        match self {
            MagnitudeSet::Constant(mag) => Ok(Array2::from_elem((grid.len(), 1), *mag)),
            MagnitudeSet::Table {
                path,
                wavelength,
                objects,
            } => {
                let mut matrix = Array2::zeros((grid.len(), objects.len()));
                for (k, column) in objects.iter().enumerate() {
                    let resampled = interp_onto(grid, wavelength, column).map_err(|source| {
                        MagnitudeError::BadGrid {
                            path: path.display().to_string(),
                            source,
                        }
                    })?;
                    for (i, value) in resampled.into_iter().enumerate() {
                        matrix[[i, k]] = value;
                    }
                }
                Ok(matrix)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn write_table(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_numeric_literal() {
        assert_eq!(MagnitudeSource::parse("22.5"), MagnitudeSource::Constant(22.5));
        assert_eq!(
            MagnitudeSource::parse("mags.dat"),
            MagnitudeSource::Table(PathBuf::from("mags.dat"))
        );
    }

    #[test]
    fn test_constant_resample() {
        let set = MagnitudeSource::Constant(21.0).load().unwrap();
        assert_eq!(set.object_count(), 1);
        let matrix = set.resample(&[400.0, 500.0, 600.0]).unwrap();
        assert_eq!(matrix.dim(), (3, 1));
        assert!(matrix.iter().all(|&m| m == 21.0));
    }

    #[test]
    fn test_table_resample_two_objects() {
        let file = write_table("# lam  obj1  obj2\n400.0 20.0 22.0\n600.0 21.0 22.0\n");
        let set = MagnitudeSource::Table(file.path().to_path_buf())
            .load()
            .unwrap();
        assert_eq!(set.object_count(), 2);

        let matrix = set.resample(&[400.0, 500.0, 600.0]).unwrap();
        assert_eq!(matrix.dim(), (3, 2));
        assert_relative_eq!(matrix[[1, 0]], 20.5, epsilon = 1e-12);
        assert_eq!(matrix[[1, 1]], 22.0);
    }

    #[test]
    fn test_table_clamps_outside_domain() {
        let file = write_table("400.0 20.0\n600.0 21.0\n");
        let set = MagnitudeSource::Table(file.path().to_path_buf())
            .load()
            .unwrap();
        let matrix = set.resample(&[300.0, 700.0]).unwrap();
        assert_eq!(matrix[[0, 0]], 20.0);
        assert_eq!(matrix[[1, 0]], 21.0);
    }

    #[test]
    fn test_missing_table_is_fatal() {
        let source = MagnitudeSource::Table(PathBuf::from("/no/such/table.dat"));
        assert!(matches!(
            source.load(),
            Err(MagnitudeError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_ragged_row_rejected() {
        let file = write_table("400.0 20.0\n500.0 20.0 21.0\n");
        let source = MagnitudeSource::Table(file.path().to_path_buf());
        assert!(matches!(
            source.load(),
            Err(MagnitudeError::RaggedRow {
                line: 2,
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn test_single_column_rejected() {
        let file = write_table("400.0\n500.0\n");
        let source = MagnitudeSource::Table(file.path().to_path_buf());
        assert!(matches!(
            source.load(),
            Err(MagnitudeError::TooFewColumns { .. })
        ));
    }

    #[test]
    fn test_bad_value_rejected() {
        let file = write_table("400.0 twenty\n");
        let source = MagnitudeSource::Table(file.path().to_path_buf());
        assert!(matches!(
            source.load(),
            Err(MagnitudeError::BadValue { line: 1, .. })
        ));
    }
}
