//! Exposure-time-calculator table loading.
//!
//! The ETC produces one row per detector pixel. Of its columns this engine
//! consumes the arm code, wavelength, total noise variance, counts
//! conversion, sampling factor, and sky flux, plus a single header value:
//! the exposure count the table's variances were computed for.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;

use log::debug;
use thiserror::Error;

use crate::datamodel::Arm;

/// Table columns consumed, by zero-based index
const COL_ARM: usize = 0;
const COL_WAVELENGTH: usize = 2;
const COL_NOISE_VARIANCE: usize = 5;
const COL_COUNTS_CONVERSION: usize = 8;
const COL_SAMPLING_FACTOR: usize = 9;
const COL_SKY: usize = 10;
const MIN_COLUMNS: usize = 11;

/// Counts-conversion values below this are clamped up to it
const COUNTS_CONVERSION_FLOOR: f64 = 1.0e26;

/// Errors raised while reading an ETC table; all are fatal configuration
/// errors per the one-shot batch model.
#[derive(Debug, Error)]
pub enum EtcError {
    #[error("unable to read ETC table {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },

    #[error("ETC table line {line}: expected at least {MIN_COLUMNS} columns, found {found}")]
    ShortRow { line: usize, found: usize },

    #[error("ETC table line {line}: unparsable value \"{value}\"")]
    BadValue { line: usize, value: String },

    #[error("ETC table line {line}: unknown arm code {code}")]
    UnknownArm { line: usize, code: i64 },

    #[error("ETC table line {line}: unparsable EXP_NUM header")]
    BadReferenceExposures { line: usize },

    #[error("ETC table has no EXP_NUM reference exposure count")]
    MissingReferenceExposures,

    #[error("ETC table has no data rows")]
    Empty,

    #[error("ETC table row {row}: wavelength must increase within an arm block")]
    NonMonotonicWavelength { row: usize },

    #[error("ETC table row {row}: arm {arm} appears in more than one block")]
    SplitArmBlock { row: usize, arm: Arm },
}

/// Per-pixel throughput and noise data for one instrument configuration.
///
/// Rows are ordered as in the file: one contiguous block per arm, with
/// wavelength increasing inside each block.
#[derive(Debug, Clone)]
pub struct EtcTable {
    pub arm: Vec<Arm>,

    /// Wavelength, nm
    pub wavelength: Vec<f64>,

    /// Total per-pixel (instrument + sky) noise variance, counts^2
    pub noise_variance: Vec<f64>,

    /// Conversion from flux density to counts
    pub counts_conversion: Vec<f64>,

    /// Sampling fiddle factor for the Poisson noise term
    pub sampling_factor: Vec<f64>,

    /// Sky flux, counts
    pub sky_counts: Vec<f64>,

    /// Exposure count the table's variances were computed for
    pub reference_exposures: u32,
}

impl EtcTable {
    /// Read and validate a table from disk.
    pub fn from_path(path: &Path) -> Result<Self, EtcError> {
        let file = File::open(path).map_err(|source| EtcError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;

        let mut table = EtcTable {
            arm: Vec::new(),
            wavelength: Vec::new(),
            noise_variance: Vec::new(),
            counts_conversion: Vec::new(),
            sampling_factor: Vec::new(),
            sky_counts: Vec::new(),
            reference_exposures: 0,
        };
        let mut reference_exposures = None;

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| EtcError::Unreadable {
                path: path.display().to_string(),
                source,
            })?;
            let number = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('#') {
                if trimmed.contains("EXP_NUM") {
                    // Header format puts the count in the third token
                    let count = trimmed
                        .split_whitespace()
                        .nth(2)
                        .and_then(|token| token.parse::<u32>().ok())
                        .ok_or(EtcError::BadReferenceExposures { line: number })?;
                    reference_exposures = Some(count);
                }
                continue;
            }
            table.push_row(trimmed, number)?;
        }

        if table.arm.is_empty() {
            return Err(EtcError::Empty);
        }
        table.reference_exposures =
            reference_exposures.ok_or(EtcError::MissingReferenceExposures)?;
        table.check_blocks()?;

        debug!(
            "read ETC table {} ({} pixels, reference exposures {})",
            path.display(),
            table.len(),
            table.reference_exposures
        );
        Ok(table)
    }

    fn push_row(&mut self, row: &str, line: usize) -> Result<(), EtcError> {
        let fields: Vec<&str> = row.split_whitespace().collect();
        if fields.len() < MIN_COLUMNS {
            return Err(EtcError::ShortRow {
                line,
                found: fields.len(),
            });
        }

        let parse = |column: usize| -> Result<f64, EtcError> {
            fields[column].parse::<f64>().map_err(|_| EtcError::BadValue {
                line,
                value: fields[column].to_string(),
            })
        };

        let code = parse(COL_ARM)? as i64;
        let arm = u8::try_from(code)
            .ok()
            .and_then(Arm::from_code)
            .ok_or(EtcError::UnknownArm { line, code })?;

        self.arm.push(arm);
        self.wavelength.push(parse(COL_WAVELENGTH)?);
        self.noise_variance.push(parse(COL_NOISE_VARIANCE)?);
        self.counts_conversion
            .push(parse(COL_COUNTS_CONVERSION)?.max(COUNTS_CONVERSION_FLOOR));
        self.sampling_factor.push(parse(COL_SAMPLING_FACTOR)?);
        self.sky_counts.push(parse(COL_SKY)?);
        Ok(())
    }

    /// Arm codes must partition the rows into contiguous blocks with
    /// wavelength increasing inside each block.
    fn check_blocks(&self) -> Result<(), EtcError> {
        let mut seen: Vec<Arm> = Vec::new();
        for i in 0..self.arm.len() {
            if i > 0 && self.arm[i] == self.arm[i - 1] {
                if self.wavelength[i] <= self.wavelength[i - 1] {
                    return Err(EtcError::NonMonotonicWavelength { row: i + 1 });
                }
            } else if seen.contains(&self.arm[i]) {
                return Err(EtcError::SplitArmBlock {
                    row: i + 1,
                    arm: self.arm[i],
                });
            } else {
                seen.push(self.arm[i]);
            }
        }
        Ok(())
    }

    /// Number of pixel rows
    pub fn len(&self) -> usize {
        self.arm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arm.is_empty()
    }

    /// Pixel index range of each arm present, in canonical arm order.
    pub fn arm_blocks(&self) -> Vec<(Arm, Range<usize>)> {
        let mut blocks: Vec<(Arm, Range<usize>)> = Vec::new();
        let mut start = 0;
        for i in 1..=self.arm.len() {
            if i == self.arm.len() || self.arm[i] != self.arm[start] {
                blocks.push((self.arm[start], start..i));
                start = i;
            }
        }
        blocks.sort_by_key(|(arm, _)| *arm);
        blocks
    }
}
