//! Linear interpolation of sampled functions onto new grids.
//!
//! Used to resample tabulated magnitude spectra onto the instrument's
//! wavelength grid. Query points outside the table domain clamp to the
//! nearest edge sample rather than extrapolating.

use thiserror::Error;

/// Errors that can occur when validating interpolation tables
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpError {
    #[error("input tables must have at least 2 points")]
    InsufficientData,

    #[error("x and y tables must have the same length")]
    MismatchedLengths,

    #[error("x values must be sorted in ascending order")]
    UnsortedData,
}

fn validate(xs: &[f64], ys: &[f64]) -> Result<(), InterpError> {
    if xs.len() != ys.len() {
        return Err(InterpError::MismatchedLengths);
    }
    if xs.len() < 2 {
        return Err(InterpError::InsufficientData);
    }
    for i in 1..xs.len() {
        if xs[i] <= xs[i - 1] {
            return Err(InterpError::UnsortedData);
        }
    }
    Ok(())
}

/// Interpolate at one point; assumes a validated table.
fn interp_clamped(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[xs.len() - 1] {
        return ys[ys.len() - 1];
    }

    // Binary search for the segment containing x
    let hi = xs.partition_point(|&sample| sample < x);
    let lo = hi - 1;

    let t = (x - xs[lo]) / (xs[hi] - xs[lo]);
    ys[lo] * (1.0 - t) + ys[hi] * t
}

/// Linearly interpolate a sampled function onto a query grid.
///
/// Query points below `xs[0]` return `ys[0]`; points above the last sample
/// return the last y. This is the edge policy wanted for magnitude spectra
/// that do not quite cover the instrument's wavelength range: the result is
/// degraded but defined.
///
/// # Arguments
/// * `grid` - Query points (need not be sorted)
/// * `xs` - Sample positions, strictly ascending
/// * `ys` - Sample values, same length as `xs`
///
/// # Errors
/// Table validation failures; the query grid itself cannot fail.
pub fn interp_onto(grid: &[f64], xs: &[f64], ys: &[f64]) -> Result<Vec<f64>, InterpError> {
    validate(xs, ys)?;
    Ok(grid.iter().map(|&x| interp_clamped(x, xs, ys)).collect())
}
