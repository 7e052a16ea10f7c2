//! Photometric bandpass catalog and fiber-magnitude integration.
//!
//! The spectrograph's target catalog records one magnitude per broadband
//! filter. Each filter is modeled as a boxcar: constant peak transmission
//! between its 50% wavelength edges, zero outside. The fiber magnitude of a
//! spectrum is its flux-weighted average magnitude over the filter.

use thiserror::Error;

use super::trapezoid::trap_integrate;

/// Errors that can occur while integrating over a bandpass
#[derive(Debug, Error, PartialEq)]
pub enum BandpassError {
    #[error("bandpass {0} has no overlap with the wavelength grid")]
    NoOverlap(&'static str),

    #[error("wavelength and magnitude arrays must have the same length")]
    LengthMismatch,
}

/// A boxcar photometric bandpass.
///
/// Transmission is `peak` between the 50% edges and zero outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bandpass {
    pub name: &'static str,

    /// Lower 50%-transmission edge in nanometers
    pub lower_nm: f64,

    /// Upper 50%-transmission edge in nanometers
    pub upper_nm: f64,

    /// Peak transmission, 0 < peak <= 1
    pub peak: f64,
}

/// The five broadband filters of the target catalog.
#[rustfmt::skip]
pub const BANDPASSES: [Bandpass; 5] = [
    Bandpass { name: "g", lower_nm: 399.5, upper_nm:  546.5, peak: 0.97 },
    Bandpass { name: "r", lower_nm: 542.5, upper_nm:  696.5, peak: 0.95 },
    Bandpass { name: "i", lower_nm: 698.5, upper_nm:  853.3, peak: 0.90 },
    Bandpass { name: "z", lower_nm: 852.5, upper_nm:  932.0, peak: 0.97 },
    Bandpass { name: "y", lower_nm: 943.0, upper_nm: 1072.0, peak: 0.95 },
];

impl Bandpass {
    /// Look up a catalog filter by name
    pub fn by_name(name: &str) -> Option<&'static Bandpass> {
        BANDPASSES.iter().find(|b| b.name == name)
    }

    /// Boxcar transmission at a wavelength
    pub fn weight_at(&self, wavelength_nm: f64) -> f64 {
        if wavelength_nm >= self.lower_nm && wavelength_nm <= self.upper_nm {
            self.peak
        } else {
            0.0
        }
    }
}

/// Calculate the flux-weighted average magnitude over a bandpass.
///
/// Magnitudes are converted to relative counts via `exp(-mag)`, weighted by
/// the boxcar transmission, and integrated with the trapezoidal rule; the
/// result is `-ln(integral(weight * counts) / integral(weight))`. A flat
/// spectrum therefore round-trips to its own magnitude.
///
/// # Arguments
/// * `wavelength_nm` - Sample grid in nanometers, ascending
/// * `mag` - Magnitude at each grid point
/// * `band` - The filter to average over
///
/// # Errors
/// `BandpassError::NoOverlap` when no grid point falls inside the band;
/// callers decide whether that is fatal or recorded as a missing magnitude.
pub fn fiber_magnitude(
    wavelength_nm: &[f64],
    mag: &[f64],
    band: &Bandpass,
) -> Result<f64, BandpassError> {
    if wavelength_nm.len() != mag.len() {
        return Err(BandpassError::LengthMismatch);
    }

    let weights: Vec<f64> = wavelength_nm.iter().map(|&w| band.weight_at(w)).collect();
    let weighted_counts: Vec<f64> = mag
        .iter()
        .zip(&weights)
        .map(|(&m, &w)| w * (-m).exp())
        .collect();

    let denominator = trap_integrate(wavelength_nm, &weights);
    if denominator == 0.0 {
        return Err(BandpassError::NoOverlap(band.name));
    }
    let numerator = trap_integrate(wavelength_nm, &weighted_counts);

    Ok(-(numerator / denominator).ln())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dense_grid(low: f64, high: f64, step: f64) -> Vec<f64> {
        let mut grid = Vec::new();
        let mut w = low;
        while w <= high {
            grid.push(w);
            w += step;
        }
        grid
    }

    #[test]
    fn test_flat_spectrum_round_trip() {
        // A constant magnitude must come back unchanged for every filter
        let grid = dense_grid(350.0, 1150.0, 0.5);
        for band in &BANDPASSES {
            for m in [0.0, 18.0, 22.5] {
                let mags = vec![m; grid.len()];
                let fiber_mag = fiber_magnitude(&grid, &mags, band).unwrap();
                assert_relative_eq!(fiber_mag, m, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_weighting_favors_bright_half() {
        // Brighter (smaller magnitude) half of the band pulls the average down
        let grid = dense_grid(390.0, 560.0, 0.1);
        let mags: Vec<f64> = grid
            .iter()
            .map(|&w| if w < 473.0 { 20.0 } else { 21.0 })
            .collect();
        let g = Bandpass::by_name("g").unwrap();
        let fiber_mag = fiber_magnitude(&grid, &mags, g).unwrap();
        assert!(fiber_mag > 20.0 && fiber_mag < 21.0);
        // exp(-20) dominates exp(-21), so the result sits below the midpoint
        assert!(fiber_mag < 20.5);
    }

    #[test]
    fn test_no_overlap_is_an_error() {
        let grid = dense_grid(350.0, 390.0, 1.0);
        let mags = vec![20.0; grid.len()];
        let g = Bandpass::by_name("g").unwrap();
        assert_eq!(
            fiber_magnitude(&grid, &mags, g),
            Err(BandpassError::NoOverlap("g"))
        );
    }

    #[test]
    fn test_length_mismatch() {
        let g = Bandpass::by_name("g").unwrap();
        assert_eq!(
            fiber_magnitude(&[400.0, 500.0], &[20.0], g),
            Err(BandpassError::LengthMismatch)
        );
    }

    #[test]
    fn test_catalog_edges() {
        let y = Bandpass::by_name("y").unwrap();
        assert_eq!(y.lower_nm, 943.0);
        assert_eq!(y.upper_nm, 1072.0);
        assert_eq!(y.weight_at(1000.0), 0.95);
        assert_eq!(y.weight_at(942.9), 0.0);
        assert!(Bandpass::by_name("u").is_none());
    }
}
