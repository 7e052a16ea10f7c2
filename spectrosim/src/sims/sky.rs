//! Sky-subtraction systematics estimation.
//!
//! Imperfect sky subtraction leaves residuals that scale with the sky
//! brightness around each pixel, not the pixel alone. The reference profile
//! is therefore a 3-point local-maximum envelope of the sky spectrum, and
//! the systematic noise floor is a fraction of that envelope.

use crate::algo::window::{neighbor_max, Edge};

/// Smoothed sky reference and the noise-variance split derived from it.
///
/// Variances are stored at the table's reference exposure count and scaled
/// to the simulated exposure count on demand.
#[derive(Debug, Clone)]
pub struct SkySystematics {
    /// 3-point local-maximum envelope of the sky spectrum, counts
    pub reference: Vec<f64>,

    /// Systematic variance at the reference exposure count, counts^2
    pub systematic_variance: Vec<f64>,

    /// Total variance minus the systematic part, counts^2
    pub random_variance: Vec<f64>,

    /// Exposure count the input variances were computed for
    pub reference_exposures: u32,
}

impl SkySystematics {
    /// Split a total per-pixel noise variance into its random and
    /// sky-systematic parts.
    ///
    /// # Arguments
    /// * `sky_counts` - Sky flux per pixel, ordered by wavelength
    /// * `total_variance` - Total per-pixel noise variance from the ETC
    /// * `floor` - Fractional sky-subtraction accuracy
    /// * `reference_exposures` - Exposure count behind `total_variance`
    pub fn from_sky(
        sky_counts: &[f64],
        total_variance: &[f64],
        floor: f64,
        reference_exposures: u32,
    ) -> Self {
        let reference = neighbor_max(sky_counts, Edge::Zero);
        let scale = floor * (reference_exposures as f64).sqrt();
        let systematic_variance: Vec<f64> =
            reference.iter().map(|r| (scale * r).powi(2)).collect();
        let random_variance: Vec<f64> = total_variance
            .iter()
            .zip(&systematic_variance)
            .map(|(&total, &sys)| total - sys)
            .collect();

        Self {
            reference,
            systematic_variance,
            random_variance,
            reference_exposures,
        }
    }

    /// Systematic variance rescaled from the reference exposure count to a
    /// target one.
    pub fn systematic_variance_for(&self, exposures: u32) -> Vec<f64> {
        let ratio = exposures as f64 / self.reference_exposures as f64;
        self.systematic_variance.iter().map(|v| v * ratio).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_boundaries_are_zero_filled() {
        let sky = [3.0, 1.0, 2.0, 5.0];
        let sys = SkySystematics::from_sky(&sky, &[0.0; 4], 0.1, 1);
        assert_eq!(sys.reference[0], sky[0].max(sky[1]).max(0.0));
        assert_eq!(sys.reference[3], sky[2].max(sky[3]).max(0.0));
        // Interior pixels see both neighbors
        assert_eq!(sys.reference[1], 3.0);
        assert_eq!(sys.reference[2], 5.0);
    }

    #[test]
    fn test_variance_split() {
        let sky = [2.0, 2.0, 2.0];
        let total = [10.0, 10.0, 10.0];
        let sys = SkySystematics::from_sky(&sky, &total, 0.5, 4);
        // reference = 2 everywhere; sigma_sys = 0.5 * sqrt(4) * 2 = 2
        for i in 0..3 {
            assert_relative_eq!(sys.systematic_variance[i], 4.0, epsilon = 1e-12);
            assert_relative_eq!(sys.random_variance[i], 6.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_exposure_scaling() {
        let sys = SkySystematics::from_sky(&[1.0, 1.0], &[5.0, 5.0], 0.1, 8);
        let scaled = sys.systematic_variance_for(2);
        for (orig, new) in sys.systematic_variance.iter().zip(&scaled) {
            assert_relative_eq!(*new, orig * 2.0 / 8.0, epsilon = 1e-12);
        }
        // Scaling to the reference count is the identity
        let same = sys.systematic_variance_for(8);
        assert_eq!(same, sys.systematic_variance);
    }
}
