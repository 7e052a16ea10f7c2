//! Flux scaling, signal-to-noise, and noisy realization drawing.
//!
//! This is the center of the simulation: magnitudes become physical flux
//! densities and detector counts, counts become two signal-to-noise
//! variants, and each fiber gets its noise realizations drawn and averaged
//! over exposures before the result is partitioned by spectrograph arm.

use log::warn;
use ndarray::{Array2, Array3};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::algo::window::{neighbor_max, Edge};
use crate::config::{Multiplicity, SimulationConfig, SkySubtractionMode};
use crate::datamodel::{ArmIdentity, ArmSpectrum};
use crate::io::etc::EtcTable;
use crate::sims::sky::SkySystematics;

/// Pixel offset of the wavelength-registration error modeled by the
/// shifted-residual sky subtraction mode
const WAVELENGTH_ERROR_SHIFT: usize = 3;

/// AB magnitude zero point
const AB_ZERO_POINT: f64 = 48.6;

/// Speed of light in Angstrom/s
const SPEED_OF_LIGHT_ANG: f64 = 3.0e18;

/// Output flux unit, erg/s/cm^2/A
const FLUX_UNIT: f64 = 1.0e-17;

/// AB magnitude to spectral flux density f_nu
fn mag_to_fnu(mag: f64) -> f64 {
    10f64.powf(-0.4 * (mag + AB_ZERO_POINT))
}

/// f_nu to flux density per wavelength, in units of `FLUX_UNIT`
fn fnu_to_flam(fnu: f64, wavelength_nm: f64) -> f64 {
    let wavelength_ang = 10.0 * wavelength_nm;
    SPEED_OF_LIGHT_ANG * fnu / (wavelength_ang * wavelength_ang) / FLUX_UNIT
}

/// One zero-mean Gaussian draw. Degenerate widths take the limits: zero
/// width draws exactly zero, negative or non-finite widths draw NaN.
fn gaussian_draw<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> f64 {
    if sigma == 0.0 {
        return 0.0;
    }
    match Normal::new(0.0, sigma) {
        Ok(normal) => normal.sample(rng),
        Err(_) => f64::NAN,
    }
}

/// Circular shift: element `i` takes the value `offset` places earlier,
/// wrapping at the ends.
fn circular_shift(data: &[f64], offset: usize) -> Vec<f64> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }
    let offset = offset % n;
    (0..n).map(|i| data[(i + n - offset) % n]).collect()
}

/// Physically scaled signal and noise for every (pixel, column) pair, where
/// columns follow the magnitude matrix (one per object, or a single shared
/// column for realizations).
#[derive(Debug, Clone)]
pub struct ScaledSignal {
    /// nPixel x nColumn flux density
    pub flam: Array2<f64>,

    /// Per-draw noise width used to generate realizations
    pub sigma1: Array2<f64>,

    /// Reported noise width stored in the covariance
    pub sigma2: Array2<f64>,

    /// Sky flux density per pixel
    pub sky_flam: Vec<f64>,

    /// 3-point local-maximum envelope of `sky_flam`
    pub sky_reference: Vec<f64>,
}

/// Convert resampled magnitudes into flux densities and the two
/// signal-to-noise variants of the configured sky-subtraction mode.
///
/// Zero-count pixels get the configured floor substituted into the noise
/// estimate only; the signal keeps its true (zero) flux. The substitution
/// count is reported through `warn!`.
pub fn scale_signal(
    etc: &EtcTable,
    mag: &Array2<f64>,
    sky: &SkySystematics,
    mode: SkySubtractionMode,
    exposure_count: u32,
    counts_floor: f64,
) -> ScaledSignal {
    let pixels = etc.len();
    let columns = mag.ncols();
    let sqrt_exposures = (exposure_count as f64).sqrt();
    let systematic = sky.systematic_variance_for(exposure_count);

    let mut flam = Array2::zeros((pixels, columns));
    let mut sigma1 = Array2::zeros((pixels, columns));
    let mut sigma2 = Array2::zeros((pixels, columns));
    let mut floored = 0usize;

    for i in 0..pixels {
        for k in 0..columns {
            let fnu = mag_to_fnu(mag[[i, k]]);
            let flux = fnu_to_flam(fnu, etc.wavelength[i]);
            flam[[i, k]] = flux;

            let mut counts = etc.counts_conversion[i] * fnu;
            if counts == 0.0 {
                floored += 1;
                counts = counts_floor;
            }

            let poisson = etc.sampling_factor[i] * counts;
            let reported = poisson + sky.random_variance[i] + systematic[i];
            let generated = if mode.draws_residual() {
                // The residual draw supplies the systematic part explicitly
                poisson + sky.random_variance[i]
            } else {
                reported
            };

            let snr1 = counts / generated.sqrt() * sqrt_exposures;
            let snr2 = counts / reported.sqrt() * sqrt_exposures;
            sigma1[[i, k]] = flux / snr1;
            sigma2[[i, k]] = flux / snr2;
        }
    }

    if floored > 0 {
        warn!(
            "{floored} pixel/object pairs had zero counts; \
             using {counts_floor} for the noise estimate"
        );
    }

    let sky_flam: Vec<f64> = (0..pixels)
        .map(|i| fnu_to_flam(etc.sky_counts[i] / etc.counts_conversion[i], etc.wavelength[i]))
        .collect();
    let sky_reference = neighbor_max(&sky_flam, Edge::Zero);

    ScaledSignal {
        flam,
        sigma1,
        sigma2,
        sky_flam,
        sky_reference,
    }
}

/// Draw the noisy flux of one fiber over one arm's pixel block.
fn draw_fiber_flux<R: Rng + ?Sized>(
    rng: &mut R,
    flam: &[f64],
    sigma1: &[f64],
    residual: &[f64],
    mode: SkySubtractionMode,
    exposure_count: u32,
) -> Vec<f64> {
    let pixels = flam.len();
    if !mode.draws_residual() {
        // sigma1 is already exposure-scaled; a single draw stands in for
        // the whole averaged sequence
        return (0..pixels)
            .map(|i| flam[i] + gaussian_draw(rng, sigma1[i]))
            .collect();
    }

    // Residual modes average per-exposure draws, skipping non-finite ones.
    // The per-draw width carries an extra sqrt(n_exp) on top of the outer
    // average.
    let sqrt_exposures = (exposure_count as f64).sqrt();
    let mut sum = vec![0.0; pixels];
    let mut finite = vec![0u32; pixels];
    for _ in 0..exposure_count {
        for i in 0..pixels {
            let draw = flam[i] + gaussian_draw(rng, sigma1[i] * sqrt_exposures) + residual[i];
            if draw.is_finite() {
                sum[i] += draw;
                finite[i] += 1;
            }
        }
    }
    sum.iter()
        .zip(&finite)
        .map(|(&total, &count)| {
            if count > 0 {
                total / count as f64
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Partition the table by arm and build one spectrum record per arm
/// present, in canonical arm order.
///
/// Each arm draws one residual scale factor shared by all its fibers, then
/// one set of noise realizations per fiber. Arms with no pixels simply do
/// not appear.
pub fn partition_arms<R: Rng + ?Sized>(
    rng: &mut R,
    etc: &EtcTable,
    signal: &ScaledSignal,
    multiplicity: Multiplicity,
    fiber_ids: &[u32],
    design_id: u64,
    config: &SimulationConfig,
) -> Vec<ArmSpectrum> {
    let fiber_count = multiplicity.count();
    debug_assert_eq!(fiber_count, fiber_ids.len());

    let mut spectra = Vec::new();
    for (arm, range) in etc.arm_blocks() {
        let pixels = range.len();
        let wavelength_block = &etc.wavelength[range.clone()];
        let sky_block = &signal.sky_flam[range.clone()];
        let reference_block = &signal.sky_reference[range.clone()];

        // One residual scale per arm, shared by every fiber in it
        let residual_scale = if config.sky_sub_mode.draws_residual() {
            gaussian_draw(rng, config.sky_sub_floor)
        } else {
            0.0
        };
        let residual: Vec<f64> = match config.sky_sub_mode {
            SkySubtractionMode::Random => vec![0.0; pixels],
            SkySubtractionMode::Residual => reference_block
                .iter()
                .map(|r| r * residual_scale)
                .collect(),
            SkySubtractionMode::ShiftedResidual => {
                let shifted = circular_shift(reference_block, WAVELENGTH_ERROR_SHIFT);
                reference_block
                    .iter()
                    .zip(&shifted)
                    .map(|(r, s)| (r - s) * residual_scale)
                    .collect()
            }
        };

        let mut flux_rows: Vec<Vec<f64>> = Vec::with_capacity(fiber_count);
        let mut variance_rows: Vec<Vec<f64>> = Vec::with_capacity(fiber_count);
        for fiber in 0..fiber_count {
            let column = multiplicity.column_for(fiber);
            let flam: Vec<f64> = range.clone().map(|i| signal.flam[[i, column]]).collect();
            let sigma1: Vec<f64> = range.clone().map(|i| signal.sigma1[[i, column]]).collect();
            flux_rows.push(draw_fiber_flux(
                rng,
                &flam,
                &sigma1,
                &residual,
                config.sky_sub_mode,
                config.exposure_count,
            ));
            variance_rows.push(
                range
                    .clone()
                    .map(|i| signal.sigma2[[i, column]].powi(2))
                    .collect(),
            );
        }

        spectra.push(ArmSpectrum {
            identity: ArmIdentity {
                visit: config.visit,
                design_id,
                spectrograph: config.spectrograph,
                arm,
            },
            fiber_ids: fiber_ids.to_vec(),
            wavelength: Array2::from_shape_fn((fiber_count, pixels), |(_, j)| wavelength_block[j]),
            flux: Array2::from_shape_fn((fiber_count, pixels), |(k, j)| flux_rows[k][j]),
            mask: Array2::zeros((fiber_count, pixels)),
            sky: Array2::from_shape_fn((fiber_count, pixels), |(_, j)| sky_block[j]),
            covar: Array3::from_shape_fn((fiber_count, 3, pixels), |(k, row, j)| {
                if row == 0 {
                    variance_rows[k][j]
                } else {
                    0.0
                }
            }),
        });
    }
    spectra
}
