//! End-to-end simulation driver.
//!
//! The runner wires the pipeline together: load and validate inputs, scale
//! the signal, draw realizations, partition by arm, and hand back one
//! in-memory [`SimulatedVisit`]. Persistence belongs to the caller.

use log::{debug, info, warn};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use thiserror::Error;

use crate::config::{ConfigError, Multiplicity, SimulationConfig, TargetIdentity};
use crate::datamodel::{DesignRecord, DesignTarget, SimulatedVisit};
use crate::io::etc::{EtcError, EtcTable};
use crate::io::magnitude::MagnitudeError;
use crate::photometry::bandpass::{fiber_magnitude, BANDPASSES};
use crate::sims::flux::{partition_arms, scale_signal};
use crate::sims::sky::SkySystematics;

/// Everything that can abort a simulation run. All variants are fatal
/// configuration or input errors; nothing here is retried.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Etc(#[from] EtcError),

    #[error(transparent)]
    Magnitude(#[from] MagnitudeError),
}

/// Drives one simulated visit from configuration to in-memory records
pub struct Simulator {
    config: SimulationConfig,
}

impl Simulator {
    /// Validate the configuration and build a runner for it
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run with an optional seed. `None` seeds from the process-wide
    /// source; pass `Some` for reproducible output.
    pub fn run(&self, seed: Option<u64>) -> Result<SimulatedVisit, SimulationError> {
        let seed = seed.unwrap_or_else(|| rand::rng().next_u64());
        debug!("seeding simulation with {seed}");
        let mut rng = StdRng::seed_from_u64(seed);
        self.run_with_rng(&mut rng)
    }

    /// Run with a caller-supplied generator. Concurrent runs need
    /// independent generators; nothing is shared between invocations.
    pub fn run_with_rng<R: Rng>(&self, rng: &mut R) -> Result<SimulatedVisit, SimulationError> {
        let magnitudes = self.config.magnitudes.load()?;
        // The fiber axis is settled before anything per-pixel is allocated
        let multiplicity = Multiplicity::resolve(
            magnitudes.object_count(),
            self.config.realization_count as usize,
        )?;

        let etc = EtcTable::from_path(&self.config.etc_path)?;
        let mag = magnitudes.resample(&etc.wavelength)?;
        let sky = SkySystematics::from_sky(
            &etc.sky_counts,
            &etc.noise_variance,
            self.config.sky_sub_floor,
            etc.reference_exposures,
        );
        let signal = scale_signal(
            &etc,
            &mag,
            &sky,
            self.config.sky_sub_mode,
            self.config.exposure_count,
            self.config.counts_floor,
        );

        let design = DesignRecord::new(self.design_targets(&etc.wavelength, &mag, multiplicity));
        let fiber_ids: Vec<u32> = design
            .targets
            .iter()
            .map(|target| target.identity.fiber_id)
            .collect();

        let arms = partition_arms(
            rng,
            &etc,
            &signal,
            multiplicity,
            &fiber_ids,
            design.design_id,
            &self.config,
        );
        info!(
            "simulated {} arm spectra x {} fibers for visit {}",
            arms.len(),
            fiber_ids.len(),
            self.config.visit
        );
        Ok(SimulatedVisit {
            design,
            visit: self.config.visit,
            arms,
        })
    }

    /// Replicate the base identity along the fiber axis and attach fiber
    /// magnitudes in the catalog bands.
    fn design_targets(
        &self,
        grid: &[f64],
        mag: &Array2<f64>,
        multiplicity: Multiplicity,
    ) -> Vec<DesignTarget> {
        let base = &self.config.base_target;
        (0..multiplicity.count())
            .map(|fiber| {
                let column = mag.column(multiplicity.column_for(fiber)).to_vec();
                let mut fiber_mags = [f64::NAN; 5];
                for (slot, band) in fiber_mags.iter_mut().zip(&BANDPASSES) {
                    match fiber_magnitude(grid, &column, band) {
                        Ok(value) => *slot = value,
                        Err(err) => {
                            warn!(
                                "fiber {}: {err}; recording NaN",
                                base.fiber_id + fiber as u32
                            );
                        }
                    }
                }
                DesignTarget {
                    identity: TargetIdentity {
                        cat_id: base.cat_id,
                        obj_id: base.obj_id + fiber as i64,
                        fiber_id: base.fiber_id + fiber as u32,
                        ra: base.ra,
                        dec: base.dec,
                        tract: base.tract,
                        patch: base.patch.clone(),
                    },
                    fiber_mags,
                }
            })
            .collect()
    }
}
