//! Plain-text export of simulated arm spectra.
//!
//! One `.dat` file per fiber (suffixed `.N` when a visit has several), one
//! row per pixel across all arms in canonical order, with the fixed column
//! layout documented in the file header.

use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::datamodel::{ArmSpectrum, DesignRecord, SpectrumSink};

const COLUMN_HEADER: &str = "\
#  1  WAVELENGTH  [nm]
#  2  FLUX        [10^-17 erg/s/cm^2/A]
#  3  ERROR       [10^-17 erg/s/cm^2/A]
#  4  MASK        [1=masked]
#  5  SKY         [10^-17 erg/s/cm^2/A]
#  6  ARM         [0=blue,1=red,2=NIR,3=redMR]
";

/// Collects a visit's arm spectra and writes them as per-fiber tables.
///
/// Arms arrive one at a time through the [`SpectrumSink`] interface and are
/// buffered; the files are laid down on `finish`, once the fiber count and
/// full arm set are known.
pub struct AsciiWriter {
    out_dir: PathBuf,
    stem: String,
    arms: Vec<ArmSpectrum>,
}

impl AsciiWriter {
    pub fn new(out_dir: &Path, stem: &str) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
            stem: stem.to_string(),
            arms: Vec::new(),
        }
    }

    fn fiber_path(&self, fiber: usize, fiber_count: usize) -> PathBuf {
        let name = if fiber_count == 1 {
            format!("{}.dat", self.stem)
        } else {
            format!("{}.{}.dat", self.stem, fiber)
        };
        self.out_dir.join(name)
    }
}

impl SpectrumSink for AsciiWriter {
    fn write_design(&mut self, _design: &DesignRecord, _visit: u32) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    fn write_arm(&mut self, spectrum: &ArmSpectrum) -> Result<(), Box<dyn Error>> {
        self.arms.push(spectrum.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Box<dyn Error>> {
        let fiber_count = match self.arms.first() {
            Some(arm) => arm.fiber_count(),
            None => return Ok(()),
        };

        for fiber in 0..fiber_count {
            let path = self.fiber_path(fiber, fiber_count);
            let mut out = BufWriter::new(File::create(&path)?);
            out.write_all(COLUMN_HEADER.as_bytes())?;

            for arm in &self.arms {
                let code = arm.identity.arm.code();
                for pixel in 0..arm.pixel_count() {
                    writeln!(
                        out,
                        "{:8.3} {:12.4e} {:12.4e} {:2} {:12.4e} {:1}",
                        arm.wavelength[[fiber, pixel]],
                        arm.flux[[fiber, pixel]],
                        arm.covar[[fiber, 0, pixel]].sqrt(),
                        arm.mask[[fiber, pixel]],
                        arm.sky[[fiber, pixel]],
                        code,
                    )?;
                }
            }
            out.flush()?;
            info!("wrote {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetIdentity;
    use crate::datamodel::{Arm, ArmIdentity, DesignTarget, SimulatedVisit};
    use ndarray::{Array2, Array3};

    fn toy_arm(arm: Arm, fibers: usize, pixels: usize) -> ArmSpectrum {
        ArmSpectrum {
            identity: ArmIdentity {
                visit: 1,
                design_id: 7,
                spectrograph: 1,
                arm,
            },
            fiber_ids: (1..=fibers as u32).collect(),
            wavelength: Array2::from_shape_fn((fibers, pixels), |(_, j)| 400.0 + j as f64),
            flux: Array2::from_elem((fibers, pixels), 1.5),
            mask: Array2::zeros((fibers, pixels)),
            sky: Array2::from_elem((fibers, pixels), 0.25),
            covar: Array3::from_shape_fn((fibers, 3, pixels), |(_, row, _)| {
                if row == 0 {
                    4.0
                } else {
                    0.0
                }
            }),
        }
    }

    fn toy_visit(fibers: usize) -> SimulatedVisit {
        let targets = (0..fibers)
            .map(|k| DesignTarget {
                identity: TargetIdentity {
                    fiber_id: 1 + k as u32,
                    ..Default::default()
                },
                fiber_mags: [20.0; 5],
            })
            .collect();
        SimulatedVisit {
            design: DesignRecord::new(targets),
            visit: 1,
            arms: vec![toy_arm(Arm::Blue, fibers, 2), toy_arm(Arm::Red, fibers, 2)],
        }
    }

    #[test]
    fn test_single_fiber_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = AsciiWriter::new(dir.path(), "spectra");
        toy_visit(1).write_to(&mut writer).unwrap();

        let contents = std::fs::read_to_string(dir.path().join("spectra.dat")).unwrap();
        let data_rows: Vec<&str> = contents
            .lines()
            .filter(|l| !l.starts_with('#'))
            .collect();
        // 2 arms x 2 pixels
        assert_eq!(data_rows.len(), 4);

        let first: Vec<&str> = data_rows[0].split_whitespace().collect();
        assert_eq!(first.len(), 6);
        assert_eq!(first[0], "400.000");
        // 1-sigma error is the square root of covariance row 0
        assert!(first[2].starts_with("2.0000"));
        assert_eq!(first[3], "0");
        // Last rows carry the red arm code
        assert!(data_rows[3].ends_with('1'));
    }

    #[test]
    fn test_multi_fiber_file_per_fiber() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = AsciiWriter::new(dir.path(), "spectra");
        toy_visit(3).write_to(&mut writer).unwrap();

        for fiber in 0..3 {
            assert!(dir.path().join(format!("spectra.{fiber}.dat")).exists());
        }
        assert!(!dir.path().join("spectra.dat").exists());
    }
}
