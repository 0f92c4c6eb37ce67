//! Generic geometry relaxation on top of any [`Driver`].

use log::{debug, warn};

use super::Driver;
use crate::error::Error;
use crate::model::labeled::LabeledSystem;
use crate::model::system::System;
use crate::model::record::Record;
use crate::model::types::{Vec3, norm};

/// Steepest descent with an adaptive step length.
///
/// Each step moves the atom under the largest force by `step` Å along its
/// force and every other atom proportionally. Accepted steps grow the step
/// length by 20%, rejected ones halve it. Frames are relaxed independently
/// and the labeled minima are returned in input order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minimizer {
    /// Convergence threshold on the largest atomic force, in eV/Å.
    pub fmax: f64,
    /// Upper bound on the number of trial steps per frame.
    pub max_steps: usize,
    /// Initial largest displacement, in Å.
    pub step: f64,
}

impl Default for Minimizer {
    fn default() -> Self {
        Self {
            fmax: 5e-3,
            max_steps: 1000,
            step: 0.1,
        }
    }
}

const MIN_STEP: f64 = 1e-10;

impl Minimizer {
    /// Relaxes every frame of `system` with `driver`.
    ///
    /// A frame that does not converge within `max_steps` is returned at the
    /// lowest energy reached, with a warning.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised by `driver`.
    pub fn run<D: Driver + ?Sized>(&self, driver: &D, system: &System) -> Result<LabeledSystem, Error> {
        if system.frame_count() == 0 {
            return LabeledSystem::new(system.clone(), Vec::new(), Vec::new(), None);
        }
        let mut result = LabeledSystem::default();
        for idx in 0..system.frame_count() {
            let frame = system.frame(idx).ok_or(Error::FrameIndexOutOfRange {
                index: idx as i64,
                frame_count: system.frame_count(),
            })?;
            result.append(self.relax(driver, &frame, idx)?)?;
        }
        Ok(result)
    }

    fn relax<D: Driver + ?Sized>(&self, driver: &D, frame: &System, idx: usize) -> Result<LabeledSystem, Error> {
        let mut current = label_frame(driver, frame)?;
        let mut step = self.step;

        for iteration in 0..self.max_steps {
            let (energy, forces) = first_labels(&current)?;
            let largest = forces.iter().map(norm).fold(0.0, f64::max);
            if largest < self.fmax {
                debug!(
                    "{}: frame {idx} converged after {iteration} steps (E = {energy:.6} eV)",
                    driver.name()
                );
                return Ok(current);
            }

            let mut trial = current.system.clone();
            if let Some(coords) = trial.coordinates.first_mut() {
                for (pos, force) in coords.iter_mut().zip(forces) {
                    for k in 0..3 {
                        pos[k] += step * force[k] / largest;
                    }
                }
            }
            let candidate = label_frame(driver, &trial)?;
            if first_labels(&candidate)?.0 < energy {
                current = candidate;
                step *= 1.2;
            } else {
                step *= 0.5;
                if step < MIN_STEP {
                    break;
                }
            }
        }

        warn!(
            "{}: frame {idx} did not reach fmax {} eV/Å; keeping the lowest energy found",
            driver.name(),
            self.fmax
        );
        Ok(current)
    }
}

/// Labels a single-frame record and checks that the driver answered with
/// exactly one frame for the same atoms.
fn label_frame<D: Driver + ?Sized>(driver: &D, frame: &System) -> Result<LabeledSystem, Error> {
    let labeled = driver.label(frame)?;
    labeled.validate()?;
    if labeled.frame_count() != 1 || labeled.atom_count() != frame.atom_count() {
        return Err(Error::shape(format!(
            "driver '{}' labeled {} frames of {} atoms for one frame of {} atoms",
            driver.name(),
            labeled.frame_count(),
            labeled.atom_count(),
            frame.atom_count()
        )));
    }
    Ok(labeled)
}

fn first_labels(labeled: &LabeledSystem) -> Result<(f64, &[Vec3]), Error> {
    match (labeled.energies.first(), labeled.forces.first()) {
        (Some(&energy), Some(forces)) => Ok((energy, forces)),
        _ => Err(Error::shape("labeled frame carries no energy or forces")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::HarmonicDriver;

    fn displaced(frames: usize) -> System {
        let mut s = System::with_species(vec!["Ne".into()], vec![0, 0]);
        for f in 0..frames {
            let d = 1.0 + f as f64;
            s.push_frame(vec![[d, 0.0, 0.0], [0.0, -d, 0.5]], None).unwrap();
        }
        s
    }

    #[test]
    fn default_minimize_relaxes_to_the_anchor() {
        let driver = HarmonicDriver::new(1.0, [0.0; 3]);
        let relaxed = driver.minimize(&displaced(2)).unwrap();
        assert_eq!(relaxed.frame_count(), 2);
        for frame in &relaxed.forces {
            for f in frame {
                assert!(norm(f) < 5e-3);
            }
        }
        assert!(relaxed.energies.iter().all(|e| *e < 1e-4));
    }

    #[test]
    fn step_limit_returns_best_so_far() {
        let driver = HarmonicDriver::new(1.0, [0.0; 3]);
        let minimizer = Minimizer {
            max_steps: 1,
            ..Minimizer::default()
        };
        let start = driver.label(&displaced(1)).unwrap().energies[0];
        let relaxed = minimizer.run(&driver, &displaced(1)).unwrap();
        assert!(relaxed.energies[0] < start);
    }

    /// Answers every request with an empty record.
    struct Frameless;

    impl Driver for Frameless {
        fn name(&self) -> &str {
            "frameless"
        }

        fn label(&self, system: &System) -> Result<LabeledSystem, Error> {
            let empty = System::with_species(system.species_names.clone(), system.atom_species_index.clone());
            LabeledSystem::new(empty, Vec::new(), Vec::new(), None)
        }
    }

    #[test]
    fn driver_returning_no_frames_is_a_shape_mismatch() {
        let relaxed = Minimizer::default().run(&Frameless, &displaced(1));
        assert!(matches!(relaxed, Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn frameless_record_yields_no_labels() {
        let driver = HarmonicDriver::new(1.0, [0.0; 3]);
        let empty = System::with_species(vec!["Ne".into()], vec![0]);
        let relaxed = Minimizer::default().run(&driver, &empty).unwrap();
        assert_eq!(relaxed.frame_count(), 0);
    }
}
