//! Composite driver summing the labels of several sub-drivers.

use log::debug;
use serde::Deserialize;

use super::{Driver, DriverRegistry, decode_params};
use crate::error::Error;
use crate::model::labeled::LabeledSystem;
use crate::model::record::Record;
use crate::model::system::System;

/// Runs each sub-driver in order and sums their energies, forces and
/// virials.
///
/// Virials are summed only when every sub-driver supplies them; if some do
/// and others do not, labeling fails with [`Error::ShapeMismatch`]. The
/// first sub-driver error aborts the call.
pub struct HybridDriver {
    drivers: Vec<Box<dyn Driver>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HybridParams {
    drivers: Vec<toml::Table>,
}

impl HybridDriver {
    pub fn new(drivers: Vec<Box<dyn Driver>>) -> Self {
        Self { drivers }
    }

    /// Builds the sub-drivers listed in the `drivers` array of `params`.
    ///
    /// Each entry names its driver in a `type` key; the remaining keys are
    /// that driver's own parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a missing `drivers` array or `type`
    /// key, and any error raised while creating a sub-driver.
    pub fn from_params(registry: &DriverRegistry, params: &toml::Table) -> Result<Self, Error> {
        let HybridParams { drivers } = decode_params(params)?;
        let mut built = Vec::with_capacity(drivers.len());
        for mut table in drivers {
            let key = match table.remove("type") {
                Some(toml::Value::String(key)) => key,
                _ => {
                    return Err(Error::Config(serde::de::Error::custom(
                        "every hybrid sub-driver needs a string 'type' key",
                    )));
                }
            };
            built.push(registry.create(&key, &table)?);
        }
        Ok(Self::new(built))
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

pub(super) fn create(registry: &DriverRegistry, params: &toml::Table) -> Result<Box<dyn Driver>, Error> {
    Ok(Box::new(HybridDriver::from_params(registry, params)?))
}

impl Driver for HybridDriver {
    fn name(&self) -> &str {
        "hybrid"
    }

    fn label(&self, system: &System) -> Result<LabeledSystem, Error> {
        let mut drivers = self.drivers.iter();
        let Some(first) = drivers.next() else {
            return Err(Error::not_implemented(
                self.name(),
                "labels without sub-drivers",
            ));
        };
        let mut total = checked(&**first, first.label(system)?)?;
        debug!("hybrid: seeded labels from '{}'", first.name());

        for driver in drivers {
            let part = checked(&**driver, driver.label(system)?)?;
            if part.frame_count() != total.frame_count() || part.atom_count() != total.atom_count() {
                return Err(Error::shape(format!(
                    "driver '{}' labeled {} frames of {} atoms, expected {} frames of {} atoms",
                    driver.name(),
                    part.frame_count(),
                    part.atom_count(),
                    total.frame_count(),
                    total.atom_count()
                )));
            }

            for (sum, e) in total.energies.iter_mut().zip(&part.energies) {
                *sum += e;
            }
            for (sum, forces) in total.forces.iter_mut().zip(&part.forces) {
                for (acc, f) in sum.iter_mut().zip(forces) {
                    for k in 0..3 {
                        acc[k] += f[k];
                    }
                }
            }
            match (&mut total.virials, &part.virials) {
                (Some(sum), Some(virials)) => {
                    for (acc, v) in sum.iter_mut().zip(virials) {
                        for a in 0..3 {
                            for b in 0..3 {
                                acc[a][b] += v[a][b];
                            }
                        }
                    }
                }
                (None, None) => {}
                _ => {
                    return Err(Error::shape(format!(
                        "driver '{}' disagrees with earlier sub-drivers on whether virials are supplied",
                        driver.name()
                    )));
                }
            }
            debug!("hybrid: added labels from '{}'", driver.name());
        }
        Ok(total)
    }
}

/// Rejects sub-driver output whose label arrays disagree with its own
/// frame and atom counts.
fn checked(driver: &dyn Driver, labeled: LabeledSystem) -> Result<LabeledSystem, Error> {
    labeled.validate().map_err(|err| match err {
        Error::ShapeMismatch(details) => {
            Error::shape(format!("driver '{}': {details}", driver.name()))
        }
        other => other,
    })?;
    Ok(labeled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{HarmonicDriver, drivers};
    use crate::model::types::{Mat3, Vec3};

    /// Constant energy and forces, optionally with a constant virial.
    struct Fixed {
        energy: f64,
        virial: Option<f64>,
        atoms: Option<usize>,
    }

    impl Driver for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn label(&self, system: &System) -> Result<LabeledSystem, Error> {
            let atoms = self.atoms.unwrap_or(system.atom_count());
            let frames = system.frame_count();
            let mut labeled = LabeledSystem {
                system: system.clone(),
                energies: vec![self.energy; frames],
                forces: vec![vec![[1.0, 2.0, 3.0]; atoms]; frames],
                virials: self.virial.map(|v| vec![[[v; 3]; 3]; frames]),
            };
            if let Some(n) = self.atoms {
                labeled.system = System::with_species(vec!["X".into()], vec![0; n]);
                for _ in 0..frames {
                    labeled.system.push_frame(vec![[0.0; 3]; n], None)?;
                }
            }
            Ok(labeled)
        }
    }

    /// Returns the given per-atom forces for every frame.
    struct Forces(Vec<Vec3>);

    impl Driver for Forces {
        fn name(&self) -> &str {
            "forces"
        }

        fn label(&self, system: &System) -> Result<LabeledSystem, Error> {
            let frames = system.frame_count();
            Ok(LabeledSystem {
                system: system.clone(),
                energies: vec![0.0; frames],
                forces: vec![self.0.clone(); frames],
                virials: None,
            })
        }
    }

    struct Failing;

    impl Driver for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn label(&self, _: &System) -> Result<LabeledSystem, Error> {
            Err(Error::not_implemented("failing", "energy"))
        }
    }

    fn fixed(energy: f64, virial: Option<f64>) -> Box<dyn Driver> {
        Box::new(Fixed {
            energy,
            virial,
            atoms: None,
        })
    }

    fn water(frames: usize) -> System {
        let mut s = System::with_species(vec!["O".into(), "H".into()], vec![0, 1, 1]);
        for _ in 0..frames {
            s.push_frame(vec![[0.0; 3], [0.96, 0.0, 0.0], [-0.24, 0.93, 0.0]], None)
                .unwrap();
        }
        s
    }

    #[test]
    fn sums_energies_forces_and_virials() {
        let hybrid = HybridDriver::new(vec![fixed(1.0, Some(0.5)), fixed(2.5, Some(1.0))]);
        let labeled = hybrid.label(&water(2)).unwrap();
        assert_eq!(labeled.energies, vec![3.5, 3.5]);
        assert_eq!(labeled.forces[1][2], [2.0, 4.0, 6.0]);
        let expected: Mat3 = [[1.5; 3]; 3];
        assert_eq!(labeled.virials.unwrap(), vec![expected, expected]);
    }

    #[test]
    fn forces_are_summed_atom_by_atom() {
        let mut atom = System::with_species(vec!["H".into()], vec![0]);
        atom.push_frame(vec![[0.0; 3]], None).unwrap();
        let hybrid = HybridDriver::new(vec![
            Box::new(Forces(vec![[1.0, 0.0, 0.0]])),
            Box::new(Forces(vec![[0.0, 1.0, 0.0]])),
        ]);
        assert_eq!(hybrid.label(&atom).unwrap().forces, vec![vec![[1.0, 1.0, 0.0]]]);

        let hybrid = HybridDriver::new(vec![
            Box::new(Forces(vec![[1.0, 0.0, 0.0], [0.0, 0.0, 2.0], [0.5, 0.5, 0.5]])),
            Box::new(Forces(vec![[0.0, 1.0, 0.0], [3.0, 0.0, 0.0], [0.0, -0.5, 1.0]])),
        ]);
        let labeled = hybrid.label(&water(2)).unwrap();
        for frame in &labeled.forces {
            assert_eq!(frame, &vec![[1.0, 1.0, 0.0], [3.0, 0.0, 2.0], [0.5, 0.0, 1.5]]);
        }
    }

    #[test]
    fn mis_shaped_sub_driver_labels_are_rejected() {
        let short: Box<dyn Driver> = Box::new(Forces(vec![[1.0, 0.0, 0.0]]));
        let hybrid = HybridDriver::new(vec![Box::new(HarmonicDriver::new(1.0, [0.0; 3])), short]);
        assert!(matches!(
            hybrid.label(&water(1)),
            Err(Error::ShapeMismatch(_))
        ));

        let short_first = HybridDriver::new(vec![
            Box::new(Forces(vec![[1.0, 0.0, 0.0]])),
            Box::new(HarmonicDriver::new(1.0, [0.0; 3])),
        ]);
        assert!(matches!(
            short_first.label(&water(1)),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn virials_absent_everywhere_stay_absent() {
        let hybrid = HybridDriver::new(vec![fixed(1.0, None), fixed(1.0, None)]);
        assert!(!hybrid.label(&water(1)).unwrap().has_virials());
    }

    #[test]
    fn partial_virials_are_a_shape_mismatch() {
        let hybrid = HybridDriver::new(vec![fixed(1.0, Some(0.5)), fixed(1.0, None)]);
        assert!(matches!(
            hybrid.label(&water(1)),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn atom_count_mismatch_is_reported() {
        let odd = Box::new(Fixed {
            energy: 0.0,
            virial: None,
            atoms: Some(5),
        });
        let hybrid = HybridDriver::new(vec![fixed(1.0, None), odd]);
        assert!(matches!(
            hybrid.label(&water(1)),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn first_failure_aborts() {
        let hybrid = HybridDriver::new(vec![fixed(1.0, None), Box::new(Failing)]);
        assert!(matches!(
            hybrid.label(&water(1)),
            Err(Error::NotImplemented { .. })
        ));
    }

    #[test]
    fn empty_hybrid_cannot_label() {
        assert!(HybridDriver::new(Vec::new()).label(&water(1)).is_err());
    }

    #[test]
    fn builds_sub_drivers_from_toml() {
        let params: toml::Table = toml::from_str(
            r#"
            [[drivers]]
            type = "harmonic"
            k = 2.0

            [[drivers]]
            type = "harmonic"
            k = 1.0
            "#,
        )
        .unwrap();
        let hybrid = drivers().create("hybrid", &params).unwrap();
        let combined = hybrid.label(&water(1)).unwrap();
        let single = HarmonicDriver::new(3.0, [0.0; 3]).label(&water(1)).unwrap();
        assert!((combined.energies[0] - single.energies[0]).abs() < 1e-12);
    }

    #[test]
    fn sub_driver_without_type_is_rejected() {
        let params: toml::Table = toml::from_str("[[drivers]]\nk = 2.0").unwrap();
        assert!(matches!(
            HybridDriver::from_params(drivers(), &params),
            Err(Error::Config(_))
        ));
    }
}
