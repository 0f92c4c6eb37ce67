use serde::Deserialize;

use super::{Driver, DriverRegistry, decode_params};
use crate::error::Error;
use crate::model::labeled::LabeledSystem;
use crate::model::system::System;
use crate::model::types::{Mat3, Vec3, dot};

/// Isotropic spring tethering every atom to one anchor point:
/// `E = k/2 Σ |rᵢ - a|²`, `Fᵢ = -k (rᵢ - a)`.
///
/// Virials `W = Σ dᵢ ⊗ Fᵢ` are reported for periodic records only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarmonicDriver {
    /// Spring constant in eV/Å².
    #[serde(default = "default_k")]
    pub k: f64,
    /// Anchor position in Å.
    #[serde(default)]
    pub anchor: Vec3,
}

fn default_k() -> f64 {
    1.0
}

impl HarmonicDriver {
    pub fn new(k: f64, anchor: Vec3) -> Self {
        Self { k, anchor }
    }
}

pub(super) fn create(_: &DriverRegistry, params: &toml::Table) -> Result<Box<dyn Driver>, Error> {
    let driver: HarmonicDriver = decode_params(params)?;
    Ok(Box::new(driver))
}

impl Driver for HarmonicDriver {
    fn name(&self) -> &str {
        "harmonic"
    }

    fn label(&self, system: &System) -> Result<LabeledSystem, Error> {
        let mut energies = Vec::with_capacity(system.frame_count());
        let mut forces = Vec::with_capacity(system.frame_count());
        let mut virials = Vec::with_capacity(system.frame_count());

        for frame in &system.coordinates {
            let mut energy = 0.0;
            let mut frame_forces = Vec::with_capacity(frame.len());
            let mut virial: Mat3 = [[0.0; 3]; 3];
            for pos in frame {
                let d = [
                    pos[0] - self.anchor[0],
                    pos[1] - self.anchor[1],
                    pos[2] - self.anchor[2],
                ];
                energy += 0.5 * self.k * dot(&d, &d);
                let f = [-self.k * d[0], -self.k * d[1], -self.k * d[2]];
                for a in 0..3 {
                    for b in 0..3 {
                        virial[a][b] += d[a] * f[b];
                    }
                }
                frame_forces.push(f);
            }
            energies.push(energy);
            forces.push(frame_forces);
            virials.push(virial);
        }

        let virials = system.is_periodic().then_some(virials);
        LabeledSystem::new(system.clone(), energies, forces, virials)
    }
}
