use super::record::Record;
use super::system::System;
use super::types::{Mat3, Vec3, mat_mul, transpose, vec_mat};
use crate::error::Error;

/// A [`System`] with per-frame energies, forces and optional virials.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledSystem {
    pub system: System,
    /// Potential energy per frame, in eV.
    pub energies: Vec<f64>,
    /// Force on every atom per frame, in eV/Å.
    pub forces: Vec<Vec<Vec3>>,
    /// Virial tensor per frame, in eV.
    pub virials: Option<Vec<Mat3>>,
}

impl LabeledSystem {
    /// Assembles a labeled record and checks that every label array matches
    /// the frame and atom counts of `system`.
    pub fn new(
        system: System,
        energies: Vec<f64>,
        forces: Vec<Vec<Vec3>>,
        virials: Option<Vec<Mat3>>,
    ) -> Result<Self, Error> {
        let labeled = Self {
            system,
            energies,
            forces,
            virials,
        };
        labeled.validate()?;
        Ok(labeled)
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.system.frame_count()
    }

    #[inline]
    pub fn atom_count(&self) -> usize {
        self.system.atom_count()
    }

    #[inline]
    pub fn has_virials(&self) -> bool {
        self.virials.is_some()
    }

    pub fn frame(&self, idx: usize) -> Option<LabeledSystem> {
        Some(LabeledSystem {
            system: self.system.frame(idx)?,
            energies: vec![*self.energies.get(idx)?],
            forces: vec![self.forces.get(idx)?.clone()],
            virials: self.virials.as_ref().map(|v| vec![v[idx]]),
        })
    }

    /// Appends the frames of `other`, which must describe the same atoms.
    ///
    /// Every check runs before `self` is touched, so a rejected `other`
    /// leaves the receiver unchanged.
    pub fn append(&mut self, other: LabeledSystem) -> Result<(), Error> {
        other.validate()?;
        if self.frame_count() == 0 && self.system.species_names.is_empty() {
            *self = other;
            return Ok(());
        }
        if other.system.species_names != self.system.species_names
            || other.system.atom_species_index != self.system.atom_species_index
        {
            return Err(Error::shape(
                "cannot append frames with a different species layout",
            ));
        }
        if self.has_virials() != other.has_virials() {
            return Err(Error::shape(
                "cannot append frames with and without virials",
            ));
        }
        if self.frame_count() > 0 && self.system.is_periodic() != other.system.is_periodic() {
            return Err(Error::shape(
                "cannot mix periodic and non-periodic frames in one record",
            ));
        }
        let LabeledSystem {
            system,
            energies,
            forces,
            virials,
        } = other;
        for (i, coords) in system.coordinates.into_iter().enumerate() {
            let cell = system.cells.as_ref().map(|c| c[i]);
            self.system.push_frame(coords, cell)?;
        }
        self.energies.extend(energies);
        self.forces.extend(forces);
        if let (Some(mine), Some(theirs)) = (&mut self.virials, virials) {
            mine.extend(theirs);
        }
        Ok(())
    }
}

impl Record for LabeledSystem {
    fn system(&self) -> &System {
        &self.system
    }

    fn system_mut(&mut self) -> &mut System {
        &mut self.system
    }

    fn validate(&self) -> Result<(), Error> {
        self.system.validate()?;
        let n_frames = self.frame_count();
        if self.energies.len() != n_frames {
            return Err(Error::shape(format!(
                "{} energies for {n_frames} frames",
                self.energies.len()
            )));
        }
        if self.forces.len() != n_frames {
            return Err(Error::shape(format!(
                "{} force frames for {n_frames} frames",
                self.forces.len()
            )));
        }
        let n_atoms = self.atom_count();
        if let Some((i, f)) = self.forces.iter().enumerate().find(|(_, f)| f.len() != n_atoms) {
            return Err(Error::shape(format!(
                "frame {i} has {} forces for {n_atoms} atoms",
                f.len()
            )));
        }
        if let Some(v) = &self.virials
            && v.len() != n_frames
        {
            return Err(Error::shape(format!(
                "{} virials for {n_frames} frames",
                v.len()
            )));
        }
        Ok(())
    }

    fn rotate_labels(&mut self, frame: usize, rot: &Mat3) {
        if let Some(forces) = self.forces.get_mut(frame) {
            for f in forces.iter_mut() {
                *f = vec_mat(f, rot);
            }
        }
        if let Some(v) = self.virials.as_mut().and_then(|v| v.get_mut(frame)) {
            *v = mat_mul(&mat_mul(&transpose(rot), v), rot);
        }
    }

    fn permute_labels(&mut self, order: &[usize]) {
        for frame in &mut self.forces {
            *frame = order.iter().map(|&i| frame[i]).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_atom(energy: f64, force: Vec3) -> LabeledSystem {
        let mut s = System::with_species(vec!["H".into()], vec![0]);
        s.push_frame(vec![[0.0; 3]], None).unwrap();
        LabeledSystem::new(s, vec![energy], vec![vec![force]], None).unwrap()
    }

    #[test]
    fn new_rejects_force_count_mismatch() {
        let mut s = System::with_species(vec!["H".into()], vec![0, 0]);
        s.push_frame(vec![[0.0; 3]; 2], None).unwrap();
        let err = LabeledSystem::new(s, vec![0.0], vec![vec![[0.0; 3]]], None).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }

    #[test]
    fn new_rejects_energy_count_mismatch() {
        let mut s = System::with_species(vec!["H".into()], vec![0]);
        s.push_frame(vec![[0.0; 3]], None).unwrap();
        let err = LabeledSystem::new(s, vec![], vec![vec![[0.0; 3]]], None).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }

    #[test]
    fn append_concatenates_frames() {
        let mut a = single_atom(1.0, [1.0, 0.0, 0.0]);
        a.append(single_atom(2.0, [0.0, 1.0, 0.0])).unwrap();
        assert_eq!(a.frame_count(), 2);
        assert_eq!(a.energies, vec![1.0, 2.0]);
        assert_eq!(a.forces[1][0], [0.0, 1.0, 0.0]);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn rejected_append_leaves_receiver_untouched() {
        let mut a = single_atom(1.0, [1.0, 0.0, 0.0]);
        let before = a.clone();

        let mut two = single_atom(2.0, [0.0; 3]);
        two.system.push_frame(vec![[0.5; 3]], None).unwrap();
        two.forces.push(vec![[0.0; 3]]);
        assert!(matches!(a.append(two), Err(Error::ShapeMismatch(_))));
        assert_eq!(a, before);

        let mut periodic = System::with_species(vec!["H".into()], vec![0]);
        periodic
            .push_frame(vec![[0.0; 3]], Some([[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]]))
            .unwrap();
        let periodic = LabeledSystem::new(periodic, vec![0.0], vec![vec![[0.0; 3]]], None).unwrap();
        assert!(a.append(periodic).is_err());
        assert_eq!(a, before);
    }

    #[test]
    fn append_into_empty_takes_other() {
        let mut a = LabeledSystem::default();
        a.append(single_atom(3.0, [0.0; 3])).unwrap();
        assert_eq!(a.energies, vec![3.0]);
    }

    #[test]
    fn rotate_labels_turns_forces() {
        let mut a = single_atom(0.0, [1.0, 0.0, 0.0]);
        // 90 degrees about z for row vectors: x -> y
        let rot = [[0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        a.rotate_labels(0, &rot);
        let f = a.forces[0][0];
        assert!((f[0]).abs() < 1e-12 && (f[1] - 1.0).abs() < 1e-12);
    }
}
