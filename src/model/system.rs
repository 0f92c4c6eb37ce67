use super::extension::Extensions;
use super::types::{Mat3, Vec3};
use crate::error::Error;

/// Multi-frame atomic configuration with one fixed species ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct System {
    /// Unique species labels; the position of a label is its species index.
    pub species_names: Vec<String>,
    /// Atom count per species, parallel to `species_names`.
    pub species_counts: Vec<usize>,
    /// Species index of every atom, identical in all frames.
    pub atom_species_index: Vec<usize>,
    /// Lattice vectors per frame, `None` for non-periodic records.
    pub cells: Option<Vec<Mat3>>,
    /// Cartesian coordinates per frame and atom, in Å.
    pub coordinates: Vec<Vec<Vec3>>,
    pub extensions: Extensions,
}

impl System {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frameless record from species labels and per-atom indices,
    /// deriving `species_counts`.
    pub fn with_species(species_names: Vec<String>, atom_species_index: Vec<usize>) -> Self {
        let mut system = Self {
            species_names,
            atom_species_index,
            ..Self::default()
        };
        system.recount();
        system
    }

    #[inline]
    pub fn atom_count(&self) -> usize {
        self.atom_species_index.len()
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.coordinates.len()
    }

    #[inline]
    pub fn species_count(&self) -> usize {
        self.species_names.len()
    }

    #[inline]
    pub fn is_periodic(&self) -> bool {
        self.cells.is_some()
    }

    pub fn cell(&self, frame: usize) -> Option<&Mat3> {
        self.cells.as_ref().and_then(|c| c.get(frame))
    }

    pub fn species_of(&self, atom: usize) -> &str {
        &self.species_names[self.atom_species_index[atom]]
    }

    /// Appends one frame. `cell` must be `Some` exactly when the record is
    /// periodic, or the record is empty and this frame decides it.
    pub fn push_frame(&mut self, coordinates: Vec<Vec3>, cell: Option<Mat3>) -> Result<(), Error> {
        if coordinates.len() != self.atom_count() {
            return Err(Error::shape(format!(
                "frame has {} coordinates for {} atoms",
                coordinates.len(),
                self.atom_count()
            )));
        }
        match (cell, &mut self.cells) {
            (Some(c), Some(cells)) => cells.push(c),
            (Some(c), None) if self.coordinates.is_empty() => self.cells = Some(vec![c]),
            (None, None) => {}
            _ => {
                return Err(Error::shape(
                    "cannot mix periodic and non-periodic frames in one record",
                ));
            }
        }
        self.coordinates.push(coordinates);
        Ok(())
    }

    /// Recomputes `species_counts` from `atom_species_index`.
    pub fn recount(&mut self) {
        let mut counts = vec![0; self.species_names.len()];
        for &t in &self.atom_species_index {
            if let Some(c) = counts.get_mut(t) {
                *c += 1;
            }
        }
        self.species_counts = counts;
    }

    /// `true` when atoms of each species form one contiguous run, in
    /// species-index order.
    pub fn is_species_sorted(&self) -> bool {
        self.atom_species_index.windows(2).all(|w| w[0] <= w[1])
    }

    /// Checks every structural invariant of the record.
    pub fn validate(&self) -> Result<(), Error> {
        let n_species = self.species_names.len();
        let n_atoms = self.atom_count();

        if self.species_counts.len() != n_species {
            return Err(Error::shape(format!(
                "{} species counts for {} species names",
                self.species_counts.len(),
                n_species
            )));
        }
        for (i, name) in self.species_names.iter().enumerate() {
            if self.species_names[..i].contains(name) {
                return Err(Error::shape(format!("duplicate species name '{name}'")));
            }
        }
        if let Some(bad) = self.atom_species_index.iter().find(|&&t| t >= n_species) {
            return Err(Error::shape(format!(
                "atom species index {bad} exceeds {n_species} species"
            )));
        }
        let total: usize = self.species_counts.iter().sum();
        if total != n_atoms {
            return Err(Error::shape(format!(
                "species counts sum to {total} but the record has {n_atoms} atoms"
            )));
        }
        for (i, frame) in self.coordinates.iter().enumerate() {
            if frame.len() != n_atoms {
                return Err(Error::shape(format!(
                    "frame {i} has {} coordinates for {n_atoms} atoms",
                    frame.len()
                )));
            }
        }
        if let Some(cells) = &self.cells
            && cells.len() != self.frame_count()
        {
            return Err(Error::shape(format!(
                "{} cells for {} frames",
                cells.len(),
                self.frame_count()
            )));
        }
        self.extensions
            .check_lengths(n_species, n_atoms)
            .map_err(Error::ShapeMismatch)
    }

    /// Returns a single-frame copy of frame `idx`.
    pub fn frame(&self, idx: usize) -> Option<System> {
        let coords = self.coordinates.get(idx)?.clone();
        Some(System {
            species_names: self.species_names.clone(),
            species_counts: self.species_counts.clone(),
            atom_species_index: self.atom_species_index.clone(),
            cells: self.cells.as_ref().map(|c| vec![c[idx]]),
            coordinates: vec![coords],
            extensions: self.extensions.clone(),
        })
    }

    /// Re-indexes species to follow `type_map`. Every current species must
    /// appear in the map; map entries without atoms get a zero count.
    pub fn apply_type_map(&mut self, type_map: &[String]) -> Result<(), Error> {
        let mut old_to_new = Vec::with_capacity(self.species_names.len());
        for name in &self.species_names {
            let pos = type_map.iter().position(|t| t == name).ok_or_else(|| {
                Error::Conversion(format!("species '{name}' is missing from the type map"))
            })?;
            old_to_new.push(pos);
        }
        let new_to_old: Vec<usize> = (0..type_map.len())
            .map(|new| {
                old_to_new
                    .iter()
                    .position(|&n| n == new)
                    .unwrap_or(usize::MAX)
            })
            .collect();

        for t in &mut self.atom_species_index {
            *t = old_to_new[*t];
        }
        self.species_names = type_map.to_vec();
        self.extensions.permute_species(&new_to_old);
        self.recount();
        Ok(())
    }

    /// Stable-sorts atoms by species index, permuting coordinates and
    /// per-atom side channels. Returns the applied order: new atom `k` is
    /// old atom `order[k]`.
    pub fn sort_atoms_by_species(&mut self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.atom_count()).collect();
        order.sort_by_key(|&i| self.atom_species_index[i]);

        self.atom_species_index = order.iter().map(|&i| self.atom_species_index[i]).collect();
        for frame in &mut self.coordinates {
            *frame = order.iter().map(|&i| frame[i]).collect();
        }
        self.extensions.permute_atoms(&order);
        order
    }
}
