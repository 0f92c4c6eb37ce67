//! Named side-channel fields attached to a [`System`](super::system::System).
//!
//! Formats that carry data beyond species, coordinates and cells (ABACUS
//! pseudopotential references, per-atom magnetic moments, ...) store it
//! here under a well-known name. Converters read the names they understand
//! and ignore every other entry.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::types::Vec3;

/// Well-known side-channel names.
pub mod keys {
    /// Per-species atomic masses ([`Value::Scalar`](super::Value::Scalar)).
    pub const MASSES: &str = "masses";
    /// Per-species pseudopotential files.
    pub const PP_FILES: &str = "pp_files";
    /// Per-species numerical orbital files.
    pub const ORB_FILES: &str = "orb_files";
    /// Global numerical descriptor file.
    pub const DESCRIPTOR: &str = "dpks_descriptor";
    /// Per-species default magnetic moment from STRU block headers.
    pub const SPECIES_MAG: &str = "species_mag";
    /// Per-atom move flags.
    pub const MOVE: &str = "move";
    /// Per-atom velocity.
    pub const VELOCITY: &str = "velocity";
    /// Per-atom magnetic moment, scalar or vector.
    pub const MAG: &str = "mag";
    /// Per-atom first spin angle.
    pub const ANGLE1: &str = "angle1";
    /// Per-atom second spin angle.
    pub const ANGLE2: &str = "angle2";
    /// Per-atom spin constraint, single flag or per axis.
    pub const SPIN_CONSTRAINT: &str = "sc";
    /// Per-atom Lagrange multiplier, scalar or vector.
    pub const LAMBDA: &str = "lambda";
}

/// A single side-channel value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Vector(Vec3),
    Flag(bool),
    Flags([bool; 3]),
    Text(String),
    File(PathBuf),
}

impl Value {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&PathBuf> {
        match self {
            Value::File(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_flags(&self) -> Option<[bool; 3]> {
        match self {
            Value::Flags(f) => Some(*f),
            Value::Flag(f) => Some([*f; 3]),
            _ => None,
        }
    }
}

/// How a field is indexed.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// One value for the whole record.
    Global(Value),
    /// One optional value per species, in `species_names` order.
    PerSpecies(Vec<Option<Value>>),
    /// One optional value per atom, in atom order.
    PerAtom(Vec<Option<Value>>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extensions {
    fields: BTreeMap<String, Field>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, field: Field) -> Option<Field> {
        self.fields.insert(name.into(), field)
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        match self.fields.get(name) {
            Some(Field::Global(v)) => Some(v),
            _ => None,
        }
    }

    pub fn per_species(&self, name: &str) -> Option<&[Option<Value>]> {
        match self.fields.get(name) {
            Some(Field::PerSpecies(v)) => Some(v),
            _ => None,
        }
    }

    pub fn per_atom(&self, name: &str) -> Option<&[Option<Value>]> {
        match self.fields.get(name) {
            Some(Field::PerAtom(v)) => Some(v),
            _ => None,
        }
    }

    /// Stores a per-atom column unless every entry is absent.
    pub fn insert_per_atom(&mut self, name: &str, values: Vec<Option<Value>>) {
        if values.iter().any(Option::is_some) {
            self.fields.insert(name.to_string(), Field::PerAtom(values));
        }
    }

    /// Reorders every per-atom column so that new atom `k` takes the value of
    /// old atom `order[k]`.
    pub(crate) fn permute_atoms(&mut self, order: &[usize]) {
        for field in self.fields.values_mut() {
            if let Field::PerAtom(values) = field {
                *values = order.iter().map(|&old| values[old].clone()).collect();
            }
        }
    }

    /// Reorders every per-species column, new species `k` taking old `order[k]`.
    pub(crate) fn permute_species(&mut self, order: &[usize]) {
        for field in self.fields.values_mut() {
            if let Field::PerSpecies(values) = field {
                *values = order
                    .iter()
                    .map(|&old| values.get(old).cloned().flatten())
                    .collect();
            }
        }
    }

    pub(crate) fn check_lengths(&self, n_species: usize, n_atoms: usize) -> Result<(), String> {
        for (name, field) in &self.fields {
            match field {
                Field::PerSpecies(v) if v.len() != n_species => {
                    return Err(format!(
                        "side channel '{name}' has {} entries for {n_species} species",
                        v.len()
                    ));
                }
                Field::PerAtom(v) if v.len() != n_atoms => {
                    return Err(format!(
                        "side channel '{name}' has {} entries for {n_atoms} atoms",
                        v.len()
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
