use super::record::Record;
use super::system::System;
use super::types::BondOrder;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bond {
    pub i: usize,
    pub j: usize,
    pub order: BondOrder,
}

impl Bond {
    pub fn new(idx1: usize, idx2: usize, order: BondOrder) -> Self {
        if idx1 <= idx2 {
            Self { i: idx1, j: idx2, order }
        } else {
            Self { i: idx2, j: idx1, order }
        }
    }
}

/// A [`System`] with a chemical bond graph and per-atom formal charges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BondOrderSystem {
    pub system: System,
    pub bonds: Vec<Bond>,
    pub formal_charges: Vec<i32>,
}

impl BondOrderSystem {
    pub fn new(system: System, bonds: Vec<Bond>, formal_charges: Vec<i32>) -> Result<Self, Error> {
        let record = Self {
            system,
            bonds,
            formal_charges,
        };
        record.validate()?;
        Ok(record)
    }

    #[inline]
    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    pub fn net_charge(&self) -> i32 {
        self.formal_charges.iter().sum()
    }
}

impl Record for BondOrderSystem {
    fn system(&self) -> &System {
        &self.system
    }

    fn system_mut(&mut self) -> &mut System {
        &mut self.system
    }

    fn validate(&self) -> Result<(), Error> {
        self.system.validate()?;
        let n = self.system.atom_count();
        if self.formal_charges.len() != n {
            return Err(Error::shape(format!(
                "{} formal charges for {n} atoms",
                self.formal_charges.len()
            )));
        }
        if let Some(b) = self.bonds.iter().find(|b| b.i >= n || b.j >= n || b.i == b.j) {
            return Err(Error::shape(format!(
                "bond {}-{} is invalid for {n} atoms",
                b.i, b.j
            )));
        }
        Ok(())
    }

    fn permute_labels(&mut self, order: &[usize]) {
        let mut old_to_new = vec![0; order.len()];
        for (new, &old) in order.iter().enumerate() {
            old_to_new[old] = new;
        }
        for bond in &mut self.bonds {
            *bond = Bond::new(old_to_new[bond.i], old_to_new[bond.j], bond.order);
        }
        self.formal_charges = order.iter().map(|&i| self.formal_charges[i]).collect();
    }
}
