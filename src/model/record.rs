use super::system::System;
use super::types::Mat3;
use crate::error::Error;

/// Common view over the three record kinds, used by post-processing steps
/// that must keep labels and topology consistent with the atoms they move.
pub trait Record {
    fn system(&self) -> &System;

    fn system_mut(&mut self) -> &mut System;

    fn validate(&self) -> Result<(), Error> {
        self.system().validate()
    }

    /// Applies the row-vector rotation `rot` to every label attached to
    /// `frame`. Coordinates and cells are handled by the caller.
    fn rotate_labels(&mut self, _frame: usize, _rot: &Mat3) {}

    /// Reorders per-atom labels after the atoms were reordered so that new
    /// atom `k` is old atom `order[k]`.
    fn permute_labels(&mut self, _order: &[usize]) {}
}

impl Record for System {
    fn system(&self) -> &System {
        self
    }

    fn system_mut(&mut self) -> &mut System {
        self
    }
}
