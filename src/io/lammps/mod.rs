//! LAMMPS text formats.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::{Converter, PostProcess, ReadOptions, ReadPlain};
use crate::error::Error;
use crate::model::system::System;

pub mod dump;

const POST: [PostProcess; 1] = [PostProcess::SortAtomTypes];

/// Read-only converter for `ITEM:`-style dump trajectories
/// (`lammps/dump`, `dump`). Atoms come out grouped by species.
#[derive(Debug, Clone, Copy, Default)]
pub struct LammpsDumpFormat;

impl Converter for LammpsDumpFormat {
    fn name(&self) -> &str {
        "LAMMPS dump"
    }

    fn post_processing(&self) -> &[PostProcess] {
        &POST
    }

    fn plain_reader(&self) -> Option<&dyn ReadPlain> {
        Some(self)
    }
}

impl ReadPlain for LammpsDumpFormat {
    fn read_plain(&self, source: &Path, options: &ReadOptions) -> Result<System, Error> {
        let file = File::open(source)?;
        dump::read(BufReader::new(file), options)
    }
}
