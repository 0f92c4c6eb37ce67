//! MDL V2000 molfiles and SD files.
//!
//! Each `$$$$`-terminated block of an SD file is one conformer; all blocks
//! must share atoms, bonds and charges, and become the frames of one
//! bond-order record. A molfile holds a single block.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::warn;

use super::{Converter, DumpOptions, FrameSelection, ReadBondOrder, ReadOptions, WriteBondOrder};
use crate::error::Error;
use crate::model::bond_order::BondOrderSystem;

pub mod reader;
pub mod writer;

pub(crate) const FORMAT: &str = "SDF";

/// Converter for the `sdf` and `mol` key families.
#[derive(Debug, Clone, Copy)]
pub struct SdfFormat {
    multi: bool,
}

impl SdfFormat {
    /// SD files: every frame is written, `$$$$` closes each block.
    pub const fn multi() -> Self {
        Self { multi: true }
    }

    /// Molfiles: exactly one block.
    pub const fn single() -> Self {
        Self { multi: false }
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }
}

impl Converter for SdfFormat {
    fn name(&self) -> &str {
        if self.multi { "MDL SD file" } else { "MDL molfile" }
    }

    fn bond_order_reader(&self) -> Option<&dyn ReadBondOrder> {
        Some(self)
    }

    fn bond_order_writer(&self) -> Option<&dyn WriteBondOrder> {
        Some(self)
    }
}

impl ReadBondOrder for SdfFormat {
    fn read_bond_order(&self, source: &Path, options: &ReadOptions) -> Result<BondOrderSystem, Error> {
        let file = File::open(source)?;
        let mut record = reader::read(BufReader::new(file), self.multi, options)?;
        if let Some(type_map) = &options.type_map {
            record.system.apply_type_map(type_map)?;
        }
        Ok(record)
    }
}

impl WriteBondOrder for SdfFormat {
    fn write_bond_order(
        &self,
        record: &BondOrderSystem,
        destination: &Path,
        frame: FrameSelection,
        _options: &DumpOptions,
    ) -> Result<(), Error> {
        let frames = frame.indices(record.system.frame_count())?;
        if !self.multi && frames.len() != 1 {
            return Err(Error::Conversion(format!(
                "a molfile holds one conformer but {} were selected",
                frames.len()
            )));
        }
        if record.system.is_periodic() {
            warn!("{FORMAT}: cell vectors are not written");
        }
        let mut out = BufWriter::new(File::create(destination)?);
        writer::write(&mut out, record, &frames, self.multi)?;
        out.flush()?;
        Ok(())
    }
}
