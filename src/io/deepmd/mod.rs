//! DeePMD-kit `raw` directories.
//!
//! A directory holds one file per array, one row per frame:
//!
//! | file            | rows      | columns |
//! |-----------------|-----------|---------|
//! | `type.raw`      | per atom  | 1       |
//! | `type_map.raw`  | per type  | 1       |
//! | `coord.raw`     | per frame | 3N      |
//! | `box.raw`       | per frame | 9       |
//! | `energy.raw`    | per frame | 1       |
//! | `force.raw`     | per frame | 3N      |
//! | `virial.raw`    | per frame | 9       |
//!
//! An empty `nopbc` file marks a non-periodic record, in which case
//! `box.raw` is absent.

use std::path::Path;

use super::{
    Converter, DumpOptions, FrameSelection, ReadLabeled, ReadOptions, ReadPlain, WriteLabeled,
    WritePlain,
};
use crate::error::Error;
use crate::model::{labeled::LabeledSystem, system::System};

mod reader;
mod writer;

pub(crate) const FORMAT: &str = "deepmd/raw";

pub(crate) const TYPE: &str = "type.raw";
pub(crate) const TYPE_MAP: &str = "type_map.raw";
pub(crate) const COORD: &str = "coord.raw";
pub(crate) const BOX: &str = "box.raw";
pub(crate) const NOPBC: &str = "nopbc";
pub(crate) const ENERGY: &str = "energy.raw";
pub(crate) const FORCE: &str = "force.raw";
pub(crate) const VIRIAL: &str = "virial.raw";

/// Converter for the `deepmd/raw` / `deepmd` keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeepmdRawFormat;

impl Converter for DeepmdRawFormat {
    fn name(&self) -> &str {
        "DeePMD-kit raw"
    }

    fn plain_reader(&self) -> Option<&dyn ReadPlain> {
        Some(self)
    }

    fn plain_writer(&self) -> Option<&dyn WritePlain> {
        Some(self)
    }

    fn labeled_reader(&self) -> Option<&dyn ReadLabeled> {
        Some(self)
    }

    fn labeled_writer(&self) -> Option<&dyn WriteLabeled> {
        Some(self)
    }
}

impl ReadPlain for DeepmdRawFormat {
    fn read_plain(&self, source: &Path, options: &ReadOptions) -> Result<System, Error> {
        Ok(reader::read_system(source, options)?.0)
    }
}

impl ReadLabeled for DeepmdRawFormat {
    fn read_labeled(&self, source: &Path, options: &ReadOptions) -> Result<LabeledSystem, Error> {
        reader::read_labeled(source, options)
    }
}

impl WritePlain for DeepmdRawFormat {
    fn write_plain(
        &self,
        system: &System,
        destination: &Path,
        frame: FrameSelection,
        _options: &DumpOptions,
    ) -> Result<(), Error> {
        let frames = frame.indices(system.frame_count())?;
        writer::write_system(destination, system, &frames)
    }
}

impl WriteLabeled for DeepmdRawFormat {
    fn write_labeled(
        &self,
        system: &LabeledSystem,
        destination: &Path,
        frame: FrameSelection,
        _options: &DumpOptions,
    ) -> Result<(), Error> {
        let frames = frame.indices(system.frame_count())?;
        writer::write_labeled(destination, system, &frames)
    }
}
