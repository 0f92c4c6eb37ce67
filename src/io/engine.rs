use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

use super::{
    Capability, Converter, DumpOptions, FormatRegistry, FrameSelection, PostProcess, ReadOptions,
    formats,
};
use crate::error::Error;
use crate::model::{
    bond_order::BondOrderSystem, labeled::LabeledSystem, record::Record, system::System,
};

/// Resolves format keys against a registry and runs converters.
///
/// Every operation checks the requested capability before touching the
/// filesystem, so an unsupported request never performs I/O.
#[derive(Clone, Copy)]
pub struct Engine<'r> {
    registry: &'r FormatRegistry,
}

impl Engine<'static> {
    /// Engine over the process-wide built-in registry.
    pub fn builtin() -> Self {
        Self::new(formats())
    }
}

impl<'r> Engine<'r> {
    pub fn new(registry: &'r FormatRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r FormatRegistry {
        self.registry
    }

    pub fn load(
        &self,
        source: impl AsRef<Path>,
        key: &str,
        options: &ReadOptions,
    ) -> Result<System, Error> {
        let source = source.as_ref();
        let converter = self.checked(key, Capability::ReadPlain)?;
        let reader = converter
            .plain_reader()
            .ok_or_else(|| Error::unsupported(key, Capability::ReadPlain))?;
        info!("reading {} as '{}'", source.display(), key);
        let record = reader.read_plain(source, options)?;
        finish(record, converter.post_processing())
    }

    pub fn load_labeled(
        &self,
        source: impl AsRef<Path>,
        key: &str,
        options: &ReadOptions,
    ) -> Result<LabeledSystem, Error> {
        let source = source.as_ref();
        let converter = self.checked(key, Capability::ReadLabeled)?;
        let reader = converter
            .labeled_reader()
            .ok_or_else(|| Error::unsupported(key, Capability::ReadLabeled))?;
        info!("reading labeled {} as '{}'", source.display(), key);
        let record = reader.read_labeled(source, options)?;
        finish(record, converter.post_processing())
    }

    pub fn load_bond_order(
        &self,
        source: impl AsRef<Path>,
        key: &str,
        options: &ReadOptions,
    ) -> Result<BondOrderSystem, Error> {
        let source = source.as_ref();
        let converter = self.checked(key, Capability::ReadBondOrder)?;
        let reader = converter
            .bond_order_reader()
            .ok_or_else(|| Error::unsupported(key, Capability::ReadBondOrder))?;
        info!("reading bond-order {} as '{}'", source.display(), key);
        let record = reader.read_bond_order(source, options)?;
        finish(record, converter.post_processing())
    }

    pub fn dump(
        &self,
        system: &System,
        destination: impl AsRef<Path>,
        key: &str,
        frame: FrameSelection,
        options: &DumpOptions,
    ) -> Result<(), Error> {
        let destination = destination.as_ref();
        let converter = self.checked(key, Capability::WritePlain)?;
        let writer = converter
            .plain_writer()
            .ok_or_else(|| Error::unsupported(key, Capability::WritePlain))?;
        frame.indices(system.frame_count())?;
        system.validate()?;
        info!("writing {} as '{}'", destination.display(), key);
        writer.write_plain(system, destination, frame, options)
    }

    pub fn dump_labeled(
        &self,
        system: &LabeledSystem,
        destination: impl AsRef<Path>,
        key: &str,
        frame: FrameSelection,
        options: &DumpOptions,
    ) -> Result<(), Error> {
        let destination = destination.as_ref();
        let converter = self.checked(key, Capability::WriteLabeled)?;
        let writer = converter
            .labeled_writer()
            .ok_or_else(|| Error::unsupported(key, Capability::WriteLabeled))?;
        frame.indices(system.frame_count())?;
        system.validate()?;
        info!("writing labeled {} as '{}'", destination.display(), key);
        writer.write_labeled(system, destination, frame, options)
    }

    pub fn dump_bond_order(
        &self,
        system: &BondOrderSystem,
        destination: impl AsRef<Path>,
        key: &str,
        frame: FrameSelection,
        options: &DumpOptions,
    ) -> Result<(), Error> {
        let destination = destination.as_ref();
        let converter = self.checked(key, Capability::WriteBondOrder)?;
        let writer = converter
            .bond_order_writer()
            .ok_or_else(|| Error::unsupported(key, Capability::WriteBondOrder))?;
        frame.indices(system.system.frame_count())?;
        system.validate()?;
        info!("writing bond-order {} as '{}'", destination.display(), key);
        writer.write_bond_order(system, destination, frame, options)
    }

    fn checked(&self, key: &str, capability: Capability) -> Result<&'r Arc<dyn Converter>, Error> {
        let converter = self.registry.resolve(key)?;
        if !converter.capabilities().contains(capability) {
            return Err(Error::unsupported(key, capability));
        }
        Ok(converter)
    }
}

fn finish<R: Record>(mut record: R, steps: &[PostProcess]) -> Result<R, Error> {
    for step in steps {
        debug!("post-processing: {}", step);
        record = step.apply(record)?;
    }
    record.validate()?;
    Ok(record)
}
