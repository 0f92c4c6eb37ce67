//! Format dispatch and the built-in converters.
//!
//! A converter implements one or more of the capability traits
//! ([`ReadPlain`], [`WritePlain`], [`ReadLabeled`], [`WriteLabeled`],
//! [`ReadBondOrder`], [`WriteBondOrder`]) and exposes them through the
//! [`Converter`] accessors. Its [`CapabilitySet`] is derived from which
//! accessors return `Some`, so an operation a converter lacks is known
//! before any I/O takes place.
//!
//! Converters are looked up by key in a [`FormatRegistry`]. The registry
//! returned by [`formats`] is built once, on first use, by
//! [`register_builtin`] and is read-only afterwards.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::error::Error;
use crate::model::{bond_order::BondOrderSystem, labeled::LabeledSystem, system::System};

mod engine;
mod options;
mod post;
mod registry;

pub mod deepmd;
pub mod lammps;
pub mod sdf;
pub mod stru;
pub mod util;

pub use engine::Engine;
pub use options::{DumpOptions, FrameSelection, LinkMode, ReadOptions, SpeciesOptions};
pub use post::PostProcess;
pub use registry::Registry;

/// One of the six operations a converter may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ReadPlain,
    WritePlain,
    ReadLabeled,
    WriteLabeled,
    ReadBondOrder,
    WriteBondOrder,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::ReadPlain,
        Capability::WritePlain,
        Capability::ReadLabeled,
        Capability::WriteLabeled,
        Capability::ReadBondOrder,
        Capability::WriteBondOrder,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Short tag used in listings, e.g. `read-plain`.
    pub fn tag(self) -> &'static str {
        match self {
            Capability::ReadPlain => "read-plain",
            Capability::WritePlain => "write-plain",
            Capability::ReadLabeled => "read-labeled",
            Capability::WriteLabeled => "write-labeled",
            Capability::ReadBondOrder => "read-bond-order",
            Capability::WriteBondOrder => "write-bond-order",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ReadPlain => write!(f, "reading plain records"),
            Capability::WritePlain => write!(f, "writing plain records"),
            Capability::ReadLabeled => write!(f, "reading labeled records"),
            Capability::WriteLabeled => write!(f, "writing labeled records"),
            Capability::ReadBondOrder => write!(f, "reading bond-order records"),
            Capability::WriteBondOrder => write!(f, "writing bond-order records"),
        }
    }
}

/// Bit set of [`Capability`] values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    pub fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<_> = self.iter().map(Capability::tag).collect();
        write!(f, "{}", tags.join(", "))
    }
}

pub trait ReadPlain {
    fn read_plain(&self, source: &Path, options: &ReadOptions) -> Result<System, Error>;
}

pub trait WritePlain {
    fn write_plain(
        &self,
        system: &System,
        destination: &Path,
        frame: FrameSelection,
        options: &DumpOptions,
    ) -> Result<(), Error>;
}

pub trait ReadLabeled {
    fn read_labeled(&self, source: &Path, options: &ReadOptions) -> Result<LabeledSystem, Error>;
}

pub trait WriteLabeled {
    fn write_labeled(
        &self,
        system: &LabeledSystem,
        destination: &Path,
        frame: FrameSelection,
        options: &DumpOptions,
    ) -> Result<(), Error>;
}

pub trait ReadBondOrder {
    fn read_bond_order(
        &self,
        source: &Path,
        options: &ReadOptions,
    ) -> Result<BondOrderSystem, Error>;
}

pub trait WriteBondOrder {
    fn write_bond_order(
        &self,
        system: &BondOrderSystem,
        destination: &Path,
        frame: FrameSelection,
        options: &DumpOptions,
    ) -> Result<(), Error>;
}

/// A file dialect participating in the read / write / post-process protocol.
pub trait Converter: Send + Sync {
    /// Human-readable dialect name.
    fn name(&self) -> &str;

    /// Steps run, in order, on every record this converter reads.
    fn post_processing(&self) -> &[PostProcess] {
        &[]
    }

    fn plain_reader(&self) -> Option<&dyn ReadPlain> {
        None
    }

    fn plain_writer(&self) -> Option<&dyn WritePlain> {
        None
    }

    fn labeled_reader(&self) -> Option<&dyn ReadLabeled> {
        None
    }

    fn labeled_writer(&self) -> Option<&dyn WriteLabeled> {
        None
    }

    fn bond_order_reader(&self) -> Option<&dyn ReadBondOrder> {
        None
    }

    fn bond_order_writer(&self) -> Option<&dyn WriteBondOrder> {
        None
    }

    fn capabilities(&self) -> CapabilitySet {
        let mut set = CapabilitySet::empty();
        let present = [
            (Capability::ReadPlain, self.plain_reader().is_some()),
            (Capability::WritePlain, self.plain_writer().is_some()),
            (Capability::ReadLabeled, self.labeled_reader().is_some()),
            (Capability::WriteLabeled, self.labeled_writer().is_some()),
            (Capability::ReadBondOrder, self.bond_order_reader().is_some()),
            (Capability::WriteBondOrder, self.bond_order_writer().is_some()),
        ];
        for (cap, has) in present {
            if has {
                set = set.with(cap);
            }
        }
        set
    }
}

pub type FormatRegistry = Registry<Arc<dyn Converter>>;

static BUILTIN_FORMATS: OnceLock<FormatRegistry> = OnceLock::new();

/// Registers every built-in converter under all of its keys.
pub fn register_builtin(registry: &mut FormatRegistry) {
    let stru: Arc<dyn Converter> = Arc::new(stru::StruFormat);
    registry.register_aliases(&["stru", "abacus/stru"], stru);

    let deepmd: Arc<dyn Converter> = Arc::new(deepmd::DeepmdRawFormat);
    registry.register_aliases(&["deepmd/raw", "deepmd"], deepmd);

    let sdf: Arc<dyn Converter> = Arc::new(sdf::SdfFormat::multi());
    registry.register_aliases(&["sdf", "sdf_file"], sdf);

    let mol: Arc<dyn Converter> = Arc::new(sdf::SdfFormat::single());
    registry.register_aliases(&["mol", "mol_file"], mol);

    let dump: Arc<dyn Converter> = Arc::new(lammps::LammpsDumpFormat);
    registry.register_aliases(&["lammps/dump", "dump"], dump);
}

/// Creates a fresh registry holding the built-in converters.
pub fn builtin_formats() -> FormatRegistry {
    let mut registry = Registry::new("format");
    register_builtin(&mut registry);
    registry
}

/// The process-wide registry of built-in converters.
pub fn formats() -> &'static FormatRegistry {
    BUILTIN_FORMATS.get_or_init(builtin_formats)
}

/// Reads a plain record through the built-in registry.
pub fn load(source: impl AsRef<Path>, key: &str) -> Result<System, Error> {
    Engine::builtin().load(source, key, &ReadOptions::default())
}

/// Writes every frame of a plain record through the built-in registry.
pub fn dump(system: &System, destination: impl AsRef<Path>, key: &str) -> Result<(), Error> {
    Engine::builtin().dump(
        system,
        destination,
        key,
        FrameSelection::All,
        &DumpOptions::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_set_collects_and_formats() {
        let set: CapabilitySet = [Capability::WritePlain, Capability::ReadPlain]
            .into_iter()
            .collect();
        assert!(set.contains(Capability::ReadPlain));
        assert!(!set.contains(Capability::ReadLabeled));
        assert_eq!(set.to_string(), "read-plain, write-plain");
    }

    #[test]
    fn builtin_keys_resolve_to_shared_converters() {
        let registry = builtin_formats();
        let a = registry.resolve("stru").unwrap();
        let b = registry.resolve("abacus/stru").unwrap();
        assert!(Arc::ptr_eq(a, b));
        assert!(registry.resolve("ABACUS/STRU").is_ok());
    }

    #[test]
    fn builtin_capabilities() {
        let registry = formats();
        let stru = registry.resolve("stru").unwrap().capabilities();
        assert!(stru.contains(Capability::ReadPlain) && stru.contains(Capability::WritePlain));
        assert!(!stru.contains(Capability::WriteLabeled));

        let deepmd = registry.resolve("deepmd/raw").unwrap().capabilities();
        assert!(deepmd.contains(Capability::ReadLabeled));
        assert!(deepmd.contains(Capability::WriteLabeled));

        let sdf = registry.resolve("sdf").unwrap().capabilities();
        assert_eq!(
            sdf,
            CapabilitySet::empty()
                .with(Capability::ReadBondOrder)
                .with(Capability::WriteBondOrder)
        );

        let dump = registry.resolve("lammps/dump").unwrap();
        assert_eq!(dump.post_processing(), &[PostProcess::SortAtomTypes]);
    }
}
