//! Labeling engines.
//!
//! A [`Driver`] turns a [`System`] into a [`LabeledSystem`] by computing
//! energies, forces and, where it can, virials for every frame. Drivers are
//! built by key from a TOML parameter table through a [`DriverRegistry`],
//! which lets composite drivers such as [`hybrid::HybridDriver`] construct
//! their parts from nested tables:
//!
//! ```toml
//! [[drivers]]
//! type = "harmonic"
//! k = 2.0
//!
//! [[drivers]]
//! type = "harmonic"
//! k = 0.5
//! anchor = [1.0, 0.0, 0.0]
//! ```

use std::sync::OnceLock;

use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::io::Registry;
use crate::model::{labeled::LabeledSystem, system::System};

pub mod harmonic;
pub mod hybrid;
pub mod minimize;

pub use harmonic::HarmonicDriver;
pub use hybrid::HybridDriver;
pub use minimize::Minimizer;

/// Computes labels for structure records.
pub trait Driver: Send + Sync {
    /// Registry-facing name used in log and error messages.
    fn name(&self) -> &str;

    /// Labels every frame of `system`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotImplemented`] when the driver cannot produce a
    /// requested label, or whatever error the underlying computation
    /// raises.
    fn label(&self, system: &System) -> Result<LabeledSystem, Error>;

    /// Relaxes every frame of `system` and returns the labeled minima.
    ///
    /// The default runs [`Minimizer::default`] on top of [`Driver::label`].
    fn minimize(&self, system: &System) -> Result<LabeledSystem, Error> {
        Minimizer::default().run(self, system)
    }
}

/// Builds a driver from its parameter table. The registry is passed along
/// so composite drivers can create their sub-drivers.
pub type DriverFactory = fn(&DriverRegistry, &toml::Table) -> Result<Box<dyn Driver>, Error>;

/// Key-to-factory table for drivers.
#[derive(Clone)]
pub struct DriverRegistry {
    factories: Registry<DriverFactory>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: Registry::new("driver"),
        }
    }

    /// Creates a registry holding the built-in drivers.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        register_builtin(&mut registry);
        registry
    }

    /// Stores `factory` under `key`, replacing any earlier entry.
    pub fn register(&mut self, key: &str, factory: DriverFactory) {
        self.factories.register(key, factory);
    }

    /// Resolves `key` and builds a driver from `params`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownKey`] for an unregistered key, and
    /// [`Error::Config`] when `params` do not fit the driver.
    pub fn create(&self, key: &str, params: &toml::Table) -> Result<Box<dyn Driver>, Error> {
        let factory = self.factories.resolve(key)?;
        factory(self, params)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains(key)
    }

    /// Registered keys in lexical order.
    pub fn keys(&self) -> Vec<&str> {
        self.factories.keys()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers every built-in driver.
pub fn register_builtin(registry: &mut DriverRegistry) {
    registry.register("hybrid", hybrid::create);
    registry.register("harmonic", harmonic::create);
}

static BUILTIN_DRIVERS: OnceLock<DriverRegistry> = OnceLock::new();

/// The process-wide registry of built-in drivers.
pub fn drivers() -> &'static DriverRegistry {
    BUILTIN_DRIVERS.get_or_init(DriverRegistry::builtin)
}

/// Decodes a parameter table into a typed parameter struct.
pub(crate) fn decode_params<T: DeserializeOwned>(params: &toml::Table) -> Result<T, Error> {
    Ok(toml::Value::Table(params.clone()).try_into()?)
}
