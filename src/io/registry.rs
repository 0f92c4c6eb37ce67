use std::collections::HashMap;

use log::debug;

use crate::error::Error;

/// Key-to-implementation table shared by the format and driver layers.
///
/// Keys are case-insensitive. Registering a key twice replaces the first
/// entry; the registry is meant to be filled during initialization and
/// only read afterwards.
#[derive(Clone)]
pub struct Registry<T> {
    kind: &'static str,
    entries: HashMap<String, T>,
}

impl<T: Clone> Registry<T> {
    /// Creates an empty registry; `kind` names it in error messages.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, key: &str, implementation: T) {
        let key = key.to_lowercase();
        if self.entries.insert(key.clone(), implementation).is_some() {
            debug!("{} registry: replaced existing entry for '{}'", self.kind, key);
        }
    }

    /// Registers one implementation under several keys.
    pub fn register_aliases(&mut self, keys: &[&str], implementation: T) {
        for key in keys {
            self.register(key, implementation.clone());
        }
    }

    pub fn resolve(&self, key: &str) -> Result<&T, Error> {
        self.entries
            .get(&key.to_lowercase())
            .ok_or_else(|| Error::unknown_key(self.kind, key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    /// Registered keys in lexical order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_registration_wins() {
        let mut reg: Registry<u32> = Registry::new("format");
        reg.register("poscar", 1);
        reg.register("POSCAR", 2);
        assert_eq!(*reg.resolve("poscar").unwrap(), 2);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unknown_key_names_the_registry() {
        let reg: Registry<u32> = Registry::new("driver");
        match reg.resolve("dp") {
            Err(Error::UnknownKey { kind, key }) => {
                assert_eq!(kind, "driver");
                assert_eq!(key, "dp");
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn aliases_share_one_value() {
        let mut reg: Registry<&str> = Registry::new("format");
        reg.register_aliases(&["sdf", "sdf_file"], "sdf");
        assert_eq!(reg.keys(), vec!["sdf", "sdf_file"]);
        assert!(reg.contains("SDF_FILE"));
    }
}
