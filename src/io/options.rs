use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

/// Options shared by every reader.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Species names to assign to numeric type ids, or to impose an order on
    /// the species of the record.
    pub type_map: Option<Vec<String>>,
    /// First frame to keep, for trajectory formats.
    pub begin: usize,
    /// Keep every `step`-th frame from `begin` on.
    pub step: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            type_map: None,
            begin: 0,
            step: 1,
        }
    }
}

impl ReadOptions {
    pub fn with_type_map<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.type_map = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// `true` if frame number `idx` survives the `begin`/`step` slicing.
    pub fn keeps_frame(&self, idx: usize) -> bool {
        idx >= self.begin && (idx - self.begin) % self.step.max(1) == 0
    }
}

/// How auxiliary files referenced by a dump are placed next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Reference files by the paths given.
    #[default]
    None,
    /// Copy each file into the destination directory.
    Copy,
    /// Symbolically link each file into the destination directory.
    Symlink,
}

/// Per-species data a writer needs but a record may not carry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeciesOptions {
    pub mass: Option<f64>,
    pub pseudopotential: Option<PathBuf>,
    pub orbital: Option<PathBuf>,
}

/// Options shared by every writer.
///
/// Can be loaded from TOML:
///
/// ```toml
/// descriptor = "jle.orb"
/// link = "symlink"
///
/// [species.C]
/// mass = 12.0
/// pseudopotential = "C.upf"
/// orbital = "C.orb"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DumpOptions {
    #[serde(default)]
    pub species: BTreeMap<String, SpeciesOptions>,
    pub descriptor: Option<PathBuf>,
    #[serde(default)]
    pub link: LinkMode,
}

impl DumpOptions {
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn species(&self, name: &str) -> Option<&SpeciesOptions> {
        self.species.get(name)
    }
}

/// Which frames a writer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameSelection {
    #[default]
    All,
    Index(usize),
}

impl FrameSelection {
    /// Interprets a signed index where `-1` means every frame.
    pub fn from_index(index: i64, frame_count: usize) -> Result<Self, Error> {
        if index == -1 {
            return Ok(Self::All);
        }
        match usize::try_from(index) {
            Ok(i) if i < frame_count => Ok(Self::Index(i)),
            _ => Err(Error::FrameIndexOutOfRange { index, frame_count }),
        }
    }

    /// Frame indices selected for a record with `frame_count` frames.
    pub fn indices(self, frame_count: usize) -> Result<Vec<usize>, Error> {
        match self {
            Self::All => Ok((0..frame_count).collect()),
            Self::Index(i) if i < frame_count => Ok(vec![i]),
            Self::Index(i) => Err(Error::FrameIndexOutOfRange {
                index: i as i64,
                frame_count,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_sentinel_selects_all() {
        assert_eq!(FrameSelection::from_index(-1, 3).unwrap(), FrameSelection::All);
        assert_eq!(FrameSelection::All.indices(3).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn frame_index_bounds() {
        assert_eq!(FrameSelection::from_index(2, 3).unwrap(), FrameSelection::Index(2));
        assert!(matches!(
            FrameSelection::from_index(3, 3),
            Err(Error::FrameIndexOutOfRange { index: 3, frame_count: 3 })
        ));
        assert!(matches!(
            FrameSelection::from_index(-2, 3),
            Err(Error::FrameIndexOutOfRange { index: -2, .. })
        ));
        assert!(FrameSelection::Index(5).indices(1).is_err());
    }

    #[test]
    fn read_options_slicing() {
        let opts = ReadOptions {
            begin: 1,
            step: 2,
            ..ReadOptions::default()
        };
        let kept: Vec<_> = (0..6).filter(|&i| opts.keeps_frame(i)).collect();
        assert_eq!(kept, vec![1, 3, 5]);
    }

    #[test]
    fn dump_options_from_toml() {
        let opts = DumpOptions::from_toml(
            r#"
            descriptor = "jle.orb"
            link = "symlink"

            [species.C]
            mass = 12.0
            pseudopotential = "C.upf"

            [species.H]
            mass = 1.0
            orbital = "H.orb"
            "#,
        )
        .unwrap();
        assert_eq!(opts.link, LinkMode::Symlink);
        assert_eq!(opts.descriptor.as_deref(), Some(Path::new("jle.orb")));
        assert_eq!(opts.species("C").unwrap().mass, Some(12.0));
        assert_eq!(
            opts.species("H").unwrap().orbital.as_deref(),
            Some(Path::new("H.orb"))
        );
        assert!(opts.species("O").is_none());
    }

    #[test]
    fn dump_options_reject_unknown_fields() {
        let err = DumpOptions::from_toml("linkmode = \"copy\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
