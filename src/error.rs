//! Error type shared by the conversion engine, the built-in converters,
//! and the driver layer.
//!
//! Every failure is surfaced to the caller as it happens. Parsing a file
//! aborts on the first malformed line, and composite operations stop at
//! the first failing component.

use std::path::PathBuf;
use thiserror::Error;

use crate::io::Capability;

/// Errors produced while resolving, reading, writing, or labeling records.
#[derive(Debug, Error)]
pub enum Error {
    /// No converter or driver is registered under the requested key.
    #[error("unknown {kind} key '{key}'")]
    UnknownKey {
        /// Which registry was searched ("format" or "driver").
        kind: &'static str,
        /// The key that failed to resolve.
        key: String,
    },

    /// The resolved converter does not advertise the requested operation.
    #[error("format '{key}' does not support {capability}")]
    UnsupportedCapability {
        /// The key the converter was resolved from.
        key: String,
        /// The capability that was requested.
        capability: Capability,
    },

    /// A frame index outside `0..frame_count` was requested.
    #[error("frame index {index} is out of range for a record with {frame_count} frame(s)")]
    FrameIndexOutOfRange {
        /// The requested index, as given by the caller.
        index: i64,
        /// Number of frames in the record.
        frame_count: usize,
    },

    /// Arrays that must agree in length do not.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A structure line violates its grammar.
    #[error("malformed line '{line}' at token {position}: {details}")]
    MalformedLine {
        /// The offending line, trimmed.
        line: String,
        /// Zero-based index of the token where the problem was detected.
        position: usize,
        /// Description of the violation.
        details: String,
    },

    /// An auxiliary file referenced by a record could not be found.
    #[error("auxiliary file '{}' does not exist", .0.display())]
    MissingAuxFile(PathBuf),

    /// A driver cannot produce one of the requested labels.
    #[error("driver '{driver}' cannot compute {what}")]
    NotImplemented {
        /// Name of the driver.
        driver: String,
        /// The missing capability (energy, forces, virial, ...).
        what: String,
    },

    /// Underlying I/O failure.
    #[error("I/O operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Section-level syntax error in a structure file.
    #[error("failed to parse {format} data: {details} (at line ~{line})")]
    Parse {
        format: &'static str,
        line: usize,
        details: String,
    },

    /// An options or parameter file could not be decoded.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// The record cannot be represented in the target format.
    #[error("failed to convert record: {0}")]
    Conversion(String),
}

impl Error {
    pub fn unknown_key(kind: &'static str, key: impl Into<String>) -> Self {
        Self::UnknownKey {
            kind,
            key: key.into(),
        }
    }

    pub fn unsupported(key: impl Into<String>, capability: Capability) -> Self {
        Self::UnsupportedCapability {
            key: key.into(),
            capability,
        }
    }

    /// Creates a [`MalformedLine`](Error::MalformedLine) error.
    ///
    /// # Arguments
    ///
    /// * `line`: The offending line; surrounding whitespace is trimmed
    /// * `position`: Zero-based token index where parsing stopped
    /// * `details`: Description of the violation
    pub fn malformed(line: &str, position: usize, details: impl Into<String>) -> Self {
        Self::MalformedLine {
            line: line.trim().to_string(),
            position,
            details: details.into(),
        }
    }

    pub fn parse(format: &'static str, line: usize, details: impl Into<String>) -> Self {
        Self::Parse {
            format,
            line,
            details: details.into(),
        }
    }

    pub fn shape(details: impl Into<String>) -> Self {
        Self::ShapeMismatch(details.into())
    }

    pub fn not_implemented(driver: impl Into<String>, what: impl Into<String>) -> Self {
        Self::NotImplemented {
            driver: driver.into(),
            what: what.into(),
        }
    }
}
