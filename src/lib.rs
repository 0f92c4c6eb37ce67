//! A pure Rust library for converting atomistic structure data between the
//! file formats of simulation codes. Every format is read into, and written
//! from, one uniform in-memory record, so a caller can load a trajectory from
//! one code and hand it to another without knowing either syntax.
//!
//! # Features
//!
//! - **Uniform records**: [`System`] holds species, cells and coordinates
//!   for any number of frames; [`LabeledSystem`] adds energies, forces and
//!   virials; [`BondOrderSystem`] adds a bond graph and formal charges
//! - **Pluggable formats**: converters advertise what they can read and
//!   write, and are looked up by key in a [`FormatRegistry`]
//! - **ABACUS STRU**: full per-atom line grammar with move flags,
//!   velocities, magnetic moments, spin constraints and multipliers
//! - **More dialects**: deepmd/raw directories, MDL molfiles and SD files,
//!   LAMMPS dump trajectories
//! - **Drivers**: label records through a [`Driver`], combine several with
//!   [`HybridDriver`], and relax geometries with the generic [`Minimizer`]
//!
//! # Quick Start
//!
//! ```
//! use atomdata::{DumpOptions, Engine, FrameSelection, ReadOptions, System};
//!
//! let mut water = System::with_species(vec!["O".into(), "H".into()], vec![0, 1, 1]);
//! water.push_frame(
//!     vec![[0.0, 0.0, 0.0], [0.96, 0.0, 0.0], [-0.24, 0.93, 0.0]],
//!     Some([[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]]),
//! )?;
//!
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("STRU");
//!
//! let engine = Engine::builtin();
//! engine.dump(&water, &path, "abacus/stru", FrameSelection::All, &DumpOptions::default())?;
//! let back = engine.load(&path, "stru", &ReadOptions::default())?;
//!
//! assert_eq!(back.species_names, vec!["O", "H"]);
//! assert_eq!(back.species_counts, vec![1, 2]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Module Organization
//!
//! - [`model`]: The three record kinds and their side-channel fields
//! - [`io`]: Capability traits, the format registry, the conversion
//!   [`Engine`] and the built-in converters
//! - [`driver`]: Labeling drivers, the driver registry and the minimizer
//! - [`error`]: The shared [`Error`] type

pub mod driver;
pub mod error;
pub mod io;
pub mod model;

pub use error::Error;

pub use model::bond_order::{Bond, BondOrderSystem};
pub use model::extension::{Extensions, Field, Value};
pub use model::labeled::LabeledSystem;
pub use model::record::Record;
pub use model::system::System;
pub use model::types::{BondOrder, Mat3, ParseBondOrderError, Vec3};

pub use io::{
    Capability, CapabilitySet, Converter, DumpOptions, Engine, FormatRegistry, FrameSelection,
    LinkMode, PostProcess, ReadOptions, SpeciesOptions,
};

pub use driver::{Driver, DriverRegistry, HarmonicDriver, HybridDriver, Minimizer};
