//! ABACUS `STRU` structure files.
//!
//! A STRU file holds one periodic frame. The reader accepts the
//! `Cartesian`, `Cartesian_angstrom`, `Cartesian_au` and `Direct`
//! coordinate modes; the writer always emits `Cartesian` with a lattice
//! constant of one ångström expressed in bohr, so vectors and positions
//! are written in ångström.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::debug;

use super::{Converter, DumpOptions, FrameSelection, ReadOptions, ReadPlain, WritePlain};
use crate::error::Error;
use crate::model::system::System;

pub mod line;
pub mod reader;
pub mod writer;

pub use line::{AtomLine, Component, parse_atom_line, write_atom_line};

/// Bohr radius in ångström.
pub const BOHR_TO_ANGSTROM: f64 = 0.529177210903;

pub(crate) const FORMAT: &str = "STRU";

/// Converter for the `stru` / `abacus/stru` keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct StruFormat;

impl Converter for StruFormat {
    fn name(&self) -> &str {
        "ABACUS STRU"
    }

    fn plain_reader(&self) -> Option<&dyn ReadPlain> {
        Some(self)
    }

    fn plain_writer(&self) -> Option<&dyn WritePlain> {
        Some(self)
    }
}

impl ReadPlain for StruFormat {
    fn read_plain(&self, source: &Path, options: &ReadOptions) -> Result<System, Error> {
        let file = File::open(source)?;
        let mut system = reader::read(BufReader::new(file))?;
        if let Some(type_map) = &options.type_map {
            system.apply_type_map(type_map)?;
        }
        debug!(
            "STRU: read {} atoms of {} species from {}",
            system.atom_count(),
            system.species_count(),
            source.display()
        );
        Ok(system)
    }
}

impl WritePlain for StruFormat {
    fn write_plain(
        &self,
        system: &System,
        destination: &Path,
        frame: FrameSelection,
        options: &DumpOptions,
    ) -> Result<(), Error> {
        let frame = match frame {
            FrameSelection::Index(i) => i,
            FrameSelection::All if system.frame_count() == 1 => 0,
            FrameSelection::All => {
                return Err(Error::Conversion(format!(
                    "a STRU file holds one frame but the record has {}; select a frame index",
                    system.frame_count()
                )));
            }
        };
        if !system.is_periodic() {
            return Err(Error::Conversion(
                "a STRU file requires a periodic record".into(),
            ));
        }

        let dir = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let header = writer::Header::resolve(system, options, dir)?;
        let mut out = BufWriter::new(File::create(destination)?);
        writer::write(&mut out, system, frame, &header)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::LinkMode;
    use crate::model::extension::{Field, Value, keys};

    fn methane() -> System {
        let mut s = System::with_species(vec!["C".into(), "H".into()], vec![0, 1, 1, 1, 1]);
        s.push_frame(
            vec![
                [5.192682633809, 4.557725978258, 4.436846615358],
                [5.416431453540, 4.011298860305, 3.511161492417],
                [4.131588222365, 4.706745191323, 4.431136645083],
                [5.630930319126, 5.521640894956, 4.450356541303],
                [5.499851012568, 4.003388899277, 5.342621842622],
            ],
            Some([[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]]),
        )
        .unwrap();
        s
    }

    fn species_options(toml: &str) -> DumpOptions {
        DumpOptions::from_toml(toml).unwrap()
    }

    #[test]
    fn dump_then_read_keeps_geometry_and_side_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("STRU");
        let mut system = methane();
        system.extensions.insert(
            keys::MOVE,
            Field::PerAtom(vec![
                Some(Value::Flags([true, true, true])),
                Some(Value::Flags([true, true, true])),
                Some(Value::Flags([true, true, true])),
                Some(Value::Flags([false, false, false])),
                Some(Value::Flags([false, false, false])),
            ]),
        );
        let options = species_options(
            r#"
            descriptor = "jle.orb"
            [species.C]
            mass = 12.0
            pseudopotential = "C.upf"
            orbital = "C.orb"
            [species.H]
            mass = 1.0
            pseudopotential = "H.upf"
            orbital = "H.orb"
            "#,
        );

        StruFormat
            .write_plain(&system, &path, FrameSelection::All, &options)
            .unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("ATOMIC_SPECIES\nC 12.000 C.upf\nH 1.000 H.upf"));
        assert!(text.contains("NUMERICAL_ORBITAL\nC.orb\nH.orb"));
        assert!(text.contains("NUMERICAL_DESCRIPTOR\njle.orb"));
        assert!(text.contains(
            "H\n0.0\n4\n5.416431453540 4.011298860305 3.511161492417 1 1 1\n"
        ));

        let back = StruFormat.read_plain(&path, &ReadOptions::default()).unwrap();
        assert_eq!(back.species_names, system.species_names);
        assert_eq!(back.atom_species_index, system.atom_species_index);
        for (a, b) in back.coordinates[0].iter().zip(&system.coordinates[0]) {
            for k in 0..3 {
                assert!((a[k] - b[k]).abs() < 1e-9);
            }
        }
        assert_eq!(
            back.extensions.per_atom(keys::MOVE),
            system.extensions.per_atom(keys::MOVE)
        );
        assert_eq!(
            back.extensions.global(keys::DESCRIPTOR),
            Some(&Value::File("jle.orb".into()))
        );
    }

    #[test]
    fn partial_pseudopotential_map_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("STRU");
        let options = species_options(
            r#"
            [species.C]
            pseudopotential = "C.upf"
            [species.O]
            pseudopotential = "O.upf"
            "#,
        );
        let err = StruFormat
            .write_plain(&methane(), &path, FrameSelection::All, &options)
            .unwrap_err();
        assert!(matches!(err, Error::Conversion(ref m) if m.contains("'H'")), "{err}");
        assert!(!path.exists());
    }

    #[test]
    fn multi_frame_record_needs_a_frame_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut system = methane();
        let coords = system.coordinates[0].clone();
        system
            .push_frame(coords, Some([[11.0, 0.0, 0.0], [0.0, 11.0, 0.0], [0.0, 0.0, 11.0]]))
            .unwrap();
        let path = dir.path().join("STRU");

        let err = StruFormat
            .write_plain(&system, &path, FrameSelection::All, &DumpOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));

        StruFormat
            .write_plain(&system, &path, FrameSelection::Index(1), &DumpOptions::default())
            .unwrap();
        let back = StruFormat.read_plain(&path, &ReadOptions::default()).unwrap();
        assert!((back.cell(0).unwrap()[0][0] - 11.0).abs() < 1e-9);
    }

    #[cfg(unix)]
    #[test]
    fn link_mode_symlinks_aux_files_and_references_basenames() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for name in ["C.upf", "H.upf", "jle.orb"] {
            fs::write(src.path().join(name), "data").unwrap();
        }
        let mut options = DumpOptions {
            descriptor: Some(src.path().join("jle.orb")),
            link: LinkMode::Symlink,
            ..DumpOptions::default()
        };
        for name in ["C", "H"] {
            options.species.insert(
                name.into(),
                crate::io::SpeciesOptions {
                    pseudopotential: Some(src.path().join(format!("{name}.upf"))),
                    ..Default::default()
                },
            );
        }
        let path = out.path().join("STRU");

        // Twice, so the second pass has to replace the existing links.
        for _ in 0..2 {
            StruFormat
                .write_plain(&methane(), &path, FrameSelection::All, &options)
                .unwrap();
        }

        for name in ["C.upf", "H.upf", "jle.orb"] {
            let meta = fs::symlink_metadata(out.path().join(name)).unwrap();
            assert!(meta.file_type().is_symlink(), "{name}");
        }
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("C 1.000 C.upf"));
        assert!(text.contains("NUMERICAL_DESCRIPTOR\njle.orb"));
    }

    #[test]
    fn missing_aux_file_is_reported() {
        let out = tempfile::tempdir().unwrap();
        let options = DumpOptions {
            descriptor: Some(out.path().join("absent.orb")),
            link: LinkMode::Copy,
            ..DumpOptions::default()
        };
        let err = StruFormat
            .write_plain(&methane(), &out.path().join("STRU"), FrameSelection::All, &options)
            .unwrap_err();
        assert!(matches!(err, Error::MissingAuxFile(_)));
    }
}
