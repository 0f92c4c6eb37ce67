use std::io::Write;
use std::path::{Path, PathBuf};

use log::warn;

use super::BOHR_TO_ANGSTROM;
use super::line::{AtomLine, Component, write_atom_line};
use crate::error::Error;
use crate::io::{DumpOptions, SpeciesOptions, util};
use crate::model::extension::{Extensions, Field, Value, keys};
use crate::model::system::System;

/// Side channels this writer consumes; anything else is dropped.
const UNDERSTOOD: [&str; 12] = [
    keys::MASSES,
    keys::PP_FILES,
    keys::ORB_FILES,
    keys::DESCRIPTOR,
    keys::SPECIES_MAG,
    keys::MOVE,
    keys::VELOCITY,
    keys::MAG,
    keys::ANGLE1,
    keys::ANGLE2,
    keys::SPIN_CONSTRAINT,
    keys::LAMBDA,
];

#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesHeader {
    pub name: String,
    pub mass: f64,
    pub mag: f64,
    pub pseudopotential: Option<PathBuf>,
    pub orbital: Option<PathBuf>,
}

/// Everything written above `ATOMIC_POSITIONS` besides the cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub species: Vec<SpeciesHeader>,
    pub descriptor: Option<PathBuf>,
}

enum Source {
    Options,
    Record,
}

impl Header {
    /// Collects per-species data from `options` first and the record's side
    /// channels second, then places auxiliary files into `dir` according to
    /// `options.link`.
    pub fn resolve(system: &System, options: &DumpOptions, dir: &Path) -> Result<Self, Error> {
        let names = &system.species_names;
        let ext = &system.extensions;

        let masses = match gather(names, options, |s| s.mass, recorded(system, keys::MASSES, Value::as_scalar)) {
            Some((Source::Options, column)) => require_all(names, column, "mass")?,
            Some((Source::Record, column)) => column.into_iter().map(|m| m.unwrap_or(1.0)).collect(),
            None => vec![1.0; names.len()],
        };
        let pseudopotentials = gather(
            names,
            options,
            |s| s.pseudopotential.clone(),
            recorded(system, keys::PP_FILES, |v| v.as_file().cloned()),
        )
        .map(|(_, column)| require_all(names, column, "pseudopotential"))
        .transpose()?;
        let orbitals = gather(
            names,
            options,
            |s| s.orbital.clone(),
            recorded(system, keys::ORB_FILES, |v| v.as_file().cloned()),
        )
        .map(|(_, column)| require_all(names, column, "numerical orbital"))
        .transpose()?;
        let mags = recorded(system, keys::SPECIES_MAG, Value::as_scalar);

        let descriptor = options
            .descriptor
            .clone()
            .or_else(|| ext.global(keys::DESCRIPTOR).and_then(Value::as_file).cloned());

        let place = |p: PathBuf| util::place_aux_file(&p, dir, options.link);

        let mut species = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            species.push(SpeciesHeader {
                name: name.clone(),
                mass: masses[i],
                mag: mags.as_ref().and_then(|m| m[i]).unwrap_or(0.0),
                pseudopotential: pseudopotentials
                    .as_ref()
                    .map(|files| place(files[i].clone()))
                    .transpose()?,
                orbital: orbitals
                    .as_ref()
                    .map(|files| place(files[i].clone()))
                    .transpose()?,
            });
        }
        let descriptor = descriptor.map(place).transpose()?;

        for name in ext.names().filter(|n| !UNDERSTOOD.contains(n)) {
            warn!("STRU: side channel '{name}' is not written");
        }

        Ok(Self {
            species,
            descriptor,
        })
    }
}

fn recorded<T>(
    system: &System,
    key: &str,
    pick: impl Fn(&Value) -> Option<T>,
) -> Option<Vec<Option<T>>> {
    match system.extensions.get(key)? {
        Field::PerSpecies(values) => Some(
            values
                .iter()
                .map(|v| v.as_ref().and_then(&pick))
                .collect(),
        ),
        _ => None,
    }
}

/// The options column if any species sets the value there, otherwise the
/// record's own column.
fn gather<T>(
    names: &[String],
    options: &DumpOptions,
    pick: impl Fn(&SpeciesOptions) -> Option<T>,
    recorded: Option<Vec<Option<T>>>,
) -> Option<(Source, Vec<Option<T>>)> {
    let from_options: Vec<Option<T>> = names
        .iter()
        .map(|n| options.species(n).and_then(&pick))
        .collect();
    if from_options.iter().any(Option::is_some) {
        return Some((Source::Options, from_options));
    }
    recorded
        .filter(|c| c.iter().any(Option::is_some))
        .map(|c| (Source::Record, c))
}

fn require_all<T>(names: &[String], column: Vec<Option<T>>, what: &str) -> Result<Vec<T>, Error> {
    column
        .into_iter()
        .zip(names)
        .map(|(v, name)| {
            v.ok_or_else(|| Error::Conversion(format!("no {what} given for species '{name}'")))
        })
        .collect()
}

fn format_mag(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn atom_line(system: &System, frame: usize, atom: usize) -> Result<AtomLine, Error> {
    let position = system
        .coordinates
        .get(frame)
        .and_then(|coords| coords.get(atom))
        .ok_or_else(|| Error::Conversion(format!("frame {frame} has no coordinates for atom {atom}")))?;

    let value = |key: &str| atom_value(&system.extensions, key, atom);

    Ok(AtomLine {
        position: *position,
        move_flags: value(keys::MOVE)?.and_then(Value::as_flags),
        velocity: value(keys::VELOCITY)?.and_then(|v| match v {
            Value::Vector(v) => Some(*v),
            _ => None,
        }),
        mag: value(keys::MAG)?.and_then(Component::<f64>::from_value),
        angle1: value(keys::ANGLE1)?.and_then(Value::as_scalar),
        angle2: value(keys::ANGLE2)?.and_then(Value::as_scalar),
        spin_constraint: value(keys::SPIN_CONSTRAINT)?.and_then(Component::<bool>::from_value),
        lambda: value(keys::LAMBDA)?.and_then(Component::<f64>::from_value),
    })
}

fn atom_value<'a>(ext: &'a Extensions, key: &str, atom: usize) -> Result<Option<&'a Value>, Error> {
    match ext.per_atom(key) {
        Some(column) => column.get(atom).map(Option::as_ref).ok_or_else(|| {
            Error::Conversion(format!(
                "side channel '{key}' has {} entries, atom {atom} has none",
                column.len()
            ))
        }),
        None => Ok(None),
    }
}

/// Writes frame `frame` of `system` as a STRU file.
pub fn write<W: Write>(
    mut writer: W,
    system: &System,
    frame: usize,
    header: &Header,
) -> Result<(), Error> {
    let cell = system
        .cell(frame)
        .ok_or_else(|| Error::Conversion("a STRU file requires a periodic record".into()))?;

    writeln!(writer, "ATOMIC_SPECIES")?;
    for s in &header.species {
        match &s.pseudopotential {
            Some(pp) => writeln!(writer, "{} {:.3} {}", s.name, s.mass, pp.display())?,
            None => writeln!(writer, "{} {:.3}", s.name, s.mass)?,
        }
    }

    let orbitals: Vec<_> = header.species.iter().filter_map(|s| s.orbital.as_ref()).collect();
    if !orbitals.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "NUMERICAL_ORBITAL")?;
        for orb in orbitals {
            writeln!(writer, "{}", orb.display())?;
        }
    }

    if let Some(descriptor) = &header.descriptor {
        writeln!(writer)?;
        writeln!(writer, "NUMERICAL_DESCRIPTOR")?;
        writeln!(writer, "{}", descriptor.display())?;
    }

    writeln!(writer)?;
    writeln!(writer, "LATTICE_CONSTANT")?;
    writeln!(writer, "{}", 1.0 / BOHR_TO_ANGSTROM)?;

    writeln!(writer)?;
    writeln!(writer, "LATTICE_VECTORS")?;
    for row in cell {
        writeln!(writer, "{:.12} {:.12} {:.12}", row[0], row[1], row[2])?;
    }

    writeln!(writer)?;
    writeln!(writer, "ATOMIC_POSITIONS")?;
    writeln!(writer, "Cartesian")?;
    writeln!(writer)?;
    for (idx, s) in header.species.iter().enumerate() {
        let atoms: Vec<usize> = system
            .atom_species_index
            .iter()
            .enumerate()
            .filter(|&(_, &t)| t == idx)
            .map(|(a, _)| a)
            .collect();
        if atoms.is_empty() {
            continue;
        }
        writeln!(writer, "{}", s.name)?;
        writeln!(writer, "{}", format_mag(s.mag))?;
        writeln!(writer, "{}", atoms.len())?;
        for a in atoms {
            writeln!(writer, "{}", write_atom_line(&atom_line(system, frame, a)?))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oh() -> System {
        let mut s = System::with_species(vec!["O".into(), "H".into()], vec![0, 1]);
        s.push_frame(
            vec![[0.0, 0.0, 0.0], [1.262185604418, 0.701802783513, 0.551388341420]],
            Some([[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]]),
        )
        .unwrap();
        s
    }

    fn render(system: &System, options: &DumpOptions) -> String {
        let header = Header::resolve(system, options, Path::new(".")).unwrap();
        let mut buf = Vec::new();
        write(&mut buf, system, 0, &header).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn short_side_channel_column_is_a_conversion_error() {
        let mut system = oh();
        system.extensions.insert(
            keys::MAG,
            Field::PerAtom(vec![Some(Value::Scalar(1.0))]),
        );
        let header = Header::resolve(&system, &DumpOptions::default(), Path::new(".")).unwrap();
        let mut buf = Vec::new();
        assert!(matches!(
            write(&mut buf, &system, 0, &header),
            Err(Error::Conversion(_))
        ));
        assert!(matches!(
            write(&mut buf, &oh(), 3, &header),
            Err(Error::Conversion(_))
        ));
    }

    #[test]
    fn writes_move_flags_per_atom() {
        let mut system = oh();
        system.extensions.insert(
            keys::MOVE,
            Field::PerAtom(vec![
                Some(Value::Flags([true, false, true])),
                Some(Value::Flags([false, true, false])),
            ]),
        );
        let text = render(&system, &DumpOptions::default());
        assert!(text.contains(
            "O\n0.0\n1\n0.000000000000 0.000000000000 0.000000000000 1 0 1\n\
             H\n0.0\n1\n1.262185604418 0.701802783513 0.551388341420 0 1 0\n"
        ));
    }

    #[test]
    fn options_take_precedence_over_recorded_masses() {
        let mut system = oh();
        system.extensions.insert(
            keys::MASSES,
            Field::PerSpecies(vec![Some(Value::Scalar(16.0)), Some(Value::Scalar(1.008))]),
        );
        let text = render(&system, &DumpOptions::default());
        assert!(text.contains("O 16.000\nH 1.008\n"));

        let options = DumpOptions::from_toml("[species.O]\nmass = 15.0\n[species.H]\nmass = 2.0").unwrap();
        let text = render(&system, &options);
        assert!(text.contains("O 15.000\nH 2.000\n"));
    }

    #[test]
    fn partial_mass_options_are_rejected() {
        let options = DumpOptions::from_toml("[species.O]\nmass = 15.0").unwrap();
        let err = Header::resolve(&oh(), &options, Path::new(".")).unwrap_err();
        assert!(matches!(err, Error::Conversion(ref m) if m.contains("'H'")));
    }

    #[test]
    fn species_without_atoms_keep_their_declaration_only() {
        let mut system = oh();
        system
            .apply_type_map(&["O".into(), "H".into(), "C".into()])
            .unwrap();
        let text = render(&system, &DumpOptions::default());
        assert!(text.contains("C 1.000\n"));
        assert!(!text.contains("\nC\n0.0"));
    }

    #[test]
    fn species_magnetism_goes_into_block_header() {
        let mut system = oh();
        system.extensions.insert(
            keys::SPECIES_MAG,
            Field::PerSpecies(vec![Some(Value::Scalar(0.5)), Some(Value::Scalar(2.0))]),
        );
        let text = render(&system, &DumpOptions::default());
        assert!(text.contains("O\n0.5\n1\n"));
        assert!(text.contains("H\n2.0\n1\n"));
    }
}
