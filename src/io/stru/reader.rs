use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;

use super::line::{AtomLine, parse_atom_line};
use super::{BOHR_TO_ANGSTROM, FORMAT};
use crate::error::Error;
use crate::io::util;
use crate::model::extension::{Field, Value, keys};
use crate::model::system::System;
use crate::model::types::{Mat3, Vec3, vec_mat};

const SECTIONS: [&str; 9] = [
    "ATOMIC_SPECIES",
    "NUMERICAL_ORBITAL",
    "NUMERICAL_DESCRIPTOR",
    "ABFS_ORBITAL",
    "PAW_FILES",
    "LATTICE_CONSTANT",
    "LATTICE_VECTORS",
    "LATTICE_PARAMETERS",
    "ATOMIC_POSITIONS",
];

type Lines = Vec<(usize, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoordinateMode {
    /// Cartesian, in units of the lattice constant.
    Cartesian,
    CartesianAngstrom,
    CartesianBohr,
    Direct,
}

impl CoordinateMode {
    fn parse(token: &str, line_no: usize) -> Result<Self, Error> {
        match token.to_lowercase().as_str() {
            "cartesian" => Ok(Self::Cartesian),
            "cartesian_angstrom" => Ok(Self::CartesianAngstrom),
            "cartesian_au" => Ok(Self::CartesianBohr),
            "direct" => Ok(Self::Direct),
            _ => Err(Error::parse(
                FORMAT,
                line_no,
                format!("unsupported coordinate mode '{token}'"),
            )),
        }
    }

    fn to_angstrom(self, pos: Vec3, lattice_constant: f64, cell: &Mat3) -> Vec3 {
        let scale = |f: f64| [pos[0] * f, pos[1] * f, pos[2] * f];
        match self {
            Self::Cartesian => scale(lattice_constant * BOHR_TO_ANGSTROM),
            Self::CartesianAngstrom => pos,
            Self::CartesianBohr => scale(BOHR_TO_ANGSTROM),
            Self::Direct => vec_mat(&pos, cell),
        }
    }
}

struct SpeciesLine {
    name: String,
    mass: f64,
    pseudopotential: Option<PathBuf>,
}

/// Reads one STRU file into a single-frame periodic record.
pub fn read<R: BufRead>(reader: R) -> Result<System, Error> {
    let sections = split_sections(reader)?;

    let species_lines = section(&sections, "ATOMIC_SPECIES")?;
    let species = parse_species(species_lines)?;
    let names: Vec<String> = species.iter().map(|s| s.name.clone()).collect();

    let lattice_constant = {
        let lines = section(&sections, "LATTICE_CONSTANT")?;
        let [value] = first_line(lines, "LATTICE_CONSTANT")
            .and_then(|(no, text)| util::parse_floats::<1>(text, FORMAT, no))?;
        value
    };
    let cell = parse_cell(&sections, lattice_constant)?;

    let positions = section(&sections, "ATOMIC_POSITIONS")?;
    let (mode_line, mode_text) = first_line(positions, "ATOMIC_POSITIONS")?;
    let mode = CoordinateMode::parse(mode_text.trim(), mode_line)?;

    let mut atom_species = Vec::new();
    let mut atoms: Vec<AtomLine> = Vec::new();
    let mut species_mag: Vec<Option<Value>> = vec![None; names.len()];
    let mut rest = positions[1..].iter();
    while let Some((label_no, label)) = rest.next() {
        let label = label.trim();
        let idx = names.iter().position(|n| n == label).ok_or_else(|| {
            Error::parse(
                FORMAT,
                *label_no,
                format!("species '{label}' is not declared in ATOMIC_SPECIES"),
            )
        })?;
        if species_mag[idx].is_some() {
            return Err(Error::parse(
                FORMAT,
                *label_no,
                format!("species '{label}' has two position blocks"),
            ));
        }

        let (mag_no, mag_text) = rest.next().ok_or_else(|| truncated(*label_no, label))?;
        let [mag] = util::parse_floats::<1>(mag_text, FORMAT, *mag_no)?;
        species_mag[idx] = Some(Value::Scalar(mag));

        let (count_no, count_text) = rest.next().ok_or_else(|| truncated(*mag_no, label))?;
        let count: usize = count_text.trim().parse().map_err(|_| {
            Error::parse(
                FORMAT,
                *count_no,
                format!("invalid atom count '{}'", count_text.trim()),
            )
        })?;

        for _ in 0..count {
            let (_, text) = rest.next().ok_or_else(|| truncated(*count_no, label))?;
            atoms.push(parse_atom_line(text)?);
            atom_species.push(idx);
        }
    }

    let coordinates: Vec<Vec3> = atoms
        .iter()
        .map(|a| mode.to_angstrom(a.position, lattice_constant, &cell))
        .collect();

    let mut system = System::with_species(names, atom_species);
    system.push_frame(coordinates, Some(cell))?;
    store_species_fields(&mut system, &species, &sections)?;
    system
        .extensions
        .insert(keys::SPECIES_MAG, Field::PerSpecies(species_mag));
    store_atom_fields(&mut system, &atoms);
    Ok(system)
}

fn split_sections<R: BufRead>(reader: R) -> Result<HashMap<&'static str, Lines>, Error> {
    let mut sections: HashMap<&'static str, Lines> = HashMap::new();
    let mut current: Option<&'static str> = None;

    for (no, raw) in util::collect_lines(reader)? {
        let content = util::strip_comment(&raw).trim();
        if content.is_empty() {
            continue;
        }
        let head = content.split_whitespace().next().unwrap_or_default();
        if let Some(name) = SECTIONS.iter().copied().find(|s| *s == head) {
            if sections.contains_key(name) {
                return Err(Error::parse(FORMAT, no, format!("section {name} appears twice")));
            }
            sections.insert(name, Vec::new());
            current = Some(name);
            continue;
        }
        match current.and_then(|name| sections.get_mut(name)) {
            Some(lines) => lines.push((no, content.to_string())),
            None => {
                return Err(Error::parse(
                    FORMAT,
                    no,
                    format!("'{content}' appears before any section header"),
                ));
            }
        }
    }
    Ok(sections)
}

fn section<'a>(sections: &'a HashMap<&'static str, Lines>, name: &str) -> Result<&'a Lines, Error> {
    sections
        .get(name)
        .ok_or_else(|| Error::parse(FORMAT, 0, format!("missing {name} section")))
}

fn first_line<'a>(lines: &'a Lines, name: &str) -> Result<(usize, &'a str), Error> {
    lines
        .first()
        .map(|(no, text)| (*no, text.as_str()))
        .ok_or_else(|| Error::parse(FORMAT, 0, format!("section {name} is empty")))
}

fn truncated(line_no: usize, label: &str) -> Error {
    Error::parse(
        FORMAT,
        line_no,
        format!("position block of species '{label}' ends early"),
    )
}

fn parse_species(lines: &Lines) -> Result<Vec<SpeciesLine>, Error> {
    let mut species: Vec<SpeciesLine> = Vec::with_capacity(lines.len());
    for (no, text) in lines {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(Error::parse(
                FORMAT,
                *no,
                "species line needs a label and a mass",
            ));
        }
        if species.iter().any(|s| s.name == tokens[0]) {
            return Err(Error::parse(
                FORMAT,
                *no,
                format!("species '{}' declared twice", tokens[0]),
            ));
        }
        let mass = tokens[1]
            .parse()
            .map_err(|_| Error::parse(FORMAT, *no, format!("invalid mass '{}'", tokens[1])))?;
        species.push(SpeciesLine {
            name: tokens[0].to_string(),
            mass,
            pseudopotential: tokens.get(2).map(PathBuf::from),
        });
    }
    if species.is_empty() {
        return Err(Error::parse(FORMAT, 0, "ATOMIC_SPECIES declares no species"));
    }
    Ok(species)
}

fn parse_cell(sections: &HashMap<&'static str, Lines>, lattice_constant: f64) -> Result<Mat3, Error> {
    let Some(lines) = sections.get("LATTICE_VECTORS") else {
        let line = sections
            .get("LATTICE_PARAMETERS")
            .and_then(|l| l.first())
            .map_or(0, |(no, _)| *no);
        return Err(Error::parse(
            FORMAT,
            line,
            "LATTICE_VECTORS is required; lattice parameters are not supported",
        ));
    };
    if lines.len() < 3 {
        return Err(Error::parse(
            FORMAT,
            lines.last().map_or(0, |(no, _)| *no),
            "LATTICE_VECTORS needs three rows",
        ));
    }
    let scale = lattice_constant * BOHR_TO_ANGSTROM;
    let mut cell = [[0.0; 3]; 3];
    for (row, (no, text)) in cell.iter_mut().zip(lines) {
        let v = util::parse_floats::<3>(text, FORMAT, *no)?;
        *row = [v[0] * scale, v[1] * scale, v[2] * scale];
    }
    Ok(cell)
}

fn store_species_fields(
    system: &mut System,
    species: &[SpeciesLine],
    sections: &HashMap<&'static str, Lines>,
) -> Result<(), Error> {
    let masses = species.iter().map(|s| Some(Value::Scalar(s.mass))).collect();
    system.extensions.insert(keys::MASSES, Field::PerSpecies(masses));

    if species.iter().any(|s| s.pseudopotential.is_some()) {
        let files = species
            .iter()
            .map(|s| s.pseudopotential.clone().map(Value::File))
            .collect();
        system.extensions.insert(keys::PP_FILES, Field::PerSpecies(files));
    }

    if let Some(lines) = sections.get("NUMERICAL_ORBITAL") {
        if lines.len() != species.len() {
            return Err(Error::parse(
                FORMAT,
                lines.first().map_or(0, |(no, _)| *no),
                format!(
                    "{} orbital files for {} species",
                    lines.len(),
                    species.len()
                ),
            ));
        }
        let files = lines
            .iter()
            .map(|(_, text)| Some(Value::File(PathBuf::from(text.trim()))))
            .collect();
        system.extensions.insert(keys::ORB_FILES, Field::PerSpecies(files));
    }

    if let Some((_, text)) = sections.get("NUMERICAL_DESCRIPTOR").and_then(|l| l.first()) {
        system.extensions.insert(
            keys::DESCRIPTOR,
            Field::Global(Value::File(PathBuf::from(text.trim()))),
        );
    }
    Ok(())
}

fn store_atom_fields(system: &mut System, atoms: &[AtomLine]) {
    let ext = &mut system.extensions;
    ext.insert_per_atom(
        keys::MOVE,
        atoms.iter().map(|a| a.move_flags.map(Value::Flags)).collect(),
    );
    ext.insert_per_atom(
        keys::VELOCITY,
        atoms.iter().map(|a| a.velocity.map(Value::Vector)).collect(),
    );
    ext.insert_per_atom(
        keys::MAG,
        atoms.iter().map(|a| a.mag.map(Value::from)).collect(),
    );
    ext.insert_per_atom(
        keys::ANGLE1,
        atoms.iter().map(|a| a.angle1.map(Value::Scalar)).collect(),
    );
    ext.insert_per_atom(
        keys::ANGLE2,
        atoms.iter().map(|a| a.angle2.map(Value::Scalar)).collect(),
    );
    ext.insert_per_atom(
        keys::SPIN_CONSTRAINT,
        atoms.iter().map(|a| a.spin_constraint.map(Value::from)).collect(),
    );
    ext.insert_per_atom(
        keys::LAMBDA,
        atoms.iter().map(|a| a.lambda.map(Value::from)).collect(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SPIN_STRU: &str = "\
ATOMIC_SPECIES
Fe 55.845 Fe.upf upf201   # iron

NUMERICAL_ORBITAL
Fe.orb

LATTICE_CONSTANT
1.8897261254578281

LATTICE_VECTORS
2.0 0.0 0.0
0.0 2.0 0.0
0.0 0.0 2.0

ATOMIC_POSITIONS
Direct

Fe
1.5
2
0.0 0.0 0.0 1 1 1 mag 2.0 sc 1
0.5 0.5 0.5 0 0 0 mag 1.0 1.0 0.0 angle1 90 lambda 0.1 0.2 0.3
";

    #[test]
    fn reads_direct_coordinates_and_spin_attributes() {
        let system = read(Cursor::new(SPIN_STRU)).unwrap();
        assert_eq!(system.species_names, vec!["Fe"]);
        assert_eq!(system.species_counts, vec![2]);

        let cell = system.cell(0).unwrap();
        assert!((cell[0][0] - 2.0).abs() < 1e-6);
        let p = system.coordinates[0][1];
        assert!((p[0] - 1.0).abs() < 1e-6 && (p[2] - 1.0).abs() < 1e-6);

        let ext = &system.extensions;
        assert_eq!(
            ext.per_atom(keys::MAG).unwrap(),
            &[Some(Value::Scalar(2.0)), Some(Value::Vector([1.0, 1.0, 0.0]))]
        );
        assert_eq!(
            ext.per_atom(keys::SPIN_CONSTRAINT).unwrap(),
            &[Some(Value::Flag(true)), None]
        );
        assert_eq!(
            ext.per_atom(keys::ANGLE1).unwrap(),
            &[None, Some(Value::Scalar(90.0))]
        );
        assert!(!ext.contains(keys::VELOCITY));
        assert_eq!(
            ext.per_species(keys::SPECIES_MAG).unwrap(),
            &[Some(Value::Scalar(1.5))]
        );
        assert_eq!(
            ext.per_species(keys::PP_FILES).unwrap(),
            &[Some(Value::File("Fe.upf".into()))]
        );
        assert_eq!(
            ext.per_species(keys::ORB_FILES).unwrap(),
            &[Some(Value::File("Fe.orb".into()))]
        );
    }

    #[test]
    fn cartesian_positions_scale_with_lattice_constant() {
        let text = "\
ATOMIC_SPECIES
H 1.0
LATTICE_CONSTANT
2.0
LATTICE_VECTORS
5 0 0
0 5 0
0 0 5
ATOMIC_POSITIONS
Cartesian
H
0.0
1
1.0 0.0 0.0
";
        let system = read(Cursor::new(text)).unwrap();
        let expected = 2.0 * BOHR_TO_ANGSTROM;
        assert!((system.coordinates[0][0][0] - expected).abs() < 1e-12);
        assert!((system.cell(0).unwrap()[1][1] - 5.0 * expected).abs() < 1e-12);
    }

    #[test]
    fn malformed_atom_line_aborts_the_file() {
        let text = SPIN_STRU.replace("sc 1\n", "sc 1 2\n");
        let err = read(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, Error::MalformedLine { .. }));
    }

    #[test]
    fn undeclared_species_block_is_rejected() {
        let text = SPIN_STRU.replace("\nFe\n1.5", "\nCo\n1.5");
        assert!(matches!(
            read(Cursor::new(text)),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn short_block_is_rejected() {
        let text = SPIN_STRU.replace("\n2\n", "\n3\n");
        assert!(matches!(read(Cursor::new(text)), Err(Error::Parse { .. })));
    }

    #[test]
    fn lattice_vectors_are_required() {
        let text = "ATOMIC_SPECIES\nH 1.0\nLATTICE_CONSTANT\n1.0\nATOMIC_POSITIONS\nCartesian\n";
        assert!(matches!(read(Cursor::new(text)), Err(Error::Parse { .. })));
    }
}
