use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;

use super::{BOX, COORD, ENERGY, FORCE, FORMAT, NOPBC, TYPE, TYPE_MAP, VIRIAL};
use crate::error::Error;
use crate::io::{ReadOptions, util};
use crate::model::labeled::LabeledSystem;
use crate::model::system::System;
use crate::model::types::{Mat3, Vec3};

/// Reads the structure arrays. Also returns the indices of the frames that
/// were kept so label files can be sliced the same way.
pub(super) fn read_system(dir: &Path, options: &ReadOptions) -> Result<(System, Vec<usize>), Error> {
    let types: Vec<usize> = read_rows(&dir.join(TYPE), Some(1))?
        .into_iter()
        .enumerate()
        .map(|(atom, row)| {
            let t = row[0];
            if t < 0.0 || t.fract() != 0.0 {
                return Err(Error::parse(FORMAT, atom + 1, format!("invalid atom type {t}")));
            }
            Ok(t as usize)
        })
        .collect::<Result<_, _>>()?;
    let n_atoms = types.len();
    let n_types = types.iter().max().map_or(0, |m| m + 1);

    let type_map_path = dir.join(TYPE_MAP);
    let recorded_names = if type_map_path.exists() {
        Some(read_words(&type_map_path)?)
    } else {
        None
    };

    let names = match (&recorded_names, &options.type_map) {
        (Some(names), _) => names.clone(),
        (None, Some(map)) => map.clone(),
        (None, None) => (0..n_types).map(|i| format!("Type_{i}")).collect(),
    };
    if names.len() < n_types {
        return Err(Error::Conversion(format!(
            "atom type {} has no species name ({} names given)",
            n_types - 1,
            names.len()
        )));
    }

    let coords = read_rows(&dir.join(COORD), Some(3 * n_atoms))?;
    let periodic = !dir.join(NOPBC).exists();
    let boxes = if periodic {
        let rows = read_rows(&dir.join(BOX), Some(9))?;
        if rows.len() != coords.len() {
            return Err(Error::shape(format!(
                "{} boxes for {} coordinate frames",
                rows.len(),
                coords.len()
            )));
        }
        Some(rows)
    } else {
        None
    };

    let kept: Vec<usize> = (0..coords.len()).filter(|&f| options.keeps_frame(f)).collect();
    let mut system = System::with_species(names, types);
    for &f in &kept {
        let cell = boxes.as_ref().map(|b| to_mat3(&b[f]));
        system.push_frame(to_vectors(&coords[f]), cell)?;
    }

    if recorded_names.is_some()
        && let Some(map) = &options.type_map
    {
        system.apply_type_map(map)?;
    }
    debug!(
        "{FORMAT}: read {} of {} frames from {}",
        kept.len(),
        coords.len(),
        dir.display()
    );
    Ok((system, kept))
}

pub(super) fn read_labeled(dir: &Path, options: &ReadOptions) -> Result<LabeledSystem, Error> {
    let (system, kept) = read_system(dir, options)?;
    let n_atoms = system.atom_count();

    let energy_path = dir.join(ENERGY);
    if !energy_path.exists() {
        return Err(Error::parse(
            FORMAT,
            0,
            format!("{} has no {ENERGY}; it holds unlabeled frames", dir.display()),
        ));
    }
    let energies = read_rows(&energy_path, Some(1))?;
    let forces = read_rows(&dir.join(FORCE), Some(3 * n_atoms))?;

    let virial_path = dir.join(VIRIAL);
    let virials = if virial_path.exists() {
        Some(read_rows(&virial_path, Some(9))?)
    } else {
        None
    };

    let pick = |rows: &[Vec<f64>], what: &str| -> Result<Vec<Vec<f64>>, Error> {
        kept.iter()
            .map(|&f| {
                rows.get(f).cloned().ok_or_else(|| {
                    Error::shape(format!("{what} has {} rows, frame {f} requested", rows.len()))
                })
            })
            .collect()
    };

    let energies = pick(&energies, ENERGY)?.into_iter().map(|r| r[0]).collect();
    let forces = pick(&forces, FORCE)?.iter().map(|r| to_vectors(r)).collect();
    let virials = virials
        .map(|v| pick(&v, VIRIAL).map(|rows| rows.iter().map(|r| to_mat3(r)).collect()))
        .transpose()?;

    LabeledSystem::new(system, energies, forces, virials)
}

/// Reads whitespace-separated numbers, one row per non-empty line. With
/// `width` set, every row must have exactly that many columns.
fn read_rows(path: &Path, width: Option<usize>) -> Result<Vec<Vec<f64>>, Error> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::parse(FORMAT, 0, format!("missing {}", path.display()))
        } else {
            e.into()
        }
    })?;
    let mut rows = Vec::new();
    for (no, line) in util::collect_lines(BufReader::new(file))? {
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|_| Error::parse(FORMAT, no, format!("'{t}' is not a number")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(w) = width
            && row.len() != w
        {
            return Err(Error::parse(
                FORMAT,
                no,
                format!("{} has {} columns, expected {w}", path.display(), row.len()),
            ));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn read_words(path: &Path) -> Result<Vec<String>, Error> {
    let file = File::open(path)?;
    Ok(util::collect_lines(BufReader::new(file))?
        .into_iter()
        .filter_map(|(_, line)| line.split_whitespace().next().map(str::to_string))
        .collect())
}

fn to_vectors(row: &[f64]) -> Vec<Vec3> {
    row.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
}

fn to_mat3(row: &[f64]) -> Mat3 {
    [
        [row[0], row[1], row[2]],
        [row[3], row[4], row[5]],
        [row[6], row[7], row[8]],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, text: &str) {
        fs::write(dir.join(name), text).unwrap();
    }

    fn bare_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), TYPE, "0\n1\n1\n");
        write(
            dir.path(),
            COORD,
            "0 0 0 1 0 0 0 1 0\n0 0 0.1 1 0 0.1 0 1 0.1\n0 0 0.2 1 0 0.2 0 1 0.2\n",
        );
        write(dir.path(), BOX, &"5 0 0 0 5 0 0 0 5\n".repeat(3));
        dir
    }

    #[test]
    fn names_come_from_type_map_option_without_type_map_file() {
        let dir = bare_dir();
        let options = ReadOptions::default().with_type_map(["O", "H"]);
        let (system, kept) = read_system(dir.path(), &options).unwrap();
        assert_eq!(system.species_names, vec!["O", "H"]);
        assert_eq!(system.species_counts, vec![1, 2]);
        assert_eq!(kept, vec![0, 1, 2]);
    }

    #[test]
    fn placeholder_names_without_any_map() {
        let dir = bare_dir();
        let (system, _) = read_system(dir.path(), &ReadOptions::default()).unwrap();
        assert_eq!(system.species_names, vec!["Type_0", "Type_1"]);
    }

    #[test]
    fn type_map_option_reorders_recorded_names() {
        let dir = bare_dir();
        write(dir.path(), TYPE_MAP, "O\nH\n");
        let options = ReadOptions::default().with_type_map(["H", "O"]);
        let (system, _) = read_system(dir.path(), &options).unwrap();
        assert_eq!(system.species_names, vec!["H", "O"]);
        assert_eq!(system.atom_species_index, vec![1, 0, 0]);
    }

    #[test]
    fn begin_and_step_slice_frames() {
        let dir = bare_dir();
        let options = ReadOptions {
            begin: 1,
            step: 1,
            ..ReadOptions::default()
        };
        let (system, kept) = read_system(dir.path(), &options).unwrap();
        assert_eq!(kept, vec![1, 2]);
        assert_eq!(system.coordinates[0][0], [0.0, 0.0, 0.1]);
    }

    #[test]
    fn short_type_map_is_rejected() {
        let dir = bare_dir();
        let options = ReadOptions::default().with_type_map(["O"]);
        assert!(matches!(
            read_system(dir.path(), &options),
            Err(Error::Conversion(_))
        ));
    }

    #[test]
    fn wrong_column_count_is_a_parse_error() {
        let dir = bare_dir();
        write(dir.path(), COORD, "0 0 0 1 0 0\n");
        assert!(matches!(
            read_system(dir.path(), &ReadOptions::default()),
            Err(Error::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn labels_follow_frame_slicing() {
        let dir = bare_dir();
        write(dir.path(), TYPE_MAP, "O\nH\n");
        write(dir.path(), ENERGY, "-1\n-2\n-3\n");
        write(dir.path(), FORCE, &"0 0 0 0 0 0 0 0 0\n".repeat(3));
        let options = ReadOptions {
            begin: 0,
            step: 2,
            ..ReadOptions::default()
        };
        let labeled = read_labeled(dir.path(), &options).unwrap();
        assert_eq!(labeled.energies, vec![-1.0, -3.0]);
        assert!(labeled.virials.is_none());
    }
}
