use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use log::debug;

use super::{BOX, COORD, ENERGY, FORCE, FORMAT, NOPBC, TYPE, TYPE_MAP, VIRIAL};
use crate::error::Error;
use crate::model::labeled::LabeledSystem;
use crate::model::system::System;

pub(super) fn write_system(dir: &Path, system: &System, frames: &[usize]) -> Result<(), Error> {
    fs::create_dir_all(dir)?;

    write_file(&dir.join(TYPE), |w| {
        for t in &system.atom_species_index {
            writeln!(w, "{t}")?;
        }
        Ok(())
    })?;
    write_file(&dir.join(TYPE_MAP), |w| {
        for name in &system.species_names {
            writeln!(w, "{name}")?;
        }
        Ok(())
    })?;
    write_file(&dir.join(COORD), |w| {
        for &f in frames {
            write_row(w, system.coordinates[f].iter().flatten())?;
        }
        Ok(())
    })?;

    match &system.cells {
        Some(cells) => {
            remove_if_present(&dir.join(NOPBC))?;
            write_file(&dir.join(BOX), |w| {
                for &f in frames {
                    write_row(w, cells[f].iter().flatten())?;
                }
                Ok(())
            })?;
        }
        None => {
            remove_if_present(&dir.join(BOX))?;
            File::create(dir.join(NOPBC))?;
        }
    }

    for stale in [ENERGY, FORCE, VIRIAL] {
        remove_if_present(&dir.join(stale))?;
    }
    debug!("{FORMAT}: wrote {} frames to {}", frames.len(), dir.display());
    Ok(())
}

pub(super) fn write_labeled(dir: &Path, system: &LabeledSystem, frames: &[usize]) -> Result<(), Error> {
    write_system(dir, &system.system, frames)?;

    write_file(&dir.join(ENERGY), |w| {
        for &f in frames {
            writeln!(w, "{}", system.energies[f])?;
        }
        Ok(())
    })?;
    write_file(&dir.join(FORCE), |w| {
        for &f in frames {
            write_row(w, system.forces[f].iter().flatten())?;
        }
        Ok(())
    })?;
    if let Some(virials) = &system.virials {
        write_file(&dir.join(VIRIAL), |w| {
            for &f in frames {
                write_row(w, virials[f].iter().flatten())?;
            }
            Ok(())
        })?;
    }
    Ok(())
}

fn write_file(
    path: &Path,
    body: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> Result<(), Error> {
    let mut w = BufWriter::new(File::create(path)?);
    body(&mut w)?;
    w.flush()?;
    Ok(())
}

fn write_row<'a>(w: &mut impl Write, values: impl Iterator<Item = &'a f64>) -> std::io::Result<()> {
    let row: Vec<String> = values.map(f64::to_string).collect();
    writeln!(w, "{}", row.join(" "))
}

fn remove_if_present(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
