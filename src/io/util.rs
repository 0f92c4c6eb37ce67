use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use log::debug;

use super::LinkMode;
use crate::error::Error;
use crate::model::types::BondOrder;

/// Reads every line together with its one-based line number.
pub fn collect_lines<R: BufRead>(reader: R) -> Result<Vec<(usize, String)>, Error> {
    reader
        .lines()
        .enumerate()
        .map(|(i, line)| Ok((i + 1, line?)))
        .collect()
}

/// Drops a trailing `#` or `//` comment.
pub fn strip_comment(line: &str) -> &str {
    let cut = [line.find('#'), line.find("//")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    &line[..cut]
}

/// Parses exactly `N` whitespace-separated floats from the start of `line`.
pub fn parse_floats<const N: usize>(
    line: &str,
    format: &'static str,
    line_no: usize,
) -> Result<[f64; N], Error> {
    let mut out = [0.0; N];
    let mut tokens = line.split_whitespace();
    for (k, slot) in out.iter_mut().enumerate() {
        let token = tokens.next().ok_or_else(|| {
            Error::parse(format, line_no, format!("expected {N} numbers, found {k}"))
        })?;
        *slot = token
            .parse()
            .map_err(|_| Error::parse(format, line_no, format!("'{token}' is not a number")))?;
    }
    Ok(out)
}

/// Makes `source` available next to a file written into `dir` and returns
/// the path the written file should reference.
///
/// With [`LinkMode::None`] the source path is returned unchanged and the
/// file is not touched. Otherwise the file is copied or symlinked into
/// `dir` under its own file name, replacing whatever was there, and only
/// that file name is returned.
pub fn place_aux_file(source: &Path, dir: &Path, mode: LinkMode) -> Result<PathBuf, Error> {
    if mode == LinkMode::None {
        return Ok(source.to_path_buf());
    }
    if !source.exists() {
        return Err(Error::MissingAuxFile(source.to_path_buf()));
    }
    let name = source
        .file_name()
        .ok_or_else(|| Error::MissingAuxFile(source.to_path_buf()))?;
    let target = dir.join(name);

    let source_abs = fs::canonicalize(source)?;
    if fs::canonicalize(&target).is_ok_and(|t| t == source_abs) && !is_symlink(&target) {
        return Ok(PathBuf::from(name));
    }
    if fs::symlink_metadata(&target).is_ok() {
        debug!("replacing existing {}", target.display());
        fs::remove_file(&target)?;
    }

    match mode {
        LinkMode::Copy => {
            fs::copy(&source_abs, &target)?;
        }
        LinkMode::Symlink => symlink(&source_abs, &target)?,
        LinkMode::None => {}
    }
    Ok(PathBuf::from(name))
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

#[cfg(unix)]
fn symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(not(unix))]
fn symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    fs::copy(source, target).map(|_| ())
}

pub fn bond_order_to_ctfile(order: BondOrder) -> u8 {
    match order {
        BondOrder::Single => 1,
        BondOrder::Double => 2,
        BondOrder::Triple => 3,
        BondOrder::Aromatic => 4,
    }
}

pub fn bond_order_from_ctfile(value: i32) -> Option<BondOrder> {
    match value {
        1 => Some(BondOrder::Single),
        2 => Some(BondOrder::Double),
        3 => Some(BondOrder::Triple),
        4 => Some(BondOrder::Aromatic),
        _ => None,
    }
}
