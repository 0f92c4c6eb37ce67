//! Reader for LAMMPS `dump` trajectories in the `ITEM:` text layout.
//!
//! Positions may be given as `x y z`, unwrapped `xu yu zu` or scaled
//! `xs ys zs` columns. Coordinates are stored relative to the box origin
//! (`xlo ylo zlo`), so the cell and the positions share one frame of
//! reference. Numeric atom types `t` map to species `t - 1`, named by
//! [`ReadOptions::type_map`] when given and `Type_<t>` otherwise.

use std::io::BufRead;

use log::debug;

use crate::error::Error;
use crate::io::{ReadOptions, util};
use crate::model::system::System;
use crate::model::types::{Mat3, Vec3, vec_mat};

const FORMAT: &str = "LAMMPS dump";

type Lines = [(usize, String)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositionKind {
    Cartesian,
    Unwrapped,
    Scaled,
}

#[derive(Debug, Clone)]
struct Columns {
    id: usize,
    kind: PositionKind,
    xyz: [usize; 3],
    atom_type: usize,
}

impl Columns {
    fn parse(header: &str, line_no: usize) -> Result<Self, Error> {
        let names: Vec<&str> = header.split_whitespace().collect();
        let find = |name: &str| names.iter().position(|n| *n == name);
        let column = |name: &str| {
            find(name).ok_or_else(|| {
                Error::parse(FORMAT, line_no, format!("ATOMS section has no '{name}' column"))
            })
        };

        let candidates = [
            (PositionKind::Cartesian, ["x", "y", "z"]),
            (PositionKind::Unwrapped, ["xu", "yu", "zu"]),
            (PositionKind::Scaled, ["xs", "ys", "zs"]),
        ];
        let (kind, xyz) = candidates
            .iter()
            .find_map(|(kind, [x, y, z])| Some((*kind, [find(x)?, find(y)?, find(z)?])))
            .ok_or_else(|| {
                Error::parse(
                    FORMAT,
                    line_no,
                    "ATOMS section needs x y z, xu yu zu or xs ys zs columns",
                )
            })?;

        Ok(Self {
            id: column("id")?,
            atom_type: column("type")?,
            kind,
            xyz,
        })
    }

    fn width(&self) -> usize {
        [self.id, self.atom_type, self.xyz[0], self.xyz[1], self.xyz[2]]
            .into_iter()
            .max()
            .map_or(0, |m| m + 1)
    }
}

#[derive(Debug, Clone)]
struct DumpFrame {
    cell: Mat3,
    /// `(id, type, position)` ordered by id.
    atoms: Vec<(usize, usize, Vec3)>,
}

/// Reads every frame kept by `options` into one periodic record.
pub fn read<R: BufRead>(reader: R, options: &ReadOptions) -> Result<System, Error> {
    let lines = util::collect_lines(reader)?;

    let mut frames = Vec::new();
    let mut total = 0;
    let mut cursor = 0;
    while cursor < lines.len() {
        if lines[cursor].1.trim().is_empty() {
            cursor += 1;
            continue;
        }
        let (frame, next) = parse_frame(&lines, cursor)?;
        if options.keeps_frame(total) {
            frames.push(frame);
        }
        total += 1;
        cursor = next;
    }

    if total == 0 {
        return Err(Error::parse(FORMAT, 1, "no frames found"));
    }
    let Some(first) = frames.first() else {
        return Err(Error::Conversion(format!(
            "frame slicing from {} keeps none of {total} frames",
            options.begin
        )));
    };

    let ids: Vec<usize> = first.atoms.iter().map(|a| a.0).collect();
    let types: Vec<usize> = first.atoms.iter().map(|a| a.1).collect();
    let max_type = types.iter().copied().max().unwrap_or(0);
    let names: Vec<String> = match &options.type_map {
        Some(map) if map.len() < max_type => {
            return Err(Error::Conversion(format!(
                "atom type {max_type} has no entry in a type map of {} names",
                map.len()
            )));
        }
        Some(map) => map.clone(),
        None => (1..=max_type).map(|t| format!("Type_{t}")).collect(),
    };

    let mut system = System::with_species(names, types.iter().map(|t| t - 1).collect());
    for (k, frame) in frames.iter().enumerate() {
        let same_atoms = frame.atoms.len() == ids.len()
            && frame
                .atoms
                .iter()
                .zip(ids.iter().zip(&types))
                .all(|(a, (id, t))| a.0 == *id && a.1 == *t);
        if !same_atoms {
            return Err(Error::shape(format!(
                "kept frame {k} does not contain the atoms of the first frame"
            )));
        }
        let coords = frame.atoms.iter().map(|a| a.2).collect();
        system.push_frame(coords, Some(frame.cell))?;
    }
    debug!("{FORMAT}: kept {} of {total} frames", frames.len());
    Ok(system)
}

fn item(lines: &Lines, at: usize) -> Result<&str, Error> {
    let (no, text) = &lines[at];
    text.trim()
        .strip_prefix("ITEM:")
        .map(str::trim)
        .ok_or_else(|| Error::parse(FORMAT, *no, format!("expected an ITEM: line, found '{}'", text.trim())))
}

fn body<'a>(lines: &'a Lines, at: usize, what: &str) -> Result<(usize, &'a str), Error> {
    lines
        .get(at)
        .map(|(no, text)| (*no, text.as_str()))
        .ok_or_else(|| {
            let last = lines.last().map_or(0, |(no, _)| *no);
            Error::parse(FORMAT, last, format!("file ends inside {what}"))
        })
}

/// Parses one frame starting at `start`; returns it with the index of the
/// first line after it.
fn parse_frame(lines: &Lines, start: usize) -> Result<(DumpFrame, usize), Error> {
    let mut at = start;
    let mut n_atoms: Option<usize> = None;
    let mut cell_origin: Option<(Mat3, Vec3)> = None;

    loop {
        if at >= lines.len() {
            let last = lines.last().map_or(0, |(no, _)| *no);
            return Err(Error::parse(FORMAT, last, "frame has no ATOMS section"));
        }
        let header = item(lines, at)?;
        at += 1;

        if header.starts_with("NUMBER OF ATOMS") {
            let (no, text) = body(lines, at, "NUMBER OF ATOMS")?;
            n_atoms = Some(text.trim().parse().map_err(|_| {
                Error::parse(FORMAT, no, format!("invalid atom count '{}'", text.trim()))
            })?);
            at += 1;
        } else if let Some(flags) = header.strip_prefix("BOX BOUNDS") {
            let triclinic = flags.split_whitespace().any(|f| f == "xy");
            let mut rows = [[0.0; 3]; 3];
            for row in rows.iter_mut() {
                let (no, text) = body(lines, at, "BOX BOUNDS")?;
                *row = if triclinic {
                    util::parse_floats::<3>(text, FORMAT, no)?
                } else {
                    let [lo, hi] = util::parse_floats::<2>(text, FORMAT, no)?;
                    [lo, hi, 0.0]
                };
                at += 1;
            }
            cell_origin = Some(box_to_cell(&rows));
        } else if let Some(columns) = header.strip_prefix("ATOMS") {
            let columns = Columns::parse(columns, lines[at - 1].0)?;
            let n = n_atoms.ok_or_else(|| {
                Error::parse(FORMAT, lines[at - 1].0, "ATOMS section before NUMBER OF ATOMS")
            })?;
            let (cell, origin) = cell_origin.ok_or_else(|| {
                Error::parse(FORMAT, lines[at - 1].0, "ATOMS section before BOX BOUNDS")
            })?;

            let mut atoms = Vec::with_capacity(n);
            for _ in 0..n {
                let (no, text) = body(lines, at, "ATOMS")?;
                atoms.push(parse_atom(text, no, &columns, &cell, &origin)?);
                at += 1;
            }
            atoms.sort_by_key(|a| a.0);
            return Ok((DumpFrame { cell, atoms }, at));
        } else {
            // TIMESTEP, TIME, UNITS and anything else: skip to the next item.
            while at < lines.len() && !lines[at].1.trim_start().starts_with("ITEM:") {
                at += 1;
            }
        }
    }
}

fn parse_atom(
    text: &str,
    no: usize,
    columns: &Columns,
    cell: &Mat3,
    origin: &Vec3,
) -> Result<(usize, usize, Vec3), Error> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < columns.width() {
        return Err(Error::parse(
            FORMAT,
            no,
            format!("atom line has {} columns, expected {}", tokens.len(), columns.width()),
        ));
    }
    let int = |i: usize, what: &str| {
        tokens[i]
            .parse::<usize>()
            .map_err(|_| Error::parse(FORMAT, no, format!("invalid atom {what} '{}'", tokens[i])))
    };
    let float = |i: usize| {
        tokens[i]
            .parse::<f64>()
            .map_err(|_| Error::parse(FORMAT, no, format!("'{}' is not a number", tokens[i])))
    };

    let id = int(columns.id, "id")?;
    let atom_type = int(columns.atom_type, "type")?;
    if atom_type == 0 {
        return Err(Error::parse(FORMAT, no, "atom types start at 1"));
    }
    let raw = [float(columns.xyz[0])?, float(columns.xyz[1])?, float(columns.xyz[2])?];
    let pos = match columns.kind {
        PositionKind::Scaled => vec_mat(&raw, cell),
        PositionKind::Cartesian | PositionKind::Unwrapped => {
            [raw[0] - origin[0], raw[1] - origin[1], raw[2] - origin[2]]
        }
    };
    Ok((id, atom_type, pos))
}

/// Turns the three `BOX BOUNDS` rows into lattice vectors and the box
/// origin. Triclinic rows carry the tilt factors `xy`, `xz`, `yz` in their
/// third column and bounds that enclose the tilted box.
fn box_to_cell(rows: &[[f64; 3]; 3]) -> (Mat3, Vec3) {
    let [xlo_b, xhi_b, xy] = rows[0];
    let [ylo_b, yhi_b, xz] = rows[1];
    let [zlo, zhi, yz] = rows[2];

    let x_shifts = [0.0, xy, xz, xy + xz];
    let xlo = xlo_b - x_shifts.iter().copied().fold(f64::INFINITY, f64::min);
    let xhi = xhi_b - x_shifts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let ylo = ylo_b - yz.min(0.0);
    let yhi = yhi_b - yz.max(0.0);

    let cell = [
        [xhi - xlo, 0.0, 0.0],
        [xy, yhi - ylo, 0.0],
        [xz, yz, zhi - zlo],
    ];
    (cell, [xlo, ylo, zlo])
}
