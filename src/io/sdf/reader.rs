use std::io::BufRead;
use std::ops::Range;

use log::debug;

use super::FORMAT;
use crate::error::Error;
use crate::io::{ReadOptions, util};
use crate::model::bond_order::{Bond, BondOrderSystem};
use crate::model::system::System;
use crate::model::types::Vec3;

/// One parsed molfile block.
#[derive(Debug, Clone, PartialEq)]
struct Block {
    symbols: Vec<String>,
    positions: Vec<Vec3>,
    bonds: Vec<Bond>,
    charges: Vec<i32>,
}

/// Reads every block (or only the first one when `multi` is false) into
/// one record whose frames are the conformers.
pub fn read<R: BufRead>(
    reader: R,
    multi: bool,
    options: &ReadOptions,
) -> Result<BondOrderSystem, Error> {
    let lines = util::collect_lines(reader)?;
    let mut blocks = Vec::new();
    for (index, raw) in split_blocks(&lines).into_iter().enumerate() {
        if !multi && index > 0 {
            debug!("{FORMAT}: molfile reader ignores blocks after the first");
            break;
        }
        if options.keeps_frame(index) {
            blocks.push(parse_block(raw)?);
        }
    }

    let Some(first) = blocks.first() else {
        return Err(Error::parse(FORMAT, 1, "no molecule block found"));
    };

    let mut names: Vec<String> = Vec::new();
    let mut species_index = Vec::with_capacity(first.symbols.len());
    for symbol in &first.symbols {
        let idx = match names.iter().position(|n| n == symbol) {
            Some(i) => i,
            None => {
                names.push(symbol.clone());
                names.len() - 1
            }
        };
        species_index.push(idx);
    }

    let mut system = System::with_species(names, species_index);
    for (k, block) in blocks.iter().enumerate() {
        if block.symbols != first.symbols || block.bonds != first.bonds || block.charges != first.charges {
            return Err(Error::shape(format!(
                "conformer {k} does not share the atoms, bonds and charges of the first block"
            )));
        }
        system.push_frame(block.positions.clone(), None)?;
    }

    BondOrderSystem::new(system, first.bonds.clone(), first.charges.clone())
}

fn split_blocks(lines: &[(usize, String)]) -> Vec<&[(usize, String)]> {
    let mut blocks = Vec::new();
    let mut start = 0;
    for (i, (_, content)) in lines.iter().enumerate() {
        if content.trim() == "$$$$" {
            blocks.push(&lines[start..i]);
            start = i + 1;
        }
    }
    let tail = &lines[start..];
    if tail.iter().any(|(_, l)| !l.trim().is_empty()) {
        blocks.push(tail);
    }
    blocks
}

fn parse_block(lines: &[(usize, String)]) -> Result<Block, Error> {
    let first_no = lines.first().map_or(1, |(no, _)| *no);
    if lines.len() < 4 {
        return Err(Error::parse(
            FORMAT,
            first_no,
            "block must contain a header and a counts line",
        ));
    }

    let (counts_no, counts_line) = &lines[3];
    if counts_line.contains("V3000") {
        return Err(Error::parse(FORMAT, *counts_no, "V3000 is not supported"));
    }
    let (atom_count, bond_count) = parse_counts(counts_line, *counts_no)?;
    let atom_start = 4;
    let bond_start = atom_start + atom_count;
    if lines.len() < bond_start + bond_count {
        return Err(Error::parse(
            FORMAT,
            lines.last().map_or(*counts_no, |(no, _)| *no),
            "block ended before atoms/bonds were fully specified",
        ));
    }

    let (symbols, positions, mut charges) = parse_atoms(&lines[atom_start..bond_start])?;
    let bonds = parse_bonds(&lines[bond_start..bond_start + bond_count], atom_count)?;
    apply_property_charges(&lines[bond_start + bond_count..], &mut charges)?;

    Ok(Block {
        symbols,
        positions,
        bonds,
        charges,
    })
}

/// Fixed-width column of a CTfile line; a column that does not fall on
/// character boundaries is a parse error.
fn column(padded: &str, range: Range<usize>, line_no: usize) -> Result<&str, Error> {
    padded.get(range.clone()).map(str::trim).ok_or_else(|| {
        Error::parse(
            FORMAT,
            line_no,
            format!("columns {}-{} are not plain text", range.start + 1, range.end),
        )
    })
}

fn parse_counts(line: &str, line_no: usize) -> Result<(usize, usize), Error> {
    let padded = format!("{line:<6}");
    let field = |range: Range<usize>, what: &str| {
        column(&padded, range, line_no)?
            .parse::<usize>()
            .map_err(|_| Error::parse(FORMAT, line_no, format!("invalid {what} count")))
    };
    Ok((field(0..3, "atom")?, field(3..6, "bond")?))
}

/// Maps the atom-block charge code to a formal charge.
fn charge_from_code(code: i32) -> i32 {
    match code {
        1 => 3,
        2 => 2,
        3 => 1,
        5 => -1,
        6 => -2,
        7 => -3,
        _ => 0,
    }
}

type AtomColumns = (Vec<String>, Vec<Vec3>, Vec<i32>);

fn parse_atoms(lines: &[(usize, String)]) -> Result<AtomColumns, Error> {
    let mut symbols = Vec::with_capacity(lines.len());
    let mut positions = Vec::with_capacity(lines.len());
    let mut charges = Vec::with_capacity(lines.len());
    for (ln, raw) in lines {
        let padded = format!("{raw:<39}");
        let coord = |range: Range<usize>, axis: char| {
            column(&padded, range, *ln)?.parse::<f64>().map_err(|_| {
                Error::parse(FORMAT, *ln, format!("invalid {axis} coordinate in atom line"))
            })
        };
        positions.push([coord(0..10, 'x')?, coord(10..20, 'y')?, coord(20..30, 'z')?]);

        let symbol = column(&padded, 31..34, *ln)?;
        if symbol.is_empty() {
            return Err(Error::parse(FORMAT, *ln, "atom line has no element symbol"));
        }
        symbols.push(symbol.to_string());

        let code = column(&padded, 36..39, *ln)?.parse::<i32>().unwrap_or(0);
        charges.push(charge_from_code(code));
    }
    Ok((symbols, positions, charges))
}

fn parse_bonds(lines: &[(usize, String)], atom_count: usize) -> Result<Vec<Bond>, Error> {
    let mut bonds = Vec::with_capacity(lines.len());
    for (ln, raw) in lines {
        let padded = format!("{raw:<9}");
        let field = |range: Range<usize>, what: &str| {
            column(&padded, range, *ln)?
                .parse::<i32>()
                .map_err(|_| Error::parse(FORMAT, *ln, format!("invalid {what} in bond line")))
        };
        let a1 = field(0..3, "first atom index")?;
        let a2 = field(3..6, "second atom index")?;
        let order_val = field(6..9, "bond order value")?;

        let order = util::bond_order_from_ctfile(order_val)
            .ok_or_else(|| Error::parse(FORMAT, *ln, "unsupported bond order in bond line"))?;
        let in_range = |a: i32| a >= 1 && (a as usize) <= atom_count;
        if !in_range(a1) || !in_range(a2) {
            return Err(Error::parse(
                FORMAT,
                *ln,
                "bond references atom outside declared range",
            ));
        }
        bonds.push(Bond::new(a1 as usize - 1, a2 as usize - 1, order));
    }
    Ok(bonds)
}

/// `M  CHG` lines replace every atom-block charge of the block.
fn apply_property_charges(lines: &[(usize, String)], charges: &mut [i32]) -> Result<(), Error> {
    let mut reset = false;
    for (ln, raw) in lines {
        if raw.starts_with("M  END") {
            break;
        }
        if !raw.starts_with("M  CHG") {
            continue;
        }
        if !reset {
            charges.iter_mut().for_each(|c| *c = 0);
            reset = true;
        }
        let values: Vec<i32> = raw[6..]
            .split_whitespace()
            .map(|t| {
                t.parse()
                    .map_err(|_| Error::parse(FORMAT, *ln, format!("invalid value '{t}' in M  CHG")))
            })
            .collect::<Result<_, _>>()?;
        let Some((&n, pairs)) = values.split_first() else {
            return Err(Error::parse(FORMAT, *ln, "empty M  CHG line"));
        };
        if n < 0 || pairs.len() != 2 * n as usize {
            return Err(Error::parse(FORMAT, *ln, "M  CHG entry count does not match"));
        }
        for pair in pairs.chunks_exact(2) {
            let atom = pair[0];
            let slot = usize::try_from(atom - 1)
                .ok()
                .and_then(|i| charges.get_mut(i))
                .ok_or_else(|| {
                    Error::parse(FORMAT, *ln, format!("M  CHG references atom {atom}"))
                })?;
            *slot = pair[1];
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::BondOrder;
    use std::io::Cursor;

    const AMMONIUM: &str = "\
ammonium
  test

  5  4  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 N   0  3  0  0  0  0  0  0  0  0  0  0
    1.0000    0.0000    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
   -0.3300    0.9400    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
   -0.3300   -0.4700    0.8200 H   0  0  0  0  0  0  0  0  0  0  0  0
   -0.3300   -0.4700   -0.8200 H   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0  0  0  0
  1  3  1  0  0  0  0
  1  4  1  0  0  0  0
  1  5  1  0  0  0  0
M  END
$$$$
";

    #[test]
    fn atom_block_charge_code_is_used_without_property_lines() {
        let record = read(Cursor::new(AMMONIUM), true, &ReadOptions::default()).unwrap();
        assert_eq!(record.formal_charges, vec![1, 0, 0, 0, 0]);
        assert_eq!(record.system.species_names, vec!["N", "H"]);
        assert_eq!(record.system.species_counts, vec![1, 4]);
        assert_eq!(record.bonds[0], Bond::new(0, 1, BondOrder::Single));
    }

    #[test]
    fn property_charges_override_atom_block() {
        let text = AMMONIUM.replace("M  END", "M  CHG  1   2   1\nM  END");
        let record = read(Cursor::new(text), true, &ReadOptions::default()).unwrap();
        assert_eq!(record.formal_charges, vec![0, 1, 0, 0, 0]);
    }

    #[test]
    fn conformers_must_share_topology() {
        let second = AMMONIUM.replace("  1  5  1", "  1  5  2");
        let text = format!("{AMMONIUM}{second}");
        let err = read(Cursor::new(text), true, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }

    #[test]
    fn molfile_mode_reads_first_block_only() {
        let second = AMMONIUM.replace("  1  5  1", "  1  5  2");
        let text = format!("{AMMONIUM}{second}");
        let record = read(Cursor::new(text), false, &ReadOptions::default()).unwrap();
        assert_eq!(record.system.frame_count(), 1);
    }

    #[test]
    fn rejects_v3000() {
        let text = AMMONIUM.replace("V2000", "V3000");
        assert!(matches!(
            read(Cursor::new(text), true, &ReadOptions::default()),
            Err(Error::Parse { line: 4, .. })
        ));
    }

    #[test]
    fn multibyte_text_in_fixed_columns_is_a_parse_error() {
        let text = AMMONIUM.replace("    0.0000 N   0  3", "    0.0000\u{e9}N   0  3");
        assert!(matches!(
            read(Cursor::new(text), true, &ReadOptions::default()),
            Err(Error::Parse { line: 5, .. })
        ));

        let counts = AMMONIUM.replace("  5  4  0", "  \u{e9}  4  0");
        assert!(matches!(
            read(Cursor::new(counts), true, &ReadOptions::default()),
            Err(Error::Parse { line: 4, .. })
        ));
    }

    #[test]
    fn rejects_bond_to_missing_atom() {
        let text = AMMONIUM.replace("  1  5  1", "  1  9  1");
        assert!(matches!(
            read(Cursor::new(text), true, &ReadOptions::default()),
            Err(Error::Parse { .. })
        ));
    }
}
