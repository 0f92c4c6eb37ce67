use std::io::Write;

use crate::error::Error;
use crate::io::util;
use crate::model::bond_order::BondOrderSystem;

/// Inverse of the atom-block charge code; charges outside -3..=3 are only
/// expressed through `M  CHG`.
fn charge_code(charge: i32) -> i32 {
    match charge {
        3 => 1,
        2 => 2,
        1 => 3,
        -1 => 5,
        -2 => 6,
        -3 => 7,
        _ => 0,
    }
}

/// Writes `frames` of `record` as molfile blocks, each followed by `$$$$`
/// when `terminate` is set.
pub fn write<W: Write>(
    mut writer: W,
    record: &BondOrderSystem,
    frames: &[usize],
    terminate: bool,
) -> Result<(), Error> {
    let system = &record.system;
    let atom_count = system.atom_count();
    let bond_count = record.bond_count();
    if atom_count > 999 || bond_count > 999 {
        return Err(Error::Conversion(format!(
            "V2000 blocks hold at most 999 atoms and bonds, got {atom_count} and {bond_count}"
        )));
    }

    let charged: Vec<(usize, i32)> = record
        .formal_charges
        .iter()
        .enumerate()
        .filter(|(_, c)| **c != 0)
        .map(|(i, c)| (i + 1, *c))
        .collect();

    for &frame in frames {
        writeln!(writer, "frame {frame}")?;
        writeln!(writer, "  atomdata")?;
        writeln!(writer)?;
        writeln!(
            writer,
            "{:>3}{:>3}  0  0  0  0  0  0  0  0  0999 V2000",
            atom_count, bond_count
        )?;

        for (atom, pos) in system.coordinates[frame].iter().enumerate() {
            writeln!(
                writer,
                "{:>10.4}{:>10.4}{:>10.4} {:<3} 0{:>3}  0  0  0  0  0  0  0  0  0  0",
                pos[0],
                pos[1],
                pos[2],
                system.species_of(atom),
                charge_code(record.formal_charges[atom])
            )?;
        }

        for bond in &record.bonds {
            writeln!(
                writer,
                "{:>3}{:>3}{:>3}  0  0  0  0",
                bond.i + 1,
                bond.j + 1,
                util::bond_order_to_ctfile(bond.order)
            )?;
        }

        for chunk in charged.chunks(8) {
            write!(writer, "M  CHG{:>3}", chunk.len())?;
            for (atom, charge) in chunk {
                write!(writer, " {atom:>3} {charge:>3}")?;
            }
            writeln!(writer)?;
        }

        writeln!(writer, "M  END")?;
        if terminate {
            writeln!(writer, "$$$$")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ReadOptions;
    use crate::io::sdf::reader;
    use crate::model::bond_order::Bond;
    use crate::model::system::System;
    use crate::model::types::BondOrder;
    use std::io::Cursor;

    fn formaldehyde() -> BondOrderSystem {
        let mut s = System::with_species(vec!["C".into(), "O".into(), "H".into()], vec![0, 1, 2, 2]);
        s.push_frame(
            vec![[0.0, 0.0, 0.0], [1.2, 0.0, 0.0], [-0.5, 0.9, 0.0], [-0.5, -0.9, 0.0]],
            None,
        )
        .unwrap();
        BondOrderSystem::new(
            s,
            vec![
                Bond::new(0, 1, BondOrder::Double),
                Bond::new(0, 2, BondOrder::Single),
                Bond::new(0, 3, BondOrder::Single),
            ],
            vec![0; 4],
        )
        .unwrap()
    }

    #[test]
    fn writes_and_reads_roundtrip() {
        let record = formaldehyde();
        let mut buf = Vec::new();
        write(&mut buf, &record, &[0], true).unwrap();
        let parsed = reader::read(Cursor::new(buf), true, &ReadOptions::default()).unwrap();

        assert_eq!(parsed.system.atom_count(), 4);
        assert_eq!(parsed.bonds, record.bonds);
        assert_eq!(parsed.system.atom_species_index, record.system.atom_species_index);
        for (a, b) in record.system.coordinates[0].iter().zip(&parsed.system.coordinates[0]) {
            for k in 0..3 {
                assert!((a[k] - b[k]).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn charges_beyond_atom_block_range_survive_via_property_lines() {
        let mut record = formaldehyde();
        record.formal_charges = vec![4, 0, 0, -1];
        let mut buf = Vec::new();
        write(&mut buf, &record, &[0], false).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.contains("M  CHG  2   1   4   4  -1"));
        assert!(!text.contains("$$$$"));

        let parsed = reader::read(Cursor::new(buf), false, &ReadOptions::default()).unwrap();
        assert_eq!(parsed.formal_charges, vec![4, 0, 0, -1]);
    }
}
