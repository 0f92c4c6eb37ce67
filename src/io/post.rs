use std::fmt;

use crate::error::Error;
use crate::model::record::Record;
use crate::model::types::{Mat3, Vec3, dot, norm, transpose, vec_mat};

/// Normalization steps a converter can declare for the records it reads.
///
/// Each step consumes a whole record and returns the transformed record;
/// labels and bond graphs move together with the atoms. The engine runs a
/// converter's declared steps on every load; callers may also apply any
/// step themselves through [`PostProcess::apply`]. No built-in converter
/// declares [`PostProcess::RotLowerTriangular`], because STRU and
/// deepmd/raw keep the cell orientation they were given and the LAMMPS
/// dump reader already builds lower-triangular cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcess {
    /// Rotate every frame so its cell matrix is lower triangular.
    RotLowerTriangular,
    /// Reorder atoms so each species forms one contiguous block.
    SortAtomTypes,
}

impl PostProcess {
    pub fn apply<R: Record>(self, mut record: R) -> Result<R, Error> {
        match self {
            PostProcess::RotLowerTriangular => rot_lower_triangular(&mut record)?,
            PostProcess::SortAtomTypes => {
                let order = record.system_mut().sort_atoms_by_species();
                record.permute_labels(&order);
            }
        }
        Ok(record)
    }
}

impl fmt::Display for PostProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostProcess::RotLowerTriangular => write!(f, "rot_lower_triangular"),
            PostProcess::SortAtomTypes => write!(f, "sort_atom_types"),
        }
    }
}

fn rot_lower_triangular<R: Record>(record: &mut R) -> Result<(), Error> {
    let Some(cells) = record.system().cells.clone() else {
        return Ok(());
    };
    for (frame, cell) in cells.iter().enumerate() {
        let rot = lower_triangular_rotation(cell).ok_or_else(|| {
            Error::Conversion(format!("cell of frame {frame} is degenerate"))
        })?;

        let system = record.system_mut();
        if let Some(cells) = system.cells.as_mut() {
            let rotated = [
                vec_mat(&cells[frame][0], &rot),
                vec_mat(&cells[frame][1], &rot),
                vec_mat(&cells[frame][2], &rot),
            ];
            cells[frame] = clean_upper(rotated);
        }
        for pos in system.coordinates[frame].iter_mut() {
            *pos = vec_mat(pos, &rot);
        }
        record.rotate_labels(frame, &rot);
    }
    Ok(())
}

/// Gram-Schmidt on the lattice vectors. The returned matrix has the
/// orthonormal basis as columns, so `cell · rot` is lower triangular.
fn lower_triangular_rotation(cell: &Mat3) -> Option<Mat3> {
    let mut basis: [Vec3; 3] = [[0.0; 3]; 3];
    for i in 0..3 {
        let mut v = cell[i];
        for q in basis.iter().take(i) {
            let p = dot(&v, q);
            for k in 0..3 {
                v[k] -= p * q[k];
            }
        }
        let n = norm(&v);
        if n < 1e-10 {
            return None;
        }
        basis[i] = [v[0] / n, v[1] / n, v[2] / n];
    }
    Some(transpose(&basis))
}

fn clean_upper(mut cell: Mat3) -> Mat3 {
    cell[0][1] = 0.0;
    cell[0][2] = 0.0;
    cell[1][2] = 0.0;
    cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::labeled::LabeledSystem;
    use crate::model::system::System;

    fn tilted() -> System {
        let mut s = System::with_species(vec!["Si".into()], vec![0, 0]);
        s.push_frame(
            vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
            Some([[0.0, 3.0, 0.0], [3.0, 0.0, 0.0], [0.0, 1.0, 4.0]]),
        )
        .unwrap();
        s
    }

    fn distance(a: &Vec3, b: &Vec3) -> f64 {
        norm(&[a[0] - b[0], a[1] - b[1], a[2] - b[2]])
    }

    #[test]
    fn rotation_makes_cell_lower_triangular_and_keeps_metrics() {
        let before = tilted();
        let after = PostProcess::RotLowerTriangular.apply(before.clone()).unwrap();

        let cell = after.cell(0).unwrap();
        assert_eq!(cell[0][1], 0.0);
        assert_eq!(cell[0][2], 0.0);
        assert_eq!(cell[1][2], 0.0);
        for i in 0..3 {
            let l0 = norm(&before.cell(0).unwrap()[i]);
            let l1 = norm(&cell[i]);
            assert!((l0 - l1).abs() < 1e-10);
        }
        let d0 = distance(&before.coordinates[0][0], &before.coordinates[0][1]);
        let d1 = distance(&after.coordinates[0][0], &after.coordinates[0][1]);
        assert!((d0 - d1).abs() < 1e-10);
    }

    #[test]
    fn rotation_skips_non_periodic_records() {
        let mut s = System::with_species(vec!["H".into()], vec![0]);
        s.push_frame(vec![[1.0, 2.0, 3.0]], None).unwrap();
        let out = PostProcess::RotLowerTriangular.apply(s.clone()).unwrap();
        assert_eq!(out, s);
    }

    #[test]
    fn rotation_rejects_degenerate_cell() {
        let mut s = System::with_species(vec!["H".into()], vec![0]);
        s.push_frame(vec![[0.0; 3]], Some([[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]]))
            .unwrap();
        assert!(matches!(
            PostProcess::RotLowerTriangular.apply(s),
            Err(Error::Conversion(_))
        ));
    }

    #[test]
    fn rotation_keeps_force_magnitudes() {
        let system = tilted();
        let labeled = LabeledSystem::new(
            system,
            vec![-1.0],
            vec![vec![[1.0, 0.0, 0.0], [0.0, 2.0, 0.0]]],
            None,
        )
        .unwrap();
        let out = PostProcess::RotLowerTriangular.apply(labeled).unwrap();
        assert!((norm(&out.forces[0][1]) - 2.0).abs() < 1e-12);
        assert_eq!(out.energies, vec![-1.0]);
    }

    #[test]
    fn sort_atom_types_moves_forces_with_atoms() {
        let mut system = System::with_species(vec!["O".into(), "H".into()], vec![1, 0]);
        system.push_frame(vec![[1.0, 0.0, 0.0], [0.0, 0.0, 0.0]], None).unwrap();
        let labeled = LabeledSystem::new(
            system,
            vec![0.0],
            vec![vec![[0.1, 0.0, 0.0], [0.2, 0.0, 0.0]]],
            None,
        )
        .unwrap();

        let out = PostProcess::SortAtomTypes.apply(labeled).unwrap();
        assert_eq!(out.system.atom_species_index, vec![0, 1]);
        assert_eq!(out.forces[0][0], [0.2, 0.0, 0.0]);
        assert_eq!(out.system.coordinates[0][0], [0.0, 0.0, 0.0]);
    }
}
