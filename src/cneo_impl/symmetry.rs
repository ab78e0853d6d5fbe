//! Molecular frame and the linear-molecule symmetry probe

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Coordinate tolerance when matching the molecular axis to x, y or z.
const AXIS_TOL: f64 = 1e-6;
/// Smallest-to-largest principal moment ratio below which a molecule is linear.
const LINEAR_TOL: f64 = 1e-8;

/// A nucleus of the molecular frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NuclearSite {
    pub mass: f64,
    pub position: Vector3<f64>,
    /// Nuclear basis label, `None` for a classical nucleus
    pub basis: Option<String>,
}

impl NuclearSite {
    pub fn quantum(mass: f64, position: Vector3<f64>, basis: &str) -> Self {
        NuclearSite {
            mass,
            position,
            basis: Some(basis.to_string()),
        }
    }

    pub fn classical(mass: f64, position: Vector3<f64>) -> Self {
        NuclearSite {
            mass,
            position,
            basis: None,
        }
    }
}

fn center_of_mass(atoms: &[NuclearSite]) -> Vector3<f64> {
    let total: f64 = atoms.iter().map(|a| a.mass).sum();
    atoms.iter().map(|a| a.position * a.mass).sum::<Vector3<f64>>() / total
}

/// Principal moments of inertia, ascending.
pub fn principal_moments(atoms: &[NuclearSite]) -> Vector3<f64> {
    let com = center_of_mass(atoms);
    let mut inertia = Matrix3::zeros();
    for atom in atoms {
        let r = atom.position - com;
        inertia += (Matrix3::identity() * r.dot(&r) - r * r.transpose()) * atom.mass;
    }
    let mut moments = inertia.symmetric_eigenvalues();
    moments.as_mut_slice().sort_by(|a, b| a.total_cmp(b));
    moments
}

/// Cartesian axis a linear molecule lies along, `None` when the molecule is
/// not linear or its axis is not x, y or z.
pub fn linear_axis(atoms: &[NuclearSite]) -> Option<usize> {
    if atoms.len() < 2 {
        return None;
    }
    let moments = principal_moments(atoms);
    if moments[2] <= 0.0 || moments[0] > LINEAR_TOL * moments[2] {
        info!("Not a linear molecule. Symmetry will be OFF.");
        return None;
    }

    let com = center_of_mass(atoms);
    let centered: Vec<Vector3<f64>> = atoms.iter().map(|a| a.position - com).collect();
    let on_axis = |axis: usize| {
        centered
            .iter()
            .all(|r| (0..3).filter(|&x| x != axis).all(|x| r[x].abs() < AXIS_TOL))
    };
    match (0..3).find(|&axis| on_axis(axis)) {
        Some(axis) => {
            info!("Linear molecule along axis {}", ["x", "y", "z"][axis]);
            Some(axis)
        }
        None => {
            info!("Linear molecule off the Cartesian axes. Symmetry will be OFF.");
            None
        }
    }
}

/// Two quantum nuclei of equal mass and identical nuclear basis.
pub fn is_symmetric_diatomic(atoms: &[NuclearSite]) -> bool {
    match atoms {
        [a, b] => a.mass == b.mass && a.basis.is_some() && a.basis == b.basis,
        _ => false,
    }
}
