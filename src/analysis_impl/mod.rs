//! Analysis of converged CI vectors
//!
//! One- and two-particle reduced density matrices, subspace von Neumann
//! entropies, natural orbitals and a per-species energy decomposition.

mod analysis;

pub use analysis::{
    energy_decomposition, entropy, make_rdm1, make_rdm2, natural_orbitals, rdm1_ao,
    EnergyDecomposition, NaturalOrbitals,
};
