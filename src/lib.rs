// Main library file for multicomponent NEO-FCI calculations

pub mod analysis_impl;
pub mod cistring_impl;
pub mod cneo_impl;
pub mod config;
pub mod eigen_impl;
pub mod error;
pub mod fci_impl;
pub mod integrals_impl;
pub mod io;
pub mod optim_impl;
pub mod species;
#[cfg(test)]
mod test_utils;

pub use analysis_impl::{energy_decomposition, entropy, make_rdm1, make_rdm2};
pub use cneo_impl::{CneoProblem, CneoResult, CneoSolver, ConstraintStrategy, NuclearSite};
pub use config::Config;
pub use error::{FciError, Result};
pub use fci_impl::{energy, make_hdiag, FciResult, FciSolver, Hamiltonian, Resolution};
pub use integrals_impl::{IntegralSet, MeanFieldIntegrals};
pub use species::{Species, SpeciesSet};
