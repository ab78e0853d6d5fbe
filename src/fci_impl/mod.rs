//! Full configuration interaction over several particle species
//!
//! The CI vector is a dense tensor with one axis per species (see
//! [`crate::species::SpeciesSet`]). Two contraction engines evaluate `H·c`:
//!
//! - **N-resolution**: single-excitation intermediates `E_ai c`, electron
//!   one-body operator absorbed into the electron two-body blocks
//! - **N-2-resolution**: annihilation intermediates, cheaper when most
//!   species hold a single particle
//!
//! Both give the same `H·c` for the same integrals.
//!
//! # Usage
//!
//! ```rust,ignore
//! use neo_fci::{FciSolver, Resolution};
//!
//! let solver = FciSolver::new(Resolution::N, 1);
//! let result = solver.kernel(&integrals, &species, ecore, None, None)?;
//! println!("E = {}", result.energies[0]);
//! ```

mod fci;
mod hdiag;
pub mod n_minus_2;
pub mod n_resolution;
mod tensor;

pub use fci::{energy, initial_guess, FciResult, FciSolver, Hamiltonian, Resolution};
pub use hdiag::make_hdiag;
pub use n_minus_2::NMinus2Operator;
pub use n_resolution::NResolutionOperator;
pub(crate) use tensor::apply as apply_table;
