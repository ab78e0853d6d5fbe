//! Constrained nuclear-electronic orbital (CNEO) FCI
//!
//! Each quantum nucleus is held at its reference position by a Lagrange
//! multiplier field: the solver searches for forces `f_i` such that the FCI
//! ground state of `H + Σ_i f_i·r_i` has `<r_i> - R_i = 0` for every nucleus.
//!
//! The symmetry probe picks a [`ConstraintStrategy`] once:
//!
//! - identical diatomic: one scalar multiplier, Brent in a widened bracket
//! - other linear molecules: one multiplier per nucleus along the axis
//! - otherwise: a full 3-vector per nucleus
//!
//! The last two use Broyden's method. Non-convergence of either the root
//! search or the final Davidson solve is reported on [`CneoResult`], never
//! raised as an error.

mod cneo;
mod session;
mod symmetry;

pub use cneo::{CneoProblem, CneoResult, CneoSolver, ConstraintStrategy};
pub use session::{CneoSession, Evaluation};
pub use symmetry::{is_symmetric_diatomic, linear_axis, principal_moments, NuclearSite};
