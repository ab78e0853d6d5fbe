//! Iterative eigensolver
//!
//! Davidson-Liu diagonalization of large symmetric operators that are only
//! available as a matrix-vector product, with a diagonal preconditioner.

mod davidson;

pub use davidson::{Davidson, DavidsonResult};
