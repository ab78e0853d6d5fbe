//! Root finders for the constrained nuclear-position search
//!
//! - [`brent`]: bracketed scalar root (inverse quadratic interpolation with
//!   bisection safeguard)
//! - [`Broyden`]: derivative-free multivariate root with finite-difference
//!   initial Jacobian and rank-1 updates
//!
//! Both take fallible closures, so an error raised while evaluating the
//! function (for example inside an eigensolve) aborts the search.

mod brent;
mod broyden;

pub use brent::{brent, ScalarRoot, BRENT_RTOL};
pub use broyden::{Broyden, VectorRoot};
