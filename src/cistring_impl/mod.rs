//! Occupation strings and excitation tables
//!
//! Each species owns a set of occupation strings (Slater determinants of
//! `nparticle` particles in `norb` orbitals). Strings are stored as `u64` bit
//! patterns and addressed densely in ascending numeric order, so the address
//! of a string is its colexicographic rank.
//!
//! Excitation tables describe how second-quantized operators move between
//! string addresses:
//!
//! - single excitation `a_p^† a_q` (N -> N)
//! - single annihilation `a_p` (N -> N-1)
//! - double annihilation `a_p a_q` (N -> N-2)
//!
//! Tables depend only on `(norb, nparticle)`, so callers build them once per
//! species set ([`LinkTables`], [`AnnihilationTables`]) and pass them to every
//! contraction.

mod strings;
mod tables;
#[cfg(test)]
mod tests;

pub use strings::{gen_occslst, gen_strings, num_strings, str2addr, MAX_ORBITALS};
pub use tables::{AnnihilationTables, ExcitationTable, LinkTables, TableKind, Transition};
