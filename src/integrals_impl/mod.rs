//! Molecular-orbital integrals of a multicomponent system
//!
//! `h1[k]` is the one-body operator of species `k` (`norb[k] x norb[k]`).
//! `g2[k][l]` is a four-index Coulomb block in chemists' notation,
//! shaped `(norb[k], norb[k], norb[l], norb[l])`:
//!
//! - `g2[k][k]` same-species repulsion, full four-index form
//! - `g2[0][1]` opposite-spin electron repulsion
//! - `g2[2+i][s]` nucleus `i` / electron spin `s` attraction (charge folded in)
//! - `g2[2+j][2+i]`, `j < i`, nucleus-nucleus repulsion
//!
//! Only one orientation of an inter-species block is stored. Contractions
//! derive scaled copies from these blocks and never modify them.

mod assembly;
mod integrals;
#[cfg(test)]
mod tests;

pub use assembly::{MeanFieldIntegrals, NuclearMeanField};
pub use integrals::{
    absorb_h1e, prepare_n_minus_2, prepare_n_resolution, CrossBlock, IntegralSet, TwoBodyBlocks,
};
pub(crate) use integrals::{cross_block, to_matrix};
