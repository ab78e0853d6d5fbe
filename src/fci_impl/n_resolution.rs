//! Single-excitation (N-resolution) sigma-vector build
//!
//! Every species keeps its particle number in the intermediates
//! `T_k[ai] = E^k_ai c`. Two-body terms contract these against the pair
//! blocks and are collected back through the same excitation table.

use super::tensor::{apply, collect};
use crate::cistring_impl::LinkTables;
use crate::error::{FciError, Result};
use crate::integrals_impl::{cross_block, to_matrix, CrossBlock};
use crate::species::SpeciesSet;
use ndarray::{Array1, Array2, Array4, ArrayView1};
use std::sync::Arc;
use tracing::debug;

/// Inter-species block stored as the `(norb_l², norb_k²)` matrix acting on `T_k`.
#[derive(Debug, Clone)]
struct PairMatrix {
    k: usize,
    l: usize,
    matrix: Array2<f64>,
}

/// Two-body matrices of the N-resolution contraction.
///
/// Built once from prepared blocks (electron one-body absorbed, see
/// [`crate::integrals_impl::prepare_n_resolution`]); the large matrices are
/// shared, so a copy with a shifted nuclear one-body operator is cheap.
#[derive(Debug, Clone)]
pub struct NResolutionOperator {
    species: SpeciesSet,
    electron: Arc<[Array2<f64>; 3]>,
    one_body: Vec<Option<Array2<f64>>>,
    same: Arc<Vec<Option<Array2<f64>>>>,
    pairs: Arc<Vec<PairMatrix>>,
}

impl NResolutionOperator {
    pub fn new(
        h1: &[Option<Array2<f64>>],
        h2: &[Vec<Option<Array4<f64>>>],
        species: &SpeciesSet,
    ) -> Result<Self> {
        let n = species.len();
        if n < 2 || h1.len() != n || h2.len() != n || h2.iter().any(|row| row.len() != n) {
            return Err(FciError::shape(
                "N-resolution integrals",
                format!("{} species with two electron spins", n.max(2)),
                format!("{} one-body and {} two-body rows", h1.len(), h2.len()),
            ));
        }
        let norb = species.norb();
        let nparticle = species.nparticle();
        let ne = norb[0];

        let electron_block = |k: usize, l: usize| -> Result<Array2<f64>> {
            match &h2[k][l] {
                Some(g) => to_matrix(g.view(), ne * ne, ne * ne),
                None => Ok(Array2::zeros((ne * ne, ne * ne))),
            }
        };
        let electron = Arc::new([electron_block(0, 0)?, electron_block(0, 1)?, electron_block(1, 1)?]);

        let mut one_body = vec![None; n];
        let mut same = vec![None; n];
        for k in 2..n {
            let nk = norb[k];
            let h = match &h1[k] {
                Some(h) => h.clone(),
                None if nparticle[k] == 0 => continue,
                None => {
                    return Err(FciError::MissingIntegral {
                        species: k,
                        block: "h1".to_string(),
                    })
                }
            };
            match &h2[k][k] {
                Some(g) if nparticle[k] > 1 => {
                    // E·E carries an extra one-body piece ½ Σ_q g[p,q,q,s]
                    let exchange = Array2::from_shape_fn((nk, nk), |(p, s)| {
                        (0..nk).map(|q| g[[p, q, q, s]]).sum::<f64>()
                    });
                    one_body[k] = Some(h - &(exchange * 0.5));
                    same[k] = Some(to_matrix(g.view(), nk * nk, nk * nk)? * 0.5);
                }
                _ => one_body[k] = Some(h),
            }
        }

        let mut pairs = Vec::new();
        for l in 2..n {
            for k in 0..l {
                if nparticle[k] == 0 || nparticle[l] == 0 {
                    continue;
                }
                let (nk, nl) = (norb[k], norb[l]);
                let matrix = match cross_block(h2, k, l) {
                    Some(CrossBlock::Forward(g)) => to_matrix(g.view(), nk * nk, nl * nl)?.reversed_axes(),
                    Some(CrossBlock::Reverse(g)) => to_matrix(g.view(), nl * nl, nk * nk)?,
                    None => continue,
                };
                pairs.push(PairMatrix { k, l, matrix });
            }
        }
        debug!("N-resolution operator: {} inter-species pairs", pairs.len());

        Ok(NResolutionOperator {
            species: species.clone(),
            electron,
            one_body,
            same: Arc::new(same),
            pairs: Arc::new(pairs),
        })
    }

    /// Copy with `shifts[k]` added to the one-body operator of species `k`.
    ///
    /// Electron one-body terms are folded into the electron two-body blocks
    /// here and cannot be shifted afterwards.
    pub fn with_one_body_shift(&self, shifts: &[Option<Array2<f64>>]) -> Result<Self> {
        if shifts.iter().take(2).any(|s| s.is_some()) {
            return Err(FciError::NotImplemented(
                "shifting an electron one-body operator in the N-resolution representation".to_string(),
            ));
        }
        let mut shifted = self.clone();
        for (k, shift) in shifts.iter().enumerate().skip(2) {
            let Some(shift) = shift else { continue };
            let sp = self.species.get(k)?;
            if shift.dim() != (sp.norb, sp.norb) {
                return Err(FciError::shape(format!("one-body shift {}", k), (sp.norb, sp.norb), shift.dim()));
            }
            shifted.one_body[k] = Some(match &self.one_body[k] {
                Some(h) => h + shift,
                None => shift.clone(),
            });
        }
        Ok(shifted)
    }

    pub fn species(&self) -> &SpeciesSet {
        &self.species
    }

    /// `H·c`.
    pub fn apply(&self, c: ArrayView1<'_, f64>, link: &LinkTables) -> Result<Array1<f64>> {
        let species = &self.species;
        species.check_vector(c.len(), "N-resolution contraction")?;
        if link.link.len() != species.len() {
            return Err(FciError::shape("link tables", species.len(), link.link.len()));
        }
        let dims = species.dims();
        let n = species.len();

        let t = (0..n)
            .map(|k| apply(&link.link[k], c, &dims, k))
            .collect::<Result<Vec<_>>>()?;
        let mut out = Array1::zeros(c.len());

        let [aa, ab, bb] = &*self.electron;
        let g0 = aa.dot(&t[0]) + ab.dot(&t[1]);
        collect(&link.link[0], g0.view(), &dims, 0, out.view_mut())?;
        let g1 = bb.dot(&t[1]) + ab.t().dot(&t[0]);
        collect(&link.link[1], g1.view(), &dims, 1, out.view_mut())?;

        for k in 2..n {
            if let Some(h) = &self.one_body[k] {
                let flat: Array1<f64> = h.iter().copied().collect();
                out.scaled_add(1.0, &flat.dot(&t[k]));
            }
            if let Some(w) = &self.same[k] {
                let g = w.dot(&t[k]);
                collect(&link.link[k], g.view(), &dims, k, out.view_mut())?;
            }
        }

        for pair in self.pairs.iter() {
            let g = pair.matrix.dot(&t[pair.k]);
            collect(&link.link[pair.l], g.view(), &dims, pair.l, out.view_mut())?;
        }
        Ok(out)
    }
}

/// Contract prepared integrals with a CI vector.
///
/// `h2` must come from [`crate::integrals_impl::prepare_n_resolution`].
/// Link tables are built on the fly when `link` is `None`.
pub fn contract(
    h1: &[Option<Array2<f64>>],
    h2: &[Vec<Option<Array4<f64>>>],
    fcivec: &Array1<f64>,
    species: &SpeciesSet,
    link: Option<&LinkTables>,
) -> Result<Array1<f64>> {
    let op = NResolutionOperator::new(h1, h2, species)?;
    match link {
        Some(link) => op.apply(fcivec.view(), link),
        None => op.apply(fcivec.view(), &LinkTables::new(species)?),
    }
}
