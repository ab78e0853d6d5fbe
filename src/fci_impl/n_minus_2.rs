//! Annihilation-table (N-2-resolution) sigma-vector build
//!
//! Same-species two-body terms pass through an intermediate with two
//! particles removed; inter-species terms through one particle removed from
//! each species of the pair. All intermediates are scattered back with the
//! adjoint of the table that built them.

use super::tensor::{apply, collect_adjoint};
use crate::cistring_impl::{AnnihilationTables, ExcitationTable};
use crate::error::{FciError, Result};
use crate::integrals_impl::{cross_block, to_matrix};
use crate::species::{with_axis, SpeciesSet};
use ndarray::{s, Array1, Array2, Array4, ArrayView1};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct PairMatrix {
    k: usize,
    l: usize,
    /// `W[(p,r),(q,s)] = g_kl[p,q,r,s]`
    matrix: Array2<f64>,
}

/// Matrices of the N-2-resolution contraction.
///
/// Built from prepared blocks (same-species blocks halved, see
/// [`crate::integrals_impl::prepare_n_minus_2`]).
#[derive(Debug, Clone)]
pub struct NMinus2Operator {
    species: SpeciesSet,
    one_body: Vec<Option<Array2<f64>>>,
    same: Arc<Vec<Option<Array2<f64>>>>,
    pairs: Arc<Vec<PairMatrix>>,
}

impl NMinus2Operator {
    pub fn new(
        h1: &[Option<Array2<f64>>],
        h2: &[Vec<Option<Array4<f64>>>],
        species: &SpeciesSet,
    ) -> Result<Self> {
        let n = species.len();
        if h1.len() != n || h2.len() != n || h2.iter().any(|row| row.len() != n) {
            return Err(FciError::shape(
                "N-2-resolution integrals",
                format!("{} species", n),
                format!("{} one-body and {} two-body rows", h1.len(), h2.len()),
            ));
        }

        let mut one_body = vec![None; n];
        let mut same = vec![None; n];
        for (k, sp) in species.iter().enumerate() {
            if sp.nparticle == 0 {
                continue;
            }
            match &h1[k] {
                Some(h) => one_body[k] = Some(h.clone()),
                None => {
                    return Err(FciError::MissingIntegral {
                        species: k,
                        block: "h1".to_string(),
                    })
                }
            }
            if sp.nparticle > 1 {
                let g = h2[k][k].as_ref().ok_or_else(|| FciError::MissingIntegral {
                    species: k,
                    block: format!("g2[{}][{}]", k, k),
                })?;
                let nk = sp.norb;
                // a_q then a_s removed, a_r^† then a_p^† restored
                same[k] = Some(to_matrix(g.view().permuted_axes([2, 0, 3, 1]), nk * nk, nk * nk)?);
            }
        }

        let norb = species.norb();
        let nparticle = species.nparticle();
        let mut pairs = Vec::new();
        for k in 0..n {
            for l in k + 1..n {
                if nparticle[k] == 0 || nparticle[l] == 0 {
                    continue;
                }
                let Some(block) = cross_block(h2, k, l) else {
                    continue;
                };
                let (nk, nl) = (norb[k], norb[l]);
                let matrix = to_matrix(block.view().permuted_axes([0, 2, 1, 3]), nk * nl, nk * nl)?;
                pairs.push(PairMatrix { k, l, matrix });
            }
        }
        debug!("N-2-resolution operator: {} inter-species pairs", pairs.len());

        Ok(NMinus2Operator {
            species: species.clone(),
            one_body,
            same: Arc::new(same),
            pairs: Arc::new(pairs),
        })
    }

    /// Copy with `shifts[k]` added to the one-body operator of species `k`.
    pub fn with_one_body_shift(&self, shifts: &[Option<Array2<f64>>]) -> Result<Self> {
        let mut shifted = self.clone();
        for (k, shift) in shifts.iter().enumerate() {
            let Some(shift) = shift else { continue };
            let sp = self.species.get(k)?;
            if shift.dim() != (sp.norb, sp.norb) {
                return Err(FciError::shape(format!("one-body shift {}", k), (sp.norb, sp.norb), shift.dim()));
            }
            if sp.nparticle == 0 {
                continue;
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
    pub fn apply(&self, c: ArrayView1<'_, f64>, tables: &AnnihilationTables) -> Result<Array1<f64>> {
        let species = &self.species;
        species.check_vector(c.len(), "N-2-resolution contraction")?;
        if tables.single.len() != species.len() || tables.double.len() != species.len() {
            return Err(FciError::shape("annihilation tables", species.len(), tables.single.len()));
        }
        let dims = species.dims();
        let mut out = Array1::zeros(c.len());

        for k in 0..species.len() {
            if let Some(h) = &self.one_body[k] {
                let d = single_table(tables, k)?;
                let t = apply(d, c, &dims, k)?;
                let g = h.dot(&t);
                collect_adjoint(d, g.view(), &dims, k, out.view_mut())?;
            }
            if let Some(w) = &self.same[k] {
                let dd = tables.double[k].as_ref().ok_or_else(|| {
                    FciError::shape(format!("double annihilation table {}", k), "present", "absent")
                })?;
                let t = apply(dd, c, &dims, k)?;
                let g = w.dot(&t);
                collect_adjoint(dd, g.view(), &dims, k, out.view_mut())?;
            }
        }

        for pair in self.pairs.iter() {
            let (k, l) = (pair.k, pair.l);
            let dk = single_table(tables, k)?;
            let dl = single_table(tables, l)?;
            let (nk, nl) = (dk.nops(), dl.nops());

            // t[(q,s)] = a^l_s a^k_q c
            let t1 = apply(dk, c, &dims, k)?;
            let dims1 = with_axis(&dims, k, dk.ntargets());
            let dims2 = with_axis(&dims1, l, dl.ntargets());
            let mut t = Array2::zeros((nk * nl, dims2.iter().product()));
            for q in 0..nk {
                let tq = apply(dl, t1.row(q), &dims1, l)?;
                t.slice_mut(s![q * nl..(q + 1) * nl, ..]).assign(&tq);
            }

            // g[(p,r)], restored as Σ_r a^l†_r Σ_p a^k†_p g[(p,r)]
            let g = pair.matrix.dot(&t);
            let dims_l = with_axis(&dims, l, dl.ntargets());
            let mut t2 = Array2::zeros((nl, dims_l.iter().product()));
            for r in 0..nl {
                collect_adjoint(dk, g.slice(s![r..;nl, ..]), &dims_l, k, t2.row_mut(r))?;
            }
            collect_adjoint(dl, t2.view(), &dims, l, out.view_mut())?;
        }
        Ok(out)
    }
}

fn single_table(tables: &AnnihilationTables, k: usize) -> Result<&ExcitationTable> {
    tables.single[k].as_ref().ok_or_else(|| {
        FciError::shape(format!("single annihilation table {}", k), "present", "absent")
    })
}

/// Contract prepared integrals with a CI vector.
///
/// `h2` must come from [`crate::integrals_impl::prepare_n_minus_2`].
/// Annihilation tables are built on the fly when `tables` is `None`.
pub fn contract(
    h1: &[Option<Array2<f64>>],
    h2: &[Vec<Option<Array4<f64>>>],
    fcivec: &Array1<f64>,
    species: &SpeciesSet,
    tables: Option<&AnnihilationTables>,
) -> Result<Array1<f64>> {
    let op = NMinus2Operator::new(h1, h2, species)?;
    match tables {
        Some(tables) => op.apply(fcivec.view(), tables),
        None => op.apply(fcivec.view(), &AnnihilationTables::new(species)?),
    }
}
