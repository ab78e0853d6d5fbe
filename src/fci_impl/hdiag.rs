//! Diagonal of the Hamiltonian in the string basis

use crate::cistring_impl::gen_occslst;
use crate::error::{FciError, Result};
use crate::integrals_impl::cross_block;
use crate::species::{split_axis, split_two_axes, Species, SpeciesSet};
use ndarray::{s, Array1, Array2, Array4};
use std::time::Instant;
use tracing::debug;

fn occupation_lists(sp: &Species) -> Result<Vec<Vec<usize>>> {
    match sp.nparticle {
        0 => Ok(vec![Vec::new()]),
        1 => Ok((0..sp.norb).map(|p| vec![p]).collect()),
        _ => gen_occslst(sp.norb, sp.nparticle),
    }
}

/// Diagonal elements `<s|H|s>` of every string-product basis state.
///
/// `h1` entries that are absent contribute nothing; pass `g2 = None` for a
/// pure one-body diagonal (used to update a diagonal under a one-body
/// perturbation). Same-species blocks add `½ Σ (J - K)` over occupied pairs,
/// inter-species blocks add the direct term only.
pub fn make_hdiag(
    h1: &[Option<Array2<f64>>],
    g2: Option<&[Vec<Option<Array4<f64>>>]>,
    species: &SpeciesSet,
) -> Result<Array1<f64>> {
    let start = Instant::now();
    let dims = species.dims();
    let n = species.len();
    if h1.len() != n {
        return Err(FciError::shape("one-body integrals", n, h1.len()));
    }
    if let Some(g2) = g2 {
        if g2.len() != n || g2.iter().any(|row| row.len() != n) {
            return Err(FciError::shape("two-body integrals", n, g2.len()));
        }
    }
    let occ = species
        .iter()
        .map(occupation_lists)
        .collect::<Result<Vec<_>>>()?;

    let mut diag = Array1::<f64>::zeros(species.size());

    for (k, sp) in species.iter().enumerate() {
        let mut e = Array1::<f64>::zeros(dims[k]);
        if let Some(h) = &h1[k] {
            if h.dim() != (sp.norb, sp.norb) {
                return Err(FciError::shape(format!("h1[{}]", k), (sp.norb, sp.norb), h.dim()));
            }
            for (s, o) in occ[k].iter().enumerate() {
                e[s] += o.iter().map(|&p| h[[p, p]]).sum::<f64>();
            }
        }
        if let Some(g) = g2.and_then(|g2| g2[k][k].as_ref()) {
            let expected = (sp.norb, sp.norb, sp.norb, sp.norb);
            if g.dim() != expected {
                return Err(FciError::shape(format!("g2[{}][{}]", k, k), expected, g.dim()));
            }
            for (s, o) in occ[k].iter().enumerate() {
                let mut v = 0.0;
                for &p in o {
                    for &q in o {
                        v += g[[p, p, q, q]] - g[[p, q, q, p]];
                    }
                }
                e[s] += 0.5 * v;
            }
        }

        let (outer, m, inner) = split_axis(&dims, k);
        let mut d3 = diag.view_mut().into_shape((outer, m, inner))?;
        for (s, &v) in e.iter().enumerate() {
            if v != 0.0 {
                d3.slice_mut(s![.., s, ..]).mapv_inplace(|x| x + v);
            }
        }
    }

    if let Some(g2) = g2 {
        for k in 0..n {
            for l in k + 1..n {
                let Some(block) = cross_block(g2, k, l) else {
                    continue;
                };
                let (nk, nl) = (species.get(k)?.norb, species.get(l)?.norb);
                let kl = block.view();
                if kl.dim() != (nk, nk, nl, nl) {
                    return Err(FciError::shape(format!("g2 pair ({}, {})", k, l), (nk, nk, nl, nl), kl.dim()));
                }
                let j = Array2::from_shape_fn((nk, nl), |(p, q)| kl[[p, p, q, q]]);

                let (outer, mk, middle, ml, inner) = split_two_axes(&dims, k, l);
                let mut d5 = diag.view_mut().into_shape((outer, mk, middle, ml, inner))?;
                for (a, oa) in occ[k].iter().enumerate() {
                    for (b, ob) in occ[l].iter().enumerate() {
                        let v: f64 = oa.iter().flat_map(|&p| ob.iter().map(move |&q| (p, q))).map(|pq| j[pq]).sum();
                        if v != 0.0 {
                            d5.slice_mut(s![.., a, .., b, ..]).mapv_inplace(|x| x + v);
                        }
                    }
                }
            }
        }
    }

    debug!("hdiag built in {:.3?} for {} states", start.elapsed(), diag.len());
    Ok(diag)
}
