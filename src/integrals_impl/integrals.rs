//! Integral container, validation and the per-resolution preprocessing

use crate::error::{FciError, Result};
use crate::species::SpeciesSet;
use ndarray::{s, Array1, Array2, Array4, ArrayView, ArrayView4, Dimension};

/// Species-pair table of optional four-index blocks.
pub type TwoBodyBlocks = Vec<Vec<Option<Array4<f64>>>>;

/// One- and two-body integrals of every species in the MO basis.
#[derive(Debug, Clone)]
pub struct IntegralSet {
    pub h1: Vec<Option<Array2<f64>>>,
    pub g2: TwoBodyBlocks,
}

impl IntegralSet {
    /// Empty integral set for `nspecies` species.
    pub fn new(nspecies: usize) -> Self {
        IntegralSet {
            h1: vec![None; nspecies],
            g2: vec![vec![None; nspecies]; nspecies],
        }
    }

    pub fn nspecies(&self) -> usize {
        self.h1.len()
    }

    pub fn set_one_body(&mut self, k: usize, h1: Array2<f64>) {
        self.h1[k] = Some(h1);
    }

    pub fn set_two_body(&mut self, k: usize, l: usize, g2: Array4<f64>) {
        self.g2[k][l] = Some(g2);
    }

    pub fn one_body(&self, k: usize) -> Option<&Array2<f64>> {
        self.h1.get(k).and_then(|h| h.as_ref())
    }

    pub fn two_body(&self, k: usize, l: usize) -> Option<&Array4<f64>> {
        self.g2.get(k).and_then(|row| row.get(l)).and_then(|g| g.as_ref())
    }

    /// Check block shapes against the species set and that every species
    /// holding particles has a one-body operator.
    pub fn validate(&self, species: &SpeciesSet) -> Result<()> {
        let n = species.len();
        if self.h1.len() != n || self.g2.len() != n || self.g2.iter().any(|row| row.len() != n) {
            return Err(FciError::shape(
                "integral set",
                format!("{} species", n),
                format!("{} one-body and {} two-body rows", self.h1.len(), self.g2.len()),
            ));
        }
        for (k, sp) in species.iter().enumerate() {
            match &self.h1[k] {
                Some(h) if h.dim() != (sp.norb, sp.norb) => {
                    return Err(FciError::shape(
                        format!("h1[{}]", k),
                        (sp.norb, sp.norb),
                        h.dim(),
                    ));
                }
                None if sp.nparticle > 0 => {
                    return Err(FciError::MissingIntegral {
                        species: k,
                        block: "h1".to_string(),
                    });
                }
                _ => {}
            }
        }
        for (k, sk) in species.iter().enumerate() {
            for (l, sl) in species.iter().enumerate() {
                if let Some(g) = &self.g2[k][l] {
                    let expected = (sk.norb, sk.norb, sl.norb, sl.norb);
                    if g.dim() != expected {
                        return Err(FciError::shape(format!("g2[{}][{}]", k, l), expected, g.dim()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Diagonal of the Hamiltonian in the string basis.
    pub fn make_hdiag(&self, species: &SpeciesSet) -> Result<Array1<f64>> {
        crate::fci_impl::make_hdiag(&self.h1, Some(&self.g2), species)
    }
}

/// Inter-species block for the pair `k < l`, in whichever orientation was stored.
#[derive(Debug, Clone, Copy)]
pub enum CrossBlock<'a> {
    /// Stored as `g2[k][l]`
    Forward(&'a Array4<f64>),
    /// Stored as `g2[l][k]`
    Reverse(&'a Array4<f64>),
}

impl<'a> CrossBlock<'a> {
    /// Block indexed `[p, q, r, s]` with `(p, q)` on species `k`, `(r, s)` on species `l`.
    pub fn view(&self) -> ArrayView4<'a, f64> {
        match *self {
            CrossBlock::Forward(g) => g.view(),
            CrossBlock::Reverse(g) => g.view().permuted_axes([2, 3, 0, 1]),
        }
    }
}

/// Coupling block of the pair `k < l`; `g2[k][l]` wins when both are present.
pub(crate) fn cross_block(g2: &[Vec<Option<Array4<f64>>>], k: usize, l: usize) -> Option<CrossBlock<'_>> {
    debug_assert!(k < l);
    if let Some(g) = g2[k][l].as_ref() {
        Some(CrossBlock::Forward(g))
    } else {
        g2[l][k].as_ref().map(CrossBlock::Reverse)
    }
}

/// Row-major copy of any view as a `rows x cols` matrix (logical element order).
pub(crate) fn to_matrix<D: Dimension>(a: ArrayView<'_, f64, D>, rows: usize, cols: usize) -> Result<Array2<f64>> {
    Ok(Array2::from_shape_vec((rows, cols), a.iter().copied().collect())?)
}

/// Fold the electron one-body operator into the three electron two-body blocks.
///
/// Adds `(h1 - ½ Σ_i g[j,i,i,k]) / nelec` to every `[:, :, k, k]` and
/// `[k, k, :, :]` slice so that a pure `E·E` contraction reproduces the full
/// electronic Hamiltonian, then scales every block by `fac`.
pub fn absorb_h1e(
    h1: (&Array2<f64>, &Array2<f64>),
    g2: (&Array4<f64>, &Array4<f64>, &Array4<f64>),
    norb: usize,
    nelec: usize,
    fac: f64,
) -> (Array4<f64>, Array4<f64>, Array4<f64>) {
    let mut aa = g2.0.to_owned();
    let mut ab = g2.1.to_owned();
    let mut bb = g2.2.to_owned();

    let scale = 1.0 / (nelec as f64 + 1e-100);
    let f_a = (h1.0 - &(exchange_trace(&aa, norb) * 0.5)) * scale;
    let f_b = (h1.1 - &(exchange_trace(&bb, norb) * 0.5)) * scale;

    for k in 0..norb {
        aa.slice_mut(s![.., .., k, k]).scaled_add(1.0, &f_a);
        aa.slice_mut(s![k, k, .., ..]).scaled_add(1.0, &f_a);
        ab.slice_mut(s![.., .., k, k]).scaled_add(1.0, &f_a);
        ab.slice_mut(s![k, k, .., ..]).scaled_add(1.0, &f_b);
        bb.slice_mut(s![.., .., k, k]).scaled_add(1.0, &f_b);
        bb.slice_mut(s![k, k, .., ..]).scaled_add(1.0, &f_b);
    }
    (aa * fac, ab * fac, bb * fac)
}

// Σ_i g[j,i,i,k]
fn exchange_trace(g: &Array4<f64>, norb: usize) -> Array2<f64> {
    Array2::from_shape_fn((norb, norb), |(j, k)| (0..norb).map(|i| g[[j, i, i, k]]).sum())
}

fn one_body_or_zeros(h1: &[Option<Array2<f64>>], species: &SpeciesSet, k: usize) -> Result<Array2<f64>> {
    let sp = species.get(k)?;
    match &h1[k] {
        Some(h) => Ok(h.clone()),
        None if sp.nparticle == 0 => Ok(Array2::zeros((sp.norb, sp.norb))),
        None => Err(FciError::MissingIntegral {
            species: k,
            block: "h1".to_string(),
        }),
    }
}

/// Two-body blocks for the N-resolution contraction.
///
/// The electron blocks carry the absorbed electron one-body operator with a
/// factor ½ (each is contracted from both spin sides); every block that
/// involves a nucleus is passed through unchanged.
pub fn prepare_n_resolution(
    h1: &[Option<Array2<f64>>],
    g2: &[Vec<Option<Array4<f64>>>],
    species: &SpeciesSet,
) -> Result<TwoBodyBlocks> {
    let n = species.len();
    if n < 2 {
        return Err(FciError::shape("N-resolution species set", "two electron spins", n));
    }
    let norb = species.norb();
    let nparticle = species.nparticle();
    let ne = norb[0];
    if norb[1] != ne {
        return Err(FciError::shape("electron orbital counts", ne, norb[1]));
    }

    let zeros = Array4::<f64>::zeros((ne, ne, ne, ne));
    let h1a = one_body_or_zeros(h1, species, 0)?;
    let h1b = one_body_or_zeros(h1, species, 1)?;
    let aa = g2[0][0].as_ref().unwrap_or(&zeros);
    let ab = g2[0][1].as_ref().unwrap_or(&zeros);
    let bb = g2[1][1].as_ref().unwrap_or(&zeros);
    let (aa, ab, bb) = absorb_h1e((&h1a, &h1b), (aa, ab, bb), ne, nparticle[0] + nparticle[1], 0.5);

    let mut out: TwoBodyBlocks = vec![vec![None; n]; n];
    out[0][0] = Some(aa);
    out[0][1] = Some(ab);
    out[1][1] = Some(bb);
    for i in 0..n {
        for j in 0..n {
            if i >= 2 || j >= 2 {
                out[i][j] = g2[i][j].clone();
            }
        }
    }
    Ok(out)
}

/// Two-body blocks for the N-2-resolution contraction: same-species blocks
/// halved, inter-species blocks unchanged.
pub fn prepare_n_minus_2(g2: &[Vec<Option<Array4<f64>>>]) -> TwoBodyBlocks {
    g2.iter()
        .enumerate()
        .map(|(i, row)| {
            row.iter()
                .enumerate()
                .map(|(j, g)| g.as_ref().map(|g| if i == j { g * 0.5 } else { g.clone() }))
                .collect()
        })
        .collect()
}
