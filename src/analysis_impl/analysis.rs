//! Reduced density matrices, entropies and energy decomposition

use crate::cistring_impl::{ExcitationTable, LinkTables};
use crate::error::{FciError, Result};
use crate::fci_impl::apply_table;
use crate::integrals_impl::{cross_block, to_matrix, IntegralSet};
use crate::species::SpeciesSet;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Array4, ArrayD, IxDyn};
use std::borrow::Cow;
use tracing::info;

/// Eigenvalues at or below this are treated as empty sectors.
const ENTROPY_CUTOFF: f64 = 1e-16;

fn link_table<'a>(
    species: &SpeciesSet,
    k: usize,
    link: Option<&'a LinkTables>,
) -> Result<Cow<'a, ExcitationTable>> {
    let sp = species.get(k)?;
    match link {
        Some(link) => {
            let table = link.link.get(k).ok_or(FciError::InvalidSpecies {
                index: k,
                nspecies: link.link.len(),
            })?;
            Ok(Cow::Borrowed(table))
        }
        None => Ok(Cow::Owned(ExcitationTable::single_excitation(sp.norb, sp.nparticle)?)),
    }
}

// Rows `E^k_ai c`, op index a*norb + i.
fn excited_vectors(fcivec: &Array1<f64>, k: usize, species: &SpeciesSet, link: Option<&LinkTables>) -> Result<Array2<f64>> {
    species.check_vector(fcivec.len(), "CI vector")?;
    let table = link_table(species, k, link)?;
    apply_table(&table, fcivec.view(), &species.dims(), k)
}

/// One-particle density matrix `dm[p,q] = <c|a_p^† a_q|c>` of species `k`.
pub fn make_rdm1(fcivec: &Array1<f64>, k: usize, species: &SpeciesSet, link: Option<&LinkTables>) -> Result<Array2<f64>> {
    let norb = species.get(k)?.norb;
    let t = excited_vectors(fcivec, k, species, link)?;
    Ok(t.dot(fcivec).into_shape((norb, norb))?)
}

/// Two-particle density matrix between distinct species `i` and `j`:
/// `dm[p,q,r,s] = <c|a^i†_p a^i_q a^j†_r a^j_s|c>`.
pub fn make_rdm2(
    fcivec: &Array1<f64>,
    i: usize,
    j: usize,
    species: &SpeciesSet,
    link: Option<&LinkTables>,
) -> Result<Array4<f64>> {
    species.check_index(i)?;
    species.check_index(j)?;
    if i == j {
        return Err(FciError::InvalidSpecies {
            index: j,
            nspecies: species.len(),
        });
    }
    let (ni, nj) = (species.get(i)?.norb, species.get(j)?.norb);
    let ti = excited_vectors(fcivec, i, species, link)?;
    let tj = excited_vectors(fcivec, j, species, link)?;
    // (E^i_qp c)·(E^j_rs c), rows of ti indexed (q,p)
    let m = ti.dot(&tj.t());
    let dm = m.into_shape((ni, ni, nj, nj))?.permuted_axes([1, 0, 2, 3]);
    Ok(dm.as_standard_layout().into_owned())
}

fn von_neumann(eigenvalues: impl Iterator<Item = f64>) -> f64 {
    -eigenvalues
        .filter(|&w| w > ENTROPY_CUTOFF)
        .map(|w| w * w.ln())
        .sum::<f64>()
}

/// Von Neumann entropy of the reduced density operator of the species in
/// `indices`, all other species traced out.
pub fn entropy(indices: &[usize], fcivec: &Array1<f64>, species: &SpeciesSet) -> Result<f64> {
    species.check_vector(fcivec.len(), "CI vector")?;
    let n = species.len();
    let mut kept: Vec<usize> = Vec::with_capacity(indices.len());
    for &k in indices {
        species.check_index(k)?;
        if kept.contains(&k) {
            return Err(FciError::InvalidSpecies { index: k, nspecies: n });
        }
        kept.push(k);
    }
    let dims = species.dims();
    let traced: Vec<usize> = (0..n).filter(|k| !kept.contains(k)).collect();
    let size_kept: usize = kept.iter().map(|&k| dims[k]).product();
    let size_traced: usize = traced.iter().map(|&k| dims[k]).product();

    let perm: Vec<usize> = kept.iter().chain(traced.iter()).copied().collect();
    let tensor = ArrayD::from_shape_vec(IxDyn(&dims), fcivec.to_vec())?;
    let m = to_matrix(tensor.view().permuted_axes(perm), size_kept, size_traced)?;
    let rho = m.dot(&m.t());

    let rho = DMatrix::from_fn(size_kept, size_kept, |a, b| rho[[a, b]]);
    Ok(von_neumann(rho.symmetric_eigenvalues().iter().copied()))
}

/// Per-species one-body and per-pair two-body energies.
#[derive(Debug, Clone)]
pub struct EnergyDecomposition {
    /// `Σ h1·dm1` per species, `None` without a one-body operator
    pub one_body: Vec<Option<f64>>,
    /// `Σ g2·dm2` for every distinct species pair `(k, l)`, `k < l`, with a coupling block
    pub two_body: Vec<((usize, usize), f64)>,
}

/// Split `<c|H|c>` into one-body and inter-species contributions.
pub fn energy_decomposition(
    integrals: &IntegralSet,
    fcivec: &Array1<f64>,
    species: &SpeciesSet,
    link: Option<&LinkTables>,
) -> Result<EnergyDecomposition> {
    let n = species.len();
    let mut one_body = Vec::with_capacity(n);
    for k in 0..n {
        one_body.push(match integrals.one_body(k) {
            Some(h) => {
                let dm = make_rdm1(fcivec, k, species, link)?;
                let e: f64 = h.iter().zip(dm.iter()).map(|(a, b)| a * b).sum();
                info!("1-body energy for species {}: {}", k, e);
                Some(e)
            }
            None => None,
        });
    }

    let mut two_body = Vec::new();
    for k in 0..n {
        for l in k + 1..n {
            let Some(block) = cross_block(&integrals.g2, k, l) else {
                continue;
            };
            let dm = make_rdm2(fcivec, k, l, species, link)?;
            let e: f64 = block.view().iter().zip(dm.iter()).map(|(a, b)| a * b).sum();
            info!("2-body energy between species {} and {}: {}", k, l, e);
            two_body.push(((k, l), e));
        }
    }
    Ok(EnergyDecomposition { one_body, two_body })
}

/// Natural occupations (descending) and natural orbitals of a 1-RDM.
#[derive(Debug, Clone)]
pub struct NaturalOrbitals {
    pub occupations: Array1<f64>,
    /// Columns are orbitals, expressed through `coeff` when given
    pub orbitals: Array2<f64>,
    /// `-Σ n ln n` over the occupations
    pub entropy: f64,
}

/// Diagonalize `rdm1`; with `coeff` (MO coefficients) the orbitals are
/// returned in the basis `coeff` is expressed in.
pub fn natural_orbitals(rdm1: &Array2<f64>, coeff: Option<&Array2<f64>>) -> Result<NaturalOrbitals> {
    let n = rdm1.nrows();
    if rdm1.ncols() != n {
        return Err(FciError::shape("one-particle density matrix", (n, n), rdm1.dim()));
    }
    let eig = DMatrix::from_fn(n, n, |i, j| 0.5 * (rdm1[[i, j]] + rdm1[[j, i]])).symmetric_eigen();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

    let occupations = Array1::from_iter(order.iter().map(|&i| eig.eigenvalues[i]));
    let vectors = Array2::from_shape_fn((n, n), |(row, col)| eig.eigenvectors[(row, order[col])]);
    let orbitals = match coeff {
        Some(c) => {
            if c.ncols() != n {
                return Err(FciError::shape("MO coefficients", n, c.ncols()));
            }
            c.dot(&vectors)
        }
        None => vectors,
    };
    let entropy = von_neumann(occupations.iter().copied());
    info!("Natural occupation entropy: {}", entropy);
    Ok(NaturalOrbitals {
        occupations,
        orbitals,
        entropy,
    })
}

/// AO representation `C·dm·C^T` of an MO-basis 1-RDM.
pub fn rdm1_ao(rdm1: &Array2<f64>, coeff: &Array2<f64>) -> Result<Array2<f64>> {
    if coeff.ncols() != rdm1.nrows() || rdm1.nrows() != rdm1.ncols() {
        return Err(FciError::shape("MO coefficients", rdm1.dim(), coeff.dim()));
    }
    Ok(coeff.dot(rdm1).dot(&coeff.t()))
}
