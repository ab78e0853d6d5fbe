//! AO to MO transformation of converged mean-field integrals
//!
//! Builds an [`IntegralSet`] and the matching [`SpeciesSet`] from
//! unrestricted electronic orbitals, one orbital set per quantum nucleus and
//! the raw atomic-orbital integrals.

use super::integrals::{to_matrix, IntegralSet};
use crate::error::{FciError, Result};
use crate::fci_impl::Resolution;
use crate::species::SpeciesSet;
use ndarray::{Array2, Array4};
use tracing::info;

/// Mean-field data of one quantum nucleus.
#[derive(Debug, Clone)]
pub struct NuclearMeanField {
    /// MO coefficients, `(nao_nuc, nmo_nuc)`
    pub mo_coeff: Array2<f64>,
    /// Core Hamiltonian in the nuclear AO basis
    pub hcore: Array2<f64>,
    /// Nuclear charge Z
    pub charge: f64,
    /// Unit-charge nucleus-electron repulsion `(nao_nuc, nao_nuc, nao_e, nao_e)`
    pub eri_ne: Array4<f64>,
}

/// Converged mean-field orbitals and AO integrals of a multicomponent system.
#[derive(Debug, Clone)]
pub struct MeanFieldIntegrals {
    /// Spin-up and spin-down MO coefficients, `(nao_e, nmo_e)` each
    pub mo_coeff_elec: [Array2<f64>; 2],
    pub hcore_elec: Array2<f64>,
    /// Electron repulsion `(μν|λσ)`, `(nao_e)^4`
    pub eri_elec: Array4<f64>,
    pub nuclei: Vec<NuclearMeanField>,
    /// Unit-charge nucleus-nucleus blocks keyed by `(j, i)`, `j < i`,
    /// shaped `(nao_j, nao_j, nao_i, nao_i)`
    pub eri_nn: Vec<((usize, usize), Array4<f64>)>,
}

impl MeanFieldIntegrals {
    /// Transform to the MO basis.
    ///
    /// With [`Resolution::N`] every electron block is produced. With
    /// [`Resolution::NMinus2`] blocks that cannot contribute are omitted:
    /// one-body and attraction blocks of an empty spin, same-spin repulsion
    /// with fewer than two electrons, opposite-spin repulsion unless both
    /// spins are occupied.
    pub fn assemble(
        &self,
        nelec: (usize, usize),
        layout: Resolution,
    ) -> Result<(IntegralSet, SpeciesSet)> {
        let nmo_e = self.mo_coeff_elec[0].ncols();
        if self.mo_coeff_elec[1].ncols() != nmo_e {
            return Err(FciError::shape(
                "spin-down MO coefficients",
                nmo_e,
                self.mo_coeff_elec[1].ncols(),
            ));
        }
        let norb_nuc: Vec<usize> = self.nuclei.iter().map(|n| n.mo_coeff.ncols()).collect();
        let species = SpeciesSet::electrons_and_nuclei(nmo_e, nelec, &norb_nuc);
        let mut ints = IntegralSet::new(species.len());

        let full = layout == Resolution::N;
        let occupied = [nelec.0 > 0, nelec.1 > 0];
        let [ca, cb] = &self.mo_coeff_elec;

        for (s, c) in [ca, cb].into_iter().enumerate() {
            if full || occupied[s] {
                ints.set_one_body(s, transform_one_body(&self.hcore_elec, c));
            }
        }
        if full || nelec.0 > 1 {
            ints.set_two_body(0, 0, transform_two_body(&self.eri_elec, ca, ca)?);
        }
        if full || nelec.1 > 1 {
            ints.set_two_body(1, 1, transform_two_body(&self.eri_elec, cb, cb)?);
        }
        if full || (occupied[0] && occupied[1]) {
            ints.set_two_body(0, 1, transform_two_body(&self.eri_elec, ca, cb)?);
        }

        for (i, nuc) in self.nuclei.iter().enumerate() {
            ints.set_one_body(i + 2, transform_one_body(&nuc.hcore, &nuc.mo_coeff));
            for (s, c) in [ca, cb].into_iter().enumerate() {
                if full || occupied[s] {
                    let g = transform_two_body(&nuc.eri_ne, &nuc.mo_coeff, c)? * -nuc.charge;
                    ints.set_two_body(i + 2, s, g);
                }
            }
        }

        for ((j, i), eri) in &self.eri_nn {
            let (j, i) = (*j, *i);
            if j >= i || i >= self.nuclei.len() {
                return Err(FciError::InvalidSpecies {
                    index: i + 2,
                    nspecies: species.len(),
                });
            }
            let charge = self.nuclei[j].charge * self.nuclei[i].charge;
            let g = transform_two_body(eri, &self.nuclei[j].mo_coeff, &self.nuclei[i].mo_coeff)? * charge;
            ints.set_two_body(j + 2, i + 2, g);
        }

        info!("Assembled MO integrals: norb={:?}, nparticle={:?}", species.norb(), species.nparticle());
        ints.validate(&species)?;
        Ok((ints, species))
    }
}

/// `C^T h C`
pub fn transform_one_body(h: &Array2<f64>, c: &Array2<f64>) -> Array2<f64> {
    c.t().dot(h).dot(c)
}

/// `(pq|rs) = Σ C1[μp] C1[νq] C2[λr] C2[σs] (μν|λσ)`, one index at a time.
pub fn transform_two_body(eri: &Array4<f64>, c1: &Array2<f64>, c2: &Array2<f64>) -> Result<Array4<f64>> {
    let (n1, n1b, n2, n2b) = eri.dim();
    if n1 != n1b || n2 != n2b || c1.nrows() != n1 || c2.nrows() != n2 {
        return Err(FciError::shape(
            "AO two-body block",
            (c1.nrows(), c1.nrows(), c2.nrows(), c2.nrows()),
            eri.dim(),
        ));
    }

    // Transform the leading axis, then rotate it to the back; after four
    // passes the axes are back in (p, q, r, s) order.
    let mut x = eri.clone();
    for c in [c1, c1, c2, c2] {
        let (a, b, cc, d) = x.dim();
        let m = c.ncols();
        let mat = to_matrix(x.view(), a, b * cc * d)?;
        let y = c.t().dot(&mat).into_shape((m, b, cc, d))?;
        let rotated = y.permuted_axes([1, 2, 3, 0]);
        let dim = rotated.dim();
        x = Array4::from_shape_vec(dim, rotated.iter().copied().collect())?;
    }
    Ok(x)
}
