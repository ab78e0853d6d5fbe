//! Hamiltonian operator and the FCI eigensolver driver

use super::n_minus_2::NMinus2Operator;
use super::n_resolution::NResolutionOperator;
use crate::cistring_impl::{AnnihilationTables, LinkTables};
use crate::config::Config;
use crate::eigen_impl::Davidson;
use crate::error::{FciError, Result};
use crate::integrals_impl::{prepare_n_minus_2, prepare_n_resolution, IntegralSet};
use crate::species::SpeciesSet;
use ndarray::{Array1, Array2};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Contraction algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Single-excitation intermediates, particle numbers kept
    N,
    /// Annihilation intermediates, two particles removed
    NMinus2,
}

impl FromStr for Resolution {
    type Err = color_eyre::eyre::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "n" => Ok(Self::N),
            "n-2" | "n2" | "nminus2" => Ok(Self::NMinus2),
            _ => Err(color_eyre::eyre::eyre!("Unknown resolution: {}", s)),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::N => write!(f, "N"),
            Resolution::NMinus2 => write!(f, "N-2"),
        }
    }
}

#[derive(Debug, Clone)]
enum Operator {
    N {
        op: NResolutionOperator,
        link: Arc<LinkTables>,
    },
    NMinus2 {
        op: NMinus2Operator,
        tables: Arc<AnnihilationTables>,
    },
}

/// Hamiltonian of a species set, ready for repeated contractions.
///
/// Holds the prepared two-body matrices and the excitation tables, both
/// shared between copies produced by [`Hamiltonian::perturbed`].
#[derive(Debug, Clone)]
pub struct Hamiltonian {
    species: SpeciesSet,
    operator: Operator,
}

impl Hamiltonian {
    pub fn new(integrals: &IntegralSet, species: &SpeciesSet, resolution: Resolution) -> Result<Self> {
        integrals.validate(species)?;
        let operator = match resolution {
            Resolution::N => {
                let h2 = prepare_n_resolution(&integrals.h1, &integrals.g2, species)?;
                Operator::N {
                    op: NResolutionOperator::new(&integrals.h1, &h2, species)?,
                    link: Arc::new(LinkTables::new(species)?),
                }
            }
            Resolution::NMinus2 => {
                let h2 = prepare_n_minus_2(&integrals.g2);
                Operator::NMinus2 {
                    op: NMinus2Operator::new(&integrals.h1, &h2, species)?,
                    tables: Arc::new(AnnihilationTables::new(species)?),
                }
            }
        };
        Ok(Hamiltonian {
            species: species.clone(),
            operator,
        })
    }

    pub fn species(&self) -> &SpeciesSet {
        &self.species
    }

    pub fn resolution(&self) -> Resolution {
        match self.operator {
            Operator::N { .. } => Resolution::N,
            Operator::NMinus2 { .. } => Resolution::NMinus2,
        }
    }

    /// `H·c`
    pub fn contract(&self, c: &Array1<f64>) -> Result<Array1<f64>> {
        match &self.operator {
            Operator::N { op, link } => op.apply(c.view(), link),
            Operator::NMinus2 { op, tables } => op.apply(c.view(), tables),
        }
    }

    /// `<c|H|c>` without normalisation or core energy.
    pub fn energy(&self, c: &Array1<f64>) -> Result<f64> {
        Ok(c.dot(&self.contract(c)?))
    }

    /// Same Hamiltonian with `shifts[k]` added to the one-body operator of species `k`.
    pub fn perturbed(&self, shifts: &[Option<Array2<f64>>]) -> Result<Self> {
        if shifts.len() != self.species.len() {
            return Err(FciError::shape("one-body shifts", self.species.len(), shifts.len()));
        }
        let operator = match &self.operator {
            Operator::N { op, link } => Operator::N {
                op: op.with_one_body_shift(shifts)?,
                link: Arc::clone(link),
            },
            Operator::NMinus2 { op, tables } => Operator::NMinus2 {
                op: op.with_one_body_shift(shifts)?,
                tables: Arc::clone(tables),
            },
        };
        Ok(Hamiltonian {
            species: self.species.clone(),
            operator,
        })
    }
}

/// `<c|H|c> + ecore` with the Hamiltonian built from raw integrals.
pub fn energy(
    integrals: &IntegralSet,
    fcivec: &Array1<f64>,
    species: &SpeciesSet,
    resolution: Resolution,
    ecore: f64,
) -> Result<f64> {
    let ham = Hamiltonian::new(integrals, species, resolution)?;
    Ok(ham.energy(fcivec)? + ecore)
}

/// Eigenpairs returned by [`FciSolver::kernel`], lowest first.
#[derive(Debug, Clone)]
pub struct FciResult {
    pub converged: Vec<bool>,
    pub energies: Vec<f64>,
    pub vectors: Vec<Array1<f64>>,
}

impl FciResult {
    pub fn all_converged(&self) -> bool {
        self.converged.iter().all(|&c| c)
    }
}

/// FCI driver: Davidson iterations over the contraction engine.
#[derive(Debug, Clone)]
pub struct FciSolver {
    pub resolution: Resolution,
    pub davidson: Davidson,
}

impl Default for FciSolver {
    fn default() -> Self {
        FciSolver {
            resolution: Resolution::N,
            davidson: Davidson::default(),
        }
    }
}

impl FciSolver {
    pub fn new(resolution: Resolution, nroots: usize) -> Self {
        FciSolver {
            resolution,
            davidson: Davidson::new(nroots),
        }
    }

    pub fn from_config(config: &Config) -> color_eyre::eyre::Result<Self> {
        Ok(FciSolver {
            resolution: config.resolution()?,
            davidson: config.davidson(),
        })
    }

    /// Lowest eigenpairs of the Hamiltonian, energies including `ecore`.
    ///
    /// `hdiag` is computed from `integrals` when not supplied; `ci0`
    /// replaces the lowest-diagonal unit-vector guesses.
    pub fn kernel(
        &self,
        integrals: &IntegralSet,
        species: &SpeciesSet,
        ecore: f64,
        ci0: Option<Vec<Array1<f64>>>,
        hdiag: Option<&Array1<f64>>,
    ) -> Result<FciResult> {
        let ham = Hamiltonian::new(integrals, species, self.resolution)?;
        let owned;
        let hdiag = match hdiag {
            Some(h) => h,
            None => {
                owned = integrals.make_hdiag(species)?;
                &owned
            }
        };
        let mut result = self.solve(&ham, hdiag, ci0)?;
        result.energies.iter_mut().for_each(|e| *e += ecore);
        Ok(result)
    }

    /// Davidson solve for a prepared Hamiltonian; energies exclude any core energy.
    pub fn solve(&self, ham: &Hamiltonian, hdiag: &Array1<f64>, ci0: Option<Vec<Array1<f64>>>) -> Result<FciResult> {
        let species = ham.species();
        species.check_vector(hdiag.len(), "Hamiltonian diagonal")?;
        info!(
            "FCI ({} resolution): vector shape {:?}, dimension {}",
            ham.resolution(),
            species.dims(),
            hdiag.len()
        );

        let guesses = match ci0 {
            Some(vectors) if !vectors.is_empty() => {
                for v in &vectors {
                    species.check_vector(v.len(), "initial CI vector")?;
                }
                vectors
            }
            _ => initial_guess(hdiag, self.davidson.nroots),
        };

        let precond = self.davidson.diagonal_preconditioner(hdiag);
        let result = self.davidson.solve(|x| ham.contract(x), precond, guesses)?;
        if result.all_converged() {
            info!("FCI converged");
        } else {
            warn!("FCI not converged");
        }
        Ok(FciResult {
            converged: result.converged,
            energies: result.eigenvalues,
            vectors: result.eigenvectors,
        })
    }
}

/// Unit vectors on the `nroots` smallest diagonal elements.
pub fn initial_guess(hdiag: &Array1<f64>, nroots: usize) -> Vec<Array1<f64>> {
    let n = hdiag.len();
    let nroots = nroots.min(n);
    if nroots == 0 {
        return Vec::new();
    }
    let mut addr: Vec<usize> = (0..n).collect();
    addr.select_nth_unstable_by(nroots - 1, |&a, &b| hdiag[a].total_cmp(&hdiag[b]));
    addr.truncate(nroots);
    addr.sort_by(|&a, &b| hdiag[a].total_cmp(&hdiag[b]));
    info!(
        "Initial guess diagonal values: {:?}",
        addr.iter().map(|&a| hdiag[a]).collect::<Vec<_>>()
    );
    addr.into_iter()
        .map(|a| {
            let mut v = Array1::zeros(n);
            v[a] = 1.0;
            v
        })
        .collect()
}
