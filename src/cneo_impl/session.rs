//! Warm-started evaluation of nuclear displacements under a force field

use super::CneoProblem;
use crate::analysis_impl::make_rdm1;
use crate::cistring_impl::LinkTables;
use crate::error::{FciError, Result};
use crate::fci_impl::{make_hdiag, FciSolver, Hamiltonian};
use nalgebra::Vector3;
use ndarray::{Array1, Array2};
use tracing::info;

/// One solve of the perturbed Hamiltonian.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Force field `f_i` per quantum nucleus
    pub forces: Vec<Vector3<f64>>,
    /// `<r_i> - R_i` per quantum nucleus
    pub displacement: Vec<Vector3<f64>>,
    /// Lowest eigenvalue of the perturbed Hamiltonian, core energy excluded
    pub eigenvalue: f64,
    pub vector: Array1<f64>,
    pub davidson_converged: bool,
}

impl Evaluation {
    pub fn max_displacement(&self) -> f64 {
        self.displacement
            .iter()
            .fold(0.0f64, |m, dr| m.max(dr.amax()))
    }
}

/// State carried between displacement evaluations of one constrained solve.
///
/// Every evaluation starts Davidson from the vectors of the previous one and
/// builds its diagonal as the unperturbed diagonal plus the diagonal of the
/// force-field term. Lives for a single [`super::CneoSolver::kernel`] call.
pub struct CneoSession<'a> {
    problem: &'a CneoProblem,
    fci: &'a FciSolver,
    base: Hamiltonian,
    base_hdiag: Array1<f64>,
    link: LinkTables,
    last_vectors: Option<Vec<Array1<f64>>>,
    last: Option<Evaluation>,
    best: Option<Evaluation>,
    evaluations: usize,
}

impl<'a> CneoSession<'a> {
    pub fn new(problem: &'a CneoProblem, fci: &'a FciSolver) -> Result<Self> {
        problem.validate()?;
        let base = Hamiltonian::new(&problem.integrals, &problem.species, fci.resolution)?;
        let base_hdiag = problem.integrals.make_hdiag(&problem.species)?;
        let link = LinkTables::new(&problem.species)?;
        Ok(CneoSession {
            problem,
            fci,
            base,
            base_hdiag,
            link,
            last_vectors: None,
            last: None,
            best: None,
            evaluations: 0,
        })
    }

    pub fn base(&self) -> &Hamiltonian {
        &self.base
    }

    pub fn nuclear_count(&self) -> usize {
        self.problem.species.nuclear_count()
    }

    pub fn ecore(&self) -> f64 {
        self.problem.ecore
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Most recent evaluation.
    pub fn last(&self) -> Option<&Evaluation> {
        self.last.as_ref()
    }

    /// Evaluation with the smallest `max |dr|` so far.
    pub fn best(&self) -> Option<&Evaluation> {
        self.best.as_ref()
    }

    fn shifts(&self, forces: &[Vector3<f64>]) -> Vec<Option<Array2<f64>>> {
        let mut shifts = vec![None; self.problem.species.len()];
        for (i, (f, r1)) in forces.iter().zip(&self.problem.position).enumerate() {
            let mut v = &r1[0] * f.x;
            v.scaled_add(f.y, &r1[1]);
            v.scaled_add(f.z, &r1[2]);
            shifts[2 + i] = Some(v);
        }
        shifts
    }

    /// Solve with `f_i·r_i` added to each nucleus and return `<r_i> - R_i`.
    pub fn position_analysis(&mut self, forces: &[Vector3<f64>]) -> Result<Vec<Vector3<f64>>> {
        let nnuc = self.nuclear_count();
        if forces.len() != nnuc {
            return Err(FciError::shape("force field", nnuc, forces.len()));
        }
        let shifts = self.shifts(forces);
        let ham = self.base.perturbed(&shifts)?;
        let hdiag = &self.base_hdiag + &make_hdiag(&shifts, None, &self.problem.species)?;
        let result = self.fci.solve(&ham, &hdiag, self.last_vectors.take())?;
        let (Some(&eigenvalue), Some(vector)) = (result.energies.first(), result.vectors.first()) else {
            return Err(FciError::shape("FCI solution", "at least one root", 0));
        };
        let vector = vector.clone();

        let mut displacement = Vec::with_capacity(nnuc);
        for (i, r1) in self.problem.position.iter().enumerate() {
            let dm = make_rdm1(&vector, 2 + i, &self.problem.species, Some(&self.link))?;
            let dr = Vector3::from_fn(|x, _| (&r1[x] * &dm).sum());
            displacement.push(dr);
        }

        let evaluation = Evaluation {
            forces: forces.to_vec(),
            displacement: displacement.clone(),
            eigenvalue,
            vector,
            davidson_converged: result.converged.first().copied().unwrap_or(false),
        };
        self.evaluations += 1;
        info!(
            "CNEO| f = {:?}; e = {:.12}; max|dr| = {:.3e}",
            forces.iter().map(|f| [f.x, f.y, f.z]).collect::<Vec<_>>(),
            eigenvalue + self.problem.ecore,
            evaluation.max_displacement()
        );

        let improved = self
            .best
            .as_ref()
            .map_or(true, |b| evaluation.max_displacement() < b.max_displacement());
        if improved {
            self.best = Some(evaluation.clone());
        }
        self.last_vectors = Some(result.vectors);
        self.last = Some(evaluation);
        Ok(displacement)
    }
}
