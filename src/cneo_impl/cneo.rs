//! Constrained nuclear-electronic orbital FCI

use super::session::{CneoSession, Evaluation};
use super::symmetry::{is_symmetric_diatomic, linear_axis, NuclearSite};
use crate::config::Config;
use crate::error::{FciError, Result};
use crate::fci_impl::FciSolver;
use crate::integrals_impl::IntegralSet;
use crate::optim_impl::{brent, Broyden};
use crate::species::SpeciesSet;
use nalgebra::{DVector, Vector3};
use ndarray::{Array1, Array2};
use std::fmt;
use tracing::{info, warn};

/// Below this initial multiplier the bracket is scaled from the guess itself.
const SMALL_MULTIPLIER: f64 = 1e-3;
/// Bracket scale used when the initial multiplier is exactly zero.
const ZERO_MULTIPLIER_SCALE: f64 = 1e-4;
/// Bracket widening step for ordinary initial multipliers.
const BRACKET_STEP: f64 = 0.1;

/// Multicomponent system with position operators for the quantum nuclei.
#[derive(Debug, Clone)]
pub struct CneoProblem {
    pub integrals: IntegralSet,
    pub species: SpeciesSet,
    pub ecore: f64,
    /// `r_i - R_i` (x, y, z) in the orbital basis of nucleus `i`
    pub position: Vec<[Array2<f64>; 3]>,
    /// Every nucleus of the molecule, used by the symmetry probe
    pub atoms: Vec<NuclearSite>,
    /// Starting force field, typically the mean-field multipliers
    pub initial_forces: Vec<Vector3<f64>>,
}

impl CneoProblem {
    pub(crate) fn validate(&self) -> Result<()> {
        let nnuc = self.species.nuclear_count();
        if self.position.len() != nnuc {
            return Err(FciError::shape("position operators", nnuc, self.position.len()));
        }
        if self.initial_forces.len() != nnuc {
            return Err(FciError::shape("initial force field", nnuc, self.initial_forces.len()));
        }
        for (i, r1) in self.position.iter().enumerate() {
            let norb = self.species.get(2 + i)?.norb;
            for (x, r) in r1.iter().enumerate() {
                if r.dim() != (norb, norb) {
                    return Err(FciError::shape(
                        format!("position operator {} of nucleus {}", ["x", "y", "z"][x], i),
                        (norb, norb),
                        r.dim(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// How the force field is parametrised during the root search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintStrategy {
    /// No constraint: a single FCI solve at zero force
    Unconstrained,
    /// Identical diatomic: one multiplier `f`, forces `+f` and `-f` along `axis`
    SymmetricScalar { axis: usize },
    /// Linear molecule: one multiplier per nucleus along `axis`
    SymmetricVector { axis: usize },
    /// Full 3-vector per nucleus
    Unsymmetric,
}

impl fmt::Display for ConstraintStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintStrategy::Unconstrained => write!(f, "unconstrained"),
            ConstraintStrategy::SymmetricScalar { axis } => write!(f, "symmetric scalar (axis {})", axis),
            ConstraintStrategy::SymmetricVector { axis } => write!(f, "symmetric vector (axis {})", axis),
            ConstraintStrategy::Unsymmetric => write!(f, "unsymmetric"),
        }
    }
}

impl ConstraintStrategy {
    /// Symmetry probe.
    pub fn select(atoms: &[NuclearSite], nuclear_count: usize, use_symmetry: bool) -> Self {
        if nuclear_count == 0 || atoms.len() < 2 {
            return ConstraintStrategy::Unconstrained;
        }
        if !use_symmetry {
            return ConstraintStrategy::Unsymmetric;
        }
        match linear_axis(atoms) {
            Some(axis) if nuclear_count == 2 && is_symmetric_diatomic(atoms) => {
                ConstraintStrategy::SymmetricScalar { axis }
            }
            Some(axis) => ConstraintStrategy::SymmetricVector { axis },
            None => ConstraintStrategy::Unsymmetric,
        }
    }

    /// Number of free multipliers.
    pub fn unknowns(&self, nnuc: usize) -> usize {
        match self {
            ConstraintStrategy::Unconstrained => 0,
            ConstraintStrategy::SymmetricScalar { .. } => 1,
            ConstraintStrategy::SymmetricVector { .. } => nnuc,
            ConstraintStrategy::Unsymmetric => 3 * nnuc,
        }
    }

    /// Force field from free multipliers.
    pub fn expand(&self, params: &[f64], nnuc: usize) -> Vec<Vector3<f64>> {
        let mut forces = vec![Vector3::zeros(); nnuc];
        match *self {
            ConstraintStrategy::Unconstrained => {}
            ConstraintStrategy::SymmetricScalar { axis } => {
                if let (Some(&f), 2) = (params.first(), nnuc) {
                    forces[0][axis] = f;
                    forces[1][axis] = -f;
                }
            }
            ConstraintStrategy::SymmetricVector { axis } => {
                for (force, &p) in forces.iter_mut().zip(params) {
                    force[axis] = p;
                }
            }
            ConstraintStrategy::Unsymmetric => {
                for (force, p) in forces.iter_mut().zip(params.chunks(3)) {
                    for (x, &v) in p.iter().enumerate() {
                        force[x] = v;
                    }
                }
            }
        }
        forces
    }

    /// Free multipliers of a force field; the quantities constrained to zero
    /// are read from a displacement the same way.
    pub fn project(&self, vectors: &[Vector3<f64>]) -> Vec<f64> {
        match *self {
            ConstraintStrategy::Unconstrained => Vec::new(),
            ConstraintStrategy::SymmetricScalar { axis } => vectors.first().map(|v| vec![v[axis]]).unwrap_or_default(),
            ConstraintStrategy::SymmetricVector { axis } => vectors.iter().map(|v| v[axis]).collect(),
            ConstraintStrategy::Unsymmetric => vectors.iter().flat_map(|v| v.iter().copied()).collect(),
        }
    }
}

/// Outcome of [`CneoSolver::kernel`].
#[derive(Debug, Clone)]
pub struct CneoResult {
    /// `<c|H|c> + ecore` with the unperturbed Hamiltonian
    pub energy: f64,
    /// Lowest eigenvalue of the perturbed Hamiltonian plus `ecore`
    pub eigenvalue: f64,
    /// `energy - eigenvalue`
    pub energy_difference: f64,
    pub vector: Array1<f64>,
    pub forces: Vec<Vector3<f64>>,
    pub displacement: Vec<Vector3<f64>>,
    pub max_displacement: f64,
    /// Root search and final Davidson solve both converged
    pub converged: bool,
    pub davidson_converged: bool,
    pub strategy: ConstraintStrategy,
    pub evaluations: usize,
    pub message: String,
}

struct Search {
    params: Vec<f64>,
    converged: bool,
    message: String,
}

/// Lagrange-multiplier loop holding every quantum nucleus at its reference position.
#[derive(Debug, Clone)]
pub struct CneoSolver {
    pub fci: FciSolver,
    /// Reduce the unknowns for linear molecules
    pub symmetry: bool,
    /// Converged when every constrained `|dr|` is below this
    pub position_tol: f64,
    /// Multiplier tolerance of the scalar root search
    pub root_xtol: f64,
    pub max_bracket_expansions: usize,
    pub max_root_iterations: usize,
    /// Relative function error for the multivariate finite-difference Jacobian
    pub finite_difference_eps: f64,
}

impl Default for CneoSolver {
    fn default() -> Self {
        CneoSolver {
            fci: FciSolver::default(),
            symmetry: true,
            position_tol: 1e-6,
            root_xtol: 1e-6,
            max_bracket_expansions: 50,
            max_root_iterations: 100,
            finite_difference_eps: 1e-2,
        }
    }
}

impl CneoSolver {
    pub fn new(fci: FciSolver) -> Self {
        CneoSolver {
            fci,
            ..Default::default()
        }
    }

    pub fn from_config(config: &Config) -> color_eyre::eyre::Result<Self> {
        let params = config.cneo();
        let defaults = Self::default();
        Ok(CneoSolver {
            fci: FciSolver::from_config(config)?,
            symmetry: params.symmetry.unwrap_or(defaults.symmetry),
            position_tol: params.position_tol.unwrap_or(defaults.position_tol),
            root_xtol: params.root_xtol.unwrap_or(defaults.root_xtol),
            max_bracket_expansions: params
                .max_bracket_expansions
                .unwrap_or(defaults.max_bracket_expansions),
            max_root_iterations: params.max_root_iterations.unwrap_or(defaults.max_root_iterations),
            finite_difference_eps: params
                .finite_difference_eps
                .unwrap_or(defaults.finite_difference_eps),
        })
    }

    /// Ground state with every nuclear expectation position held at its reference.
    pub fn kernel(&self, problem: &CneoProblem) -> Result<CneoResult> {
        let mut session = CneoSession::new(problem, &self.fci)?;
        let nnuc = session.nuclear_count();
        let strategy = ConstraintStrategy::select(&problem.atoms, nnuc, self.symmetry);
        info!("CNEO strategy: {}", strategy);

        let search = match strategy {
            ConstraintStrategy::Unconstrained => {
                session.position_analysis(&vec![Vector3::zeros(); nnuc])?;
                Search {
                    params: Vec::new(),
                    converged: true,
                    message: "no constraint".to_string(),
                }
            }
            ConstraintStrategy::SymmetricScalar { .. } => self.solve_scalar(&mut session, strategy, problem)?,
            _ => self.solve_vector(&mut session, strategy, problem)?,
        };
        info!("CNEO root search: {}", search.message);

        let forces = strategy.expand(&search.params, nnuc);
        let stale = session.last().map_or(true, |last| last.forces != forces);
        if stale {
            session.position_analysis(&forces)?;
        }
        let Some(last) = session.last().cloned() else {
            return Err(FciError::shape("CNEO evaluations", "at least one", 0));
        };
        self.finish(&session, last, strategy, search)
    }

    fn finish(
        &self,
        session: &CneoSession<'_>,
        last: Evaluation,
        strategy: ConstraintStrategy,
        search: Search,
    ) -> Result<CneoResult> {
        let ecore = session.ecore();
        let energy = session.base().energy(&last.vector)? + ecore;
        let eigenvalue = last.eigenvalue + ecore;
        info!("CNEO eigenvalue of the perturbed Hamiltonian: {:.12}", eigenvalue);
        info!("CNEO energy: {:.12}", energy);
        info!("CNEO energy difference: {:.3e}", energy - eigenvalue);
        let max_displacement = last.max_displacement();
        if !(search.converged && last.davidson_converged) {
            warn!("CNEO not converged: {}", search.message);
        }
        Ok(CneoResult {
            energy,
            eigenvalue,
            energy_difference: energy - eigenvalue,
            converged: search.converged && last.davidson_converged,
            davidson_converged: last.davidson_converged,
            max_displacement,
            vector: last.vector,
            forces: last.forces,
            displacement: last.displacement,
            strategy,
            evaluations: session.evaluations(),
            message: search.message,
        })
    }

    fn solve_scalar(
        &self,
        session: &mut CneoSession<'_>,
        strategy: ConstraintStrategy,
        problem: &CneoProblem,
    ) -> Result<Search> {
        let f0 = strategy.project(&problem.initial_forces).first().copied().unwrap_or(0.0);
        let dr0 = scalar_displacement(session, strategy, f0)?;
        if dr0.abs() < self.position_tol {
            return Ok(Search {
                params: vec![f0],
                converged: true,
                message: "initial multiplier satisfies the constraint".to_string(),
            });
        }

        let (mut a, mut b, step, mut da, mut db) = if f0.abs() < SMALL_MULTIPLIER {
            let scale = if f0 == 0.0 { ZERO_MULTIPLIER_SCALE } else { f0.abs() };
            let (a, b) = if f0 >= 0.0 { (0.0, 10.0 * scale) } else { (-10.0 * scale, 0.0) };
            let da = scalar_displacement(session, strategy, a)?;
            let db = scalar_displacement(session, strategy, b)?;
            (a, b, 100.0 * scale, da, db)
        } else if f0 > 0.0 {
            let da = scalar_displacement(session, strategy, 0.0)?;
            (0.0, f0, BRACKET_STEP, da, dr0)
        } else {
            let db = scalar_displacement(session, strategy, 0.0)?;
            (f0, 0.0, BRACKET_STEP, dr0, db)
        };

        let mut expansions = 0;
        while da * db > 0.0 {
            if expansions == self.max_bracket_expansions {
                let message = format!(
                    "no sign change of the displacement in [{}, {}] after {} expansions",
                    a, b, expansions
                );
                return Ok(Self::best_effort(session, strategy, message));
            }
            a -= step;
            b += step;
            da = scalar_displacement(session, strategy, a)?;
            db = scalar_displacement(session, strategy, b)?;
            expansions += 1;
        }
        info!("CNEO bracket: [{}, {}]", a, b);

        let root = brent(
            |f| scalar_displacement(session, strategy, f),
            (a, da),
            (b, db),
            self.root_xtol,
            self.max_root_iterations,
        )?;
        Ok(Search {
            params: vec![root.root],
            converged: root.converged,
            message: root.message,
        })
    }

    fn solve_vector(
        &self,
        session: &mut CneoSession<'_>,
        strategy: ConstraintStrategy,
        problem: &CneoProblem,
    ) -> Result<Search> {
        let x0 = DVector::from_vec(strategy.project(&problem.initial_forces));
        let dr0 = vector_displacement(session, strategy, &x0)?;
        if dr0.amax() < self.position_tol {
            return Ok(Search {
                params: x0.as_slice().to_vec(),
                converged: true,
                message: "initial multipliers satisfy the constraint".to_string(),
            });
        }
        let zeros = DVector::zeros(x0.len());
        let dr1 = vector_displacement(session, strategy, &zeros)?;
        if dr1.amax() < self.position_tol {
            return Ok(Search {
                params: zeros.as_slice().to_vec(),
                converged: true,
                message: "zero multipliers satisfy the constraint".to_string(),
            });
        }
        let (start, f_start) = if dr1.amax() < dr0.amax() { (zeros, dr1) } else { (x0, dr0) };

        let broyden = Broyden {
            ftol: self.position_tol,
            max_iterations: self.max_root_iterations,
            eps: self.finite_difference_eps,
            ..Default::default()
        };
        let root = broyden.solve(|x| vector_displacement(session, strategy, x), start, Some(f_start))?;
        Ok(Search {
            params: root.x.as_slice().to_vec(),
            converged: root.converged,
            message: root.message,
        })
    }

    fn best_effort(session: &CneoSession<'_>, strategy: ConstraintStrategy, message: String) -> Search {
        warn!("CNEO: {}", message);
        let params = session
            .best()
            .map(|best: &Evaluation| strategy.project(&best.forces))
            .unwrap_or_default();
        Search {
            params,
            converged: false,
            message,
        }
    }
}

fn scalar_displacement(session: &mut CneoSession<'_>, strategy: ConstraintStrategy, f: f64) -> Result<f64> {
    let nnuc = session.nuclear_count();
    let dr = session.position_analysis(&strategy.expand(&[f], nnuc))?;
    Ok(strategy.project(&dr).first().copied().unwrap_or(0.0))
}

fn vector_displacement(
    session: &mut CneoSession<'_>,
    strategy: ConstraintStrategy,
    x: &DVector<f64>,
) -> Result<DVector<f64>> {
    let nnuc = session.nuclear_count();
    let dr = session.position_analysis(&strategy.expand(x.as_slice(), nnuc))?;
    Ok(DVector::from_vec(strategy.project(&dr)))
}
