//! Block Davidson-Liu solver for the lowest eigenpairs of a symmetric operator

use nalgebra::DMatrix;
use ndarray::Array1;
use tracing::{debug, info};

/// Davidson-Liu iteration settings.
#[derive(Debug, Clone)]
pub struct Davidson {
    pub nroots: usize,
    pub max_cycle: usize,
    /// Subspace size before a restart (grown by 3 per extra root)
    pub max_space: usize,
    /// Memory budget of the subspace in MB
    pub max_memory: usize,
    /// Eigenvalue change threshold
    pub conv_tol: f64,
    /// Residual norm threshold
    pub residual_tol: f64,
    /// Squared-norm threshold below which a correction vector is dropped
    pub lindep: f64,
    /// Preconditioner shift `ε` in `r / (hdiag - e + ε)`
    pub level_shift: f64,
}

impl Default for Davidson {
    fn default() -> Self {
        Davidson {
            nroots: 1,
            max_cycle: 100,
            max_space: 12,
            max_memory: 256000,
            conv_tol: 1e-12,
            residual_tol: 1e-6,
            lindep: 1e-14,
            level_shift: 1e-4,
        }
    }
}

/// Eigenpairs found by [`Davidson::solve`], lowest first.
#[derive(Debug, Clone)]
pub struct DavidsonResult {
    pub converged: Vec<bool>,
    pub eigenvalues: Vec<f64>,
    pub eigenvectors: Vec<Array1<f64>>,
    pub iterations: usize,
}

impl DavidsonResult {
    pub fn all_converged(&self) -> bool {
        self.converged.iter().all(|&c| c)
    }
}

impl Davidson {
    pub fn new(nroots: usize) -> Self {
        Davidson {
            nroots,
            ..Default::default()
        }
    }

    /// Diagonal preconditioner `x / (diag - e + level_shift)`.
    pub fn diagonal_preconditioner<'a>(&self, diag: &'a Array1<f64>) -> impl Fn(&Array1<f64>, f64) -> Array1<f64> + 'a {
        let shift = self.level_shift;
        move |x, e| {
            let mut y = x.clone();
            y.zip_mut_with(diag, |yi, &d| {
                let mut denom = d - e + shift;
                if denom.abs() < 1e-8 {
                    denom = 1e-8f64.copysign(denom);
                }
                *yi /= denom;
            });
            y
        }
    }

    fn space_limit(&self, dim: usize, nroots: usize) -> usize {
        let by_space = self.max_space + (nroots - 1) * 3;
        // trial vectors and their images, 8 bytes per element
        let by_memory = (self.max_memory as f64 * 1e6 / (16.0 * dim.max(1) as f64)) as usize;
        by_space.min(by_memory).max(2 * nroots).min(dim)
    }

    /// Lowest `nroots` eigenpairs of the operator applied by `matvec`.
    ///
    /// `precond(r, e)` maps a residual to a correction vector. Guesses are
    /// orthonormalised; when none survives, unit vectors are used.
    pub fn solve<F, P, E>(&self, mut matvec: F, precond: P, guesses: Vec<Array1<f64>>) -> Result<DavidsonResult, E>
    where
        F: FnMut(&Array1<f64>) -> Result<Array1<f64>, E>,
        P: Fn(&Array1<f64>, f64) -> Array1<f64>,
    {
        let dim = guesses.first().map_or(0, |g| g.len());
        let nroots = self.nroots.min(dim);
        if nroots == 0 {
            return Ok(DavidsonResult {
                converged: Vec::new(),
                eigenvalues: Vec::new(),
                eigenvectors: Vec::new(),
                iterations: 0,
            });
        }
        let space_limit = self.space_limit(dim, nroots);

        let mut basis: Vec<Array1<f64>> = Vec::new();
        let mut sigma: Vec<Array1<f64>> = Vec::new();
        let mut new = orthonormalize(&basis, guesses, self.lindep);
        let mut unit = 0;
        while new.len() < nroots && unit < dim {
            let mut e = Array1::zeros(dim);
            e[unit] = 1.0;
            unit += 1;
            let mut extra = orthonormalize(&new, vec![e], self.lindep);
            new.append(&mut extra);
        }

        let mut e_prev = vec![f64::INFINITY; nroots];
        let mut eigenvalues = Vec::new();
        let mut ritz: Vec<Array1<f64>> = Vec::new();
        let mut converged = vec![false; nroots];
        let mut iterations = 0;

        for icyc in 0..self.max_cycle {
            iterations = icyc + 1;
            if basis.len() + new.len() > space_limit && !ritz.is_empty() {
                debug!("Davidson restart with {} vectors", ritz.len());
                let images = ritz_images(&basis, &sigma, &ritz_coefficients(&basis, &ritz));
                basis = ritz.clone();
                sigma = images;
                new = orthonormalize(&basis, new, self.lindep);
            }
            for v in new.drain(..) {
                sigma.push(matvec(&v)?);
                basis.push(v);
            }

            let m = basis.len();
            let hsub = DMatrix::from_fn(m, m, |i, j| 0.5 * (basis[i].dot(&sigma[j]) + basis[j].dot(&sigma[i])));
            let eig = hsub.symmetric_eigen();
            let mut order: Vec<usize> = (0..m).collect();
            order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
            let nkeep = nroots.min(m);

            eigenvalues = order[..nkeep].iter().map(|&i| eig.eigenvalues[i]).collect();
            ritz = Vec::with_capacity(nkeep);
            let mut residuals = Vec::with_capacity(nkeep);
            for &col in &order[..nkeep] {
                let mut x = Array1::zeros(dim);
                let mut ax = Array1::zeros(dim);
                for j in 0..m {
                    let u = eig.eigenvectors[(j, col)];
                    x.scaled_add(u, &basis[j]);
                    ax.scaled_add(u, &sigma[j]);
                }
                ritz.push(x);
                residuals.push(ax);
            }

            let mut rnorms = Vec::with_capacity(nkeep);
            for (r, (x, ax)) in ritz.iter().zip(residuals.iter_mut()).enumerate() {
                ax.scaled_add(-eigenvalues[r], x);
                let rnorm = ax.dot(ax).sqrt();
                let de = eigenvalues[r] - e_prev[r];
                converged[r] = rnorm < self.residual_tol && (de.abs() < self.conv_tol || rnorm < self.lindep.sqrt());
                rnorms.push(rnorm);
            }
            debug!(
                "davidson {} space {} e {:?} max|r| {:.3e}",
                icyc,
                m,
                eigenvalues,
                rnorms.iter().cloned().fold(0.0, f64::max)
            );
            if converged.iter().all(|&c| c) {
                break;
            }

            let corrections: Vec<Array1<f64>> = residuals
                .iter()
                .enumerate()
                .filter(|(r, _)| !converged[*r])
                .map(|(r, res)| precond(res, eigenvalues[r]))
                .collect();
            new = orthonormalize(&basis, corrections, self.lindep);
            if new.is_empty() {
                // the subspace cannot grow; accept roots at the achievable precision
                let loose = self.residual_tol.max(self.conv_tol.sqrt());
                for (c, rnorm) in converged.iter_mut().zip(&rnorms) {
                    *c = *c || *rnorm < loose;
                }
                debug!("Davidson: no new trial vectors above lindep, residuals {:?}", rnorms);
                break;
            }
            for (p, e) in e_prev.iter_mut().zip(&eigenvalues) {
                *p = *e;
            }
        }

        info!(
            "Davidson {} after {} cycles, e = {:?}",
            if converged.iter().all(|&c| c) { "converged" } else { "not converged" },
            iterations,
            eigenvalues
        );
        converged.truncate(eigenvalues.len());
        Ok(DavidsonResult {
            converged,
            eigenvalues,
            eigenvectors: ritz,
            iterations,
        })
    }
}

// Gram-Schmidt (twice) against `basis` and against each other.
fn orthonormalize(basis: &[Array1<f64>], vectors: Vec<Array1<f64>>, lindep: f64) -> Vec<Array1<f64>> {
    let mut out: Vec<Array1<f64>> = Vec::with_capacity(vectors.len());
    for mut v in vectors {
        let norm0 = v.dot(&v).sqrt();
        if norm0 == 0.0 || !norm0.is_finite() {
            continue;
        }
        v /= norm0;
        for _ in 0..2 {
            for b in basis.iter().chain(out.iter()) {
                let overlap = b.dot(&v);
                v.scaled_add(-overlap, b);
            }
        }
        let norm2 = v.dot(&v);
        if norm2 > lindep {
            v /= norm2.sqrt();
            out.push(v);
        }
    }
    out
}

fn ritz_coefficients(basis: &[Array1<f64>], ritz: &[Array1<f64>]) -> Vec<Vec<f64>> {
    ritz.iter()
        .map(|x| basis.iter().map(|b| b.dot(x)).collect())
        .collect()
}

fn ritz_images(basis: &[Array1<f64>], sigma: &[Array1<f64>], coeffs: &[Vec<f64>]) -> Vec<Array1<f64>> {
    coeffs
        .iter()
        .map(|c| {
            let mut ax = Array1::zeros(basis[0].len());
            for (u, s) in c.iter().zip(sigma) {
                ax.scaled_add(*u, s);
            }
            ax
        })
        .collect()
}
