//! Broyden's method for systems of nonlinear equations

use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// Outcome of a multivariate root search.
#[derive(Debug, Clone)]
pub struct VectorRoot {
    pub x: DVector<f64>,
    /// Residual `F(x)`
    pub fun: DVector<f64>,
    pub iterations: usize,
    pub function_calls: usize,
    pub converged: bool,
    pub message: String,
}

/// Quasi-Newton root finder with rank-1 Jacobian updates.
///
/// The initial Jacobian is a forward difference with step `sqrt(eps)·|x_j|`
/// (`sqrt(eps)` for `x_j = 0`); every step is backtracked until the residual
/// norm decreases. When no trial point is better, the Jacobian is rebuilt by
/// finite differences once before giving up at the current point.
#[derive(Debug, Clone)]
pub struct Broyden {
    /// Converged when `max |F| < ftol`
    pub ftol: f64,
    /// Converged when a full step is below `xtol` relative to `|x|`
    pub xtol: f64,
    pub max_iterations: usize,
    /// Relative error of the function values used for the difference step
    pub eps: f64,
}

impl Default for Broyden {
    fn default() -> Self {
        Broyden {
            ftol: 1e-6,
            xtol: 1e-8,
            max_iterations: 100,
            eps: 1e-2,
        }
    }
}

const MAX_BACKTRACK: usize = 8;

fn max_abs(v: &DVector<f64>) -> f64 {
    v.iter().fold(0.0f64, |m, x| m.max(x.abs()))
}

// Column j is `(F(x + h e_j) - F(x)) / h` with `h = step·|x_j|`, or `step` at zero.
fn forward_difference<F, E>(
    f: &mut F,
    x: &DVector<f64>,
    fx: &DVector<f64>,
    step: f64,
    calls: &mut usize,
) -> Result<DMatrix<f64>, E>
where
    F: FnMut(&DVector<f64>) -> Result<DVector<f64>, E>,
{
    let n = x.len();
    let mut jac = DMatrix::zeros(n, n);
    for j in 0..n {
        let h = if x[j] == 0.0 { step } else { step * x[j].abs() };
        let mut xp = x.clone();
        xp[j] += h;
        let fp = f(&xp)?;
        *calls += 1;
        jac.set_column(j, &((fp - fx) / h));
    }
    Ok(jac)
}

impl Broyden {
    /// Solve `F(x) = 0` from `x0`; `f0 = F(x0)` is reused when known.
    pub fn solve<F, E>(&self, mut f: F, x0: DVector<f64>, f0: Option<DVector<f64>>) -> Result<VectorRoot, E>
    where
        F: FnMut(&DVector<f64>) -> Result<DVector<f64>, E>,
    {
        let mut calls = 0;
        let mut x = x0;
        let mut fx = match f0 {
            Some(v) => v,
            None => {
                calls += 1;
                f(&x)?
            }
        };
        let finish = |x: DVector<f64>, fun: DVector<f64>, iterations: usize, calls: usize, converged: bool, message: &str| VectorRoot {
            x,
            fun,
            iterations,
            function_calls: calls,
            converged,
            message: message.to_string(),
        };
        if max_abs(&fx) < self.ftol {
            return Ok(finish(x, fx, 0, calls, true, "initial point is a root"));
        }

        let step = self.eps.max(f64::EPSILON).sqrt();
        let mut jac = forward_difference(&mut f, &x, &fx, step, &mut calls)?;
        let mut fresh = true;

        for iter in 0..self.max_iterations {
            let Some(dx) = jac.clone().lu().solve(&(-&fx)) else {
                return Ok(finish(x, fx, iter, calls, false, "singular Jacobian"));
            };

            let norm0 = fx.norm();
            let mut lambda = 1.0;
            let mut trial = None;
            for _ in 0..=MAX_BACKTRACK {
                let xn = &x + &dx * lambda;
                let fnew = f(&xn)?;
                calls += 1;
                if fnew.norm() < norm0 {
                    trial = Some((xn, fnew, lambda));
                    break;
                }
                lambda *= 0.5;
            }
            let Some((xn, fnew, lambda)) = trial else {
                if fresh {
                    return Ok(finish(x, fx, iter, calls, false, "line search failed"));
                }
                debug!("broyden {}: line search failed, rebuilding Jacobian", iter);
                jac = forward_difference(&mut f, &x, &fx, step, &mut calls)?;
                fresh = true;
                continue;
            };
            fresh = false;

            let s = &xn - &x;
            let y = &fnew - &fx;
            let ss = s.dot(&s);
            if ss > 0.0 {
                let update = (y - &jac * &s) * s.transpose() / ss;
                jac += update;
            }
            x = xn;
            fx = fnew;
            debug!("broyden {} max|F| {:.3e} step {:.3e}", iter, max_abs(&fx), lambda);

            if max_abs(&fx) < self.ftol {
                return Ok(finish(x, fx, iter + 1, calls, true, "residual below tolerance"));
            }
            if lambda == 1.0 && ss.sqrt() < self.xtol * (x.norm() + self.xtol) {
                return Ok(finish(x, fx, iter + 1, calls, true, "relative step below tolerance"));
            }
        }
        Ok(finish(x, fx, self.max_iterations, calls, false, "iteration limit reached"))
    }
}
