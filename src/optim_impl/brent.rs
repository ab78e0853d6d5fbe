//! Brent's bracketed scalar root finder

use crate::error::FciError;
use tracing::debug;

/// Relative tolerance floor, 4 machine epsilons.
pub const BRENT_RTOL: f64 = 4.0 * f64::EPSILON;

/// Outcome of a scalar root search.
#[derive(Debug, Clone)]
pub struct ScalarRoot {
    pub root: f64,
    /// Function value at `root`
    pub value: f64,
    pub iterations: usize,
    pub function_calls: usize,
    pub converged: bool,
    pub message: String,
}

/// Root of `f` in the bracket `[a.0, b.0]`, given `a.1 = f(a.0)` and `b.1 = f(b.0)`.
///
/// Inverse quadratic interpolation with bisection safeguard. Stops when the
/// bracket half-width drops below `(xtol + 4ε|x|) / 2`, or after `maxiter`
/// iterations with `converged = false`. Endpoint values of the same sign give
/// [`FciError::Bracket`].
pub fn brent<F, E>(mut f: F, a: (f64, f64), b: (f64, f64), xtol: f64, maxiter: usize) -> Result<ScalarRoot, E>
where
    F: FnMut(f64) -> Result<f64, E>,
    E: From<FciError>,
{
    let (mut xpre, mut fpre) = a;
    let (mut xcur, mut fcur) = b;
    let done = |root: f64, value: f64, iterations: usize, calls: usize, converged: bool, message: &str| ScalarRoot {
        root,
        value,
        iterations,
        function_calls: calls,
        converged,
        message: message.to_string(),
    };

    if fpre * fcur > 0.0 {
        return Err(FciError::Bracket(format!(
            "f({}) = {} and f({}) = {} have the same sign",
            xpre, fpre, xcur, fcur
        ))
        .into());
    }
    if fpre == 0.0 {
        return Ok(done(xpre, fpre, 0, 0, true, "converged"));
    }
    if fcur == 0.0 {
        return Ok(done(xcur, fcur, 0, 0, true, "converged"));
    }

    let (mut xblk, mut fblk) = (0.0, 0.0);
    let (mut spre, mut scur) = (0.0f64, 0.0f64);
    let mut calls = 0;

    for iter in 0..maxiter {
        if fpre != 0.0 && fcur != 0.0 && (fpre.is_sign_negative() != fcur.is_sign_negative()) {
            xblk = xpre;
            fblk = fpre;
            spre = xcur - xpre;
            scur = spre;
        }
        if fblk.abs() < fcur.abs() {
            xpre = xcur;
            xcur = xblk;
            xblk = xpre;
            fpre = fcur;
            fcur = fblk;
            fblk = fpre;
        }

        let delta = (xtol + BRENT_RTOL * xcur.abs()) / 2.0;
        let sbis = (xblk - xcur) / 2.0;
        if fcur == 0.0 || sbis.abs() < delta {
            debug!("brent converged at {} after {} iterations", xcur, iter);
            return Ok(done(xcur, fcur, iter, calls, true, "converged"));
        }

        if spre.abs() > delta && fcur.abs() < fpre.abs() {
            let stry = if xpre == xblk {
                // secant
                -fcur * (xcur - xpre) / (fcur - fpre)
            } else {
                // inverse quadratic
                let dpre = (fpre - fcur) / (xpre - xcur);
                let dblk = (fblk - fcur) / (xblk - xcur);
                -fcur * (fblk * dblk - fpre * dpre) / (dblk * dpre * (fblk - fpre))
            };
            if 2.0 * stry.abs() < spre.abs().min(3.0 * sbis.abs() - delta) {
                spre = scur;
                scur = stry;
            } else {
                spre = sbis;
                scur = sbis;
            }
        } else {
            spre = sbis;
            scur = sbis;
        }

        xpre = xcur;
        fpre = fcur;
        if scur.abs() > delta {
            xcur += scur;
        } else {
            xcur += if sbis > 0.0 { delta } else { -delta };
        }
        fcur = f(xcur)?;
        calls += 1;
    }
    Ok(done(xcur, fcur, maxiter, calls, false, "iteration limit reached"))
}
