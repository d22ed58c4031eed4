//! Bounded Levenberg-Marquardt least squares.
//!
//! Minimizes Σ r² for a residual function over an ordered list of named
//! parameters. Parameters may be bounded or held fixed; the Jacobian is
//! taken by forward differences, so the residual function is the only
//! thing a caller supplies.

mod linear_solver;


use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};

use crate::error::Result;
use linear_solver::solve;

/// Damping beyond which no step can reduce chi-square; the current point is
/// a minimum to machine precision.
const MAX_LAMBDA: f64 = 1e10;

/// Relative forward-difference step.
const DIFF_STEP: f64 = 1e-7;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for Levenberg-Marquardt optimization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// Maximum number of Jacobian evaluations.
    pub max_iterations: usize,
    /// Converged when every accepted step is below `xtol` relative to its parameter.
    pub xtol: f64,
    /// Converged when an accepted step reduces chi-square by less than this fraction.
    pub ftol: f64,
    /// Initial damping parameter.
    pub initial_lambda: f64,
    /// Factor to increase lambda on a rejected step.
    pub lambda_up: f64,
    /// Factor to decrease lambda on an accepted step.
    pub lambda_down: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            xtol: 1e-8,
            ftol: 1e-10,
            initial_lambda: 0.001,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

impl LmConfig {
    pub fn validate(&self) {
        assert!(self.max_iterations > 0, "max_iterations must be positive");
        assert!(self.xtol >= 0.0, "xtol must be non-negative, got {}", self.xtol);
        assert!(self.ftol >= 0.0, "ftol must be non-negative, got {}", self.ftol);
        assert!(
            self.initial_lambda > 0.0,
            "initial_lambda must be positive, got {}",
            self.initial_lambda
        );
        assert!(
            self.lambda_up > 1.0,
            "lambda_up must exceed 1, got {}",
            self.lambda_up
        );
        assert!(
            self.lambda_down > 0.0 && self.lambda_down < 1.0,
            "lambda_down must be in (0, 1), got {}",
            self.lambda_down
        );
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Names of the fit parameters, in working order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ParamName {
    Flux,
    Du,
    Dv,
    Scale,
    G1,
    G2,
    E0,
    E1,
    E2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param {
    pub name: ParamName,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub vary: bool,
}

impl Param {
    /// A free, unbounded parameter.
    pub fn new(name: ParamName, value: f64) -> Self {
        Self {
            name,
            value,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            vary: true,
        }
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.min = min;
        self
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn fixed(mut self) -> Self {
        self.vary = false;
        self
    }

    #[inline]
    fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

/// Ordered parameter list. Order is preserved through minimization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params(Vec<Param>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, param: Param) -> Self {
        self.0.push(param);
        self
    }

    pub fn get(&self, name: ParamName) -> Option<&Param> {
        self.0.iter().find(|p| p.name == name)
    }

    /// Value of `name`; NaN when absent.
    pub fn value(&self, name: ParamName) -> f64 {
        self.get(name).map_or(f64::NAN, |p| p.value)
    }

    pub fn values(&self) -> Vec<f64> {
        self.0.iter().map(|p| p.value).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Param> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn free_indices(&self) -> Vec<usize> {
        (0..self.0.len()).filter(|&i| self.0[i].vary).collect()
    }
}

impl FromIterator<Param> for Params {
    fn from_iter<I: IntoIterator<Item = Param>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::ops::Index<usize> for Params {
    type Output = Param;

    fn index(&self, index: usize) -> &Param {
        &self.0[index]
    }
}

// ============================================================================
// Minimizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MinimizeResult {
    pub params: Params,
    pub success: bool,
    /// Σ r² at `params`.
    pub chisqr: f64,
    /// Number of residual function evaluations.
    pub nfev: usize,
    pub iterations: usize,
}

/// Least-squares minimizer over an ordered parameter list.
pub trait Minimizer {
    /// Minimize Σ r² where `residual` maps parameters to the residual vector.
    ///
    /// An error from `residual` at the starting point is returned as is.
    /// Errors at trial points reject that step.
    fn minimize<F>(&self, residual: F, params: Params) -> Result<MinimizeResult>
    where
        F: FnMut(&Params) -> Result<Vec<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LevenbergMarquardt {
    config: LmConfig,
}

impl LevenbergMarquardt {
    pub fn new(config: LmConfig) -> Self {
        config.validate();
        Self { config }
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }
}

impl Minimizer for LevenbergMarquardt {
    fn minimize<F>(&self, mut residual: F, params: Params) -> Result<MinimizeResult>
    where
        F: FnMut(&Params) -> Result<Vec<f64>>,
    {
        let config = &self.config;
        let free = params.free_indices();

        let mut params = params;
        let mut residuals = residual(&params)?;
        let mut chi2 = sum_squares(&residuals);
        let mut nfev = 1;

        if free.is_empty() || chi2 == 0.0 {
            return Ok(MinimizeResult {
                params,
                success: true,
                chisqr: chi2,
                nfev,
                iterations: 0,
            });
        }

        let mut lambda = config.initial_lambda;
        let mut converged = false;
        let mut iterations = 0;

        'outer: for iter in 0..config.max_iterations {
            iterations = iter + 1;

            let jacobian = forward_jacobian(&mut residual, &params, &free, &residuals)?;
            nfev += free.len();
            let (hessian, gradient) = hessian_gradient(&jacobian, &residuals);

            loop {
                let mut damped = hessian.clone();
                for (i, row) in damped.iter_mut().enumerate() {
                    row[i] *= 1.0 + lambda;
                }

                let Some(delta) = solve(&damped, &gradient) else {
                    tracing::debug!("LM: singular normal equations at iteration {}", iterations);
                    break 'outer;
                };

                let mut trial = params.clone();
                for (&k, d) in free.iter().zip(&delta) {
                    let p = &mut trial.0[k];
                    p.value = p.clamp(p.value - d);
                }

                nfev += 1;
                let trial_chi2 = match residual(&trial) {
                    Ok(r) => {
                        let c = sum_squares(&r);
                        if c.is_finite() && c < chi2 {
                            Some((r, c))
                        } else {
                            None
                        }
                    }
                    Err(err) => {
                        tracing::trace!("LM: trial step rejected: {}", err);
                        None
                    }
                };

                let Some((trial_residuals, trial_chi2)) = trial_chi2 else {
                    lambda *= config.lambda_up;
                    if lambda > MAX_LAMBDA {
                        converged = true;
                        break 'outer;
                    }
                    continue;
                };

                let small_step = free.iter().all(|&k| {
                    let (old, new) = (params.0[k].value, trial.0[k].value);
                    (new - old).abs() <= config.xtol * (old.abs() + config.xtol)
                });
                let small_gain = (chi2 - trial_chi2) <= config.ftol * chi2;

                tracing::trace!(
                    "LM iteration {}: chi2 {:.6e} -> {:.6e}, lambda {:.1e}",
                    iterations,
                    chi2,
                    trial_chi2,
                    lambda
                );

                params = trial;
                residuals = trial_residuals;
                chi2 = trial_chi2;
                lambda *= config.lambda_down;

                if small_step || small_gain || chi2 == 0.0 {
                    converged = true;
                    break 'outer;
                }
                break;
            }
        }

        tracing::debug!(
            "LM finished: success={}, chi2={:.6e}, iterations={}, nfev={}",
            converged,
            chi2,
            iterations,
            nfev
        );

        Ok(MinimizeResult {
            params,
            success: converged,
            chisqr: chi2,
            nfev,
            iterations,
        })
    }
}

#[inline]
fn sum_squares(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

/// Columns ∂r/∂p for each free parameter, stored column-major.
fn forward_jacobian<F>(
    residual: &mut F,
    params: &Params,
    free: &[usize],
    r0: &[f64],
) -> Result<Vec<Vec<f64>>>
where
    F: FnMut(&Params) -> Result<Vec<f64>>,
{
    free.iter()
        .map(|&k| {
            let p = params.0[k];
            let mut h = DIFF_STEP * p.value.abs().max(1.0);
            if p.value + h > p.max {
                h = -h;
            }
            let mut shifted = params.clone();
            shifted.0[k].value = p.value + h;
            let r = residual(&shifted)?;
            Ok(r.iter().zip(r0).map(|(a, b)| (a - b) / h).collect())
        })
        .collect()
}

/// JᵀJ and Jᵀr from column-major J.
#[allow(clippy::needless_range_loop)]
fn hessian_gradient(jacobian: &[Vec<f64>], residuals: &[f64]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let n = jacobian.len();
    let mut hessian = vec![vec![0.0; n]; n];
    let mut gradient = vec![0.0; n];

    for i in 0..n {
        gradient[i] = jacobian[i].iter().zip(residuals).map(|(j, r)| j * r).sum();
        // Only compute upper triangle (j >= i)
        for j in i..n {
            hessian[i][j] = jacobian[i].iter().zip(&jacobian[j]).map(|(a, b)| a * b).sum();
        }
    }

    // Mirror upper triangle to lower
    for i in 1..n {
        for j in 0..i {
            hessian[i][j] = hessian[j][i];
        }
    }

    (hessian, gradient)
}
