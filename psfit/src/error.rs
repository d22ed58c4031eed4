use thiserror::Error;

/// Errors raised while fitting a PSF model to a star.
///
/// Every variant is surfaced to the caller unchanged: nothing in the crate
/// catches a `FitError` to retry or substitute default parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// The moment estimator returned a nonzero status flag.
    #[error("Moment measurement failed for {target} (status {status})")]
    MeasurementFailure { target: &'static str, status: i32 },

    /// Numeric input outside the domain of an operation.
    #[error("Domain error: {0}")]
    Domain(String),

    /// The nonlinear minimizer reported failure.
    #[error("Minimizer did not converge after {iterations} iterations (chisq = {chisq})")]
    Convergence { iterations: usize, chisq: f64 },

    /// A parameter vector whose length does not match the model layout.
    #[error("Parameter vector has length {found}, expected {expected}")]
    ParamLength { expected: usize, found: usize },
}

pub type Result<T> = std::result::Result<T, FitError>;
