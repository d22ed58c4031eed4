//! Nonlinear least-squares fitting.

use crate::error::{FitError, Result};
use crate::lm::{Minimizer, Param, ParamName, Params};
use crate::moments::MomentEstimator;
use crate::render::Renderer;
use crate::star::{Star, StarData};

use super::{FitValues, Model};

impl<R, E, M> Model<R, E, M>
where
    R: Renderer,
    E: MomentEstimator,
    M: Minimizer,
{
    /// Working parameters in minimizer order: flux, du, dv, then the shape
    /// triple. `du`/`dv` always vary; the shape triple only with `vary_shape`.
    pub(super) fn working_params(&self, start: &FitValues, vary_shape: bool) -> Params {
        let [size, shape1, shape2] = self.basis().param_names();
        let bound = self.basis().ellipticity_bound();
        let shape = |p: Param| if vary_shape { p } else { p.fixed() };

        Params::new()
            .add(Param::new(ParamName::Flux, start.flux).with_min(0.0))
            .add(Param::new(ParamName::Du, start.du))
            .add(Param::new(ParamName::Dv, start.dv))
            .add(shape(Param::new(size, start.size).with_min(0.0)))
            .add(shape(Param::new(shape1, start.shape1).with_bounds(-bound, bound)))
            .add(shape(Param::new(shape2, start.shape2).with_bounds(-bound, bound)))
    }

    fn values_of(&self, params: &Params) -> Result<FitValues> {
        let [size, shape1, shape2] = self.basis().param_names();
        let names = [ParamName::Flux, ParamName::Du, ParamName::Dv, size, shape1, shape2];
        let mut v = [0.0; 6];
        for (slot, name) in v.iter_mut().zip(names) {
            *slot = params
                .get(name)
                .ok_or(FitError::ParamLength {
                    expected: names.len(),
                    found: params.len(),
                })?
                .value;
        }
        Ok(FitValues {
            flux: v[0],
            du: v[1],
            dv: v[2],
            size: v[3],
            shape1: v[4],
            shape2: v[5],
        })
    }

    /// `sqrt(w) (model − data)` per pixel for a set of working parameters.
    pub fn residual(&self, params: &Params, data: &StarData) -> Result<Vec<f64>> {
        let values = self.values_of(params)?;
        let shape = self.decode_shape(values.triple())?;
        let profile = self.build_profile(&shape, values.offset()) * values.flux;
        let model = self.render(&profile, data);

        Ok(data
            .weight()
            .iter()
            .zip(data.image().iter())
            .zip(model.iter())
            .map(|((&w, &d), &m)| w.sqrt() * (m - d))
            .collect())
    }

    /// Fit flux, offset and shape by minimizing the weighted residual.
    ///
    /// Starts from the current fit, or from a moment fit of the default
    /// shape if the star has no parameters yet.
    pub fn lmfit(&self, star: &Star) -> Result<FitValues> {
        let start = match star.fit().params {
            Some(_) => self.current_values(star)?,
            None => self.moment_fit(star)?,
        };

        let data = star.data();
        let result = self
            .minimizer
            .minimize(|p| self.residual(p, data), self.working_params(&start, true))?;

        if !result.success {
            tracing::warn!(
                "Least-squares fit failed after {} iterations (chisq {:.4e})",
                result.iterations,
                result.chisqr
            );
            return Err(FitError::Convergence {
                iterations: result.iterations,
                chisq: result.chisqr,
            });
        }
        tracing::debug!(
            "Least-squares fit: {} iterations, {} evaluations, chisq {:.4e}",
            result.iterations,
            result.nfev,
            result.chisqr
        );

        self.values_of(&result.params)
    }
}
