//! Flux (and center) re-estimation with the shape held fixed.

use glam::DVec2;

use crate::error::{FitError, Result};
use crate::lm::{Minimizer, ParamName};
use crate::moments::MomentEstimator;
use crate::render::Renderer;
use crate::star::{FitStage, Star, StarFit};

use super::{weighted_chisq, Model};

impl<R, E, M> Model<R, E, M>
where
    R: Renderer,
    E: MomentEstimator,
    M: Minimizer,
{
    /// Refit flux, and the star center when `fit_center` is set and the
    /// model center is forced. Shape parameters are not touched.
    ///
    /// `dof` counts only the refitted parameters: N − 3 with the center,
    /// N − 1 without.
    pub fn reflux(&self, star: &Star, fit_center: bool) -> Result<Star> {
        let fit = star.fit();
        tracing::debug!(
            "Reflux: flux={:.6e}, center=({:.4}, {:.4}), fit_center={}",
            fit.flux,
            fit.center.x,
            fit.center.y,
            fit_center
        );
        let npix = star.data().nonzero_weight_count() as i64;

        if fit_center && self.config.force_model_center {
            let start = self.current_values(star)?;
            let data = star.data();
            let result = self
                .minimizer
                .minimize(|p| self.residual(p, data), self.working_params(&start, false))?;
            if !result.success {
                tracing::warn!(
                    "Center reflux failed after {} iterations (chisq {:.4e})",
                    result.iterations,
                    result.chisqr
                );
                return Err(FitError::Convergence {
                    iterations: result.iterations,
                    chisq: result.chisqr,
                });
            }
            let params = &result.params;
            return Ok(star.with_fit(StarFit {
                flux: params.value(ParamName::Flux),
                center: DVec2::new(params.value(ParamName::Du), params.value(ParamName::Dv)),
                chisq: result.chisqr,
                dof: npix - 3,
                stage: FitStage::Refluxed,
                ..fit.clone()
            }));
        }

        let model = self.draw_image(star)?;
        let (cross, norm) = star
            .data()
            .weight()
            .iter()
            .zip(star.image().iter())
            .zip(model.iter())
            .fold((0.0, 0.0), |(cross, norm), ((&w, &d), &m)| {
                (cross + w * d * m, norm + w * m * m)
            });
        if !(norm > 0.0) {
            return Err(FitError::Domain(
                "model has no weighted flux on the stamp; cannot reflux".into(),
            ));
        }
        let ratio = cross / norm;
        let chisq = weighted_chisq(star.data(), &model, ratio);
        tracing::debug!("Reflux: flux ratio {:.6}, chisq {:.4e}", ratio, chisq);

        Ok(star.with_fit(StarFit {
            flux: fit.flux * ratio,
            chisq,
            dof: npix - 1,
            stage: FitStage::Refluxed,
            ..fit.clone()
        }))
    }
}
