//! PSF model fitting.
//!
//! A [`Model`] turns a fiducial profile into a family of PSFs through
//! dilation, shear and shift, and fits that family to individual stars.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --initialize--> Refluxed --fit--> Fit --reflux--> Refluxed
//! ```
//!
//! `initialize` measures and caches the data moments, seeds the round
//! default shape with one fast fit when the star has no parameters yet, and
//! finishes with a flux-only reflux. `fit` refines shape and size either by
//! moment matching or by nonlinear least squares.
//!
//! Every operation takes a `&Star` and returns a new [`Star`]; nothing is
//! modified in place, and failures are returned to the caller untouched.

mod batch;
mod lmfit;
mod moment_fit;
mod reflux;


use glam::DVec2;

use crate::basis::{Shape, ShapeBasis};
use crate::config::Config;
use crate::error::{FitError, Result};
use crate::image::Image;
use crate::lm::{LevenbergMarquardt, Minimizer};
use crate::moments::{AdaptiveMoments, MomentEstimator, Moments};
use crate::profile::{Fiducial, Profile};
use crate::render::{PixelRenderer, Renderer};
use crate::star::{FitStage, Star, StarData, StarFit};

/// Flux, offset and shape of a fit, with the shape triple in the model's
/// active basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitValues {
    pub flux: f64,
    pub du: f64,
    pub dv: f64,
    /// `scale` or `e0`.
    pub size: f64,
    /// `g1` or `e1`.
    pub shape1: f64,
    /// `g2` or `e2`.
    pub shape2: f64,
}

impl FitValues {
    pub fn new(flux: f64, offset: DVec2, triple: [f64; 3]) -> Self {
        Self {
            flux,
            du: offset.x,
            dv: offset.y,
            size: triple[0],
            shape1: triple[1],
            shape2: triple[2],
        }
    }

    #[inline]
    pub fn offset(&self) -> DVec2 {
        DVec2::new(self.du, self.dv)
    }

    #[inline]
    pub fn triple(&self) -> [f64; 3] {
        [self.size, self.shape1, self.shape2]
    }
}

/// A parametric PSF model built on one fiducial profile.
///
/// The collaborators default to the crate's own renderer, moment estimator
/// and minimizer; [`Model::with_collaborators`] swaps any of them.
#[derive(Debug, Clone)]
pub struct Model<R = PixelRenderer, E = AdaptiveMoments, M = LevenbergMarquardt> {
    config: Config,
    fiducial: Fiducial,
    renderer: R,
    estimator: E,
    minimizer: M,
}

impl Model {
    /// Model with the fiducial named by `config.profile`.
    pub fn new(config: Config) -> Self {
        let fiducial = Fiducial::from_kind(&config.profile);
        Self::with_fiducial(config, fiducial)
    }

    /// Model with a caller-chosen fiducial; `config.profile` is ignored.
    pub fn with_fiducial(config: Config, fiducial: Fiducial) -> Self {
        config.validate();
        let renderer = PixelRenderer::new(&config.render);
        let minimizer = LevenbergMarquardt::new(config.lm);
        Self::with_collaborators(config, fiducial, renderer, AdaptiveMoments::default(), minimizer)
    }
}

impl<R, E, M> Model<R, E, M>
where
    R: Renderer,
    E: MomentEstimator,
    M: Minimizer,
{
    pub fn with_collaborators(
        config: Config,
        fiducial: Fiducial,
        renderer: R,
        estimator: E,
        minimizer: M,
    ) -> Self {
        config.validate();
        tracing::debug!(
            "Building {} model: fastfit={}, force_model_center={}, include_pixel={}, basis={:?}",
            fiducial.name(),
            config.fastfit,
            config.force_model_center,
            config.include_pixel,
            config.basis()
        );
        Self {
            config,
            fiducial,
            renderer,
            estimator,
            minimizer,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn fiducial(&self) -> &Fiducial {
        &self.fiducial
    }

    #[inline]
    pub fn basis(&self) -> ShapeBasis {
        self.config.basis()
    }

    /// Length of a stored parameter vector.
    #[inline]
    pub fn nparams(&self) -> usize {
        self.config.nparams()
    }

    // ------------------------------------------------------------------------
    // Parameter layout
    // ------------------------------------------------------------------------

    /// Split a stored vector into model offset and shape triple.
    fn split_params(&self, params: &[f64]) -> Result<(DVec2, [f64; 3])> {
        let expected = self.nparams();
        if params.len() != expected {
            return Err(FitError::ParamLength {
                expected,
                found: params.len(),
            });
        }
        Ok(if self.config.force_model_center {
            (DVec2::ZERO, [params[0], params[1], params[2]])
        } else {
            (
                DVec2::new(params[0], params[1]),
                [params[2], params[3], params[4]],
            )
        })
    }

    /// Stored vector and star center for `values`.
    fn pack_params(&self, values: &FitValues) -> (Vec<f64>, DVec2) {
        let [size, shape1, shape2] = values.triple();
        if self.config.force_model_center {
            (vec![size, shape1, shape2], values.offset())
        } else {
            (vec![values.du, values.dv, size, shape1, shape2], DVec2::ZERO)
        }
    }

    fn stored_params<'a>(&self, fit: &'a StarFit) -> Result<&'a [f64]> {
        fit.params.as_deref().ok_or(FitError::ParamLength {
            expected: self.nparams(),
            found: 0,
        })
    }

    /// Current fit of `star` as flux, total offset and shape triple.
    fn current_values(&self, star: &Star) -> Result<FitValues> {
        let fit = star.fit();
        let (offset, triple) = self.split_params(self.stored_params(fit)?)?;
        Ok(FitValues::new(fit.flux, offset + fit.center, triple))
    }

    /// The stored fit that a moment fit starts from when a star has none.
    fn default_fit(&self) -> StarFit {
        let triple = self.basis().default_triple();
        let (params, center) = self.pack_params(&FitValues::new(1.0, DVec2::ZERO, triple));
        StarFit::new(params, 1.0, center)
    }

    // ------------------------------------------------------------------------
    // Profiles and rendering
    // ------------------------------------------------------------------------

    fn decode_shape(&self, triple: [f64; 3]) -> Result<Shape> {
        let shape = self.basis().decode(triple)?;
        if !(shape.scale > 0.0) || !shape.scale.is_finite() {
            return Err(FitError::Domain(format!(
                "profile scale {} must be positive",
                shape.scale
            )));
        }
        Ok(shape)
    }

    fn build_profile(&self, shape: &Shape, offset: DVec2) -> Profile {
        Profile::new(self.fiducial.clone())
            .dilate(shape.scale)
            .shear(&shape.shear)
            .shift(offset)
    }

    /// Unit-flux profile for a stored parameter vector.
    pub fn get_profile(&self, params: &[f64]) -> Result<Profile> {
        let (offset, triple) = self.split_params(params)?;
        let shape = self.decode_shape(triple)?;
        Ok(self.build_profile(&shape, offset))
    }

    fn render(&self, profile: &Profile, data: &StarData) -> Image {
        self.renderer.render(
            profile,
            data.image(),
            data.image_pos(),
            self.config.draw_method(),
        )
    }

    /// Model image of a star's current fit.
    fn draw_image(&self, star: &Star) -> Result<Image> {
        let fit = star.fit();
        let profile = self.get_profile(self.stored_params(fit)?)?.shift(fit.center) * fit.flux;
        Ok(self.render(&profile, star.data()))
    }

    /// The star with its data image replaced by the rendered model. The fit
    /// is unchanged.
    pub fn draw(&self, star: &Star) -> Result<Star> {
        let image = self.draw_image(star)?;
        Ok(star.with_data(star.data().with_image(image)))
    }

    // ------------------------------------------------------------------------
    // Moments
    // ------------------------------------------------------------------------

    fn measure(&self, data: &StarData, target: &'static str) -> Result<Moments> {
        self.estimator
            .measure(data.image(), data.weight(), data.image_pos())
            .into_moments(target)
    }

    /// The star with its data moments cached, measuring them if needed.
    pub fn with_moments(&self, star: &Star) -> Result<Star> {
        if star.data().moments().is_some() {
            return Ok(star.clone());
        }
        let moments = self.measure(star.data(), "data")?;
        Ok(star.with_data(star.data().with_moments(moments)))
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Cache data moments, seed a default fit if needed, and reflux.
    pub fn initialize(&self, star: &Star) -> Result<Star> {
        let mut star = self.with_moments(star)?;
        if star.fit().params.is_none() {
            let seeded = star.with_fit(self.default_fit());
            let fitted = self.fit(&seeded, Some(true))?;
            tracing::debug!("Moment fit params: {:?}", fitted.fit().params);
            star = fitted.with_fit(StarFit {
                stage: FitStage::Seeded,
                ..fitted.fit().clone()
            });
        }
        self.reflux(&star, false)
    }

    /// Fit shape, size, flux and center.
    ///
    /// `fastfit` overrides the configured fitting mode for this call.
    pub fn fit(&self, star: &Star, fastfit: Option<bool>) -> Result<Star> {
        let fastfit = fastfit.unwrap_or(self.config.fastfit);

        let initialized;
        let star = if star.data().moments().is_none() {
            initialized = self.initialize(star)?;
            &initialized
        } else {
            star
        };

        let values = if fastfit {
            self.moment_fit(star)?
        } else {
            self.lmfit(star)?
        };

        let (params, center) = self.pack_params(&values);
        let profile = self.get_profile(&params)?.shift(center) * values.flux;
        let model = self.render(&profile, star.data());
        let chisq = weighted_chisq(star.data(), &model, 1.0);
        let dof = star.data().nonzero_weight_count() as i64 - self.nparams() as i64;

        tracing::debug!(
            "Fit ({}): flux={:.6e}, center=({:.4}, {:.4}), params={:?}, chisq={:.4e}, dof={}",
            if fastfit { "moments" } else { "lm" },
            values.flux,
            center.x,
            center.y,
            params,
            chisq,
            dof
        );

        Ok(star.with_fit(StarFit {
            params: Some(params),
            flux: values.flux,
            center,
            chisq,
            dof,
            alpha: star.fit().alpha.clone(),
            beta: star.fit().beta.clone(),
            stage: FitStage::Fit,
        }))
    }
}

/// Σ w (d − k·m)².
fn weighted_chisq(data: &StarData, model: &Image, k: f64) -> f64 {
    data.weight()
        .iter()
        .zip(data.image().iter())
        .zip(model.iter())
        .map(|((&w, &d), &m)| {
            let r = d - k * m;
            w * r * r
        })
        .sum()
}
