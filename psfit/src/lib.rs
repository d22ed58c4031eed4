//! psfit - Parametric PSF models fitted to star stamps.
//!
//! A fiducial profile (Gaussian, Kolmogorov, Moffat or a caller-supplied
//! one) is dilated, sheared and shifted to match each star. Fits run either
//! by single-step moment matching or by bounded Levenberg-Marquardt least
//! squares, and flux can be re-estimated with the shape held fixed.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use psfit::{Config, Model, Star, StarData};
//!
//! let model = Model::new(Config::kolmogorov());
//! let star = Star::from_data(StarData::new(image, weight, image_pos));
//!
//! let star = model.initialize(&star)?;
//! let star = model.fit(&star, None)?;
//! println!("flux {} chisq {} / {}", star.flux(), star.fit().chisq, star.fit().dof);
//! ```

mod basis;
mod config;
mod error;
mod image;
pub mod lm;
mod model;
pub mod moments;
pub mod profile;
mod render;
mod shear;
mod star;

#[cfg(test)]
pub(crate) mod test_utils;

// ============================================================================
// Core types
// ============================================================================

pub use error::{FitError, Result};
pub use image::Image;
pub use star::{FitStage, Property, Star, StarData, StarFit, HSM_KEY};

// ============================================================================
// Configuration
// ============================================================================

pub use config::{Config, ProfileKind, RenderConfig};
pub use lm::LmConfig;

// ============================================================================
// Shape algebra
// ============================================================================

pub use basis::{
    to_normalized, to_unnormalized, Shape, ShapeBasis, MAX_REDUCED_SHEAR,
    MAX_UNNORMALIZED_ELLIPTICITY,
};
pub use shear::Shear;

// ============================================================================
// Profiles, rendering and measurement
// ============================================================================

pub use moments::{AdaptiveMoments, MomentEstimator, MomentMeasurement, Moments};
pub use profile::{Fiducial, Profile, SurfaceBrightness};
pub use render::{DrawMethod, PixelRenderer, Renderer};

// ============================================================================
// Fitting
// ============================================================================

pub use lm::{LevenbergMarquardt, MinimizeResult, Minimizer, Param, ParamName, Params};
pub use model::{FitValues, Model};
