//! Configuration types for PSF model fitting.
//!
//! This module defines the flat [`Config`] struct and the enums it uses.
//! A `Config` is frozen once a [`Model`](crate::Model) is built from it and
//! round-trips through YAML so that a model can be written out and rebuilt.

use serde::{Deserialize, Serialize};

use crate::basis::ShapeBasis;
use crate::lm::LmConfig;
use crate::render::DrawMethod;

// ============================================================================
// Enums
// ============================================================================

/// Built-in fiducial profiles.
///
/// All are round, centered and normalized to unit flux. Caller-supplied
/// profiles are passed to [`Model::with_fiducial`](crate::Model::with_fiducial)
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProfileKind {
    /// Gaussian with σ = 1.
    #[default]
    Gaussian,
    /// Kolmogorov with half-light radius 1.
    Kolmogorov,
    /// Moffat with half-light radius 1.
    Moffat {
        /// Power law slope of the wings; must be > 1.
        beta: f64,
        /// Truncation radius in half-light radii. 0 disables truncation.
        #[serde(default)]
        trunc: f64,
    },
}

impl ProfileKind {
    pub fn validate(&self) {
        if let ProfileKind::Moffat { beta, trunc } = *self {
            assert!(beta > 1.0, "Moffat beta must be > 1, got {}", beta);
            assert!(
                trunc == 0.0 || trunc > std::f64::consts::SQRT_2,
                "Moffat trunc must be 0 or exceed sqrt(2), got {}",
                trunc
            );
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Settings for the default pixel renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Sub-samples per pixel side when integrating over the pixel area.
    pub oversampling: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { oversampling: 4 }
    }
}

impl RenderConfig {
    pub fn validate(&self) {
        assert!(
            self.oversampling >= 1,
            "oversampling must be at least 1, got {}",
            self.oversampling
        );
    }
}

// ============================================================================
// Model configuration
// ============================================================================

/// Model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // -- Profile --
    /// Fiducial profile that gets dilated, sheared and shifted onto stars.
    pub profile: ProfileKind,

    // -- Fitting mode --
    /// Use moment matching instead of nonlinear least squares by default.
    pub fastfit: bool,
    /// If true, the PSF centroid is fixed at the origin of the model and the
    /// stellar position is fitted separately (`StarFit::center`). If false,
    /// the star position is fixed and the model may be off-center.
    pub force_model_center: bool,
    /// Integrate the profile over the pixel area when rendering.
    pub include_pixel: bool,
    /// Fit size and ellipticity as unnormalized second moments (e0, e1, e2).
    pub unnormalized_basis: bool,

    // -- Numerics --
    pub lm: LmConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: ProfileKind::Gaussian,
            fastfit: false,
            force_model_center: true,
            include_pixel: true,
            unnormalized_basis: false,
            lm: LmConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl Config {
    pub fn gaussian() -> Self {
        Self::default()
    }

    pub fn kolmogorov() -> Self {
        Self {
            profile: ProfileKind::Kolmogorov,
            ..Self::default()
        }
    }

    pub fn moffat(beta: f64, trunc: f64) -> Self {
        Self {
            profile: ProfileKind::Moffat { beta, trunc },
            ..Self::default()
        }
    }

    pub fn validate(&self) {
        self.profile.validate();
        self.lm.validate();
        self.render.validate();
    }

    pub fn basis(&self) -> ShapeBasis {
        ShapeBasis::from_flag(self.unnormalized_basis)
    }

    pub fn draw_method(&self) -> DrawMethod {
        if self.include_pixel {
            DrawMethod::Auto
        } else {
            DrawMethod::NoPixel
        }
    }

    /// Length of the stored parameter vector.
    pub fn nparams(&self) -> usize {
        if self.force_model_center {
            3
        } else {
            5
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yml::Error> {
        serde_yml::to_string(self)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(yaml)
    }
}
