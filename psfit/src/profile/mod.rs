//! Analytic light profiles and their affine transformations.
//!
//! A [`Fiducial`] is a round, unit-flux, centered template. A [`Profile`]
//! is a fiducial plus an accumulated transformation:
//!
//! I(x) = flux × f(J⁻¹ (x − offset)) / |det J|
//!
//! so that `dilate`, `shear` and `shift` compose in the order they are applied.

mod kolmogorov;
mod moffat;


use std::fmt;
use std::ops::Mul;
use std::sync::Arc;

use glam::{DMat2, DVec2};

use crate::config::ProfileKind;
use crate::shear::Shear;

pub use kolmogorov::Kolmogorov;
pub use moffat::Moffat;

/// 1 / 2π
pub(crate) const INV_TWO_PI: f64 = 0.5 / std::f64::consts::PI;

/// A caller-supplied surface brightness.
///
/// Positions are in world units relative to the profile's own origin.
/// The model rescales by [`flux`](Self::flux) and recenters on
/// [`centroid`](Self::centroid), so implementors need not be normalized.
pub trait SurfaceBrightness: Send + Sync + fmt::Debug {
    fn xvalue(&self, pos: DVec2) -> f64;

    fn flux(&self) -> f64 {
        1.0
    }

    fn centroid(&self) -> DVec2 {
        DVec2::ZERO
    }
}

/// Circular Gaussian with σ = 1.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Gaussian;

impl Gaussian {
    #[inline]
    pub fn xvalue(&self, pos: DVec2) -> f64 {
        INV_TWO_PI * (-0.5 * pos.length_squared()).exp()
    }
}

/// The template the model dilates, shears and shifts.
#[derive(Debug, Clone)]
pub enum Fiducial {
    Gaussian(Gaussian),
    Kolmogorov(Arc<Kolmogorov>),
    Moffat(Moffat),
    /// A caller-supplied profile, stored with the factors that bring it to
    /// unit flux and zero centroid.
    Custom {
        profile: Arc<dyn SurfaceBrightness>,
        inv_flux: f64,
        centroid: DVec2,
    },
}

impl Fiducial {
    pub fn from_kind(kind: &ProfileKind) -> Self {
        match *kind {
            ProfileKind::Gaussian => Fiducial::Gaussian(Gaussian),
            ProfileKind::Kolmogorov => Fiducial::Kolmogorov(Kolmogorov::shared()),
            ProfileKind::Moffat { beta, trunc } => Fiducial::Moffat(Moffat::new(beta, trunc)),
        }
    }

    /// Wrap a caller profile, normalizing flux to 1 and moving its centroid to the origin.
    pub fn custom(profile: Arc<dyn SurfaceBrightness>) -> Self {
        let flux = profile.flux();
        assert!(
            flux.is_finite() && flux != 0.0,
            "custom profile flux must be finite and nonzero, got {}",
            flux
        );
        let centroid = profile.centroid();
        Fiducial::Custom {
            profile,
            inv_flux: 1.0 / flux,
            centroid,
        }
    }

    #[inline]
    pub fn xvalue(&self, pos: DVec2) -> f64 {
        match self {
            Fiducial::Gaussian(g) => g.xvalue(pos),
            Fiducial::Kolmogorov(k) => k.xvalue(pos),
            Fiducial::Moffat(m) => m.xvalue(pos),
            Fiducial::Custom {
                profile,
                inv_flux,
                centroid,
            } => profile.xvalue(pos + *centroid) * inv_flux,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Fiducial::Gaussian(_) => "Gaussian",
            Fiducial::Kolmogorov(_) => "Kolmogorov",
            Fiducial::Moffat(_) => "Moffat",
            Fiducial::Custom { .. } => "Custom",
        }
    }
}

/// A fiducial under an affine transformation and flux scaling.
#[derive(Clone)]
pub struct Profile {
    fiducial: Fiducial,
    jac: DMat2,
    offset: DVec2,
    flux: f64,
}

impl Profile {
    pub fn new(fiducial: Fiducial) -> Self {
        Self {
            fiducial,
            jac: DMat2::IDENTITY,
            offset: DVec2::ZERO,
            flux: 1.0,
        }
    }

    /// Expand linear size by `scale`, preserving flux.
    pub fn dilate(mut self, scale: f64) -> Self {
        self.jac = self.jac * scale;
        self.offset *= scale;
        self
    }

    pub fn shear(mut self, shear: &Shear) -> Self {
        let m = shear.matrix();
        self.jac = m * self.jac;
        self.offset = m * self.offset;
        self
    }

    pub fn shift(mut self, delta: DVec2) -> Self {
        self.offset += delta;
        self
    }

    /// Multiply the total flux by `factor`.
    pub fn scale_flux(mut self, factor: f64) -> Self {
        self.flux *= factor;
        self
    }

    #[inline]
    pub fn fiducial(&self) -> &Fiducial {
        &self.fiducial
    }

    #[inline]
    pub fn jacobian(&self) -> DMat2 {
        self.jac
    }

    #[inline]
    pub fn offset(&self) -> DVec2 {
        self.offset
    }

    #[inline]
    pub fn flux(&self) -> f64 {
        self.flux
    }

    /// Precompute the inverse transformation for repeated evaluation.
    pub fn sampler(&self) -> Sampler<'_> {
        let det = self.jac.determinant();
        Sampler {
            fiducial: &self.fiducial,
            inv: self.jac.inverse(),
            offset: self.offset,
            norm: self.flux / det.abs(),
        }
    }

    /// Surface brightness at world position `pos`.
    pub fn xvalue(&self, pos: DVec2) -> f64 {
        self.sampler().xvalue(pos)
    }
}

impl Mul<f64> for Profile {
    type Output = Profile;

    fn mul(self, factor: f64) -> Profile {
        self.scale_flux(factor)
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("fiducial", &self.fiducial.name())
            .field("jac", &self.jac)
            .field("offset", &self.offset)
            .field("flux", &self.flux)
            .finish()
    }
}

/// A profile with its inverse transformation cached.
pub struct Sampler<'a> {
    fiducial: &'a Fiducial,
    inv: DMat2,
    offset: DVec2,
    norm: f64,
}

impl Sampler<'_> {
    #[inline]
    pub fn xvalue(&self, pos: DVec2) -> f64 {
        self.norm * self.fiducial.xvalue(self.inv * (pos - self.offset))
    }
}
