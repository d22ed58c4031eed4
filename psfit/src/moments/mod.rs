//! Adaptive second moments of star stamps.
//!
//! The moments are those of the elliptical Gaussian weight that best
//! matches the light distribution: the weight covariance M and centroid are
//! iterated until the weighted moments reproduce them. For a Gaussian
//! star the fixed point is the star itself, so flux, size and shape come
//! out exact.

#[cfg(test)]
mod tests;

use glam::{DMat2, DVec2};

use crate::error::{FitError, Result};
use crate::image::Image;
use crate::shear::Shear;

// Status codes reported by [`AdaptiveMoments`].
pub const STATUS_OK: i32 = 0;
pub const STATUS_NO_PIXELS: i32 = 1;
pub const STATUS_NON_POSITIVE_FLUX: i32 = 2;
pub const STATUS_SINGULAR: i32 = 3;
pub const STATUS_TOO_LARGE: i32 = 4;
pub const STATUS_NOT_CONVERGED: i32 = 5;

/// Raw result of a moment measurement. `status != 0` means the other
/// fields are meaningless.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentMeasurement {
    pub flux: f64,
    /// Centroid relative to the star position, world units.
    pub center_u: f64,
    pub center_v: f64,
    /// det(M)^(1/4), world units.
    pub size: f64,
    pub g1: f64,
    pub g2: f64,
    pub status: i32,
}

impl MomentMeasurement {
    pub fn failed(status: i32) -> Self {
        Self {
            flux: 0.0,
            center_u: 0.0,
            center_v: 0.0,
            size: 0.0,
            g1: 0.0,
            g2: 0.0,
            status,
        }
    }

    /// Turn a measurement of `target` into [`Moments`], failing on a nonzero status.
    pub fn into_moments(self, target: &'static str) -> Result<Moments> {
        if self.status != STATUS_OK {
            tracing::warn!("Moment measurement of {} failed with status {}", target, self.status);
            return Err(FitError::MeasurementFailure {
                target,
                status: self.status,
            });
        }
        Ok(Moments {
            flux: self.flux,
            center: DVec2::new(self.center_u, self.center_v),
            size: self.size,
            g1: self.g1,
            g2: self.g2,
        })
    }
}

/// A successful moment measurement, as cached on a star.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub flux: f64,
    pub center: DVec2,
    pub size: f64,
    pub g1: f64,
    pub g2: f64,
}

impl Moments {
    pub fn shear(&self) -> Result<Shear> {
        Shear::from_g(self.g1, self.g2)
    }
}

/// Measures flux, centroid, size and shape of a stamp.
pub trait MomentEstimator {
    /// `image_pos` is the star's nominal position in pixel coordinates; the
    /// reported center is relative to it.
    fn measure(&self, image: &Image, weight: &Image, image_pos: DVec2) -> MomentMeasurement;
}

/// Iterated elliptical Gaussian weighted moments.
///
/// Pixels with zero weight are ignored; other weight values do not enter
/// the moments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveMoments {
    pub max_iterations: usize,
    /// Convergence threshold on centroid shift (pixels) and on the relative
    /// change of M.
    pub tolerance: f64,
    /// Starting weight sigma in pixels.
    pub guess_sigma: f64,
    /// Weight sigma beyond which the measurement is abandoned, in pixels.
    pub max_sigma: f64,
}

impl Default for AdaptiveMoments {
    fn default() -> Self {
        Self {
            max_iterations: 400,
            tolerance: 1e-8,
            guess_sigma: 5.0,
            max_sigma: 1000.0,
        }
    }
}

impl MomentEstimator for AdaptiveMoments {
    fn measure(&self, image: &Image, weight: &Image, image_pos: DVec2) -> MomentMeasurement {
        debug_assert!(image.same_geometry(weight));

        let pixels: Vec<(DVec2, f64)> = (0..image.height())
            .flat_map(|y| (0..image.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| weight[(x, y)] != 0.0)
            .map(|(x, y)| (image.pixel_pos(x, y), image[(x, y)]))
            .collect();
        if pixels.is_empty() {
            return MomentMeasurement::failed(STATUS_NO_PIXELS);
        }

        let mut center = image_pos;
        let mut m = DMat2::from_diagonal(DVec2::splat(self.guess_sigma * self.guess_sigma));
        let mut amplitude = 0.0;
        let mut converged = false;

        for _ in 0..self.max_iterations {
            let det = m.determinant();
            if !(det > 0.0) {
                return MomentMeasurement::failed(STATUS_SINGULAR);
            }
            let inv = m.inverse();

            let mut a = 0.0;
            let mut b = DVec2::ZERO;
            let (mut cxx, mut cxy, mut cyy) = (0.0, 0.0, 0.0);
            for &(pos, value) in &pixels {
                let d = pos - center;
                let rho2 = d.dot(inv * d);
                if rho2 > 100.0 {
                    continue;
                }
                let w = value * (-0.5 * rho2).exp();
                a += w;
                b += w * d;
                cxx += w * d.x * d.x;
                cxy += w * d.x * d.y;
                cyy += w * d.y * d.y;
            }

            if !(a > 0.0) {
                return MomentMeasurement::failed(STATUS_NON_POSITIVE_FLUX);
            }

            let shift = 2.0 * b / a;
            let new_m = DMat2::from_cols(
                DVec2::new(2.0 * cxx / a, 2.0 * cxy / a),
                DVec2::new(2.0 * cxy / a, 2.0 * cyy / a),
            );
            let dm = (new_m - m).to_cols_array();
            let change = dm.iter().map(|v| v.abs()).fold(0.0f64, f64::max) / (m.x_axis.x + m.y_axis.y);

            center += shift;
            m = new_m;
            amplitude = a;

            if m.x_axis.x + m.y_axis.y > 2.0 * self.max_sigma * self.max_sigma {
                return MomentMeasurement::failed(STATUS_TOO_LARGE);
            }
            if shift.length() < self.tolerance && change < self.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            return MomentMeasurement::failed(STATUS_NOT_CONVERGED);
        }

        let (mxx, mxy, myy) = (m.x_axis.x, m.x_axis.y, m.y_axis.y);
        let det = mxx * myy - mxy * mxy;
        if !(det > 0.0) {
            return MomentMeasurement::failed(STATUS_SINGULAR);
        }
        let trace = mxx + myy;
        let shape = match Shear::from_e((mxx - myy) / trace, 2.0 * mxy / trace) {
            Ok(shape) => shape,
            Err(_) => return MomentMeasurement::failed(STATUS_SINGULAR),
        };

        let scale = image.scale();
        let offset = (center - image_pos) * scale;
        MomentMeasurement {
            flux: 2.0 * amplitude,
            center_u: offset.x,
            center_v: offset.y,
            size: det.sqrt().sqrt() * scale,
            g1: shape.g1(),
            g2: shape.g2(),
            status: STATUS_OK,
        }
    }
}
