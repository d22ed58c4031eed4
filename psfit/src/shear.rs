//! Reduced shear and distortion algebra.
//!
//! A [`Shear`] is stored as reduced shear `g = g1 + i g2` with `|g| < 1`.
//! The distortion `e = 2g / (1 + |g|²)` is the same ellipse expressed as
//! `(a² - b²) / (a² + b²)` instead of `(a - b) / (a + b)`.

use std::ops::{Add, Neg, Sub};

use glam::DMat2;

use crate::error::{FitError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Shear {
    g1: f64,
    g2: f64,
}

impl Shear {
    pub const IDENTITY: Shear = Shear { g1: 0.0, g2: 0.0 };

    /// Build from reduced shear components.
    pub fn from_g(g1: f64, g2: f64) -> Result<Self> {
        let gsq = g1 * g1 + g2 * g2;
        if !(gsq < 1.0) {
            return Err(FitError::Domain(format!(
                "reduced shear |g| = {:.6} must be < 1",
                gsq.sqrt()
            )));
        }
        Ok(Self { g1, g2 })
    }

    /// Build from distortion components.
    pub fn from_e(e1: f64, e2: f64) -> Result<Self> {
        let esq = e1 * e1 + e2 * e2;
        if !(esq < 1.0) {
            return Err(FitError::Domain(format!(
                "distortion |e| = {:.6} must be < 1",
                esq.sqrt()
            )));
        }
        let factor = 1.0 / (1.0 + (1.0 - esq).sqrt());
        Ok(Self {
            g1: e1 * factor,
            g2: e2 * factor,
        })
    }

    #[inline]
    pub fn g1(&self) -> f64 {
        self.g1
    }

    #[inline]
    pub fn g2(&self) -> f64 {
        self.g2
    }

    #[inline]
    pub fn g(&self) -> f64 {
        (self.g1 * self.g1 + self.g2 * self.g2).sqrt()
    }

    #[inline]
    pub fn e1(&self) -> f64 {
        self.g1 * self.g_to_e()
    }

    #[inline]
    pub fn e2(&self) -> f64 {
        self.g2 * self.g_to_e()
    }

    #[inline]
    fn g_to_e(&self) -> f64 {
        2.0 / (1.0 + self.g1 * self.g1 + self.g2 * self.g2)
    }

    /// Area-preserving transformation matrix that applies this shear to a profile.
    ///
    /// `A = 1/sqrt(1 - |g|²) [[1 + g1, g2], [g2, 1 - g1]]`, det(A) = 1.
    pub fn matrix(&self) -> DMat2 {
        let norm = 1.0 / (1.0 - self.g1 * self.g1 - self.g2 * self.g2).sqrt();
        DMat2::from_cols_array(&[
            (1.0 + self.g1) * norm,
            self.g2 * norm,
            self.g2 * norm,
            (1.0 - self.g1) * norm,
        ])
    }

    /// Shear composition law, dropping the residual rotation.
    ///
    /// In complex notation `(a + b) / (1 + conj(b) a)`. Not commutative.
    pub fn compose(&self, other: &Shear) -> Shear {
        let (a1, a2) = (self.g1, self.g2);
        let (b1, b2) = (other.g1, other.g2);
        let num1 = a1 + b1;
        let num2 = a2 + b2;
        // 1 + conj(b) * a
        let den1 = 1.0 + b1 * a1 + b2 * a2;
        let den2 = b1 * a2 - b2 * a1;
        let den_sq = den1 * den1 + den2 * den2;
        Shear {
            g1: (num1 * den1 + num2 * den2) / den_sq,
            g2: (num2 * den1 - num1 * den2) / den_sq,
        }
    }
}

impl Neg for Shear {
    type Output = Shear;

    fn neg(self) -> Shear {
        Shear {
            g1: -self.g1,
            g2: -self.g2,
        }
    }
}

impl Add for Shear {
    type Output = Shear;

    fn add(self, other: Shear) -> Shear {
        self.compose(&other)
    }
}

impl Sub for Shear {
    type Output = Shear;

    fn sub(self, other: Shear) -> Shear {
        self.compose(&-other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_g_e_round_trip() {
        let shear = Shear::from_g(0.3, -0.2).unwrap();
        let back = Shear::from_e(shear.e1(), shear.e2()).unwrap();
        assert!((back.g1() - 0.3).abs() < 1e-14);
        assert!((back.g2() + 0.2).abs() < 1e-14);
    }

    #[test]
    fn test_distortion_magnitude() {
        let shear = Shear::from_g(0.5, 0.0).unwrap();
        // |e| = 2|g| / (1 + |g|²) = 1 / 1.25
        assert!((shear.e1() - 0.8).abs() < 1e-14);
        assert_eq!(shear.e2(), 0.0);
    }

    #[test]
    fn test_out_of_domain() {
        assert!(matches!(Shear::from_g(1.0, 0.0), Err(FitError::Domain(_))));
        assert!(matches!(Shear::from_g(0.8, 0.8), Err(FitError::Domain(_))));
        assert!(matches!(Shear::from_e(0.0, -1.2), Err(FitError::Domain(_))));
        assert!(matches!(Shear::from_g(f64::NAN, 0.0), Err(FitError::Domain(_))));
    }

    #[test]
    fn test_matrix_is_area_preserving() {
        let shear = Shear::from_g(0.2, 0.15).unwrap();
        assert!((shear.matrix().determinant() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_compose_collinear_matches_tanh_addition() {
        // Collinear shears add as rapidities: g = tanh(eta / 2).
        let a = Shear::from_g(0.2, 0.0).unwrap();
        let b = Shear::from_g(0.1, 0.0).unwrap();
        let expected = (0.2 + 0.1) / (1.0 + 0.2 * 0.1);
        let sum = a + b;
        assert!((sum.g1() - expected).abs() < 1e-14);
        assert!(sum.g2().abs() < 1e-14);
    }

    #[test]
    fn test_subtracting_self_is_identity() {
        let a = Shear::from_g(0.05, -0.02).unwrap();
        let diff = a - a;
        assert!(diff.g() < 1e-15);
    }

    #[test]
    fn test_compose_with_identity() {
        let a = Shear::from_g(-0.3, 0.4).unwrap();
        let sum = a + Shear::IDENTITY;
        assert!((sum.g1() + 0.3).abs() < 1e-15);
        assert!((sum.g2() - 0.4).abs() < 1e-15);
    }

    #[test]
    fn test_compose_stays_in_unit_disk() {
        let a = Shear::from_g(0.6, 0.5).unwrap();
        let b = Shear::from_g(0.5, 0.6).unwrap();
        assert!((a + b).g() < 1.0);
    }
}
