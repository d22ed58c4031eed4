//! Shape parameter bases.
//!
//! The fit vector carries size and ellipticity either as `(scale, g1, g2)`
//! or as unnormalized second moments `(e0, e1, e2)`. Every component that
//! touches shape parameters goes through [`ShapeBasis`] instead of branching
//! on a flag.

use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};
use crate::lm::ParamName;
use crate::shear::Shear;

/// Bound on |g1|, |g2| in the normalized basis.
///
/// Keeps the minimizer away from |g| = 1; a PSF this elliptical would be a
/// much bigger problem than this limit.
pub const MAX_REDUCED_SHEAR: f64 = 0.7;

/// Bound on |e1|, |e2| in the unnormalized basis.
pub const MAX_UNNORMALIZED_ELLIPTICITY: f64 = 5.0;

/// Size and shape in the normalized basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub scale: f64,
    pub shear: Shear,
}

impl Shape {
    pub fn new(scale: f64, g1: f64, g2: f64) -> Result<Self> {
        Ok(Self {
            scale,
            shear: Shear::from_g(g1, g2)?,
        })
    }
}

/// Which triple the fit vector stores for size and shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShapeBasis {
    /// `(scale, g1, g2)`.
    #[default]
    Normalized,
    /// `(e0, e1, e2)`: second moments scaled so that `e0² - e1² - e2² = 4 scale⁴`.
    Unnormalized,
}

impl ShapeBasis {
    pub fn from_flag(unnormalized: bool) -> Self {
        if unnormalized {
            ShapeBasis::Unnormalized
        } else {
            ShapeBasis::Normalized
        }
    }

    /// Decode a basis-native triple into a normalized shape.
    pub fn decode(self, triple: [f64; 3]) -> Result<Shape> {
        let [a, b, c] = triple;
        match self {
            ShapeBasis::Normalized => Shape::new(a, b, c),
            ShapeBasis::Unnormalized => {
                let (scale, g1, g2) = to_normalized(a, b, c)?;
                Shape::new(scale, g1, g2)
            }
        }
    }

    /// Encode a normalized shape as a basis-native triple.
    pub fn encode(self, shape: &Shape) -> Result<[f64; 3]> {
        match self {
            ShapeBasis::Normalized => Ok([shape.scale, shape.shear.g1(), shape.shear.g2()]),
            ShapeBasis::Unnormalized => {
                let (e0, e1, e2) =
                    to_unnormalized(shape.scale, shape.shear.g1(), shape.shear.g2())?;
                Ok([e0, e1, e2])
            }
        }
    }

    /// The canonical starting shape (`scale = 1`, round) in this basis.
    pub fn default_triple(self) -> [f64; 3] {
        match self {
            ShapeBasis::Normalized => [1.0, 0.0, 0.0],
            ShapeBasis::Unnormalized => [2.0, 0.0, 0.0],
        }
    }

    pub fn param_names(self) -> [ParamName; 3] {
        match self {
            ShapeBasis::Normalized => [ParamName::Scale, ParamName::G1, ParamName::G2],
            ShapeBasis::Unnormalized => [ParamName::E0, ParamName::E1, ParamName::E2],
        }
    }

    /// Symmetric bound applied to both ellipticity components during a fit.
    pub fn ellipticity_bound(self) -> f64 {
        match self {
            ShapeBasis::Normalized => MAX_REDUCED_SHEAR,
            ShapeBasis::Unnormalized => MAX_UNNORMALIZED_ELLIPTICITY,
        }
    }
}

/// `(scale, g1, g2)` → `(e0, e1, e2)`.
pub fn to_unnormalized(scale: f64, g1: f64, g2: f64) -> Result<(f64, f64, f64)> {
    let shear = Shear::from_g(g1, g2)?;
    let e1norm = shear.e1();
    let e2norm = shear.e2();
    let denom = 1.0 - e1norm * e1norm - e2norm * e2norm;
    if !(denom > 0.0) {
        return Err(FitError::Domain(format!(
            "distortion of g = ({g1}, {g2}) is on the unit circle"
        )));
    }
    let e0 = (4.0 * scale.powi(4) / denom).sqrt();
    Ok((e0, e1norm * e0, e2norm * e0))
}

/// `(e0, e1, e2)` → `(scale, g1, g2)`.
pub fn to_normalized(e0: f64, e1: f64, e2: f64) -> Result<(f64, f64, f64)> {
    if !(e0 > 0.0) {
        return Err(FitError::Domain(format!("e0 = {e0} must be positive")));
    }
    let shear = Shear::from_e(e1 / e0, e2 / e0)?;
    let scale = ((e0 * e0 - e1 * e1 - e2 * e2).sqrt() * 0.5).sqrt();
    Ok((scale, shear.g1(), shear.g2()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rel(actual: f64, expected: f64, tol: f64) {
        let scale = expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= tol * scale,
            "{actual} vs {expected}"
        );
    }

    #[test]
    fn test_round_trip_over_grid() {
        for &scale in &[0.3, 1.0, 1.3, 4.7] {
            for &g1 in &[-0.6, -0.05, 0.0, 0.2, 0.69] {
                for &g2 in &[-0.5, 0.0, 0.02, 0.4] {
                    let (e0, e1, e2) = to_unnormalized(scale, g1, g2).unwrap();
                    let (s, h1, h2) = to_normalized(e0, e1, e2).unwrap();
                    assert_rel(s, scale, 1e-9);
                    assert_rel(h1, g1, 1e-9);
                    assert_rel(h2, g2, 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_round_shape_has_e0_twice_scale_squared() {
        let (e0, e1, e2) = to_unnormalized(1.5, 0.0, 0.0).unwrap();
        assert_rel(e0, 2.0 * 1.5 * 1.5, 1e-14);
        assert_eq!(e1, 0.0);
        assert_eq!(e2, 0.0);
    }

    #[test]
    fn test_invariant_mass() {
        let (e0, e1, e2) = to_unnormalized(1.3, 0.05, -0.02).unwrap();
        assert_rel(e0 * e0 - e1 * e1 - e2 * e2, 4.0 * 1.3f64.powi(4), 1e-12);
    }

    #[test]
    fn test_default_triples_describe_the_same_shape() {
        let a = ShapeBasis::Normalized
            .decode(ShapeBasis::Normalized.default_triple())
            .unwrap();
        let b = ShapeBasis::Unnormalized
            .decode(ShapeBasis::Unnormalized.default_triple())
            .unwrap();
        assert_rel(a.scale, b.scale, 1e-14);
        assert_eq!(a.shear, b.shear);
    }

    #[test]
    fn test_domain_errors() {
        assert!(matches!(
            to_unnormalized(1.0, 0.9, 0.5),
            Err(FitError::Domain(_))
        ));
        assert!(matches!(
            to_normalized(1.0, 1.0, 0.1),
            Err(FitError::Domain(_))
        ));
        assert!(matches!(
            to_normalized(0.0, 0.0, 0.0),
            Err(FitError::Domain(_))
        ));
        assert!(matches!(
            to_normalized(-2.0, 0.0, 0.0),
            Err(FitError::Domain(_))
        ));
    }

    #[test]
    fn test_basis_names_and_bounds() {
        let names = ShapeBasis::Normalized.param_names().map(|n| n.to_string());
        assert_eq!(names, ["scale", "g1", "g2"]);
        let names = ShapeBasis::Unnormalized.param_names().map(|n| n.to_string());
        assert_eq!(names, ["e0", "e1", "e2"]);
        assert_eq!(ShapeBasis::Normalized.ellipticity_bound(), 0.7);
        assert_eq!(ShapeBasis::Unnormalized.ellipticity_bound(), 5.0);
        assert_eq!(ShapeBasis::from_flag(true), ShapeBasis::Unnormalized);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let shape = Shape::new(1.3, 0.05, -0.02).unwrap();
        for basis in [ShapeBasis::Normalized, ShapeBasis::Unnormalized] {
            let triple = basis.encode(&shape).unwrap();
            let back = basis.decode(triple).unwrap();
            assert_rel(back.scale, 1.3, 1e-12);
            assert_rel(back.shear.g1(), 0.05, 1e-12);
            assert_rel(back.shear.g2(), -0.02, 1e-12);
        }
    }
}
