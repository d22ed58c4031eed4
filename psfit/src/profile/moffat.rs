//! Moffat profile with unit half-light radius.
//!
//! I(r) = norm × (1 + (r/r_d)²)^(-β), optionally truncated at `trunc`
//! half-light radii.

use std::f64::consts::{PI, SQRT_2};

use glam::DVec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moffat {
    beta: f64,
    trunc: f64,
    /// Scale radius r_d.
    rd: f64,
    inv_rd2: f64,
    norm: f64,
}

impl Moffat {
    /// `trunc = 0` disables truncation.
    pub fn new(beta: f64, trunc: f64) -> Self {
        assert!(beta > 1.0, "Moffat beta must be > 1, got {}", beta);
        assert!(
            trunc == 0.0 || trunc > SQRT_2,
            "Moffat trunc must be 0 or exceed sqrt(2) half-light radii, got {}",
            trunc
        );

        let rd = if trunc == 0.0 {
            1.0 / (2.0f64.powf(1.0 / (beta - 1.0)) - 1.0).sqrt()
        } else {
            solve_truncated_rd(beta, trunc)
        };
        let total = if trunc == 0.0 {
            PI * rd * rd / (beta - 1.0)
        } else {
            enclosed(beta, rd, trunc)
        };

        Self {
            beta,
            trunc,
            rd,
            inv_rd2: 1.0 / (rd * rd),
            norm: 1.0 / total,
        }
    }

    #[inline]
    pub fn beta(&self) -> f64 {
        self.beta
    }

    #[inline]
    pub fn trunc(&self) -> f64 {
        self.trunc
    }

    #[inline]
    pub fn scale_radius(&self) -> f64 {
        self.rd
    }

    #[inline]
    pub fn xvalue(&self, pos: DVec2) -> f64 {
        let r2 = pos.length_squared();
        if self.trunc > 0.0 && r2 > self.trunc * self.trunc {
            return 0.0;
        }
        self.norm * (1.0 + r2 * self.inv_rd2).powf(-self.beta)
    }
}

/// Unnormalized flux of (1 + (r/rd)²)^(-β) inside radius `r`.
fn enclosed(beta: f64, rd: f64, r: f64) -> f64 {
    let u = 1.0 + r * r / (rd * rd);
    PI * rd * rd * (1.0 - u.powf(1.0 - beta)) / (beta - 1.0)
}

/// Find r_d such that half the truncated flux lies inside r = 1.
///
/// The enclosed fraction falls monotonically from 1 (r_d → 0) to
/// 1/trunc² (r_d → ∞), so bisection in log r_d always brackets it.
fn solve_truncated_rd(beta: f64, trunc: f64) -> f64 {
    let fraction = |rd: f64| enclosed(beta, rd, 1.0) / enclosed(beta, rd, trunc);
    let mut lo = -10.0f64;
    let mut hi = 10.0f64;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if fraction(mid.exp()) > 0.5 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (0.5 * (lo + hi)).exp()
}
