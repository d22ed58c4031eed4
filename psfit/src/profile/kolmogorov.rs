//! Kolmogorov turbulence profile, tabulated in real space.
//!
//! The profile is defined by its Fourier transform
//! T(k) = exp(-(k / k₀)^(5/3)). The real-space radial profile is the Hankel
//! transform I(r) = 1/2π ∫ T(k) J₀(kr) k dk, evaluated once on a radial
//! grid and rescaled so that the half-light radius is 1.

use std::sync::{Arc, OnceLock};

use glam::DVec2;

use super::INV_TWO_PI;

/// Outer radius of the table, in half-light radii.
const TABLE_MAX_RADIUS: f64 = 20.0;

/// Table spacing, in half-light radii.
const TABLE_STEP: f64 = 0.02;

/// T(k) < 1e-19 beyond this wavenumber (k₀ = 1).
const K_MAX: f64 = 12.0;

/// Simpson intervals over [0, K_MAX]; must be even.
const K_STEPS: usize = 6000;

/// Large-radius power law: I(r) ∝ r^(-11/3).
const TAIL_SLOPE: f64 = -11.0 / 3.0;

static SHARED: OnceLock<Arc<Kolmogorov>> = OnceLock::new();

#[derive(Debug)]
pub struct Kolmogorov {
    /// Surface brightness at r = i × TABLE_STEP (unit flux, unit half-light radius).
    table: Vec<f64>,
}

impl Kolmogorov {
    /// The process-wide table; built on first use.
    pub fn shared() -> Arc<Kolmogorov> {
        SHARED.get_or_init(|| Arc::new(Kolmogorov::build())).clone()
    }

    fn build() -> Self {
        let hlr = half_light_radius();
        let n = (TABLE_MAX_RADIUS / TABLE_STEP).round() as usize;
        let hlr2 = hlr * hlr;
        let table = (0..=n)
            .map(|i| hlr2 * hankel_j0(i as f64 * TABLE_STEP * hlr))
            .collect();
        tracing::debug!(
            "Tabulated Kolmogorov profile: {} nodes, raw half-light radius {:.6}",
            n + 1,
            hlr
        );
        Self { table }
    }

    #[inline]
    pub fn xvalue(&self, pos: DVec2) -> f64 {
        self.radial(pos.length())
    }

    pub fn radial(&self, r: f64) -> f64 {
        let last = self.table.len() - 1;
        let t = r / TABLE_STEP;
        if t >= last as f64 {
            let r_max = last as f64 * TABLE_STEP;
            return self.table[last] * (r / r_max).powf(TAIL_SLOPE);
        }
        let i = t as usize;
        let frac = t - i as f64;
        self.table[i] * (1.0 - frac) + self.table[i + 1] * frac
    }
}

#[inline]
fn transfer(k: f64) -> f64 {
    (-k.powf(5.0 / 3.0)).exp()
}

/// Composite Simpson's rule over [0, K_MAX].
fn simpson(f: impl Fn(f64) -> f64) -> f64 {
    let h = K_MAX / K_STEPS as f64;
    let mut sum = f(0.0) + f(K_MAX);
    for i in 1..K_STEPS {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(i as f64 * h);
    }
    sum * h / 3.0
}

/// I(r) for k₀ = 1.
fn hankel_j0(r: f64) -> f64 {
    INV_TWO_PI * simpson(|k| transfer(k) * libm::j0(k * r) * k)
}

/// Flux inside radius `r` for k₀ = 1: r ∫ T(k) J₁(kr) dk.
fn enclosed_flux(r: f64) -> f64 {
    r * simpson(|k| transfer(k) * libm::j1(k * r))
}

fn half_light_radius() -> f64 {
    let mut lo = 1e-3;
    let mut hi = 20.0;
    for _ in 0..60 {
        let mid = 0.5 * (lo + hi);
        if enclosed_flux(mid) < 0.5 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}
