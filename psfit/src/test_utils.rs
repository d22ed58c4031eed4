//! Shared test utilities: synthetic star stamps and noise.

use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::image::Image;
use crate::profile::{Fiducial, Gaussian, Profile};
use crate::render::{DrawMethod, PixelRenderer, Renderer};
use crate::shear::Shear;
use crate::star::{Star, StarData};

/// Compare with absolute + relative tolerance.
pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol * a.abs().max(b.abs()).max(1.0)
}

/// A Gaussian of size `scale`, shape `(g1, g2)` and total flux `flux`,
/// displaced by `center` (world units) from the origin.
pub fn gaussian_profile(scale: f64, g1: f64, g2: f64, flux: f64, center: DVec2) -> Profile {
    let shear = Shear::from_g(g1, g2).unwrap();
    Profile::new(Fiducial::Gaussian(Gaussian))
        .dilate(scale)
        .shear(&shear)
        .shift(center)
        * flux
}

/// Render `profile` on a `size × size` unit-scale stamp, centered on the
/// stamp's true center.
pub fn render_stamp(profile: &Profile, size: usize, method: DrawMethod) -> Image {
    let template = Image::new_filled(size, size, 0.0);
    let image_pos = template.true_center();
    PixelRenderer::default().render(profile, &template, image_pos, method)
}

/// Unfitted star with unit weights, nominal position at the stamp center.
pub fn make_star(image: Image) -> Star {
    Star::from_data(StarData::from_image(image))
}

/// Noiseless pixel-integrated Gaussian star.
pub fn make_gaussian_star(size: usize, scale: f64, g1: f64, g2: f64, flux: f64) -> Star {
    let profile = gaussian_profile(scale, g1, g2, flux, DVec2::ZERO);
    make_star(render_stamp(&profile, size, DrawMethod::Auto))
}

/// Add Gaussian noise of standard deviation `sigma` (Box-Muller on a seeded StdRng).
pub fn add_noise(pixels: &mut [f64], sigma: f64, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for p in pixels.iter_mut() {
        let u1: f64 = rng.random::<f64>().max(1e-300);
        let u2: f64 = rng.random();
        *p += sigma * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    }
}
