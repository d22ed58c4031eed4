//! Drawing profiles onto pixel stamps.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::config::RenderConfig;
use crate::image::Image;
use crate::profile::Profile;

/// How a profile is turned into pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrawMethod {
    /// Integrate the surface brightness over each pixel's area.
    #[default]
    Auto,
    /// Surface brightness at the pixel center times the pixel area.
    NoPixel,
}

/// Renders a profile onto the geometry of a template image.
///
/// The profile origin lands on pixel coordinate `image_pos`; world offsets
/// are pixel offsets times the template's pixel scale. Pixel values are
/// fluxes, so a fully contained unit-flux profile sums to ~1.
pub trait Renderer {
    fn render(
        &self,
        profile: &Profile,
        template: &Image,
        image_pos: DVec2,
        method: DrawMethod,
    ) -> Image;
}

/// Direct real-space renderer.
///
/// `DrawMethod::Auto` averages an `oversampling × oversampling` grid of
/// sub-pixel samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRenderer {
    oversampling: usize,
}

impl Default for PixelRenderer {
    fn default() -> Self {
        Self::new(&RenderConfig::default())
    }
}

impl PixelRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        config.validate();
        Self {
            oversampling: config.oversampling,
        }
    }
}

impl Renderer for PixelRenderer {
    fn render(
        &self,
        profile: &Profile,
        template: &Image,
        image_pos: DVec2,
        method: DrawMethod,
    ) -> Image {
        let sampler = profile.sampler();
        let scale = template.scale();
        let pixel_area = scale * scale;
        let mut image = template.zeros_like();

        let offsets: Vec<DVec2> = match method {
            DrawMethod::NoPixel => vec![DVec2::ZERO],
            DrawMethod::Auto => {
                let n = self.oversampling;
                let step = 1.0 / n as f64;
                (0..n)
                    .flat_map(|j| {
                        (0..n).map(move |i| {
                            DVec2::new(
                                (i as f64 + 0.5) * step - 0.5,
                                (j as f64 + 0.5) * step - 0.5,
                            )
                        })
                    })
                    .collect()
            }
        };
        let weight = pixel_area / offsets.len() as f64;

        for y in 0..template.height() {
            for x in 0..template.width() {
                let center = template.pixel_pos(x, y) - image_pos;
                let sum: f64 = offsets
                    .iter()
                    .map(|&d| sampler.xvalue((center + d) * scale))
                    .sum();
                image[(x, y)] = sum * weight;
            }
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use glam::IVec2;

    use super::*;
    use crate::profile::{Fiducial, Gaussian};
    use crate::shear::Shear;

    fn gaussian(scale: f64) -> Profile {
        Profile::new(Fiducial::Gaussian(Gaussian)).dilate(scale)
    }

    #[test]
    fn test_flux_is_conserved() {
        let template = Image::new_filled(31, 31, 0.0);
        let renderer = PixelRenderer::default();
        for method in [DrawMethod::Auto, DrawMethod::NoPixel] {
            let image = renderer.render(
                &(gaussian(2.0) * 500.0),
                &template,
                template.true_center(),
                method,
            );
            assert!((image.sum() - 500.0).abs() < 1e-3, "{method:?}");
        }
    }

    #[test]
    fn test_peak_lands_on_image_pos() {
        let template = Image::new_filled(21, 21, 0.0).with_origin(IVec2::new(100, 200));
        let image = PixelRenderer::default().render(
            &gaussian(1.5),
            &template,
            DVec2::new(106.0, 213.0),
            DrawMethod::Auto,
        );
        let (argmax, _) = image
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) });
        assert_eq!(argmax % 21, 6);
        assert_eq!(argmax / 21, 13);
    }

    #[test]
    fn test_pixel_integration_lowers_peak() {
        let template = Image::new_filled(15, 15, 0.0);
        let renderer = PixelRenderer::default();
        let center = template.true_center();
        let narrow = gaussian(0.8);
        let auto = renderer.render(&narrow, &template, center, DrawMethod::Auto);
        let no_pixel = renderer.render(&narrow, &template, center, DrawMethod::NoPixel);
        assert!(auto[(7, 7)] < no_pixel[(7, 7)]);
    }

    #[test]
    fn test_pixel_scale_maps_to_world_units() {
        // A profile of size 0.5 world units on 0.5 unit pixels looks like
        // size 1 on unit pixels.
        let renderer = PixelRenderer::default();
        let unit = Image::new_filled(17, 17, 0.0);
        let fine = unit.clone().with_scale(0.5);
        let a = renderer.render(&gaussian(1.0), &unit, unit.true_center(), DrawMethod::Auto);
        let b = renderer.render(&gaussian(0.5), &fine, fine.true_center(), DrawMethod::Auto);
        for (va, vb) in a.iter().zip(b.iter()) {
            assert!((va - vb).abs() < 1e-14);
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let template = Image::new_filled(19, 19, 0.0);
        let shear = Shear::from_g(0.1, 0.05).unwrap();
        let profile = gaussian(1.2).shear(&shear) * 10.0;
        let renderer = PixelRenderer::default();
        let a = renderer.render(&profile, &template, DVec2::new(9.3, 8.8), DrawMethod::Auto);
        let b = renderer.render(&profile, &template, DVec2::new(9.3, 8.8), DrawMethod::Auto);
        assert_eq!(a, b);
    }
}
