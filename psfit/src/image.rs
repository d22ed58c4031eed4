//! Pixel stamps with bounds and a uniform pixel scale.

use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::slice;

use glam::{DVec2, IVec2};

/// A row-major stamp of `f64` pixels.
///
/// Pixel `(i, j)` of the buffer sits at pixel coordinate `origin + (i, j)`;
/// its center is that integer position. World coordinates are pixel
/// offsets multiplied by `scale` (arcsec per pixel, or 1 for pixel units).
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pixels: Vec<f64>,
    width: usize,
    height: usize,
    origin: IVec2,
    scale: f64,
}

impl Image {
    pub fn new(width: usize, height: usize, pixels: Vec<f64>) -> Self {
        assert_eq!(
            pixels.len(),
            width * height,
            "pixels length must equal width * height"
        );
        Self {
            pixels,
            width,
            height,
            origin: IVec2::ZERO,
            scale: 1.0,
        }
    }

    pub fn new_filled(width: usize, height: usize, value: f64) -> Self {
        Self::new(width, height, vec![value; width * height])
    }

    /// Move the lower-left pixel to `origin`.
    pub fn with_origin(mut self, origin: IVec2) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        assert!(scale > 0.0, "pixel scale must be positive, got {}", scale);
        self.scale = scale;
        self
    }

    /// A zeroed image with the same geometry.
    pub fn zeros_like(&self) -> Self {
        Self {
            pixels: vec![0.0; self.pixels.len()],
            width: self.width,
            height: self.height,
            origin: self.origin,
            scale: self.scale,
        }
    }

    /// Same geometry, different pixel values.
    pub fn with_pixels(&self, pixels: Vec<f64>) -> Self {
        assert_eq!(pixels.len(), self.pixels.len(), "pixel count mismatch");
        Self {
            pixels,
            width: self.width,
            height: self.height,
            origin: self.origin,
            scale: self.scale,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        debug_assert!(x < self.width && y < self.height);
        self.pixels[y * self.width + x]
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn origin(&self) -> IVec2 {
        self.origin
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[inline]
    pub fn pixels(&self) -> &[f64] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [f64] {
        &mut self.pixels
    }

    #[inline]
    pub fn into_vec(self) -> Vec<f64> {
        self.pixels
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, f64> {
        self.pixels.iter()
    }

    /// Pixel coordinate of the geometric center of the stamp.
    pub fn true_center(&self) -> DVec2 {
        self.origin.as_dvec2()
            + DVec2::new(
                (self.width as f64 - 1.0) * 0.5,
                (self.height as f64 - 1.0) * 0.5,
            )
    }

    /// Pixel coordinate of the center of buffer pixel `(x, y)`.
    #[inline]
    pub fn pixel_pos(&self, x: usize, y: usize) -> DVec2 {
        DVec2::new(
            (self.origin.x as f64) + x as f64,
            (self.origin.y as f64) + y as f64,
        )
    }

    /// Number of pixels that are not exactly zero.
    pub fn count_nonzero(&self) -> usize {
        self.pixels.iter().filter(|&&v| v != 0.0).count()
    }

    pub fn sum(&self) -> f64 {
        self.pixels.iter().sum()
    }

    /// Returns true when both stamps cover the same pixels at the same scale.
    pub fn same_geometry(&self, other: &Image) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.origin == other.origin
            && self.scale == other.scale
    }
}

impl Index<(usize, usize)> for Image {
    type Output = f64;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.pixels[y * self.width + x]
    }
}

impl IndexMut<(usize, usize)> for Image {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        &mut self.pixels[y * self.width + x]
    }
}

impl Deref for Image {
    type Target = [f64];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.pixels
    }
}

impl DerefMut for Image {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.pixels
    }
}

impl<'a> IntoIterator for &'a Image {
    type Item = &'a f64;
    type IntoIter = slice::Iter<'a, f64>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.pixels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stores_dimensions() {
        let img = Image::new(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(img.width(), 3);
        assert_eq!(img.height(), 2);
        assert_eq!(img.len(), 6);
        assert_eq!(img.origin(), IVec2::ZERO);
        assert_eq!(img.scale(), 1.0);
    }

    #[test]
    #[should_panic(expected = "pixels length must equal width * height")]
    fn test_new_panics_on_size_mismatch() {
        Image::new(3, 2, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_get_row_major() {
        // row 0 = [10, 20, 30], row 1 = [40, 50, 60]
        let img = Image::new(3, 2, vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
        assert_eq!(img.get(2, 0), 30.0);
        assert_eq!(img.get(0, 1), 40.0);
        assert_eq!(img[(2, 1)], 60.0);
    }

    #[test]
    fn test_true_center_follows_origin() {
        let img = Image::new_filled(32, 32, 0.0).with_origin(IVec2::new(1, 1));
        assert_eq!(img.true_center(), DVec2::new(16.5, 16.5));

        let odd = Image::new_filled(5, 3, 0.0).with_origin(IVec2::new(-2, 10));
        assert_eq!(odd.true_center(), DVec2::new(0.0, 11.0));
    }

    #[test]
    fn test_pixel_pos() {
        let img = Image::new_filled(4, 4, 0.0).with_origin(IVec2::new(10, 20));
        assert_eq!(img.pixel_pos(0, 0), DVec2::new(10.0, 20.0));
        assert_eq!(img.pixel_pos(3, 1), DVec2::new(13.0, 21.0));
    }

    #[test]
    fn test_count_nonzero() {
        let img = Image::new(2, 2, vec![0.0, 1.0, 0.0, 2.5]);
        assert_eq!(img.count_nonzero(), 2);
    }

    #[test]
    fn test_zeros_like_keeps_geometry() {
        let img = Image::new_filled(3, 4, 7.0)
            .with_origin(IVec2::new(5, 6))
            .with_scale(0.26);
        let zeros = img.zeros_like();
        assert!(zeros.same_geometry(&img));
        assert_eq!(zeros.sum(), 0.0);
    }

    #[test]
    #[should_panic(expected = "pixel scale must be positive")]
    fn test_negative_scale_panics() {
        let _ = Image::new_filled(2, 2, 0.0).with_scale(-1.0);
    }
}
