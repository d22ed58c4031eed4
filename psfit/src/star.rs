//! Stars: observed stamp data plus the current fit.
//!
//! A [`Star`] is a value. Fitting operations return new stars that share
//! the [`StarData`] through an `Arc` and carry a replaced [`StarFit`].

use std::sync::Arc;

use glam::DVec2;
use hashbrown::HashMap;
use strum_macros::Display;

use crate::image::Image;
use crate::moments::Moments;

/// Property key under which measured data moments are cached.
pub const HSM_KEY: &str = "hsm";

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Scalar(f64),
    Moments(Moments),
}

/// Observed data for one star. Never modified once built.
#[derive(Debug, Clone)]
pub struct StarData {
    image: Image,
    weight: Image,
    image_pos: DVec2,
    pointing: Option<DVec2>,
    field_pos: DVec2,
    orig_weight: Image,
    properties: HashMap<String, Property>,
}

impl StarData {
    /// `weight` is the per-pixel inverse variance; it must match `image` in
    /// size, origin and scale.
    pub fn new(image: Image, weight: Image, image_pos: DVec2) -> Self {
        assert!(
            image.same_geometry(&weight),
            "weight image must match the data image geometry"
        );
        Self {
            orig_weight: weight.clone(),
            image,
            weight,
            image_pos,
            pointing: None,
            field_pos: DVec2::ZERO,
            properties: HashMap::new(),
        }
    }

    /// Star at the stamp's true center with unit weights.
    pub fn from_image(image: Image) -> Self {
        let weight = image.with_pixels(vec![1.0; image.len()]);
        let image_pos = image.true_center();
        Self::new(image, weight, image_pos)
    }

    pub fn with_pointing(mut self, pointing: DVec2) -> Self {
        self.pointing = Some(pointing);
        self
    }

    pub fn with_field_pos(mut self, field_pos: DVec2) -> Self {
        self.field_pos = field_pos;
        self
    }

    /// Original weight before any rescaling.
    pub fn with_orig_weight(mut self, orig_weight: Image) -> Self {
        assert!(
            self.image.same_geometry(&orig_weight),
            "original weight must match the data image geometry"
        );
        self.orig_weight = orig_weight;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, property: Property) -> Self {
        self.properties.insert(key.into(), property);
        self
    }

    /// Copy carrying `moments` as the cached data moments.
    pub fn with_moments(&self, moments: Moments) -> Self {
        self.clone()
            .with_property(HSM_KEY, Property::Moments(moments))
    }

    /// Copy with `image` as the pixel data. Cached moments describe the old
    /// pixels and are dropped; everything else is carried over.
    pub fn with_image(&self, image: Image) -> Self {
        assert!(
            self.image.same_geometry(&image),
            "replacement image must match the data image geometry"
        );
        let mut properties = self.properties.clone();
        properties.remove(HSM_KEY);
        Self {
            image,
            properties,
            ..self.clone()
        }
    }

    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }

    #[inline]
    pub fn weight(&self) -> &Image {
        &self.weight
    }

    #[inline]
    pub fn image_pos(&self) -> DVec2 {
        self.image_pos
    }

    pub fn pointing(&self) -> Option<DVec2> {
        self.pointing
    }

    pub fn field_pos(&self) -> DVec2 {
        self.field_pos
    }

    pub fn orig_weight(&self) -> &Image {
        &self.orig_weight
    }

    pub fn properties(&self) -> &HashMap<String, Property> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    pub fn scalar(&self, key: &str) -> Option<f64> {
        match self.properties.get(key) {
            Some(Property::Scalar(v)) => Some(*v),
            _ => None,
        }
    }

    /// Cached data moments, if measured.
    pub fn moments(&self) -> Option<&Moments> {
        match self.properties.get(HSM_KEY) {
            Some(Property::Moments(m)) => Some(m),
            _ => None,
        }
    }

    /// Number of pixels that carry information.
    pub fn nonzero_weight_count(&self) -> usize {
        self.weight.count_nonzero()
    }
}

/// Where a fit is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum FitStage {
    #[default]
    Uninitialized,
    /// Default shape plus one fast fit.
    Seeded,
    Fit,
    Refluxed,
}

/// Current fit of a star.
#[derive(Debug, Clone, PartialEq)]
pub struct StarFit {
    /// Model parameters; layout depends on the model configuration.
    pub params: Option<Vec<f64>>,
    pub flux: f64,
    /// Star position offset from `image_pos`, world units.
    pub center: DVec2,
    pub chisq: f64,
    pub dof: i64,
    /// Fisher information blocks; carried through, not computed here.
    pub alpha: Option<Vec<f64>>,
    pub beta: Option<Vec<f64>>,
    pub stage: FitStage,
}

impl Default for StarFit {
    fn default() -> Self {
        Self {
            params: None,
            flux: 1.0,
            center: DVec2::ZERO,
            chisq: 0.0,
            dof: 0,
            alpha: None,
            beta: None,
            stage: FitStage::Uninitialized,
        }
    }
}

impl StarFit {
    pub fn new(params: Vec<f64>, flux: f64, center: DVec2) -> Self {
        Self {
            params: Some(params),
            flux,
            center,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Star {
    data: Arc<StarData>,
    fit: StarFit,
}

impl Star {
    pub fn new(data: StarData, fit: StarFit) -> Self {
        Self {
            data: Arc::new(data),
            fit,
        }
    }

    /// Unfitted star.
    pub fn from_data(data: StarData) -> Self {
        Self::new(data, StarFit::default())
    }

    #[inline]
    pub fn data(&self) -> &StarData {
        &self.data
    }

    pub fn shared_data(&self) -> &Arc<StarData> {
        &self.data
    }

    #[inline]
    pub fn fit(&self) -> &StarFit {
        &self.fit
    }

    /// Same data, new fit.
    pub fn with_fit(&self, fit: StarFit) -> Star {
        Star {
            data: Arc::clone(&self.data),
            fit,
        }
    }

    /// New data, same fit.
    pub fn with_data(&self, data: StarData) -> Star {
        Star {
            data: Arc::new(data),
            fit: self.fit.clone(),
        }
    }

    #[inline]
    pub fn image(&self) -> &Image {
        self.data.image()
    }

    #[inline]
    pub fn weight(&self) -> &Image {
        self.data.weight()
    }

    #[inline]
    pub fn image_pos(&self) -> DVec2 {
        self.data.image_pos()
    }

    #[inline]
    pub fn flux(&self) -> f64 {
        self.fit.flux
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        self.fit.center
    }
}
