//! Parallel operations over many stars.
//!
//! Stars are independent, so each gets its own result; one failure does
//! not affect the others.

use rayon::prelude::*;

use crate::error::Result;
use crate::lm::Minimizer;
use crate::moments::MomentEstimator;
use crate::render::Renderer;
use crate::star::Star;

use super::Model;

impl<R, E, M> Model<R, E, M>
where
    R: Renderer + Sync,
    E: MomentEstimator + Sync,
    M: Minimizer + Sync,
{
    pub fn initialize_stars(&self, stars: &[Star]) -> Vec<Result<Star>> {
        stars.par_iter().map(|star| self.initialize(star)).collect()
    }

    pub fn fit_stars(&self, stars: &[Star], fastfit: Option<bool>) -> Vec<Result<Star>> {
        stars
            .par_iter()
            .map(|star| self.fit(star, fastfit))
            .collect()
    }

    pub fn reflux_stars(&self, stars: &[Star], fit_center: bool) -> Vec<Result<Star>> {
        stars
            .par_iter()
            .map(|star| self.reflux(star, fit_center))
            .collect()
    }
}
