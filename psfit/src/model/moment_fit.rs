//! Single-step moment matching.

use crate::basis::Shape;
use crate::error::Result;
use crate::lm::Minimizer;
use crate::moments::MomentEstimator;
use crate::render::Renderer;
use crate::star::Star;

use super::{FitValues, Model};

impl<R, E, M> Model<R, E, M>
where
    R: Renderer,
    E: MomentEstimator,
    M: Minimizer,
{
    /// Move the current fit towards the star by comparing moments.
    ///
    /// The model drawn from the current fit is measured and each parameter
    /// is corrected by the data/model mismatch: flux and size by ratio,
    /// center by difference, shear by composition. One step; call again to
    /// iterate. A star without parameters starts from the default shape.
    pub fn moment_fit(&self, star: &Star) -> Result<FitValues> {
        if star.fit().params.is_none() {
            return self.moment_fit(&star.with_fit(self.default_fit()));
        }
        let data = match star.data().moments() {
            Some(m) => *m,
            None => self.measure(star.data(), "data")?,
        };
        let drawn = self.draw(star)?;
        let model = self.measure(drawn.data(), "model")?;

        let current = self.current_values(star)?;
        let shape = self.decode_shape(current.triple())?;
        tracing::debug!(
            "Moment fit start: {:?} {:?} -> scale {:.4e}, g ({:+.4e}, {:+.4e})",
            self.basis(),
            current.triple(),
            shape.scale,
            shape.shear.g1(),
            shape.shear.g2()
        );

        let flux = current.flux * data.flux / model.flux;
        let offset = current.offset() + (data.center - model.center);
        let updated = Shape {
            scale: shape.scale * data.size / model.size,
            shear: shape.shear + (data.shear()? - model.shear()?),
        };
        let triple = self.basis().encode(&updated)?;

        tracing::debug!(
            "Moment fit result: scale {:.4e}, g ({:+.4e}, {:+.4e}) -> {:?} {:?}",
            updated.scale,
            updated.shear.g1(),
            updated.shear.g2(),
            self.basis(),
            triple
        );

        Ok(FitValues::new(flux, offset, triple))
    }
}
