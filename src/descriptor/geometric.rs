// Geometric descriptor
// Size measures, normalized central moments and Hu invariants

use super::{DescriptorError, ShapeDescriptor};
use crate::glyph::Glyph;
use crate::moments::geometric::{HU_LABELS, LABELS};
use crate::moments::{GeometricExtractor, GeometricMoments, MomentsExtractor};

pub struct GeometricDescriptor {
    labels: Vec<String>,
}

impl GeometricDescriptor {
    pub fn new() -> Self {
        GeometricDescriptor {
            labels: LABELS
                .iter()
                .chain(HU_LABELS.iter())
                .map(|l| l.to_string())
                .collect(),
        }
    }
}

impl Default for GeometricDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeDescriptor for GeometricDescriptor {
    fn name(&self) -> &str {
        "geometric"
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn features(&self, glyph: &Glyph) -> Result<Vec<f64>, DescriptorError> {
        let mut moments = GeometricMoments::default();
        GeometricExtractor::new(glyph.interline())
            .with_hu()
            .extract(glyph.xs(), glyph.ys(), &mut moments)?;

        Ok(moments.to_vec())
    }
}
