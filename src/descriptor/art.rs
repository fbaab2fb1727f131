// ART descriptor
// Size measures followed by the ART module of every (p, r) cell

use super::{DescriptorError, ShapeDescriptor};
use crate::glyph::Glyph;
use crate::moments::art::{self, cells};
use crate::moments::{
    ArtExtractor, ArtMoments, BasicArtMoments, GeometricExtractor, GeometricMoments,
    MomentsExtractor,
};

const SIZE_LABELS: [&str; 3] = ["weight", "width", "height"];

pub struct ArtDescriptor {
    labels: Vec<String>,
    extractor: ArtExtractor<'static>,
}

impl ArtDescriptor {
    pub fn new() -> Self {
        let labels = SIZE_LABELS
            .iter()
            .map(|l| l.to_string())
            .chain(cells().map(|(p, r)| art::label(p, r)))
            .collect();

        ArtDescriptor {
            labels,
            extractor: ArtExtractor::tabulated(),
        }
    }
}

impl Default for ArtDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeDescriptor for ArtDescriptor {
    fn name(&self) -> &str {
        "art"
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn features(&self, glyph: &Glyph) -> Result<Vec<f64>, DescriptorError> {
        let mut geo = GeometricMoments::default();
        GeometricExtractor::new(glyph.interline()).extract(glyph.xs(), glyph.ys(), &mut geo)?;

        let mut moments = BasicArtMoments::default();
        self.extractor
            .extract(glyph.xs(), glyph.ys(), &mut moments)?;

        let mut features = Vec::with_capacity(self.labels.len());
        features.extend([geo.weight, geo.width, geo.height]);
        features.extend(cells().map(|(p, r)| moments.module(p, r)));

        Ok(features)
    }
}
