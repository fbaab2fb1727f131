// Mixed descriptor
// Size measures, one orthogonal moment family and the aspect ratio

use serde::{Deserialize, Serialize};

use super::{DescriptorError, ShapeDescriptor};
use crate::glyph::Glyph;
use crate::moments::art::{self, cells};
use crate::moments::{
    ArtExtractor, ArtMoments, BasicArtMoments, GeometricExtractor, GeometricMoments,
    LegendreExtractor, LegendreMoments, MomentsExtractor,
};

/// Orthogonal moments carried by a mixed descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrthogonalFamily {
    Legendre,
    Art,
}

pub struct MixedDescriptor {
    family: OrthogonalFamily,
    name: String,
    labels: Vec<String>,
}

impl MixedDescriptor {
    pub fn new(family: OrthogonalFamily) -> Self {
        let mut labels: Vec<String> = ["weight", "width", "height"]
            .iter()
            .map(|l| l.to_string())
            .collect();

        match family {
            OrthogonalFamily::Legendre => {
                labels.extend(LegendreMoments::cells().map(|(m, n)| LegendreMoments::label(m, n)))
            }
            OrthogonalFamily::Art => labels.extend(cells().map(|(p, r)| art::label(p, r))),
        }

        labels.push("aspect".to_string());

        let name = match family {
            OrthogonalFamily::Legendre => "mixed-legendre",
            OrthogonalFamily::Art => "mixed-art",
        };

        MixedDescriptor {
            family,
            name: name.to_string(),
            labels,
        }
    }

    pub fn family(&self) -> OrthogonalFamily {
        self.family
    }
}

impl ShapeDescriptor for MixedDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn features(&self, glyph: &Glyph) -> Result<Vec<f64>, DescriptorError> {
        let (xs, ys) = (glyph.xs(), glyph.ys());

        let mut geo = GeometricMoments::default();
        GeometricExtractor::new(glyph.interline()).extract(xs, ys, &mut geo)?;

        let mut features = Vec::with_capacity(self.labels.len());
        features.extend([geo.weight, geo.width, geo.height]);

        match self.family {
            OrthogonalFamily::Legendre => {
                let mut moments = LegendreMoments::default();
                LegendreExtractor::tabulated().extract(xs, ys, &mut moments)?;
                features.extend(moments.to_vec());
            }
            OrthogonalFamily::Art => {
                let mut moments = BasicArtMoments::default();
                ArtExtractor::tabulated().extract(xs, ys, &mut moments)?;
                features.extend(cells().map(|(p, r)| moments.module(p, r)));
            }
        }

        // Width and height are at least one pixel for a non-empty glyph
        features.push(geo.height / geo.width);

        Ok(features)
    }
}
