// Shape descriptor module
// Turns a glyph into the fixed-length feature vector fed to classifiers

pub mod art;
pub mod geometric;
pub mod mixed;

pub use art::ArtDescriptor;
pub use geometric::GeometricDescriptor;
pub use mixed::{MixedDescriptor, OrthogonalFamily};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::glyph::Glyph;
use crate::moments::MomentsError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Moments extraction failed: {0}")]
    Moments(#[from] MomentsError),
}

/// Fixed-length numerical description of a glyph
pub trait ShapeDescriptor: Send + Sync {
    /// Descriptor name, for logs
    fn name(&self) -> &str;

    /// Feature labels, in vector order
    fn labels(&self) -> &[String];

    /// Number of features
    fn length(&self) -> usize {
        self.labels().len()
    }

    fn label(&self, index: usize) -> Option<&str> {
        self.labels().get(index).map(String::as_str)
    }

    fn index_of(&self, label: &str) -> Option<usize> {
        self.labels().iter().position(|l| l == label)
    }

    /// Feature vector of a glyph, `length()` values in `labels()` order
    fn features(&self, glyph: &Glyph) -> Result<Vec<f64>, DescriptorError>;
}

/// Available descriptor implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptorKind {
    Geometric,
    Art,
    Mixed,
}

impl DescriptorKind {
    pub fn create(&self) -> Box<dyn ShapeDescriptor> {
        match self {
            DescriptorKind::Geometric => Box::new(GeometricDescriptor::new()),
            DescriptorKind::Art => Box::new(ArtDescriptor::new()),
            DescriptorKind::Mixed => Box::new(MixedDescriptor::new(OrthogonalFamily::Legendre)),
        }
    }
}

/// Descriptor used by every classifier of the process
pub const ACTIVE_DESCRIPTOR: DescriptorKind = DescriptorKind::Mixed;

static ACTIVE: Lazy<Box<dyn ShapeDescriptor>> = Lazy::new(|| {
    let descriptor = ACTIVE_DESCRIPTOR.create();
    log::info!(
        "Shape descriptor {} with {} features",
        descriptor.name(),
        descriptor.length()
    );
    descriptor
});

/// The active descriptor
pub fn active() -> &'static dyn ShapeDescriptor {
    &**ACTIVE
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::glyph::Glyph;

    /// Filled rectangle of w x h pixels
    pub fn block(w: i32, h: i32, interline: u32) -> Glyph {
        let points: Vec<(i32, i32)> = (0..h).flat_map(|y| (0..w).map(move |x| (x, y))).collect();
        Glyph::new(points, interline).unwrap()
    }

    /// Ring of outer radius r and thickness t
    pub fn ring(r: i32, t: i32, interline: u32) -> Glyph {
        let inner = (r - t) * (r - t);
        let outer = r * r;
        let points: Vec<(i32, i32)> = (-r..=r)
            .flat_map(|y| (-r..=r).map(move |x| (x, y)))
            .filter(|(x, y)| {
                let d = x * x + y * y;
                d <= outer && d >= inner
            })
            .collect();
        Glyph::new(points, interline).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::Glyph;

    #[test]
    fn test_active_is_mixed() {
        assert_eq!(ACTIVE_DESCRIPTOR, DescriptorKind::Mixed);
        assert_eq!(active().name(), "mixed-legendre");
    }

    #[test]
    fn test_labels_unique_and_indexed() {
        for kind in [DescriptorKind::Geometric, DescriptorKind::Art, DescriptorKind::Mixed] {
            let descriptor = kind.create();
            let labels = descriptor.labels();

            for (i, label) in labels.iter().enumerate() {
                assert_eq!(descriptor.index_of(label), Some(i), "{:?} {}", kind, label);
                assert_eq!(descriptor.label(i), Some(label.as_str()));
            }
            assert_eq!(descriptor.label(labels.len()), None);
        }
    }

    #[test]
    fn test_features_length() {
        let glyph = test_support::ring(10, 3, 20);
        for kind in [DescriptorKind::Geometric, DescriptorKind::Art, DescriptorKind::Mixed] {
            let descriptor = kind.create();
            let features = descriptor.features(&glyph).unwrap();
            assert_eq!(features.len(), descriptor.length());
            assert!(features.iter().all(|f| f.is_finite()));
        }
    }

    #[test]
    fn test_empty_glyph_rejected() {
        let glyph = Glyph::new(Vec::<(i32, i32)>::new(), 20).unwrap();
        assert_eq!(
            active().features(&glyph),
            Err(DescriptorError::Moments(MomentsError::EmptyInput))
        );
    }
}
