// Training samples
// Labeled glyphs, grouped per shape, and their conversion into training rows

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::monitor::TrainingMonitor;
use crate::descriptor::ShapeDescriptor;
use crate::glyph::{Glyph, Shape};

/// A glyph labeled with its true shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub id: Uuid,

    pub shape: Shape,

    pub glyph: Glyph,

    /// Where the sample comes from (sheet, book, user), for diagnostics
    pub source: String,
}

impl Sample {
    pub fn new(shape: Shape, glyph: Glyph, source: impl Into<String>) -> Self {
        Sample {
            id: Uuid::new_v4(),
            shape,
            glyph,
            source: source.into(),
        }
    }
}

/// Named collection of samples, grouped by shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRepository {
    pub name: String,

    pub samples: HashMap<Shape, Vec<Sample>>,

    /// Format version
    pub version: u32,

    /// Creation timestamp (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl SampleRepository {
    pub fn new(name: impl Into<String>) -> Self {
        SampleRepository {
            name: name.into(),
            samples: HashMap::new(),
            version: 1,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn add_sample(&mut self, sample: Sample) {
        self.samples.entry(sample.shape).or_default().push(sample);
    }

    /// Remove a sample by id, returning it
    pub fn remove_sample(&mut self, id: Uuid) -> Option<Sample> {
        for samples in self.samples.values_mut() {
            if let Some(pos) = samples.iter().position(|s| s.id == id) {
                return Some(samples.remove(pos));
            }
        }
        None
    }

    pub fn get_samples(&self, shape: Shape) -> &[Sample] {
        self.samples.get(&shape).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_samples(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    /// All samples, ordered by shape for reproducible training
    pub fn all_samples(&self) -> Vec<&Sample> {
        let mut shapes: Vec<&Shape> = self.samples.keys().collect();
        shapes.sort();
        shapes
            .into_iter()
            .flat_map(|shape| self.samples[shape].iter())
            .collect()
    }

    /// Whether every listed shape has at least `min_per_shape` samples
    pub fn is_sufficient(&self, shapes: &[Shape], min_per_shape: usize) -> bool {
        shapes
            .iter()
            .all(|shape| self.get_samples(*shape).len() >= min_per_shape)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// Feature vector and physical shape of a usable sample
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub features: Vec<f64>,
    pub shape: Shape,
}

/// Describe every usable sample with `descriptor`
///
/// Samples labeled with a shape that cannot be trained, or whose features
/// cannot be extracted, are logged and skipped.
pub fn training_rows(
    samples: &[Sample],
    descriptor: &dyn ShapeDescriptor,
    monitor: Option<&dyn TrainingMonitor>,
) -> Vec<TrainingRow> {
    let mut rows = Vec::with_capacity(samples.len());

    for sample in samples {
        if let Some(monitor) = monitor {
            monitor.sample_processed(&sample.source);
        }

        let Some(shape) = sample.shape.physical_shape() else {
            log::warn!(
                "Sample {} from {} has no physical shape for {}, skipped",
                sample.id,
                sample.source,
                sample.shape
            );
            continue;
        };

        match descriptor.features(&sample.glyph) {
            Ok(features) => rows.push(TrainingRow { features, shape }),
            Err(e) => log::warn!(
                "Sample {} from {} ({}) skipped: {}",
                sample.id,
                sample.source,
                sample.shape,
                e
            ),
        }
    }

    rows
}
