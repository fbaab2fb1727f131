// Classifier backend abstraction
// Strategy trait shared by the neural, linear and Bayesian classifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::bayesian::BayesianClassifier;
use super::evaluation::Evaluation;
use super::linear::LinearClassifier;
use super::monitor::{StartingMode, TrainingMonitor};
use super::neural::NeuralClassifier;
use super::sample::Sample;
use crate::config::ClassifierConfig;
use crate::descriptor::{DescriptorError, ShapeDescriptor};
use crate::glyph::{Glyph, Shape};
use crate::storage::{LoadFailure, ModelStore, StorageError};

/// Classification backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassifierBackend {
    /// Multi-layer perceptron
    Neural,

    /// Per-shape weighted distance to training means
    Linear,

    /// Gaussian naive Bayes over a flat training table
    Bayesian,
}

impl ClassifierBackend {
    pub const ALL: [ClassifierBackend; 3] = [
        ClassifierBackend::Neural,
        ClassifierBackend::Linear,
        ClassifierBackend::Bayesian,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ClassifierBackend::Neural => "neural",
            ClassifierBackend::Linear => "linear",
            ClassifierBackend::Bayesian => "bayesian",
        }
    }

    /// Build the strategy, loading its persisted model when one is usable
    pub fn create(
        &self,
        config: &ClassifierConfig,
        store: ModelStore,
        descriptor: &'static dyn ShapeDescriptor,
    ) -> Box<dyn Classifier> {
        match self {
            ClassifierBackend::Neural => Box::new(NeuralClassifier::load(
                config.neural.clone(),
                store,
                descriptor,
            )),
            ClassifierBackend::Linear => Box::new(LinearClassifier::load(
                config.linear.clone(),
                store,
                descriptor,
            )),
            ClassifierBackend::Bayesian => Box::new(BayesianClassifier::load(
                config.bayesian.clone(),
                store,
                descriptor,
            )),
        }
    }
}

impl fmt::Display for ClassifierBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur during classification or training
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("No model loaded for {0} classifier")]
    NoModel(&'static str),

    #[error("Expected {expected} features, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("Incompatible model: {0}")]
    Incompatible(String),

    #[error("Model loading failed: {0}")]
    ModelLoadError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("Invalid classifier output: {0}")]
    InvalidOutput(String),

    #[error("Training failed: {0}")]
    TrainingError(String),
}

impl LoadFailure for ClassifierError {
    fn is_missing(&self) -> bool {
        matches!(self, ClassifierError::Storage(e) if e.is_missing())
    }

    fn is_incompatible(&self) -> bool {
        matches!(self, ClassifierError::Incompatible(_))
    }
}

/// A shape classification strategy
///
/// Each strategy owns its model. Inference takes `&self` so that several
/// threads can evaluate at once; training takes `&mut self`.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// One evaluation per physical shape, in shape ordinal order
    fn natural_evaluations(&self, glyph: &Glyph) -> Result<Vec<Evaluation>, ClassifierError>;

    /// Train on labeled samples
    ///
    /// An empty collection leaves the model untouched.
    fn train(
        &mut self,
        samples: &[Sample],
        monitor: Option<&dyn TrainingMonitor>,
        mode: StartingMode,
    ) -> Result<(), ClassifierError>;

    /// Persist the model to the user area
    fn marshal(&self) -> Result<(), ClassifierError>;

    /// Whether a usable model is loaded
    fn is_ready(&self) -> bool;

    /// Name of the first feature outside the trained range of `shape`
    fn first_mismatched(&self, _features: &[f64], _shape: Shape) -> Option<String> {
        None
    }
}

/// Check that a persisted model was built on the same features and shapes
pub(crate) fn check_compatibility(
    what: &str,
    input_labels: &[String],
    output_labels: Option<&[String]>,
    descriptor: &dyn ShapeDescriptor,
) -> Result<(), ClassifierError> {
    if input_labels != descriptor.labels() {
        return Err(ClassifierError::Incompatible(format!(
            "{} inputs ({}) differ from {} descriptor ({})",
            what,
            input_labels.len(),
            descriptor.name(),
            descriptor.length()
        )));
    }

    if let Some(outputs) = output_labels {
        let expected = Shape::physical_names();
        if outputs.len() != expected.len() || outputs.iter().zip(&expected).any(|(a, b)| a != b) {
            return Err(ClassifierError::Incompatible(format!(
                "{} outputs ({}) differ from physical shapes ({})",
                what,
                outputs.len(),
                expected.len()
            )));
        }
    }

    Ok(())
}

/// Features of a glyph, checked against the expected model input size
pub(crate) fn glyph_features(
    glyph: &Glyph,
    descriptor: &dyn ShapeDescriptor,
    expected: usize,
) -> Result<Vec<f64>, ClassifierError> {
    let features = descriptor.features(glyph)?;
    if features.len() != expected {
        return Err(ClassifierError::FeatureMismatch {
            expected,
            actual: features.len(),
        });
    }
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::GeometricDescriptor;

    #[test]
    fn test_backend_names() {
        let names: Vec<&str> = ClassifierBackend::ALL.iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["neural", "linear", "bayesian"]);
        assert_eq!(ClassifierBackend::Linear.to_string(), "linear");
    }

    #[test]
    fn test_load_failure_kinds() {
        let missing = ClassifierError::Storage(StorageError::Missing("x".into()));
        assert!(missing.is_missing());
        assert!(!missing.is_incompatible());

        let incompatible = ClassifierError::Incompatible("sizes".into());
        assert!(incompatible.is_incompatible());
        assert!(!incompatible.is_missing());
    }

    #[test]
    fn test_compatibility_check() {
        let descriptor = GeometricDescriptor::new();
        let labels = descriptor.labels().to_vec();
        let outputs: Vec<String> = Shape::physical_names().iter().map(|s| s.to_string()).collect();

        assert!(check_compatibility("model", &labels, Some(outputs.as_slice()), &descriptor).is_ok());

        let short = &labels[..labels.len() - 1];
        assert!(matches!(
            check_compatibility("model", short, None, &descriptor),
            Err(ClassifierError::Incompatible(_))
        ));

        let wrong = &outputs[1..];
        assert!(check_compatibility("model", &labels, Some(wrong), &descriptor).is_err());
    }
}
