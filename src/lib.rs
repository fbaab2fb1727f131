// Glyph Shapes - Music symbol shape classification
// Module declarations

pub mod classifier;
pub mod config;
pub mod descriptor;
pub mod glyph;
pub mod moments;
pub mod storage;

pub use classifier::{
    registry, Classifier, ClassifierBackend, ClassifierError, Condition, Evaluation,
    ShapeClassifier, StartingMode, TrainingMonitor,
};
pub use config::ClassifierConfig;
pub use descriptor::ShapeDescriptor;
pub use glyph::{Glyph, Shape, StaffContext};
