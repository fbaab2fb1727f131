// Classifier module
// Strategies ranking the physical shapes of a glyph, their training and orchestration

pub mod backend;
pub mod bayesian;
pub mod engine;
pub mod evaluation;
pub mod linear;
pub mod monitor;
pub mod network;
pub mod neural;
pub mod registry;
pub mod sample;
pub mod trace;

pub use backend::{Classifier, ClassifierBackend, ClassifierError};
pub use bayesian::BayesianClassifier;
pub use engine::ShapeClassifier;
pub use evaluation::{sort_best_first, Condition, Evaluation, Failure, ALGORITHM, MANUAL};
pub use linear::LinearClassifier;
pub use monitor::{CancelFlag, StartingMode, TrainingMonitor};
pub use neural::NeuralClassifier;
pub use sample::{Sample, SampleRepository};
pub use trace::{TraceEntry, TraceMonitor, TraceWriter};

#[cfg(test)]
pub(crate) mod test_support {
    use tempfile::TempDir;

    use super::sample::Sample;
    use crate::descriptor::test_support::{block, ring};
    use crate::glyph::{Glyph, Shape};
    use crate::storage::ModelStore;

    pub const INTERLINE: u32 = 12;

    /// Store with the user tier in `user/` and the default tier in `res/`
    pub fn store(temp: &TempDir) -> ModelStore {
        ModelStore::new(temp.path().join("user"), Some(temp.path().join("res")))
    }

    /// Filled disk of radius r
    pub fn disk(r: i32, interline: u32) -> Glyph {
        let points: Vec<(i32, i32)> = (-r..=r)
            .flat_map(|y| (-r..=r).map(move |x| (x, y)))
            .filter(|(x, y)| x * x + y * y <= r * r)
            .collect();
        Glyph::new(points, interline).unwrap()
    }

    /// Samples of three well separated shapes, and unseen glyphs of each
    pub fn training_set() -> (Vec<Sample>, Vec<(Shape, Glyph)>) {
        let mut samples = Vec::new();

        for (i, r) in [5, 7, 9].into_iter().enumerate() {
            let glyph = disk(r, INTERLINE).translated(10 * i as i32, 3);
            samples.push(Sample::new(Shape::NoteheadBlack, glyph, format!("disk-{}", r)));
        }
        for (w, h) in [(14, 2), (18, 2), (14, 3), (18, 3)] {
            let glyph = block(w, h, INTERLINE).translated(w, -h);
            samples.push(Sample::new(Shape::Tenuto, glyph, format!("bar-{}x{}", w, h)));
        }
        for r in [6, 8] {
            let glyph = ring(r, 2, INTERLINE);
            samples.push(Sample::new(Shape::WholeNote, glyph, format!("ring-{}", r)));
        }

        let unseen = vec![
            (Shape::NoteheadBlack, disk(6, INTERLINE)),
            (Shape::NoteheadBlack, disk(8, INTERLINE).translated(-4, 7)),
            (Shape::Tenuto, block(16, 2, INTERLINE)),
            (Shape::WholeNote, ring(7, 2, INTERLINE)),
        ];

        (samples, unseen)
    }
}
