// Shape evaluations
// A candidate shape with its grade, and why it was rejected if it was

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::glyph::Shape;

/// Grade of a shape assigned by hand
pub const MANUAL: f64 = 300.0;

/// Grade of a shape assigned by an algorithm rather than a classifier
pub const ALGORITHM: f64 = 200.0;

/// Reason attached to a rejected evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub reason: String,
}

impl Failure {
    pub fn new(reason: impl Into<String>) -> Self {
        Failure {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Candidate shape for a glyph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub shape: Shape,

    /// Classifier grades lie in [0, 1]; MANUAL and ALGORITHM sit above
    pub grade: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl Evaluation {
    pub fn new(shape: Shape, grade: f64) -> Self {
        Evaluation {
            shape,
            grade,
            failure: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Best first: higher grade, then lower shape ordinal
    pub fn best_first(a: &Evaluation, b: &Evaluation) -> Ordering {
        b.grade
            .total_cmp(&a.grade)
            .then_with(|| a.shape.cmp(&b.shape))
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:.4})", self.shape, self.grade)?;
        if let Some(failure) = &self.failure {
            write!(f, " failure:{}", failure)?;
        }
        Ok(())
    }
}

/// Sort evaluations best first
pub fn sort_best_first(evaluations: &mut [Evaluation]) {
    evaluations.sort_by(Evaluation::best_first);
}

/// Extra processing requested on evaluations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    /// Apply plausibility checks and drop failed candidates
    Checked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_best_first() {
        let mut evaluations = vec![
            Evaluation::new(Shape::Flat, 0.2),
            Evaluation::new(Shape::Sharp, 0.9),
            Evaluation::new(Shape::Coda, 0.2),
            Evaluation::new(Shape::Natural, 0.5),
        ];
        sort_best_first(&mut evaluations);

        let shapes: Vec<Shape> = evaluations.iter().map(|e| e.shape).collect();
        assert_eq!(
            shapes,
            vec![Shape::Sharp, Shape::Natural, Shape::Coda, Shape::Flat]
        );
        for pair in evaluations.windows(2) {
            assert!(pair[0].grade >= pair[1].grade);
        }
    }

    #[test]
    fn test_sentinels_above_classifier_grades() {
        assert!(MANUAL > ALGORITHM);
        assert!(ALGORITHM > 1.0);
    }

    #[test]
    fn test_display() {
        let mut evaluation = Evaluation::new(Shape::GClef, 0.5);
        assert_eq!(evaluation.to_string(), "G_CLEF(0.5000)");

        evaluation.failure = Some(Failure::new("NotWithinWidth"));
        assert!(evaluation.is_failed());
        assert_eq!(evaluation.to_string(), "G_CLEF(0.5000) failure:NotWithinWidth");
    }
}
