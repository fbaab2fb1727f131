// Shape classifier
// Runs the configured strategy on a glyph, then filters, checks and bounds its evaluations

use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::PathBuf;

use super::backend::{Classifier, ClassifierBackend, ClassifierError};
use super::evaluation::{sort_best_first, Condition, Evaluation, Failure, ALGORITHM};
use super::monitor::{StartingMode, TrainingMonitor};
use super::sample::Sample;
use super::trace::TraceMonitor;
use crate::config::ClassifierConfig;
use crate::descriptor::{self, ShapeDescriptor};
use crate::glyph::{Glyph, Shape, ShapeChecker, StaffContext};

/// Entry point for glyph classification with one strategy
///
/// Inference may run from several threads at once; training blocks them
/// until the new model is in place.
pub struct ShapeClassifier {
    backend: ClassifierBackend,
    strategy: RwLock<Box<dyn Classifier>>,
    checker: ShapeChecker,
    config: ClassifierConfig,
    descriptor: &'static dyn ShapeDescriptor,
}

impl ShapeClassifier {
    /// Wrap an already built strategy
    pub fn new(backend: ClassifierBackend, strategy: Box<dyn Classifier>, config: ClassifierConfig) -> Self {
        ShapeClassifier {
            backend,
            strategy: RwLock::new(strategy),
            checker: ShapeChecker::new(),
            config,
            descriptor: descriptor::active(),
        }
    }

    /// Build the strategy of `backend` and load its model from the configured store
    pub fn load(backend: ClassifierBackend, config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let store = config.storage.store()?;
        log::info!("Loading {} classifier from {:?}", backend, store.user_dir());

        let strategy = backend.create(config, store, descriptor::active());
        if !strategy.is_ready() {
            log::warn!("{} classifier has no usable model, training is needed", backend);
        }

        Ok(Self::new(backend, strategy, config.clone()))
    }

    pub fn backend(&self) -> ClassifierBackend {
        self.backend
    }

    pub fn name(&self) -> &'static str {
        self.strategy.read().name()
    }

    pub fn is_ready(&self) -> bool {
        self.strategy.read().is_ready()
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Raw strategy output, one evaluation per physical shape
    pub fn natural_evaluations(&self, glyph: &Glyph) -> Result<Vec<Evaluation>, ClassifierError> {
        self.strategy.read().natural_evaluations(glyph)
    }

    /// Best evaluations of a glyph
    ///
    /// Returns at most `count` evaluations, best first, none below
    /// `min_grade` and at most one per shape. A glyph too light to be a
    /// symbol is reported as noise. Strategy failures yield no evaluation.
    pub fn evaluate(
        &self,
        glyph: &Glyph,
        count: usize,
        min_grade: f64,
        conditions: &[Condition],
        context: Option<&StaffContext>,
    ) -> Vec<Evaluation> {
        if glyph.normalized_weight() < self.config.min_weight {
            return vec![Evaluation::new(Shape::Noise, ALGORITHM)];
        }

        let strategy = self.strategy.read();
        let mut evaluations = match strategy.natural_evaluations(glyph) {
            Ok(evaluations) => evaluations,
            Err(e) => {
                log::warn!("{} classifier failed on glyph: {}", strategy.name(), e);
                return Vec::new();
            }
        };
        sort_best_first(&mut evaluations);

        let checked = self.config.apply_checks && conditions.contains(&Condition::Checked);
        let mut features: Option<Vec<f64>> = None;
        let mut seen = HashSet::new();
        let mut best = Vec::with_capacity(count.min(evaluations.len()));

        for mut evaluation in evaluations {
            if best.len() >= count || evaluation.grade < min_grade {
                break;
            }

            if checked {
                if features.is_none() {
                    features = self.descriptor.features(glyph).ok();
                }
                if let Some(mismatch) = features
                    .as_deref()
                    .and_then(|f| strategy.first_mismatched(f, evaluation.shape))
                {
                    evaluation.failure = Some(Failure::new(format!("{}:{}", strategy.name(), mismatch)));
                    log::debug!("Discarded {}", evaluation);
                    continue;
                }

                if let Some(context) = context {
                    match self.checker.check(evaluation.shape, glyph, context) {
                        Ok(shape) => evaluation.shape = shape,
                        Err(failure) => {
                            evaluation.failure = Some(Failure::new(failure.to_string()));
                            log::debug!("Discarded {}", evaluation);
                            continue;
                        }
                    }
                }
            }

            if seen.insert(evaluation.shape) {
                best.push(evaluation);
            }
        }

        best
    }

    /// Train the strategy on `samples` and persist the result
    pub fn train(
        &self,
        samples: &[Sample],
        monitor: Option<&dyn TrainingMonitor>,
        mode: StartingMode,
    ) -> Result<(), ClassifierError> {
        let mut strategy = self.strategy.write();
        strategy.train(samples, monitor, mode)?;

        if strategy.is_ready() {
            strategy.marshal()?;
        }
        Ok(())
    }

    /// Monitor tracing training progress to `path` at the configured period
    pub fn trace_monitor(&self, path: PathBuf) -> TraceMonitor {
        TraceMonitor::new(path, self.config.neural.epoch_period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::test_support::{disk, store, training_set, INTERLINE};
    use crate::classifier::trace::read_trace_file;
    use crate::descriptor::test_support::block;
    use crate::glyph::SHAPE_COUNT;
    use tempfile::TempDir;

    /// Strategy returning fixed grades
    struct FixedStrategy {
        grades: Vec<(Shape, f64)>,
        fail: bool,
        mismatched: Option<Shape>,
    }

    impl FixedStrategy {
        fn new(grades: &[(Shape, f64)]) -> Self {
            FixedStrategy {
                grades: grades.to_vec(),
                fail: false,
                mismatched: None,
            }
        }
    }

    impl Classifier for FixedStrategy {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn natural_evaluations(&self, _glyph: &Glyph) -> Result<Vec<Evaluation>, ClassifierError> {
            if self.fail {
                return Err(ClassifierError::NoModel("fixed"));
            }
            // Listed grades first, possibly repeated, then every other shape
            let mut evaluations: Vec<Evaluation> = self
                .grades
                .iter()
                .map(|(shape, grade)| Evaluation::new(*shape, *grade))
                .collect();
            for shape in Shape::physical_shapes() {
                if !self.grades.iter().any(|(s, _)| s == shape) {
                    evaluations.push(Evaluation::new(*shape, 0.001));
                }
            }
            Ok(evaluations)
        }

        fn train(
            &mut self,
            _samples: &[Sample],
            _monitor: Option<&dyn TrainingMonitor>,
            _mode: StartingMode,
        ) -> Result<(), ClassifierError> {
            Ok(())
        }

        fn marshal(&self) -> Result<(), ClassifierError> {
            Ok(())
        }

        fn is_ready(&self) -> bool {
            true
        }

        fn first_mismatched(&self, _features: &[f64], shape: Shape) -> Option<String> {
            (self.mismatched == Some(shape)).then(|| "weight.max".to_string())
        }
    }

    fn classifier(strategy: FixedStrategy) -> ShapeClassifier {
        ShapeClassifier::new(ClassifierBackend::Linear, Box::new(strategy), ClassifierConfig::default())
    }

    fn glyph() -> Glyph {
        block(12, 12, INTERLINE).translated(100, 100)
    }

    fn context(pitch: f64) -> StaffContext {
        StaffContext {
            pitch_position: pitch,
            system_left: 0,
            system_right: 1000,
        }
    }

    #[test]
    fn test_tiny_glyph_is_noise() {
        let classifier = classifier(FixedStrategy::new(&[(Shape::Sharp, 0.9)]));
        let dot = Glyph::new(vec![(0, 0), (1, 0)], INTERLINE).unwrap();

        let evaluations = classifier.evaluate(&dot, 5, 0.0, &[], None);
        assert_eq!(evaluations, vec![Evaluation::new(Shape::Noise, ALGORITHM)]);
    }

    #[test]
    fn test_unbounded_returns_every_shape_once_sorted() {
        let classifier = classifier(FixedStrategy::new(&[(Shape::Sharp, 0.9), (Shape::Flat, 0.5)]));
        let evaluations = classifier.evaluate(&glyph(), usize::MAX, 0.0, &[], None);

        assert_eq!(evaluations.len(), SHAPE_COUNT);
        assert_eq!(evaluations[0].shape, Shape::Sharp);
        assert_eq!(evaluations[1].shape, Shape::Flat);
        for pair in evaluations.windows(2) {
            assert!(pair[0].grade >= pair[1].grade);
        }

        let shapes: HashSet<Shape> = evaluations.iter().map(|e| e.shape).collect();
        assert_eq!(shapes.len(), SHAPE_COUNT);
    }

    #[test]
    fn test_count_and_min_grade_bounds() {
        let classifier = classifier(FixedStrategy::new(&[
            (Shape::Sharp, 0.9),
            (Shape::Flat, 0.5),
            (Shape::Natural, 0.3),
        ]));

        let evaluations = classifier.evaluate(&glyph(), 2, 0.0, &[], None);
        assert_eq!(evaluations.len(), 2);

        let evaluations = classifier.evaluate(&glyph(), 10, 0.4, &[], None);
        let shapes: Vec<Shape> = evaluations.iter().map(|e| e.shape).collect();
        assert_eq!(shapes, vec![Shape::Sharp, Shape::Flat]);

        assert!(classifier.evaluate(&glyph(), 0, 0.0, &[], None).is_empty());
    }

    #[test]
    fn test_checked_rest_refined_and_deduplicated() {
        let classifier = classifier(FixedStrategy::new(&[
            (Shape::HwRestSet, 0.9),
            (Shape::HwRestSet, 0.85),
            (Shape::LongRest, 0.8),
            (Shape::Sharp, 0.7),
        ]));

        // Pitch 1.5: half rest position, too far for a long rest
        let evaluations =
            classifier.evaluate(&glyph(), 3, 0.0, &[Condition::Checked], Some(&context(1.5)));
        let shapes: Vec<Shape> = evaluations.iter().map(|e| e.shape).collect();
        assert_eq!(shapes[..2], [Shape::HalfRest, Shape::Sharp]);
        assert_eq!(shapes.iter().filter(|s| **s == Shape::HalfRest).count(), 1);
        assert!(!shapes.contains(&Shape::LongRest));
        assert!(!shapes.contains(&Shape::HwRestSet));
        assert!(evaluations.iter().all(|e| !e.is_failed()));
        assert!((evaluations[0].grade - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_checks_only_when_requested() {
        let classifier = classifier(FixedStrategy::new(&[(Shape::HwRestSet, 0.9)]));

        let evaluations = classifier.evaluate(&glyph(), 1, 0.0, &[], Some(&context(1.5)));
        assert_eq!(evaluations[0].shape, Shape::HwRestSet);
    }

    #[test]
    fn test_strategy_mismatch_skips_candidate() {
        let mut strategy = FixedStrategy::new(&[(Shape::Sharp, 0.9), (Shape::Flat, 0.5)]);
        strategy.mismatched = Some(Shape::Sharp);
        let classifier = classifier(strategy);

        let evaluations = classifier.evaluate(&glyph(), 1, 0.0, &[Condition::Checked], None);
        assert_eq!(evaluations[0].shape, Shape::Flat);
    }

    #[test]
    fn test_checks_disabled_by_config() {
        let mut strategy = FixedStrategy::new(&[(Shape::Sharp, 0.9)]);
        strategy.mismatched = Some(Shape::Sharp);
        let config = ClassifierConfig {
            apply_checks: false,
            ..ClassifierConfig::default()
        };
        let classifier = ShapeClassifier::new(ClassifierBackend::Linear, Box::new(strategy), config);

        let evaluations = classifier.evaluate(&glyph(), 1, 0.0, &[Condition::Checked], None);
        assert_eq!(evaluations[0].shape, Shape::Sharp);
    }

    #[test]
    fn test_strategy_error_gives_nothing() {
        let mut strategy = FixedStrategy::new(&[]);
        strategy.fail = true;
        let classifier = classifier(strategy);

        assert!(classifier.evaluate(&glyph(), 5, 0.0, &[], None).is_empty());
        assert!(classifier.natural_evaluations(&glyph()).is_err());
    }

    #[test]
    fn test_load_train_and_evaluate() {
        let temp = TempDir::new().unwrap();
        let mut config = ClassifierConfig::default();
        config.storage.user_dir = Some(temp.path().join("user"));
        config.storage.default_dir = Some(temp.path().join("res"));

        let classifier = ShapeClassifier::load(ClassifierBackend::Linear, &config).unwrap();
        assert!(!classifier.is_ready());
        assert_eq!(classifier.name(), "linear");
        assert!(classifier.evaluate(&disk(6, INTERLINE), 3, 0.0, &[], None).is_empty());

        let (samples, _) = training_set();
        let trace = temp.path().join("trace.jsonl");
        let monitor = classifier.trace_monitor(trace.clone());
        classifier
            .train(&samples, Some(&monitor), StartingMode::Scratch)
            .unwrap();

        assert!(classifier.is_ready());
        assert_eq!(monitor.samples_seen(), samples.len());
        assert!(!read_trace_file(&trace).unwrap().is_empty());

        let evaluations = classifier.evaluate(&disk(6, INTERLINE), 1, 0.0, &[], None);
        assert_eq!(evaluations[0].shape, Shape::NoteheadBlack);

        // Asking for every candidate of a trained strategy
        let all = classifier.evaluate(&disk(6, INTERLINE), usize::MAX, 0.0, &[], None);
        assert_eq!(all.len(), SHAPE_COUNT);

        // The model was persisted: a fresh instance finds it
        let reloaded = ShapeClassifier::load(ClassifierBackend::Linear, &config).unwrap();
        assert!(reloaded.is_ready());
        assert!(store(&temp).exists(crate::storage::Tier::User, crate::classifier::linear::EVALUATOR_FILE));
    }

    #[test]
    fn test_unusable_samples_keep_persisted_model() {
        let temp = TempDir::new().unwrap();
        let mut config = ClassifierConfig::default();
        config.storage.user_dir = Some(temp.path().join("user"));
        config.storage.default_dir = Some(temp.path().join("res"));

        let classifier = ShapeClassifier::load(ClassifierBackend::Linear, &config).unwrap();
        let (samples, _) = training_set();
        classifier.train(&samples, None, StartingMode::Scratch).unwrap();
        let before = classifier.natural_evaluations(&disk(6, INTERLINE)).unwrap();

        let noise = vec![Sample::new(Shape::Noise, disk(6, INTERLINE), "noise")];
        classifier.train(&noise, None, StartingMode::Scratch).unwrap();
        assert_eq!(classifier.natural_evaluations(&disk(6, INTERLINE)).unwrap(), before);

        let reloaded = ShapeClassifier::load(ClassifierBackend::Linear, &config).unwrap();
        let after = reloaded.natural_evaluations(&disk(6, INTERLINE)).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.shape, b.shape);
            assert!((a.grade - b.grade).abs() < 1e-6 * a.grade.max(1.0));
        }
    }
}
