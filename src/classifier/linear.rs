// Linear classifier
// Weighted squared distance of a glyph to the mean of each trained shape

use serde::{Deserialize, Serialize};

use super::backend::{check_compatibility, glyph_features, Classifier, ClassifierError};
use super::evaluation::Evaluation;
use super::monitor::{StartingMode, TrainingMonitor};
use super::sample::{training_rows, Sample, TrainingRow};
use crate::config::LinearConfig;
use crate::descriptor::ShapeDescriptor;
use crate::glyph::{Glyph, Shape};
use crate::storage::{ModelStore, Tier};

pub const EVALUATOR_FILE: &str = "linear-evaluator.json";

/// Variances below this carry no usable weight
const MIN_VARIANCE: f64 = 1e-12;

/// Accepted interval of one feature for one shape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Running statistics of one shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub count: usize,
    sums: Vec<f64>,
    squares: Vec<f64>,
    mins: Vec<f64>,
    maxs: Vec<f64>,
}

impl Category {
    fn new(name: &str, length: usize) -> Self {
        Category {
            name: name.to_string(),
            count: 0,
            sums: vec![0.0; length],
            squares: vec![0.0; length],
            mins: vec![0.0; length],
            maxs: vec![0.0; length],
        }
    }

    fn include(&mut self, features: &[f64]) {
        let first = self.count == 0;
        self.count += 1;
        for (i, v) in features.iter().enumerate() {
            self.sums[i] += v;
            self.squares[i] += v * v;
            if first {
                self.mins[i] = *v;
                self.maxs[i] = *v;
            } else {
                self.mins[i] = self.mins[i].min(*v);
                self.maxs[i] = self.maxs[i].max(*v);
            }
        }
    }

    pub fn mean(&self, i: usize) -> f64 {
        self.sums[i] / self.count.max(1) as f64
    }

    /// Inverse variance, None when the variance is too small
    pub fn weight(&self, i: usize) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let mean = self.mean(i);
        let variance = (self.squares[i] / self.count as f64 - mean * mean).max(0.0);
        (variance >= MIN_VARIANCE).then(|| 1.0 / variance)
    }

    /// Training extremes widened by the configured factors
    pub fn range(&self, i: usize, config: &LinearConfig) -> Range {
        if self.count == 0 {
            return Range { min: None, max: None };
        }
        let (min, max) = (self.mins[i], self.maxs[i]);
        Range {
            min: Some(min - min.abs() * (1.0 - config.factor_for_minima)),
            max: Some(max + max.abs() * (config.factor_for_maxima - 1.0)),
        }
    }
}

/// Per-shape statistics over a fixed feature layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearEvaluator {
    input_labels: Vec<String>,
    categories: Vec<Category>,
}

impl LinearEvaluator {
    pub fn new(input_labels: Vec<String>) -> Self {
        let length = input_labels.len();
        LinearEvaluator {
            input_labels,
            categories: Shape::physical_names()
                .into_iter()
                .map(|name| Category::new(name, length))
                .collect(),
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_labels.len()
    }

    pub fn category(&self, shape: Shape) -> Option<&Category> {
        self.categories.get(shape.ordinal())
    }

    fn include(&mut self, row: &TrainingRow) {
        if let Some(category) = self.categories.get_mut(row.shape.ordinal()) {
            category.include(&row.features);
        }
    }

    /// Average weight of each feature over the categories that have one
    fn global_weights(&self) -> Vec<f64> {
        (0..self.input_size())
            .map(|i| {
                let weights: Vec<f64> = self.categories.iter().filter_map(|c| c.weight(i)).collect();
                if weights.is_empty() {
                    1.0
                } else {
                    weights.iter().sum::<f64>() / weights.len() as f64
                }
            })
            .collect()
    }

    /// Weighted mean squared distance to a category, infinite when untrained
    pub fn distance(&self, features: &[f64], category: &Category, global: &[f64]) -> f64 {
        if category.count == 0 {
            return f64::INFINITY;
        }

        let total: f64 = features
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let dif = v - category.mean(i);
                dif * dif * category.weight(i).unwrap_or(global[i])
            })
            .sum();

        total / self.input_size().max(1) as f64
    }

    fn check(&self, descriptor: &dyn ShapeDescriptor) -> Result<(), ClassifierError> {
        let names: Vec<String> = self.categories.iter().map(|c| c.name.clone()).collect();
        check_compatibility("linear evaluator", &self.input_labels, Some(names.as_slice()), descriptor)?;

        let length = self.input_size();
        for category in &self.categories {
            let lengths = [
                category.sums.len(),
                category.squares.len(),
                category.mins.len(),
                category.maxs.len(),
            ];
            if lengths.iter().any(|l| *l != length) {
                return Err(ClassifierError::Incompatible(format!(
                    "linear evaluator category {} has statistics of lengths {:?}, expected {}",
                    category.name, lengths, length
                )));
            }
        }

        Ok(())
    }
}

/// Grade of a distance, 1 / distance capped at `max_grade`
pub fn grade_of(distance: f64, max_grade: f64) -> f64 {
    if distance <= 1.0 / max_grade {
        max_grade
    } else {
        1.0 / distance
    }
}

pub struct LinearClassifier {
    config: LinearConfig,
    store: ModelStore,
    descriptor: &'static dyn ShapeDescriptor,
    evaluator: Option<LinearEvaluator>,
}

impl LinearClassifier {
    pub fn load(
        config: LinearConfig,
        store: ModelStore,
        descriptor: &'static dyn ShapeDescriptor,
    ) -> Self {
        let evaluator = store.load_with_fallback("linear evaluator", |store, tier| {
            Self::read_evaluator(store, tier, descriptor)
        });

        LinearClassifier {
            config,
            store,
            descriptor,
            evaluator,
        }
    }

    fn read_evaluator(
        store: &ModelStore,
        tier: Tier,
        descriptor: &dyn ShapeDescriptor,
    ) -> Result<LinearEvaluator, ClassifierError> {
        let evaluator: LinearEvaluator = serde_json::from_slice(&store.read(tier, EVALUATOR_FILE)?)?;
        evaluator.check(descriptor)?;
        Ok(evaluator)
    }
}

impl Classifier for LinearClassifier {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn natural_evaluations(&self, glyph: &Glyph) -> Result<Vec<Evaluation>, ClassifierError> {
        let evaluator = self.evaluator.as_ref().ok_or(ClassifierError::NoModel("linear"))?;
        let features = glyph_features(glyph, self.descriptor, evaluator.input_size())?;
        let global = evaluator.global_weights();

        Ok(Shape::physical_shapes()
            .iter()
            .zip(&evaluator.categories)
            .map(|(shape, category)| {
                let distance = evaluator.distance(&features, category, &global);
                Evaluation::new(*shape, grade_of(distance, self.config.max_grade))
            })
            .collect())
    }

    fn train(
        &mut self,
        samples: &[Sample],
        monitor: Option<&dyn TrainingMonitor>,
        mode: StartingMode,
    ) -> Result<(), ClassifierError> {
        if samples.is_empty() {
            log::warn!("No sample to train linear classifier on");
            return Ok(());
        }

        let rows = training_rows(samples, self.descriptor, monitor);
        if rows.is_empty() {
            log::warn!("None of {} samples is usable for training", samples.len());
            return Ok(());
        }
        if let Some(monitor) = monitor {
            monitor.training_started(rows.len(), 1);
        }

        let mut evaluator = match (mode, &self.evaluator) {
            (StartingMode::Incremental, Some(evaluator)) => evaluator.clone(),
            _ => LinearEvaluator::new(self.descriptor.labels().to_vec()),
        };
        for row in &rows {
            evaluator.include(row);
        }

        if let Some(monitor) = monitor {
            monitor.epoch_completed(0, 0.0);
        }
        log::info!("Linear evaluator trained on {} samples", rows.len());

        self.evaluator = Some(evaluator);
        Ok(())
    }

    fn marshal(&self) -> Result<(), ClassifierError> {
        let evaluator = self.evaluator.as_ref().ok_or(ClassifierError::NoModel("linear"))?;
        self.store
            .write(EVALUATOR_FILE, &serde_json::to_vec(evaluator)?)?;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.evaluator.is_some()
    }

    fn first_mismatched(&self, features: &[f64], shape: Shape) -> Option<String> {
        let evaluator = self.evaluator.as_ref()?;
        let category = evaluator.category(shape.physical_shape()?)?;

        for (i, value) in features.iter().enumerate().take(evaluator.input_size()) {
            let range = category.range(i, &self.config);
            let label = &evaluator.input_labels[i];

            if range.min.is_some_and(|min| *value < min) {
                return Some(format!("{}.min", label));
            }
            if range.max.is_some_and(|max| *value > max) {
                return Some(format!("{}.max", label));
            }
        }

        None
    }
}
