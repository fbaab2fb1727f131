// Bayesian classifier
// Gaussian naive Bayes fitted from a flat table of labeled feature rows

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::backend::{check_compatibility, glyph_features, Classifier, ClassifierError};
use super::evaluation::Evaluation;
use super::monitor::{StartingMode, TrainingMonitor};
use super::sample::{training_rows, Sample, TrainingRow};
use crate::config::BayesianConfig;
use crate::descriptor::ShapeDescriptor;
use crate::glyph::{Glyph, Shape, SHAPE_COUNT};
use crate::storage::{ModelStore, Tier};

pub const TABLE_FILE: &str = "bayes-table.json";

const MIN_VARIANCE: f64 = 1e-12;

/// One labeled row of the training table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub values: Vec<f64>,
    pub shape: String,
}

/// Training table: column labels and the rows seen so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesTable {
    pub labels: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl BayesTable {
    pub fn new(labels: Vec<String>) -> Self {
        BayesTable {
            labels,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: &TrainingRow) {
        self.rows.push(TableRow {
            values: row.features.clone(),
            shape: row.shape.name().to_string(),
        });
    }

    fn check(&self, descriptor: &dyn ShapeDescriptor) -> Result<(), ClassifierError> {
        check_compatibility("bayes table", &self.labels, None, descriptor)?;

        if let Some(row) = self.rows.iter().find(|r| r.values.len() != self.labels.len()) {
            return Err(ClassifierError::Incompatible(format!(
                "{} row has {} values for {} labels",
                row.shape,
                row.values.len(),
                self.labels.len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ClassStats {
    log_prior: f64,
    means: Vec<f64>,
    variances: Vec<f64>,
}

impl ClassStats {
    fn log_likelihood(&self, features: &[f64]) -> f64 {
        features
            .iter()
            .zip(self.means.iter().zip(&self.variances))
            .map(|(x, (m, v))| -0.5 * (2.0 * PI * v).ln() - (x - m) * (x - m) / (2.0 * v))
            .sum()
    }
}

/// Fitted model, one entry per physical shape ordinal
#[derive(Debug, Clone)]
pub struct GaussianModel {
    classes: Vec<Option<ClassStats>>,
}

fn mean_and_variance(rows: &[&[f64]], length: usize) -> (Vec<f64>, Vec<f64>) {
    let n = rows.len().max(1) as f64;
    let mut means = vec![0.0; length];
    for row in rows {
        for (m, v) in means.iter_mut().zip(row.iter()) {
            *m += v / n;
        }
    }

    let mut variances = vec![0.0; length];
    for row in rows {
        for ((s, m), v) in variances.iter_mut().zip(&means).zip(row.iter()) {
            *s += (v - m) * (v - m) / n;
        }
    }

    (means, variances)
}

impl GaussianModel {
    /// Fit the table, or None when no row names a physical shape
    pub fn fit(table: &BayesTable, config: &BayesianConfig) -> Option<Self> {
        let length = table.labels.len();
        let mut groups: Vec<Vec<&[f64]>> = vec![Vec::new(); SHAPE_COUNT];

        for row in &table.rows {
            match Shape::from_name(&row.shape).and_then(|s| s.physical_shape()) {
                Some(shape) => groups[shape.ordinal()].push(&row.values),
                None => log::warn!("Bayes table row with unknown shape {} skipped", row.shape),
            }
        }

        let all: Vec<&[f64]> = groups.iter().flatten().copied().collect();
        if all.is_empty() {
            return None;
        }

        // Smoothing is relative to the largest variance of the whole table
        let (_, overall) = mean_and_variance(&all, length);
        let epsilon = config.var_smoothing * overall.iter().copied().fold(0.0, f64::max);

        let total = all.len() as f64;
        let denominator = total + config.laplace * SHAPE_COUNT as f64;

        let classes = groups
            .iter()
            .map(|rows| {
                if rows.is_empty() {
                    return None;
                }
                let (means, variances) = mean_and_variance(rows, length);
                Some(ClassStats {
                    log_prior: ((rows.len() as f64 + config.laplace) / denominator).ln(),
                    means,
                    variances: variances
                        .into_iter()
                        .map(|v| (v + epsilon).max(MIN_VARIANCE))
                        .collect(),
                })
            })
            .collect();

        Some(GaussianModel { classes })
    }

    /// Posterior probability of every physical shape, absent shapes at 0
    pub fn posterior(&self, features: &[f64]) -> Vec<f64> {
        let scores: Vec<Option<f64>> = self
            .classes
            .iter()
            .map(|c| c.as_ref().map(|c| c.log_prior + c.log_likelihood(features)))
            .collect();

        let max = scores
            .iter()
            .flatten()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return vec![0.0; scores.len()];
        }

        let exps: Vec<f64> = scores
            .iter()
            .map(|s| s.map_or(0.0, |s| (s - max).exp()))
            .collect();
        let sum: f64 = exps.iter().sum();

        exps.into_iter().map(|e| e / sum).collect()
    }

    pub fn class_count(&self) -> usize {
        self.classes.iter().flatten().count()
    }
}

pub struct BayesianClassifier {
    config: BayesianConfig,
    store: ModelStore,
    descriptor: &'static dyn ShapeDescriptor,
    table: Option<BayesTable>,
    model: Option<GaussianModel>,
}

impl BayesianClassifier {
    pub fn load(
        config: BayesianConfig,
        store: ModelStore,
        descriptor: &'static dyn ShapeDescriptor,
    ) -> Self {
        let table = store.load_with_fallback("bayes table", |store, tier| {
            Self::read_table(store, tier, descriptor)
        });
        let model = table.as_ref().and_then(|t| GaussianModel::fit(t, &config));

        BayesianClassifier {
            config,
            store,
            descriptor,
            table,
            model,
        }
    }

    fn read_table(
        store: &ModelStore,
        tier: Tier,
        descriptor: &dyn ShapeDescriptor,
    ) -> Result<BayesTable, ClassifierError> {
        let table: BayesTable = serde_json::from_slice(&store.read(tier, TABLE_FILE)?)?;
        table.check(descriptor)?;
        Ok(table)
    }

    pub fn table(&self) -> Option<&BayesTable> {
        self.table.as_ref()
    }
}

impl Classifier for BayesianClassifier {
    fn name(&self) -> &'static str {
        "bayesian"
    }

    fn natural_evaluations(&self, glyph: &Glyph) -> Result<Vec<Evaluation>, ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::NoModel("bayesian"))?;
        let features = glyph_features(glyph, self.descriptor, self.descriptor.length())?;

        Ok(Shape::physical_shapes()
            .iter()
            .zip(model.posterior(&features))
            .map(|(shape, p)| Evaluation::new(*shape, p))
            .collect())
    }

    fn train(
        &mut self,
        samples: &[Sample],
        monitor: Option<&dyn TrainingMonitor>,
        mode: StartingMode,
    ) -> Result<(), ClassifierError> {
        if samples.is_empty() {
            log::warn!("No sample to train bayesian classifier on");
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

        let mut table = match (mode, &self.table) {
            (StartingMode::Incremental, Some(table)) => table.clone(),
            _ => BayesTable::new(self.descriptor.labels().to_vec()),
        };
        for row in &rows {
            table.push(row);
        }

        let model = GaussianModel::fit(&table, &self.config);
        if let Some(monitor) = monitor {
            monitor.epoch_completed(0, 0.0);
        }
        log::info!(
            "Bayes table holds {} rows over {} shapes",
            table.len(),
            model.as_ref().map_or(0, GaussianModel::class_count)
        );

        self.table = Some(table);
        self.model = model;
        Ok(())
    }

    fn marshal(&self) -> Result<(), ClassifierError> {
        let table = self.table.as_ref().ok_or(ClassifierError::NoModel("bayesian"))?;
        self.store.write(TABLE_FILE, &serde_json::to_vec(table)?)?;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::test_support::{store, training_set};
    use crate::descriptor;
    use approx::assert_abs_diff_eq;
    use tempfile::TempDir;

    fn table(rows: &[(f64, Shape)]) -> BayesTable {
        let mut table = BayesTable::new(vec!["x".to_string()]);
        for (x, shape) in rows {
            table.push(&TrainingRow {
                features: vec![*x],
                shape: *shape,
            });
        }
        table
    }

    #[test]
    fn test_posterior_favors_nearest_class() {
        let table = table(&[
            (0.0, Shape::Flat),
            (1.0, Shape::Flat),
            (10.0, Shape::Sharp),
            (11.0, Shape::Sharp),
        ]);
        let model = GaussianModel::fit(&table, &BayesianConfig::default()).unwrap();
        assert_eq!(model.class_count(), 2);

        let posterior = model.posterior(&[0.8]);
        assert_eq!(posterior.len(), SHAPE_COUNT);
        assert_abs_diff_eq!(posterior.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert!(posterior[Shape::Flat.ordinal()] > 0.99);
        assert_eq!(posterior[Shape::Coda.ordinal()], 0.0);
    }

    #[test]
    fn test_priors_with_identical_likelihoods() {
        // Same distribution for both classes: the posterior follows the priors
        let table = table(&[
            (1.0, Shape::Flat),
            (3.0, Shape::Flat),
            (1.0, Shape::Flat),
            (3.0, Shape::Flat),
            (1.0, Shape::Sharp),
            (3.0, Shape::Sharp),
        ]);
        let config = BayesianConfig::default();
        let model = GaussianModel::fit(&table, &config).unwrap();
        let posterior = model.posterior(&[2.0]);

        // (4 + 1) / (2 + 1)
        let ratio = posterior[Shape::Flat.ordinal()] / posterior[Shape::Sharp.ordinal()];
        assert_abs_diff_eq!(ratio, 5.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unknown_shape_rows_skipped() {
        let mut table = table(&[(2.0, Shape::Flat)]);
        table.rows.push(TableRow {
            values: vec![5.0],
            shape: "NOT_A_SHAPE".to_string(),
        });

        let model = GaussianModel::fit(&table, &BayesianConfig::default()).unwrap();
        assert_eq!(model.class_count(), 1);
        assert_abs_diff_eq!(model.posterior(&[5.0])[Shape::Flat.ordinal()], 1.0, epsilon = 1e-12);

        let only_unknown = BayesTable {
            labels: table.labels.clone(),
            rows: table.rows[1..].to_vec(),
        };
        assert!(GaussianModel::fit(&only_unknown, &BayesianConfig::default()).is_none());
    }

    #[test]
    fn test_train_evaluate_and_reload() {
        let temp = TempDir::new().unwrap();
        let mut classifier =
            BayesianClassifier::load(BayesianConfig::default(), store(&temp), descriptor::active());
        let (samples, _) = training_set();

        assert!(!classifier.is_ready());
        classifier.train(&samples, None, StartingMode::Scratch).unwrap();
        assert!(classifier.is_ready());

        for sample in &samples {
            let evaluations = classifier.natural_evaluations(&sample.glyph).unwrap();
            assert_eq!(evaluations.len(), SHAPE_COUNT);
            let best = evaluations
                .iter()
                .max_by(|a, b| a.grade.total_cmp(&b.grade))
                .unwrap();
            assert_eq!(best.shape, sample.shape);
        }

        classifier.marshal().unwrap();
        let reloaded =
            BayesianClassifier::load(BayesianConfig::default(), store(&temp), descriptor::active());
        assert_eq!(reloaded.table().map(BayesTable::len), Some(samples.len()));
    }

    #[test]
    fn test_incremental_appends_scratch_replaces() {
        let temp = TempDir::new().unwrap();
        let mut classifier =
            BayesianClassifier::load(BayesianConfig::default(), store(&temp), descriptor::active());
        let (samples, _) = training_set();

        classifier.train(&samples, None, StartingMode::Scratch).unwrap();
        classifier.train(&samples[..2], None, StartingMode::Incremental).unwrap();
        assert_eq!(classifier.table().map(BayesTable::len), Some(samples.len() + 2));

        classifier.train(&samples[..2], None, StartingMode::Scratch).unwrap();
        assert_eq!(classifier.table().map(BayesTable::len), Some(2));
    }

    #[test]
    fn test_incompatible_table_rejected() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let table = BayesTable::new(vec!["weight".to_string()]);
        store
            .write(TABLE_FILE, &serde_json::to_vec(&table).unwrap())
            .unwrap();

        let classifier =
            BayesianClassifier::load(BayesianConfig::default(), store, descriptor::active());
        assert!(classifier.table().is_none());
        assert!(!classifier.is_ready());
    }

    #[test]
    fn test_unusable_samples_leave_model_untouched() {
        let temp = TempDir::new().unwrap();
        let mut classifier =
            BayesianClassifier::load(BayesianConfig::default(), store(&temp), descriptor::active());
        let (samples, unseen) = training_set();
        classifier.train(&samples, None, StartingMode::Scratch).unwrap();
        let table = classifier.table().cloned();
        let before = classifier.natural_evaluations(&unseen[0].1).unwrap();

        let noise = vec![Sample::new(Shape::Noise, samples[0].glyph.clone(), "noise")];
        classifier.train(&noise, None, StartingMode::Scratch).unwrap();
        classifier.train(&[], None, StartingMode::Scratch).unwrap();

        assert!(classifier.is_ready());
        assert_eq!(classifier.table().cloned(), table);
        let after = classifier.natural_evaluations(&unseen[0].1).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.shape, b.shape);
            assert_abs_diff_eq!(a.grade, b.grade, epsilon = 1e-12);
        }
    }
}
