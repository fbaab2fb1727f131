// Neural classifier
// Perceptron over normalized features, one softmax output per physical shape

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::backend::{check_compatibility, glyph_features, Classifier, ClassifierError};
use super::evaluation::Evaluation;
use super::monitor::{StartingMode, TrainingMonitor};
use super::network::{NeuralNetwork, TrainingParams};
use super::sample::{training_rows, Sample, TrainingRow};
use crate::config::NeuralConfig;
use crate::descriptor::ShapeDescriptor;
use crate::glyph::{Glyph, Shape, SHAPE_COUNT};
use crate::storage::{ModelStore, Tier};

pub const MODEL_FILE: &str = "model.json";
pub const NORMS_FILE: &str = "norms.json";

/// Per-feature mean and standard deviation of the training set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Norms {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl Norms {
    pub fn compute(rows: &[TrainingRow], length: usize) -> Self {
        let n = rows.len().max(1) as f64;
        let mut means = vec![0.0; length];
        let mut stds = vec![0.0; length];

        for row in rows {
            for (m, v) in means.iter_mut().zip(&row.features) {
                *m += v / n;
            }
        }
        for row in rows {
            for ((s, m), v) in stds.iter_mut().zip(&means).zip(&row.features) {
                *s += (v - m) * (v - m) / n;
            }
        }

        // Constant features are left unscaled
        for s in stds.iter_mut() {
            let std = s.sqrt();
            *s = if std < 1e-9 { 1.0 } else { std + 1e-9 };
        }

        Norms { means, stds }
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    pub fn apply(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

/// Persisted artifact tagged with the training that produced it
#[derive(Debug, Serialize, Deserialize)]
struct Stamped<T> {
    training_id: Uuid,
    content: T,
}

#[derive(Debug, Clone)]
struct NeuralModel {
    training_id: Uuid,
    network: NeuralNetwork,
    norms: Norms,
}

pub struct NeuralClassifier {
    config: NeuralConfig,
    store: ModelStore,
    descriptor: &'static dyn ShapeDescriptor,
    model: Option<NeuralModel>,
}

impl NeuralClassifier {
    /// Classifier with the persisted model, if any is usable
    pub fn load(
        config: NeuralConfig,
        store: ModelStore,
        descriptor: &'static dyn ShapeDescriptor,
    ) -> Self {
        let model = store.load_with_fallback("neural model", |store, tier| {
            Self::read_model(store, tier, descriptor)
        });

        NeuralClassifier {
            config,
            store,
            descriptor,
            model,
        }
    }

    fn read_model(
        store: &ModelStore,
        tier: Tier,
        descriptor: &dyn ShapeDescriptor,
    ) -> Result<NeuralModel, ClassifierError> {
        let network: Stamped<NeuralNetwork> = serde_json::from_slice(&store.read(tier, MODEL_FILE)?)?;
        let norms: Stamped<Norms> = serde_json::from_slice(&store.read(tier, NORMS_FILE)?)?;

        // A write interrupted between the two files leaves them unpaired
        if network.training_id != norms.training_id {
            return Err(ClassifierError::ModelLoadError(format!(
                "norms of training {} do not match model of training {}",
                norms.training_id, network.training_id
            )));
        }
        let training_id = network.training_id;
        let (network, norms) = (network.content, norms.content);

        if !network.is_consistent() {
            return Err(ClassifierError::ModelLoadError(
                "inconsistent layer sizes".to_string(),
            ));
        }
        if norms.len() != descriptor.length() || norms.stds.len() != norms.means.len() {
            return Err(ClassifierError::Incompatible(format!(
                "{} norms for {} features",
                norms.len(),
                descriptor.length()
            )));
        }
        check_compatibility(
            "neural model",
            network.input_labels(),
            Some(network.output_labels()),
            descriptor,
        )?;

        Ok(NeuralModel {
            training_id,
            network,
            norms,
        })
    }

    fn fresh_network(&self, rng: &mut StdRng) -> NeuralNetwork {
        let outputs = Shape::physical_names()
            .into_iter()
            .map(String::from)
            .collect();

        NeuralNetwork::new(
            self.descriptor.labels().to_vec(),
            &[SHAPE_COUNT, SHAPE_COUNT],
            outputs,
            rng,
        )
    }

    fn params(&self) -> TrainingParams {
        TrainingParams {
            learning_rate: self.config.learning_rate,
            momentum: self.config.momentum,
            l2: self.config.l2,
            max_epochs: self.config.max_epochs,
            max_error: self.config.max_error,
        }
    }
}

impl Classifier for NeuralClassifier {
    fn name(&self) -> &'static str {
        "neural"
    }

    fn natural_evaluations(&self, glyph: &Glyph) -> Result<Vec<Evaluation>, ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::NoModel("neural"))?;

        let features = glyph_features(glyph, self.descriptor, model.network.input_size())?;
        let outputs = model.network.forward(&model.norms.apply(&features));

        let sum: f64 = outputs.iter().sum();
        if !sum.is_finite() || sum <= 0.0 {
            return Err(ClassifierError::InvalidOutput(format!("output sum {}", sum)));
        }

        Ok(Shape::physical_shapes()
            .iter()
            .zip(outputs)
            .map(|(shape, value)| Evaluation::new(*shape, value / sum))
            .collect())
    }

    fn train(
        &mut self,
        samples: &[Sample],
        monitor: Option<&dyn TrainingMonitor>,
        mode: StartingMode,
    ) -> Result<(), ClassifierError> {
        if samples.is_empty() {
            log::warn!("No sample to train neural classifier on");
            return Ok(());
        }

        let rows = training_rows(samples, self.descriptor, monitor);
        if rows.is_empty() {
            log::warn!("None of {} samples is usable for training", samples.len());
            return Ok(());
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let (mut network, norms) = match (mode, &self.model) {
            (StartingMode::Incremental, Some(model)) => {
                log::info!("Incremental training on {} samples", rows.len());
                (model.network.clone(), model.norms.clone())
            }
            (StartingMode::Incremental, None) => {
                log::info!("No model to start from, training from scratch");
                (self.fresh_network(&mut rng), Norms::compute(&rows, self.descriptor.length()))
            }
            (StartingMode::Scratch, _) => {
                log::info!("Training from scratch on {} samples", rows.len());
                (self.fresh_network(&mut rng), Norms::compute(&rows, self.descriptor.length()))
            }
        };

        let inputs: Vec<Vec<f64>> = rows.iter().map(|r| norms.apply(&r.features)).collect();
        let targets: Vec<usize> = rows.iter().map(|r| r.shape.ordinal()).collect();

        if let Some(monitor) = monitor {
            monitor.training_started(rows.len(), self.config.max_epochs);
        }

        let outcome = network.train(&inputs, &targets, &self.params(), &mut rng, monitor);
        if (outcome.epochs > 0 && !outcome.error.is_finite()) || !network.is_finite() {
            return Err(ClassifierError::TrainingError(format!(
                "diverged after {} epochs",
                outcome.epochs
            )));
        }

        log::info!(
            "Neural training ended after {} epochs, error {:.6}{}",
            outcome.epochs,
            outcome.error,
            if outcome.cancelled { " (cancelled)" } else { "" }
        );

        self.model = Some(NeuralModel {
            training_id: Uuid::new_v4(),
            network,
            norms,
        });
        Ok(())
    }

    fn marshal(&self) -> Result<(), ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::NoModel("neural"))?;

        let norms = Stamped {
            training_id: model.training_id,
            content: &model.norms,
        };
        let network = Stamped {
            training_id: model.training_id,
            content: &model.network,
        };
        self.store.write(NORMS_FILE, &serde_json::to_vec(&norms)?)?;
        self.store.write(MODEL_FILE, &serde_json::to_vec(&network)?)?;

        log::info!(
            "Neural model of training {} stored in {:?}",
            model.training_id,
            self.store.user_dir()
        );
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.model.is_some()
    }
}
