// Classifier registry
// One lazily loaded ShapeClassifier per backend, shared by the whole process

use once_cell::sync::OnceCell;
use std::thread::{self, JoinHandle};

use super::backend::{ClassifierBackend, ClassifierError};
use super::engine::ShapeClassifier;
use crate::config::ClassifierConfig;

static NEURAL: OnceCell<ShapeClassifier> = OnceCell::new();
static LINEAR: OnceCell<ShapeClassifier> = OnceCell::new();
static BAYESIAN: OnceCell<ShapeClassifier> = OnceCell::new();

fn cell(backend: ClassifierBackend) -> &'static OnceCell<ShapeClassifier> {
    match backend {
        ClassifierBackend::Neural => &NEURAL,
        ClassifierBackend::Linear => &LINEAR,
        ClassifierBackend::Bayesian => &BAYESIAN,
    }
}

/// The process-wide classifier of `backend`
///
/// The first call loads it with the global configuration; concurrent
/// callers wait for that load. A failed load is retried on the next call.
pub fn instance(backend: ClassifierBackend) -> Result<&'static ShapeClassifier, ClassifierError> {
    instance_with(backend, ClassifierConfig::global())
}

/// Same as `instance`, loading with `config` if nothing is loaded yet
///
/// Once the classifier of `backend` exists, `config` is ignored.
pub fn instance_with(
    backend: ClassifierBackend,
    config: &ClassifierConfig,
) -> Result<&'static ShapeClassifier, ClassifierError> {
    cell(backend).get_or_try_init(|| ShapeClassifier::load(backend, config))
}

/// Whether the classifier of `backend` has been loaded already
pub fn is_loaded(backend: ClassifierBackend) -> bool {
    cell(backend).get().is_some()
}

/// Load the classifier of `backend` on a background thread
pub fn prewarm(backend: ClassifierBackend) -> JoinHandle<()> {
    prewarm_with(backend, ClassifierConfig::global().clone())
}

/// Same as `prewarm`, loading with `config`
pub fn prewarm_with(backend: ClassifierBackend, config: ClassifierConfig) -> JoinHandle<()> {
    thread::spawn(move || match instance_with(backend, &config) {
        Ok(classifier) => log::info!(
            "{} classifier prewarmed, ready: {}",
            backend,
            classifier.is_ready()
        ),
        Err(e) => log::warn!("Cannot prewarm {} classifier: {}", backend, e),
    })
}
