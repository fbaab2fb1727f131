// Classifier configuration
// Tunable constants of the classification pipeline, with defaults and JSON loading

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::storage::{self, ModelStore, StorageResult};

/// Environment variable naming a JSON configuration file
pub const CONFIG_ENV: &str = "GLYPH_SHAPES_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum normalized weight (in interline squares) of a glyph that is not noise
    pub min_weight: f64,

    /// Run plausibility checks when evaluations request them
    pub apply_checks: bool,

    pub neural: NeuralConfig,
    pub linear: LinearConfig,
    pub bayesian: BayesianConfig,
    pub storage: StorageConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            min_weight: 0.04,
            apply_checks: true,
            neural: NeuralConfig::default(),
            linear: LinearConfig::default(),
            bayesian: BayesianConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl ClassifierConfig {
    pub fn from_json_bytes(data: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read(path)?;
        Self::from_json_bytes(&data)
    }

    /// Process-wide configuration
    ///
    /// Read once from the file named by `GLYPH_SHAPES_CONFIG`; defaults when
    /// unset or unreadable.
    pub fn global() -> &'static ClassifierConfig {
        &GLOBAL
    }
}

static GLOBAL: Lazy<ClassifierConfig> = Lazy::new(|| {
    let Some(path) = std::env::var_os(CONFIG_ENV) else {
        return ClassifierConfig::default();
    };

    match ClassifierConfig::from_json_file(Path::new(&path)) {
        Ok(config) => {
            log::info!("Classifier configuration loaded from {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("Ignoring configuration {:?}: {}", path, e);
            ClassifierConfig::default()
        }
    }
});

/// Multi-layer perceptron training parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuralConfig {
    pub learning_rate: f64,
    pub momentum: f64,
    /// L2 regularization factor
    pub l2: f64,
    pub max_epochs: usize,
    /// Training stops once the mean epoch error falls below this
    pub max_error: f64,
    /// Seed of weight initialization and sample shuffling
    pub seed: u64,
    /// Epochs between progress reports
    pub epoch_period: usize,
}

impl Default for NeuralConfig {
    fn default() -> Self {
        NeuralConfig {
            learning_rate: 0.1,
            momentum: 0.2,
            l2: 1e-4,
            max_epochs: 1000,
            max_error: 1e-3,
            seed: 6,
            epoch_period: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearConfig {
    /// Widening applied to training minima
    pub factor_for_minima: f64,
    /// Widening applied to training maxima
    pub factor_for_maxima: f64,
    /// Grade given to a perfect match
    pub max_grade: f64,
}

impl Default for LinearConfig {
    fn default() -> Self {
        LinearConfig {
            factor_for_minima: 0.7,
            factor_for_maxima: 1.3,
            max_grade: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BayesianConfig {
    /// Fraction of the largest feature variance added to every variance
    pub var_smoothing: f64,
    /// Additive smoothing of class priors
    pub laplace: f64,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        BayesianConfig {
            var_smoothing: 1e-9,
            laplace: 1.0,
        }
    }
}

/// Model locations; unset entries use platform defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub user_dir: Option<PathBuf>,
    pub default_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn store(&self) -> StorageResult<ModelStore> {
        let user_dir = match &self.user_dir {
            Some(dir) => dir.clone(),
            None => storage::default_user_dir()?,
        };
        let default_dir = self
            .default_dir
            .clone()
            .or_else(storage::default_resource_dir);

        Ok(ModelStore::new(user_dir, default_dir))
    }
}
