// Model storage
// Two-tier artifact store: a writable user area and a bundled read-only default area

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the bundled default area
pub const RES_DIR_ENV: &str = "GLYPH_SHAPES_RES_DIR";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to get user data directory")]
    NoDataDir,

    #[error("No artifact at {0:?}")]
    Missing(PathBuf),

    #[error("Digest mismatch for {path:?}: expected {expected}, found {actual}")]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("No default area configured")]
    NoDefaultArea,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Where an artifact is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Written by training
    User,

    /// Shipped with the application
    Default,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::User => f.write_str("user"),
            Tier::Default => f.write_str("default"),
        }
    }
}

/// Classification of a failed load, for the fallback protocol
pub trait LoadFailure: fmt::Display {
    /// Nothing to load in this tier
    fn is_missing(&self) -> bool;

    /// Data was read but does not fit the running descriptor
    fn is_incompatible(&self) -> bool;
}

impl LoadFailure for StorageError {
    fn is_missing(&self) -> bool {
        matches!(self, StorageError::Missing(_) | StorageError::NoDefaultArea)
    }

    fn is_incompatible(&self) -> bool {
        false
    }
}

/// User data directory for trained models
pub fn default_user_dir() -> StorageResult<PathBuf> {
    let data_dir = dirs::data_dir().ok_or(StorageError::NoDataDir)?;
    Ok(data_dir.join("glyph-shapes").join("train"))
}

/// Bundled models: `$GLYPH_SHAPES_RES_DIR`, else `res/` next to the executable
pub fn default_resource_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(RES_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }

    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join("res"))
}

/// Calculate SHA256 hash of data, hex encoded
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn digest_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

#[derive(Debug, Clone)]
pub struct ModelStore {
    user_dir: PathBuf,
    default_dir: Option<PathBuf>,
}

impl ModelStore {
    pub fn new(user_dir: PathBuf, default_dir: Option<PathBuf>) -> Self {
        ModelStore {
            user_dir,
            default_dir,
        }
    }

    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    pub fn default_dir(&self) -> Option<&Path> {
        self.default_dir.as_deref()
    }

    fn path(&self, tier: Tier, name: &str) -> StorageResult<PathBuf> {
        match tier {
            Tier::User => Ok(self.user_dir.join(name)),
            Tier::Default => self
                .default_dir
                .as_ref()
                .map(|dir| dir.join(name))
                .ok_or(StorageError::NoDefaultArea),
        }
    }

    pub fn exists(&self, tier: Tier, name: &str) -> bool {
        self.path(tier, name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Store an artifact in the user area, with its digest alongside
    pub fn write(&self, name: &str, data: &[u8]) -> StorageResult<(PathBuf, String)> {
        fs::create_dir_all(&self.user_dir)?;

        let file_path = self.user_dir.join(name);
        let mut file = fs::File::create(&file_path)?;
        file.write_all(data)?;

        let hash = calculate_sha256(data);
        fs::write(digest_path(&file_path), &hash)?;

        log::debug!("Stored {:?} ({} bytes)", file_path, data.len());
        Ok((file_path, hash))
    }

    /// Read an artifact, checking its digest when one is present
    pub fn read(&self, tier: Tier, name: &str) -> StorageResult<Vec<u8>> {
        let path = self.path(tier, name)?;

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::Missing(path)),
            Err(e) => return Err(e.into()),
        };

        match fs::read_to_string(digest_path(&path)) {
            Ok(expected) => {
                let expected = expected.trim().to_string();
                let actual = calculate_sha256(&data);
                if expected != actual {
                    return Err(StorageError::DigestMismatch {
                        path,
                        expected,
                        actual,
                    });
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(data)
    }

    /// Load a model from the user area, falling back to the default area
    ///
    /// Every failure is logged, none is returned. Incompatible default data
    /// leaves the caller without a model.
    pub fn load_with_fallback<T, E, F>(&self, what: &str, mut load: F) -> Option<T>
    where
        E: LoadFailure,
        F: FnMut(&ModelStore, Tier) -> Result<T, E>,
    {
        for tier in [Tier::User, Tier::Default] {
            match load(self, tier) {
                Ok(model) => {
                    log::info!("Loaded {} from {} area", what, tier);
                    return Some(model);
                }
                Err(e) if e.is_missing() => {
                    log::debug!("No {} in {} area: {}", what, tier, e);
                }
                Err(e) if tier == Tier::Default && e.is_incompatible() => {
                    log::warn!(
                        "Default {} is not compatible, please retrain from scratch: {}",
                        what,
                        e
                    );
                    return None;
                }
                Err(e) => {
                    log::warn!("Cannot load {} from {} area: {}", what, tier, e);
                }
            }
        }

        log::warn!("No usable {} found", what);
        None
    }
}
