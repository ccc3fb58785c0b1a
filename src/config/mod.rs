use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::ocfl::store::layout::{LayoutExtensionName, StorageLayout};
use crate::ocfl::{DigestAlgorithm, Result};

const CONFIG_FILE: &str = "config.toml";

/// Library-level tunables for the storage engine.
///
/// This is distinct from the teacher's CLI-oriented `config::Config`: there's no
/// `author_name`/`region`/`bucket`/`profile` here, since the builder/CLI surface that used them
/// is out of scope for this crate. What's left is the handful of knobs the engine itself
/// consults when creating objects, resolving storage paths, and bounding concurrent work.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Digest algorithms accepted for a new object's primary inventory digest.
    pub digest_algorithms: Vec<DigestAlgorithm>,
    /// Default content directory name used when creating new objects.
    pub content_directory: String,
    /// Default zero-padding width applied to new version numbers.
    pub version_padding_width: u32,
    /// The storage layout extension used to map object IDs to storage paths.
    pub storage_layout: LayoutExtensionName,
    /// Raw extension-specific configuration for `storage_layout`, if the extension takes any.
    pub storage_layout_config: Option<serde_json::Value>,
    /// Maximum number of tasks the bounded executor runs concurrently.
    pub concurrency_limit: usize,
}

impl EngineConfig {
    /// Constructs the `StorageLayout` described by this config.
    pub fn storage_layout(&self) -> Result<StorageLayout> {
        let config_bytes = match &self.storage_layout_config {
            Some(value) => Some(serde_json::to_vec(value)?),
            None => None,
        };
        StorageLayout::new(self.storage_layout, config_bytes.as_deref())
    }

    /// Loads the engine config from the user's config directory. If no config file is present,
    /// the default configuration is returned.
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => parse_config(&path),
            _ => Ok(Self::default()),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            digest_algorithms: vec![DigestAlgorithm::Sha512, DigestAlgorithm::Sha256],
            content_directory: "content".to_string(),
            version_padding_width: 0,
            storage_layout: LayoutExtensionName::HashedNTupleLayout,
            storage_layout_config: None,
            concurrency_limit: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// The path to the engine's config file, or `None` if the config directory cannot be resolved.
/// The file may not exist.
pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Reference to the engine's project directories. These directories do **not** necessarily exist.
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "rocfl", "rocfl")
}

fn parse_config(config_file: impl AsRef<Path>) -> Result<EngineConfig> {
    let mut buffer = Vec::new();
    fs::File::open(config_file.as_ref())?.read_to_end(&mut buffer)?;
    let config: EngineConfig = toml::from_slice(&buffer)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_strong_digest_algorithms() {
        let config = EngineConfig::default();
        assert!(config.digest_algorithms.contains(&DigestAlgorithm::Sha512));
        assert_eq!(LayoutExtensionName::HashedNTupleLayout, config.storage_layout);
    }

    #[test]
    fn parses_config_from_toml() {
        let toml = r#"
            digest_algorithms = ["sha256"]
            content_directory = "content"
            version_padding_width = 4
            storage_layout = "0004-hashed-n-tuple-storage-layout"
            concurrency_limit = 8
        "#;

        let config: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(vec![DigestAlgorithm::Sha256], config.digest_algorithms);
        assert_eq!(4, config.version_padding_width);
        assert_eq!(8, config.concurrency_limit);
    }
}
