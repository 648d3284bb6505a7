//! Configuration sources for extension discovery.
//!
//! A [`ConfigSource`] returns every raw configuration block known for an
//! extension-point identifier. Blocks are returned in search order; the
//! loader merges them with first-wins semantics, so order matters.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{ConfigStore, NormalizedPath, ResourcePath, Result, io, validate_identifier};

/// One raw configuration block and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBlock {
    /// Human-readable origin (file path or in-memory label), used in logs.
    pub origin: String,
    /// Unparsed `name=identifier` text.
    pub text: String,
}

impl ConfigBlock {
    pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
        }
    }
}

/// Supplier of raw configuration blocks for an extension point.
///
/// An error means discovery as a whole failed. Implementations should return
/// an empty list, not an error, when there is simply nothing configured.
pub trait ConfigSource: Send + Sync {
    fn read(&self, identifier: &str) -> Result<Vec<ConfigBlock>>;
}

/// Settings for [`DirectorySource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Roots searched in order for `<root>/<resource_dir>/<identifier>`.
    pub search_paths: Vec<PathBuf>,
    /// Directory below each root holding one file per extension point.
    pub resource_dir: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            resource_dir: ResourcePath::ExtensionDir.as_str().to_string(),
        }
    }
}

impl SourceConfig {
    /// Load settings from a TOML, JSON or YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        ConfigStore::new().load(&NormalizedPath::new(path))
    }

    /// Build settings from the process environment.
    ///
    /// `SPI_CONFIG` names a file loaded first; `SPI_SEARCH_PATH` (an OS path
    /// list) and `SPI_RESOURCE_DIR` override it. With no search path
    /// configured anywhere, the current directory is searched.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var_os(key))
    }

    /// Same as [`SourceConfig::from_env`] with an injectable variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self> {
        let mut config = match lookup(ResourcePath::ConfigFileEnv.as_str()) {
            Some(file) if !file.is_empty() => Self::load(PathBuf::from(file))?,
            _ => Self::default(),
        };

        if let Some(paths) = lookup(ResourcePath::SearchPathEnv.as_str()) {
            let paths: Vec<PathBuf> = std::env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            if !paths.is_empty() {
                config.search_paths = paths;
            }
        }

        if let Some(dir) = lookup(ResourcePath::ResourceDirEnv.as_str()) {
            let dir = dir.to_string_lossy().trim().to_string();
            if !dir.is_empty() {
                config.resource_dir = dir;
            }
        }

        if config.search_paths.is_empty() {
            config.search_paths.push(PathBuf::from("."));
        }

        Ok(config)
    }
}

/// Reads `<root>/<resource_dir>/<identifier>` from each search root.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    roots: Vec<NormalizedPath>,
    resource_dir: String,
}

impl DirectorySource {
    /// Search the given roots with the default resource directory.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            roots: roots.into_iter().map(NormalizedPath::new).collect(),
            resource_dir: ResourcePath::ExtensionDir.as_str().to_string(),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(&config.search_paths).with_resource_dir(&config.resource_dir)
    }

    /// Replace the directory searched below each root.
    pub fn with_resource_dir(mut self, resource_dir: impl Into<String>) -> Self {
        self.resource_dir = resource_dir.into();
        self
    }

    /// Path of the configuration file for `identifier` below `root`.
    pub fn resource_path(&self, root: &NormalizedPath, identifier: &str) -> NormalizedPath {
        root.join(&self.resource_dir).join(identifier)
    }

    pub fn roots(&self) -> &[NormalizedPath] {
        &self.roots
    }
}

impl ConfigSource for DirectorySource {
    fn read(&self, identifier: &str) -> Result<Vec<ConfigBlock>> {
        validate_identifier(identifier)?;

        let mut blocks = Vec::new();
        for root in &self.roots {
            let path = self.resource_path(root, identifier);
            match io::read_optional_text(&path)? {
                Some(text) => {
                    tracing::debug!(%path, identifier, "Found extension resource");
                    blocks.push(ConfigBlock::new(path.as_str(), text));
                }
                None => {
                    tracing::trace!(%path, identifier, "No extension resource at root");
                }
            }
        }
        Ok(blocks)
    }
}

/// In-memory configuration, keyed by extension-point identifier.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    blocks: HashMap<String, Vec<ConfigBlock>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block for `identifier` (builder pattern).
    pub fn with_block(mut self, identifier: impl Into<String>, text: impl Into<String>) -> Self {
        self.add_block(identifier, text);
        self
    }

    /// Append a block for `identifier`.
    pub fn add_block(&mut self, identifier: impl Into<String>, text: impl Into<String>) {
        let identifier = identifier.into();
        let blocks = self.blocks.entry(identifier.clone()).or_default();
        let origin = format!("memory:{}#{}", identifier, blocks.len());
        blocks.push(ConfigBlock::new(origin, text));
    }
}

impl ConfigSource for StaticSource {
    fn read(&self, identifier: &str) -> Result<Vec<ConfigBlock>> {
        Ok(self.blocks.get(identifier).cloned().unwrap_or_default())
    }
}
