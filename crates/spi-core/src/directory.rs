//! Directory of extension loaders.
//!
//! A [`LoaderDirectory`] owns everything the loaders share: the
//! configuration source, the implementation table, the instance cache and
//! the loaders themselves (one per extension-point type). Hosts normally use
//! the process-wide [`LoaderDirectory::global`] through [`for_type`]; tests
//! and embedders can build isolated directories with [`LoaderDirectory::new`].

use std::any::TypeId;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use spi_fs::{ConfigSource, DirectorySource, SourceConfig};

use crate::cache::InstanceCache;
use crate::loader::{ExtensionLoader, LoaderHandle};
use crate::point::{self, ExtensionPoint};
use crate::resolver::ImplementationTable;
use crate::{Error, Result};

/// State shared between a directory and the loaders it created.
pub(crate) struct DirectoryState {
    pub(crate) source: Arc<dyn ConfigSource>,
    pub(crate) implementations: Arc<ImplementationTable>,
    pub(crate) instances: InstanceCache,
    loaders: RwLock<HashMap<TypeId, Arc<dyn LoaderHandle>>>,
}

impl DirectoryState {
    /// Reset every known loader, forget them, and drop all cached instances.
    pub(crate) fn clear(&self) {
        let loaders: Vec<_> = self.loaders.write().drain().map(|(_, l)| l).collect();
        for loader in &loaders {
            loader.reset();
        }
        self.instances.clear();
        tracing::info!(loaders = loaders.len(), "Cleared extension loaders and instances");
    }
}

/// Map from extension-point type to its [`ExtensionLoader`].
pub struct LoaderDirectory {
    state: Arc<DirectoryState>,
}

impl LoaderDirectory {
    /// Create a directory reading configuration from `source` and resolving
    /// identifiers against `implementations`.
    pub fn new(source: impl ConfigSource + 'static, implementations: ImplementationTable) -> Self {
        Self::with_shared(Arc::new(source), Arc::new(implementations))
    }

    /// Create a directory over an already shared source and table.
    pub fn with_shared(
        source: Arc<dyn ConfigSource>,
        implementations: Arc<ImplementationTable>,
    ) -> Self {
        Self {
            state: Arc::new(DirectoryState {
                source,
                implementations,
                instances: InstanceCache::new(),
                loaders: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Create a directory searching the configured roots, resolving against
    /// every [`implementation!`](crate::implementation) linked into the binary.
    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(
            DirectorySource::from_config(config),
            ImplementationTable::from_inventory(),
        )
    }

    /// The process-wide directory, configured from the environment on first use.
    ///
    /// See [`SourceConfig::from_env`] for the variables consulted.
    pub fn global() -> &'static LoaderDirectory {
        static GLOBAL: OnceLock<LoaderDirectory> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let config = SourceConfig::from_env().unwrap_or_else(|e| {
                tracing::warn!(
                    error = %e,
                    "Invalid SPI configuration; searching the current directory"
                );
                SourceConfig {
                    search_paths: vec![PathBuf::from(".")],
                    ..SourceConfig::default()
                }
            });
            tracing::debug!(
                search_paths = ?config.search_paths,
                resource_dir = %config.resource_dir,
                "Initializing global loader directory"
            );
            Self::from_config(&config)
        })
    }

    /// Get the loader for the extension point `T`, creating it on first use.
    ///
    /// Concurrent first callers all receive the same loader.
    pub fn for_type<T: ?Sized + ExtensionPoint>(&self) -> Result<Arc<ExtensionLoader<T>>> {
        let info = point::validate::<T>()?;

        let existing = self.state.loaders.read().get(&info.type_id).cloned();
        let handle = match existing {
            Some(handle) => handle,
            None => {
                let mut loaders = self.state.loaders.write();
                let handle = loaders.entry(info.type_id).or_insert_with(|| {
                    tracing::debug!(point = info.identifier, "Creating extension loader");
                    Arc::new(ExtensionLoader::<T>::new(info, Arc::clone(&self.state)))
                        as Arc<dyn LoaderHandle>
                });
                Arc::clone(handle)
            }
        };

        handle
            .into_any()
            .downcast::<ExtensionLoader<T>>()
            .map_err(|_| Error::InvalidExtensionPoint {
                type_name: info.type_name.to_string(),
                reason: "a loader of a different type is registered for this type id".into(),
            })
    }

    /// Check if a loader exists for `T`.
    pub fn contains<T: ?Sized + ExtensionPoint>(&self) -> bool {
        self.state.loaders.read().contains_key(&TypeId::of::<T>())
    }

    /// Number of loaders created since the last clear.
    pub fn len(&self) -> usize {
        self.state.loaders.read().len()
    }

    /// Whether no loader has been created since the last clear.
    pub fn is_empty(&self) -> bool {
        self.state.loaders.read().is_empty()
    }

    /// Number of singleton instances currently cached.
    pub fn instance_count(&self) -> usize {
        self.state.instances.len()
    }

    pub fn implementations(&self) -> &ImplementationTable {
        &self.state.implementations
    }

    /// Reset the whole directory.
    ///
    /// Every loader forgets its discovered types and instances, the directory
    /// forgets its loaders, and the instance cache is emptied. The next lookup
    /// rediscovers from configuration.
    pub fn clear(&self) {
        self.state.clear();
    }
}

impl Drop for LoaderDirectory {
    fn drop(&mut self) {
        // Loaders point back at the state; drop the map to break the cycle.
        self.state.loaders.write().clear();
    }
}

impl std::fmt::Debug for LoaderDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderDirectory")
            .field("loaders", &self.len())
            .field("instances", &self.instance_count())
            .finish()
    }
}

/// Get the loader for `T` from the process-wide directory.
pub fn for_type<T: ?Sized + ExtensionPoint>() -> Result<Arc<ExtensionLoader<T>>> {
    LoaderDirectory::global().for_type::<T>()
}
