//! Per-extension-point loader.
//!
//! An [`ExtensionLoader`] discovers the name → implementation mapping of
//! its extension point once, then hands out one shared instance per name.
//! Discovery uses double-checked locking under the loader lock. Construction
//! is serialized per concrete type by the instance cache, and the first
//! value published to a name's holder is the one every caller sees.

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::{ReentrantMutex, RwLock};

use crate::directory::DirectoryState;
use crate::parser;
use crate::point::{ExtensionPoint, ExtensionPointInfo};
use crate::resolver::ImplementationType;
use crate::{Error, Result};

type ClassMap = HashMap<String, Arc<ImplementationType>>;
type Holder<T> = OnceLock<Arc<T>>;

/// Resolves and caches the implementations of one extension point.
///
/// Obtained from [`LoaderDirectory::for_type`](crate::LoaderDirectory::for_type).
pub struct ExtensionLoader<T: ?Sized + ExtensionPoint> {
    point: ExtensionPointInfo,
    state: Arc<DirectoryState>,
    cached_classes: RwLock<Option<Arc<ClassMap>>>,
    cached_instances: RwLock<HashMap<String, Arc<Holder<T>>>>,
    lock: ReentrantMutex<()>,
}

impl<T: ?Sized + ExtensionPoint> ExtensionLoader<T> {
    pub(crate) fn new(point: ExtensionPointInfo, state: Arc<DirectoryState>) -> Self {
        Self {
            point,
            state,
            cached_classes: RwLock::new(None),
            cached_instances: RwLock::new(HashMap::new()),
            lock: ReentrantMutex::new(()),
        }
    }

    /// Metadata of the extension point this loader serves.
    pub fn point(&self) -> &ExtensionPointInfo {
        &self.point
    }

    /// Get the extension registered under `name`, creating it on first use.
    pub fn get(&self, name: &str) -> Result<Arc<T>> {
        if name.trim().is_empty() {
            return Err(Error::InvalidName {
                name: name.to_string(),
                reason: "extension name must not be blank".to_string(),
            });
        }

        let holder = self.holder(name);
        if let Some(instance) = holder.get() {
            return Ok(Arc::clone(instance));
        }

        // Only discovery holds the loader lock; construction waits on the type's slot.
        let instance = self.create_extension(name)?;
        Ok(Arc::clone(holder.get_or_init(|| instance)))
    }

    /// Get the extension named by the extension point's declared default.
    pub fn get_default(&self) -> Result<Arc<T>> {
        let name = self
            .point
            .default_name()
            .ok_or_else(|| Error::MissingDefault {
                point: self.point.identifier.to_string(),
            })?;
        self.get(name)
    }

    /// Declared default name, if any.
    pub fn default_name(&self) -> Option<&'static str> {
        self.point.default_name()
    }

    /// Check if `name` is configured for this extension point.
    pub fn has_extension(&self, name: &str) -> bool {
        self.class_map().contains_key(name)
    }

    /// List all configured extension names (sorted).
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.class_map().keys().cloned().collect();
        names.sort();
        names
    }

    /// List the names whose instance has already been created (sorted).
    pub fn loaded_extensions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .cached_instances
            .read()
            .iter()
            .filter(|(_, holder)| holder.get().is_some())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Reset every loader of the owning directory and the shared instance cache.
    ///
    /// This is not scoped to this extension point; see
    /// [`LoaderDirectory::clear`](crate::LoaderDirectory::clear).
    pub fn clear(&self) {
        self.state.clear();
    }

    fn holder(&self, name: &str) -> Arc<Holder<T>> {
        if let Some(holder) = self.cached_instances.read().get(name) {
            return Arc::clone(holder);
        }
        Arc::clone(
            self.cached_instances
                .write()
                .entry(name.to_string())
                .or_default(),
        )
    }

    fn create_extension(&self, name: &str) -> Result<Arc<T>> {
        let classes = self.class_map();
        let ty = classes.get(name).ok_or_else(|| Error::UnknownExtension {
            point: self.point.identifier.to_string(),
            name: name.to_string(),
        })?;

        let instance = self.state.instances.get_or_create(ty)?;
        ty.upcast::<T>(instance)
    }

    fn class_map(&self) -> Arc<ClassMap> {
        if let Some(classes) = self.cached_classes.read().as_ref() {
            return Arc::clone(classes);
        }

        let _guard = self.lock.lock();
        if let Some(classes) = self.cached_classes.read().as_ref() {
            return Arc::clone(classes);
        }
        let classes = Arc::new(self.load_class_map());
        *self.cached_classes.write() = Some(Arc::clone(&classes));
        classes
    }

    fn load_class_map(&self) -> ClassMap {
        let identifier = self.point.identifier;
        let blocks = match self.state.source.read(identifier) {
            Ok(blocks) => blocks,
            Err(e) => {
                tracing::warn!(
                    point = identifier,
                    error = %e,
                    "Extension discovery failed; no extensions will be available until cleared"
                );
                return ClassMap::new();
            }
        };

        let mut classes = ClassMap::new();
        for block in &blocks {
            let parsed = parser::parse(&block.text);
            for skipped in &parsed.skipped {
                tracing::debug!(
                    origin = %block.origin,
                    line = skipped.line,
                    reason = %skipped.reason,
                    "Skipping malformed extension entry"
                );
            }

            for entry in parsed.entries {
                let ty = match self
                    .state
                    .implementations
                    .resolve_for(&entry.identifier, &self.point)
                {
                    Ok(ty) => ty,
                    Err(e) => {
                        tracing::warn!(
                            origin = %block.origin,
                            line = entry.line,
                            name = %entry.name,
                            error = %e,
                            "Dropping extension entry"
                        );
                        continue;
                    }
                };

                match classes.entry(entry.name) {
                    Entry::Vacant(slot) => {
                        slot.insert(ty);
                    }
                    Entry::Occupied(existing) => {
                        tracing::debug!(
                            origin = %block.origin,
                            line = entry.line,
                            name = %existing.key(),
                            "Extension name already registered; keeping the first"
                        );
                    }
                }
            }
        }

        tracing::debug!(
            point = identifier,
            resources = blocks.len(),
            extensions = classes.len(),
            "Discovered extensions"
        );
        classes
    }
}

impl<T: ?Sized + ExtensionPoint> fmt::Debug for ExtensionLoader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionLoader")
            .field("point", &self.point.identifier)
            .field("discovered", &self.cached_classes.read().is_some())
            .finish()
    }
}

/// Type-erased view of a loader held by the directory.
pub(crate) trait LoaderHandle: Send + Sync {
    /// Forget discovered types and created instances.
    fn reset(&self);

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: ?Sized + ExtensionPoint> LoaderHandle for ExtensionLoader<T> {
    fn reset(&self) {
        self.cached_instances.write().clear();
        *self.cached_classes.write() = None;
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
