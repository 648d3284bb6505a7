//! Process-wide instance cache keyed by concrete implementation type.
//!
//! Every extension loader of a directory shares one cache, so a type that is
//! reachable under several names or several extension points is constructed
//! once.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};

use crate::Result;
use crate::resolver::{ImplementationType, Instance};

#[derive(Default)]
struct InstanceSlot {
    value: OnceLock<Instance>,
    init: Mutex<()>,
}

/// Singleton instances, one per concrete type.
#[derive(Default)]
pub struct InstanceCache {
    slots: RwLock<HashMap<TypeId, Arc<InstanceSlot>>>,
}

impl InstanceCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached instance of the concrete type, if one has been constructed.
    pub fn get(&self, type_id: TypeId) -> Option<Instance> {
        let slots = self.slots.read();
        slots.get(&type_id).and_then(|slot| slot.value.get().cloned())
    }

    /// Return the instance of `ty`, constructing it on first use.
    ///
    /// Concurrent callers for the same type wait for a single construction.
    /// A failed construction leaves nothing cached, so a later call retries.
    /// The constructor must not request its own type.
    pub fn get_or_create(&self, ty: &ImplementationType) -> Result<Instance> {
        let slot = self.slot(ty.type_id());
        if let Some(instance) = slot.value.get() {
            return Ok(Arc::clone(instance));
        }

        let _guard = slot.init.lock();
        if let Some(instance) = slot.value.get() {
            return Ok(Arc::clone(instance));
        }

        let instance = ty.construct()?;
        tracing::debug!(
            identifier = ty.identifier(),
            type_name = ty.type_name(),
            "Constructed extension instance"
        );
        Ok(Arc::clone(slot.value.get_or_init(|| instance)))
    }

    /// Whether an instance of the concrete type is cached.
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.get(type_id).is_some()
    }

    /// Number of constructed instances.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.value.get().is_some())
            .count()
    }

    /// Whether no instance has been constructed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached instance.
    pub fn clear(&self) {
        self.slots.write().clear();
    }

    fn slot(&self, type_id: TypeId) -> Arc<InstanceSlot> {
        if let Some(slot) = self.slots.read().get(&type_id) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(type_id).or_default())
    }
}
