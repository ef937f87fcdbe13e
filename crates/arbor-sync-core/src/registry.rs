//! Widget instance registry.
//!
//! Every live widget registers itself here at construction and unregisters
//! in its destroy routine. The registry hands out per-type widget numbers
//! ("Selection 3") and answers "give me the oldest live widget of this kind"
//! queries used by get-or-create flows.
//!
//! The registry is an explicitly constructed service owned by the
//! application root and passed to widgets at construction; it is not a
//! process-wide ambient global.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

/// Identifies one registered widget instance.
///
/// The numeric part counts instances of one widget type and only ever
/// increases, so an ID is never reused while its original holder is alive.
/// Two IDs are equal only if both the widget type and the number match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WidgetId {
    type_id: TypeId,
    number: u64,
}

impl WidgetId {
    /// The per-type instance number, suitable for display names.
    pub fn number(self) -> u64 {
        self.number
    }
}

/// Bookkeeping for one widget type.
struct TypeEntry {
    /// Next instance number to hand out. Never decreases.
    next_number: u64,
    /// Live instances in registration order.
    instances: Vec<(WidgetId, Weak<dyn Any + Send + Sync>)>,
    type_name: &'static str,
}

impl TypeEntry {
    fn new(type_name: &'static str) -> Self {
        Self {
            next_number: 1,
            instances: Vec::new(),
            type_name,
        }
    }
}

/// Registry of live widget instances, keyed by concrete widget type.
///
/// Instances are held as weak handles: dropping the last `Arc` to a widget
/// makes it invisible to all queries even if `unregister` was never called,
/// though widgets are expected to unregister from their destroy routine.
pub struct InstanceRegistry {
    types: RwLock<HashMap<TypeId, TypeEntry>>,
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a widget instance and returns its ID.
    ///
    /// The ID's number is the next unused one for `T`.
    pub fn register<T: Any + Send + Sync>(&self, instance: &Arc<T>) -> WidgetId {
        let mut types = self.types.write();
        let entry = types
            .entry(TypeId::of::<T>())
            .or_insert_with(|| TypeEntry::new(std::any::type_name::<T>()));

        let id = WidgetId {
            type_id: TypeId::of::<T>(),
            number: entry.next_number,
        };
        entry.next_number += 1;

        let weak = Arc::downgrade(instance);
        let weak: Weak<dyn Any + Send + Sync> = weak;
        entry.instances.push((id, weak));

        tracing::debug!(
            target: "arbor_sync_core::registry",
            widget_type = entry.type_name,
            number = id.number,
            "registered widget instance"
        );
        id
    }

    /// Removes an instance from the registry.
    ///
    /// Unknown or already-unregistered IDs are tolerated as a no-op, so
    /// defensive double-teardown is safe.
    pub fn unregister(&self, id: WidgetId) {
        let mut types = self.types.write();
        if let Some(entry) = types.get_mut(&id.type_id) {
            let before = entry.instances.len();
            entry.instances.retain(|(other, _)| *other != id);
            if entry.instances.len() != before {
                tracing::debug!(
                    target: "arbor_sync_core::registry",
                    widget_type = entry.type_name,
                    number = id.number,
                    "unregistered widget instance"
                );
            }
        }
    }

    /// Returns the oldest still-live instance of `T`, if any.
    pub fn first_instance_of<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.prune::<T>();
        let types = self.types.read();
        let entry = types.get(&TypeId::of::<T>())?;
        entry
            .instances
            .iter()
            .find_map(|(_, weak)| weak.upgrade())
            .and_then(|any| any.downcast::<T>().ok())
    }

    /// Returns all live instances of `T` in registration order.
    pub fn instances_of<T: Any + Send + Sync>(&self) -> Vec<Arc<T>> {
        self.prune::<T>();
        let types = self.types.read();
        let Some(entry) = types.get(&TypeId::of::<T>()) else {
            return Vec::new();
        };
        entry
            .instances
            .iter()
            .filter_map(|(_, weak)| weak.upgrade())
            .filter_map(|any| any.downcast::<T>().ok())
            .collect()
    }

    /// Number of live instances of `T`.
    pub fn count_of<T: Any + Send + Sync>(&self) -> usize {
        self.instances_of::<T>().len()
    }

    /// Drops registry entries whose widgets have been deallocated.
    fn prune<T: Any + Send + Sync>(&self) {
        let mut types = self.types.write();
        if let Some(entry) = types.get_mut(&TypeId::of::<T>()) {
            entry.instances.retain(|(_, weak)| weak.strong_count() > 0);
        }
    }
}
