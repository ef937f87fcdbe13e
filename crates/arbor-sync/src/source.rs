//! The skeleton source protocol.
//!
//! Widgets that hold skeleton selections participate in synchronization by
//! implementing [`SkeletonSource`]. Each source may link to at most one
//! target; several sources may link to the same target. Propagation is
//! push-based and synchronous: an update walks the link graph depth-first,
//! carrying a [`SourceChain`] of already-visited sources so a cyclic graph
//! (A links B, B links A) terminates after touching each widget once.
//!
//! The chain is a same-call-stack recursion guard, not a lock. Link edges
//! may change between propagation events but not during one.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::model::{SkeletonId, SkeletonModel};

/// Process-unique identity of one source, used for chain membership.
///
/// Allocated at source construction; never reused within the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    /// Allocates the next unused source identity.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The visited set carried through one propagation event.
#[derive(Clone, Debug, Default)]
pub struct SourceChain {
    visited: HashSet<SourceId>,
}

impl SourceChain {
    /// An empty chain, starting a fresh propagation event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` has already been visited in this event.
    pub fn contains(&self, id: SourceId) -> bool {
        self.visited.contains(&id)
    }

    /// Marks `id` as visited. Returns `false` if it already was.
    pub fn insert(&mut self, id: SourceId) -> bool {
        self.visited.insert(id)
    }

    /// Number of sources visited so far.
    pub fn len(&self) -> usize {
        self.visited.len()
    }

    /// Whether no source has been visited yet.
    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}

/// The outgoing synchronization edge of one source.
///
/// Holds at most one target, weakly, so a link never keeps a destroyed
/// widget alive. Re-linking replaces the previous edge. No cycle detection
/// happens here; cycles are broken at propagation time by the chain.
#[derive(Default)]
pub struct SourceLink {
    target: RwLock<Option<Weak<dyn SkeletonSource>>>,
}

impl SourceLink {
    /// Creates an unlinked edge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the outgoing edge. `None` unlinks.
    pub fn set_target(&self, target: Option<&Arc<dyn SkeletonSource>>) {
        *self.target.write() = target.map(Arc::downgrade);
    }

    /// The current target, if still alive.
    pub fn target(&self) -> Option<Arc<dyn SkeletonSource>> {
        self.target.read().as_ref().and_then(Weak::upgrade)
    }

    /// Whether an edge is set and its target is still alive.
    pub fn is_linked(&self) -> bool {
        self.target().is_some()
    }
}

/// Capability interface of a widget participating in selection
/// synchronization.
///
/// Required methods cover local state; the provided methods implement the
/// outbound half of the protocol on top of [`link`](Self::link). Every
/// model crossing this interface is a clone; implementations must never
/// hand out references to their stored models.
pub trait SkeletonSource: Send + Sync {
    /// Identity for chain membership. Must be stable for the source's
    /// lifetime.
    fn source_id(&self) -> SourceId;

    /// Human-readable name, e.g. for sync-target selectors.
    fn name(&self) -> String;

    /// The outgoing link edge.
    fn link(&self) -> &SourceLink;

    /// Clones of every currently selected model, keyed by id.
    fn selected_models(&self) -> HashMap<SkeletonId, SkeletonModel>;

    /// Clone of one model, if held.
    fn model(&self, id: SkeletonId) -> Option<SkeletonModel>;

    /// Whether the source currently holds `id`.
    fn has_skeleton(&self, id: SkeletonId) -> bool;

    /// Inbound entry point of the protocol.
    ///
    /// If `chain` already contains this source, returns without mutating
    /// state or re-broadcasting. Otherwise the implementation must insert
    /// its own id into the chain, merge `models` into local state, and
    /// forward to the linked target with the augmented chain (see
    /// [`forward_update`](Self::forward_update)).
    fn update_models(&self, models: &HashMap<SkeletonId, SkeletonModel>, chain: SourceChain);

    /// Removes the given skeletons locally, then forwards the removal to
    /// the linked target if it still holds any of the ids.
    fn remove_skeletons(&self, ids: &[SkeletonId]);

    /// Drops all local state, then propagates the clear with the same
    /// chain discipline as updates.
    fn clear(&self, chain: SourceChain);

    /// Replaces the outgoing edge. `None` unlinks.
    fn set_link_target(&self, target: Option<&Arc<dyn SkeletonSource>>) {
        match target {
            Some(t) => tracing::debug!(
                target: "arbor_sync::source",
                source = %self.name(),
                link_target = %t.name(),
                "linked"
            ),
            None => tracing::debug!(
                target: "arbor_sync::source",
                source = %self.name(),
                "unlinked"
            ),
        }
        self.link().set_target(target);
    }

    /// The current link target, if any.
    fn link_target(&self) -> Option<Arc<dyn SkeletonSource>> {
        self.link().target()
    }

    /// Pushes a local change to the outgoing target only.
    ///
    /// Marks this source visited first, so a cycle routing the push back
    /// here cannot mutate the origin. Empty `models` is a no-op at this
    /// layer; "nothing selected" feedback is the caller's job.
    fn update_link(&self, models: &HashMap<SkeletonId, SkeletonModel>, mut chain: SourceChain) {
        if models.is_empty() {
            return;
        }
        chain.insert(self.source_id());
        if let Some(target) = self.link_target() {
            tracing::trace!(
                target: "arbor_sync::source",
                source = %self.name(),
                model_count = models.len(),
                "pushing local change to link target"
            );
            target.update_models(models, chain);
        }
    }

    /// Forwards an already-merged update onward. Helper for
    /// [`update_models`](Self::update_models) implementations; expects the
    /// chain to already contain this source.
    fn forward_update(&self, models: &HashMap<SkeletonId, SkeletonModel>, chain: SourceChain) {
        if let Some(target) = self.link_target() {
            target.update_models(models, chain);
        }
    }

    /// Forwards a removal to the target if it still holds any of `ids`.
    ///
    /// The check keeps a downstream widget that never had these skeletons
    /// (a filtered target, say) from receiving a pointless removal and
    /// re-forwarding it.
    fn forward_removal(&self, ids: &[SkeletonId]) {
        if let Some(target) = self.link_target() {
            if ids.iter().any(|&id| target.has_skeleton(id)) {
                target.remove_skeletons(ids);
            }
        }
    }

    /// Propagates a full clear to the outgoing target.
    fn clear_link(&self, mut chain: SourceChain) {
        chain.insert(self.source_id());
        if let Some(target) = self.link_target() {
            target.clear(chain);
        }
    }
}
