//! Ordered per-widget storage of skeleton models.
//!
//! The store keeps an ordered sequence of models plus a derived id-to-
//! position index, an optional text filter and a highlight pointer. The
//! filter narrows what is *displayed* without touching what is *held*:
//! clearing it restores the full view without reconstruction.
//!
//! Structural mutation emits the `changed` signal so the view layer can
//! re-render. Propagation to linked sources is the owning widget's job;
//! the store itself knows nothing about links.

use std::collections::HashMap;

use arbor_sync_core::Signal;
use parking_lot::RwLock;

use crate::model::{SkeletonId, SkeletonModel};

struct StoreInner {
    /// Models in display order. No duplicate ids.
    skeletons: Vec<SkeletonModel>,
    /// id to position in `skeletons`. Rebuilt on every structural change.
    index: HashMap<SkeletonId, usize>,
    /// Active substring filter on names, if any. Case-sensitive.
    filter: Option<String>,
    /// Currently highlighted skeleton, if any.
    highlighted: Option<SkeletonId>,
}

impl StoreInner {
    fn rebuild_index(&mut self) {
        self.index = self
            .skeletons
            .iter()
            .enumerate()
            .map(|(i, sk)| (sk.id, i))
            .collect();
    }

    fn matches(&self, model: &SkeletonModel) -> bool {
        match &self.filter {
            Some(text) => model.name.contains(text.as_str()),
            None => true,
        }
    }
}

/// Ordered collection of skeleton models with merge, filter and sort
/// semantics.
pub struct SelectionStore {
    inner: RwLock<StoreInner>,
    /// Emitted after every structural mutation; re-render trigger.
    pub changed: Signal<()>,
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStore {
    /// Creates an empty store with no filter.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                skeletons: Vec::new(),
                index: HashMap::new(),
                filter: None,
                highlighted: None,
            }),
            changed: Signal::new(),
        }
    }

    /// Merges `models` into the store.
    ///
    /// Ids already present are replaced wholesale in place, keeping their
    /// position (last writer wins, no field-level merge). New ids are
    /// appended at the end in ascending id order, which makes the outcome
    /// deterministic regardless of the input map's iteration order.
    ///
    /// Returns the number of entries applied so callers can surface the
    /// "nothing selected" notice on empty input.
    pub fn append(&self, models: &HashMap<SkeletonId, SkeletonModel>) -> usize {
        if models.is_empty() {
            return 0;
        }
        {
            let mut inner = self.inner.write();
            let mut new_ids: Vec<SkeletonId> = Vec::new();
            for (&id, model) in models {
                let pos = inner.index.get(&id).copied();
                match pos {
                    Some(pos) => inner.skeletons[pos] = model.clone(),
                    None => new_ids.push(id),
                }
            }
            new_ids.sort_unstable();
            for id in new_ids {
                inner.skeletons.push(models[&id].clone());
            }
            inner.rebuild_index();
        }
        tracing::trace!(
            target: "arbor_sync::store",
            applied = models.len(),
            "appended models"
        );
        self.changed.emit(());
        models.len()
    }

    /// Removes the given skeletons. Missing ids are silent no-ops.
    ///
    /// Clears the highlight pointer if it referenced a removed id.
    pub fn remove(&self, ids: &[SkeletonId]) {
        {
            let mut inner = self.inner.write();
            if let [id] = *ids {
                // Single id: positional splice.
                let Some(pos) = inner.index.get(&id).copied() else {
                    return;
                };
                inner.skeletons.remove(pos);
                if inner.highlighted == Some(id) {
                    inner.highlighted = None;
                }
            } else {
                let before = inner.skeletons.len();
                inner.skeletons.retain(|sk| !ids.contains(&sk.id));
                if before == inner.skeletons.len() {
                    return;
                }
                if let Some(h) = inner.highlighted {
                    if ids.contains(&h) {
                        inner.highlighted = None;
                    }
                }
            }
            inner.rebuild_index();
        }
        self.changed.emit(());
    }

    /// Reorders the sequence in place and rebuilds the index.
    ///
    /// Sorting is a presentation concern only; no propagation happens.
    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&SkeletonModel, &SkeletonModel) -> std::cmp::Ordering,
    {
        {
            let mut inner = self.inner.write();
            inner.skeletons.sort_by(compare);
            inner.rebuild_index();
        }
        self.changed.emit(());
    }

    /// Sets the display filter. Empty text clears it.
    pub fn set_filter(&self, text: &str) {
        {
            let mut inner = self.inner.write();
            inner.filter = if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            };
        }
        self.changed.emit(());
    }

    /// Removes the display filter, restoring full visibility.
    pub fn clear_filter(&self) {
        self.set_filter("");
    }

    /// The active filter text, if any.
    pub fn filter(&self) -> Option<String> {
        self.inner.read().filter.clone()
    }

    /// Clones of all held models in display order, ignoring the filter.
    pub fn models(&self) -> HashMap<SkeletonId, SkeletonModel> {
        self.inner
            .read()
            .skeletons
            .iter()
            .map(|sk| (sk.id, sk.clone()))
            .collect()
    }

    /// Clones of the selected models. When a filter is active, only
    /// selected models that match it are returned.
    pub fn selected_models(&self) -> HashMap<SkeletonId, SkeletonModel> {
        let inner = self.inner.read();
        inner
            .skeletons
            .iter()
            .filter(|sk| sk.selected && inner.matches(sk))
            .map(|sk| (sk.id, sk.clone()))
            .collect()
    }

    /// Ids of the selected models, filter-aware, in display order.
    pub fn selected_ids(&self) -> Vec<SkeletonId> {
        let inner = self.inner.read();
        inner
            .skeletons
            .iter()
            .filter(|sk| sk.selected && inner.matches(sk))
            .map(|sk| sk.id)
            .collect()
    }

    /// Clone of one model, if held.
    pub fn model(&self, id: SkeletonId) -> Option<SkeletonModel> {
        let inner = self.inner.read();
        inner
            .index
            .get(&id)
            .map(|&pos| inner.skeletons[pos].clone())
    }

    /// Whether the store holds `id`, filtered or not.
    pub fn contains(&self, id: SkeletonId) -> bool {
        self.inner.read().index.contains_key(&id)
    }

    /// Number of held models, ignoring the filter.
    pub fn len(&self) -> usize {
        self.inner.read().skeletons.len()
    }

    /// Whether the store holds no models at all.
    pub fn is_empty(&self) -> bool {
        self.inner.read().skeletons.is_empty()
    }

    /// Number of displayed models under the current filter.
    pub fn display_len(&self) -> usize {
        let inner = self.inner.read();
        inner.skeletons.iter().filter(|sk| inner.matches(sk)).count()
    }

    /// Clones of every held model in display order, ignoring the filter.
    pub fn models_ordered(&self) -> Vec<SkeletonModel> {
        self.inner.read().skeletons.clone()
    }

    /// Clones of the displayed models in display order.
    pub fn displayed_models(&self) -> Vec<SkeletonModel> {
        let inner = self.inner.read();
        inner
            .skeletons
            .iter()
            .filter(|sk| inner.matches(sk))
            .cloned()
            .collect()
    }

    /// Position of `id` within the displayed sequence, if displayed.
    pub fn position(&self, id: SkeletonId) -> Option<usize> {
        let inner = self.inner.read();
        inner
            .skeletons
            .iter()
            .filter(|sk| inner.matches(sk))
            .position(|sk| sk.id == id)
    }

    /// Moves the highlight pointer. `None` clears it.
    pub fn set_highlight(&self, id: Option<SkeletonId>) {
        self.inner.write().highlighted = id;
        self.changed.emit(());
    }

    /// The currently highlighted skeleton, if any.
    pub fn highlighted(&self) -> Option<SkeletonId> {
        self.inner.read().highlighted
    }

    /// Applies `f` to every displayed model and returns clones of the
    /// touched models.
    ///
    /// When a filter is active only matching models are touched, which is
    /// what separates "set membership" from "display membership" for bulk
    /// toggles.
    pub fn modify_displayed<F>(&self, mut f: F) -> Vec<SkeletonModel>
    where
        F: FnMut(&mut SkeletonModel),
    {
        let touched = {
            let mut inner = self.inner.write();
            let filter = inner.filter.clone();
            let matches = |sk: &SkeletonModel| match &filter {
                Some(text) => sk.name.contains(text.as_str()),
                None => true,
            };
            inner
                .skeletons
                .iter_mut()
                .filter(|sk| matches(sk))
                .map(|sk| {
                    f(sk);
                    sk.clone()
                })
                .collect::<Vec<_>>()
        };
        if !touched.is_empty() {
            self.changed.emit(());
        }
        touched
    }

    /// Applies `f` to one model and returns a clone of the result.
    pub fn modify<F>(&self, id: SkeletonId, f: F) -> Option<SkeletonModel>
    where
        F: FnOnce(&mut SkeletonModel),
    {
        let touched = {
            let mut inner = self.inner.write();
            let pos = inner.index.get(&id).copied()?;
            let sk = &mut inner.skeletons[pos];
            f(sk);
            sk.clone()
        };
        self.changed.emit(());
        Some(touched)
    }

    /// Sets overall visibility on the displayed subset and returns the
    /// affected models for onward propagation.
    pub fn set_all_visible(&self, visible: bool) -> Vec<SkeletonModel> {
        self.modify_displayed(|sk| sk.set_visible(visible))
    }

    /// Drops everything and resets the highlight pointer.
    pub fn clear(&self) {
        {
            let mut inner = self.inner.write();
            inner.skeletons.clear();
            inner.index.clear();
            inner.highlighted = None;
        }
        self.changed.emit(());
    }

    /// Replaces the whole sequence, preserving the given order.
    ///
    /// Used by name refreshes that drop server-unknown skeletons while
    /// keeping the relative order of the survivors.
    pub(crate) fn replace_all(&self, skeletons: Vec<SkeletonModel>) {
        {
            let mut inner = self.inner.write();
            inner.skeletons = skeletons;
            if let Some(h) = inner.highlighted {
                if !inner.skeletons.iter().any(|sk| sk.id == h) {
                    inner.highlighted = None;
                }
            }
            inner.rebuild_index();
        }
        self.changed.emit(());
    }
}
