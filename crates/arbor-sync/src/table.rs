//! The selection table widget, the canonical concrete skeleton source.
//!
//! Owns a [`SelectionStore`], a color [`Palette`] and a per-skeleton review
//! percentage map. Registers itself in the [`InstanceRegistry`] at
//! construction and unregisters on [`destroy`](SelectionTable::destroy).
//! Server lookups go through an explicitly injected [`ServerClient`];
//! there are no ambient globals.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use arbor_sync_core::{InstanceRegistry, Signal, WidgetId};
use arbor_sync_net::{Result, ServerClient};
use parking_lot::Mutex;

use crate::model::{Color, SkeletonId, SkeletonModel};
use crate::palette::Palette;
use crate::source::{SkeletonSource, SourceChain, SourceId, SourceLink};
use crate::store::SelectionStore;

/// Which synapse side a visibility toggle applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SynapseSide {
    Pre,
    Post,
}

/// A table of selected skeletons, synchronized with other widgets through
/// the skeleton source protocol.
pub struct SelectionTable {
    source_id: SourceId,
    widget_id: OnceLock<WidgetId>,
    store: SelectionStore,
    palette: Palette,
    /// Review completion percentage per skeleton, as last fetched.
    reviews: Mutex<HashMap<SkeletonId, u8>>,
    link: SourceLink,
    client: Arc<ServerClient>,
    registry: Arc<InstanceRegistry>,
    /// Informational messages for the view layer ("no skeletons selected").
    pub notices: Signal<String>,
    /// Server failures surfaced to the view layer.
    pub errors: Signal<String>,
}

impl SelectionTable {
    /// Creates a table and registers it.
    pub fn new(client: Arc<ServerClient>, registry: Arc<InstanceRegistry>) -> Arc<Self> {
        let table = Arc::new(Self {
            source_id: SourceId::next(),
            widget_id: OnceLock::new(),
            store: SelectionStore::new(),
            palette: Palette::new(),
            reviews: Mutex::new(HashMap::new()),
            link: SourceLink::new(),
            client,
            registry: registry.clone(),
            notices: Signal::new(),
            errors: Signal::new(),
        });
        let id = registry.register(&table);
        let _ = table.widget_id.set(id);
        table
    }

    /// Returns the oldest live table, creating one if none exists.
    pub fn get_or_create(
        client: Arc<ServerClient>,
        registry: Arc<InstanceRegistry>,
    ) -> Arc<Self> {
        match registry.first_instance_of::<Self>() {
            Some(existing) => existing,
            None => Self::new(client, registry),
        }
    }

    /// The registry identity, if still registered.
    pub fn widget_id(&self) -> Option<WidgetId> {
        self.widget_id.get().copied()
    }

    /// The backing store. The `changed` signal on it is the re-render
    /// trigger for views.
    pub fn store(&self) -> &SelectionStore {
        &self.store
    }

    /// Review completion percentage for one skeleton, as last fetched.
    pub fn review_percent(&self, id: SkeletonId) -> Option<u8> {
        self.reviews.lock().get(&id).copied()
    }

    /// Adds skeletons by id: ids already present are skipped, names are
    /// fetched from the server and new models get palette colors.
    pub async fn add_skeletons(&self, ids: &[SkeletonId]) -> Result<()> {
        let new_ids: Vec<SkeletonId> = ids
            .iter()
            .copied()
            .filter(|&id| !self.store.contains(id))
            .collect();
        if new_ids.is_empty() {
            self.notices.emit("No new skeletons to add".to_string());
            return Ok(());
        }

        let names = match self.client.neuron_names(&new_ids).await {
            Ok(names) => names,
            Err(err) => {
                self.errors.emit(err.to_string());
                return Err(err);
            }
        };

        let models: HashMap<SkeletonId, SkeletonModel> = new_ids
            .iter()
            .filter_map(|&id| {
                names
                    .get(&id)
                    .map(|name| (id, SkeletonModel::new(id, name.clone(), self.palette.next())))
            })
            .collect();
        self.append_models(models).await
    }

    /// Merges fully-formed models into the table.
    ///
    /// Review status for the incoming ids is fetched first; a server error
    /// aborts the whole merge with prior state intact. Empty input surfaces
    /// the informational notice instead. On success the merge is pushed to
    /// the linked target.
    pub async fn append_models(&self, models: HashMap<SkeletonId, SkeletonModel>) -> Result<()> {
        if models.is_empty() {
            self.notices.emit("No skeletons selected".to_string());
            return Ok(());
        }

        let ids: Vec<SkeletonId> = models.keys().copied().collect();
        let reviews = match self.client.review_status(&ids).await {
            Ok(reviews) => reviews,
            Err(err) => {
                tracing::warn!(
                    target: "arbor_sync::table",
                    table = %self.name(),
                    error = %err,
                    "review status fetch failed, aborting merge"
                );
                self.errors.emit(err.to_string());
                return Err(err);
            }
        };

        self.reviews.lock().extend(reviews);
        self.store.append(&models);
        self.update_link(&models, SourceChain::new());
        Ok(())
    }

    /// Re-fetches neuron names for every held skeleton.
    ///
    /// Skeletons the server no longer knows are dropped; survivors keep
    /// their order and per-model attributes. Renamed models are pushed to
    /// the linked target.
    pub async fn refresh_names(&self) -> Result<()> {
        let all = self.store.models_ordered();
        let ids: Vec<SkeletonId> = all.iter().map(|m| m.id).collect();
        if ids.is_empty() {
            return Ok(());
        }

        let names = match self.client.neuron_names(&ids).await {
            Ok(names) => names,
            Err(err) => {
                self.errors.emit(err.to_string());
                return Err(err);
            }
        };

        let mut renamed = HashMap::new();
        let survivors: Vec<SkeletonModel> = all
            .into_iter()
            .filter_map(|mut model| {
                let name = names.get(&model.id)?;
                if model.name != *name {
                    model.name = name.clone();
                    renamed.insert(model.id, model.clone());
                }
                Some(model)
            })
            .collect();

        {
            let mut reviews = self.reviews.lock();
            reviews.retain(|id, _| names.contains_key(id));
        }
        self.store.replace_all(survivors);
        self.update_link(&renamed, SourceChain::new());
        Ok(())
    }

    /// Sets overall visibility for the given skeletons and pushes the
    /// change onward. Missing ids are silent no-ops.
    pub fn set_visible(&self, ids: &[SkeletonId], visible: bool) {
        let mut touched = HashMap::new();
        for &id in ids {
            if let Some(model) = self.store.modify(id, |m| m.set_visible(visible)) {
                touched.insert(id, model);
            }
        }
        self.update_link(&touched, SourceChain::new());
    }

    /// Toggles overall visibility of the displayed subset.
    ///
    /// With an active filter only matching skeletons are touched.
    pub fn select_all(&self, visible: bool) {
        let affected = self.store.set_all_visible(visible);
        let models: HashMap<SkeletonId, SkeletonModel> =
            affected.into_iter().map(|m| (m.id, m)).collect();
        self.update_link(&models, SourceChain::new());
    }

    /// Toggles pre- or postsynaptic visibility of the displayed subset.
    pub fn set_synapse_visibility(&self, side: SynapseSide, visible: bool) {
        let affected = self.store.modify_displayed(|m| match side {
            SynapseSide::Pre => m.pre_visible = visible,
            SynapseSide::Post => m.post_visible = visible,
        });
        let models: HashMap<SkeletonId, SkeletonModel> =
            affected.into_iter().map(|m| (m.id, m)).collect();
        self.update_link(&models, SourceChain::new());
    }

    /// Sorts by name, case-insensitively. Presentation only, no push.
    pub fn sort_by_name(&self) {
        self.store
            .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    }

    /// Sorts by hue, then saturation, then lightness.
    pub fn sort_by_color(&self) {
        self.store.sort_by(|a, b| {
            let ha = a.color.to_hsl();
            let hb = b.color.to_hsl();
            ha.h.total_cmp(&hb.h)
                .then(ha.s.total_cmp(&hb.s))
                .then(ha.l.total_cmp(&hb.l))
        });
    }

    /// Sets or clears the display filter. Empty text clears.
    pub fn filter_by(&self, text: &str) {
        self.store.set_filter(text);
    }

    /// Reassigns palette colors to the selected skeletons, restarting the
    /// cycle, and pushes the recolored models onward.
    pub fn randomize_colors(&self) {
        self.palette.reset();
        for id in self.store.selected_ids() {
            let color = self.palette.next();
            self.store.modify(id, |m| m.color = color);
        }
        self.update_link(&self.store.selected_models(), SourceChain::new());
    }

    /// Paints every selected skeleton with one color and pushes the
    /// change onward.
    pub fn batch_color(&self, color: Color) {
        let mut touched = HashMap::new();
        for id in self.store.selected_ids() {
            if let Some(model) = self.store.modify(id, |m| m.color = color) {
                touched.insert(id, model);
            }
        }
        self.update_link(&touched, SourceChain::new());
    }

    /// Pushes one model's current state to the linked target.
    pub fn notify_link(&self, model: SkeletonModel) {
        let models = HashMap::from([(model.id, model)]);
        self.update_link(&models, SourceChain::new());
    }

    /// Tears the table down: unlinks, clears local state without
    /// propagating the clear, and unregisters. Safe to call twice.
    pub fn destroy(&self) {
        self.set_link_target(None);
        self.store.clear();
        self.reviews.lock().clear();
        self.palette.reset();
        if let Some(id) = self.widget_id() {
            self.registry.unregister(id);
        }
    }
}

impl SkeletonSource for SelectionTable {
    fn source_id(&self) -> SourceId {
        self.source_id
    }

    fn name(&self) -> String {
        match self.widget_id.get() {
            Some(id) => format!("Selection {}", id.number()),
            None => "Selection".to_string(),
        }
    }

    fn link(&self) -> &SourceLink {
        &self.link
    }

    fn selected_models(&self) -> HashMap<SkeletonId, SkeletonModel> {
        self.store.selected_models()
    }

    fn model(&self, id: SkeletonId) -> Option<SkeletonModel> {
        self.store.model(id)
    }

    fn has_skeleton(&self, id: SkeletonId) -> bool {
        self.store.contains(id)
    }

    fn update_models(&self, models: &HashMap<SkeletonId, SkeletonModel>, mut chain: SourceChain) {
        if chain.contains(self.source_id) {
            tracing::trace!(
                target: "arbor_sync::table",
                table = %self.name(),
                "already visited, breaking propagation"
            );
            return;
        }
        chain.insert(self.source_id);
        self.store.append(models);
        self.forward_update(models, chain);
    }

    fn remove_skeletons(&self, ids: &[SkeletonId]) {
        self.store.remove(ids);
        {
            let mut reviews = self.reviews.lock();
            for id in ids {
                reviews.remove(id);
            }
        }
        self.forward_removal(ids);
    }

    fn clear(&self, mut chain: SourceChain) {
        if chain.contains(self.source_id) {
            return;
        }
        chain.insert(self.source_id);
        self.store.clear();
        self.reviews.lock().clear();
        self.palette.reset();
        self.clear_link(chain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn table_with_server() -> (Arc<SelectionTable>, MockServer, Arc<InstanceRegistry>) {
        let server = MockServer::start().await;
        let client = Arc::new(ServerClient::new(&server.uri(), 1).unwrap());
        let registry = Arc::new(InstanceRegistry::new());
        let table = SelectionTable::new(client, registry.clone());
        (table, server, registry)
    }

    async fn mount_names(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/1/skeleton/neuronnames"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_reviews(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/1/skeleton/review-status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn model(id: SkeletonId, name: &str) -> SkeletonModel {
        SkeletonModel::new(id, name, Color::new(1.0, 0.0, 0.0))
    }

    #[tokio::test]
    async fn test_add_skeletons_fetches_names_and_reviews() {
        let (table, server, _registry) = table_with_server().await;
        mount_names(
            &server,
            serde_json::json!({"10": "DA1-left", "20": "DA1-right"}),
        )
        .await;
        mount_reviews(&server, serde_json::json!({"10": 30, "20": 80})).await;

        table.add_skeletons(&[10, 20]).await.unwrap();

        assert_eq!(table.store().len(), 2);
        assert_eq!(table.model(10).unwrap().name, "DA1-left");
        assert_eq!(table.review_percent(20), Some(80));
        // New models got distinct palette colors.
        assert_ne!(table.model(10).unwrap().color, table.model(20).unwrap().color);
    }

    #[tokio::test]
    async fn test_add_skeletons_skips_present_ids() {
        let (table, server, _registry) = table_with_server().await;
        mount_names(&server, serde_json::json!({"10": "DA1-left"})).await;
        mount_reviews(&server, serde_json::json!({"10": 0})).await;

        table.add_skeletons(&[10]).await.unwrap();
        let color_before = table.model(10).unwrap().color;

        // Second add with only known ids is a notice, not a request.
        let notices = Arc::new(Mutex::new(Vec::new()));
        let notices_clone = notices.clone();
        table.notices.connect(move |msg: &String| {
            notices_clone.lock().push(msg.clone());
        });
        table.add_skeletons(&[10]).await.unwrap();

        assert_eq!(notices.lock().len(), 1);
        assert_eq!(table.store().len(), 1);
        assert_eq!(table.model(10).unwrap().color, color_before);
    }

    #[tokio::test]
    async fn test_append_models_server_error_leaves_state_intact() {
        let (table, server, _registry) = table_with_server().await;
        mount_names(&server, serde_json::json!({"10": "DA1-left"})).await;
        mount_reviews(&server, serde_json::json!({"10": 0})).await;
        table.add_skeletons(&[10]).await.unwrap();

        server.reset().await;
        Mock::given(method("POST"))
            .and(path("/1/skeleton/review-status"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = errors.clone();
        table.errors.connect(move |msg: &String| {
            errors_clone.lock().push(msg.clone());
        });

        let result = table
            .append_models(HashMap::from([(20, model(20, "VA2"))]))
            .await;

        assert!(result.is_err());
        assert_eq!(errors.lock().len(), 1);
        // The failed merge left prior state untouched.
        assert_eq!(table.store().len(), 1);
        assert!(table.has_skeleton(10));
        assert!(!table.has_skeleton(20));
    }

    #[tokio::test]
    async fn test_append_models_empty_emits_notice() {
        let (table, _server, _registry) = table_with_server().await;
        let notices = Arc::new(Mutex::new(Vec::new()));
        let notices_clone = notices.clone();
        table.notices.connect(move |msg: &String| {
            notices_clone.lock().push(msg.clone());
        });

        table.append_models(HashMap::new()).await.unwrap();
        assert_eq!(notices.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_append_models_pushes_to_link_target() {
        let (table, server, registry) = table_with_server().await;
        mount_reviews(&server, serde_json::json!({"10": 0})).await;

        let client = Arc::new(ServerClient::new(&server.uri(), 1).unwrap());
        let downstream = SelectionTable::new(client, registry);
        let target: Arc<dyn SkeletonSource> = downstream.clone();
        table.set_link_target(Some(&target));

        table
            .append_models(HashMap::from([(10, model(10, "DA1-left"))]))
            .await
            .unwrap();

        assert!(downstream.has_skeleton(10));
    }

    #[tokio::test]
    async fn test_refresh_names_drops_stale_and_preserves_order() {
        let (table, server, _registry) = table_with_server().await;
        mount_reviews(&server, serde_json::json!({"1": 0, "2": 0, "3": 0})).await;
        table
            .append_models(HashMap::from([
                (1, model(1, "a")),
                (2, model(2, "b")),
                (3, model(3, "c")),
            ]))
            .await
            .unwrap();
        table.sort_by_name();

        server.reset().await;
        // Server no longer knows skeleton 2 and has renamed 3.
        mount_names(&server, serde_json::json!({"1": "a", "3": "c-renamed"})).await;

        table.refresh_names().await.unwrap();

        assert_eq!(table.store().len(), 2);
        assert!(!table.has_skeleton(2));
        assert_eq!(table.review_percent(2), None);
        assert_eq!(table.model(3).unwrap().name, "c-renamed");
        let ids: Vec<_> = table.store().displayed_models().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_select_all_respects_filter() {
        let (table, server, _registry) = table_with_server().await;
        mount_reviews(&server, serde_json::json!({"1": 0, "2": 0})).await;
        table
            .append_models(HashMap::from([
                (1, model(1, "DA1-left")),
                (2, model(2, "VA2")),
            ]))
            .await
            .unwrap();

        table.filter_by("DA1");
        table.select_all(false);

        assert!(!table.model(1).unwrap().selected);
        assert!(table.model(2).unwrap().selected);
    }

    #[tokio::test]
    async fn test_set_synapse_visibility() {
        let (table, server, _registry) = table_with_server().await;
        mount_reviews(&server, serde_json::json!({"1": 0})).await;
        table
            .append_models(HashMap::from([(1, model(1, "a"))]))
            .await
            .unwrap();

        table.set_synapse_visibility(SynapseSide::Pre, false);
        let m = table.model(1).unwrap();
        assert!(!m.pre_visible);
        assert!(m.post_visible);
    }

    #[tokio::test]
    async fn test_sort_by_color_orders_by_hue() {
        let (table, server, _registry) = table_with_server().await;
        mount_reviews(&server, serde_json::json!({"1": 0, "2": 0, "3": 0})).await;

        let mut red = model(1, "red");
        red.color = Color::new(1.0, 0.0, 0.0);
        let mut green = model(2, "green");
        green.color = Color::new(0.0, 1.0, 0.0);
        let mut blue = model(3, "blue");
        blue.color = Color::new(0.0, 0.0, 1.0);

        table
            .append_models(HashMap::from([(3, blue), (1, red), (2, green)]))
            .await
            .unwrap();
        table.sort_by_color();

        let ids: Vec<_> = table.store().displayed_models().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_randomize_colors_only_touches_selected() {
        let (table, server, _registry) = table_with_server().await;
        mount_reviews(&server, serde_json::json!({"1": 0, "2": 0})).await;

        let mut hidden = model(2, "b");
        hidden.set_visible(false);
        let hidden_color = hidden.color;
        table
            .append_models(HashMap::from([(1, model(1, "a")), (2, hidden)]))
            .await
            .unwrap();

        table.randomize_colors();
        assert_eq!(table.model(2).unwrap().color, hidden_color);
    }

    #[tokio::test]
    async fn test_batch_color_paints_selected() {
        let (table, server, _registry) = table_with_server().await;
        mount_reviews(&server, serde_json::json!({"1": 0, "2": 0})).await;

        let mut hidden = model(2, "b");
        hidden.set_visible(false);
        table
            .append_models(HashMap::from([(1, model(1, "a")), (2, hidden)]))
            .await
            .unwrap();

        let white = Color::new(1.0, 1.0, 1.0);
        table.batch_color(white);

        assert_eq!(table.model(1).unwrap().color, white);
        assert_ne!(table.model(2).unwrap().color, white);
    }

    #[tokio::test]
    async fn test_notify_link_pushes_single_model() {
        let (table, server, registry) = table_with_server().await;
        mount_reviews(&server, serde_json::json!({"1": 0, "2": 0})).await;
        table
            .append_models(HashMap::from([(1, model(1, "a")), (2, model(2, "b"))]))
            .await
            .unwrap();

        let client = Arc::new(ServerClient::new(&server.uri(), 1).unwrap());
        let downstream = SelectionTable::new(client, registry);
        let target: Arc<dyn SkeletonSource> = downstream.clone();
        table.set_link_target(Some(&target));

        let mut recolored = table.model(1).unwrap();
        recolored.color = Color::new(1.0, 1.0, 1.0);
        table.notify_link(recolored);

        // Exactly the pushed model arrives, nothing else.
        assert_eq!(downstream.store().len(), 1);
        assert_eq!(
            downstream.model(1).unwrap().color,
            Color::new(1.0, 1.0, 1.0)
        );
        assert!(!downstream.has_skeleton(2));
        // The push is a clone; the table's own copy is untouched.
        assert_ne!(table.model(1).unwrap().color, Color::new(1.0, 1.0, 1.0));
    }

    #[tokio::test]
    async fn test_notify_link_without_target_is_noop() {
        let (table, server, registry) = table_with_server().await;
        mount_reviews(&server, serde_json::json!({"1": 0})).await;
        table
            .append_models(HashMap::from([(1, model(1, "a"))]))
            .await
            .unwrap();

        let client = Arc::new(ServerClient::new(&server.uri(), 1).unwrap());
        let bystander = SelectionTable::new(client, registry);

        table.notify_link(model(1, "a"));

        assert!(bystander.store().is_empty());
        assert_eq!(table.store().len(), 1);
    }

    #[tokio::test]
    async fn test_destroy_unlinks_and_unregisters() {
        let (table, server, registry) = table_with_server().await;
        mount_reviews(&server, serde_json::json!({"1": 0})).await;

        let client = Arc::new(ServerClient::new(&server.uri(), 1).unwrap());
        let downstream = SelectionTable::new(client, registry.clone());
        let target: Arc<dyn SkeletonSource> = downstream.clone();
        table.set_link_target(Some(&target));

        table
            .append_models(HashMap::from([(1, model(1, "a"))]))
            .await
            .unwrap();
        assert!(downstream.has_skeleton(1));
        assert_eq!(registry.count_of::<SelectionTable>(), 2);

        table.destroy();

        // Local state gone, downstream untouched by the teardown.
        assert!(table.store().is_empty());
        assert!(downstream.has_skeleton(1));
        assert_eq!(registry.count_of::<SelectionTable>(), 1);

        // Double destroy is a no-op.
        table.destroy();
        assert_eq!(registry.count_of::<SelectionTable>(), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_oldest() {
        let server = MockServer::start().await;
        let client = Arc::new(ServerClient::new(&server.uri(), 1).unwrap());
        let registry = Arc::new(InstanceRegistry::new());

        let first = SelectionTable::get_or_create(client.clone(), registry.clone());
        let second = SelectionTable::get_or_create(client.clone(), registry.clone());
        assert!(Arc::ptr_eq(&first, &second));

        first.destroy();
        drop(second);
        drop(first);
        let third = SelectionTable::get_or_create(client, registry.clone());
        assert_eq!(registry.count_of::<SelectionTable>(), 1);
        drop(third);
    }

    #[tokio::test]
    async fn test_names_reflect_widget_numbers() {
        let (table, server, registry) = table_with_server().await;
        let client = Arc::new(ServerClient::new(&server.uri(), 1).unwrap());
        let second = SelectionTable::new(client, registry);

        assert_eq!(table.name(), "Selection 1");
        assert_eq!(second.name(), "Selection 2");
    }
}
