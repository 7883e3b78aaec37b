use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;
use suggestion_map_shared::layout::{self, LabelOptions};
use suggestion_map_shared::{
    ClickHandler, ClickQueries, LabelAssignment, LabelPlacement, LayoutConfig, MapScope, Region,
    Topology, links,
};
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::overlay::{BboxGeometry, SvgScene, Viewport};

/// Fan-out of viewport changes to every open map view.
#[derive(Debug)]
pub struct ResizeHub {
    tx: watch::Sender<Viewport>,
}

impl ResizeHub {
    pub fn new(initial: Viewport) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> Viewport {
        *self.tx.borrow()
    }

    pub fn resize(&self, viewport: Viewport) {
        self.tx.send_replace(viewport);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn watch(&self, view: Weak<RwLock<MapView>>) -> ResizeSubscription {
        let mut rx = self.tx.subscribe();
        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let viewport = *rx.borrow_and_update();
                let Some(view) = view.upgrade() else {
                    break;
                };
                view.write().await.resize(viewport);
            }
        });
        ResizeSubscription { task }
    }
}

/// Registration of a view's resize listener; released when dropped.
#[derive(Debug)]
pub struct ResizeSubscription {
    task: JoinHandle<()>,
}

impl Drop for ResizeSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishedLabels {
    pub generation: u64,
    pub query: String,
    pub labels: LabelAssignment,
    pub click_queries: ClickQueries,
    pub placements: Vec<LabelPlacement>,
    pub published_at: DateTime<Utc>,
}

/// Rendering surface for one map scope.
pub struct MapView {
    scope: MapScope,
    regions: Vec<Region>,
    geometry: BboxGeometry,
    scene: SvgScene,
    config: LayoutConfig,
    search_base_url: Arc<str>,
    published: Option<PublishedLabels>,
    _resize_subscription: Option<ResizeSubscription>,
}

impl MapView {
    fn new(
        scope: MapScope,
        regions: Vec<Region>,
        topology: &Topology,
        viewport: Viewport,
        search_base_url: Arc<str>,
    ) -> Self {
        Self {
            geometry: BboxGeometry::new(topology.bounds_for_scope(&scope), viewport),
            scene: SvgScene::new(viewport),
            config: LayoutConfig::for_scope(&scope),
            scope,
            regions,
            search_base_url,
            published: None,
            _resize_subscription: None,
        }
    }

    pub fn published(&self) -> Option<&PublishedLabels> {
        self.published.as_ref()
    }

    pub fn overlay_svg(&self) -> String {
        self.scene.render()
    }

    /// Replace the current labels. Older generations than the one on screen are ignored.
    fn publish(
        &mut self,
        generation: u64,
        query: String,
        labels: LabelAssignment,
        click_queries: ClickQueries,
    ) -> Option<Vec<LabelPlacement>> {
        if self
            .published
            .as_ref()
            .is_some_and(|current| current.generation > generation)
        {
            debug!(scope = %self.scope, generation, "ignoring labels older than those on screen");
            return None;
        }
        let placements = self.render(&labels, &click_queries);
        debug!(
            scope = %self.scope,
            generation,
            labels = self.scene.label_count(),
            links = self.scene.link_count(),
            "rendered overlay"
        );
        self.published = Some(PublishedLabels {
            generation,
            query,
            labels,
            click_queries,
            placements: placements.clone(),
            published_at: Utc::now(),
        });
        Some(placements)
    }

    fn render(
        &mut self,
        labels: &LabelAssignment,
        click_queries: &ClickQueries,
    ) -> Vec<LabelPlacement> {
        let click_handler = search_click_handler(
            Arc::clone(&self.search_base_url),
            Arc::new(click_queries.clone()),
        );
        let options = LabelOptions {
            font_size: self.config.font_size,
            click_handler: Some(click_handler),
        };
        layout::place(
            &self.regions,
            labels,
            &options,
            &self.config,
            &self.geometry,
            &mut self.scene,
        )
    }

    fn resize(&mut self, viewport: Viewport) {
        self.geometry.resize(viewport);
        self.scene.resize(viewport);
        let Some(published) = self.published.take() else {
            return;
        };
        let placements = self.render(&published.labels, &published.click_queries);
        self.published = Some(PublishedLabels {
            placements,
            ..published
        });
    }
}

fn search_click_handler(base: Arc<str>, click_queries: Arc<ClickQueries>) -> ClickHandler {
    Arc::new(move |region: &Region| {
        click_queries
            .get(&region.id)
            .and_then(|query| links::search_url(&base, query))
    })
}

/// Open map views keyed by scope.
pub struct MapViews {
    topology: Arc<Topology>,
    search_base_url: Arc<str>,
    resize_hub: ResizeHub,
    views: RwLock<HashMap<MapScope, Arc<RwLock<MapView>>>>,
}

impl MapViews {
    pub fn new(topology: Arc<Topology>, search_base_url: &str, viewport: Viewport) -> Self {
        Self {
            topology,
            search_base_url: Arc::from(search_base_url),
            resize_hub: ResizeHub::new(viewport),
            views: RwLock::new(HashMap::new()),
        }
    }

    pub fn resize_hub(&self) -> &ResizeHub {
        &self.resize_hub
    }

    pub async fn open_scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self
            .views
            .read()
            .await
            .keys()
            .map(|scope| scope.to_string())
            .collect();
        scopes.sort();
        scopes
    }

    /// Labels currently published by each open view, oldest generation first.
    pub async fn snapshots(&self) -> Vec<(MapScope, PublishedLabels)> {
        let views: Vec<(MapScope, Arc<RwLock<MapView>>)> = self
            .views
            .read()
            .await
            .iter()
            .map(|(scope, view)| (scope.clone(), Arc::clone(view)))
            .collect();
        let mut snapshots = Vec::with_capacity(views.len());
        for (scope, view) in views {
            if let Some(published) = view.read().await.published() {
                snapshots.push((scope, published.clone()));
            }
        }
        snapshots.sort_by_key(|(_, published)| published.generation);
        snapshots
    }

    pub async fn get(&self, scope: &MapScope) -> Option<Arc<RwLock<MapView>>> {
        self.views.read().await.get(scope).cloned()
    }

    /// Get the view for `scope`, creating it (and its resize listener) on first use.
    pub async fn open(&self, scope: &MapScope, regions: &[Region]) -> Arc<RwLock<MapView>> {
        if let Some(view) = self.get(scope).await {
            return view;
        }

        let mut views = self.views.write().await;
        if let Some(view) = views.get(scope) {
            return Arc::clone(view);
        }
        let view = Arc::new(RwLock::new(MapView::new(
            scope.clone(),
            regions.to_vec(),
            &self.topology,
            self.resize_hub.current(),
            Arc::clone(&self.search_base_url),
        )));
        let subscription = self.resize_hub.watch(Arc::downgrade(&view));
        view.write().await._resize_subscription = Some(subscription);
        views.insert(scope.clone(), Arc::clone(&view));
        view
    }

    /// Dispose of a view; its resize listener goes with it.
    pub async fn close(&self, scope: &MapScope) -> bool {
        self.views.write().await.remove(scope).is_some()
    }

    pub async fn publish(
        &self,
        scope: &MapScope,
        regions: &[Region],
        generation: u64,
        query: String,
        labels: LabelAssignment,
        click_queries: ClickQueries,
    ) -> Option<Vec<LabelPlacement>> {
        let view = self.open(scope, regions).await;
        let mut view = view.write().await;
        view.publish(generation, query, labels, click_queries)
    }
}
