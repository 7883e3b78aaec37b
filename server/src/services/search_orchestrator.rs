use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::try_join_all;
use serde::Serialize;
use suggestion_map_shared::{
    ClickQueries, LabelAssignment, LabelPlacement, MapScope, Region, RegionCatalog,
    SuggestionResult, query,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::share::ShareableQuery;
use crate::state::LabelEvent;
use crate::views::MapViews;

/// Remote lookup of the best suggestion for one search phrase.
pub trait SuggestionSource: Send + Sync {
    fn fetch(
        &self,
        phrase: &str,
    ) -> impl Future<Output = Result<SuggestionResult, String>> + Send;
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchPublished {
    pub generation: u64,
    pub query: String,
    pub scope: String,
    pub substituted_query_preview: String,
    pub share_url: String,
    pub labels: LabelAssignment,
    pub click_queries: ClickQueries,
    pub placements: Vec<LabelPlacement>,
}

#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Published(SearchPublished),
    /// A newer search for the same scope started before this one settled.
    Superseded {
        generation: u64,
        substituted_query_preview: String,
        share_url: String,
    },
}

/// Runs one suggestion lookup per region and publishes the labels as a unit.
pub struct SearchOrchestrator<S> {
    source: S,
    catalog: Arc<RegionCatalog>,
    views: Arc<MapViews>,
    shareable: Arc<ShareableQuery>,
    event_tx: broadcast::Sender<LabelEvent>,
    next_generation: AtomicU64,
    latest_generation: DashMap<MapScope, u64>,
}

impl<S: SuggestionSource> SearchOrchestrator<S> {
    pub fn new(
        source: S,
        catalog: Arc<RegionCatalog>,
        views: Arc<MapViews>,
        shareable: Arc<ShareableQuery>,
        event_tx: broadcast::Sender<LabelEvent>,
    ) -> Self {
        Self {
            source,
            catalog,
            views,
            shareable,
            event_tx,
            next_generation: AtomicU64::new(0),
            latest_generation: DashMap::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn latest_generation(&self, scope: &MapScope) -> Option<u64> {
        self.latest_generation.get(scope).map(|entry| *entry)
    }

    pub async fn run_search(&self, query: &str, scope: &MapScope) -> Result<SearchOutcome, String> {
        // Everything up to the first fetch happens before any suspension point.
        let substituted_query_preview = query::preview(query);
        let share_url = self.shareable.persist(query);
        let generation = self.next_generation.fetch_add(1, Ordering::AcqRel) + 1;

        // Scopes without a map have nothing to fetch or render; keep no state for them.
        if matches!(scope, MapScope::Other(_)) {
            debug!(%scope, generation, "search for unknown map scope");
            return Ok(SearchOutcome::Published(SearchPublished {
                generation,
                query: query.to_string(),
                scope: scope.to_string(),
                substituted_query_preview,
                share_url,
                labels: LabelAssignment::new(),
                click_queries: ClickQueries::new(),
                placements: Vec::new(),
            }));
        }
        self.latest_generation.insert(scope.clone(), generation);

        let regions = self.catalog.regions_for_scope(scope);
        let requests = regions.iter().map(|region| {
            let phrase = query::substitute(query, &region.name);
            async move { self.source.fetch(&phrase).await }
        });

        let results = match try_join_all(requests).await {
            Ok(results) => results,
            Err(e) => {
                warn!(
                    %scope,
                    generation,
                    error = %e,
                    "suggestion lookup failed; keeping previous labels"
                );
                return Err(e);
            }
        };

        if self.latest_generation(scope) != Some(generation) {
            debug!(%scope, generation, "discarding results of superseded search");
            return Ok(SearchOutcome::Superseded {
                generation,
                substituted_query_preview,
                share_url,
            });
        }

        let (labels, click_queries) = build_label_maps(regions, results);
        let Some(placements) = self
            .views
            .publish(
                scope,
                regions,
                generation,
                query.to_string(),
                labels.clone(),
                click_queries.clone(),
            )
            .await
        else {
            return Ok(SearchOutcome::Superseded {
                generation,
                substituted_query_preview,
                share_url,
            });
        };

        let published = SearchPublished {
            generation,
            query: query.to_string(),
            scope: scope.to_string(),
            substituted_query_preview,
            share_url,
            labels,
            click_queries,
            placements,
        };
        info!(
            %scope,
            generation,
            regions = regions.len(),
            labelled = published.placements.len(),
            "published suggestion labels"
        );
        self.broadcast(&published);
        Ok(SearchOutcome::Published(published))
    }

    /// `labels` events for the labels currently on screen, oldest first.
    pub async fn current_events(&self) -> Vec<LabelEvent> {
        self.views
            .snapshots()
            .await
            .into_iter()
            .filter_map(|(scope, current)| {
                let substituted_query_preview = query::preview(&current.query);
                let share_url = self.shareable.share_url(&current.query);
                label_event(&SearchPublished {
                    generation: current.generation,
                    query: current.query,
                    scope: scope.to_string(),
                    substituted_query_preview,
                    share_url,
                    labels: current.labels,
                    click_queries: current.click_queries,
                    placements: current.placements,
                })
            })
            .collect()
    }

    fn broadcast(&self, published: &SearchPublished) {
        if let Some(event) = label_event(published) {
            // No subscribers is fine.
            let _ = self.event_tx.send(event);
        }
    }
}

fn label_event(published: &SearchPublished) -> Option<LabelEvent> {
    match serde_json::to_vec(published) {
        Ok(json) => Some(LabelEvent {
            generation: published.generation,
            json: Arc::new(Bytes::from(json)),
        }),
        Err(e) => {
            warn!(error = %e, "failed to serialize label event");
            None
        }
    }
}

fn build_label_maps(
    regions: &[Region],
    results: Vec<SuggestionResult>,
) -> (LabelAssignment, ClickQueries) {
    let mut labels = LabelAssignment::new();
    let mut click_queries = ClickQueries::new();
    for (region, result) in regions.iter().zip(results) {
        click_queries.insert(region.id.clone(), result.suggestion.clone());
        labels.insert(region.id.clone(), result);
    }
    (labels, click_queries)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use suggestion_map_shared::Topology;

    use super::*;
    use crate::overlay::Viewport;

    const TOPOLOGY: &str = r#"{"objects": {"national": {"geometries": [
        {"id": "TX", "properties": {"name": "Texas"}, "bbox": [-106.6, 25.8, -93.5, 36.5]},
        {"id": "OH", "properties": {"name": "Ohio"}, "bbox": [-84.8, 38.4, -80.5, 42.3]},
        {"id": "VT", "properties": {"name": "Vermont"}, "bbox": [-73.4, 42.7, -71.5, 45.0]}
    ]}}}"#;

    /// Deterministic stand-in for the provider, with optional failures and delays.
    #[derive(Default)]
    struct StubSource {
        failing: Vec<String>,
        delays: HashMap<String, Duration>,
        phrases: Mutex<Vec<String>>,
    }

    impl SuggestionSource for StubSource {
        async fn fetch(&self, phrase: &str) -> Result<SuggestionResult, String> {
            self.phrases
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(phrase.to_string());
            if let Some(delay) = self.delays.get(phrase) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing.iter().any(|f| f == phrase) {
                return Err(format!("request failed: {phrase}"));
            }
            if phrase.contains("Ohio") {
                return Ok(SuggestionResult::default());
            }
            let trimmed = phrase.trim_end();
            Ok(SuggestionResult {
                highlight: format!("{} answer", trimmed.len()),
                suggestion: format!("{trimmed} {} answer", trimmed.len()),
            })
        }
    }

    struct Harness {
        orchestrator: SearchOrchestrator<StubSource>,
        views: Arc<MapViews>,
        events: broadcast::Receiver<LabelEvent>,
    }

    fn harness(source: StubSource) -> Harness {
        let topology = Arc::new(Topology::from_json(TOPOLOGY.as_bytes()).expect("topology"));
        let catalog = Arc::new(RegionCatalog::from_topology(&topology));
        let views = Arc::new(MapViews::new(
            topology,
            "https://search.test/",
            Viewport::default(),
        ));
        let (event_tx, events) = broadcast::channel(16);
        let orchestrator = SearchOrchestrator::new(
            source,
            catalog,
            Arc::clone(&views),
            Arc::new(ShareableQuery::new("q", "default")),
            event_tx,
        );
        Harness {
            orchestrator,
            views,
            events,
        }
    }

    fn published(outcome: SearchOutcome) -> SearchPublished {
        match outcome {
            SearchOutcome::Published(published) => published,
            SearchOutcome::Superseded { .. } => panic!("search should have been published"),
        }
    }

    #[tokio::test]
    async fn builds_one_phrase_per_region_in_order() {
        let h = harness(StubSource::default());
        let outcome = h
            .orchestrator
            .run_search("visit ___", &MapScope::National)
            .await
            .expect("search succeeds");
        let published = published(outcome);

        let phrases = h.orchestrator.source.phrases.lock().expect("phrases").clone();
        assert_eq!(phrases, vec!["visit Texas ", "visit Ohio ", "visit Vermont "]);
        assert_eq!(published.substituted_query_preview, "visit {state name} ");
        assert_eq!(published.share_url, "/?q=visit%20___");
        assert_eq!(published.labels.len(), 3);
        assert_eq!(published.labels["TX"].highlight, "11 answer");
        assert_eq!(published.click_queries["TX"], "visit Texas 11 answer");
        assert!(published.labels["OH"].is_empty());
        assert_eq!(published.click_queries["OH"], "");
    }

    #[tokio::test]
    async fn empty_highlights_are_not_drawn() {
        let h = harness(StubSource::default());
        let published = published(
            h.orchestrator
                .run_search("visit", &MapScope::National)
                .await
                .expect("search succeeds"),
        );
        let ids: Vec<&str> = published
            .placements
            .iter()
            .map(|p| p.region_id.as_str())
            .collect();
        assert_eq!(ids, vec!["TX", "VT"]);
        assert!(published.placements[1].text.starts_with("VT:  "));
    }

    #[tokio::test]
    async fn one_failed_lookup_blocks_the_whole_cycle() {
        let h = harness(StubSource::default());
        let first = published(
            h.orchestrator
                .run_search("visit", &MapScope::National)
                .await
                .expect("first search succeeds"),
        );

        let failing = harness(StubSource {
            failing: vec!["later Vermont".to_string()],
            ..StubSource::default()
        });
        // Seed the failing harness with a good cycle first.
        let seeded = published(
            failing
                .orchestrator
                .run_search("visit", &MapScope::National)
                .await
                .expect("seed search succeeds"),
        );
        assert_eq!(seeded.labels, first.labels);

        let err = failing
            .orchestrator
            .run_search("later", &MapScope::National)
            .await
            .expect_err("failing region rejects the cycle");
        assert!(err.contains("later Vermont"));

        let view = failing
            .views
            .get(&MapScope::National)
            .await
            .expect("view exists");
        let view = view.read().await;
        let on_screen = view.published().expect("seeded labels remain");
        assert_eq!(on_screen.query, "visit");
        assert_eq!(on_screen.labels, seeded.labels);
        // The query is still persisted for sharing even though the cycle failed.
        assert_eq!(
            failing.orchestrator.shareable.current().as_deref(),
            Some("later")
        );
    }

    #[tokio::test]
    async fn same_query_twice_is_idempotent() {
        let h = harness(StubSource::default());
        let a = published(
            h.orchestrator
                .run_search("why is ___ so", &MapScope::National)
                .await
                .expect("first"),
        );
        let b = published(
            h.orchestrator
                .run_search("why is ___ so", &MapScope::National)
                .await
                .expect("second"),
        );
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.click_queries, b.click_queries);
        assert_eq!(a.placements, b.placements);
        assert_eq!(b.generation, a.generation + 1);
    }

    #[tokio::test]
    async fn slower_older_search_is_discarded() {
        let mut delays = HashMap::new();
        delays.insert("slow Texas".to_string(), Duration::from_millis(100));
        let h = harness(StubSource {
            delays,
            ..StubSource::default()
        });

        let scope = MapScope::National;
        let (slow, fast) = tokio::join!(h.orchestrator.run_search("slow", &scope), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            h.orchestrator.run_search("fast", &scope).await
        });

        assert!(matches!(
            slow.expect("slow search settles"),
            SearchOutcome::Superseded { generation: 1, .. }
        ));
        let fast = published(fast.expect("fast search settles"));
        assert_eq!(fast.generation, 2);

        let view = h.views.get(&scope).await.expect("view exists");
        assert_eq!(
            view.read().await.published().map(|p| p.query.clone()),
            Some("fast".to_string())
        );
    }

    #[tokio::test]
    async fn unknown_scope_publishes_nothing_visible() {
        let h = harness(StubSource::default());
        let published = published(
            h.orchestrator
                .run_search("visit", &MapScope::parse("atlantis"))
                .await
                .expect("empty scope still succeeds"),
        );
        assert!(published.labels.is_empty());
        assert!(published.placements.is_empty());
        assert_eq!(published.share_url, "/?q=visit");
    }

    #[tokio::test]
    async fn unknown_scopes_leave_no_views_behind() {
        let h = harness(StubSource::default());
        for i in 0..100 {
            let scope = MapScope::parse(&format!("junk{i}"));
            h.orchestrator
                .run_search("x", &scope)
                .await
                .expect("unknown scope still answers");
            assert_eq!(h.orchestrator.latest_generation(&scope), None);
        }
        assert!(h.views.open_scopes().await.is_empty());
        assert_eq!(h.views.resize_hub().subscriber_count(), 0);
        assert!(h.orchestrator.source.phrases.lock().expect("phrases").is_empty());
    }

    #[tokio::test]
    async fn current_events_replay_what_is_on_screen() {
        let h = harness(StubSource::default());
        assert!(h.orchestrator.current_events().await.is_empty());

        h.orchestrator
            .run_search("visit ___", &MapScope::National)
            .await
            .expect("search succeeds");
        let events = h.orchestrator.current_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].generation, 1);
        let json: serde_json::Value =
            serde_json::from_slice(&events[0].json).expect("event json");
        assert_eq!(json["scope"], "national");
        assert_eq!(json["share_url"], "/?q=visit%20___");
        assert_eq!(json["labels"]["TX"]["highlight"], "11 answer");

        h.views.close(&MapScope::National).await;
        assert!(h.orchestrator.current_events().await.is_empty());
    }

    #[tokio::test]
    async fn published_cycles_are_broadcast() {
        let mut h = harness(StubSource::default());
        h.orchestrator
            .run_search("visit", &MapScope::National)
            .await
            .expect("search succeeds");
        let event = h.events.recv().await.expect("label event");
        assert_eq!(event.generation, 1);
        let json: serde_json::Value = serde_json::from_slice(&event.json).expect("event json");
        assert_eq!(json["labels"]["TX"]["highlight"], "11 answer");
    }
}
