use std::sync::Arc;

use bytes::Bytes;
use suggestion_map_shared::{MapScope, RegionCatalog, Topology};
use tokio::sync::broadcast;
use tracing::warn;

use crate::config::{
    self, DEFAULT_SUGGEST_BASE_URL, QUERY_PARAM, sse_broadcast_buffer, upstream_connect_timeout,
    upstream_http_timeout,
};
use crate::overlay::Viewport;
use crate::services::search_orchestrator::SearchOrchestrator;
use crate::services::suggestion_fetcher::{ResourcePolicy, SuggestClient};
use crate::share::ShareableQuery;
use crate::views::MapViews;

/// Pre-serialized `labels` event, shared by all SSE clients via Arc.
#[derive(Debug, Clone)]
pub struct LabelEvent {
    pub generation: u64,
    pub json: Arc<Bytes>,
}

#[derive(Debug, Clone)]
pub struct StateSettings {
    pub suggest_base_url: String,
    pub allowed_origins: Vec<String>,
    pub search_base_url: String,
    pub default_query: String,
    pub default_scope: MapScope,
    pub cache_ttl_secs: i64,
    pub viewport: Viewport,
}

impl StateSettings {
    pub fn from_env() -> Self {
        // The stock provider is always allowed; anything else must be listed.
        let mut allowed_origins = vec![DEFAULT_SUGGEST_BASE_URL.to_string()];
        allowed_origins.extend(config::suggest_allowed_origins());
        Self {
            suggest_base_url: config::suggest_base_url(),
            allowed_origins,
            search_base_url: config::search_base_url(),
            default_query: config::default_query(),
            default_scope: config::default_scope(),
            cache_ttl_secs: config::suggest_cache_ttl_secs(),
            viewport: Viewport::default(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SearchOrchestrator<SuggestClient>>,
    pub catalog: Arc<RegionCatalog>,
    pub views: Arc<MapViews>,
    pub shareable: Arc<ShareableQuery>,
    pub event_tx: broadcast::Sender<LabelEvent>,
    pub default_scope: MapScope,
}

impl AppState {
    pub fn new(topology: Topology, settings: StateSettings) -> Result<Self, String> {
        let (event_tx, _) = broadcast::channel(sse_broadcast_buffer());
        let topology = Arc::new(topology);
        let catalog = Arc::new(RegionCatalog::from_topology(&topology));
        let views = Arc::new(MapViews::new(
            Arc::clone(&topology),
            &settings.search_base_url,
            settings.viewport,
        ));
        let shareable = Arc::new(ShareableQuery::new(QUERY_PARAM, &settings.default_query));
        let client = SuggestClient::new(
            build_http_client(),
            &settings.suggest_base_url,
            &ResourcePolicy::new(&settings.allowed_origins),
            settings.cache_ttl_secs,
        )?;
        let orchestrator = Arc::new(SearchOrchestrator::new(
            client,
            Arc::clone(&catalog),
            Arc::clone(&views),
            Arc::clone(&shareable),
            event_tx.clone(),
        ));

        Ok(Self {
            orchestrator,
            catalog,
            views,
            shareable,
            event_tx,
            default_scope: settings.default_scope,
        })
    }
}

fn build_http_client() -> reqwest::Client {
    let request_timeout = upstream_http_timeout();
    let connect_timeout = upstream_connect_timeout();
    reqwest::Client::builder()
        .user_agent("suggestion-map/0.1")
        .timeout(request_timeout)
        .connect_timeout(connect_timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(
                error = %e,
                "failed to build configured HTTP client, falling back to defaults"
            );
            reqwest::Client::new()
        })
}
