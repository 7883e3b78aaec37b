use std::time::Duration;

use suggestion_map_shared::MapScope;

pub const DEFAULT_SUGGEST_BASE_URL: &str = "https://www.google.com/complete/search";
pub const SUGGEST_CLIENT: &str = "psy-ab";
pub const SUGGEST_JSONP_CALLBACK: &str = "suggestionMapCallback";

pub const DEFAULT_TOPOLOGY_PATH: &str = "data/topology.json";
pub const DEFAULT_STATIC_DIR: &str = "public";
pub const DEFAULT_QUERY: &str = "why is ___ so";
pub const DEFAULT_SCOPE: &str = "national";
pub const QUERY_PARAM: &str = "q";

pub const DEFAULT_SUGGEST_CACHE_TTL_SECS: i64 = 3600; // 1 hour
pub const MAX_SUGGEST_CACHE_ENTRIES: usize = 4096;
pub const DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_BROADCAST_BUFFER: usize = 64;
pub const SSE_KEEPALIVE_SECS: u64 = 15;
pub const DEFAULT_SERVER_PORT: u16 = 3000;

pub const DEFAULT_VIEWPORT_WIDTH: f64 = 960.0;
pub const DEFAULT_VIEWPORT_HEIGHT: f64 = 600.0;
pub const MAX_VIEWPORT_EDGE: f64 = 16_384.0;

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn suggest_base_url() -> String {
    env_string("SUGGEST_BASE_URL").unwrap_or_else(|| DEFAULT_SUGGEST_BASE_URL.to_string())
}

pub fn search_base_url() -> String {
    env_string("SEARCH_BASE_URL")
        .unwrap_or_else(|| suggestion_map_shared::links::DEFAULT_SEARCH_BASE_URL.to_string())
}

/// Extra origins the suggestion client may talk to, besides the configured provider.
pub fn suggest_allowed_origins() -> Vec<String> {
    env_string("SUGGEST_ALLOWED_ORIGINS")
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn topology_path() -> String {
    env_string("TOPOLOGY_PATH").unwrap_or_else(|| DEFAULT_TOPOLOGY_PATH.to_string())
}

pub fn static_dir() -> String {
    env_string("STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string())
}

pub fn default_query() -> String {
    env_string("DEFAULT_QUERY").unwrap_or_else(|| DEFAULT_QUERY.to_string())
}

pub fn default_scope() -> MapScope {
    MapScope::parse(&env_string("DEFAULT_SCOPE").unwrap_or_else(|| DEFAULT_SCOPE.to_string()))
}

pub fn suggest_cache_ttl_secs() -> i64 {
    std::env::var("SUGGEST_CACHE_TTL_SECS")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value >= 0)
        .unwrap_or(DEFAULT_SUGGEST_CACHE_TTL_SECS)
}

pub fn upstream_http_timeout() -> Duration {
    std::env::var("UPSTREAM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS))
}

pub fn upstream_connect_timeout() -> Duration {
    std::env::var("UPSTREAM_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS))
}

pub fn sse_broadcast_buffer() -> usize {
    std::env::var("SSE_BROADCAST_BUFFER")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_BROADCAST_BUFFER)
}

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}
