use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwest::Url;
use suggestion_map_shared::suggestion::{Sanitizer, SuggestionResult, suggestion_from_body};
use tracing::debug;

use crate::config::{MAX_SUGGEST_CACHE_ENTRIES, SUGGEST_CLIENT, SUGGEST_JSONP_CALLBACK};
use crate::services::search_orchestrator::SuggestionSource;

/// Origins outbound suggestion requests may target.
#[derive(Debug, Clone)]
pub struct ResourcePolicy {
    allowed_origins: Vec<String>,
}

impl ResourcePolicy {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_origins = origins
            .into_iter()
            .filter_map(|origin| Url::parse(origin.as_ref().trim()).ok())
            .map(|url| url.origin().ascii_serialization())
            .filter(|origin| origin != "null")
            .collect();
        Self { allowed_origins }
    }

    pub fn check(&self, url: &Url) -> Result<(), String> {
        let origin = url.origin().ascii_serialization();
        if self.allowed_origins.iter().any(|allowed| *allowed == origin) {
            Ok(())
        } else {
            Err(format!("origin {origin} is not on the resource allow-list"))
        }
    }
}

#[derive(Debug, Clone)]
struct CachedSuggestion {
    result: SuggestionResult,
    fetched_at: DateTime<Utc>,
}

/// HTTP client for the autocomplete provider, cached by exact request URL.
#[derive(Clone)]
pub struct SuggestClient {
    http: reqwest::Client,
    base_url: Url,
    sanitizer: Arc<Sanitizer>,
    cache: Arc<DashMap<String, CachedSuggestion>>,
    cache_ttl_secs: i64,
}

impl SuggestClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        policy: &ResourcePolicy,
        cache_ttl_secs: i64,
    ) -> Result<Self, String> {
        let base_url =
            Url::parse(base_url).map_err(|e| format!("invalid suggestion base URL: {e}"))?;
        policy.check(&base_url)?;
        Ok(Self {
            http,
            base_url,
            sanitizer: Arc::new(Sanitizer::default()),
            cache: Arc::new(DashMap::new()),
            cache_ttl_secs,
        })
    }

    pub fn request_url(&self, phrase: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("sclient", SUGGEST_CLIENT)
            .append_pair("q", phrase)
            .append_pair("callback", SUGGEST_JSONP_CALLBACK);
        url
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Look up suggestions for one search phrase.
    ///
    /// Transport failures and non-success statuses are errors; a body that does
    /// not have the expected shape is an empty result.
    pub async fn lookup(&self, phrase: &str) -> Result<SuggestionResult, String> {
        let url = self.request_url(phrase);
        let key = url.as_str().to_string();

        if let Some(result) = self.cached(&key) {
            return Ok(result);
        }

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response body: {e}"))?;

        if !status.is_success() {
            let preview = body.chars().take(200).collect::<String>();
            return Err(format!("upstream status {status}; body preview: {preview}"));
        }

        let result = suggestion_from_body(&self.sanitizer, &body, SUGGEST_JSONP_CALLBACK);
        if result.is_empty() {
            debug!(phrase, "no highlighted suggestion in provider response");
        }
        self.store(key, result.clone());
        Ok(result)
    }

    fn cached(&self, key: &str) -> Option<SuggestionResult> {
        let entry = self.cache.get(key)?;
        let age = Utc::now()
            .signed_duration_since(entry.fetched_at)
            .num_seconds();
        (age < self.cache_ttl_secs).then(|| entry.result.clone())
    }

    fn store(&self, key: String, result: SuggestionResult) {
        if self.cache_ttl_secs <= 0 {
            return;
        }
        if !self.cache.contains_key(&key) {
            while self.cache.len() >= MAX_SUGGEST_CACHE_ENTRIES {
                if !self.evict_oldest() {
                    break;
                }
            }
        }
        self.cache.insert(
            key,
            CachedSuggestion {
                result,
                fetched_at: Utc::now(),
            },
        );
    }

    fn evict_oldest(&self) -> bool {
        let Some(oldest) = self
            .cache
            .iter()
            .min_by_key(|entry| entry.value().fetched_at)
            .map(|entry| entry.key().clone())
        else {
            return false;
        };
        self.cache.remove(&oldest).is_some()
    }
}

impl SuggestionSource for SuggestClient {
    async fn fetch(&self, phrase: &str) -> Result<SuggestionResult, String> {
        self.lookup(phrase).await
    }
}
