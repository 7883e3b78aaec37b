use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use suggestion_map_shared::links;

/// Query-string state that makes the current search bookmarkable.
#[derive(Debug)]
pub struct ShareableQuery {
    param: String,
    default_query: String,
    current: Mutex<Option<String>>,
}

impl ShareableQuery {
    pub fn new(param: &str, default_query: &str) -> Self {
        Self {
            param: param.to_string(),
            default_query: default_query.to_string(),
            current: Mutex::new(None),
        }
    }

    /// Query to start from: the request's own parameter, then the last
    /// persisted search, then the configured default.
    pub fn initial_query(&self, params: &HashMap<String, String>) -> String {
        if let Some(query) = params
            .get(&self.param)
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
        {
            return query.to_string();
        }
        self.current()
            .unwrap_or_else(|| self.default_query.clone())
    }

    pub fn current(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record `query` as the active search and return its share link.
    pub fn persist(&self, query: &str) -> String {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(query.to_string());
        self.share_url(query)
    }

    pub fn share_url(&self, query: &str) -> String {
        links::share_path(&self.param, query)
    }
}
