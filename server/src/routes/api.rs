use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use suggestion_map_shared::{MapScope, Region};

use crate::overlay::Viewport;
use crate::services::search_orchestrator::SearchOutcome;
use crate::state::AppState;

const MAX_QUERY_LEN: usize = 256;
const SVG_CONTENT_TYPE: &str = "image/svg+xml; charset=utf-8";

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "national_regions": state.catalog.regions_for_scope(&MapScope::National).len(),
        "world_regions": state.catalog.regions_for_scope(&MapScope::World).len(),
        "open_views": state.views.open_scopes().await,
        "cached_suggestions": state.orchestrator.source().cached_len(),
        "subscribers": state.event_tx.receiver_count(),
        "viewport_listeners": state.views.resize_hub().subscriber_count(),
    }))
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = state.shareable.initial_query(&params);
    let query = match normalize_query(&query) {
        Ok(query) => query,
        Err(status) => return status.into_response(),
    };
    let scope = params
        .get("scope")
        .map(|raw| MapScope::parse(raw))
        .unwrap_or_else(|| state.default_scope.clone());

    match state.orchestrator.run_search(query, &scope).await {
        Ok(SearchOutcome::Published(published)) => {
            let mut body = match serde_json::to_value(&published) {
                Ok(body) => body,
                Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            };
            body["superseded"] = json!(false);
            Json(body).into_response()
        }
        Ok(SearchOutcome::Superseded {
            generation,
            substituted_query_preview,
            share_url,
        }) => Json(json!({
            "superseded": true,
            "generation": generation,
            "query": query,
            "scope": scope.to_string(),
            "substituted_query_preview": substituted_query_preview,
            "share_url": share_url,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": e, "scope": scope.to_string() })),
        )
            .into_response(),
    }
}

pub async fn get_regions(
    State(state): State<AppState>,
    Path(scope): Path<String>,
) -> Json<Vec<Region>> {
    Json(
        state
            .catalog
            .regions_for_scope(&MapScope::parse(&scope))
            .to_vec(),
    )
}

pub async fn get_labels(
    State(state): State<AppState>,
    Path(scope): Path<String>,
) -> Response {
    let Some(view) = state.views.get(&MapScope::parse(&scope)).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let view = view.read().await;
    match view.published() {
        Some(published) => Json(published.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn get_overlay(
    State(state): State<AppState>,
    Path(scope): Path<String>,
) -> Response {
    let Some(view) = state.views.get(&MapScope::parse(&scope)).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let svg = view.read().await.overlay_svg();
    let mut response = svg.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(SVG_CONTENT_TYPE),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

pub async fn close_map(State(state): State<AppState>, Path(scope): Path<String>) -> StatusCode {
    if state.views.close(&MapScope::parse(&scope)).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn post_viewport(
    State(state): State<AppState>,
    Json(viewport): Json<Viewport>,
) -> StatusCode {
    if !viewport.is_valid() {
        return StatusCode::BAD_REQUEST;
    }
    state.views.resize_hub().resize(viewport);
    StatusCode::NO_CONTENT
}

fn normalize_query(query: &str) -> Result<&str, StatusCode> {
    let trimmed = query.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_QUERY_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }
    if trimmed.chars().any(char::is_control) {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(trimmed)
}
