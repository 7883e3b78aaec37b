use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;

use crate::config;
use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    build_app_with_static_dir(state, &config::static_dir())
}

pub(crate) fn build_app_with_static_dir(state: AppState, static_dir: &str) -> Router {
    let static_assets = Router::new()
        .fallback_service(
            ServeDir::new(static_dir)
                .precompressed_br()
                .precompressed_gzip(),
        )
        .layer(middleware::from_fn(set_static_cache_control));

    let app = Router::new()
        .route("/api/search", get(routes::api::search))
        .route("/api/regions/{scope}", get(routes::api::get_regions))
        .route(
            "/api/maps/{scope}",
            axum::routing::delete(routes::api::close_map),
        )
        .route("/api/maps/{scope}/labels", get(routes::api::get_labels))
        .route(
            "/api/maps/{scope}/overlay.svg",
            get(routes::api::get_overlay),
        )
        .route("/api/viewport", post(routes::api::post_viewport))
        .route("/api/events", get(routes::sse::label_events))
        .route("/api/health", get(routes::api::health));

    app.layer(CompressionLayer::new())
        .fallback_service(static_assets)
        .with_state(state)
}

async fn set_static_cache_control(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;

    if response.status().is_success()
        && let Some(cache_control) = cache_control_for_path(&path)
    {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(cache_control),
        );
    }

    response
}

fn cache_control_for_path(path: &str) -> Option<&'static str> {
    // Bundled topology changes only with a deploy.
    path.starts_with("/data/").then_some("public, max-age=86400")
}
