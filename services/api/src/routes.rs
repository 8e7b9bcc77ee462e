use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use estate_trust::marketplace::{
    marketplace_router, Marketplace, MarketplaceRepository, ObjectStorage,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_marketplace_routes<R, S>(marketplace: Arc<Marketplace<R, S>>) -> axum::Router
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    marketplace_router(marketplace)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/uploads/*key", axum::routing::get(upload_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Serves objects written by the local object store.
pub(crate) async fn upload_endpoint(
    Extension(state): Extension<AppState>,
    Path(key): Path<String>,
) -> Response {
    let traverses = key
        .split(['/', '\\'])
        .any(|segment| segment.is_empty() || segment == "..");
    if traverses {
        return upload_not_found();
    }

    match tokio::fs::read(state.upload_root.join(&key)).await {
        Ok(bytes) => {
            let content_type = mime_guess::from_path(&key).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type.essence_str().to_string())],
                bytes,
            )
                .into_response()
        }
        Err(_) => upload_not_found(),
    }
}

fn upload_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "upload not found" })),
    )
        .into_response()
}
