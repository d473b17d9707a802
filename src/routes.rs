use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json,
    Router,
};
use bundler::{Orchestrator, RunRequest};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::http_objects::{BundlerAPIError, HealthStatus, OutcomeResponse, TtlParams};

#[derive(Clone)]
pub struct RouteState {
    pub orchestrator: Arc<Orchestrator>,
    /// Cancelled on shutdown; every run gets a child of it.
    pub shutdown: CancellationToken,
}

pub fn create_routes(route_state: RouteState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/bundles/{tag}", get(bundle_by_tag))
        .route("/files/{id}/bundle", get(bundle_by_id))
        .route("/files/{id}", get(share_file))
        .layer(TraceLayer::new_for_http())
        .with_state(route_state)
}

pub async fn healthz() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn bundle_by_tag(
    Path(tag): Path<String>,
    Query(params): Query<TtlParams>,
    State(state): State<RouteState>,
) -> Result<OutcomeResponse, BundlerAPIError> {
    let request = RunRequest::by_tag(tag)
        .with_ttl(params.ttl()?)
        .with_cancel(state.shutdown.child_token());
    Ok(OutcomeResponse(
        state.orchestrator.run_request(request).await,
    ))
}

pub async fn bundle_by_id(
    Path(id): Path<String>,
    Query(params): Query<TtlParams>,
    State(state): State<RouteState>,
) -> Result<OutcomeResponse, BundlerAPIError> {
    let request = RunRequest::by_id(id)
        .with_ttl(params.ttl()?)
        .with_cancel(state.shutdown.child_token());
    Ok(OutcomeResponse(
        state.orchestrator.run_request(request).await,
    ))
}

pub async fn share_file(
    Path(id): Path<String>,
    Query(params): Query<TtlParams>,
    State(state): State<RouteState>,
) -> Result<OutcomeResponse, BundlerAPIError> {
    let ttl = params.ttl()?;
    Ok(OutcomeResponse(
        state
            .orchestrator
            .share_object(&id, ttl, state.shutdown.child_token())
            .await,
    ))
}
