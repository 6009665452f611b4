use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use wgrid_core::{AnomalyId, StoreId};

use crate::app::routes::common::parse_or_return;
use crate::app::{dto, errors, AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/stores/:store/anomalies", get(list_anomalies))
        .route("/stores/:store/anomalies/trends", get(anomaly_trends))
        .route("/anomalies/:id/resolve", post(resolve))
        .route("/anomalies/:id/investigate", post(investigate))
}

/// Runs detection and returns the open set.
pub async fn list_anomalies(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(store): Path<String>,
) -> Response {
    let store: StoreId = parse_or_return!(&store);
    errors::respond(StatusCode::OK, services.facade().anomalies(ctx.principal(), &store))
}

pub async fn anomaly_trends(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(store): Path<String>,
) -> Response {
    let store: StoreId = parse_or_return!(&store);
    errors::respond(StatusCode::OK, services.facade().anomaly_trends(ctx.principal(), &store))
}

pub async fn resolve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ResolveAnomalyRequest>,
) -> Response {
    let id: AnomalyId = parse_or_return!(&id);
    errors::respond(
        StatusCode::OK,
        services.facade().resolve_anomaly(ctx.principal(), id, body.resolution),
    )
}

pub async fn investigate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let id: AnomalyId = parse_or_return!(&id);
    errors::respond(StatusCode::OK, services.facade().investigate_anomaly(ctx.principal(), id))
}
