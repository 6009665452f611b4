use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use wgrid_core::{NegotiationId, RouteId, StoreId};
use wgrid_negotiation::TransferRequest;
use wgrid_routing::Objective;

use crate::app::routes::common::parse_or_return;
use crate::app::{dto, errors, AppServices};
use crate::context::PrincipalContext;

/// Mounted at `/negotiations`; the per-store listing is at the root.
pub fn router() -> Router {
    Router::new()
        .route("/", post(propose))
        .route("/:id", get(get_negotiation))
        .route("/:id/history", get(history))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
        .route("/:id/dispatch", post(dispatch))
        .route("/:id/fulfill", post(fulfill))
        .route("/:id/cancel", post(cancel))
        .route("/:id/progress", post(progress))
}

/// `GET /stores/:store/negotiations`
pub fn store_router() -> Router {
    Router::new().route("/stores/:store/negotiations", get(list_for_store))
}

pub async fn propose(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<TransferRequest>,
) -> Response {
    errors::respond(
        StatusCode::CREATED,
        services.facade().propose_negotiation(ctx.principal(), body),
    )
}

pub async fn list_for_store(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(store): Path<String>,
) -> Response {
    let store: StoreId = parse_or_return!(&store);
    errors::respond(StatusCode::OK, services.facade().negotiations(ctx.principal(), &store))
}

pub async fn get_negotiation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let id: NegotiationId = parse_or_return!(&id);
    errors::respond(StatusCode::OK, services.facade().negotiation(ctx.principal(), id))
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let id: NegotiationId = parse_or_return!(&id);
    errors::respond(
        StatusCode::OK,
        services.facade().negotiation_history(ctx.principal(), id),
    )
}

pub async fn approve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let id: NegotiationId = parse_or_return!(&id);
    errors::respond(
        StatusCode::OK,
        services.facade().approve_negotiation(ctx.principal(), id),
    )
}

pub async fn reject(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::RejectRequest>>,
) -> Response {
    let id: NegotiationId = parse_or_return!(&id);
    let reason = body.and_then(|Json(b)| b.reason);
    errors::respond(
        StatusCode::OK,
        services.facade().reject_negotiation(ctx.principal(), id, reason),
    )
}

pub async fn dispatch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DispatchRequest>,
) -> Response {
    let id: NegotiationId = parse_or_return!(&id);
    let route_id: RouteId = parse_or_return!(&body.route_id);
    let objective: Option<Objective> = match body.objective.as_deref() {
        Some(raw) => Some(parse_or_return!(raw)),
        None => None,
    };
    errors::respond(
        StatusCode::OK,
        services
            .facade()
            .dispatch_negotiation(ctx.principal(), id, route_id, objective),
    )
}

pub async fn fulfill(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let id: NegotiationId = parse_or_return!(&id);
    errors::respond(
        StatusCode::OK,
        services.facade().fulfill_negotiation(ctx.principal(), id),
    )
}

pub async fn cancel(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let id: NegotiationId = parse_or_return!(&id);
    errors::respond(
        StatusCode::OK,
        services.facade().cancel_negotiation(ctx.principal(), id),
    )
}

pub async fn progress(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ProgressRequest>,
) -> Response {
    let id: NegotiationId = parse_or_return!(&id);
    errors::respond(
        StatusCode::OK,
        services
            .facade()
            .report_delivery_progress(ctx.principal(), id, body.projected_duration_min),
    )
}
