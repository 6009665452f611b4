use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};

use wgrid_core::StoreId;
use wgrid_routing::Objective;

use crate::app::routes::common::parse_or_return;
use crate::app::{dto, errors, AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/stores/:store/routes", get(candidate_routes))
}

/// `?objective=eco|time|cost` (default eco).
pub async fn candidate_routes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(store): Path<String>,
    Query(query): Query<dto::RoutesQuery>,
) -> Response {
    let store: StoreId = parse_or_return!(&store);
    let objective: Objective = match query.objective.as_deref() {
        Some(raw) => parse_or_return!(raw),
        None => Objective::Eco,
    };
    errors::respond(
        StatusCode::OK,
        services.facade().routes(ctx.principal(), &store, objective),
    )
}
