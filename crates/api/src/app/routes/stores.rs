use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};

use wgrid_core::StoreId;

use crate::app::routes::common::parse_or_return;
use crate::app::{dto, errors, AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/stores", get(list_stores))
        .route("/stores/:store/metrics", get(store_metrics))
        .route("/stores/:store/eco", get(eco_summary))
        .route(
            "/stores/:store/suggestions",
            get(suggestions).post(suggestions_with_forecast),
        )
}

pub async fn list_stores(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> Response {
    errors::respond(StatusCode::OK, services.facade().stores(ctx.principal()))
}

pub async fn store_metrics(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(store): Path<String>,
) -> Response {
    let store: StoreId = parse_or_return!(&store);
    errors::respond(StatusCode::OK, services.facade().store_metrics(ctx.principal(), &store))
}

pub async fn eco_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(store): Path<String>,
) -> Response {
    let store: StoreId = parse_or_return!(&store);
    errors::respond(StatusCode::OK, services.facade().eco_summary(ctx.principal(), &store))
}

pub async fn suggestions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(store): Path<String>,
) -> Response {
    let store: StoreId = parse_or_return!(&store);
    errors::respond(
        StatusCode::OK,
        services.facade().suggest_transfers(ctx.principal(), &store, &[]),
    )
}

/// Same as `GET`, with demand estimates from an external forecaster.
pub async fn suggestions_with_forecast(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(store): Path<String>,
    Json(body): Json<dto::SuggestionsRequest>,
) -> Response {
    let store: StoreId = parse_or_return!(&store);
    errors::respond(
        StatusCode::OK,
        services
            .facade()
            .suggest_transfers(ctx.principal(), &store, &body.estimates),
    )
}
