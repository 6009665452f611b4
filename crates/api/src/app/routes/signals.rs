use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use wgrid_core::{Sku, StoreId};

use crate::app::routes::common::parse_or_return;
use crate::app::{dto, errors, AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/stores/:store/signals/sale", post(record_sale))
        .route("/stores/:store/signals/spoilage", post(record_spoilage))
}

pub async fn record_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(store): Path<String>,
    Json(body): Json<dto::SaleRequest>,
) -> Response {
    let store: StoreId = parse_or_return!(&store);
    let sku: Sku = parse_or_return!(&body.sku);
    match services
        .facade()
        .record_sale(ctx.principal(), &store, &sku, body.units, body.value)
    {
        Ok(item) => (StatusCode::OK, Json(dto::inventory_to_json(&item))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn record_spoilage(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(store): Path<String>,
    Json(body): Json<dto::SpoilageRequest>,
) -> Response {
    let store: StoreId = parse_or_return!(&store);
    let sku: Sku = parse_or_return!(&body.sku);
    match services.facade().record_spoilage(
        ctx.principal(),
        &store,
        &sku,
        body.units_spoiled,
        body.units_handled,
    ) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
