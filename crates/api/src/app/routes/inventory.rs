use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use wgrid_core::{Sku, StoreId};

use crate::app::routes::common::parse_or_return;
use crate::app::{dto, errors, AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/stores/:store/inventory", get(get_inventory))
        .route("/stores/:store/inventory/:sku/adjust", post(adjust_stock))
        .route("/stores/:store/inventory/:sku/restock", post(restock))
}

pub async fn get_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(store): Path<String>,
) -> Response {
    let store: StoreId = parse_or_return!(&store);
    match services.facade().inventory(ctx.principal(), &store) {
        Ok(items) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "store_id": store.to_string(),
                "items": items.iter().map(dto::inventory_to_json).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path((store, sku)): Path<(String, String)>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> Response {
    let store: StoreId = parse_or_return!(&store);
    let sku: Sku = parse_or_return!(&sku);
    match services.facade().adjust_stock(ctx.principal(), &store, &sku, body.delta) {
        Ok(item) => (StatusCode::OK, Json(dto::inventory_to_json(&item))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn restock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path((store, sku)): Path<(String, String)>,
    Json(body): Json<dto::RestockRequest>,
) -> Response {
    let store: StoreId = parse_or_return!(&store);
    let sku: Sku = parse_or_return!(&sku);
    match services.facade().restock(ctx.principal(), &store, &sku, body.quantity) {
        Ok(item) => (StatusCode::OK, Json(dto::inventory_to_json(&item))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
