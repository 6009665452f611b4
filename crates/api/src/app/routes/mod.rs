use axum::{routing::get, Router};

pub mod anomalies;
pub mod common;
pub mod inventory;
pub mod logistics;
pub mod negotiations;
pub mod signals;
pub mod stores;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .merge(stores::router())
        .merge(inventory::router())
        .merge(anomalies::router())
        .merge(logistics::router())
        .merge(signals::router())
        .merge(negotiations::store_router())
        .nest("/negotiations", negotiations::router())
}
