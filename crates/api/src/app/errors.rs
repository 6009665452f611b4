use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::json;

use wgrid_core::{EngineError, EngineResult, ErrorKind};

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::UnknownStore | ErrorKind::UnknownSku | ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InsufficientStock | ErrorKind::InvalidTransition | ErrorKind::Conflict => {
            StatusCode::CONFLICT
        }
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
    }
}

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    let kind = err.kind();
    json_error(status_for(kind), kind.as_str(), err.to_string())
}

/// `status` + JSON body on success, the mapped error otherwise.
pub fn respond<T: Serialize>(status: StatusCode, result: EngineResult<T>) -> axum::response::Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(e) => engine_error_to_response(e),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_documented_statuses() {
        assert_eq!(status_for(ErrorKind::UnknownSku), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::InsufficientStock), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::InvalidTransition), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::ValidationError), StatusCode::BAD_REQUEST);
    }
}
