use core::str::FromStr;

use axum::response::Response;

use wgrid_core::EngineError;

use crate::app::errors;

/// Parse a path/body identifier, turning failures into a 400 response.
pub fn parse<T: FromStr<Err = EngineError>>(raw: &str) -> Result<T, Response> {
    raw.parse().map_err(errors::engine_error_to_response)
}

/// Early-return the error response of a failed parse.
macro_rules! parse_or_return {
    ($raw:expr) => {
        match $crate::app::routes::common::parse($raw) {
            Ok(v) => v,
            Err(resp) => return resp,
        }
    };
}

pub(crate) use parse_or_return;
