use std::any::Any;

use axum::{
    Json,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::StatusCode;

use super::public::{ApiError, ErrorBody, ErrorDetails};
use super::state::SharedState;

/// Add the internal error chain to error responses when running in
/// development mode.
pub async fn expose_error_details(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !state.config.expose_error_details {
        return response;
    }

    let Some(ErrorDetails { error, details }) = response.extensions().get::<ErrorDetails>().cloned()
    else {
        return response;
    };
    let body = ErrorBody {
        error,
        details: Some(details),
    };
    (response.status(), Json(body)).into_response()
}

/// Last resort handler for panics in request handlers.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        String::from("Unknown panic message")
    };
    tracing::error!("Request handler panicked: {}", details);

    let error = String::from("Internal Server Error");
    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: error.clone(),
            details: None,
        }),
    )
        .into_response();
    response
        .extensions_mut()
        .insert(ErrorDetails { error, details });
    response
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}
