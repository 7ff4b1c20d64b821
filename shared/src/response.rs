use lambda_http::{
    http::{
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    Body, Response,
};
use serde::Serialize;

use crate::error::ApiError;

/// JSON response with the CORS header every route carries
pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Result<Response<Body>, ApiError> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(body).map_err(|e| ApiError::Internal(e.to_string()))?.into())?)
}

/// `{"message": ...}` body, used by mutations that return no document
pub fn message(status: StatusCode, text: &str) -> Result<Response<Body>, ApiError> {
    json(status, &serde_json::json!({ "message": text }))
}

/// Used on the error path where there is nothing left to propagate to
pub(crate) fn json_or_fallback<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let text = serde_json::to_string(body)
        .unwrap_or_else(|_| r#"{"error":"Internal","message":"Internal Server Error"}"#.to_string());
    let mut resp = Response::new(Body::Text(text));
    *resp.status_mut() = status;
    let headers = resp.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    resp
}

pub fn cors_preflight() -> Result<Response<Body>, ApiError> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Methods",
            "GET,POST,PUT,PATCH,DELETE,OPTIONS",
        )
        .header("Access-Control-Allow-Headers", "Content-Type,Authorization")
        .body(Body::Empty)?)
}

pub fn not_found() -> Result<Response<Body>, ApiError> {
    json(StatusCode::NOT_FOUND, &serde_json::json!({"error": "Not found"}))
}
