//! HTTP response building module
//!
//! Builders for every response the server sends. Builder failures are logged
//! to stderr and replaced by a bare response; they never panic.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::cache::CachePolicy;

type Body = Full<Bytes>;

/// Build 304 Not Modified response
pub fn build_304_response(etag: &str, policy: CachePolicy) -> Response<Body> {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header("ETag", etag)
        .header("Cache-Control", policy.to_header_value())
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| fallback("304", &e, ""))
}

/// Build 400 Bad Request response
pub fn build_400_response(message: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(format!("400 Bad Request: {message}"))))
        .unwrap_or_else(|e| fallback("400", &e, "400 Bad Request"))
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Body> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from("404 Not Found")))
        .unwrap_or_else(|e| fallback("404", &e, "404 Not Found"))
}

/// Build 405 Method Not Allowed response
pub fn build_405_response(allow: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Content-Type", "text/plain")
        .header("Allow", allow)
        .body(Full::new(Bytes::from("405 Method Not Allowed")))
        .unwrap_or_else(|e| fallback("405", &e, "405 Method Not Allowed"))
}

/// Build OPTIONS response
pub fn build_options_response(allow: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", allow)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| fallback("OPTIONS", &e, ""))
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<Body> {
    Response::builder()
        .status(StatusCode::PAYLOAD_TOO_LARGE)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from("413 Payload Too Large")))
        .unwrap_or_else(|e| fallback("413", &e, "413 Payload Too Large"))
}

/// Build health check response
pub fn build_health_response(status: &'static str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain")
        .header("Cache-Control", CachePolicy::NoStore.to_header_value())
        .body(Full::new(Bytes::from(status)))
        .unwrap_or_else(|e| fallback("health", &e, status))
}

/// Build generic HTML response
pub fn build_html_response(content: String, is_head: bool) -> Response<Body> {
    let content_length = content.len();
    let body = if is_head {
        Bytes::new()
    } else {
        Bytes::from(content)
    };

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .header("Content-Length", content_length)
        .header("Cache-Control", CachePolicy::NoCache.to_header_value())
        .body(Full::new(body))
        .unwrap_or_else(|e| fallback("HTML", &e, ""))
}

/// Build JSON response; serialization failures become a 500
pub fn build_json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let json = match serde_json::to_string(body) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("[ERROR] Failed to serialize response: {e}");
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(r#"{"error":"Internal server error"}"#)))
                .unwrap_or_else(|e| fallback("500", &e, "Internal server error"));
        }
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Cache-Control", CachePolicy::NoStore.to_header_value())
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|e| fallback("JSON", &e, ""))
}

/// Build 200 response for a file body with an `ETag`
pub fn build_file_response(
    data: Bytes,
    content_type: &str,
    etag: &str,
    policy: CachePolicy,
    is_head: bool,
) -> Response<Body> {
    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .header("ETag", etag)
        .header("Cache-Control", policy.to_header_value())
        .body(Full::new(body))
        .unwrap_or_else(|e| fallback("200", &e, ""))
}

/// Log response build error and return a bare response
fn fallback(status: &str, error: &hyper::http::Error, body: &'static str) -> Response<Body> {
    eprintln!("[ERROR] Failed to build {status} response: {error}");
    Response::new(Full::new(Bytes::from(body)))
}
