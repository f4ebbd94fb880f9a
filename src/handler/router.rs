//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: size limits, body collection,
//! route matching and access logging.

use crate::config::AppState;
use crate::handler::{pages, search, static_files};
use crate::http;
use crate::logger::AccessLogEntry;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{HeaderValue, SERVER};
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

const HEALTH_PATH: &str = "/healthz";

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<&'a str>,
    pub body: Bytes,
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        parts.method.to_string(),
        parts.uri.path().to_string(),
    );
    entry.http_version = format!("{:?}", parts.version)
        .trim_start_matches("HTTP/")
        .to_string();
    entry.user_agent = parts
        .headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let mut response = match read_body(&parts.method, body, &state).await {
        Ok(body) => {
            let ctx = RequestContext {
                method: &parts.method,
                path: parts.uri.path(),
                is_head: parts.method == Method::HEAD,
                if_none_match: parts
                    .headers
                    .get("if-none-match")
                    .and_then(|v| v.to_str().ok()),
                body,
            };
            dispatch(&ctx, &state).await
        }
        Err(resp) => resp,
    };

    if let Ok(server_name) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, server_name);
    }

    entry.status = response.status().as_u16();
    entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
        .unwrap_or(usize::MAX);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    state.logger.access(&entry);

    Ok(response)
}

/// Collect the request body for POST requests, bounded by `http.max_body_size`
async fn read_body<B>(
    method: &Method,
    body: B,
    state: &Arc<AppState>,
) -> Result<Bytes, Response<Full<Bytes>>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if *method != Method::POST {
        return Ok(Bytes::new());
    }

    let max_body_size = state.config.http.max_body_size;
    if body.size_hint().lower() > max_body_size {
        state.logger.warn(
            "request.body_too_large",
            &[
                ("declared", &body.size_hint().lower()),
                ("max", &max_body_size),
            ],
        );
        return Err(http::build_413_response());
    }

    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) => {
            if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
                state
                    .logger
                    .warn("request.body_too_large", &[("max", &max_body_size)]);
                Err(http::build_413_response())
            } else {
                state
                    .logger
                    .warn("request.body_unreadable", &[("reason", &e)]);
                Err(http::build_400_response("unreadable request body"))
            }
        }
    }
}

/// Route request based on method and path
pub async fn dispatch(ctx: &RequestContext<'_>, state: &Arc<AppState>) -> Response<Full<Bytes>> {
    let charts_prefix = state.charts.url_prefix();

    let allow = match ctx.path {
        "/" => "GET, HEAD, OPTIONS",
        "/search" => "POST, OPTIONS",
        HEALTH_PATH => "GET, HEAD, OPTIONS",
        p if p
            .strip_prefix(charts_prefix)
            .is_some_and(|rest| rest.starts_with('/')) =>
        {
            "GET, HEAD, OPTIONS"
        }
        _ => return http::build_404_response(),
    };

    if *ctx.method == Method::OPTIONS {
        return http::build_options_response(allow);
    }

    match (ctx.method, ctx.path) {
        (&Method::GET | &Method::HEAD, "/") => pages::serve_index(ctx, state).await,
        (&Method::POST, "/search") => search::handle_search(ctx, state).await,
        (&Method::GET | &Method::HEAD, HEALTH_PATH) => http::build_health_response("ok"),
        (&Method::GET | &Method::HEAD, path) if path != "/" && path != "/search" => {
            static_files::serve_chart(ctx, state).await
        }
        (method, path) => {
            state.logger.warn(
                "request.method_not_allowed",
                &[("method", method), ("path", &path)],
            );
            http::build_405_response(allow)
        }
    }
}

/// Plain 500 with a JSON body, used when a lookup or render fails outright
pub fn internal_error() -> Response<Full<Bytes>> {
    http::build_json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &serde_json::json!({ "success": false, "message": "Internal server error" }),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::CaseLayout;
    use crate::testing::Scratch;

    pub async fn body_text(resp: Response<Full<Bytes>>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub async fn call(
        state: &Arc<AppState>,
        method: Method,
        path: &str,
        body: &str,
    ) -> Response<Full<Bytes>> {
        let ctx = RequestContext {
            is_head: method == Method::HEAD,
            method: &method,
            path,
            if_none_match: None,
            body: Bytes::from(body.to_string()),
        };
        dispatch(&ctx, state).await
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let mut scratch = Scratch::standard(CaseLayout::Normalized);
        scratch.config.http.max_body_size = 16;
        let state = scratch.state();

        let small = Full::new(Bytes::from("zipcode=21901"));
        let body = read_body(&Method::POST, small, &state).await.unwrap();
        assert_eq!(body, Bytes::from("zipcode=21901"));

        let large = Full::new(Bytes::from("zipcode=21901&date=2022-02-14"));
        let resp = read_body(&Method::POST, large, &state).await.unwrap_err();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(scratch
            .logger
            .captured()
            .iter()
            .any(|l| l.contains("[WARN] request.body_too_large declared=29 max=16")));
    }

    #[tokio::test]
    async fn test_body_ignored_for_get() {
        let scratch = Scratch::standard(CaseLayout::Normalized);
        let state = scratch.state();

        let body = Full::new(Bytes::from("ignored"));
        assert!(read_body(&Method::GET, body, &state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let scratch = Scratch::standard(CaseLayout::Normalized);
        let resp = call(&scratch.state(), Method::GET, "/healthz", "").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let scratch = Scratch::standard(CaseLayout::Normalized);
        let resp = call(&scratch.state(), Method::GET, "/nope", "").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let scratch = Scratch::standard(CaseLayout::Normalized);
        let state = scratch.state();

        let resp = call(&state, Method::GET, "/search", "").await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()["Allow"], "POST, OPTIONS");

        let resp = call(&state, Method::DELETE, "/", "").await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(scratch
            .logger
            .captured()
            .iter()
            .any(|l| l.contains("[WARN] request.method_not_allowed method=DELETE path=/")));
    }

    #[tokio::test]
    async fn test_options() {
        let scratch = Scratch::standard(CaseLayout::Normalized);
        let resp = call(&scratch.state(), Method::OPTIONS, "/search", "").await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers()["Allow"], "POST, OPTIONS");
    }
}
