//! Chart file serving module
//!
//! Serves rendered charts from the chart output directory with `ETag`
//! revalidation. Paths resolving outside the directory are refused.

use crate::config::AppState;
use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime, CachePolicy};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// `GET <charts.url_prefix>/<file>`
pub async fn serve_chart(ctx: &RequestContext<'_>, state: &Arc<AppState>) -> Response<Full<Bytes>> {
    let relative = ctx
        .path
        .strip_prefix(state.charts.url_prefix())
        .unwrap_or(ctx.path)
        .trim_start_matches('/');

    let Some(file_path) = resolve(state.charts.output_dir(), relative, state).await else {
        return http::build_404_response();
    };

    let content = match fs::read(&file_path).await {
        Ok(c) => c,
        Err(e) => {
            state.logger.error(
                "chart.read_failed",
                &[("path", &file_path.display()), ("reason", &e)],
            );
            return http::build_404_response();
        }
    };

    let etag = cache::generate_etag(&content);
    if cache::check_etag_match(ctx.if_none_match, &etag) {
        return http::build_304_response(&etag, CachePolicy::NoCache);
    }

    let content_type = mime::get_content_type(file_path.extension().and_then(|e| e.to_str()));
    http::build_file_response(
        Bytes::from(content),
        content_type,
        &etag,
        CachePolicy::NoCache,
        ctx.is_head,
    )
}

/// Canonical path of `relative` inside `dir`, or `None` if it is missing,
/// hidden, not a regular file or escapes `dir`
async fn resolve(dir: &Path, relative: &str, state: &AppState) -> Option<PathBuf> {
    if relative.is_empty() || relative.starts_with('.') {
        return None;
    }

    let dir_canonical = match fs::canonicalize(dir).await {
        Ok(p) => p,
        Err(e) => {
            state.logger.warn(
                "chart.dir_unavailable",
                &[("dir", &dir.display()), ("reason", &e)],
            );
            return None;
        }
    };

    // Missing charts are ordinary 404s
    let file_canonical = fs::canonicalize(dir.join(relative)).await.ok()?;
    if !file_canonical.starts_with(&dir_canonical) {
        state.logger.warn(
            "chart.traversal_blocked",
            &[("path", &relative), ("resolved", &file_canonical.display())],
        );
        return None;
    }

    let metadata = fs::metadata(&file_canonical).await.ok()?;
    metadata.is_file().then_some(file_canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaseLayout;
    use crate::handler::router::{dispatch, tests::body_text};
    use crate::testing::Scratch;
    use hyper::{Method, StatusCode};

    fn get<'a>(
        method: &'a Method,
        path: &'a str,
        if_none_match: Option<&'a str>,
    ) -> RequestContext<'a> {
        RequestContext {
            method,
            path,
            is_head: false,
            if_none_match,
            body: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn test_serves_chart_with_etag() {
        let scratch = Scratch::standard(CaseLayout::Normalized);
        let state = scratch.state();
        let chart = state.charts.render("21901", "2022-02-14", 57).unwrap();

        let resp = dispatch(&get(&Method::GET, &chart.url, None), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["Content-Type"], "image/svg+xml");
        assert_eq!(resp.headers()["Cache-Control"], "no-cache");
        let etag = resp.headers()["ETag"].to_str().unwrap().to_string();
        assert!(body_text(resp).await.contains("<svg"));

        let resp = dispatch(&get(&Method::GET, &chart.url, Some(&etag)), &state).await;
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(body_text(resp).await, "");
    }

    #[tokio::test]
    async fn test_missing_chart_is_404() {
        let scratch = Scratch::standard(CaseLayout::Normalized);
        let state = scratch.state();
        state.charts.ensure_output_dir().unwrap();

        let method = Method::GET;
        let ctx = get(&method, "/static/graphs/21901_2022-02-01.svg", None);
        let resp = dispatch(&ctx, &state).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_parent_and_hidden_paths_are_refused() {
        let scratch = Scratch::standard(CaseLayout::Normalized);
        let state = scratch.state();
        state.charts.ensure_output_dir().unwrap();

        let method = Method::GET;
        for path in ["/static/graphs/../data.db", "/static/graphs/.hidden.svg"] {
            let ctx = get(&method, path, None);
            let resp = dispatch(&ctx, &state).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");
        }
    }

    #[tokio::test]
    async fn test_path_resolving_outside_dir_is_refused() {
        let scratch = Scratch::standard(CaseLayout::Normalized);
        let state = scratch.state();
        std::fs::create_dir_all(state.charts.output_dir().join("sub")).unwrap();
        assert!(scratch.db_path().is_file());

        let method = Method::GET;
        let ctx = get(&method, "/static/graphs/sub/../../data.db", None);
        let resp = dispatch(&ctx, &state).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(scratch
            .logger
            .captured()
            .iter()
            .any(|l| l.contains("[WARN] chart.traversal_blocked path=sub/../../data.db")));
    }
}
