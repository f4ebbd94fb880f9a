//! Search action
//!
//! `POST /search` with form fields `zipcode` and `date`. Every lookup failure
//! collapses into the same `success: false` payload; the cause is only logged.

use crate::cases::dates::canonical_date;
use crate::chart::ChartArtifact;
use crate::config::AppState;
use crate::handler::router::{internal_error, RequestContext};
use crate::http;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct SearchResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cases: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    graph_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

enum SearchOutcome {
    Found { cases: i64, chart: ChartArtifact },
    NotFound,
}

/// Both search fields, taken from a form-encoded body
#[derive(Debug, PartialEq, Eq)]
struct SearchForm {
    zipcode: String,
    date: String,
}

impl SearchForm {
    /// Parse the body; the first occurrence of each field wins
    fn parse(body: &[u8]) -> Result<Self, &'static str> {
        let mut zipcode = None;
        let mut date = None;
        for (key, value) in url::form_urlencoded::parse(body) {
            match key.as_ref() {
                "zipcode" if zipcode.is_none() => zipcode = Some(value.trim().to_string()),
                "date" if date.is_none() => date = Some(value.trim().to_string()),
                _ => {}
            }
        }

        match (zipcode, date) {
            (Some(zipcode), Some(date)) => Ok(Self { zipcode, date }),
            (None, _) => Err("missing form field 'zipcode'"),
            (_, None) => Err("missing form field 'date'"),
        }
    }
}

pub async fn handle_search(ctx: &RequestContext<'_>, state: &Arc<AppState>) -> Response<Full<Bytes>> {
    let form = match SearchForm::parse(&ctx.body) {
        Ok(form) => form,
        Err(message) => {
            state
                .logger
                .warn("search.bad_request", &[("reason", &message)]);
            return http::build_400_response(message);
        }
    };

    state.logger.info(
        "search.request",
        &[("zipcode", &form.zipcode), ("date", &form.date)],
    );

    let worker_state = Arc::clone(state);
    let outcome = tokio::task::spawn_blocking(move || search(&worker_state, &form)).await;

    match outcome {
        Ok(Ok(SearchOutcome::Found { cases, chart })) => http::build_json_response(
            StatusCode::OK,
            &SearchResponse {
                success: true,
                cases: Some(cases),
                graph_url: Some(chart.url),
                message: None,
            },
        ),
        Ok(Ok(SearchOutcome::NotFound)) => http::build_json_response(
            StatusCode::OK,
            &SearchResponse {
                success: false,
                cases: None,
                graph_url: None,
                message: Some(format!(
                    "No data found for the given {} zipcode and date.",
                    state.store.county().full_name()
                )),
            },
        ),
        Ok(Err(reason)) => {
            state.logger.error("search.failed", &[("reason", &reason)]);
            internal_error()
        }
        Err(e) => {
            state.logger.error("search.aborted", &[("reason", &e)]);
            internal_error()
        }
    }
}

/// Blocking part of a search: case lookup, then chart rendering
fn search(state: &AppState, form: &SearchForm) -> Result<SearchOutcome, String> {
    let Some(cases) = state
        .store
        .get_case_count(&form.zipcode, &form.date)
        .map_err(|e| format!("case store: {e}"))?
    else {
        return Ok(SearchOutcome::NotFound);
    };

    // A found count implies the date parsed
    let date = canonical_date(&form.date).unwrap_or_else(|_| form.date.clone());
    let chart = state
        .charts
        .render(&form.zipcode, &date, cases)
        .map_err(|e| e.to_string())?;
    state.logger.debug(
        "chart.rendered",
        &[("path", &chart.path.display()), ("url", &chart.url)],
    );

    Ok(SearchOutcome::Found { cases, chart })
}
