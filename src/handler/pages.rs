//! Search page
//!
//! Renders the zip code and date pickers plus the script that posts the form
//! to `/search` and shows the result table and chart.

use crate::config::AppState;
use crate::handler::router::{internal_error, RequestContext};
use crate::http;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::fmt::Write;
use std::sync::Arc;

const SEARCH_SCRIPT: &str = r#"
document.getElementById('search-form').addEventListener('submit', async (event) => {
  event.preventDefault();
  const form = event.target;
  const response = await fetch('/search', {
    method: 'POST',
    headers: { 'Content-Type': 'application/x-www-form-urlencoded' },
    body: new URLSearchParams(new FormData(form)),
  });
  const result = await response.json();
  const output = document.getElementById('result');
  if (!result.success) {
    output.hidden = true;
    alert(result.message || 'Search failed.');
    return;
  }
  document.getElementById('result-zipcode').textContent = form.zipcode.value;
  document.getElementById('result-date').textContent = form.date.value;
  document.getElementById('result-cases').textContent = result.cases;
  document.getElementById('result-count').textContent =
    `Number of COVID-19 cases: ${result.cases}`;
  document.getElementById('result-graph').src = `${result.graph_url}?t=${Date.now()}`;
  output.hidden = false;
});
"#;

/// `GET /`: zip codes of the configured county and the offered dates
pub async fn serve_index(ctx: &RequestContext<'_>, state: &Arc<AppState>) -> Response<Full<Bytes>> {
    let worker_state = Arc::clone(state);
    let zipcodes =
        match tokio::task::spawn_blocking(move || worker_state.store.list_county_zipcodes()).await
        {
            Ok(Ok(zipcodes)) => zipcodes,
            Ok(Err(e)) => {
                state.logger.error("zip_lookup.failed", &[("reason", &e)]);
                return internal_error();
            }
            Err(e) => {
                state.logger.error("zip_lookup.aborted", &[("reason", &e)]);
                return internal_error();
            }
        };

    let county = state.store.county().full_name();
    http::build_html_response(render_index(&county, &zipcodes, &state.dates), ctx.is_head)
}

fn render_index(county: &str, zipcodes: &[String], dates: &[String]) -> String {
    let county = escape_html(county);
    let mut html = String::with_capacity(4096);

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{county} COVID-19 Cases</title>\n</head>\n<body>\n\
         <h1>{county} COVID-19 Cases by Zip Code</h1>\n\
         <form id=\"search-form\">\n<label for=\"zipcode\">Zip code</label>\n\
         <select id=\"zipcode\" name=\"zipcode\" required>\n"
    );
    for zipcode in zipcodes {
        let zipcode = escape_html(zipcode);
        let _ = writeln!(html, "<option value=\"{zipcode}\">{zipcode}</option>");
    }
    html.push_str("</select>\n<label for=\"date\">Date</label>\n<select id=\"date\" name=\"date\" required>\n");
    for date in dates {
        let date = escape_html(date);
        let _ = writeln!(html, "<option value=\"{date}\">{date}</option>");
    }
    html.push_str(
        "</select>\n<button type=\"submit\">Search</button>\n</form>\n\
         <section id=\"result\" hidden>\n<p id=\"result-count\"></p>\n\
         <table>\n<thead><tr><th>Zip code</th><th>Date</th><th>Cases</th></tr></thead>\n\
         <tbody><tr><td id=\"result-zipcode\"></td><td id=\"result-date\"></td>\
         <td id=\"result-cases\"></td></tr></tbody>\n</table>\n\
         <img id=\"result-graph\" alt=\"Case chart\">\n</section>\n<script>",
    );
    html.push_str(SEARCH_SCRIPT);
    html.push_str("</script>\n</body>\n</html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
