//! Relay dispatcher.
//!
//! # Responsibilities
//! - Extract the raw target from the inbound request URI
//! - Resolve it and scrape it under a per-request deadline
//! - Stream successful bodies straight through to the caller
//! - Map failures onto caller-facing responses and log them
//!
//! # Design Decisions
//! - The scraper classifies the upstream status before this module commits
//!   a 200, so upstream errors always carry their own status
//! - Only upstream diagnostics are echoed verbatim; transport failures get a
//!   generic message (502, or 504 on deadline) and full detail goes to the log
//! - `legacy_transport_status` restores the old 200-with-error-text behavior

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use futures_util::TryStreamExt;

use crate::config::ErrorConfig;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::scrape::{resolve, RelayError, ScrapeContext, ScrapeSession, TransportError};

/// Leading line of every failure body.
pub const FAILURE_PREFIX: &str = "HTTP Request Failed! \n ";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Main relay handler.
pub(crate) async fn relay_handler(State(state): State<AppState>, request: Request) -> Response {
    let start = Instant::now();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let raw = raw_target(request.uri());

    let target = match resolve(&raw, state.normalization) {
        Ok(target) => target,
        Err(err) => return reject(&request_id, &raw, err, &state.errors, start),
    };

    tracing::debug!(request_id = %request_id, target_url = %target, "Relaying scrape");

    let ctx = ScrapeContext::child_of(&state.inflight, state.scrape_timeout);
    match state.scraper.fetch(&ctx, &target).await {
        Ok(session) => {
            metrics::record_scrape("success", StatusCode::OK.as_u16(), start);
            stream_session(session, request_id)
        }
        Err(err) => reject(&request_id, target.as_str(), err, &state.errors, start),
    }
}

/// Raw target carried by the request URI.
///
/// Absolute-form URIs (forward-proxy callers) are taken whole. Origin-form
/// URIs lose exactly one leading `/`, so `/http://host/metrics` yields
/// `http://host/metrics` and `/` yields an empty target.
pub fn raw_target(uri: &Uri) -> String {
    if uri.scheme().is_some() {
        return uri.to_string();
    }

    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("");
    path_and_query
        .strip_prefix('/')
        .unwrap_or(path_and_query)
        .to_string()
}

/// Build the caller-facing response for a failed relay.
pub fn error_response(err: &RelayError, config: &ErrorConfig) -> Response {
    let content_type = [(CONTENT_TYPE, TEXT_PLAIN)];

    match err {
        RelayError::EmptyTarget => {
            (StatusCode::NOT_FOUND, content_type, err.to_string()).into_response()
        }
        RelayError::Scrape(scrape) => {
            (scrape.code, content_type, format!("{FAILURE_PREFIX}{scrape}")).into_response()
        }
        RelayError::Transport(transport) if config.legacy_transport_status => {
            (StatusCode::OK, content_type, format!("{FAILURE_PREFIX}{transport}")).into_response()
        }
        RelayError::Transport(transport) => {
            let status = match transport {
                TransportError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            };
            let body = format!("{FAILURE_PREFIX}{}\n", transport.public_message());
            (status, content_type, body).into_response()
        }
    }
}

fn reject(
    request_id: &str,
    target_url: &str,
    err: RelayError,
    config: &ErrorConfig,
    start: Instant,
) -> Response {
    tracing::warn!(
        request_id = %request_id,
        target_url = %target_url,
        outcome = err.outcome(),
        error = %err,
        "Failed to scrape"
    );

    let response = error_response(&err, config);
    metrics::record_scrape(err.outcome(), response.status().as_u16(), start);
    response
}

/// Stream a classified session to the caller as a 200.
///
/// Failures past this point can only cut the body short; they are logged.
fn stream_session(session: ScrapeSession, request_id: String) -> Response {
    let target = session.target().clone();

    let mut headers = HeaderMap::new();
    if let Some(content_type) = session.content_type() {
        headers.insert(CONTENT_TYPE, content_type.clone());
    }

    let body = session.into_stream().inspect_err(move |err| {
        tracing::warn!(
            request_id = %request_id,
            target_url = %target,
            error = %err,
            "Relay interrupted mid-body"
        );
    });

    (StatusCode::OK, headers, Body::from_stream(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::ScrapeError;

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn raw_target_forms() {
        let absolute: Uri = "http://10.0.0.5:9100/metrics?x=1".parse().unwrap();
        assert_eq!(raw_target(&absolute), "http://10.0.0.5:9100/metrics?x=1");

        let embedded: Uri = "/http://10.0.0.5:9100/metrics".parse().unwrap();
        assert_eq!(raw_target(&embedded), "http://10.0.0.5:9100/metrics");

        let root: Uri = "/".parse().unwrap();
        assert_eq!(raw_target(&root), "");
    }

    #[tokio::test]
    async fn empty_target_is_not_found() {
        let response = error_response(&RelayError::EmptyTarget, &ErrorConfig::default());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "Not Found(Empty proxy argument)");
    }

    #[tokio::test]
    async fn upstream_error_keeps_status_and_text() {
        let err = RelayError::Scrape(ScrapeError {
            code: StatusCode::SERVICE_UNAVAILABLE,
            status: "503 Service Unavailable".into(),
            text: "warming up".into(),
            url: "http://node:9100/metrics".into(),
        });
        let response = error_response(&err, &ErrorConfig::default());
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[CONTENT_TYPE], TEXT_PLAIN);
        assert_eq!(
            body_text(response).await,
            "HTTP Request Failed! \n Response Error: URL: http://node:9100/metrics\n http status: 503 Service Unavailable\n, text: warming up\n"
        );
    }

    #[tokio::test]
    async fn transport_errors_are_generic() {
        let config = ErrorConfig::default();

        let timeout = error_response(&RelayError::from(TransportError::DeadlineExceeded), &config);
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_text(timeout).await, "HTTP Request Failed! \n scrape timed out\n");

        let cancelled = error_response(&RelayError::from(TransportError::Cancelled), &config);
        assert_eq!(cancelled.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn legacy_transport_status_stays_ok() {
        let config = ErrorConfig {
            legacy_transport_status: true,
        };
        let response = error_response(&RelayError::from(TransportError::DeadlineExceeded), &config);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "HTTP Request Failed! \n scrape deadline exceeded");
    }
}
