//! Scrape failure taxonomy.
//!
//! Every failure a relay can hit is one of three kinds, matched exhaustively
//! at the dispatcher boundary:
//! - `EmptyTarget`: the caller supplied no target
//! - `Scrape`: the upstream answered with a non-accepted status
//! - `Transport`: anything that went wrong on the wire, in decoding, or by cancellation

use std::io;

use axum::http::StatusCode;
use thiserror::Error;

/// Closed error type produced by the resolver and the scraper.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The inbound request carried no target URL.
    #[error("Not Found(Empty proxy argument)")]
    EmptyTarget,

    /// The upstream answered, but not with an accepted status.
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    /// The exchange itself failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RelayError {
    /// Short label used for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            RelayError::EmptyTarget => "empty_target",
            RelayError::Scrape(_) => "upstream_error",
            RelayError::Transport(TransportError::DeadlineExceeded) => "timeout",
            RelayError::Transport(TransportError::Cancelled) => "cancelled",
            RelayError::Transport(_) => "transport_error",
        }
    }
}

/// Upstream responded with a status other than 200, 301 or 302.
///
/// The `Display` output is consumed verbatim by existing dashboards, so its
/// layout must not change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Response Error: URL: {url}\n http status: {status}\n, text: {text}\n")]
pub struct ScrapeError {
    /// Upstream status code.
    pub code: StatusCode,
    /// Upstream status line, e.g. `404 Not Found`.
    pub status: String,
    /// Upstream response body, lossily decoded as UTF-8.
    pub text: String,
    /// Target URL that was scraped.
    pub url: String,
}

/// Failures of the outbound exchange that are not an upstream status.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The shared HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// Request construction or the exchange failed (bad URL, DNS, connect, TLS).
    #[error("upstream request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The upstream body stream broke while being read.
    #[error("failed to read upstream body: {0}")]
    Body(#[source] reqwest::Error),

    /// The gzip stream could not be decoded.
    #[error("failed to decode upstream body: {0}")]
    Decode(#[source] io::Error),

    /// The destination sink rejected a write.
    #[error("failed to write relayed body: {0}")]
    Sink(#[source] io::Error),

    /// The scrape context was cancelled.
    #[error("scrape cancelled")]
    Cancelled,

    /// The scrape context deadline passed.
    #[error("scrape deadline exceeded")]
    DeadlineExceeded,
}

impl TransportError {
    /// Generic description that is safe to show to callers.
    pub fn public_message(&self) -> &'static str {
        match self {
            TransportError::Client(_) | TransportError::Request(_) => "upstream request failed",
            TransportError::Body(_) => "upstream body could not be read",
            TransportError::Decode(_) => "upstream body could not be decoded",
            TransportError::Sink(_) => "relay write failed",
            TransportError::Cancelled => "scrape cancelled",
            TransportError::DeadlineExceeded => "scrape timed out",
        }
    }
}

/// Body readers smuggle a `TransportError` through `io::Error`; recover it here.
/// Untagged errors come from the gzip decoder.
impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        let kind = err.kind();
        match err.into_inner() {
            Some(inner) => match inner.downcast::<TransportError>() {
                Ok(transport) => *transport,
                Err(other) => TransportError::Decode(io::Error::new(kind, other)),
            },
            None => TransportError::Decode(io::Error::from(kind)),
        }
    }
}

impl From<TransportError> for io::Error {
    fn from(err: TransportError) -> Self {
        let kind = match err {
            TransportError::DeadlineExceeded => io::ErrorKind::TimedOut,
            TransportError::Cancelled => io::ErrorKind::Interrupted,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_error_display_layout() {
        let err = ScrapeError {
            code: StatusCode::NOT_FOUND,
            status: "404 Not Found".into(),
            text: "not found".into(),
            url: "http://10.0.0.5:9100/metrics".into(),
        };
        assert_eq!(
            err.to_string(),
            "Response Error: URL: http://10.0.0.5:9100/metrics\n http status: 404 Not Found\n, text: not found\n"
        );
    }

    #[test]
    fn transport_error_survives_io_round_trip() {
        let io_err: io::Error = TransportError::DeadlineExceeded.into();
        assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);
        assert!(matches!(TransportError::from(io_err), TransportError::DeadlineExceeded));
    }

    #[test]
    fn untagged_io_error_is_decode() {
        let io_err = io::Error::new(io::ErrorKind::InvalidData, "bad gzip header");
        match TransportError::from(io_err) {
            TransportError::Decode(inner) => assert_eq!(inner.kind(), io::ErrorKind::InvalidData),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(RelayError::EmptyTarget.outcome(), "empty_target");
        assert_eq!(RelayError::from(TransportError::Cancelled).outcome(), "cancelled");
        assert_eq!(RelayError::from(TransportError::DeadlineExceeded).outcome(), "timeout");
    }
}
