//! Outbound scrape exchange.
//!
//! # Responsibilities
//! - Build the GET request with content negotiation headers
//! - Issue it under the caller's `ScrapeContext`
//! - Classify the upstream status before any body byte is released
//! - Hand back a `ScrapeSession` that streams the (decoded, capped) body
//!
//! # Design Decisions
//! - 200, 301 and 302 are success. Whether redirects are followed is a
//!   client policy (`follow_redirects`); when they are not, the raw 3xx body
//!   is relayed.
//! - Only gzip bodies are capped unless `limit_plain_bodies` is set
//! - Error bodies are read in full unless `error_body_limit_bytes` is set
//! - The client has no timeout of its own; the context is authoritative

use std::sync::Arc;

use axum::http::header::{
    HeaderValue, ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE, USER_AGENT,
};
use axum::http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::ScrapeConfig;
use crate::scrape::body::{body_reader, SessionReader};
use crate::scrape::context::ScrapeContext;
use crate::scrape::error::{RelayError, ScrapeError, TransportError};
use crate::scrape::target::ScrapeTarget;

pub use crate::scrape::body::BodyEncoding;

/// Header advertising the caller's scrape timeout to the upstream. Advisory only.
pub const SCRAPE_TIMEOUT_HEADER: &str = "X-Prometheus-Scrape-Timeout-Seconds";

const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// Issues scrapes. Cheap to clone; the HTTP client is shared read-only.
#[derive(Debug, Clone)]
pub struct Scraper {
    client: reqwest::Client,
    config: Arc<ScrapeConfig>,
}

impl Scraper {
    /// Build a scraper and its shared HTTP client.
    pub fn new(config: ScrapeConfig) -> Result<Self, TransportError> {
        let redirects = if config.follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        };

        let mut builder = reqwest::Client::builder().redirect(redirects);
        if !config.use_env_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(TransportError::Client)?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Scrape `target` and stream the body into `sink`. Returns the number of bytes written.
    pub async fn scrape<W>(
        &self,
        ctx: &ScrapeContext,
        target: &ScrapeTarget,
        sink: &mut W,
    ) -> Result<u64, RelayError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let session = self.fetch(ctx, target).await?;
        Ok(session.copy_to(sink).await?)
    }

    /// Issue the request and classify the response.
    ///
    /// On success the returned session has already read its first body chunk;
    /// nothing has been handed to the caller yet.
    pub async fn fetch(
        &self,
        ctx: &ScrapeContext,
        target: &ScrapeTarget,
    ) -> Result<ScrapeSession, RelayError> {
        let request = self
            .client
            .get(target.as_str())
            .header(ACCEPT, self.config.accept.as_str())
            .header(ACCEPT_ENCODING, "gzip")
            .header(USER_AGENT, self.config.user_agent.as_str())
            .header(SCRAPE_TIMEOUT_HEADER, self.config.timeout_hint_secs.to_string())
            .build()
            .map_err(TransportError::Request)?;

        let response = ctx
            .run(self.client.execute(request))
            .await?
            .map_err(TransportError::Request)?;

        let status = response.status();
        if !is_accepted(status) {
            return Err(self.upstream_error(ctx, target, response).await.into());
        }

        let encoding = BodyEncoding::from_header(
            response
                .headers()
                .get(CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok()),
        );
        let content_type = response.headers().get(CONTENT_TYPE).cloned();

        let limit = match encoding {
            BodyEncoding::Gzip => Some(self.config.body_limit_bytes),
            BodyEncoding::Identity if self.config.limit_plain_bodies => {
                Some(self.config.body_limit_bytes)
            }
            BodyEncoding::Identity => None,
        };

        let body = body_reader(response.bytes_stream(), encoding, limit);
        let mut reader = SessionReader::new(body, ctx);
        reader.prime(ctx).await?;

        tracing::debug!(
            target_url = %target,
            status = %status,
            encoding = ?encoding,
            "Scrape accepted"
        );

        Ok(ScrapeSession {
            target: target.clone(),
            status,
            encoding,
            content_type,
            reader,
        })
    }

    /// Drain a rejected response into a `ScrapeError`.
    ///
    /// A read failure keeps whatever text arrived; the status is what matters.
    async fn upstream_error(
        &self,
        ctx: &ScrapeContext,
        target: &ScrapeTarget,
        mut response: reqwest::Response,
    ) -> ScrapeError {
        let status = response.status();
        let limit = self.config.error_body_limit_bytes.map(|n| n as usize);
        let mut text = Vec::new();

        loop {
            match ctx.run(response.chunk()).await {
                Ok(Ok(Some(chunk))) => {
                    text.extend_from_slice(&chunk);
                    if let Some(max) = limit {
                        if text.len() >= max {
                            text.truncate(max);
                            break;
                        }
                    }
                }
                Ok(Ok(None)) => break,
                Ok(Err(err)) => {
                    tracing::warn!(target_url = %target, error = %err, "Failed to read error body");
                    break;
                }
                Err(err) => {
                    tracing::warn!(target_url = %target, error = %err, "Error body read interrupted");
                    break;
                }
            }
        }

        ScrapeError {
            code: status,
            status: status.to_string(),
            text: String::from_utf8_lossy(&text).into_owned(),
            url: target.to_string(),
        }
    }
}

fn is_accepted(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::OK | StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND
    )
}

/// A classified, successful scrape whose body has not been relayed yet.
pub struct ScrapeSession {
    target: ScrapeTarget,
    status: StatusCode,
    encoding: BodyEncoding,
    content_type: Option<HeaderValue>,
    reader: SessionReader,
}

impl ScrapeSession {
    pub fn target(&self) -> &ScrapeTarget {
        &self.target
    }

    /// Upstream status: 200, 301 or 302.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn encoding(&self) -> BodyEncoding {
        self.encoding
    }

    /// Upstream `Content-Type`, if any.
    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.content_type.as_ref()
    }

    /// Copy the body into `sink` as it arrives. Returns the number of bytes written.
    pub async fn copy_to<W>(mut self, sink: &mut W) -> Result<u64, TransportError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut written = 0u64;

        loop {
            let n = self.reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n]).await.map_err(TransportError::Sink)?;
            written += n as u64;
        }
        sink.flush().await.map_err(TransportError::Sink)?;

        Ok(written)
    }

    /// Consume the session as a byte stream for a streaming response body.
    pub fn into_stream(self) -> tokio_util::io::ReaderStream<SessionReader> {
        tokio_util::io::ReaderStream::new(self.reader)
    }
}

impl std::fmt::Debug for ScrapeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapeSession")
            .field("target", &self.target)
            .field("status", &self.status)
            .field("encoding", &self.encoding)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}
