//! Upstream body readers.
//!
//! # Responsibilities
//! - Adapt the upstream byte stream into an `AsyncRead`
//! - Decode gzip bodies
//! - Cap the number of bytes handed out (truncation, never an error)
//! - Fail reads once the scrape context is cancelled or past its deadline

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_compression::tokio::bufread::GzipDecoder;
use axum::body::Bytes;
use futures_util::{Stream, TryStreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader, ReadBuf};
use tokio::time::Sleep;
use tokio_util::io::StreamReader;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::scrape::context::ScrapeContext;
use crate::scrape::error::TransportError;

/// Type-erased body reader.
pub type BodyReader = Pin<Box<dyn AsyncRead + Send>>;

/// Content coding of a successful upstream body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    /// Anything that is not exactly `gzip`; relayed as-is.
    Identity,
    Gzip,
}

impl BodyEncoding {
    /// Classify a `Content-Encoding` header value.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some("gzip") => BodyEncoding::Gzip,
            _ => BodyEncoding::Identity,
        }
    }
}

/// Build the reader for a successful body: decode, then cap at `limit` bytes.
pub fn body_reader<S>(stream: S, encoding: BodyEncoding, limit: Option<u64>) -> BodyReader
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let raw = StreamReader::new(stream.map_err(|err| io::Error::from(TransportError::Body(err))));

    let decoded: BodyReader = match encoding {
        BodyEncoding::Gzip => {
            let mut decoder = GzipDecoder::new(raw);
            decoder.multiple_members(true);
            Box::pin(decoder)
        }
        BodyEncoding::Identity => Box::pin(raw),
    };

    match limit {
        Some(max) => Box::pin(decoded.take(max)),
        None => decoded,
    }
}

/// Body reader bound to a scrape context.
///
/// Every read first checks cancellation and the deadline, so a stalled
/// upstream cannot hold a relay open past the context.
pub struct SessionReader {
    inner: BufReader<BodyReader>,
    token: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    deadline: Pin<Box<Sleep>>,
}

impl SessionReader {
    pub fn new(inner: BodyReader, ctx: &ScrapeContext) -> Self {
        let token = ctx.token().clone();
        Self {
            inner: BufReader::new(inner),
            cancelled: Box::pin(token.clone().cancelled_owned()),
            token,
            deadline: Box::pin(tokio::time::sleep_until(ctx.deadline())),
        }
    }

    /// Pull the first chunk into the buffer.
    ///
    /// For gzip bodies this parses the header, so a broken stream is reported
    /// before the caller commits a success status.
    pub async fn prime(&mut self, ctx: &ScrapeContext) -> Result<(), TransportError> {
        ctx.run(self.inner.fill_buf())
            .await?
            .map(|_| ())
            .map_err(TransportError::from)
    }
}

impl AsyncRead for SessionReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.token.is_cancelled() || this.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Err(TransportError::Cancelled.into()));
        }
        if this.deadline.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Err(TransportError::DeadlineExceeded.into()));
        }

        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::bufread::GzipEncoder;
    use std::time::Duration;

    fn chunks(parts: Vec<&'static [u8]>) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send {
        futures_util::stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p))))
    }

    async fn gzip(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzipEncoder::new(data).read_to_end(&mut out).await.unwrap();
        out
    }

    #[test]
    fn encoding_requires_exact_gzip() {
        assert_eq!(BodyEncoding::from_header(Some("gzip")), BodyEncoding::Gzip);
        assert_eq!(BodyEncoding::from_header(Some("br")), BodyEncoding::Identity);
        assert_eq!(BodyEncoding::from_header(Some("gzip, br")), BodyEncoding::Identity);
        assert_eq!(BodyEncoding::from_header(None), BodyEncoding::Identity);
    }

    #[tokio::test]
    async fn identity_body_is_capped_when_limited() {
        let mut reader = body_reader(chunks(vec![b"abc", b"def"]), BodyEncoding::Identity, Some(4));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"abcd");
    }

    #[tokio::test]
    async fn gzip_body_is_decoded() {
        let packed: &'static [u8] = Box::leak(gzip(b"up 1\n").await.into_boxed_slice());
        let (head, tail) = packed.split_at(5);
        let mut reader = body_reader(chunks(vec![head, tail]), BodyEncoding::Gzip, Some(1024));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"up 1\n");
    }

    #[tokio::test]
    async fn deadline_fails_pending_read() {
        let ctx = ScrapeContext::with_timeout(Duration::from_millis(50));
        let stream = futures_util::stream::pending::<Result<Bytes, reqwest::Error>>();
        let mut reader = SessionReader::new(body_reader(stream, BodyEncoding::Identity, None), &ctx);

        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).await.unwrap_err();
        assert!(matches!(TransportError::from(err), TransportError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn prime_reports_bad_gzip() {
        let ctx = ScrapeContext::with_timeout(Duration::from_secs(5));
        let body = body_reader(chunks(vec![b"definitely not gzip"]), BodyEncoding::Gzip, None);
        let mut reader = SessionReader::new(body, &ctx);
        assert!(matches!(reader.prime(&ctx).await, Err(TransportError::Decode(_))));
    }
}
