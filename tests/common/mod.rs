//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_compression::tokio::bufread::GzipEncoder;
use axum::http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use scrape_proxy::config::ScrapeConfig;

/// Canned upstream response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Wait before writing anything.
    pub delay: Duration,
    /// Promise one byte more than `body` and hold the socket open this long.
    pub stall: Option<Duration>,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            delay: Duration::ZERO,
            stall: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn stall(mut self, stall: Duration) -> Self {
        self.stall = Some(stall);
        self
    }
}

/// A running mock upstream.
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockUpstream {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Request heads received so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Bind a loopback listener whose port cannot be mangled by substring
/// stripping of `:80` / `:443`.
pub async fn bind_loopback() -> TcpListener {
    loop {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = format!(":{}", listener.local_addr().unwrap().port());
        if !port.starts_with(":80") && !port.starts_with(":443") {
            return listener;
        }
    }
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = bind_loopback().await;
    listener.local_addr().unwrap()
}

/// Start a programmable mock upstream. `respond` sees the raw request head.
pub async fn start_upstream<F>(respond: F) -> MockUpstream
where
    F: Fn(&str) -> MockResponse + Send + Sync + 'static,
{
    let listener = bind_loopback().await;
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let seen = requests.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let respond = respond.clone();
                    let seen = seen.clone();
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        let response = respond(&head);
                        seen.lock().unwrap().push(head);
                        write_response(&mut socket, response).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockUpstream { addr, requests }
}

/// Upstream that always answers with the same response.
pub async fn start_fixed_upstream(response: MockResponse) -> MockUpstream {
    start_upstream(move |_| response.clone()).await
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn write_response(socket: &mut TcpStream, response: MockResponse) {
    tokio::time::sleep(response.delay).await;

    let reason = StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    let declared = response.body.len() + usize::from(response.stall.is_some());

    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status, reason, declared
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");

    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(&response.body).await;
    let _ = socket.flush().await;

    if let Some(stall) = response.stall {
        tokio::time::sleep(stall).await;
    }
    let _ = socket.shutdown().await;
}

/// Gzip-compress `data`.
pub async fn gzip(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzipEncoder::new(data).read_to_end(&mut out).await.unwrap();
    out
}

/// `size` bytes of exposition-looking text.
pub fn exposition(size: usize) -> Vec<u8> {
    let line = b"node_cpu_seconds_total{cpu=\"0\",mode=\"idle\"} 12345.67\n";
    line.iter().copied().cycle().take(size).collect()
}

/// Scrape settings for tests: no environment proxies.
pub fn scrape_config() -> ScrapeConfig {
    ScrapeConfig {
        use_env_proxy: false,
        ..ScrapeConfig::default()
    }
}
