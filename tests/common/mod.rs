//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_requester::config::ObservabilityConfig;
use async_requester::observability::logging;
use hyper::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the mock backend answers with.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    /// Extra raw header lines, each ending in `\r\n`.
    pub headers: String,
    /// Send `Connection: close` and close after responding.
    pub close: bool,
    pub delay: Duration,
}

impl MockResponse {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            headers: String::new(),
            close: false,
            delay: Duration::ZERO,
        }
    }

    pub fn closing(mut self) -> Self {
        self.close = true;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn header(mut self, line: &str) -> Self {
        self.headers.push_str(line);
        self.headers.push_str("\r\n");
        self
    }
}

/// Running loopback HTTP/1.1 backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Accepted TCP connections so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

pub fn init_logging() {
    logging::init(&ObservabilityConfig::default());
}

/// Start a keep-alive backend; `respond` sees the request line.
pub async fn start_backend<F>(respond: F) -> MockBackend
where
    F: Fn(&str) -> MockResponse + Send + Sync + 'static,
{
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(AtomicUsize::new(0));
    let respond = Arc::new(respond);

    let accepted = connections.clone();
    let served = requests.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            let respond = respond.clone();
            let served = served.clone();
            tokio::spawn(async move {
                let _ = serve_connection(socket, respond, served).await;
            });
        }
    });

    MockBackend {
        addr,
        connections,
        requests,
    }
}

/// Backend answering every request with the same response.
pub async fn start_fixed_backend(response: MockResponse) -> MockBackend {
    start_backend(move |_| response.clone()).await
}

/// Address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn serve_connection<F>(
    mut socket: TcpStream,
    respond: Arc<F>,
    served: Arc<AtomicUsize>,
) -> std::io::Result<()>
where
    F: Fn(&str) -> MockResponse + Send + Sync + 'static,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let head_end = loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&chunk[..n]);
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let body_len = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < head_end + body_len {
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        buf.drain(..head_end + body_len);

        let request_line = head.lines().next().unwrap_or_default().to_string();
        served.fetch_add(1, Ordering::SeqCst);
        let response = respond(&request_line);
        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }

        let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
        let wire = format!(
            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\n{}{}\r\n{}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("OK"),
            response.body.len(),
            if response.close { "Connection: close\r\n" } else { "" },
            response.headers,
            response.body
        );
        socket.write_all(wire.as_bytes()).await?;
        if response.close {
            socket.shutdown().await?;
            return Ok(());
        }
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
