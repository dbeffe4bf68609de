//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image_relay::config::{LedgerConfig, RelayConfig, UpsertStrategy};
use image_relay::ledger::CallLedger;
use image_relay::{HttpServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the mock upstream does for one connection.
#[allow(dead_code)]
pub enum Behavior {
    /// 200 with the whole body and a Content-Length.
    Image(Vec<u8>),
    /// Empty response with the given status.
    Status(u16),
    /// Read the request, then close without answering.
    Drop,
    /// Read the request, then never answer.
    Hang,
    /// 200 with Content-Length, body written in `piece`-sized writes with
    /// `pause` between them.
    Trickle {
        body: Vec<u8>,
        piece: usize,
        pause: Duration,
    },
    /// 200 advertising `advertised` bytes, then `body` and a close.
    Truncated { body: Vec<u8>, advertised: usize },
}

/// Handle on a running mock upstream.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub attempts: Arc<AtomicU32>,
    pub request_lines: Arc<Mutex<Vec<String>>>,
    pub completed: Arc<AtomicBool>,
    pub aborted: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl MockUpstream {
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/img", self.addr)
    }

    pub fn last_request_line(&self) -> Option<String> {
        self.request_lines.lock().unwrap().last().cloned()
    }
}

/// Start a programmable upstream. `behave` receives the 1-based attempt number.
pub async fn start_upstream<F>(behave: F) -> MockUpstream
where
    F: Fn(u32) -> Behavior + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let upstream = MockUpstream {
        addr,
        attempts: Arc::new(AtomicU32::new(0)),
        request_lines: Arc::new(Mutex::new(Vec::new())),
        completed: Arc::new(AtomicBool::new(false)),
        aborted: Arc::new(AtomicBool::new(false)),
    };

    let behave = Arc::new(behave);
    let attempts = upstream.attempts.clone();
    let request_lines = upstream.request_lines.clone();
    let completed = upstream.completed.clone();
    let aborted = upstream.aborted.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let behave = behave.clone();
            let request_lines = request_lines.clone();
            let completed = completed.clone();
            let aborted = aborted.clone();

            tokio::spawn(async move {
                let line = read_request_line(&mut socket).await;
                request_lines.lock().unwrap().push(line);

                match (*behave)(attempt) {
                    Behavior::Image(body) => {
                        let _ = write_head(&mut socket, 200, Some(body.len())).await;
                        let _ = socket.write_all(&body).await;
                        let _ = socket.shutdown().await;
                    }
                    Behavior::Status(code) => {
                        let _ = write_head(&mut socket, code, Some(0)).await;
                        let _ = socket.shutdown().await;
                    }
                    Behavior::Truncated { body, advertised } => {
                        let _ = write_head(&mut socket, 200, Some(advertised)).await;
                        let _ = socket.write_all(&body).await;
                        let _ = socket.shutdown().await;
                    }
                    Behavior::Drop => drop(socket),
                    Behavior::Hang => {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        drop(socket);
                    }
                    Behavior::Trickle { body, piece, pause } => {
                        if write_head(&mut socket, 200, Some(body.len())).await.is_err() {
                            aborted.store(true, Ordering::SeqCst);
                            return;
                        }
                        for part in body.chunks(piece) {
                            if socket.write_all(part).await.is_err()
                                || socket.flush().await.is_err()
                            {
                                aborted.store(true, Ordering::SeqCst);
                                return;
                            }
                            tokio::time::sleep(pause).await;
                        }
                        completed.store(true, Ordering::SeqCst);
                        let _ = socket.shutdown().await;
                    }
                }
            });
        }
    });

    upstream
}

async fn read_request_line(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

async fn write_head(
    socket: &mut TcpStream,
    status: u16,
    content_length: Option<usize>,
) -> std::io::Result<()> {
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: image/jpeg\r\nConnection: close\r\n",
        status, reason
    );
    if let Some(len) = content_length {
        head.push_str(&format!("Content-Length: {}\r\n", len));
    }
    head.push_str("\r\n");
    socket.write_all(head.as_bytes()).await
}

/// Deterministic pseudo-image payload.
pub fn image_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

/// Relay config pointed at `base_url`, with test-friendly timings.
pub fn relay_config(base_url: &str) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.base_url = base_url.to_string();
    config.retries.backoff_step_ms = 10;
    config.timeouts.attempt_ms = 2_000;
    config.timeouts.connect_secs = 2;
    config
}

/// Fresh in-memory ledger with its table created.
pub async fn memory_ledger(strategy: UpsertStrategy) -> CallLedger {
    let config = LedgerConfig {
        database_url: "sqlite::memory:".into(),
        strategy,
        ..LedgerConfig::default()
    };
    let mut ledger = CallLedger::connect(&config, Duration::from_secs(5))
        .await
        .unwrap();
    ledger.ensure_table().await.unwrap();
    ledger
}

/// Start the relay on an ephemeral port.
pub async fn start_relay(config: RelayConfig, ledger: Option<CallLedger>) -> (SocketAddr, Shutdown) {
    let server = HttpServer::new(config, ledger).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Test client that never pools and ignores proxy settings.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Poll the ledger until `api_url` reaches `count` or two seconds pass.
#[allow(dead_code)]
pub async fn wait_for_count(ledger: &CallLedger, api_url: &str, count: i64) -> Option<i64> {
    let mut last = None;
    for _ in 0..40 {
        last = ledger
            .lookup(api_url)
            .await
            .unwrap()
            .map(|record| record.call_count);
        if last == Some(count) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    last
}
