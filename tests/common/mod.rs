//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sampler_gateway::config::{GateConfig, GateKind, GatewayConfig, UpstreamConfig};
use sampler_gateway::{HttpServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// What a mock upstream has seen.
#[derive(Clone, Default)]
pub struct Recorder {
    queries: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Recorder {
    /// Raw query strings received, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// Highest number of requests ever handled at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Start a programmable upstream on an ephemeral port.
///
/// `f` receives the raw query string and returns status and body.
pub async fn start_upstream<F, Fut>(f: F) -> (SocketAddr, Recorder)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, Vec<u8>)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorder = Recorder::default();
    let f = Arc::new(f);

    let rec = recorder.clone();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else { break };
            let f = f.clone();
            let rec = rec.clone();
            tokio::spawn(async move { serve_one(socket, f, rec).await });
        }
    });

    (addr, recorder)
}

async fn serve_one<F, Fut>(mut socket: TcpStream, f: Arc<F>, rec: Recorder)
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = (u16, Vec<u8>)>,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let head = String::from_utf8_lossy(&buf);
    let target = head.split_whitespace().nth(1).unwrap_or("/");
    let query = target.split_once('?').map(|(_, q)| q).unwrap_or("").to_string();

    let now = rec.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    rec.max_in_flight.fetch_max(now, Ordering::SeqCst);
    rec.queries.lock().unwrap().push(query.clone());

    let (status, body) = f(query).await;
    rec.in_flight.fetch_sub(1, Ordering::SeqCst);

    let status_text = match status {
        200 => "200 OK",
        400 => "400 Bad Request",
        500 => "500 Internal Server Error",
        _ => "200 OK",
    };
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status_text,
        body.len()
    );
    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(&body).await;
    let _ = socket.shutdown().await;
}

/// Upstream answering every request with `body` after `delay`.
pub async fn start_fixed_upstream(body: &'static [u8], delay: Duration) -> (SocketAddr, Recorder) {
    start_upstream(move |_| async move {
        tokio::time::sleep(delay).await;
        (200, body.to_vec())
    })
    .await
}

/// Default routes pointed at `upstream`, all behind one file gate at `lock`.
pub fn config_for(upstream: SocketAddr, lock: &Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.gates = vec![GateConfig {
        name: "sampler".into(),
        kind: GateKind::File,
        path: Some(lock.to_path_buf()),
    }];
    for route in &mut config.routes {
        route.upstream = UpstreamConfig {
            host: upstream.ip().to_string(),
            port: upstream.port(),
            path: "/".into(),
        };
    }
    config
}

/// A port nothing listens on.
pub fn dead_port() -> u16 {
    let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    l.local_addr().unwrap().port()
}

/// Running gateway handle.
pub struct Gateway {
    pub addr: SocketAddr,
    pub updates: mpsc::UnboundedSender<GatewayConfig>,
    shutdown: Shutdown,
}

impl Gateway {
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> Gateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    Gateway {
        addr,
        updates,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
