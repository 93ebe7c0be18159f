//! Shared helpers for runtime integration tests

#![allow(dead_code)]

use bytes::Bytes;
use http::{Request, StatusCode};
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use ripcord_config::ConfigBuilder;
use ripcord_runtime::{ServeOutcome, Server, ServerHandle};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Ephemeral port, no signal handlers
pub fn config() -> ConfigBuilder {
    ConfigBuilder::new()
        .listen("127.0.0.1:0".parse().unwrap())
        .install_signals(false)
        .tick_interval(Duration::from_millis(20))
}

/// Spawn `server.serve()` and wait until it accepts connections
pub async fn spawn(server: Server) -> (ServerHandle, SocketAddr, JoinHandle<ripcord_core::Result<ServeOutcome>>) {
    let handle = server.handle();
    let task = tokio::spawn(async move { server.serve().await });

    let started = tokio::time::timeout(Duration::from_secs(5), handle.wait_started())
        .await
        .expect("server did not start in time");
    assert!(started, "server stopped before starting");

    let addr = handle.local_addr().expect("started server has an address");
    (handle, addr, task)
}

/// Wait for the serve task to complete
pub async fn finish(task: JoinHandle<ripcord_core::Result<ServeOutcome>>) -> ServeOutcome {
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("server did not stop in time")
        .expect("serve task panicked")
        .expect("serve returned an error")
}

/// Issue a GET over a fresh connection
pub async fn try_get(addr: SocketAddr, path: &str) -> Result<(StatusCode, String), BoxError> {
    let stream = TcpStream::connect(addr).await?;
    let (mut sender, connection) = http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        let _ = connection.await;
    });

    let request = Request::get(path)
        .header(http::header::HOST, addr.to_string())
        .body(Empty::<Bytes>::new())?;
    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();

    Ok((status, String::from_utf8_lossy(&body).into_owned()))
}

pub async fn get(addr: SocketAddr, path: &str) -> (StatusCode, String) {
    try_get(addr, path).await.expect("request failed")
}

/// Poll until `condition` holds
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
