//! Per-connection request dispatch

use crate::state::ServerState;
use crate::trigger::{Admission, ExitTrigger};
use futures::FutureExt;
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use ripcord_core::{responses, Application, Body, ResponseBuilder, Result};
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// How a connection task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionEnd {
    /// The connection closed on its own or after a graceful drain
    Completed,
    /// The connection was dropped with work in flight
    Abandoned,
}

/// Serves HTTP/1 connections on behalf of the application
#[derive(Clone)]
pub(crate) struct ConnectionHandler {
    app: Arc<dyn Application>,
    state: Arc<ServerState>,
    active: Arc<AtomicUsize>,
    concurrency: Option<usize>,
}

impl std::fmt::Debug for ConnectionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandler")
            .field("active", &self.active)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

/// Decrements the active request gauge when dropped, including on abandonment
struct ActiveRequest(Arc<AtomicUsize>);

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ConnectionHandler {
    pub(crate) fn new(
        app: Arc<dyn Application>,
        state: Arc<ServerState>,
        concurrency: Option<usize>,
    ) -> Self {
        Self {
            app,
            state,
            active: Arc::new(AtomicUsize::new(0)),
            concurrency,
        }
    }

    /// Requests currently executing
    pub(crate) fn active_requests(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    fn enter(&self) -> Option<ActiveRequest> {
        let previous = self.active.fetch_add(1, Ordering::AcqRel);
        let guard = ActiveRequest(Arc::clone(&self.active));
        match self.concurrency {
            Some(limit) if previous >= limit => None,
            _ => Some(guard),
        }
    }

    /// Drive one connection until it closes, is drained, or is abandoned
    ///
    /// `drain` asks the connection to finish its current response and close;
    /// `abort` drops it immediately.
    pub(crate) async fn serve(
        self,
        stream: TcpStream,
        peer: SocketAddr,
        drain: CancellationToken,
        abort: CancellationToken,
    ) -> ConnectionEnd {
        let io = TokioIo::new(stream);
        let handler = self;
        let service = service_fn(move |request| {
            let handler = handler.clone();
            async move { handler.dispatch(request).await }
        });

        let connection = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(connection);

        tokio::select! {
            biased;
            _ = abort.cancelled() => return abandon(peer),
            result = connection.as_mut() => {
                log_result(peer, result);
                return ConnectionEnd::Completed;
            }
            _ = drain.cancelled() => connection.as_mut().graceful_shutdown(),
        }

        tokio::select! {
            biased;
            _ = abort.cancelled() => abandon(peer),
            result = connection.as_mut() => {
                log_result(peer, result);
                ConnectionEnd::Completed
            }
        }
    }

    async fn dispatch(&self, request: Request<Incoming>) -> Result<Response<Body>> {
        let Some(_active) = self.enter() else {
            warn!(
                limit = self.concurrency.unwrap_or_default(),
                "Exceeded concurrency limit"
            );
            return responses::service_unavailable("Service Unavailable");
        };

        match self.state.requests().admit() {
            Admission::Rejected => {
                debug!("Request limit reached, refusing request");
                return responses::service_unavailable("Service Unavailable");
            }
            Admission::Accepted {
                limit_reached: true,
            } => {
                self.state.trigger(ExitTrigger::RequestLimit);
            }
            Admission::Accepted { .. } => {}
        }

        let (parts, body) = request.into_parts();
        let body = body.collect().await?.to_bytes();
        let request = Request::from_parts(parts, body);

        let method = request.method().clone();
        let uri = request.uri().clone();
        let start = Instant::now();

        let response = match AssertUnwindSafe(self.app.handle(request))
            .catch_unwind()
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!(method = %method, uri = %uri, error = %e, "Application error");
                error_response(e.to_status_code())?
            }
            Err(_) => {
                error!(method = %method, uri = %uri, "Application panicked while handling request");
                error_response(StatusCode::INTERNAL_SERVER_ERROR)?
            }
        };

        debug!(
            method = %method,
            uri = %uri,
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis(),
            "Request completed"
        );

        Ok(response)
    }
}

fn error_response(status: StatusCode) -> Result<Response<Body>> {
    ResponseBuilder::new(status).text(status.canonical_reason().unwrap_or("Error"))
}

fn abandon(peer: SocketAddr) -> ConnectionEnd {
    warn!(peer = %peer, "Abandoning in-flight connection");
    ConnectionEnd::Abandoned
}

fn log_result(peer: SocketAddr, result: std::result::Result<(), hyper::Error>) {
    match result {
        Ok(()) => tracing::trace!(peer = %peer, "Connection closed"),
        Err(e) if e.is_incomplete_message() || e.is_canceled() => {
            debug!(peer = %peer, error = %e, "Connection closed early");
        }
        Err(e) => warn!(peer = %peer, error = %e, "HTTP connection error"),
    }
}
