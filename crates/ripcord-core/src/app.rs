//! The application contract served by the runtime
//!
//! The server treats the application as an opaque callable: it is invoked
//! once per request and, optionally, once at startup and once at shutdown
//! (the lifespan hooks).

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::fmt;
use std::future::Future;

/// Body type alias
pub type Body = Full<Bytes>;

/// Whether an application takes part in lifespan startup/shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifespanSupport {
    /// The hook ran and completed
    Supported,
    /// The application does not implement lifespan hooks
    Unsupported,
}

/// Application invoked by the server
#[async_trait]
pub trait Application: Send + Sync + 'static {
    /// Handle a single request
    ///
    /// The request body has already been collected. An `Err` is isolated to
    /// this request and answered with the error's status code.
    async fn handle(&self, request: Request<Bytes>) -> Result<Response<Body>>;

    /// Lifespan startup hook, run before the server reports itself started
    async fn startup(&self) -> Result<LifespanSupport> {
        Ok(LifespanSupport::Unsupported)
    }

    /// Lifespan shutdown hook, run during teardown
    async fn shutdown(&self) -> Result<LifespanSupport> {
        Ok(LifespanSupport::Unsupported)
    }
}

/// Application built from an async closure, see [`app_fn`]
pub struct AppFn<F> {
    func: F,
}

impl<F> fmt::Debug for AppFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppFn").finish_non_exhaustive()
    }
}

/// Wrap an async closure as an [`Application`] without lifespan hooks
///
/// # Example
///
/// ```
/// use ripcord_core::{app_fn, responses};
///
/// let app = app_fn(|_req| async { responses::ok().text("hello") });
/// ```
pub fn app_fn<F, Fut>(func: F) -> AppFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Body>>> + Send + 'static,
{
    AppFn { func }
}

#[async_trait]
impl<F, Fut> Application for AppFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Body>>> + Send + 'static,
{
    async fn handle(&self, request: Request<Bytes>) -> Result<Response<Body>> {
        (self.func)(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responses;
    use http::StatusCode;

    #[tokio::test]
    async fn test_app_fn_handles_request() {
        let app = app_fn(|req: Request<Bytes>| async move {
            let body = String::from_utf8_lossy(req.body()).into_owned();
            responses::ok().text(format!("echo: {body}"))
        });

        let request = Request::builder()
            .uri("/echo")
            .body(Bytes::from_static(b"ping"))
            .unwrap();
        let response = app.handle(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_default_lifespan_is_unsupported() {
        let app = app_fn(|_req| async { responses::no_content() });

        assert_eq!(app.startup().await.unwrap(), LifespanSupport::Unsupported);
        assert_eq!(app.shutdown().await.unwrap(), LifespanSupport::Unsupported);
    }
}
