//! Response helpers for applications and the server's own replies

use crate::app::Body;
use crate::Result;
use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::{Response, StatusCode};
use http_body_util::Full;

/// Builds a [`Response`] with a buffered body
#[derive(Debug)]
pub struct ResponseBuilder {
    inner: http::response::Builder,
}

impl ResponseBuilder {
    /// Start a response with the given status
    pub fn new(status: StatusCode) -> Self {
        Self {
            inner: Response::builder().status(status),
        }
    }

    /// Append a header; invalid values surface from the finishing call
    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.inner = self.inner.header(name, value.into());
        self
    }

    /// Ask the client to close the connection after this response
    pub fn close(self) -> Self {
        self.header(header::CONNECTION, "close")
    }

    /// Finish with an empty body
    pub fn build(self) -> Result<Response<Body>> {
        self.body(Bytes::new())
    }

    /// Finish with a raw body
    pub fn body(self, body: impl Into<Bytes>) -> Result<Response<Body>> {
        Ok(self.inner.body(Full::new(body.into()))?)
    }

    /// Finish with a UTF-8 text body
    pub fn text(mut self, body: impl Into<String>) -> Result<Response<Body>> {
        if let Some(headers) = self.inner.headers_mut() {
            headers
                .entry(header::CONTENT_TYPE)
                .or_insert(HeaderValue::from_static("text/plain; charset=utf-8"));
        }
        self.body(body.into())
    }
}

/// Shorthands for common replies
pub mod responses {
    use super::*;

    /// 200 OK
    pub fn ok() -> ResponseBuilder {
        ResponseBuilder::new(StatusCode::OK)
    }

    /// 204 No Content
    pub fn no_content() -> Result<Response<Body>> {
        ResponseBuilder::new(StatusCode::NO_CONTENT).build()
    }

    /// 500 Internal Server Error
    pub fn internal_error(message: impl Into<String>) -> Result<Response<Body>> {
        ResponseBuilder::new(StatusCode::INTERNAL_SERVER_ERROR).text(message)
    }

    /// 503 Service Unavailable, closing the connection
    ///
    /// Used when the server refuses work because it is over its concurrency
    /// limit or past its request limit.
    pub fn service_unavailable(message: impl Into<String>) -> Result<Response<Body>> {
        ResponseBuilder::new(StatusCode::SERVICE_UNAVAILABLE)
            .close()
            .text(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_sets_content_type() {
        let response = ResponseBuilder::new(StatusCode::OK)
            .header(HeaderName::from_static("x-request-id"), "42")
            .text("Hello, World!")
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-request-id").unwrap(), "42");
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_explicit_content_type_wins() {
        let response = responses::ok()
            .header(header::CONTENT_TYPE, "text/html")
            .text("<p>hi</p>")
            .unwrap();
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/html");
    }

    #[test]
    fn test_invalid_header_is_an_error() {
        let result = responses::ok()
            .header(header::LOCATION, "bad\nvalue")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_service_unavailable_closes_connection() {
        let response = responses::service_unavailable("busy").unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get(header::CONNECTION).unwrap(), "close");
    }
}
