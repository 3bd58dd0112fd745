//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Actions rarely build a [`Response`] by hand; the [`Context`](crate::Context)
//! helpers (`view`, `json`, `json_error`) do it for them. The constructors here
//! are what those helpers and the dispatcher's error paths share.

use bytes::Bytes;
use http::StatusCode;
use http::header::{HeaderName, HeaderValue};
use http_body_util::Full;
use serde::Serialize;
use tracing::warn;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Content types the framework emits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Html,        // text/html; charset=UTF-8
    Json,        // application/json; charset=UTF-8
    JavaScript,  // text/javascript; charset=UTF-8
    Text,        // text/plain; charset=UTF-8
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html       => "text/html; charset=UTF-8",
            Self::Json       => "application/json; charset=UTF-8",
            Self::JavaScript => "text/javascript; charset=UTF-8",
            Self::Text       => "text/plain; charset=UTF-8",
        }
    }
}

/// Headers attached to every rendered view so neither browsers nor proxies
/// keep a copy.
const NO_CACHE: [(&str, &str); 3] = [
    ("expires", "Tue, 03 Jul 1990 06:00:00 GMT"),
    ("cache-control", "no-store, no-cache, must-revalidate, max-age=0, post-check=0, pre-check=0"),
    ("pragma", "no-cache"),
];

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use actio::Response;
/// use http::StatusCode;
///
/// Response::json(r#"{"id":1}"#);
/// Response::html("<p>hi</p>");
/// Response::error(StatusCode::FORBIDDEN, "Delete is not authorized.");
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(r#"{"id":42}"#);
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) body: Bytes,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: StatusCode,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: u16,
    message: &'a str,
}

impl Response {
    /// `200 OK` — `application/json`. The body is sent verbatim.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().bytes(ContentType::Json, body)
    }

    /// `200 OK` — `text/javascript`. The body is sent verbatim.
    pub fn json_script(body: impl Into<Bytes>) -> Self {
        Self::builder().bytes(ContentType::JavaScript, body)
    }

    /// `200 OK` — `text/html` with the no-cache header set used for views.
    pub fn html(body: impl Into<String>) -> Self {
        let mut builder = Self::builder();
        for (name, value) in NO_CACHE {
            builder = builder.header(name, value);
        }
        let body: String = body.into();
        builder.bytes(ContentType::Html, body)
    }

    /// `200 OK` — `text/plain`.
    pub fn text(body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::builder().bytes(ContentType::Text, body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Bytes::new(), headers: Vec::new(), status: code }
    }

    /// JSON error payload `{"status":<code>,"message":<message>}` with the
    /// same code on the status line.
    pub fn error(code: StatusCode, message: &str) -> Self {
        let body = serde_json::to_vec(&ErrorBody { status: code.as_u16(), message })
            .unwrap_or_default();
        Self::builder().status(code).bytes(ContentType::Json, body)
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn body(&self) -> &[u8] { &self.body }

    /// First value of a header, by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Converts into the hyper response type. Headers that are not valid on
    /// the wire are dropped with a warning.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        let headers = res.headers_mut();
        for (name, value) in self.headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
                (Ok(n), Ok(v)) => { headers.append(n, v); }
                _ => warn!(header = %name, "dropping invalid response header"),
            }
        }
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.bytes(ContentType::Json, body)
    }

    /// Terminate with a typed body.
    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.as_str().to_owned())];
        headers.extend(self.headers);
        Response { body: body.into(), headers, status: self.status }
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        Response { body: Bytes::new(), headers: self.headers, status: self.status }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`], accepted by
/// [`Context::respond`](crate::Context::respond).
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}
