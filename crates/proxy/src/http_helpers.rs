//! HTTP request and response helpers
//!
//! Conversions between Pingora sessions and the `http` types site handlers
//! work with, plus the few canned responses the service writes itself.

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::request::Parts;
use http::{Request, Response, StatusCode};
use pingora::http::ResponseHeader;
use pingora::prelude::*;
use pingora::proxy::Session;

// ============================================================================
// Request Helpers
// ============================================================================

/// Host the client asked for.
///
/// The `Host` header wins; HTTP/2 requests may only carry the URI authority.
pub fn request_host(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| parts.uri.authority().map(|authority| authority.as_str()))
        .filter(|host| !host.is_empty())
}

/// Path and query, `/` when absent
pub fn request_path(parts: &Parts) -> &str {
    parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
}

/// Copy a request head and its buffered body into an `http::Request`
pub fn to_http_request(parts: &Parts, body: Bytes) -> Request<Bytes> {
    let mut request = Request::new(body);
    *request.method_mut() = parts.method.clone();
    *request.uri_mut() = parts.uri.clone();
    *request.version_mut() = parts.version;
    *request.headers_mut() = parts.headers.clone();
    request
}

// ============================================================================
// Response Helpers
// ============================================================================

/// Build the Pingora response header for `response`.
///
/// A `Content-Length` is added when the handler did not set one.
pub fn response_header(response: &Response<Bytes>) -> Result<ResponseHeader, Box<Error>> {
    let mut resp_header = ResponseHeader::build(response.status().as_u16(), None)?;
    for (name, value) in response.headers() {
        resp_header.append_header(name.as_str().to_string(), value.clone())?;
    }
    if !response.headers().contains_key(header::CONTENT_LENGTH) {
        resp_header.insert_header("Content-Length", response.body().len().to_string())?;
    }
    Ok(resp_header)
}

/// Write an HTTP response to a Pingora session
pub async fn write_response(
    session: &mut Session,
    response: Response<Bytes>,
    keepalive_secs: Option<u64>,
) -> Result<(), Box<Error>> {
    let resp_header = response_header(&response)?;
    let body = response.into_body();

    session.set_keepalive(keepalive_secs);
    session
        .write_response_header(Box::new(resp_header), false)
        .await?;
    session.write_response_body(Some(body), true).await?;

    Ok(())
}

/// Permanent redirect with an empty body
pub fn redirect_response(status: StatusCode, location: &str) -> Response<Bytes> {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = Response::new(Bytes::new());
            *response.status_mut() = status;
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(_) => text_response(StatusCode::BAD_REQUEST, "Bad Request\n"),
    }
}

/// Plain-text response
pub fn text_response(status: StatusCode, body: &str) -> Response<Bytes> {
    let mut response = Response::new(Bytes::copy_from_slice(body.as_bytes()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
