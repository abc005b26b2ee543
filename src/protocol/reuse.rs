//! Connection persistence decisions.

use std::time::Duration;

use hyper::header::{HeaderMap, CONNECTION};
use hyper::{Method, StatusCode, Version};

use crate::protocol::content_length::ContentLength;
use crate::protocol::{RequestHead, ResponseHead};

/// Decides whether a connection may carry another exchange.
///
/// `framing` is the response body length as determined by the configured
/// [`ContentLengthStrategy`](crate::protocol::ContentLengthStrategy).
pub trait ConnectionReuseStrategy: Send + Sync {
    fn keep_alive(
        &self,
        request: &RequestHead,
        response: &ResponseHead,
        framing: ContentLength,
    ) -> bool;
}

/// HTTP/1.1 persistence rules:
/// - `Connection: close` on either side ends the connection
/// - a response body must be self-delimiting (chunked or a valid length)
/// - `Connection: keep-alive` keeps an HTTP/1.0 connection
/// - otherwise HTTP/1.1 persists and HTTP/1.0 does not
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnectionReuseStrategy;

impl ConnectionReuseStrategy for DefaultConnectionReuseStrategy {
    fn keep_alive(
        &self,
        request: &RequestHead,
        response: &ResponseHead,
        framing: ContentLength,
    ) -> bool {
        if has_token(&request.headers, "close") {
            return false;
        }

        if can_have_body(&request.method, response.status) && framing == ContentLength::Undefined {
            return false;
        }

        if has_token(&response.headers, "close") {
            return false;
        }
        if has_token(&response.headers, "keep-alive") {
            return true;
        }
        response.version >= Version::HTTP_11
    }
}

fn can_have_body(method: &Method, status: StatusCode) -> bool {
    if *method == Method::HEAD {
        return false;
    }
    if *method == Method::CONNECT && status.is_success() {
        return false;
    }
    status.as_u16() >= 200
        && status != StatusCode::NO_CONTENT
        && status != StatusCode::NOT_MODIFIED
}

fn has_token(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

/// Parses `Keep-Alive: timeout=N` into how long the server keeps the connection idle.
///
/// Any `u64` is accepted; callers must not assume the result fits an `Instant`.
pub fn keep_alive_timeout(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get_all("keep-alive")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("timeout"))
        .and_then(|(_, value)| value.trim().trim_matches('"').parse::<u64>().ok())
        .map(Duration::from_secs)
}
