//! Request and response interceptor chains.

use std::sync::Arc;

use bytes::Bytes;
use hyper::header::{
    HeaderValue, CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING, USER_AGENT,
};
use hyper::{Method, Request, Response};

use crate::net::ConnectionId;
use crate::pool::Route;
use crate::protocol::ProtocolError;

/// Per-exchange facts available to interceptors.
#[derive(Debug, Clone, Copy)]
pub struct ExchangeContext<'a> {
    pub route: &'a Route,
    pub connection_id: ConnectionId,
}

/// Processes outgoing requests and incoming responses.
pub trait HttpProcessor: Send + Sync {
    fn process_request(
        &self,
        request: &mut Request<Bytes>,
        context: &ExchangeContext<'_>,
    ) -> Result<(), ProtocolError>;

    fn process_response(
        &self,
        _response: &mut Response<Bytes>,
        _context: &ExchangeContext<'_>,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }
}

pub trait RequestInterceptor: Send + Sync {
    fn process(
        &self,
        request: &mut Request<Bytes>,
        context: &ExchangeContext<'_>,
    ) -> Result<(), ProtocolError>;
}

pub trait ResponseInterceptor: Send + Sync {
    fn process(
        &self,
        response: &mut Response<Bytes>,
        context: &ExchangeContext<'_>,
    ) -> Result<(), ProtocolError>;
}

/// Ordered interceptors applied in insertion order.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    request: Vec<Arc<dyn RequestInterceptor>>,
    response: Vec<Arc<dyn ResponseInterceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard client chain: body framing, `Host`, `Connection`, `User-Agent`.
    pub fn client() -> Self {
        Self::new()
            .with_request(RequestContent)
            .with_request(RequestTargetHost)
            .with_request(RequestConnControl)
            .with_request(RequestUserAgent::default())
    }

    pub fn with_request(mut self, interceptor: impl RequestInterceptor + 'static) -> Self {
        self.request.push(Arc::new(interceptor));
        self
    }

    pub fn with_response(mut self, interceptor: impl ResponseInterceptor + 'static) -> Self {
        self.response.push(Arc::new(interceptor));
        self
    }

    /// Get the number of request interceptors.
    pub fn request_interceptors(&self) -> usize {
        self.request.len()
    }

    /// Get the number of response interceptors.
    pub fn response_interceptors(&self) -> usize {
        self.response.len()
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("request", &self.request.len())
            .field("response", &self.response.len())
            .finish()
    }
}

impl HttpProcessor for InterceptorChain {
    fn process_request(
        &self,
        request: &mut Request<Bytes>,
        context: &ExchangeContext<'_>,
    ) -> Result<(), ProtocolError> {
        for interceptor in &self.request {
            interceptor.process(request, context)?;
        }
        Ok(())
    }

    fn process_response(
        &self,
        response: &mut Response<Bytes>,
        context: &ExchangeContext<'_>,
    ) -> Result<(), ProtocolError> {
        for interceptor in &self.response {
            interceptor.process(response, context)?;
        }
        Ok(())
    }
}

/// Adds `Content-Length` when the request declares no framing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContent;

impl RequestInterceptor for RequestContent {
    fn process(
        &self,
        request: &mut Request<Bytes>,
        _context: &ExchangeContext<'_>,
    ) -> Result<(), ProtocolError> {
        let headers = request.headers();
        if headers.contains_key(TRANSFER_ENCODING) || headers.contains_key(CONTENT_LENGTH) {
            return Ok(());
        }
        let len = request.body().len();
        let needs_length = len > 0
            || matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH);
        if needs_length {
            request
                .headers_mut()
                .insert(CONTENT_LENGTH, HeaderValue::from(len as u64));
        }
        Ok(())
    }
}

/// Adds `Host` from the route when absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestTargetHost;

impl RequestInterceptor for RequestTargetHost {
    fn process(
        &self,
        request: &mut Request<Bytes>,
        context: &ExchangeContext<'_>,
    ) -> Result<(), ProtocolError> {
        if request.headers().contains_key(HOST) {
            return Ok(());
        }
        let value = HeaderValue::from_str(&context.route.host_header())
            .map_err(|_| ProtocolError::InvalidHeader("host"))?;
        request.headers_mut().insert(HOST, value);
        Ok(())
    }
}

/// Asks for a persistent connection unless the caller already chose.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestConnControl;

impl RequestInterceptor for RequestConnControl {
    fn process(
        &self,
        request: &mut Request<Bytes>,
        _context: &ExchangeContext<'_>,
    ) -> Result<(), ProtocolError> {
        if *request.method() == Method::CONNECT || request.headers().contains_key(CONNECTION) {
            return Ok(());
        }
        request
            .headers_mut()
            .insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RequestUserAgent {
    agent: HeaderValue,
}

impl RequestUserAgent {
    pub fn new(agent: HeaderValue) -> Self {
        Self { agent }
    }
}

impl Default for RequestUserAgent {
    fn default() -> Self {
        Self::new(HeaderValue::from_static(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        )))
    }
}

impl RequestInterceptor for RequestUserAgent {
    fn process(
        &self,
        request: &mut Request<Bytes>,
        _context: &ExchangeContext<'_>,
    ) -> Result<(), ProtocolError> {
        if !request.headers().contains_key(USER_AGENT) {
            request.headers_mut().insert(USER_AGENT, self.agent.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(route: &Route) -> ExchangeContext<'_> {
        ExchangeContext {
            route,
            connection_id: ConnectionId::new(),
        }
    }

    #[test]
    fn test_client_chain_fills_defaults() {
        let route: Route = "http://Example.com:8080".parse().unwrap();
        let mut request = Request::post("/submit").body(Bytes::from_static(b"hello")).unwrap();

        InterceptorChain::client()
            .process_request(&mut request, &context(&route))
            .unwrap();

        let headers = request.headers();
        assert_eq!(headers[CONTENT_LENGTH], "5");
        assert_eq!(headers[HOST], "example.com:8080");
        assert_eq!(headers[CONNECTION], "keep-alive");
        assert!(headers[USER_AGENT].to_str().unwrap().starts_with("async-requester/"));
    }

    #[test]
    fn test_caller_headers_are_kept() {
        let route: Route = "https://example.com".parse().unwrap();
        let mut request = Request::get("/")
            .header(HOST, "other.test")
            .header(CONNECTION, "close")
            .header(USER_AGENT, "custom")
            .body(Bytes::new())
            .unwrap();

        InterceptorChain::client()
            .process_request(&mut request, &context(&route))
            .unwrap();

        let headers = request.headers();
        assert_eq!(headers[HOST], "other.test");
        assert_eq!(headers[CONNECTION], "close");
        assert_eq!(headers[USER_AGENT], "custom");
        assert!(!headers.contains_key(CONTENT_LENGTH));
    }

    #[test]
    fn test_empty_post_gets_zero_length() {
        let route: Route = "http://example.com".parse().unwrap();
        let mut request = Request::post("/").body(Bytes::new()).unwrap();
        RequestContent.process(&mut request, &context(&route)).unwrap();
        assert_eq!(request.headers()[CONTENT_LENGTH], "0");
    }

    #[test]
    fn test_host_header_omits_default_port() {
        let route: Route = "https://example.com:443".parse().unwrap();
        let mut request = Request::get("/").body(Bytes::new()).unwrap();
        RequestTargetHost.process(&mut request, &context(&route)).unwrap();
        assert_eq!(request.headers()[HOST], "example.com");
    }

    #[test]
    fn test_chain_counts() {
        let chain = InterceptorChain::client();
        assert_eq!(chain.request_interceptors(), 4);
        assert_eq!(chain.response_interceptors(), 0);
    }
}
