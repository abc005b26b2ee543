//! Per-connection HTTP/1.1 exchange handler.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::SendRequest;
use hyper::{Method, Request, Response, Uri};

use crate::config::ConnectionConfig;
use crate::error::{RequesterError, RequesterResult};
use crate::events::{ConnectionListener, StreamListener};
use crate::net::ConnectionId;
use crate::pool::Route;
use crate::protocol::content_length::{ContentLength, ContentLengthStrategy};
use crate::protocol::processor::{ExchangeContext, HttpProcessor};
use crate::protocol::reuse::{keep_alive_timeout, ConnectionReuseStrategy};
use crate::protocol::{ProtocolError, RequestHead, ResponseHead};

/// Strategy objects shared by every handler a factory creates.
pub(crate) struct HandlerShared {
    pub(crate) processor: Arc<dyn HttpProcessor>,
    pub(crate) connection: ConnectionConfig,
    pub(crate) reuse: Arc<dyn ConnectionReuseStrategy>,
    pub(crate) request_length: Arc<dyn ContentLengthStrategy>,
    pub(crate) response_length: Arc<dyn ContentLengthStrategy>,
    pub(crate) connection_listener: Option<Arc<dyn ConnectionListener>>,
    pub(crate) stream_listener: Option<Arc<dyn StreamListener>>,
}

/// Result of one request/response exchange.
#[derive(Debug)]
pub struct Exchange {
    pub response: Response<Bytes>,
    /// Whether the connection may carry another exchange.
    pub keep_alive: bool,
    /// Idle limit advertised by the server, if any.
    pub keep_alive_timeout: Option<Duration>,
}

/// Drives exchanges over one HTTP/1.1 connection.
pub struct ClientHttp1Handler {
    id: ConnectionId,
    route: Route,
    sender: SendRequest<Full<Bytes>>,
    shared: Arc<HandlerShared>,
    exchanges: u64,
}

impl ClientHttp1Handler {
    pub(crate) fn new(
        id: ConnectionId,
        route: Route,
        sender: SendRequest<Full<Bytes>>,
        shared: Arc<HandlerShared>,
    ) -> Self {
        Self {
            id,
            route,
            sender,
            shared,
            exchanges: 0,
        }
    }

    /// Get the connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Route the connection was opened for.
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Number of completed exchanges on this connection.
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// False once the peer closed or the connection task ended.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Send `request` and buffer the full response.
    ///
    /// `response_timeout` bounds the whole exchange, head and body.
    pub async fn execute(
        &mut self,
        mut request: Request<Bytes>,
        response_timeout: Option<Duration>,
    ) -> RequesterResult<Exchange> {
        let context = ExchangeContext {
            route: &self.route,
            connection_id: self.id,
        };

        to_origin_form(&mut request)?;
        self.shared.processor.process_request(&mut request, &context)?;
        if let ContentLength::Length(declared) =
            self.shared.request_length.determine_length(request.headers())?
        {
            let actual = request.body().len() as u64;
            if declared != actual {
                return Err(ProtocolError::ContentLengthMismatch { declared, actual }.into());
            }
        }

        let request_head = RequestHead::from(&request);
        if let Some(listener) = &self.shared.stream_listener {
            listener.on_request_head(self.id, &request_head);
        }
        tracing::trace!(
            connection_id = %self.id,
            method = %request_head.method,
            uri = %request_head.uri,
            "Sending request"
        );

        let (parts, body) = request.into_parts();
        let request = Request::from_parts(parts, Full::new(body));

        let id = self.id;
        let sender = &mut self.sender;
        let stream_listener = self.shared.stream_listener.clone();
        let exchange = async move {
            sender.ready().await?;
            let response = sender.send_request(request).await?;
            let (parts, body) = response.into_parts();
            let head = ResponseHead {
                status: parts.status,
                version: parts.version,
                headers: parts.headers.clone(),
            };
            if let Some(listener) = &stream_listener {
                listener.on_response_head(id, &head);
            }
            let body = body.collect().await?.to_bytes();
            Ok::<_, RequesterError>((parts, head, body))
        };

        let (parts, response_head, body) = match response_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| RequesterError::ResponseTimeout(limit))??,
            None => exchange.await?,
        };

        let framing = self
            .shared
            .response_length
            .determine_length(&response_head.headers)?;
        let keep_alive = self
            .shared
            .reuse
            .keep_alive(&request_head, &response_head, framing)
            && self.is_open();
        let keep_alive_timeout = if keep_alive {
            keep_alive_timeout(&response_head.headers)
        } else {
            None
        };

        let mut response = Response::from_parts(parts, body);
        self.shared.processor.process_response(&mut response, &context)?;

        self.exchanges += 1;
        if let Some(listener) = &self.shared.stream_listener {
            listener.on_exchange_complete(self.id, keep_alive);
        }
        tracing::trace!(
            connection_id = %self.id,
            status = response.status().as_u16(),
            keep_alive,
            "Exchange complete"
        );

        Ok(Exchange {
            response,
            keep_alive,
            keep_alive_timeout,
        })
    }
}

impl std::fmt::Debug for ClientHttp1Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHttp1Handler")
            .field("id", &self.id)
            .field("route", &self.route)
            .field("exchanges", &self.exchanges)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Strip scheme and authority; HTTP/1.1 requests to an origin carry only the path.
fn to_origin_form<B>(request: &mut Request<B>) -> Result<(), ProtocolError> {
    if *request.method() == Method::CONNECT || request.uri().authority().is_none() {
        return Ok(());
    }
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| !pq.is_empty())
        .unwrap_or("/");
    let uri = target
        .parse::<Uri>()
        .map_err(|_| ProtocolError::InvalidTarget(target.to_string()))?;
    *request.uri_mut() = uri;
    Ok(())
}
