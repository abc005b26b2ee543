//! Creates protocol handlers for freshly connected sockets.

use std::sync::Arc;

use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;

use crate::config::ConnectionConfig;
use crate::error::RequesterResult;
use crate::events::{ConnectionListener, StreamListener};
use crate::net::{BoxedIo, ConnectionId, ConnectionTracker};
use crate::observability::metrics;
use crate::pool::Route;
use crate::protocol::content_length::ContentLengthStrategy;
use crate::protocol::handler::{ClientHttp1Handler, HandlerShared};
use crate::protocol::processor::HttpProcessor;
use crate::protocol::reuse::ConnectionReuseStrategy;

/// Immutable handler template shared by all connections of a requester.
#[derive(Clone)]
pub struct ClientHttp1HandlerFactory {
    shared: Arc<HandlerShared>,
    tracker: ConnectionTracker,
}

impl ClientHttp1HandlerFactory {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        processor: Arc<dyn HttpProcessor>,
        connection: ConnectionConfig,
        reuse: Arc<dyn ConnectionReuseStrategy>,
        request_length: Arc<dyn ContentLengthStrategy>,
        response_length: Arc<dyn ContentLengthStrategy>,
        connection_listener: Option<Arc<dyn ConnectionListener>>,
        stream_listener: Option<Arc<dyn StreamListener>>,
    ) -> Self {
        Self {
            shared: Arc::new(HandlerShared {
                processor,
                connection,
                reuse,
                request_length,
                response_length,
                connection_listener,
                stream_listener,
            }),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Processor applied to every exchange.
    pub fn processor(&self) -> &Arc<dyn HttpProcessor> {
        &self.shared.processor
    }

    /// Strategy deciding connection persistence.
    pub fn reuse_strategy(&self) -> &Arc<dyn ConnectionReuseStrategy> {
        &self.shared.reuse
    }

    /// Framing strategy for outgoing request bodies.
    pub fn request_length_strategy(&self) -> &Arc<dyn ContentLengthStrategy> {
        &self.shared.request_length
    }

    /// Framing strategy for incoming response bodies.
    pub fn response_length_strategy(&self) -> &Arc<dyn ContentLengthStrategy> {
        &self.shared.response_length
    }

    /// Get the connection configuration.
    pub fn connection_config(&self) -> &ConnectionConfig {
        &self.shared.connection
    }

    /// Connections whose I/O task is still running.
    pub fn open_connections(&self) -> u64 {
        self.tracker.open_count()
    }

    /// Run the HTTP/1.1 handshake over `io` and spawn its connection task.
    pub async fn create(&self, route: &Route, io: BoxedIo) -> RequesterResult<ClientHttp1Handler> {
        let id = ConnectionId::new();
        let config = &self.shared.connection;

        let mut builder = http1::Builder::new();
        builder
            .max_buf_size(config.effective_buffer_size())
            .title_case_headers(config.title_case_headers);
        let (sender, connection) = builder.handshake(TokioIo::new(io)).await?;

        let guard = self.tracker.track(id);
        let listener = self.shared.connection_listener.clone();
        let task_route = route.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(connection_id = %id, route = %task_route, error = %e, "Connection ended with error");
            }
            drop(guard);
            metrics::record_connection(&task_route, "closed");
            if let Some(listener) = listener {
                listener.on_disconnected(id, &task_route);
            }
        });

        metrics::record_connection(route, "opened");
        tracing::debug!(connection_id = %id, route = %route, "Connection established");
        if let Some(listener) = &self.shared.connection_listener {
            listener.on_connected(id, route);
        }

        Ok(ClientHttp1Handler::new(
            id,
            route.clone(),
            sender,
            Arc::clone(&self.shared),
        ))
    }
}

impl std::fmt::Debug for ClientHttp1HandlerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHttp1HandlerFactory")
            .field("connection", &self.shared.connection)
            .field("open_connections", &self.open_connections())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StreamListener;
    use crate::protocol::{
        ContentLength, DefaultConnectionReuseStrategy, DefaultContentLengthStrategy,
        InterceptorChain, ProtocolError, RequestHead, ResponseHead,
    };
    use hyper::HeaderMap;
    use crate::error::RequesterError;
    use bytes::Bytes;
    use hyper::Request;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl StreamListener for Recorder {
        fn on_request_head(&self, _id: ConnectionId, head: &RequestHead) {
            self.events.lock().unwrap().push(format!("request {} {}", head.method, head.uri));
        }

        fn on_response_head(&self, _id: ConnectionId, head: &ResponseHead) {
            self.events.lock().unwrap().push(format!("response {}", head.status.as_u16()));
        }

        fn on_exchange_complete(&self, _id: ConnectionId, keep_alive: bool) {
            self.events.lock().unwrap().push(format!("complete {keep_alive}"));
        }
    }

    fn factory(stream_listener: Option<Arc<dyn StreamListener>>) -> ClientHttp1HandlerFactory {
        ClientHttp1HandlerFactory::new(
            Arc::new(InterceptorChain::client()),
            ConnectionConfig::default(),
            Arc::new(DefaultConnectionReuseStrategy),
            Arc::new(DefaultContentLengthStrategy),
            Arc::new(DefaultContentLengthStrategy),
            None,
            stream_listener,
        )
    }

    /// Read one request head, answer with `response`, return the head.
    async fn serve_one(server: &mut DuplexStream, response: &[u8]) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = server.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending a request");
            buf.extend_from_slice(&chunk[..n]);
        }
        server.write_all(response).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn test_exchange_over_duplex() {
        let recorder = Arc::new(Recorder::default());
        let factory = factory(Some(recorder.clone()));
        let route: Route = "http://example.com:8080".parse().unwrap();
        let (client, mut server) = tokio::io::duplex(16 * 1024);

        let mut handler = factory.create(&route, Box::new(client)).await.unwrap();
        assert!(handler.is_open());
        assert_eq!(factory.open_connections(), 1);

        let server_task = tokio::spawn(async move {
            let head = serve_one(
                &mut server,
                b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nkeep-alive: timeout=7\r\n\r\nok",
            )
            .await;
            (head, server)
        });

        let request = Request::get("http://example.com:8080/ping").body(Bytes::new()).unwrap();
        let exchange = handler.execute(request, Some(Duration::from_secs(5))).await.unwrap();
        let (head, _server) = server_task.await.unwrap();

        assert!(head.starts_with("GET /ping HTTP/1.1\r\n"));
        assert!(head.contains("host: example.com:8080"));
        assert_eq!(exchange.response.status(), 200);
        assert_eq!(exchange.response.body().as_ref(), b"ok");
        assert!(exchange.keep_alive);
        assert_eq!(exchange.keep_alive_timeout, Some(Duration::from_secs(7)));
        assert_eq!(handler.exchanges(), 1);

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(events, vec!["request GET /ping", "response 200", "complete true"]);
    }

    #[tokio::test]
    async fn test_connection_close_is_not_reusable() {
        let factory = factory(None);
        let route: Route = "http://example.com".parse().unwrap();
        let (client, mut server) = tokio::io::duplex(16 * 1024);
        let mut handler = factory.create(&route, Box::new(client)).await.unwrap();

        let server_task = tokio::spawn(async move {
            serve_one(
                &mut server,
                b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            )
            .await;
        });

        let request = Request::get("/").body(Bytes::new()).unwrap();
        let exchange = handler.execute(request, None).await.unwrap();
        server_task.await.unwrap();
        assert!(!exchange.keep_alive);
        assert_eq!(exchange.keep_alive_timeout, None);
    }

    #[tokio::test]
    async fn test_request_length_mismatch_is_rejected() {
        let factory = factory(None);
        let route: Route = "http://example.com".parse().unwrap();
        let (client, _server) = tokio::io::duplex(1024);
        let mut handler = factory.create(&route, Box::new(client)).await.unwrap();

        let request = Request::post("/")
            .header("content-length", "10")
            .body(Bytes::from_static(b"abc"))
            .unwrap();
        let err = handler.execute(request, None).await.unwrap_err();
        assert!(matches!(
            err,
            RequesterError::Protocol(ProtocolError::ContentLengthMismatch {
                declared: 10,
                actual: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_response_timeout() {
        let factory = factory(None);
        let route: Route = "http://example.com".parse().unwrap();
        let (client, _server) = tokio::io::duplex(16 * 1024);
        let mut handler = factory.create(&route, Box::new(client)).await.unwrap();

        let request = Request::get("/slow").body(Bytes::new()).unwrap();
        let err = handler
            .execute(request, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, RequesterError::ResponseTimeout(_)));
    }

    #[tokio::test]
    async fn test_open_count_drops_when_peer_closes() {
        let factory = factory(None);
        let route: Route = "http://example.com".parse().unwrap();
        let (client, server) = tokio::io::duplex(1024);
        let handler = factory.create(&route, Box::new(client)).await.unwrap();
        assert_eq!(factory.open_connections(), 1);

        drop(server);
        drop(handler);
        for _ in 0..50 {
            if factory.open_connections() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(factory.open_connections(), 0);
    }

    /// Treats every response as unframed, whatever its headers say.
    struct UntilClose;

    impl ContentLengthStrategy for UntilClose {
        fn determine_length(&self, _headers: &HeaderMap) -> Result<ContentLength, ProtocolError> {
            Ok(ContentLength::Undefined)
        }
    }

    #[tokio::test]
    async fn test_response_framing_strategy_drives_reuse() {
        let factory = ClientHttp1HandlerFactory::new(
            Arc::new(InterceptorChain::client()),
            ConnectionConfig::default(),
            Arc::new(DefaultConnectionReuseStrategy),
            Arc::new(DefaultContentLengthStrategy),
            Arc::new(UntilClose),
            None,
            None,
        );
        let route: Route = "http://example.com".parse().unwrap();
        let (client, mut server) = tokio::io::duplex(16 * 1024);
        let mut handler = factory.create(&route, Box::new(client)).await.unwrap();

        let server_task = tokio::spawn(async move {
            serve_one(&mut server, b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok").await;
            server
        });

        let request = Request::get("/").body(Bytes::new()).unwrap();
        let exchange = handler.execute(request, Some(Duration::from_secs(5))).await.unwrap();
        let _server = server_task.await.unwrap();
        assert_eq!(exchange.response.body().as_ref(), b"ok");
        assert!(!exchange.keep_alive);
    }
}
