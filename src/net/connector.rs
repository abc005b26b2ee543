//! Outbound TCP connect with timeout.

use std::time::Duration;

use tokio::net::TcpStream;

use crate::config::IoReactorConfig;
use crate::error::{RequesterError, RequesterResult};
use crate::pool::Route;

/// Open a TCP connection to `route` using the reactor's socket options.
pub async fn connect_tcp(route: &Route, config: &IoReactorConfig) -> RequesterResult<TcpStream> {
    let timeout = Duration::from_millis(config.connect_timeout_ms);
    let connect = TcpStream::connect((route.connect_host(), route.port()));

    let stream = match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(RequesterError::Connect {
                route: route.clone(),
                source,
            })
        }
        Err(_) => {
            return Err(RequesterError::ConnectTimeout {
                route: route.clone(),
                timeout,
            })
        }
    };

    if config.tcp_nodelay {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(route = %route, error = %e, "Failed to set TCP_NODELAY");
        }
    }

    tracing::debug!(
        route = %route,
        local_addr = ?stream.local_addr().ok(),
        peer_addr = ?stream.peer_addr().ok(),
        "TCP connection established"
    );
    Ok(stream)
}
