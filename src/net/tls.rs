//! TLS negotiation strategies for outbound connections.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::pool::{Route, Scheme};

/// Byte stream a connection handler can drive.
pub trait AsyncIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncIo for T {}

/// Type-erased connection stream (plain TCP or TLS).
pub type BoxedIo = Box<dyn AsyncIo>;

/// Decides, per outbound connection, whether and how to negotiate TLS.
///
/// Chosen once when the requester is assembled and consulted on every
/// connect. Implementations must leave `http` routes untouched unless they
/// have a reason not to.
#[async_trait]
pub trait TlsStrategy: Send + Sync {
    async fn upgrade(&self, route: &Route, stream: TcpStream) -> io::Result<BoxedIo>;
}

/// Trust-verifying client strategy: TLS for `https` routes, verified
/// against the bundled web PKI roots plus any extra CAs supplied.
#[derive(Clone)]
pub struct BasicClientTlsStrategy {
    connector: TlsConnector,
}

impl BasicClientTlsStrategy {
    /// Verify against the bundled Mozilla root set.
    pub fn new() -> Self {
        Self::with_root_store(webpki_root_store())
    }

    /// Trust exactly the given roots.
    pub fn with_root_store(roots: RootCertStore) -> Self {
        let mut config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];
        Self::from_client_config(Arc::new(config))
    }

    /// Use a fully custom rustls configuration.
    pub fn from_client_config(config: Arc<ClientConfig>) -> Self {
        Self {
            connector: TlsConnector::from(config),
        }
    }

    /// Trust the bundled roots plus every certificate in a PEM file.
    pub fn with_extra_ca_file(path: &Path) -> io::Result<Self> {
        if !path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("CA file not found: {:?}", path),
            ));
        }

        let mut reader = BufReader::new(File::open(path)?);
        let mut roots = webpki_root_store();
        let mut added = 0;
        for cert in rustls_pemfile::certs(&mut reader) {
            roots
                .add(cert?)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            added += 1;
        }
        if added == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("no certificates found in {:?}", path),
            ));
        }

        tracing::debug!(path = ?path, added, "Loaded extra CA certificates");
        Ok(Self::with_root_store(roots))
    }
}

impl Default for BasicClientTlsStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BasicClientTlsStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicClientTlsStrategy").finish_non_exhaustive()
    }
}

#[async_trait]
impl TlsStrategy for BasicClientTlsStrategy {
    async fn upgrade(&self, route: &Route, stream: TcpStream) -> io::Result<BoxedIo> {
        if route.scheme() != Scheme::Https {
            return Ok(Box::new(stream));
        }

        let server_name = ServerName::try_from(route.connect_host().to_string())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let tls = self.connector.connect(server_name, stream).await?;
        tracing::debug!(route = %route, "TLS session established");
        Ok(Box::new(tls))
    }
}

fn webpki_root_store() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    roots
}
