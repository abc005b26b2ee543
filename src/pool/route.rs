//! Route: the pool's partition key.

use std::fmt;
use std::str::FromStr;

use hyper::Uri;
use thiserror::Error;
use url::Url;

/// Errors produced while deriving a route from a URI.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("URI '{0}' has no host")]
    MissingHost(String),
}

/// Transport scheme of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Get the lowercase scheme name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Port used when the URI names none.
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    /// Whether connections need TLS.
    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Https)
    }
}

impl FromStr for Scheme {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("http") {
            Ok(Scheme::Http)
        } else if s.eq_ignore_ascii_case("https") {
            Ok(Scheme::Https)
        } else {
            Err(RouteError::UnsupportedScheme(s.to_string()))
        }
    }
}

/// A logical destination. Two connections are interchangeable only if their
/// routes are equal.
///
/// Hosts are stored lower-cased; IPv6 literals keep their brackets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl Route {
    /// Create a route; the host is lowercased.
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into().to_ascii_lowercase(),
            port,
        }
    }

    /// Derive the route from an absolute request URI.
    pub fn from_uri(uri: &Uri) -> Result<Self, RouteError> {
        let scheme: Scheme = uri
            .scheme_str()
            .ok_or_else(|| RouteError::MissingHost(uri.to_string()))?
            .parse()?;
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RouteError::MissingHost(uri.to_string()))?;
        let port = uri.port_u16().unwrap_or_else(|| scheme.default_port());
        Ok(Self::new(scheme, host, port))
    }

    /// Derive a route from a parsed URL; the port defaults per scheme.
    pub fn from_url(url: &Url) -> Result<Self, RouteError> {
        let scheme: Scheme = url.scheme().parse()?;
        let host = url
            .host_str()
            .ok_or_else(|| RouteError::MissingHost(url.to_string()))?;
        let port = url.port().unwrap_or_else(|| scheme.default_port());
        Ok(Self::new(scheme, host, port))
    }

    /// Get the scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Get the host as given, IPv6 literals bracketed.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Host name usable for socket resolution and TLS SNI (no IPv6 brackets).
    pub fn connect_host(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }

    /// Value for the `Host` header: the port is omitted when it is the
    /// scheme default.
    pub fn host_header(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Route {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(|_| RouteError::InvalidUrl(s.to_string()))?;
        Self::from_url(&url)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}
