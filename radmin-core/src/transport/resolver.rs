//! # Transport Resolution
//!
//! Turns the user supplied connection parameters into a single [`TransportTarget`]
//! and the [`ProtocolKind`] that will wrap it.
//!
//! Resolution is a pure function of [`ConnectionConfig`]: nothing is opened here, so
//! every configuration mistake surfaces before any network I/O.
//!
//! ## Rules
//!
//! 1. A non-empty URL wins. A URL without a scheme is taken as `http://<url>`.
//!    `http`/`https` URLs select the HTTP transport, any other scheme selects a
//!    socket to the URL's host and port.
//! 2. Otherwise, `http` mode builds `http://host:port/` from the host and port.
//! 3. Otherwise a socket is used. A port embedded in the host (`10.0.0.1:7000`)
//!    takes precedence over the configured port.
use crate::protocol::{ProtocolKind, UnknownProtocol};
use ::http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{InvalidHeaderName, InvalidHeaderValue},
};
use tracing::debug;
use url::Url;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9090;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Error parsing URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("URL '{0}' does not name a host")]
    MissingHost(String),
    #[error(transparent)]
    Protocol(#[from] UnknownProtocol),
    #[error("Error with host '{host}': {reason}")]
    InvalidHost { host: String, reason: &'static str },
    #[error("Header should be of format 'Key: Value', got '{0}'")]
    MalformedHeader(String),
    #[error("Invalid header name '{name}': {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: InvalidHeaderName,
    },
    #[error("Invalid value for header '{name}': {source}")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: InvalidHeaderValue,
    },
}

/// Everything the user can say about where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Host name, optionally with an embedded port.
    pub host: String,
    pub port: u16,
    /// Protocol name as typed, validated during [`ConnectionConfig::resolve`].
    pub protocol: String,
    pub url: Option<String>,
    pub framed: bool,
    pub http: bool,
    /// Raw `Key: Value` header entries.
    pub headers: Vec<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            protocol: ProtocolKind::default().to_string(),
            url: None,
            framed: false,
            http: false,
            headers: Vec::new(),
        }
    }
}

/// Where to connect. Exactly one kind of transport is ever built.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportTarget {
    Socket {
        host: String,
        port: u16,
        framed: bool,
    },
    Http {
        url: Url,
        headers: HeaderMap,
    },
}

impl std::fmt::Display for TransportTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportTarget::Socket { host, port, framed } => {
                let addr = super::socket::join_host_port(host, *port);
                if *framed {
                    write!(f, "{addr} (framed)")
                } else {
                    f.write_str(&addr)
                }
            }
            TransportTarget::Http { url, .. } => write!(f, "{url}"),
        }
    }
}

/// A fully resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub target: TransportTarget,
    pub protocol: ProtocolKind,
}

impl ConnectionConfig {
    pub fn resolve(&self) -> Result<Endpoint, ConfigError> {
        let protocol: ProtocolKind = self.protocol.parse()?;
        let headers = parse_headers(&self.headers)?;

        let target = match self.url.as_deref().filter(|url| !url.is_empty()) {
            Some(raw) => self.target_from_url(raw, headers)?,
            None if self.http => {
                let (host, port) = split_host_port(&self.host, self.port)?;
                let raw = format!("http://{}/", super::socket::join_host_port(&host, port));
                let url = Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
                    url: raw.clone(),
                    source,
                })?;
                TransportTarget::Http { url, headers }
            }
            None => {
                let (host, port) = split_host_port(&self.host, self.port)?;
                TransportTarget::Socket {
                    host,
                    port,
                    framed: self.framed,
                }
            }
        };

        debug!(endpoint = %target, %protocol, "resolved connection");
        Ok(Endpoint { target, protocol })
    }

    fn target_from_url(
        &self,
        raw: &str,
        headers: HeaderMap,
    ) -> Result<TransportTarget, ConfigError> {
        let absolute = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{raw}")
        };
        let url = Url::parse(&absolute).map_err(|source| ConfigError::InvalidUrl {
            url: raw.to_string(),
            source,
        })?;

        match url.scheme() {
            "http" | "https" => Ok(TransportTarget::Http { url, headers }),
            _ => {
                let host = url
                    .host_str()
                    .filter(|host| !host.is_empty())
                    .ok_or_else(|| ConfigError::MissingHost(raw.to_string()))?;
                Ok(TransportTarget::Socket {
                    host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
                    port: url.port().unwrap_or(self.port),
                    framed: self.framed,
                })
            }
        }
    }
}

/// Splits `host[:port]`, falling back to `default_port` when no port is embedded.
/// IPv6 literals must be bracketed to carry a port: `[::1]:9090`.
pub fn split_host_port(host: &str, default_port: u16) -> Result<(String, u16), ConfigError> {
    let invalid = |reason| ConfigError::InvalidHost {
        host: host.to_string(),
        reason,
    };

    if let Some(rest) = host.strip_prefix('[') {
        let (addr, tail) = rest.split_once(']').ok_or(invalid("missing ']' in address"))?;
        let port = match tail {
            "" => default_port,
            tail => {
                let port = tail
                    .strip_prefix(':')
                    .ok_or(invalid("unexpected text after ']'"))?;
                port.parse().map_err(|_| invalid("invalid port"))?
            }
        };
        return Ok((addr.to_string(), port));
    }

    match host.split_once(':') {
        None => Ok((host.to_string(), default_port)),
        Some((_, port)) if port.contains(':') => Err(invalid("too many colons in address")),
        Some((name, port)) => {
            let port = port.parse().map_err(|_| invalid("invalid port"))?;
            Ok((name.to_string(), port))
        }
    }
}

/// Parses `Key: Value` entries. A repeated key replaces the earlier value.
pub fn parse_headers(entries: &[String]) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();

    for entry in entries {
        let (name, value) = entry
            .split_once(':')
            .ok_or_else(|| ConfigError::MalformedHeader(entry.clone()))?;
        let name = name.trim();
        let value = value.trim();

        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|source| {
                ConfigError::InvalidHeaderName {
                    name: name.to_string(),
                    source,
                }
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|source| ConfigError::InvalidHeaderValue {
                name: name.to_string(),
                source,
            })?;

        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::default()
    }

    #[test]
    fn test_defaults_resolve_to_local_socket() {
        let endpoint = config().resolve().unwrap();

        assert_eq!(endpoint.protocol, ProtocolKind::Binary);
        assert_eq!(
            endpoint.target,
            TransportTarget::Socket {
                host: "localhost".to_string(),
                port: 9090,
                framed: false,
            }
        );
    }

    #[test]
    fn test_host_embedded_port_wins() {
        let config = ConnectionConfig {
            host: "10.0.0.1:7000".to_string(),
            framed: true,
            ..config()
        };

        assert_eq!(
            config.resolve().unwrap().target,
            TransportTarget::Socket {
                host: "10.0.0.1".to_string(),
                port: 7000,
                framed: true,
            }
        );
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(
            split_host_port("node1", 9090).unwrap(),
            ("node1".to_string(), 9090)
        );
        assert_eq!(
            split_host_port("[::1]:34801", 9090).unwrap(),
            ("::1".to_string(), 34801)
        );
        assert_eq!(
            split_host_port("[fe80::1]", 9090).unwrap(),
            ("fe80::1".to_string(), 9090)
        );
        assert!(split_host_port("::1:80", 9090).is_err());
        assert!(split_host_port("node1:http", 9090).is_err());
        assert!(split_host_port("node1:70000", 9090).is_err());
    }

    #[test]
    fn test_unknown_protocol_fails_resolution() {
        let config = ConnectionConfig {
            protocol: "unknown".to_string(),
            ..config()
        };

        assert!(matches!(
            config.resolve(),
            Err(ConfigError::Protocol(UnknownProtocol(name))) if name == "unknown"
        ));
    }

    #[test]
    fn test_empty_protocol_is_binary() {
        let config = ConnectionConfig {
            protocol: String::new(),
            ..config()
        };

        assert_eq!(config.resolve().unwrap().protocol, ProtocolKind::Binary);
    }

    #[test]
    fn test_http_flag_builds_url_from_host_and_port() {
        let config = ConnectionConfig {
            host: "meta1:8080".to_string(),
            http: true,
            framed: true,
            headers: vec!["X-Token: abc".to_string()],
            ..config()
        };

        let TransportTarget::Http { url, headers } = config.resolve().unwrap().target else {
            panic!("expected an http target");
        };
        assert_eq!(url.as_str(), "http://meta1:8080/");
        assert_eq!(headers["x-token"], "abc");
    }

    #[test]
    fn test_url_overrides_host_and_implies_http() {
        let config = ConnectionConfig {
            host: "ignored".to_string(),
            url: Some("https://replica.example.com:8443/admin".to_string()),
            ..config()
        };

        let TransportTarget::Http { url, .. } = config.resolve().unwrap().target else {
            panic!("expected an http target");
        };
        assert_eq!(url.host_str(), Some("replica.example.com"));
        assert_eq!(url.port(), Some(8443));
    }

    #[test]
    fn test_url_without_scheme_is_http() {
        let config = ConnectionConfig {
            url: Some("10.0.0.2:34801/rpc".to_string()),
            ..config()
        };

        let TransportTarget::Http { url, .. } = config.resolve().unwrap().target else {
            panic!("expected an http target");
        };
        assert_eq!(url.as_str(), "http://10.0.0.2:34801/rpc");
    }

    #[test]
    fn test_non_http_url_selects_a_socket() {
        let config = ConnectionConfig {
            url: Some("thrift://10.0.0.3:34801".to_string()),
            framed: true,
            ..config()
        };

        assert_eq!(
            config.resolve().unwrap().target,
            TransportTarget::Socket {
                host: "10.0.0.3".to_string(),
                port: 34801,
                framed: true,
            }
        );
    }

    #[test]
    fn test_empty_url_is_ignored() {
        let config = ConnectionConfig {
            url: Some(String::new()),
            ..config()
        };

        assert!(matches!(
            config.resolve().unwrap().target,
            TransportTarget::Socket { .. }
        ));
    }

    #[test]
    fn test_invalid_url() {
        let config = ConnectionConfig {
            url: Some("http://[::1".to_string()),
            ..config()
        };

        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_headers() {
        let headers = parse_headers(&[
            "X-Cluster: onebox".to_string(),
            "Authorization:Bearer t0k3n".to_string(),
            "X-Cluster: staging".to_string(),
        ])
        .unwrap();

        assert_eq!(headers.len(), 2);
        assert_eq!(headers["x-cluster"], "staging");
        assert_eq!(headers["authorization"], "Bearer t0k3n");

        assert!(matches!(
            parse_headers(&["no separator".to_string()]),
            Err(ConfigError::MalformedHeader(_))
        ));
        assert!(matches!(
            parse_headers(&["bad name: x".to_string()]),
            Err(ConfigError::InvalidHeaderName { .. })
        ));
    }
}
