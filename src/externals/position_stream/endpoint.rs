use std::{
    fmt::Display,
    io,
    net::{SocketAddr, ToSocketAddrs},
    str::FromStr,
};

use thiserror::Error;

/// Port used when an endpoint is given as a bare host.
pub const DEFAULT_PORT: u16 = 50051;

/// `host[:port]` of the position server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Endpoint is empty.")]
    Empty,

    #[error("Invalid port in endpoint '{0}'.")]
    InvalidPort(String),

    #[error("Missing closing bracket in endpoint '{0}'.")]
    UnterminatedBracket(String),
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn resolve(&self) -> io::Result<Vec<SocketAddr>> {
        Ok((self.host.as_str(), self.port).to_socket_addrs()?.collect())
    }
}

fn parse_port(raw: &str, endpoint: &str) -> Result<u16, EndpointError> {
    raw.parse::<u16>()
        .map_err(|_| EndpointError::InvalidPort(endpoint.to_string()))
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EndpointError::Empty);
        }

        // [v6-address] or [v6-address]:port
        if let Some(rest) = s.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| EndpointError::UnterminatedBracket(s.to_string()))?;
            if host.is_empty() {
                return Err(EndpointError::Empty);
            }
            let port = match after {
                "" => DEFAULT_PORT,
                _ => match after.strip_prefix(':') {
                    Some(port) => parse_port(port, s)?,
                    None => return Err(EndpointError::InvalidPort(s.to_string())),
                },
            };
            return Ok(Self::new(host, port));
        }

        match s.rsplit_once(':') {
            None => Ok(Self::new(s, DEFAULT_PORT)),
            // More than one colon, a bare v6 address.
            Some((host, _)) if host.contains(':') => Ok(Self::new(s, DEFAULT_PORT)),
            Some(("", _)) => Err(EndpointError::Empty),
            Some((host, port)) => Ok(Self::new(host, parse_port(port, s)?)),
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
