//! Endpoint parsing (`scheme://host:port[/path]`).

use std::fmt;
use std::str::FromStr;

use crate::error::TransportError;

/// A parsed connection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    raw: String,
    scheme: String,
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    /// Parse `scheme://host:port` with an optional path.
    pub fn parse(input: &str) -> Result<Self, TransportError> {
        let raw = input.trim();
        let invalid = || TransportError::InvalidEndpoint(raw.to_string());

        let (scheme, rest) = raw.split_once("://").ok_or_else(invalid)?;
        if scheme.is_empty()
            || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-')
        {
            return Err(invalid());
        }

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };

        let (host, port) = authority.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(invalid());
        }
        let port: u16 = port.parse().map_err(|_| invalid())?;

        Ok(Self {
            raw: raw.to_string(),
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path component including the leading `/`, or empty.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `host:port`, suitable for a socket connect.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
