//! Relay configuration from the environment.
//!
//! Every setting has a default, so the relay starts with no environment at
//! all. Unparseable values fall back to the default rather than aborting.

use std::net::SocketAddr;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// `BACKEND_PORT`.
    pub port: u16,
    /// `BIND_ADDR`.
    pub bind_addr: String,
    /// `FRONTEND_URL`. The only CORS origin allowed when set; any origin otherwise.
    pub frontend_url: Option<String>,
    /// `CLIENT_CHANNEL_CAPACITY`. Outbound frames buffered per connection
    /// before forwards to it start failing.
    pub client_channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_addr: DEFAULT_BIND_ADDR.to_owned(),
            frontend_url: None,
            client_channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
        }
    }
}

impl RelayConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parse_or(&lookup, "BACKEND_PORT", defaults.port),
            bind_addr: lookup("BIND_ADDR").filter(|v| !v.trim().is_empty()).unwrap_or(defaults.bind_addr),
            frontend_url: lookup("FRONTEND_URL").filter(|v| !v.trim().is_empty()),
            client_channel_capacity: parse_or(&lookup, "CLIENT_CHANNEL_CAPACITY", defaults.client_channel_capacity)
                .max(1),
        }
    }

    /// Socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns the parse error if `bind_addr` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.bind_addr, self.port).parse()
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
