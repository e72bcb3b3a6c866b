use std::collections::HashMap;

use super::*;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_apply_with_empty_environment() {
    let config = RelayConfig::from_lookup(lookup(&[]));
    assert_eq!(config, RelayConfig::default());
    assert_eq!(config.port, 3001);
    assert_eq!(config.client_channel_capacity, 256);
    assert!(config.frontend_url.is_none());
}

#[test]
fn values_are_read_from_environment() {
    let config = RelayConfig::from_lookup(lookup(&[
        ("BACKEND_PORT", "4100"),
        ("BIND_ADDR", "127.0.0.1"),
        ("FRONTEND_URL", "http://localhost:3000"),
        ("CLIENT_CHANNEL_CAPACITY", "16"),
    ]));
    assert_eq!(config.port, 4100);
    assert_eq!(config.bind_addr, "127.0.0.1");
    assert_eq!(config.frontend_url.as_deref(), Some("http://localhost:3000"));
    assert_eq!(config.client_channel_capacity, 16);
    assert_eq!(config.socket_addr().expect("addr").to_string(), "127.0.0.1:4100");
}

#[test]
fn unparseable_values_fall_back_to_defaults() {
    let config = RelayConfig::from_lookup(lookup(&[("BACKEND_PORT", "http"), ("CLIENT_CHANNEL_CAPACITY", "-1")]));
    assert_eq!(config.port, 3001);
    assert_eq!(config.client_channel_capacity, 256);
}

#[test]
fn zero_capacity_is_raised_to_one() {
    let config = RelayConfig::from_lookup(lookup(&[("CLIENT_CHANNEL_CAPACITY", "0")]));
    assert_eq!(config.client_channel_capacity, 1);
}

#[test]
fn blank_frontend_url_means_any_origin() {
    let config = RelayConfig::from_lookup(lookup(&[("FRONTEND_URL", "  ")]));
    assert!(config.frontend_url.is_none());
}

#[test]
fn bad_bind_addr_is_reported() {
    let config = RelayConfig::from_lookup(lookup(&[("BIND_ADDR", "not an ip")]));
    assert!(config.socket_addr().is_err());
}
