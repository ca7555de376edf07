use std::net::SocketAddr;

use crate::{error::ErrorVerbosity, server::ServerConfig, store::DatabaseConfig};

#[tokio::test]
async fn example_config_is_valid() {
    ServerConfig::from_config_file("config.example.yaml")
        .await
        .expect("Example config is not parsable");
}

#[tokio::test]
async fn missing_config_file_is_a_read_error() {
    let err = ServerConfig::from_config_file("non_existent_config.yaml")
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("Failed to read config file"));
}

#[test]
fn error_verbosity_defaults_to_message() {
    let config: ServerConfig = serde_yaml::from_str(
        "socket_address: 127.0.0.1:5000\ndatabase:\n  url: \"sqlite::memory:\"\n",
    )
    .expect("Minimal config is parsable");

    assert_eq!(config.error_verbosity(), ErrorVerbosity::Message);
}

#[test]
fn database_url_override_replaces_configured_url() {
    let socket_address: SocketAddr = "127.0.0.1:5000".parse().unwrap();
    let config = ServerConfig::new(
        socket_address,
        ErrorVerbosity::Full,
        true,
        DatabaseConfig::new("sqlite://books.db", 3),
    )
    .with_database_url("sqlite::memory:".to_string());

    assert_eq!(config.error_verbosity(), ErrorVerbosity::Full);
    assert_eq!(config.database().url, "sqlite::memory:");
    assert_eq!(config.database().max_connections, 3);
}
