use std::{net::SocketAddr, path::Path};

use anyhow::Context;
use axum::{middleware, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    decompression::RequestDecompressionLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};

use crate::{
    error::ErrorVerbosity,
    middleware::{
        method_not_allowed::method_not_allowed, not_found::not_found,
        trace_headers::trace_headers, trace_response_body::trace_response_body,
    },
    openapi,
    route::books,
    state::ApiState,
    store::{BookStore, DatabaseConfig},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[source] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[source] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    socket_address: SocketAddr,
    #[serde(default)]
    error_verbosity: ErrorVerbosity,
    /// Log every response body at trace level.
    #[serde(default)]
    trace_bodies: bool,
    database: DatabaseConfig,
}

impl ServerConfig {
    pub fn new(
        socket_address: SocketAddr,
        error_verbosity: ErrorVerbosity,
        trace_bodies: bool,
        database: DatabaseConfig,
    ) -> Self {
        Self {
            socket_address,
            error_verbosity,
            trace_bodies,
            database,
        }
    }

    pub fn with_database_url(mut self, url: String) -> Self {
        self.database.url = url;
        self
    }

    pub fn error_verbosity(&self) -> ErrorVerbosity {
        self.error_verbosity
    }

    pub fn database(&self) -> &DatabaseConfig {
        &self.database
    }

    pub async fn from_config_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(ConfigError::Read)?;

        serde_yaml::from_str(&contents).map_err(ConfigError::Parse)
    }
}

/// Builds the full application router for `state`.
pub fn app(state: ApiState, trace_bodies: bool) -> Router {
    let router = Router::<ApiState>::new()
        .merge(books::app::app())
        .merge(openapi::app())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            method_not_allowed::<ApiState>,
        ))
        .layer(middleware::from_fn(trace_headers));

    let router = match trace_bodies {
        true => router.layer(middleware::from_fn_with_state(
            state.clone(),
            trace_response_body,
        )),
        false => router,
    };

    router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                    .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                    .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
            )
            .layer(RequestDecompressionLayer::new())
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive()),
    )
}

pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let book_store = BookStore::connect(self.config.database())
            .await
            .context("Failed to open database")?;

        let state = ApiState::new(self.config.error_verbosity, book_store.clone());
        let app = app(state, self.config.trace_bodies);

        tracing::info!(addr = %self.config.socket_address, "Starting server");

        let listener = TcpListener::bind(&self.config.socket_address)
            .await
            .context("Bind failed")?;

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

        book_store.close().await;

        tracing::info!("Database closed");

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");

        tracing::info!("CTRL+C received");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM signal handler")
            .recv()
            .await;

        tracing::info!("SIGTERM received");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down");
}
