//! MRF Tracker API Gateway
//!
//! Axum HTTP service for material request intake, the approval workflow,
//! quotations, spreadsheet import/export, inventory and administration.

#![recursion_limit = "256"]
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use prometheus::Registry;
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use mrf_database::PostgresPool;
use mrf_utils::{AppConfig, ServerConfig};

pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod notify;
pub mod routes;
pub mod storage;

use metrics::ApiMetrics;
use middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use notify::Notifier;
use storage::AttachmentStorage;

#[derive(Clone)]
pub struct AppState {
    pub pool: PostgresPool,
    pub config: Arc<AppConfig>,
    pub metrics: ApiMetrics,
    pub notifier: Notifier,
    pub storage: AttachmentStorage,
}

impl AppState {
    pub fn new(pool: PostgresPool, config: AppConfig) -> Result<Self> {
        Ok(Self {
            pool,
            metrics: ApiMetrics::new(Registry::new())?,
            notifier: Notifier::new(config.email.clone())?,
            storage: AttachmentStorage::new(&config.storage.upload_dir),
            config: Arc::new(config),
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let server = &state.config.server;

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::metrics_handler))
        .nest("/api", routes::create_api_routes(state.clone()))
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(from_fn_with_state(state.clone(), metrics_middleware))
                .layer(CompressionLayer::new())
                .layer(cors_layer(server))
                .layer(TimeoutLayer::new(Duration::from_secs(server.timeout_seconds)))
                .layer(DefaultBodyLimit::max(server.max_request_size)),
        )
        .with_state(state)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origin = match server.cors_origin.trim() {
        "" | "*" => AllowOrigin::from(Any),
        origin => match HeaderValue::from_str(origin) {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                tracing::warn!(origin, "Invalid CORS origin, allowing any");
                AllowOrigin::from(Any)
            }
        },
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([
            header::CONTENT_DISPOSITION,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}
