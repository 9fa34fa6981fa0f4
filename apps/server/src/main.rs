// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BIM2LOG Server - construction logistics schedules over HTTP.
//!
//! This server runs the processing pipeline on an uploaded element export
//! and timeline. It supports:
//!
//! - Synchronous runs with caching
//! - Streaming Server-Sent Events with per-stage progress
//!
//! # Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `POST /api/v1/process` - Full run (JSON)
//! - `POST /api/v1/process/stream` - Streaming run (SSE)
//! - `GET /api/v1/cache/:key` - Retrieve cached result
//! - `GET /api/v1/cache/check/:key` - Check whether a result is cached

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use bim2log_processing::Classifier;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod routes;
mod services;
mod types;

use config::Config;
use services::cache::DiskCache;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<DiskCache>,
    pub config: Arc<Config>,
    pub classifier: Arc<Classifier>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,bim2log_server=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config::json_logs() {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env();

    tracing::info!(
        port = config.port,
        cache_dir = %config.cache_dir,
        max_file_size_mb = config.max_file_size_mb,
        worker_threads = config.worker_threads,
        sse_chunk_size = config.sse_chunk_size,
        building = %config.building_name,
        "Starting BIM2LOG Server"
    );

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads)
        .build_global()
        .context("Failed to initialize rayon thread pool")?;

    let classifier = services::load_classifier(&config)?;
    let cache = Arc::new(DiskCache::new(&config.cache_dir).await);

    let state = AppState {
        cache,
        config: Arc::new(config.clone()),
        classifier: Arc::new(classifier),
    };

    let app = routes::build_router(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes() * 2))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}
