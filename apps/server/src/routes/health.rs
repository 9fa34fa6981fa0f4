// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Health check and service description.

use crate::AppState;
use axum::{extract::State, Json};
use bim2log_processing::{format_timestamp, tasks::default_catalogue};
use serde::Serialize;

const SERVICE: &str = "bim2log-server";

/// (method, path, description) of every route.
const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/api/v1/health", "Health check"),
    (
        "POST",
        "/api/v1/process",
        "Run the pipeline on an element export and a timeline",
    ),
    (
        "POST",
        "/api/v1/process/stream",
        "Run the pipeline with stage progress (Server-Sent Events)",
    ),
    ("GET", "/api/v1/cache/:key", "Retrieve a cached result"),
    (
        "GET",
        "/api/v1/cache/check/:key",
        "Check whether a result is cached",
    ),
];

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
}

/// Service description with the defaults a request inherits.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub defaults: PipelineDefaults,
    pub endpoints: Vec<EndpointInfo>,
}

/// Values used when a process request leaves an option out.
#[derive(Debug, Serialize)]
pub struct PipelineDefaults {
    pub building_name: String,
    pub default_start: String,
    pub task_catalogue: Vec<String>,
    pub classification_rules: usize,
    pub sse_chunk_size: usize,
    pub max_file_size_mb: usize,
}

#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

/// GET /api/v1/health
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: SERVICE,
    })
}

/// GET / - routes plus the configured pipeline defaults.
pub async fn info(State(state): State<AppState>) -> Json<ServiceInfo> {
    let config = &state.config;
    Json(ServiceInfo {
        service: SERVICE,
        version: env!("CARGO_PKG_VERSION"),
        defaults: PipelineDefaults {
            building_name: config.building_name.clone(),
            default_start: format_timestamp(&config.default_start),
            task_catalogue: default_catalogue(),
            classification_rules: state.classifier.rules().len(),
            sse_chunk_size: config.sse_chunk_size,
            max_file_size_mb: config.max_file_size_mb,
        },
        endpoints: ENDPOINTS
            .iter()
            .map(|&(method, path, description)| EndpointInfo {
                method,
                path,
                description,
            })
            .collect(),
    })
}
