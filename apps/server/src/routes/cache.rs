// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cache retrieval endpoints.

use crate::error::ApiError;
use crate::types::ProcessResponse;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

/// GET /api/v1/cache/:key - Retrieve a cached pipeline result.
pub async fn get_cached(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ProcessResponse>, ApiError> {
    tracing::debug!(key = %key, "Cache lookup");

    match state.cache.get::<ProcessResponse>(&key).await? {
        Some(mut response) => {
            response.stats.from_cache = true;
            tracing::info!(key = %key, "Cache HIT");
            Ok(Json(response))
        }
        None => {
            tracing::debug!(key = %key, "Cache MISS");
            Err(ApiError::NotFound(format!("Cache key not found: {}", key)))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CacheCheckResponse {
    pub key: String,
    pub cached: bool,
}

/// GET /api/v1/cache/check/:key
pub async fn check_cached(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<CacheCheckResponse> {
    let cached = state.cache.has(&key).await;
    Json(CacheCheckResponse { key, cached })
}
