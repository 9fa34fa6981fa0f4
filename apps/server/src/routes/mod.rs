// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP routes.

pub mod cache;
pub mod health;
pub mod process;

use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};

/// All endpoints, bound to `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::info))
        .route("/api/v1/health", get(health::check))
        .route("/api/v1/process", post(process::process))
        .route("/api/v1/process/stream", post(process::process_stream))
        .route("/api/v1/cache/check/:key", get(cache::check_cached))
        .route("/api/v1/cache/:key", get(cache::get_cached))
        .with_state(state)
}
