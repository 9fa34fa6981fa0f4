// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline endpoints.
//!
//! Both take a multipart form with an `elements` and a `timeline` upload
//! plus the optional text fields `detail_level`, `building_name` and
//! `skip_cache`.

use crate::error::ApiError;
use crate::services::{pipeline, process_streaming, PipelineJob};
use crate::types::{ProcessOptions, ProcessResponse, ProcessUpload};
use crate::AppState;
use axum::{
    extract::{Multipart, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::StreamExt;
use std::convert::Infallible;

/// Extract both uploads and the options from a multipart request.
async fn extract_upload(multipart: &mut Multipart, max_mb: usize) -> Result<ProcessUpload, ApiError> {
    let max_bytes = max_mb * 1024 * 1024;
    let mut elements = None;
    let mut timeline = None;
    let mut options = ProcessOptions::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        tracing::debug!(field_name = %name, "Processing multipart field");

        match name.as_str() {
            "elements" | "timeline" => {
                let bytes = field.bytes().await?;
                if bytes.len() > max_bytes {
                    return Err(ApiError::FileTooLarge { max_mb });
                }
                tracing::debug!(field_name = %name, size = bytes.len(), "Extracted upload");
                if name == "elements" {
                    elements = Some(bytes.to_vec());
                } else {
                    timeline = Some(bytes.to_vec());
                }
            }
            _ => {
                let value = field.text().await?;
                options.set_field(&name, &value);
            }
        }
    }

    Ok(ProcessUpload {
        elements: elements.ok_or(ApiError::MissingUpload("elements"))?,
        timeline: timeline.ok_or(ApiError::MissingUpload("timeline"))?,
        options,
    })
}

/// POST /api/v1/process - Full synchronous run.
pub async fn process(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let upload = extract_upload(&mut multipart, state.config.max_file_size_mb).await?;
    let job = PipelineJob::new(upload, &state.config, &state.classifier)?;
    let cache_key = job.cache_key();

    if !job.skip_cache {
        if let Some(mut cached) = state.cache.get::<ProcessResponse>(&cache_key).await? {
            tracing::info!(cache_key = %cache_key, "Cache HIT");
            cached.stats.from_cache = true;
            return Ok(Json(cached));
        }
    }

    tracing::info!(
        cache_key = %cache_key,
        elements_bytes = job.elements.len(),
        timeline_bytes = job.timeline.len(),
        "Cache MISS - processing"
    );

    let response = pipeline::process(job, cache_key.clone()).await?;

    // Cache result (background)
    let cache = state.cache.clone();
    let response_clone = response.clone();
    tokio::spawn(async move {
        if let Err(e) = cache.set(&cache_key, &response_clone).await {
            tracing::error!(error = %e, "Failed to cache result");
        }
    });

    Ok(Json(response))
}

/// POST /api/v1/process/stream - Streaming SSE run.
pub async fn process_stream(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let upload = extract_upload(&mut multipart, state.config.max_file_size_mb).await?;
    let job = PipelineJob::new(upload, &state.config, &state.classifier)?;

    let stream = process_streaming(job, state.cache.clone(), state.config.sse_chunk_size)
        .map(|message| Ok(Event::default().data(message.into_data())));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
