// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline processing with Server-Sent Events.
//!
//! Every finished stage becomes a `status` event. A result that fits in one
//! chunk is sent as a single `result` event. Larger results are framed by
//! `result_start` and `result_end`, with the `{"data": ...}` document sent
//! in between as raw text chunks that the client concatenates.

use crate::error::ApiError;
use crate::services::cache::DiskCache;
use crate::services::pipeline::{stats_for, PipelineJob};
use crate::types::{ProcessResponse, ProcessingStats, SseMessage, StreamEvent};
use async_stream::stream;
use bim2log_processing::StageReport;
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

#[derive(Serialize)]
struct ResultDocument<'a> {
    data: &'a serde_json::Value,
}

/// Split `text` into pieces of at most `max` bytes on char boundaries.
///
/// SSE readers drop one leading space from every data line, so no piece may
/// start with a space. Only a run of spaces longer than `max` makes a piece
/// exceed the limit.
fn split_utf8(text: &str, max: usize) -> Vec<&str> {
    let max = max.max(1);
    let mut chunks = Vec::with_capacity(text.len() / max + 1);
    let mut rest = text;
    while !rest.is_empty() {
        let mut end = max.min(rest.len());
        while end > 0
            && (!rest.is_char_boundary(end) || rest.as_bytes().get(end) == Some(&b' '))
        {
            end -= 1;
        }
        if end == 0 {
            end = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
            while rest.as_bytes().get(end) == Some(&b' ') {
                end += 1;
            }
        }
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

/// Frames carrying `data` to the client.
fn result_messages(
    data: &serde_json::Value,
    chunk_size: usize,
) -> Result<Vec<SseMessage>, serde_json::Error> {
    let document = serde_json::to_string(&ResultDocument { data })?;
    if document.len() <= chunk_size {
        return Ok(vec![StreamEvent::Result { data: data.clone() }.into()]);
    }

    let chunks = split_utf8(&document, chunk_size);
    tracing::debug!(
        total_bytes = document.len(),
        chunks = chunks.len(),
        "Sending chunked result"
    );
    let mut messages = Vec::with_capacity(chunks.len() + 2);
    messages.push(
        StreamEvent::ResultStart {
            message: format!("Sending result in {} chunks", chunks.len()),
            total_bytes: document.len(),
            chunks: chunks.len(),
        }
        .into(),
    );
    messages.extend(chunks.into_iter().map(|c| SseMessage::Chunk(c.to_string())));
    messages.push(StreamEvent::ResultEnd.into());
    Ok(messages)
}

fn error_event(err: &ApiError) -> SseMessage {
    let envelope = err.envelope();
    tracing::error!(kind = %envelope.kind, message = %envelope.message, "Streaming run failed");
    StreamEvent::Error {
        kind: envelope.kind,
        message: envelope.message,
    }
    .into()
}

fn complete(cache_key: String, stats: ProcessingStats) -> SseMessage {
    StreamEvent::Complete {
        message: "Processing complete".into(),
        cache_key,
        stats,
    }
    .into()
}

/// Run `job` and stream its progress and result.
pub fn process_streaming(
    job: PipelineJob,
    cache: Arc<DiskCache>,
    chunk_size: usize,
) -> Pin<Box<dyn Stream<Item = SseMessage> + Send>> {
    Box::pin(stream! {
        let started = Instant::now();
        let cache_key = job.cache_key();

        if !job.skip_cache {
            match cache.get::<ProcessResponse>(&cache_key).await {
                Ok(Some(cached)) => {
                    tracing::info!(cache_key = %cache_key, "Cache HIT");
                    yield SseMessage::Event(StreamEvent::Status {
                        stage: None,
                        message: "Loaded result from cache".into(),
                    });
                    match result_messages(&cached.data, chunk_size) {
                        Ok(messages) => {
                            for message in messages {
                                yield message;
                            }
                        }
                        Err(e) => {
                            yield error_event(&ApiError::from(e));
                            return;
                        }
                    }
                    let mut stats = cached.stats;
                    stats.from_cache = true;
                    yield complete(cache_key, stats);
                    return;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Cache lookup failed, processing"),
            }
        }

        tracing::info!(cache_key = %cache_key, "Cache MISS - processing");
        yield SseMessage::Event(StreamEvent::Status {
            stage: None,
            message: "Processing started".into(),
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<StageReport>();
        let handle = tokio::task::spawn_blocking(move || {
            job.run(|report| {
                let _ = tx.send(report.clone());
            })
        });

        while let Some(report) = rx.recv().await {
            yield SseMessage::Event(StreamEvent::Status {
                stage: Some(report.stage),
                message: report.message,
            });
        }

        let output = match handle.await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                yield error_event(&ApiError::from(e));
                return;
            }
            Err(e) => {
                yield error_event(&ApiError::from(e));
                return;
            }
        };

        let stats = stats_for(&output, started);
        let data = match serde_json::to_value(&output) {
            Ok(data) => data,
            Err(e) => {
                yield error_event(&ApiError::from(e));
                return;
            }
        };
        let messages = match result_messages(&data, chunk_size) {
            Ok(messages) => messages,
            Err(e) => {
                yield error_event(&ApiError::from(e));
                return;
            }
        };

        let response = ProcessResponse {
            data,
            cache_key: cache_key.clone(),
            stats: stats.clone(),
        };
        let background = cache.clone();
        tokio::spawn(async move {
            if let Err(e) = background.set(&response.cache_key, &response).await {
                tracing::error!(error = %e, "Failed to cache result");
            }
        });

        for message in messages {
            yield message;
        }
        yield complete(cache_key, stats);
    })
}
