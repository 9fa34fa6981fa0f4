// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server configuration loaded from environment variables.

use bim2log_processing::config::{default_start, DEFAULT_BUILDING};
use chrono::{NaiveDate, NaiveDateTime};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Directory for cache storage.
    pub cache_dir: String,
    /// Maximum upload size in MB.
    pub max_file_size_mb: usize,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Number of worker threads for parallel processing.
    pub worker_threads: usize,
    /// Maximum size of one SSE result chunk in bytes.
    pub sse_chunk_size: usize,
    /// Building name used when a request does not name one.
    pub building_name: String,
    /// Seed date for trades without an uploaded start.
    pub default_start: NaiveDateTime,
    /// Path to a JSON rule table replacing the built-in classifier.
    pub classifier_rules: Option<String>,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS`.
fn parse_start_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Whether `LOG_FORMAT=json` is set.
pub fn json_logs() -> bool {
    std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            port: env_or("PORT", 8080),
            cache_dir: std::env::var("CACHE_DIR").unwrap_or_else(|_| {
                if std::path::Path::new("/.dockerenv").exists() {
                    "/app/cache".into()
                } else {
                    std::env::current_dir()
                        .ok()
                        .and_then(|dir| dir.join(".cache").to_str().map(|s| s.to_string()))
                        .unwrap_or_else(|| "./.cache".into())
                }
            }),
            max_file_size_mb: env_or("MAX_FILE_SIZE_MB", 100),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 300),
            worker_threads: env_or("WORKER_THREADS", num_cpus::get()),
            sse_chunk_size: env_or("SSE_CHUNK_SIZE", 64 * 1024).max(1),
            building_name: std::env::var("BUILDING_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BUILDING.into()),
            default_start: match std::env::var("DEFAULT_START_DATE") {
                Ok(raw) => parse_start_date(&raw).unwrap_or_else(|| {
                    tracing::warn!(value = %raw, "Invalid DEFAULT_START_DATE, using default");
                    default_start()
                }),
                Err(_) => default_start(),
            },
            classifier_rules: std::env::var("CLASSIFIER_RULES")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }

    /// Upload limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
