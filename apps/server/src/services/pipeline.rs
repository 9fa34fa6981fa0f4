// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Runs the processing pipeline for one request.

use crate::config::Config;
use crate::error::ApiError;
use crate::services::cache::DiskCache;
use crate::types::{ProcessOptions, ProcessResponse, ProcessUpload, ProcessingStats};
use bim2log_processing::{
    format_timestamp, run_json, Classifier, PipelineConfig, PipelineOutput, StageReport,
};
use std::time::Instant;

/// Load the classifier named by `CLASSIFIER_RULES`, or the built-in table
/// with the discipline rules in front.
pub fn load_classifier(config: &Config) -> anyhow::Result<Classifier> {
    match &config.classifier_rules {
        Some(path) => {
            let bytes = std::fs::read(path)
                .map_err(|e| anyhow::anyhow!("reading classifier rules {path}: {e}"))?;
            let classifier = Classifier::from_json_slice(&bytes)?;
            tracing::info!(path = %path, rules = classifier.rules().len(), "Loaded classifier rules");
            Ok(classifier)
        }
        None => Ok(Classifier::default().with_discipline_rules()),
    }
}

/// One pipeline run: both uploads plus the effective configuration.
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub elements: Vec<u8>,
    pub timeline: Vec<u8>,
    pub config: PipelineConfig,
    pub skip_cache: bool,
}

impl PipelineJob {
    /// Combine an upload with the server defaults.
    pub fn new(upload: ProcessUpload, config: &Config, classifier: &Classifier) -> Result<Self, ApiError> {
        let ProcessUpload {
            elements,
            timeline,
            options,
        } = upload;
        let pipeline_config = pipeline_config(&options, config, classifier)?;
        Ok(Self {
            elements,
            timeline,
            config: pipeline_config,
            skip_cache: options.skip_cache,
        })
    }

    /// Hash of everything that influences the output.
    pub fn cache_key(&self) -> String {
        let catalogue = self.config.task_catalogue.join("\n");
        let start = format_timestamp(&self.config.default_start);
        let rules = serde_json::to_vec(&self.config.classifier).unwrap_or_default();
        DiskCache::generate_key(&[
            &self.elements,
            &self.timeline,
            self.config.building_name.as_bytes(),
            catalogue.as_bytes(),
            start.as_bytes(),
            &rules,
        ])
    }

    /// Run the pipeline. Blocking.
    pub fn run(&self, progress: impl FnMut(&StageReport)) -> bim2log_processing::Result<PipelineOutput> {
        run_json(&self.elements, &self.timeline, &self.config, progress)
    }
}

fn pipeline_config(
    options: &ProcessOptions,
    config: &Config,
    classifier: &Classifier,
) -> Result<PipelineConfig, ApiError> {
    let mut pipeline = PipelineConfig::default()
        .with_building_name(
            options
                .building_name
                .clone()
                .unwrap_or_else(|| config.building_name.clone()),
        )
        .with_classifier(classifier.clone())
        .with_default_start(config.default_start);
    if let Some(level) = &options.detail_level {
        pipeline = pipeline.with_detail_level(level);
    }
    pipeline
        .validate()
        .map_err(|e| ApiError::InvalidOption(e.to_string()))?;
    Ok(pipeline)
}

/// Statistics for a finished run.
pub fn stats_for(output: &PipelineOutput, started: Instant) -> ProcessingStats {
    ProcessingStats {
        element_count: output.elements.len(),
        task_count: output.final_schedule.len(),
        matched_count: output.validation_records.iter().filter(|r| r.success).count(),
        floor_count: output.floor_assignment.floors.len(),
        total_time_ms: started.elapsed().as_millis() as u64,
        from_cache: false,
    }
}

/// Run a job on the blocking pool and package the response.
pub async fn process(job: PipelineJob, cache_key: String) -> Result<ProcessResponse, ApiError> {
    let started = Instant::now();
    let output = tokio::task::spawn_blocking(move || job.run(|_| {})).await??;
    let stats = stats_for(&output, started);
    let data = serde_json::to_value(&output)?;

    tracing::info!(
        elements = stats.element_count,
        tasks = stats.task_count,
        matched = stats.matched_count,
        total_ms = stats.total_time_ms,
        "Processing complete"
    );

    Ok(ProcessResponse {
        data,
        cache_key,
        stats,
    })
}
