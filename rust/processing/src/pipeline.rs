// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline entry point.
//!
//! Runs the stages strictly in order, each consuming the previous stage's
//! output. The run either produces a complete [`PipelineOutput`] or fails
//! with an error naming the stage; nothing partial is ever returned.

use crate::aggregate::{
    ebkp_summary, ending_tasks, object_summary, validation_summary, EbkpRow, EndingTaskRow,
    ObjectSummaryRow, ValidationSummaryRow,
};
use crate::config::PipelineConfig;
use crate::element::ElementRecord;
use crate::error::{Error, Result};
use crate::floors::{assign_floors, FloorHeight, FloorStrategy};
use crate::reconcile::{reconcile, ValidationRecord};
use crate::schema::ElementSource;
use crate::tasks::expand_tasks;
use crate::timeline::{combine, distribute_durations, ScheduleTask, Timeline};
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    FloorAssignment,
    TaskExpansion,
    Timeline,
    Reconcile,
    Aggregate,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Normalize,
        Stage::FloorAssignment,
        Stage::TaskExpansion,
        Stage::Timeline,
        Stage::Reconcile,
        Stage::Aggregate,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Normalize => "schema normalization",
            Stage::FloorAssignment => "floor assignment",
            Stage::TaskExpansion => "task expansion",
            Stage::Timeline => "timeline distribution",
            Stage::Reconcile => "element-task reconciliation",
            Stage::Aggregate => "aggregation",
        };
        f.write_str(name)
    }
}

/// Progress notification emitted after each completed stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub message: String,
}

/// How floors were determined, as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorReport {
    pub building: String,
    pub strategy: FloorStrategy,
    pub floors: Vec<String>,
    pub floor_heights: Vec<FloorHeight>,
}

/// Complete result of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub final_schedule: Vec<ScheduleTask>,
    pub object_summary: Vec<ObjectSummaryRow>,
    pub ending_tasks: Vec<EndingTaskRow>,
    pub validation_summary: Vec<ValidationSummaryRow>,
    pub ebkp_summary: Vec<EbkpRow>,
    pub floor_assignment: FloorReport,
    pub elements: Vec<ElementRecord>,
    pub validation_records: Vec<ValidationRecord>,
}

/// Run the pipeline.
pub fn run(
    source: &ElementSource,
    timeline: &Timeline,
    config: &PipelineConfig,
) -> Result<PipelineOutput> {
    run_with_progress(source, timeline, config, |_| {})
}

/// Parse both uploads from JSON and run the pipeline.
pub fn run_json(
    elements: &[u8],
    timeline: &[u8],
    config: &PipelineConfig,
    progress: impl FnMut(&StageReport),
) -> Result<PipelineOutput> {
    let source = ElementSource::from_json_slice(elements).map_err(|e| e.in_stage(Stage::Normalize))?;
    let timeline = Timeline::from_json_slice(timeline, &config.timeline_sheet)
        .map_err(|e| e.in_stage(Stage::Timeline))?;
    run_with_progress(&source, &timeline, config, progress)
}

/// Run the pipeline, calling `progress` after every stage.
pub fn run_with_progress(
    source: &ElementSource,
    timeline: &Timeline,
    config: &PipelineConfig,
    mut progress: impl FnMut(&StageReport),
) -> Result<PipelineOutput> {
    let started = Instant::now();
    config.validate()?;
    let mut report = |stage: Stage, message: String| {
        tracing::debug!(%stage, %message, "Stage complete");
        progress(&StageReport { stage, message });
    };

    let table = source
        .load(&config.sheet_prefix)
        .map_err(|e| e.in_stage(Stage::Normalize))?;
    report(Stage::Normalize, format!("Loaded {} elements", table.len()));

    let assignment = assign_floors(table, &config.building_name);
    if let FloorStrategy::Degraded { reason } = &assignment.strategy {
        tracing::warn!(?reason, "Floor assignment degraded");
    }
    report(
        Stage::FloorAssignment,
        format!(
            "Assigned {} elements to {} floors",
            assignment.elements.len(),
            assignment.metadata.floors.len()
        ),
    );

    let (derived, next_guid) = expand_tasks(
        &config.task_catalogue,
        &assignment.building_floors,
        timeline.next_guid(),
    );
    report(
        Stage::TaskExpansion,
        format!(
            "Generated {} tasks, next GUID {}",
            derived.len(),
            next_guid
        ),
    );

    let schedule = distribute_durations(combine(timeline, &derived), config.default_start)
        .map_err(|e| e.in_stage(Stage::Timeline))?;
    let scheduled = schedule.iter().filter(|t| t.has_elements).count();
    report(
        Stage::Timeline,
        format!("Scheduled {scheduled} of {} tasks", schedule.len()),
    );

    let mut elements = assignment.elements;
    let records = reconcile(&mut elements, &schedule, &config.classifier);
    let matched = records.iter().filter(|r| r.success).count();
    report(
        Stage::Reconcile,
        format!("Matched {matched} of {} elements", records.len()),
    );

    let output = PipelineOutput {
        object_summary: object_summary(&elements),
        ending_tasks: ending_tasks(&elements),
        validation_summary: validation_summary(&records),
        ebkp_summary: ebkp_summary(&elements, &assignment.metadata.floors),
        floor_assignment: FloorReport {
            building: assignment.metadata.building,
            strategy: assignment.strategy,
            floors: assignment.metadata.floors,
            floor_heights: assignment.floor_heights,
        },
        elements: elements.iter().map(ElementRecord::from).collect(),
        validation_records: records,
        final_schedule: schedule,
    };
    report(
        Stage::Aggregate,
        format!("Built {} summary rows", output.object_summary.len()),
    );

    tracing::info!(
        elements = output.elements.len(),
        tasks = output.final_schedule.len(),
        matched,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Pipeline complete"
    );
    Ok(output)
}

/// Serialize an output, mapping failures onto the aggregate stage.
pub fn to_json(output: &PipelineOutput) -> Result<String> {
    serde_json::to_string(output).map_err(|e| Error::from(e).in_stage(Stage::Aggregate))
}
