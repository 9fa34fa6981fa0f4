// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # BIM2LOG Processing
//!
//! Turns building-model elements and an uploaded construction timeline into
//! a floor-resolved schedule with per-element task assignments.
//!
//! The pipeline runs six stages in order:
//!
//! 1. [`schema`] normalizes geometry rows or spreadsheet workbooks onto one
//!    element schema.
//! 2. [`floors`] assigns every element a floor, from declared floor data or
//!    by clustering centroid elevations.
//! 3. [`tasks`] expands the task catalogue over every (building, floor).
//! 4. [`timeline`] splits each trade's duration across its floors and lays
//!    the floors out back to back.
//! 5. [`reconcile`] matches elements to tasks and validates the result.
//! 6. [`aggregate`] reduces everything to summary tables.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bim2log_processing::{run, ElementSource, PipelineConfig, Timeline};
//!
//! let source = ElementSource::from_json_slice(&elements_json)?;
//! let timeline = Timeline::from_json_slice(&timeline_json, "Timeline")?;
//! let output = run(&source, &timeline, &PipelineConfig::default())?;
//!
//! for row in &output.object_summary {
//!     println!("{} {:?}: {}", row.floor_name, row.associated_task, row.object_count);
//! }
//! ```

pub mod aggregate;
pub mod cell;
pub mod classify;
pub mod config;
pub mod element;
pub mod error;
pub mod floors;
pub mod pipeline;
pub mod reconcile;
pub mod schema;
pub mod tasks;
pub mod timeline;
pub mod workbook;

pub use aggregate::{EbkpRow, EndingTaskRow, FloorVolume, ObjectSummaryRow, ValidationSummaryRow};
pub use cell::{format_timestamp, CellValue, RawRow};
pub use classify::{ClassificationRule, Classifier, RulePredicate};
pub use config::PipelineConfig;
pub use element::{Element, ElementRecord, ElementTable, DEFAULT_FLOOR, UNKNOWN_FLOOR};
pub use error::{Error, ErrorEnvelope, Result};
pub use floors::{assign_floors, DegradedReason, FloorAssignment, FloorHeight, FloorStrategy};
pub use pipeline::{
    run, run_json, run_with_progress, to_json, FloorReport, PipelineOutput, Stage, StageReport,
};
pub use reconcile::{ValidationRecord, MATCH_FOUND, NO_MATCH};
pub use schema::ElementSource;
pub use tasks::{catalogue_for, expand_tasks, TaskRecord, MEDIUM_CATALOGUE};
pub use timeline::{ScheduleTask, Timeline, TimelineRow};
pub use workbook::{InMemoryWorkbook, Sheet, Workbook};
