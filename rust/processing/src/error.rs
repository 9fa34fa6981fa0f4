// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the processing pipeline.

use crate::pipeline::Stage;
use serde::Serialize;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading inputs or running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A column the operation depends on is absent from the input table.
    #[error("required column '{column}' not found in {table} table")]
    MissingColumn { table: &'static str, column: String },

    /// The workbook contains no sheets at all.
    #[error("workbook contains no sheets")]
    EmptyWorkbook,

    /// A multi-sheet workbook has no sheet with the expected prefix.
    #[error("no sheets starting with '{prefix}' found in a multi-sheet workbook")]
    NoMatchingSheets { prefix: String },

    /// A named sheet is missing or could not be read.
    #[error("failed to read sheet '{sheet}': {message}")]
    SheetRead { sheet: String, message: String },

    /// The element source produced no rows.
    #[error("element table is empty")]
    EmptyElements,

    /// Two rows share the same object identifier.
    #[error("duplicate object id '{0}'")]
    DuplicateObjectId(String),

    /// A schedule cell could not be read as a timestamp.
    #[error("invalid timestamp in row {row}, column '{column}': {value}")]
    InvalidTimestamp {
        row: usize,
        column: String,
        value: String,
    },

    /// Laying out a trade's floors ran past the last representable date.
    #[error("schedule for '{task}' runs past the supported date range")]
    ScheduleOverflow { task: String },

    /// Configuration value is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input document is not valid JSON for the expected shape.
    #[error("malformed input document: {0}")]
    Json(#[from] serde_json::Error),

    /// A pipeline stage failed; the run is aborted.
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with the stage that produced it.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            Error::Stage { .. } => self,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stable machine-readable error code.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingColumn { .. } => "MISSING_COLUMN",
            Error::EmptyWorkbook => "EMPTY_WORKBOOK",
            Error::NoMatchingSheets { .. } => "NO_MATCHING_SHEETS",
            Error::SheetRead { .. } => "SHEET_READ_ERROR",
            Error::EmptyElements => "EMPTY_ELEMENTS",
            Error::DuplicateObjectId(_) => "DUPLICATE_OBJECT_ID",
            Error::InvalidTimestamp { .. } => "INVALID_TIMESTAMP",
            Error::ScheduleOverflow { .. } => "SCHEDULE_OVERFLOW",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "MALFORMED_INPUT",
            Error::Stage { source, .. } => source.kind(),
        }
    }

    /// Whether the error is caused by the shape of the caller's input
    /// rather than by the pipeline itself.
    pub fn is_input_shape(&self) -> bool {
        match self {
            Error::InvalidConfig(_) => false,
            Error::Stage { source, .. } => source.is_input_shape(),
            _ => true,
        }
    }

    /// The stage that failed, when known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Uniform error shape handed across the pipeline boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    pub kind: String,
    pub message: String,
}

impl From<&Error> for ErrorEnvelope {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}
