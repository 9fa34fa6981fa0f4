// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline configuration.

use crate::classify::Classifier;
use crate::error::{Error, Result};
use crate::tasks::{catalogue_for, default_catalogue};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

pub const DEFAULT_BUILDING: &str = "Biel";
pub const DEFAULT_SHEET_PREFIX: &str = "Attributes";
pub const DEFAULT_TIMELINE_SHEET: &str = "Timeline";

/// Seed date for trades whose uploaded rows carry no start: 2023-01-01.
pub fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
}

/// Everything a run needs besides its two input tables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name stamped on every element and task.
    pub building_name: String,
    /// Task categories expanded per floor, in GUID order.
    pub task_catalogue: Vec<String>,
    pub classifier: Classifier,
    pub default_start: NaiveDateTime,
    /// Sheet name prefix selecting element sheets in multi-sheet workbooks.
    pub sheet_prefix: String,
    /// Sheet holding the schedule in a timeline workbook.
    pub timeline_sheet: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            building_name: DEFAULT_BUILDING.to_string(),
            task_catalogue: default_catalogue(),
            classifier: Classifier::default(),
            default_start: default_start(),
            sheet_prefix: DEFAULT_SHEET_PREFIX.to_string(),
            timeline_sheet: DEFAULT_TIMELINE_SHEET.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn with_building_name(mut self, name: impl Into<String>) -> Self {
        self.building_name = name.into();
        self
    }

    pub fn with_task_catalogue(mut self, catalogue: Vec<String>) -> Self {
        self.task_catalogue = catalogue;
        self
    }

    pub fn with_detail_level(self, level: &str) -> Self {
        self.with_task_catalogue(catalogue_for(level))
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_default_start(mut self, start: NaiveDateTime) -> Self {
        self.default_start = start;
        self
    }

    pub fn with_sheet_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sheet_prefix = prefix.into();
        self
    }

    pub fn with_timeline_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.timeline_sheet = sheet.into();
        self
    }

    /// Reject configurations no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.building_name.trim().is_empty() {
            return Err(Error::InvalidConfig("building name is empty".into()));
        }
        if self.building_name.contains(crate::tasks::NAME_SEPARATOR) {
            return Err(Error::InvalidConfig(format!(
                "building name '{}' contains the task name separator",
                self.building_name
            )));
        }
        if let Some(blank) = self.task_catalogue.iter().position(|c| c.trim().is_empty()) {
            return Err(Error::InvalidConfig(format!(
                "task catalogue entry {blank} is empty"
            )));
        }
        Ok(())
    }
}
