// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Canonical building element and the element table.

use crate::cell::CellValue;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Floor label for elements whose elevation matches no known floor.
pub const UNKNOWN_FLOOR: &str = "Unknown";

/// Floor label used when clustering could not run at all.
pub const DEFAULT_FLOOR: &str = "Default";

/// One physical building component on the canonical schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Position of the row within its source sheet.
    pub row_index: usize,
    /// Source sheet for workbook inputs.
    pub sheet: Option<String>,
    pub object_id: String,
    pub ifc_type: Option<String>,
    pub name: Option<String>,
    /// Storey as declared by the source, possibly noisy or missing.
    pub declared_floor: Option<String>,
    pub building: Option<String>,
    pub source_uri: Option<String>,
    pub parent_object_id: Option<String>,
    pub workspace_id: Option<String>,
    /// EBKP cost-group code.
    pub ebkp: Option<String>,
    pub centroid_x: Option<f64>,
    pub centroid_y: Option<f64>,
    pub centroid_z: Option<f64>,
    pub centroid_w: Option<f64>,
    pub bottom_elevation: Option<f64>,
    pub top_elevation: Option<f64>,
    /// Convex hull volume in m³.
    pub volume: Option<f64>,
    /// Remaining property-set values.
    pub properties: BTreeMap<String, CellValue>,
    /// Floor assigned by the floor assignment engine.
    pub floor_name: Option<String>,
    pub associated_task: Option<String>,
    pub task_guid: Option<u64>,
}

impl Element {
    /// Create an element with only its identifier set.
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            ..Default::default()
        }
    }

    /// Volume with missing values counted as zero.
    pub fn volume_or_zero(&self) -> f64 {
        self.volume.filter(|v| !v.is_nan()).unwrap_or(0.0)
    }

    /// Assigned floor, or [`UNKNOWN_FLOOR`] before assignment.
    pub fn floor_label(&self) -> &str {
        self.floor_name.as_deref().unwrap_or(UNKNOWN_FLOOR)
    }

    /// Finite centroid elevation, if any.
    pub fn elevation(&self) -> Option<f64> {
        self.centroid_z.filter(|z| z.is_finite())
    }
}

/// Elements together with the canonical columns their source provided.
///
/// Column presence matters separately from cell values: a source without a
/// bottom-elevation column gets synthesized elevations, while a source with
/// the column but blank cells does not.
#[derive(Debug, Clone, Default)]
pub struct ElementTable {
    elements: Vec<Element>,
    columns: BTreeSet<String>,
}

impl ElementTable {
    pub fn new(elements: Vec<Element>, columns: BTreeSet<String>) -> Self {
        Self { elements, columns }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    pub fn columns(&self) -> &BTreeSet<String> {
        &self.columns
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn into_parts(self) -> (Vec<Element>, BTreeSet<String>) {
        (self.elements, self.columns)
    }
}

/// Flat view of a reconciled element, as exported alongside the schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementRecord {
    #[serde(rename = "objectId")]
    pub object_id: String,
    #[serde(rename = "ifc/Type")]
    pub ifc_type: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "FloorName")]
    pub floor_name: String,
    #[serde(rename = "Building")]
    pub building: Option<String>,
    #[serde(rename = "sv/ConvexHullVolume")]
    pub volume: f64,
    pub associated_task: Option<String>,
    #[serde(rename = "TaskGuid")]
    pub task_guid: Option<u64>,
}

impl From<&Element> for ElementRecord {
    fn from(element: &Element) -> Self {
        Self {
            object_id: element.object_id.clone(),
            ifc_type: element.ifc_type.clone(),
            name: element.name.clone(),
            floor_name: element.floor_label().to_string(),
            building: element.building.clone(),
            volume: element.volume_or_zero(),
            associated_task: element.associated_task.clone(),
            task_guid: element.task_guid,
        }
    }
}
