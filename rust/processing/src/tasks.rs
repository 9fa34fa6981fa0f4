// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Task template expansion.
//!
//! Every catalogue category is crossed with every (building, floor) pair.
//! Emission order is categories outer, pairs inner, and GUIDs are handed
//! out sequentially in that order, so the GUID of a derived task is a pure
//! function of the catalogue, the floor list and the starting GUID.

use crate::floors::BuildingFloors;
use serde::Serialize;

/// Separator between the parts of a composite task name.
pub const NAME_SEPARATOR: &str = " - ";

/// Task categories of the "medium" detail level.
pub const MEDIUM_CATALOGUE: &[&str] = &[
    "Aushub",
    "Rohbau 1",
    "Rohbau 2",
    "Bodenbelag",
    "Fassade",
    "Elektro 1",
    "Elektro 2",
    "Heizung Kälte 1",
    "Heizung Kälte 2",
    "Lüftung 1",
    "Lüftung 2",
    "Sprinkler 1",
    "Sprinkler 2",
    "Sanitär 1",
    "Sanitär 2",
    "Haustechnik",
    "Gipser",
    "Fensterbau",
    "Türen",
    "Möbel",
    "Holzbau",
];

/// The medium catalogue as owned strings.
pub fn default_catalogue() -> Vec<String> {
    MEDIUM_CATALOGUE.iter().map(|s| s.to_string()).collect()
}

/// Catalogue for a named detail level. Only "medium" is defined; other
/// levels fall back to it.
pub fn catalogue_for(detail_level: &str) -> Vec<String> {
    if !detail_level.eq_ignore_ascii_case("medium") {
        tracing::warn!(detail_level, "Unknown detail level, using medium catalogue");
    }
    default_catalogue()
}

/// `"{building} - {category} - {floor}"`
pub fn task_display_name(building: &str, category: &str, floor: &str) -> String {
    format!("{building}{NAME_SEPARATOR}{category}{NAME_SEPARATOR}{floor}")
}

/// A task synthesized for one (building, category, floor) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    pub guid: u64,
    pub name: String,
    pub building: String,
    pub category: String,
    pub floor: String,
}

/// Expand `catalogue` over `building_floors`, numbering from `start_guid`.
///
/// Returns the records and the next unused GUID.
pub fn expand_tasks(
    catalogue: &[String],
    building_floors: &BuildingFloors,
    start_guid: u64,
) -> (Vec<TaskRecord>, u64) {
    let mut next = start_guid;
    let mut records = Vec::with_capacity(catalogue.len() * building_floors.pair_count());
    for category in catalogue {
        for (building, floors) in building_floors.iter() {
            for floor in floors {
                records.push(TaskRecord {
                    guid: next,
                    name: task_display_name(building, category, floor),
                    building: building.to_string(),
                    category: category.clone(),
                    floor: floor.clone(),
                });
                next += 1;
            }
        }
    }
    tracing::debug!(
        categories = catalogue.len(),
        pairs = building_floors.pair_count(),
        generated = records.len(),
        first_guid = start_guid,
        "Expanded task templates"
    );
    (records, next)
}
