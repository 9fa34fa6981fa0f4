// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Element–task reconciliation.
//!
//! Each element is classified into a task category, then matched against
//! the schedule rows on its floor whose name contains that category. The
//! first eligible row in schedule order wins. A second pass resolves the
//! matched name back to a task GUID and records the outcome per element.

use crate::classify::Classifier;
use crate::element::Element;
use crate::timeline::ScheduleTask;
use rustc_hash::FxHashMap;
use serde::Serialize;

pub const MATCH_FOUND: &str = "Match found";
pub const NO_MATCH: &str = "No matching task found";

/// Outcome of resolving one element's task reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationRecord {
    #[serde(rename = "ObjectId")]
    pub object_id: String,
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "TaskGuid")]
    pub task_guid: Option<u64>,
    #[serde(rename = "Reason")]
    pub reason: String,
}

/// Schedule rows eligible for matching, grouped by floor in table order.
struct CandidateIndex<'a> {
    by_floor: FxHashMap<&'a str, Vec<(&'a str, String)>>,
}

impl<'a> CandidateIndex<'a> {
    fn new(tasks: &'a [ScheduleTask]) -> Self {
        let mut by_floor: FxHashMap<&str, Vec<(&str, String)>> = FxHashMap::default();
        for task in tasks.iter().filter(|t| t.has_elements) {
            if let (Some(name), Some(floor)) = (task.name.as_deref(), task.floor.as_deref()) {
                by_floor
                    .entry(floor)
                    .or_default()
                    .push((name, name.to_lowercase()));
            }
        }
        Self { by_floor }
    }

    fn first_match(&self, floor: &str, category: &str) -> Option<&'a str> {
        let needle = category.to_lowercase();
        self.by_floor
            .get(floor)?
            .iter()
            .find(|(_, lowered)| lowered.contains(&needle))
            .map(|(name, _)| *name)
    }
}

/// Set `associated_task` on every element that classifies into a category
/// with an eligible task on its floor. Other elements are cleared.
pub fn map_elements_to_tasks(
    elements: &mut [Element],
    tasks: &[ScheduleTask],
    classifier: &Classifier,
) {
    let index = CandidateIndex::new(tasks);
    let mut unclassified = 0usize;
    let mut matched = 0usize;

    for element in elements.iter_mut() {
        let category = match element.ifc_type.as_deref() {
            Some(_) => classifier.classify(element),
            None => None,
        };
        let Some(category) = category else {
            unclassified += 1;
            element.associated_task = None;
            continue;
        };
        let task = index.first_match(element.floor_label(), category);
        if task.is_some() {
            matched += 1;
        }
        element.associated_task = task.map(str::to_string);
    }

    tracing::debug!(
        elements = elements.len(),
        matched,
        unclassified,
        "Mapped elements to tasks"
    );
}

/// Look up the GUID of each element's associated task by exact name and
/// floor, and emit one validation record per element.
pub fn resolve_task_guids(
    elements: &mut [Element],
    tasks: &[ScheduleTask],
) -> Vec<ValidationRecord> {
    let mut guids: FxHashMap<(&str, &str), Option<u64>> = FxHashMap::default();
    for task in tasks {
        if let (Some(name), Some(floor)) = (task.name.as_deref(), task.floor.as_deref()) {
            guids.entry((name, floor)).or_insert(task.guid);
        }
    }

    let records: Vec<ValidationRecord> = elements
        .iter_mut()
        .map(|element| {
            let guid = element
                .associated_task
                .as_deref()
                .and_then(|name| guids.get(&(name, element.floor_label())).copied())
                .flatten();
            element.task_guid = guid;
            let success = guid.is_some();
            ValidationRecord {
                object_id: element.object_id.clone(),
                success,
                task_guid: guid,
                reason: if success { MATCH_FOUND } else { NO_MATCH }.to_string(),
            }
        })
        .collect();

    let failed = records.iter().filter(|r| !r.success).count();
    if failed > 0 {
        tracing::warn!(failed, total = records.len(), "Elements without a resolved task");
    }
    records
}

/// Both reconciliation passes.
pub fn reconcile(
    elements: &mut [Element],
    tasks: &[ScheduleTask],
    classifier: &Classifier,
) -> Vec<ValidationRecord> {
    map_elements_to_tasks(elements, tasks, classifier);
    resolve_task_guids(elements, tasks)
}
