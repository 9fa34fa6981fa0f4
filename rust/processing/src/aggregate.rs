// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Summary tables over the reconciled elements.
//!
//! All groupings are emitted in ascending key order. Elements without an
//! associated task are grouped under a null task so that counts always add
//! up to the element total.

use crate::element::Element;
use crate::reconcile::ValidationRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Count and volume for one (floor, task) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSummaryRow {
    #[serde(rename = "FloorName")]
    pub floor_name: String,
    pub associated_task: Option<String>,
    #[serde(rename = "objectCount")]
    pub object_count: usize,
    #[serde(rename = "totalVolume")]
    pub total_volume: f64,
}

/// Count and volume per task across all floors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndingTaskRow {
    pub associated_task: Option<String>,
    #[serde(rename = "objectCount")]
    pub object_count: usize,
    #[serde(rename = "totalVolume")]
    pub total_volume: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationSummaryRow {
    #[serde(rename = "Reason")]
    pub reason: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloorVolume {
    pub floor: String,
    #[serde(rename = "objectCount")]
    pub object_count: usize,
    #[serde(rename = "totalVolume")]
    pub total_volume: f64,
}

/// Volumes of one EBKP cost group, split by floor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EbkpRow {
    #[serde(rename = "EBKP")]
    pub code: String,
    pub floors: Vec<FloorVolume>,
}

#[derive(Default)]
struct Tally {
    count: usize,
    volume: f64,
}

impl Tally {
    fn add(&mut self, element: &Element) {
        self.count += 1;
        self.volume += element.volume_or_zero();
    }
}

pub fn object_summary(elements: &[Element]) -> Vec<ObjectSummaryRow> {
    let mut groups: BTreeMap<(&str, Option<&str>), Tally> = BTreeMap::new();
    for element in elements {
        groups
            .entry((element.floor_label(), element.associated_task.as_deref()))
            .or_default()
            .add(element);
    }
    groups
        .into_iter()
        .map(|((floor, task), tally)| ObjectSummaryRow {
            floor_name: floor.to_string(),
            associated_task: task.map(str::to_string),
            object_count: tally.count,
            total_volume: tally.volume,
        })
        .collect()
}

pub fn ending_tasks(elements: &[Element]) -> Vec<EndingTaskRow> {
    let mut groups: BTreeMap<Option<&str>, Tally> = BTreeMap::new();
    for element in elements {
        groups
            .entry(element.associated_task.as_deref())
            .or_default()
            .add(element);
    }
    groups
        .into_iter()
        .map(|(task, tally)| EndingTaskRow {
            associated_task: task.map(str::to_string),
            object_count: tally.count,
            total_volume: tally.volume,
        })
        .collect()
}

pub fn validation_summary(records: &[ValidationRecord]) -> Vec<ValidationSummaryRow> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.reason.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(reason, count)| ValidationSummaryRow {
            reason: reason.to_string(),
            count,
        })
        .collect()
}

/// Per-floor volumes of every EBKP code. Floors follow `floor_order`;
/// labels outside it (such as `Unknown`) come last in label order.
pub fn ebkp_summary(elements: &[Element], floor_order: &[String]) -> Vec<EbkpRow> {
    let mut groups: BTreeMap<&str, BTreeMap<&str, Tally>> = BTreeMap::new();
    for element in elements {
        if let Some(code) = element.ebkp.as_deref() {
            groups
                .entry(code)
                .or_default()
                .entry(element.floor_label())
                .or_default()
                .add(element);
        }
    }

    groups
        .into_iter()
        .map(|(code, mut per_floor)| {
            let mut floors = Vec::with_capacity(per_floor.len());
            for floor in floor_order {
                if let Some(tally) = per_floor.remove(floor.as_str()) {
                    floors.push(floor_volume(floor, tally));
                }
            }
            floors.extend(per_floor.into_iter().map(|(f, t)| floor_volume(f, t)));
            EbkpRow {
                code: code.to_string(),
                floors,
            }
        })
        .collect()
}

fn floor_volume(floor: &str, tally: Tally) -> FloorVolume {
    FloorVolume {
        floor: floor.to_string(),
        object_count: tally.count,
        total_volume: tally.volume,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{MATCH_FOUND, NO_MATCH};
    use approx::assert_relative_eq;

    fn element(id: &str, floor: &str, volume: Option<f64>, task: Option<&str>) -> Element {
        Element {
            floor_name: Some(floor.to_string()),
            volume,
            associated_task: task.map(str::to_string),
            ..Element::new(id)
        }
    }

    #[test]
    fn groups_by_floor_and_task() {
        let elements = vec![
            element("a", "L1", Some(10.0), Some("Rohbau 1")),
            element("b", "L1", Some(20.0), Some("Rohbau 1")),
            element("c", "L2", Some(5.0), Some("Fassade")),
        ];
        let rows = object_summary(&elements);
        assert_eq!(
            rows,
            vec![
                ObjectSummaryRow {
                    floor_name: "L1".into(),
                    associated_task: Some("Rohbau 1".into()),
                    object_count: 2,
                    total_volume: 30.0,
                },
                ObjectSummaryRow {
                    floor_name: "L2".into(),
                    associated_task: Some("Fassade".into()),
                    object_count: 1,
                    total_volume: 5.0,
                },
            ]
        );
    }

    #[test]
    fn unmatched_elements_count_under_null_task() {
        let elements = vec![
            element("a", "L1", Some(1.0), None),
            element("b", "L1", None, Some("Rohbau 1")),
            element("c", "L1", Some(f64::NAN), None),
        ];
        let rows = object_summary(&elements);
        assert_eq!(rows[0].associated_task, None);
        assert_eq!(rows[0].object_count, 2);
        assert_relative_eq!(rows[0].total_volume, 1.0);
        assert_eq!(rows[1].total_volume, 0.0);
        let total: usize = rows.iter().map(|r| r.object_count).sum();
        assert_eq!(total, elements.len());

        let ending = ending_tasks(&elements);
        assert_eq!(ending.len(), 2);
        assert_eq!(ending[0].associated_task, None);
        assert_eq!(ending[1].associated_task.as_deref(), Some("Rohbau 1"));
    }

    #[test]
    fn counts_validation_reasons() {
        let record = |id: &str, ok: bool| ValidationRecord {
            object_id: id.into(),
            success: ok,
            task_guid: ok.then_some(1),
            reason: if ok { MATCH_FOUND } else { NO_MATCH }.into(),
        };
        let rows = validation_summary(&[record("a", true), record("b", false), record("c", true)]);
        assert_eq!(
            rows,
            vec![
                ValidationSummaryRow {
                    reason: MATCH_FOUND.into(),
                    count: 2
                },
                ValidationSummaryRow {
                    reason: NO_MATCH.into(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn ebkp_follows_floor_order() {
        let coded = |id: &str, code: Option<&str>, floor: &str, volume: f64| Element {
            ebkp: code.map(str::to_string),
            ..element(id, floor, Some(volume), None)
        };
        let elements = vec![
            coded("a", Some("C02.01"), "OG1", 4.0),
            coded("b", Some("C02.01"), "EG", 6.0),
            coded("c", Some("B06"), "Unknown", 1.0),
            coded("d", Some("C02.01"), "Unknown", 2.0),
            coded("e", None, "EG", 9.0),
        ];
        let order = vec!["EG".to_string(), "OG1".to_string()];
        let rows = ebkp_summary(&elements, &order);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].code, "B06");
        let floors: Vec<&str> = rows[1].floors.iter().map(|f| f.floor.as_str()).collect();
        assert_eq!(floors, vec!["EG", "OG1", "Unknown"]);
        assert_eq!(rows[1].floors[0].total_volume, 6.0);
        assert!(ebkp_summary(&elements[4..], &order).is_empty());
    }
}
