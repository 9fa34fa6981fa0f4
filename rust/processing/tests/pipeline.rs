// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end runs of the processing pipeline.

use approx::assert_relative_eq;
use bim2log_processing::{
    run, run_json, to_json, CellValue, DegradedReason, ElementSource, FloorStrategy, InMemoryWorkbook,
    PipelineConfig, PipelineOutput, RawRow, Stage, Timeline, MATCH_FOUND, MEDIUM_CATALOGUE, NO_MATCH,
};
use rustc_hash::FxHashMap;
use serde_json::{json, Value};

fn bytes(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

fn run_values(elements: Value, timeline: Value) -> PipelineOutput {
    run_json(
        &bytes(elements),
        &bytes(timeline),
        &PipelineConfig::default(),
        |_| {},
    )
    .unwrap()
}

/// Two walls on L1 and a curtain wall on L2.
fn two_floor_elements() -> Value {
    json!([
        {"ObjectID": "w1", "type": "IfcWall", "Floor": "L1", "Centroid Z (m)": 1.0, "Volume (m³)": 10.0},
        {"ObjectID": "w2", "type": "IfcWall", "Floor": "L1", "Centroid Z (m)": 1.2, "Volume (m³)": "20.0"},
        {"ObjectID": "cw", "type": "IfcCurtainWall", "Floor": "L2", "Centroid Z (m)": 4.0, "Volume (m³)": 5.0}
    ])
}

fn two_trade_timeline() -> Value {
    json!([
        {"name": "Rohbau 1", "Start": "2024-01-01", "End": "2024-01-21"},
        {"name": "Fassade", "Start": "2024-02-01", "End": "2024-02-11"}
    ])
}

#[test]
fn summarizes_volume_per_floor_and_task() {
    let output = run_values(two_floor_elements(), two_trade_timeline());

    assert_eq!(output.floor_assignment.strategy, FloorStrategy::Declared);
    assert_eq!(output.floor_assignment.floors, vec!["L1", "L2"]);

    let rows: Vec<(&str, Option<&str>, usize, f64)> = output
        .object_summary
        .iter()
        .map(|r| {
            (
                r.floor_name.as_str(),
                r.associated_task.as_deref(),
                r.object_count,
                r.total_volume,
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![
            ("L1", Some("Biel - Rohbau 1 - L1"), 2, 30.0),
            ("L2", Some("Biel - Fassade - L2"), 1, 5.0),
        ]
    );
    assert_eq!(output.validation_summary.len(), 1);
    assert_eq!(output.validation_summary[0].reason, MATCH_FOUND);
    assert_eq!(output.validation_summary[0].count, 3);
}

#[test]
fn derived_guids_follow_catalogue_order() {
    let output = run_values(two_floor_elements(), two_trade_timeline());
    let derived: Vec<_> = output
        .final_schedule
        .iter()
        .filter(|t| !t.is_uploaded)
        .collect();

    assert_eq!(derived.len(), MEDIUM_CATALOGUE.len() * 2);
    for (offset, task) in derived.iter().enumerate() {
        assert_eq!(task.guid, Some(1 + offset as u64));
    }
    // Rohbau 1 is the second category.
    assert_eq!(derived[2].name.as_deref(), Some("Biel - Rohbau 1 - L1"));
    assert_eq!(output.elements[0].task_guid, Some(3));
    assert_eq!(output.elements[2].task_guid, Some(10));
}

#[test]
fn derived_guids_continue_after_uploaded_maximum() {
    let timeline = json!([
        {"guid": 5, "name": "Rohbau 1", "Start": "2024-01-01", "End": "2024-01-21"},
        {"guid": 17, "name": "Fassade", "Start": "2024-02-01", "End": "2024-02-11"}
    ]);
    let output = run_values(two_floor_elements(), timeline);
    let guids: Vec<u64> = output
        .final_schedule
        .iter()
        .filter(|t| !t.is_uploaded)
        .filter_map(|t| t.guid)
        .collect();
    let expected: Vec<u64> = (18..18 + guids.len() as u64).collect();
    assert_eq!(guids, expected);
}

#[test]
fn per_floor_durations_add_up_and_do_not_overlap() {
    let output = run_values(two_floor_elements(), two_trade_timeline());

    let mut totals: FxHashMap<&str, f64> = FxHashMap::default();
    for task in output.final_schedule.iter().filter(|t| !t.is_uploaded) {
        *totals.entry(task.simplified_task.as_str()).or_default() += task.duration_per_floor;
    }
    assert_relative_eq!(totals["Rohbau 1"], 20.0, epsilon = 1e-9);
    assert_relative_eq!(totals["Fassade"], 10.0, epsilon = 1e-9);
    assert_eq!(totals["Gipser"], 0.0);

    let rohbau: Vec<_> = output
        .final_schedule
        .iter()
        .filter(|t| t.simplified_task == "Rohbau 1")
        .collect();
    assert_eq!(rohbau.len(), 3);
    for pair in rohbau.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        assert!(a.start < a.end);
        assert_eq!(a.end, b.start);
    }
}

#[test]
fn validation_success_iff_task_resolved() {
    let elements = json!([
        {"ObjectID": "w1", "type": "IfcWall", "Floor": "L1", "Centroid Z (m)": 1.0},
        {"ObjectID": "d1", "type": "IfcDoor", "Floor": "L1", "Centroid Z (m)": 1.1},
        {"ObjectID": "p1", "type": "IfcBuildingElementProxy", "Floor": "L2", "Centroid Z (m)": 4.0},
        {"ObjectID": "x1", "Floor": "L2", "Centroid Z (m)": 4.2}
    ]);
    let output = run_values(elements, two_trade_timeline());

    assert_eq!(output.validation_records.len(), 4);
    for (element, record) in output.elements.iter().zip(&output.validation_records) {
        assert_eq!(element.object_id, record.object_id);
        assert_eq!(
            record.success,
            element.associated_task.is_some() && element.task_guid.is_some()
        );
        assert_eq!(record.reason == MATCH_FOUND, record.success);
    }
    // Doors have no uploaded duration, so their tasks are not eligible.
    assert_eq!(output.validation_records[1].reason, NO_MATCH);

    let total: usize = output.object_summary.iter().map(|r| r.object_count).sum();
    assert_eq!(total, 4);
}

#[test]
fn clustered_floors_rise_with_elevation() {
    let mut rows = Vec::new();
    for i in 0..300 {
        let storey = [6.0, 0.0, 3.0][i % 3];
        rows.push(json!({
            "ObjectID": format!("e{i}"),
            "type": "IfcSlab",
            "Centroid Z (m)": storey + (i as f64) * 1e-3,
        }));
    }
    let output = run_values(Value::Array(rows), two_trade_timeline());

    assert_eq!(
        output.floor_assignment.strategy,
        FloorStrategy::Clustered { clusters: 3 }
    );
    assert_eq!(output.floor_assignment.floors, vec!["Floor_1", "Floor_2", "Floor_3"]);
    assert_eq!(output.elements[0].floor_name, "Floor_3");
    assert_eq!(output.elements[1].floor_name, "Floor_1");
    assert_eq!(output.elements[2].floor_name, "Floor_2");
    let heights = &output.floor_assignment.floor_heights;
    for pair in heights.windows(2) {
        assert!(pair[0].max_height < pair[1].min_height);
    }
}

#[test]
fn every_element_gets_a_floor() {
    let elements = json!([
        {"ObjectID": "a", "type": "IfcWall", "Floor": "L1", "Centroid Z (m)": 1.0},
        {"ObjectID": "b", "type": "IfcWall", "Floor": "N/A", "Centroid Z (m)": 9.0},
        {"ObjectID": "c", "type": "IfcWall", "Floor": "L1"}
    ]);
    let output = run_values(elements, two_trade_timeline());
    let floors: Vec<&str> = output.elements.iter().map(|e| e.floor_name.as_str()).collect();
    assert_eq!(floors, vec!["L1", "Unknown", "Unknown"]);
}

#[test]
fn single_element_falls_back_to_default_floor() {
    let elements = json!([{"ObjectID": "a", "type": "IfcWall", "Centroid Z (m)": 1.0}]);
    let output = run_values(elements, two_trade_timeline());

    assert!(matches!(
        output.floor_assignment.strategy,
        FloorStrategy::Degraded {
            reason: DegradedReason::ClusteringFailed { .. }
        }
    ));
    assert_eq!(output.floor_assignment.floors, vec!["Default"]);
    assert_eq!(output.elements[0].floor_name, "Default");
    assert_eq!(
        output.elements[0].associated_task.as_deref(),
        Some("Biel - Rohbau 1 - Default")
    );
}

#[test]
fn missing_elevation_column_degrades() {
    let elements = json!([{"ObjectID": "a", "type": "IfcWall", "Floor": "L1"}]);
    let output = run_values(elements, two_trade_timeline());
    assert_eq!(
        output.floor_assignment.strategy,
        FloorStrategy::Degraded {
            reason: DegradedReason::MissingElevationColumn
        }
    );
    assert!(output.floor_assignment.floors.is_empty());
    assert!(output.final_schedule.iter().all(|t| t.is_uploaded));
    assert_eq!(output.validation_records[0].reason, NO_MATCH);
}

#[test]
fn calendar_overflow_fails_the_timeline_stage() {
    let timeline: Vec<Value> = (0..40)
        .map(|_| json!({"name": "Rohbau 1", "Start": "0001-01-01", "End": "9999-12-31"}))
        .collect();
    let elements = json!([
        {"ObjectID": "w1", "type": "IfcWall", "Floor": "L1", "Centroid Z (m)": 1.0, "Volume (m³)": 10.0}
    ]);
    let err = run_json(
        &bytes(elements),
        &bytes(Value::Array(timeline)),
        &PipelineConfig::default(),
        |_| {},
    )
    .unwrap_err();
    assert_eq!(err.kind(), "SCHEDULE_OVERFLOW");
    assert_eq!(err.stage(), Some(Stage::Timeline));
    assert!(err.is_input_shape());
}

#[test]
fn reruns_are_byte_identical() {
    let first = run_values(two_floor_elements(), two_trade_timeline());
    let second = run_values(two_floor_elements(), two_trade_timeline());
    assert_eq!(to_json(&first).unwrap(), to_json(&second).unwrap());
}

#[test]
fn serializes_the_public_field_names() {
    let output = run_values(two_floor_elements(), two_trade_timeline());
    let value = serde_json::to_value(&output).unwrap();

    for key in [
        "finalSchedule",
        "objectSummary",
        "endingTasks",
        "validationSummary",
        "ebkpSummary",
        "floorAssignment",
        "elements",
        "validationRecords",
    ] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["objectSummary"][0]["FloorName"], "L1");
    assert_eq!(value["objectSummary"][0]["objectCount"], 2);
    assert_eq!(value["validationRecords"][0]["Reason"], MATCH_FOUND);
    assert_eq!(value["floorAssignment"]["strategy"]["kind"], "declared");
    assert_eq!(value["finalSchedule"][0]["Start"], "2024-01-01T00:00:00");
}

fn sheet_row(id: &str, ty: &str, floor: &str, z: f64) -> RawRow {
    let mut row = RawRow::new();
    row.insert("objectId".into(), id.into());
    row.insert("ifc/Type".into(), ty.into());
    row.insert("Floor".into(), floor.into());
    row.insert("sv/Centroid/Z".into(), z.into());
    row.insert("sv/ConvexHullVolume".into(), CellValue::Number(2.0));
    row.insert("EBKP".into(), "C02.01".into());
    row.insert("Comment".into(), "dropped".into());
    row
}

#[test]
fn workbook_sheets_are_concatenated() {
    let workbook = InMemoryWorkbook::new()
        .with_sheet("Attributes_A", vec![sheet_row("a1", "IfcWall", "EG", 1.0)])
        .with_sheet("Summary", vec![sheet_row("s1", "IfcWall", "EG", 1.0)])
        .with_sheet(
            "Attributes_B",
            vec![
                sheet_row("b1", "IfcWall", "OG", 4.0),
                sheet_row("b2", "IfcWall", "EG", 1.5),
            ],
        );
    let timeline = Timeline::from_json_slice(
        &bytes(two_trade_timeline()),
        &PipelineConfig::default().timeline_sheet,
    )
    .unwrap();
    let output = run(
        &ElementSource::Workbook(workbook),
        &timeline,
        &PipelineConfig::default().with_building_name("Bern"),
    )
    .unwrap();

    let ids: Vec<&str> = output.elements.iter().map(|e| e.object_id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "b1", "b2"]);
    assert_eq!(output.floor_assignment.building, "Bern");
    assert_eq!(output.floor_assignment.floors, vec!["EG", "OG"]);
    assert_eq!(output.ebkp_summary.len(), 1);
    assert_eq!(output.ebkp_summary[0].floors[0].floor, "EG");
    assert_eq!(output.ebkp_summary[0].floors[0].total_volume, 4.0);
    assert!(output
        .elements
        .iter()
        .all(|e| e.building.as_deref() == Some("Bern")));
}
