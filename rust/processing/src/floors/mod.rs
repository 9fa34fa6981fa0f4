// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Floor assignment engine.
//!
//! Every element receives a floor label. When the source declares floors,
//! those declarations are kept wherever the element's centroid lies inside
//! the declared floor's elevation envelope; other elements are re-tested
//! against every envelope and fall back to [`UNKNOWN_FLOOR`]. Without usable
//! declarations the centroid elevations are clustered and the clusters are
//! named `Floor_1..Floor_k` from the lowest up.
//!
//! The engine never fails. Inputs it cannot work with produce a degraded
//! result whose [`FloorStrategy`] says why.

pub mod cluster;
pub mod ranges;

pub use cluster::{cluster_count, kmeans_1d, ClusterError, Clustering};
pub use ranges::{FloorHeight, FloorHeightRange, FloorRanges};

use crate::element::{Element, ElementTable, DEFAULT_FLOOR, UNKNOWN_FLOOR};
use crate::schema::{BOTTOM_ELEVATION, CENTROID_Z, FLOOR, TOP_ELEVATION};
use serde::Serialize;

/// Half-height assumed for elements without declared elevations.
const DEFAULT_HALF_HEIGHT: f64 = 0.5;

/// How floors were determined for a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FloorStrategy {
    /// Declared floor metadata, corrected by elevation containment.
    Declared,
    /// Elevation clustering into `clusters` floors.
    Clustered { clusters: usize },
    /// A fallback result; see the reason.
    Degraded { reason: DegradedReason },
}

/// Why the engine produced a degraded result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum DegradedReason {
    /// No elements at all.
    EmptyInput,
    /// The source has no centroid elevation column.
    MissingElevationColumn,
    /// The column exists but no element has a finite elevation.
    NoElevations,
    /// Clustering could not run; everything sits on one default floor.
    ClusteringFailed { message: String },
}

/// Errors that make the declared-floor path unusable.
#[derive(Debug, thiserror::Error)]
enum DeclaredFloorError {
    #[error("floor '{0}' has a non-finite elevation envelope")]
    NonFiniteRange(String),
}

/// Building-level floor metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloorMetadata {
    #[serde(rename = "Building")]
    pub building: String,
    pub floors: Vec<String>,
}

/// Building name → ordered floor names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildingFloors(Vec<(String, Vec<String>)>);

impl BuildingFloors {
    pub fn single(building: impl Into<String>, floors: Vec<String>) -> Self {
        Self(vec![(building.into(), floors)])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(b, f)| (b.as_str(), f.as_slice()))
    }

    /// Total number of (building, floor) pairs.
    pub fn pair_count(&self) -> usize {
        self.0.iter().map(|(_, f)| f.len()).sum()
    }

    pub fn floors_of(&self, building: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(b, _)| b == building)
            .map(|(_, f)| f.as_slice())
    }
}

/// Output of the floor assignment engine.
#[derive(Debug, Clone)]
pub struct FloorAssignment {
    /// Elements with `floor_name` and `building` set.
    pub elements: Vec<Element>,
    pub metadata: FloorMetadata,
    pub floor_heights: Vec<FloorHeight>,
    pub building_floors: BuildingFloors,
    pub strategy: FloorStrategy,
}

impl FloorAssignment {
    /// Per-element floor labels in element order.
    pub fn labels(&self) -> Vec<&str> {
        self.elements.iter().map(Element::floor_label).collect()
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.strategy, FloorStrategy::Degraded { .. })
    }
}

/// Assign a floor to every element of `table`, stamping `building` on all.
pub fn assign_floors(table: ElementTable, building: &str) -> FloorAssignment {
    tracing::debug!(elements = table.len(), "Starting floor assignment");

    if table.is_empty() {
        tracing::error!("Floor assignment received an empty element table");
        return degenerate(Vec::new(), building, DegradedReason::EmptyInput);
    }

    let has_floor_column = table.has_column(FLOOR);
    let missing_bottom = !table.has_column(BOTTOM_ELEVATION);
    let missing_top = !table.has_column(TOP_ELEVATION);
    if !table.has_column(CENTROID_Z) {
        tracing::error!(
            column = CENTROID_Z,
            columns = ?table.columns(),
            "Required elevation column not found"
        );
        let (elements, _) = table.into_parts();
        return degenerate(elements, building, DegradedReason::MissingElevationColumn);
    }

    let (mut elements, _) = table.into_parts();
    let without_z = elements.iter().filter(|e| e.elevation().is_none()).count();
    if without_z > 0 {
        tracing::debug!(count = without_z, "Elements without centroid elevation");
    }
    if without_z == elements.len() {
        tracing::error!("No element has a usable centroid elevation");
        return degenerate(elements, building, DegradedReason::NoElevations);
    }

    if missing_bottom || missing_top {
        tracing::warn!(
            missing_bottom,
            missing_top,
            "Missing elevation columns, deriving from centroid"
        );
        backfill_elevations(&mut elements, missing_bottom, missing_top);
    }

    let has_declared = has_floor_column && elements.iter().any(|e| e.declared_floor.is_some());
    let assignment = if has_declared {
        tracing::debug!("Using declared floor data");
        match assign_declared(&mut elements) {
            Ok(ranges) => {
                let floors = ranges.sorted_by_height();
                let heights = ranges.table(&floors);
                finish(elements, building, floors, heights, FloorStrategy::Declared)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Declared floors unusable, falling back to clustering");
                assign_clustered(elements, building)
            }
        }
    } else {
        tracing::debug!("Floor data missing, using clustering for floor assignment");
        assign_clustered(elements, building)
    };

    let unknown = assignment
        .elements
        .iter()
        .filter(|e| e.floor_label() == UNKNOWN_FLOOR)
        .count();
    tracing::info!(
        floors = assignment.metadata.floors.len(),
        unknown,
        strategy = ?assignment.strategy,
        "Floor assignment complete"
    );
    assignment
}

fn backfill_elevations(elements: &mut [Element], bottom: bool, top: bool) {
    for element in elements.iter_mut() {
        let Some(z) = element.elevation() else {
            continue;
        };
        if bottom {
            element.bottom_elevation = Some(z - DEFAULT_HALF_HEIGHT);
        }
        if top {
            element.top_elevation = Some(z + DEFAULT_HALF_HEIGHT);
        }
    }
}

/// Declared-floor path. Returns the envelopes of the declared floors.
fn assign_declared(elements: &mut [Element]) -> Result<FloorRanges, DeclaredFloorError> {
    let ranges = FloorRanges::collect(elements.iter().filter(|e| e.elevation().is_some()).filter_map(
        |e| {
            e.declared_floor
                .as_deref()
                .map(|f| (f, e.bottom_elevation, e.top_elevation))
        },
    ));
    if let Some((floor, _)) = ranges.iter().find(|(_, r)| !r.is_finite()) {
        return Err(DeclaredFloorError::NonFiniteRange(floor.to_string()));
    }
    tracing::debug!(floors = ranges.len(), "Built declared floor ranges");

    for element in elements.iter_mut() {
        let label = match element.elevation() {
            None => UNKNOWN_FLOOR.to_string(),
            Some(z) => {
                let declared = element
                    .declared_floor
                    .as_deref()
                    .filter(|f| ranges.get(f).is_some_and(|r| r.contains(z)));
                declared
                    .or_else(|| ranges.locate(z))
                    .unwrap_or(UNKNOWN_FLOOR)
                    .to_string()
            }
        };
        element.floor_name = Some(label);
    }
    Ok(ranges)
}

/// Clustering path, including its own degraded fallback.
fn assign_clustered(mut elements: Vec<Element>, building: &str) -> FloorAssignment {
    let indexed: Vec<(usize, f64)> = elements
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.elevation().map(|z| (i, z)))
        .collect();
    let values: Vec<f64> = indexed.iter().map(|(_, z)| *z).collect();
    let k = cluster_count(values.len());
    tracing::debug!(clusters = k, samples = values.len(), "Clustering centroid elevations");

    let clustering = match kmeans_1d(&values, k) {
        Ok(c) => c,
        Err(err) => {
            tracing::error!(error = %err, "Clustering failed, assigning default floor");
            for element in &mut elements {
                element.floor_name = Some(DEFAULT_FLOOR.to_string());
                element.building = Some(building.to_string());
            }
            return FloorAssignment {
                elements,
                metadata: FloorMetadata {
                    building: building.to_string(),
                    floors: vec![DEFAULT_FLOOR.to_string()],
                },
                floor_heights: Vec::new(),
                building_floors: BuildingFloors::single(building, vec![DEFAULT_FLOOR.to_string()]),
                strategy: FloorStrategy::Degraded {
                    reason: DegradedReason::ClusteringFailed {
                        message: err.to_string(),
                    },
                },
            };
        }
    };

    let mut names = vec![String::new(); k];
    for (rank, cluster) in clustering.rank_by_center().into_iter().enumerate() {
        names[cluster] = format!("Floor_{}", rank + 1);
    }

    for element in &mut elements {
        element.floor_name = Some(UNKNOWN_FLOOR.to_string());
    }
    for ((index, _), cluster) in indexed.iter().zip(&clustering.labels) {
        elements[*index].floor_name = Some(names[*cluster].clone());
    }

    let ranges = FloorRanges::collect(
        elements
            .iter()
            .filter(|e| e.elevation().is_some())
            .map(|e| (e.floor_label(), e.bottom_elevation, e.top_elevation)),
    );
    let floors = ranges.sorted_by_height();
    let heights = ranges.table(&floors);
    finish(
        elements,
        building,
        floors,
        heights,
        FloorStrategy::Clustered { clusters: k },
    )
}

fn finish(
    mut elements: Vec<Element>,
    building: &str,
    floors: Vec<String>,
    floor_heights: Vec<FloorHeight>,
    strategy: FloorStrategy,
) -> FloorAssignment {
    for element in &mut elements {
        element.building = Some(building.to_string());
    }
    FloorAssignment {
        elements,
        metadata: FloorMetadata {
            building: building.to_string(),
            floors: floors.clone(),
        },
        floor_heights,
        building_floors: BuildingFloors::single(building, floors),
        strategy,
    }
}

fn degenerate(mut elements: Vec<Element>, building: &str, reason: DegradedReason) -> FloorAssignment {
    for element in &mut elements {
        element.floor_name = Some(UNKNOWN_FLOOR.to_string());
        element.building = Some(building.to_string());
    }
    FloorAssignment {
        elements,
        metadata: FloorMetadata {
            building: building.to_string(),
            floors: Vec::new(),
        },
        floor_heights: Vec::new(),
        building_floors: BuildingFloors::single(building, Vec::new()),
        strategy: FloorStrategy::Degraded { reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CENTROID_Z, OBJECT_ID};
    use std::collections::BTreeSet;

    fn columns(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn element(id: &str, floor: Option<&str>, z: Option<f64>) -> Element {
        Element {
            declared_floor: floor.map(str::to_string),
            centroid_z: z,
            ..Element::new(id)
        }
    }

    #[test]
    fn empty_input_is_degenerate() {
        let result = assign_floors(ElementTable::default(), "Biel");
        assert!(result.elements.is_empty());
        assert!(result.metadata.floors.is_empty());
        assert_eq!(
            result.strategy,
            FloorStrategy::Degraded {
                reason: DegradedReason::EmptyInput
            }
        );
        assert_eq!(result.building_floors.floors_of("Biel"), Some(&[][..]));
    }

    #[test]
    fn missing_elevation_column_labels_unknown() {
        let table = ElementTable::new(
            vec![element("a", Some("L1"), None)],
            columns(&[OBJECT_ID, FLOOR]),
        );
        let result = assign_floors(table, "Biel");
        assert_eq!(result.labels(), vec![UNKNOWN_FLOOR]);
        assert_eq!(result.elements[0].building.as_deref(), Some("Biel"));
        assert_eq!(
            result.strategy,
            FloorStrategy::Degraded {
                reason: DegradedReason::MissingElevationColumn
            }
        );
    }

    #[test]
    fn declared_floors_are_kept_or_corrected() {
        let mk = |id: &str, floor: Option<&str>, z: f64, bottom: f64, top: f64| Element {
            bottom_elevation: Some(bottom),
            top_elevation: Some(top),
            ..element(id, floor, Some(z))
        };
        let elements = vec![
            mk("a", Some("EG"), 1.5, 0.0, 3.0),
            mk("b", Some("OG1"), 4.5, 3.0, 6.0),
            // Declared EG without an envelope of its own, at OG1 height.
            Element {
                bottom_elevation: None,
                top_elevation: None,
                ..element("c", Some("EG"), Some(5.0))
            },
            // No declaration, inside EG.
            mk("d", None, 1.0, 0.8, 1.2),
            // Above everything.
            mk("e", Some("OG1"), 40.0, 39.0, 41.0),
        ];
        let table = ElementTable::new(
            elements,
            columns(&[OBJECT_ID, FLOOR, CENTROID_Z, BOTTOM_ELEVATION, TOP_ELEVATION]),
        );
        let result = assign_floors(table, "Biel");

        assert_eq!(result.strategy, FloorStrategy::Declared);
        // "e" stretches OG1's envelope up to 41 m, so it stays on OG1.
        assert_eq!(result.labels(), vec!["EG", "OG1", "OG1", "EG", "OG1"]);
        assert_eq!(result.metadata.floors, vec!["EG", "OG1"]);
        assert_eq!(result.floor_heights[0].min_height, Some(0.0));
        assert_eq!(result.floor_heights[0].max_height, Some(3.0));
        assert_eq!(result.floor_heights[1].max_height, Some(41.0));
    }

    #[test]
    fn elevation_outside_all_ranges_is_unknown() {
        let table = ElementTable::new(
            vec![
                element("a", Some("EG"), Some(1.0)),
                element("b", Some("OG1"), Some(4.0)),
                element("c", None, Some(2.0)),
                element("d", Some("EG"), None),
            ],
            columns(&[OBJECT_ID, FLOOR, CENTROID_Z]),
        );
        let result = assign_floors(table, "Biel");
        // Envelopes are synthesized as z ± 0.5: EG [0.5, 1.5], OG1 [3.5, 4.5].
        assert_eq!(result.labels(), vec!["EG", "OG1", UNKNOWN_FLOOR, UNKNOWN_FLOOR]);
        assert_eq!(result.elements[2].bottom_elevation, Some(1.5));
        assert_eq!(result.elements[3].bottom_elevation, None);
    }

    #[test]
    fn blank_floor_column_falls_back_to_clustering() {
        let mut elements = Vec::new();
        for i in 0..30 {
            let z = if i % 2 == 0 { 0.5 } else { 3.5 } + (i as f64) * 0.001;
            elements.push(element(&format!("e{i}"), None, Some(z)));
        }
        let table = ElementTable::new(elements, columns(&[OBJECT_ID, FLOOR, CENTROID_Z]));
        let result = assign_floors(table, "Biel");

        assert_eq!(result.strategy, FloorStrategy::Clustered { clusters: 2 });
        assert_eq!(result.metadata.floors, vec!["Floor_1", "Floor_2"]);
        assert_eq!(result.elements[0].floor_name.as_deref(), Some("Floor_1"));
        assert_eq!(result.elements[1].floor_name.as_deref(), Some("Floor_2"));
    }

    #[test]
    fn non_finite_declared_range_falls_back_to_clustering() {
        let table = ElementTable::new(
            vec![
                Element {
                    bottom_elevation: Some(f64::NEG_INFINITY),
                    top_elevation: Some(1.0),
                    ..element("a", Some("EG"), Some(0.5))
                },
                Element {
                    bottom_elevation: Some(3.0),
                    top_elevation: Some(4.0),
                    ..element("b", Some("OG1"), Some(3.5))
                },
            ],
            columns(&[OBJECT_ID, FLOOR, CENTROID_Z, BOTTOM_ELEVATION, TOP_ELEVATION]),
        );
        let result = assign_floors(table, "Biel");
        assert_eq!(result.strategy, FloorStrategy::Clustered { clusters: 2 });
        assert_eq!(result.labels(), vec!["Floor_1", "Floor_2"]);
    }

    #[test]
    fn single_element_degrades_to_default_floor() {
        let table = ElementTable::new(
            vec![element("a", None, Some(2.0))],
            columns(&[OBJECT_ID, CENTROID_Z]),
        );
        let result = assign_floors(table, "Biel");
        assert!(result.is_degraded());
        assert_eq!(result.labels(), vec![DEFAULT_FLOOR]);
        assert_eq!(result.metadata.floors, vec![DEFAULT_FLOOR]);
        assert!(matches!(
            result.strategy,
            FloorStrategy::Degraded {
                reason: DegradedReason::ClusteringFailed { .. }
            }
        ));
    }

    #[test]
    fn clustered_labels_follow_elevation() {
        let heights = [9.0, 0.0, 6.0, 3.0];
        let mut elements = Vec::new();
        for i in 0..400 {
            let z = heights[i % 4] + (i as f64) * 1e-4;
            elements.push(element(&format!("e{i}"), None, Some(z)));
        }
        let table = ElementTable::new(elements, columns(&[OBJECT_ID, CENTROID_Z]));
        let result = assign_floors(table, "Biel");

        assert_eq!(result.strategy, FloorStrategy::Clustered { clusters: 4 });
        assert_eq!(
            &result.labels()[..4],
            &["Floor_4", "Floor_1", "Floor_3", "Floor_2"]
        );
        assert_eq!(
            result.metadata.floors,
            vec!["Floor_1", "Floor_2", "Floor_3", "Floor_4"]
        );
        for pair in result.floor_heights.windows(2) {
            assert!(pair[0].min_height < pair[1].min_height);
        }
    }
}
