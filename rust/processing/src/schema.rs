// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Canonical element schema and the normalizer that projects raw sources
//! onto it.
//!
//! Two source shapes are supported:
//!
//! - **Geometry rows** from the IFC extractor, using the extractor's column
//!   headers. They are renamed onto the canonical names and every other
//!   column is kept as a property value.
//! - **Workbooks** exported from a BIM platform. Multi-sheet workbooks are
//!   read sheet by sheet (in parallel) for every sheet whose name starts
//!   with the configured prefix, and only the allow-listed columns survive.

use crate::cell::{CellValue, RawRow};
use crate::element::{Element, ElementTable};
use crate::error::{Error, Result};
use crate::workbook::{InMemoryWorkbook, Workbook};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::collections::BTreeSet;

pub const OBJECT_ID: &str = "objectId";
pub const IFC_TYPE: &str = "ifc/Type";
pub const NAME: &str = "name";
pub const FLOOR: &str = "floor";
pub const BUILDING: &str = "Building";
pub const SOURCE_URI: &str = "sourceUri";
pub const PARENT_OBJECT_ID: &str = "parentObjectId";
pub const WORKSPACE_ID: &str = "workspaceId";
pub const EBKP: &str = "EBKP";
pub const CENTROID_X: &str = "sv/Centroid/X";
pub const CENTROID_Y: &str = "sv/Centroid/Y";
pub const CENTROID_Z: &str = "sv/Centroid/Z";
pub const CENTROID_W: &str = "sv/Centroid/W";
pub const VOLUME: &str = "sv/ConvexHullVolume";
pub const TOP_ELEVATION: &str = "Top Elevation (m)";
pub const BOTTOM_ELEVATION: &str = "Bottom Elevation (m)";
pub const ROW_INDEX: &str = "row_index";

/// Columns retained from workbook sheets; everything else is dropped.
pub const SPREADSHEET_COLUMNS: &[&str] = &[
    CENTROID_X,
    CENTROID_Y,
    CENTROID_Z,
    CENTROID_W,
    BUILDING,
    "Floor",
    FLOOR,
    SOURCE_URI,
    IFC_TYPE,
    OBJECT_ID,
    PARENT_OBJECT_ID,
    NAME,
    WORKSPACE_ID,
    VOLUME,
    TOP_ELEVATION,
    BOTTOM_ELEVATION,
    EBKP,
];

/// Extractor header → canonical column.
const GEOMETRY_RENAMES: &[(&str, &str)] = &[
    ("ObjectID", OBJECT_ID),
    ("type", IFC_TYPE),
    ("Name", NAME),
    ("Centroid X (m)", CENTROID_X),
    ("Centroid Y (m)", CENTROID_Y),
    ("Centroid Z (m)", CENTROID_Z),
    ("Volume (m³)", VOLUME),
];

/// Map alternative spellings onto the canonical column name.
fn canonical_column(column: &str) -> &str {
    match column {
        "Floor" => FLOOR,
        other => GEOMETRY_RENAMES
            .iter()
            .find(|(from, _)| *from == other)
            .map(|(_, to)| *to)
            .unwrap_or(other),
    }
}

/// An element source as handed to the pipeline.
#[derive(Debug, Clone)]
pub enum ElementSource {
    /// Rows produced by the IFC geometry extractor.
    Geometry(Vec<RawRow>),
    /// A spreadsheet export.
    Workbook(InMemoryWorkbook),
}

/// Accepted JSON layouts for element uploads.
#[derive(Deserialize)]
#[serde(untagged)]
enum SourceDocument {
    Rows(Vec<RawRow>),
    Geometry { rows: Vec<RawRow> },
    Workbook(InMemoryWorkbook),
}

impl ElementSource {
    /// Detect the source layout from a JSON document: a bare array or an
    /// object with `rows` is geometry output, an object with `sheets` is a
    /// workbook.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let doc: SourceDocument = serde_json::from_slice(bytes)?;
        Ok(match doc {
            SourceDocument::Rows(rows) | SourceDocument::Geometry { rows } => {
                ElementSource::Geometry(rows)
            }
            SourceDocument::Workbook(wb) => ElementSource::Workbook(wb),
        })
    }

    /// Normalize onto the canonical schema.
    pub fn load(&self, sheet_prefix: &str) -> Result<ElementTable> {
        match self {
            ElementSource::Geometry(rows) => normalize_geometry_rows(rows),
            ElementSource::Workbook(wb) => read_workbook(wb, sheet_prefix),
        }
    }
}

/// Normalize IFC extractor rows.
pub fn normalize_geometry_rows(rows: &[RawRow]) -> Result<ElementTable> {
    let mut columns = BTreeSet::new();
    let elements = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let renamed: RawRow = row
                .iter()
                .map(|(k, v)| (canonical_column(k).to_string(), v.clone()))
                .collect();
            columns.extend(renamed.keys().cloned());
            element_from_row(renamed, index, None)
        })
        .collect();
    finish(elements, columns)
}

/// Read the element sheets of a workbook.
///
/// A single-sheet workbook is read as-is. With several sheets, every sheet
/// whose name starts with `prefix` is read (in parallel) and the results are
/// concatenated; none matching is an error.
pub fn read_workbook<W: Workbook + ?Sized>(workbook: &W, prefix: &str) -> Result<ElementTable> {
    let names = workbook.sheet_names();
    let selected: Vec<String> = match names.len() {
        0 => return Err(Error::EmptyWorkbook),
        1 => names,
        _ => names
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect(),
    };
    if selected.is_empty() {
        return Err(Error::NoMatchingSheets {
            prefix: prefix.to_string(),
        });
    }

    let sheets = selected
        .par_iter()
        .map(|name| {
            workbook
                .read_sheet(name)
                .map(|rows| project_sheet(name, rows))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut columns = BTreeSet::new();
    let mut elements = Vec::new();
    for (sheet_columns, sheet_elements) in sheets {
        columns.extend(sheet_columns);
        elements.extend(sheet_elements);
    }

    tracing::debug!(
        sheets = selected.len(),
        rows = elements.len(),
        "Loaded workbook sheets"
    );
    finish(elements, columns)
}

/// Keep allow-listed columns of one sheet and build its elements.
fn project_sheet(sheet: &str, rows: Vec<RawRow>) -> (BTreeSet<String>, Vec<Element>) {
    let mut columns = BTreeSet::new();
    let elements = rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let projected: RawRow = row
                .into_iter()
                .filter(|(k, _)| SPREADSHEET_COLUMNS.contains(&k.as_str()))
                .map(|(k, v)| (canonical_column(&k).to_string(), v))
                .collect();
            columns.extend(projected.keys().cloned());
            element_from_row(projected, index, Some(sheet))
        })
        .collect();
    (columns, elements)
}

fn element_from_row(mut row: RawRow, row_index: usize, sheet: Option<&str>) -> Element {
    let mut take = |column: &str| row.remove(column).unwrap_or(CellValue::Null);

    let object_id = take(OBJECT_ID).as_text().unwrap_or_else(|| match sheet {
        Some(sheet) => format!("row-{sheet}-{row_index}"),
        None => format!("row-{row_index}"),
    });

    let mut element = Element {
        row_index,
        sheet: sheet.map(str::to_string),
        object_id,
        ifc_type: take(IFC_TYPE).as_text(),
        name: take(NAME).as_text(),
        declared_floor: take(FLOOR).as_label(),
        building: take(BUILDING).as_label(),
        source_uri: take(SOURCE_URI).as_text(),
        parent_object_id: take(PARENT_OBJECT_ID).as_text(),
        workspace_id: take(WORKSPACE_ID).as_text(),
        ebkp: take(EBKP).as_label(),
        centroid_x: take(CENTROID_X).as_f64(),
        centroid_y: take(CENTROID_Y).as_f64(),
        centroid_z: take(CENTROID_Z).as_f64(),
        centroid_w: take(CENTROID_W).as_f64(),
        bottom_elevation: take(BOTTOM_ELEVATION).as_f64(),
        top_elevation: take(TOP_ELEVATION).as_f64(),
        volume: take(VOLUME).as_f64(),
        ..Default::default()
    };
    row.remove(ROW_INDEX);
    element.properties = row;
    element
}

fn finish(elements: Vec<Element>, mut columns: BTreeSet<String>) -> Result<ElementTable> {
    if elements.is_empty() {
        return Err(Error::EmptyElements);
    }

    let mut seen = FxHashSet::default();
    for element in &elements {
        if !seen.insert(element.object_id.as_str()) {
            return Err(Error::DuplicateObjectId(element.object_id.clone()));
        }
    }

    columns.insert(ROW_INDEX.to_string());
    tracing::info!(
        elements = elements.len(),
        columns = columns.len(),
        "Normalized element source"
    );
    Ok(ElementTable::new(elements, columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, CellValue)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn geometry_rows_are_renamed() {
        let rows = vec![row(&[
            ("ObjectID", CellValue::Number(101.0)),
            ("type", "IfcWall".into()),
            ("Name", "Basic Wall".into()),
            ("floor", "N/A".into()),
            ("Building", "Tower".into()),
            ("Centroid Z (m)", "3.20".into()),
            ("Volume (m³)", "4.50".into()),
            ("Material", "Concrete".into()),
        ])];
        let table = normalize_geometry_rows(&rows).unwrap();
        let element = &table.elements()[0];

        assert_eq!(element.object_id, "101");
        assert_eq!(element.ifc_type.as_deref(), Some("IfcWall"));
        assert_eq!(element.name.as_deref(), Some("Basic Wall"));
        assert_eq!(element.declared_floor, None);
        assert_eq!(element.building.as_deref(), Some("Tower"));
        assert_eq!(element.centroid_z, Some(3.2));
        assert_eq!(element.volume, Some(4.5));
        assert_eq!(
            element.properties.get("Material"),
            Some(&CellValue::from("Concrete"))
        );
        assert!(table.has_column(CENTROID_Z));
        assert!(table.has_column(ROW_INDEX));
        assert!(!table.has_column(BOTTOM_ELEVATION));
    }

    #[test]
    fn single_sheet_is_read_regardless_of_name() {
        let wb = InMemoryWorkbook::new().with_sheet(
            "Export",
            vec![row(&[
                (OBJECT_ID, "a".into()),
                ("Floor", "L1".into()),
                ("Colour", "red".into()),
            ])],
        );
        let table = read_workbook(&wb, "Attributes").unwrap();
        let element = &table.elements()[0];
        assert_eq!(element.declared_floor.as_deref(), Some("L1"));
        assert!(table.has_column(FLOOR));
        assert!(!table.has_column("Colour"));
        assert!(element.properties.is_empty());
    }

    #[test]
    fn multi_sheet_concatenates_prefixed_sheets() {
        let wb = InMemoryWorkbook::new()
            .with_sheet(
                "Attributes 1",
                vec![
                    row(&[(OBJECT_ID, "a".into())]),
                    row(&[(OBJECT_ID, "b".into())]),
                ],
            )
            .with_sheet("Overview", vec![row(&[(OBJECT_ID, "x".into())])])
            .with_sheet("Attributes 2", vec![row(&[(OBJECT_ID, "c".into())])]);

        let table = read_workbook(&wb, "Attributes").unwrap();
        let ids: Vec<&str> = table.elements().iter().map(|e| e.object_id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains(&"x"));

        let c = table.elements().iter().find(|e| e.object_id == "c").unwrap();
        assert_eq!(c.row_index, 0);
        assert_eq!(c.sheet.as_deref(), Some("Attributes 2"));
    }

    #[test]
    fn multi_sheet_without_prefix_match_fails() {
        let wb = InMemoryWorkbook::new()
            .with_sheet("One", vec![row(&[(OBJECT_ID, "a".into())])])
            .with_sheet("Two", vec![row(&[(OBJECT_ID, "b".into())])]);
        assert!(matches!(
            read_workbook(&wb, "Attributes"),
            Err(Error::NoMatchingSheets { .. })
        ));
        assert!(matches!(
            read_workbook(&InMemoryWorkbook::new(), "Attributes"),
            Err(Error::EmptyWorkbook)
        ));
    }

    #[test]
    fn empty_and_duplicate_inputs_are_rejected() {
        assert!(matches!(
            normalize_geometry_rows(&[]),
            Err(Error::EmptyElements)
        ));
        let rows = vec![
            row(&[("ObjectID", "7".into())]),
            row(&[("ObjectID", CellValue::Number(7.0))]),
        ];
        assert!(matches!(
            normalize_geometry_rows(&rows),
            Err(Error::DuplicateObjectId(id)) if id == "7"
        ));
    }

    #[test]
    fn missing_object_id_falls_back_to_row_position() {
        let table = normalize_geometry_rows(&[RawRow::new(), RawRow::new()]).unwrap();
        assert_eq!(table.elements()[1].object_id, "row-1");
    }

    #[test]
    fn source_layout_detection() {
        let rows = ElementSource::from_json_slice(br#"[{"ObjectID": 1}]"#).unwrap();
        assert!(matches!(rows, ElementSource::Geometry(r) if r.len() == 1));

        let wrapped =
            ElementSource::from_json_slice(br#"{"source": "ifc", "rows": [{"ObjectID": 1}]}"#)
                .unwrap();
        assert!(matches!(wrapped, ElementSource::Geometry(_)));

        let wb = ElementSource::from_json_slice(
            br#"{"sheets": [{"name": "Attributes", "rows": []}]}"#,
        )
        .unwrap();
        assert!(matches!(wb, ElementSource::Workbook(_)));

        assert!(matches!(
            ElementSource::from_json_slice(b"42"),
            Err(Error::Json(_))
        ));
    }
}
