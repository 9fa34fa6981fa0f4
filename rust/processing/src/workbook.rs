// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spreadsheet workbook abstraction.
//!
//! The pipeline never touches spreadsheet files directly. Anything that can
//! list its sheets and hand back rows of cells implements [`Workbook`]; the
//! bundled [`InMemoryWorkbook`] covers exports that arrive as JSON.

use crate::cell::RawRow;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Read-only access to the sheets of a workbook.
///
/// Implementations must be shareable across threads: multi-sheet reads are
/// fanned out to the rayon pool.
pub trait Workbook: Sync {
    /// Sheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    /// All rows of the named sheet.
    fn read_sheet(&self, name: &str) -> Result<Vec<RawRow>>;
}

/// A single named sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<RawRow>,
}

/// Workbook held entirely in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InMemoryWorkbook {
    pub sheets: Vec<Sheet>,
}

impl InMemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet, builder style.
    pub fn with_sheet(mut self, name: impl Into<String>, rows: Vec<RawRow>) -> Self {
        self.sheets.push(Sheet {
            name: name.into(),
            rows,
        });
        self
    }
}

impl Workbook for InMemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn read_sheet(&self, name: &str) -> Result<Vec<RawRow>> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.rows.clone())
            .ok_or_else(|| Error::SheetRead {
                sheet: name.to_string(),
                message: "sheet not found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_sheets_by_name() {
        let wb = InMemoryWorkbook::new()
            .with_sheet("Attributes 1", vec![RawRow::new()])
            .with_sheet("Summary", vec![]);
        assert_eq!(wb.sheet_names(), vec!["Attributes 1", "Summary"]);
        assert_eq!(wb.read_sheet("Attributes 1").unwrap().len(), 1);
        assert!(matches!(
            wb.read_sheet("Missing"),
            Err(Error::SheetRead { .. })
        ));
    }

    #[test]
    fn deserializes_from_json() {
        let wb: InMemoryWorkbook = serde_json::from_str(
            r#"{"sheets": [{"name": "Timeline", "rows": [{"name": "Aushub"}]}, {"name": "Empty"}]}"#,
        )
        .unwrap();
        assert_eq!(wb.sheets.len(), 2);
        assert!(wb.sheets[1].rows.is_empty());
    }
}
