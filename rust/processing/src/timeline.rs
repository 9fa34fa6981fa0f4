// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Uploaded construction timeline and the per-floor duration distributor.
//!
//! The uploaded timeline has one row per trade (or several). Derived
//! per-floor tasks are appended behind it, then each trade's total duration
//! is split evenly across the floors that carry it and the floors are laid
//! out back to back starting at the trade's earliest uploaded start.

use crate::cell::{serialize_timestamp, CellValue, RawRow};
use crate::error::{Error, Result};
use crate::tasks::{TaskRecord, NAME_SEPARATOR};
use crate::workbook::{InMemoryWorkbook, Workbook};
use chrono::{Duration, NaiveDateTime};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NAME: &str = "name";
pub const START: &str = "Start";
pub const END: &str = "End";
pub const GUID: &str = "guid";
pub const FLOOR: &str = "floor";

const SECONDS_PER_DAY: i64 = 86_400;
const MICROS_PER_DAY: f64 = 86_400_000_000.0;

/// One row of the uploaded timeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimelineRow {
    pub guid: Option<u64>,
    pub name: Option<String>,
    pub floor: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// Columns the pipeline does not interpret, passed through unchanged.
    pub extra: BTreeMap<String, CellValue>,
}

/// The uploaded base schedule.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Timeline {
    pub rows: Vec<TimelineRow>,
    /// Whether the upload carried a `guid` column at all.
    pub has_guid_column: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimelineDocument {
    Rows(Vec<RawRow>),
    Wrapped { rows: Vec<RawRow> },
    Workbook(InMemoryWorkbook),
}

impl Timeline {
    /// Parse raw rows. `name`, `Start` and `End` columns are required.
    pub fn from_rows(rows: Vec<RawRow>) -> Result<Self> {
        for column in [NAME, START, END] {
            if !rows.iter().any(|r| r.contains_key(column)) {
                return Err(Error::MissingColumn {
                    table: "timeline",
                    column: column.to_string(),
                });
            }
        }
        let has_guid_column = rows.iter().any(|r| r.contains_key(GUID));

        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(index, mut raw)| {
                let mut take = |column: &str| raw.remove(column).unwrap_or_default();
                let name = take(NAME).as_text();
                let floor = take(FLOOR).as_label();
                let guid = take(GUID).as_u64();
                let start = parse_time(take(START), index, START)?;
                let end = parse_time(take(END), index, END)?;
                Ok(TimelineRow {
                    guid,
                    name,
                    floor,
                    start,
                    end,
                    extra: raw,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(rows = rows.len(), has_guid_column, "Parsed timeline");
        Ok(Self {
            rows,
            has_guid_column,
        })
    }

    /// Read the timeline sheet of a workbook. A single-sheet workbook is
    /// used whatever its sheet is called.
    pub fn from_workbook<W: Workbook + ?Sized>(workbook: &W, sheet: &str) -> Result<Self> {
        let names = workbook.sheet_names();
        let chosen = match names.as_slice() {
            [] => return Err(Error::EmptyWorkbook),
            [only] => only.clone(),
            _ => sheet.to_string(),
        };
        Self::from_rows(workbook.read_sheet(&chosen)?)
    }

    /// Parse a JSON upload: a row array, `{ "rows": [...] }`, or a workbook.
    pub fn from_json_slice(bytes: &[u8], sheet: &str) -> Result<Self> {
        match serde_json::from_slice::<TimelineDocument>(bytes)? {
            TimelineDocument::Rows(rows) | TimelineDocument::Wrapped { rows } => {
                Self::from_rows(rows)
            }
            TimelineDocument::Workbook(wb) => Self::from_workbook(&wb, sheet),
        }
    }

    /// First GUID for derived tasks: one past the largest uploaded GUID, or
    /// 1 when the upload has no GUIDs.
    pub fn next_guid(&self) -> u64 {
        if !self.has_guid_column {
            return 1;
        }
        self.rows
            .iter()
            .filter_map(|r| r.guid)
            .max()
            .map_or(1, |max| max + 1)
    }
}

fn parse_time(cell: CellValue, row: usize, column: &str) -> Result<Option<NaiveDateTime>> {
    cell.as_timestamp().map_err(|value| Error::InvalidTimestamp {
        row,
        column: column.to_string(),
        value,
    })
}

/// One row of the working schedule: an uploaded row or a derived task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleTask {
    pub guid: Option<u64>,
    pub name: Option<String>,
    pub floor: Option<String>,
    #[serde(rename = "Start", serialize_with = "serialize_timestamp")]
    pub start: Option<NaiveDateTime>,
    #[serde(rename = "End", serialize_with = "serialize_timestamp")]
    pub end: Option<NaiveDateTime>,
    /// Whole days between the uploaded start and end.
    #[serde(rename = "Duration")]
    pub duration_days: Option<i64>,
    #[serde(rename = "Building")]
    pub building: String,
    #[serde(rename = "Simplified_Task")]
    pub simplified_task: String,
    #[serde(rename = "Duration_Per_Floor")]
    pub duration_per_floor: f64,
    #[serde(rename = "HasElements")]
    pub has_elements: bool,
    /// True for rows that came from the uploaded timeline.
    #[serde(rename = "isNew")]
    pub is_uploaded: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, CellValue>,
}

impl ScheduleTask {
    fn uploaded(row: &TimelineRow) -> Self {
        Self {
            guid: row.guid,
            name: row.name.clone(),
            floor: row.floor.clone(),
            start: row.start,
            end: row.end,
            duration_days: whole_days(row.start, row.end),
            building: String::new(),
            simplified_task: String::new(),
            duration_per_floor: 0.0,
            has_elements: false,
            is_uploaded: true,
            extra: row.extra.clone(),
        }
    }

    fn derived(record: &TaskRecord) -> Self {
        Self {
            guid: Some(record.guid),
            name: Some(record.name.clone()),
            floor: Some(record.floor.clone()),
            start: None,
            end: None,
            duration_days: None,
            building: String::new(),
            simplified_task: String::new(),
            duration_per_floor: 0.0,
            has_elements: false,
            is_uploaded: false,
            extra: BTreeMap::new(),
        }
    }
}

/// Whole days between two timestamps, rounded toward negative infinity.
fn whole_days(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Option<i64> {
    match (start, end) {
        (Some(s), Some(e)) => Some((e - s).num_seconds().div_euclid(SECONDS_PER_DAY)),
        _ => None,
    }
}

/// Trade segment of a composite task name: the second `" - "` part, or the
/// whole name when there is no separator.
pub fn simplified_task(name: Option<&str>) -> String {
    match name {
        Some(name) => name
            .split(NAME_SEPARATOR)
            .nth(1)
            .unwrap_or(name)
            .to_string(),
        None => String::new(),
    }
}

fn building_of(name: Option<&str>) -> String {
    name.filter(|n| n.contains(NAME_SEPARATOR))
        .and_then(|n| n.split(NAME_SEPARATOR).next())
        .unwrap_or_default()
        .to_string()
}

/// Uploaded rows followed by derived tasks, in that order.
pub fn combine(timeline: &Timeline, derived: &[TaskRecord]) -> Vec<ScheduleTask> {
    timeline
        .rows
        .iter()
        .map(ScheduleTask::uploaded)
        .chain(derived.iter().map(ScheduleTask::derived))
        .collect()
}

/// Distribute each trade's uploaded duration across its floors and lay the
/// floors out sequentially.
///
/// Rows whose per-floor duration is not positive get no dates and are not
/// eligible for element matching. A trade whose layout runs past the last
/// representable date fails with [`Error::ScheduleOverflow`].
pub fn distribute_durations(
    mut tasks: Vec<ScheduleTask>,
    default_start: NaiveDateTime,
) -> Result<Vec<ScheduleTask>> {
    for task in &mut tasks {
        task.simplified_task = simplified_task(task.name.as_deref());
        task.building = building_of(task.name.as_deref());
    }

    // Per trade: duration per floor and the earliest uploaded start.
    let (per_floor, seeds) = {
        let mut total_days: FxHashMap<&str, i64> = FxHashMap::default();
        let mut earliest: FxHashMap<&str, NaiveDateTime> = FxHashMap::default();
        let mut floors: FxHashMap<&str, FxHashSet<&str>> = FxHashMap::default();
        for task in &tasks {
            let key = task.simplified_task.as_str();
            if task.is_uploaded {
                if let Some(days) = task.duration_days {
                    let total = total_days.entry(key).or_insert(0);
                    *total = total.saturating_add(days);
                }
                if let Some(start) = task.start {
                    earliest
                        .entry(key)
                        .and_modify(|e| *e = (*e).min(start))
                        .or_insert(start);
                }
            }
            let seen = floors.entry(key).or_default();
            if let Some(floor) = task.floor.as_deref() {
                seen.insert(floor);
            }
        }

        let per_floor: FxHashMap<String, f64> = floors
            .iter()
            .map(|(key, set)| {
                let total = total_days.get(key).copied().unwrap_or(0) as f64;
                let value = if set.is_empty() {
                    0.0
                } else {
                    total / set.len() as f64
                };
                (key.to_string(), value)
            })
            .collect();
        let seeds: FxHashMap<String, NaiveDateTime> = earliest
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        (per_floor, seeds)
    };

    let mut cursors: FxHashMap<String, NaiveDateTime> = FxHashMap::default();
    for task in &mut tasks {
        let duration = per_floor
            .get(&task.simplified_task)
            .copied()
            .unwrap_or(0.0);
        task.duration_per_floor = duration;
        task.has_elements = duration > 0.0;

        if !task.has_elements {
            task.start = None;
            task.end = None;
            continue;
        }
        let cursor = cursors
            .entry(task.simplified_task.clone())
            .or_insert_with(|| {
                seeds
                    .get(&task.simplified_task)
                    .copied()
                    .unwrap_or(default_start)
            });
        let start = *cursor;
        let end = offset(start, duration).ok_or_else(|| Error::ScheduleOverflow {
            task: task
                .name
                .clone()
                .unwrap_or_else(|| task.simplified_task.clone()),
        })?;
        *cursor = end;
        task.start = Some(start);
        task.end = Some(end);
    }

    let scheduled = tasks.iter().filter(|t| t.has_elements).count();
    tracing::info!(
        rows = tasks.len(),
        scheduled,
        trades = per_floor.len(),
        "Distributed timeline durations"
    );
    Ok(tasks)
}

/// `start` moved forward by `days`, or `None` outside the calendar range.
fn offset(start: NaiveDateTime, days: f64) -> Option<NaiveDateTime> {
    let micros = (days * MICROS_PER_DAY).round();
    if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
        return None;
    }
    start.checked_add_signed(Duration::microseconds(micros as i64))
}
