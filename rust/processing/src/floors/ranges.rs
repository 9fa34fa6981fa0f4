// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-floor elevation envelopes.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Lowest bottom and highest top elevation observed on one floor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FloorHeightRange {
    pub min_bottom: Option<f64>,
    pub max_top: Option<f64>,
}

impl FloorHeightRange {
    fn include(&mut self, bottom: Option<f64>, top: Option<f64>) {
        if let Some(b) = bottom.filter(|b| !b.is_nan()) {
            self.min_bottom = Some(self.min_bottom.map_or(b, |m| m.min(b)));
        }
        if let Some(t) = top.filter(|t| !t.is_nan()) {
            self.max_top = Some(self.max_top.map_or(t, |m| m.max(t)));
        }
    }

    /// Inclusive containment test; ranges with a missing bound contain nothing.
    pub fn contains(&self, z: f64) -> bool {
        match (self.min_bottom, self.max_top) {
            (Some(lo), Some(hi)) => lo <= z && z <= hi,
            _ => false,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.min_bottom.map_or(true, f64::is_finite) && self.max_top.map_or(true, f64::is_finite)
    }
}

/// Row of the floor heights table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorHeight {
    pub floor_name: String,
    pub min_height: Option<f64>,
    pub max_height: Option<f64>,
}

/// Floor label → elevation envelope, iterated in label order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FloorRanges(BTreeMap<String, FloorHeightRange>);

impl FloorRanges {
    /// Aggregate `(floor, bottom, top)` observations.
    pub fn collect<'a, I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<f64>, Option<f64>)>,
    {
        let mut ranges: BTreeMap<String, FloorHeightRange> = BTreeMap::new();
        for (floor, bottom, top) in observations {
            match ranges.get_mut(floor) {
                Some(range) => range.include(bottom, top),
                None => {
                    let mut range = FloorHeightRange::default();
                    range.include(bottom, top);
                    ranges.insert(floor.to_string(), range);
                }
            }
        }
        Self(ranges)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, floor: &str) -> Option<&FloorHeightRange> {
        self.0.get(floor)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FloorHeightRange)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// First floor (in label order) whose envelope contains `z`.
    pub fn locate(&self, z: f64) -> Option<&str> {
        self.iter()
            .find(|(_, range)| range.contains(z))
            .map(|(floor, _)| floor)
    }

    /// Floor labels ordered by ascending minimum height. Floors without a
    /// minimum sort last; ties keep label order.
    pub fn sorted_by_height(&self) -> Vec<String> {
        let mut floors: Vec<(&str, Option<f64>)> =
            self.iter().map(|(f, r)| (f, r.min_bottom)).collect();
        floors.sort_by(|a, b| match (a.1, b.1) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        floors.into_iter().map(|(f, _)| f.to_string()).collect()
    }

    /// Heights table in the given floor order.
    pub fn table(&self, order: &[String]) -> Vec<FloorHeight> {
        order
            .iter()
            .filter_map(|floor| {
                self.get(floor).map(|r| FloorHeight {
                    floor_name: floor.clone(),
                    min_height: r.min_bottom,
                    max_height: r.max_top,
                })
            })
            .collect()
    }
}
