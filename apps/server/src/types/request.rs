// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request types for the API.

use serde::Deserialize;

/// Options sent alongside the uploads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessOptions {
    /// Skip cache lookup if true.
    #[serde(default)]
    pub skip_cache: bool,

    /// Task catalogue detail level ("medium").
    #[serde(default)]
    pub detail_level: Option<String>,

    /// Overrides the configured building name.
    #[serde(default)]
    pub building_name: Option<String>,
}

impl ProcessOptions {
    /// Apply one multipart text field. Unknown fields are ignored.
    pub fn set_field(&mut self, name: &str, value: &str) {
        let value = value.trim();
        match name {
            "skip_cache" => {
                self.skip_cache = matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
            }
            "detail_level" if !value.is_empty() => self.detail_level = Some(value.to_string()),
            "building_name" if !value.is_empty() => self.building_name = Some(value.to_string()),
            _ => {}
        }
    }
}

/// Both uploads of a processing request.
#[derive(Debug, Clone)]
pub struct ProcessUpload {
    /// Element source document (geometry rows or workbook JSON).
    pub elements: Vec<u8>,
    /// Timeline document (rows or workbook JSON).
    pub timeline: Vec<u8>,
    pub options: ProcessOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_form_fields() {
        let mut options = ProcessOptions::default();
        options.set_field("skip_cache", "TRUE");
        options.set_field("detail_level", " medium ");
        options.set_field("building_name", "");
        options.set_field("unrelated", "x");

        assert!(options.skip_cache);
        assert_eq!(options.detail_level.as_deref(), Some("medium"));
        assert_eq!(options.building_name, None);
    }
}
