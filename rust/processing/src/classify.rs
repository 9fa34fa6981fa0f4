// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Element classification: an ordered rule table mapping elements to task
//! categories.
//!
//! Rules are evaluated top to bottom and the first matching rule decides the
//! category. Deployments can replace the table with their own JSON file:
//!
//! ```json
//! [
//!   { "when": { "kind": "ifc_type", "value": "IfcWall" }, "category": "Rohbau 1" },
//!   { "when": { "kind": "source_uri_contains", "value": "F03" }, "category": "Fassade" }
//! ]
//! ```

use crate::element::Element;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Condition under which a rule applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RulePredicate {
    /// IFC type equals the value, ignoring case.
    IfcType(String),
    /// Source URI contains the value.
    SourceUriContains(String),
    /// Element name contains the value, ignoring case.
    NameContains(String),
}

impl RulePredicate {
    pub fn matches(&self, element: &Element) -> bool {
        match self {
            RulePredicate::IfcType(ty) => element
                .ifc_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case(ty)),
            RulePredicate::SourceUriContains(fragment) => element
                .source_uri
                .as_deref()
                .is_some_and(|uri| uri.contains(fragment.as_str())),
            RulePredicate::NameContains(fragment) => element
                .name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&fragment.to_lowercase())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub when: RulePredicate,
    pub category: String,
}

impl ClassificationRule {
    pub fn new(when: RulePredicate, category: impl Into<String>) -> Self {
        Self {
            when,
            category: category.into(),
        }
    }
}

const IFC_TYPE_RULES: &[(&str, &str)] = &[
    ("IfcWall", "Rohbau 1"),
    ("IfcWallStandardCase", "Rohbau 1"),
    ("IfcSlab", "Rohbau 1"),
    ("IfcColumn", "Rohbau 1"),
    ("IfcBeam", "Rohbau 2"),
    ("IfcStair", "Rohbau 2"),
    ("IfcStairFlight", "Rohbau 2"),
    ("IfcRamp", "Rohbau 2"),
    ("IfcRampFlight", "Rohbau 2"),
    ("IfcCurtainWall", "Fassade"),
    ("IfcPlate", "Fassade"),
    ("IfcWindow", "Fensterbau"),
    ("IfcDoor", "Türen"),
    ("IfcCovering", "Bodenbelag"),
    ("IfcFurnishingElement", "Möbel"),
    ("IfcFurniture", "Möbel"),
    ("IfcMember", "Holzbau"),
    ("IfcRoof", "Holzbau"),
    ("IfcFooting", "Aushub"),
    ("IfcPile", "Aushub"),
    ("IfcFlowSegment", "Haustechnik"),
    ("IfcFlowFitting", "Haustechnik"),
    ("IfcFlowTerminal", "Haustechnik"),
    ("IfcFlowController", "Haustechnik"),
    ("IfcRailing", "Gipser"),
];

/// Discipline codes embedded in model file names.
const DISCIPLINE_RULES: &[(&str, &str)] = &[
    ("GAS", "Sanitär"),
    ("KAN", "Sanitär"),
    ("WKL", "Sanitär"),
    ("F03", "Fassade"),
    ("F45", "Sprinkler"),
    ("F20", "Heizung Kälte"),
    ("F40", "Sanitär"),
    ("F50", "Elektro"),
    ("F30", "Lüftung"),
    ("EBK", "Lüftung"),
    ("BST", "Rohbau 1"),
    ("TWM", "Rohbau 1"),
    ("SZH", "Haustechnik"),
];

/// Ordered classification rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
}

impl Default for Classifier {
    /// The IFC-type lookup table.
    fn default() -> Self {
        Self::new(
            IFC_TYPE_RULES
                .iter()
                .map(|(ty, category)| {
                    ClassificationRule::new(RulePredicate::IfcType(ty.to_string()), *category)
                })
                .collect(),
        )
    }
}

impl Classifier {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// A classifier that maps nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Load a rule table from JSON.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Put the source-URI discipline rules ahead of the existing rules.
    pub fn with_discipline_rules(mut self) -> Self {
        let mut rules: Vec<ClassificationRule> = DISCIPLINE_RULES
            .iter()
            .map(|(code, category)| {
                ClassificationRule::new(RulePredicate::SourceUriContains(code.to_string()), *category)
            })
            .collect();
        rules.append(&mut self.rules);
        self.rules = rules;
        self
    }

    /// Append a rule at the lowest priority.
    pub fn push(&mut self, rule: ClassificationRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Category of the first rule matching `element`.
    pub fn classify(&self, element: &Element) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.when.matches(element))
            .map(|rule| rule.category.as_str())
    }
}
