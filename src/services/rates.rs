// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Point rate table: activity category → point-yield rule.
//!
//! Loaded once at startup and shared read-only. The JSON form is a map from
//! category to rule. Each rule has exactly one base (`per_km` or
//! `per_session`) and may add an energy component with `per_calorie`:
//!
//! ```json
//! {
//!   "Run": { "per_km": 1.0, "per_calorie": 0.01 },
//!   "WeightTraining": { "per_session": 5 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// How an eligible category earns points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateRule {
    /// Points per whole kilometre of distance.
    PerKm(f64),
    /// Flat points per session.
    PerSession(u64),
}

/// Rule for one category: a base rule plus an optional per-kilocalorie rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryRate {
    pub rule: RateRule,
    pub per_calorie: Option<f64>,
}

impl CategoryRate {
    pub fn with_calories(self, per_calorie: f64) -> Self {
        Self {
            per_calorie: Some(per_calorie),
            ..self
        }
    }
}

impl From<RateRule> for CategoryRate {
    fn from(rule: RateRule) -> Self {
        Self {
            rule,
            per_calorie: None,
        }
    }
}

/// JSON shape of one table entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRate {
    per_km: Option<f64>,
    per_session: Option<u64>,
    per_calorie: Option<f64>,
}

impl RawRate {
    fn into_rate(self, category: &str) -> Result<CategoryRate, RateTableError> {
        let rule = match (self.per_km, self.per_session) {
            (Some(multiplier), None) => RateRule::PerKm(multiplier),
            (None, Some(points)) => RateRule::PerSession(points),
            _ => {
                return Err(RateTableError::InvalidRate {
                    category: category.to_string(),
                    reason: "exactly one of per_km or per_session is required".to_string(),
                })
            }
        };
        Ok(CategoryRate {
            rule,
            per_calorie: self.per_calorie,
        })
    }
}

/// Errors loading a rate table.
#[derive(Debug, thiserror::Error)]
pub enum RateTableError {
    #[error("Failed to read rate table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse rate table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid rate for category {category:?}: {reason}")]
    InvalidRate { category: String, reason: String },
}

/// Category → rule mapping. Lookups ignore ASCII case and surrounding whitespace.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rules: HashMap<String, CategoryRate>,
}

impl Default for RateTable {
    fn default() -> Self {
        let rules = [
            ("Run", RateRule::PerKm(1.0)),
            ("TrailRun", RateRule::PerKm(1.0)),
            ("VirtualRun", RateRule::PerKm(1.0)),
            ("Walk", RateRule::PerKm(1.0)),
            ("Hike", RateRule::PerKm(1.0)),
            ("Ride", RateRule::PerKm(0.25)),
            ("VirtualRide", RateRule::PerKm(0.25)),
            ("GravelRide", RateRule::PerKm(0.25)),
            ("MountainBikeRide", RateRule::PerKm(0.25)),
            ("Swim", RateRule::PerKm(4.0)),
            ("WeightTraining", RateRule::PerSession(5)),
            ("Yoga", RateRule::PerSession(3)),
        ];

        // Built-in rules are all valid.
        Self {
            rules: rules
                .into_iter()
                .map(|(category, rule)| (normalize(category), CategoryRate::from(rule)))
                .collect(),
        }
    }
}

impl RateTable {
    /// Build a table, rejecting negative or non-finite multipliers.
    pub fn new<I, S, R>(rules: I) -> Result<Self, RateTableError>
    where
        I: IntoIterator<Item = (S, R)>,
        S: AsRef<str>,
        R: Into<CategoryRate>,
    {
        let mut table = HashMap::new();
        for (category, rate) in rules {
            let category = category.as_ref();
            let rate = rate.into();
            if let RateRule::PerKm(multiplier) = rate.rule {
                check_multiplier(category, "per_km", multiplier)?;
            }
            if let Some(multiplier) = rate.per_calorie {
                check_multiplier(category, "per_calorie", multiplier)?;
            }
            table.insert(normalize(category), rate);
        }
        Ok(Self { rules: table })
    }

    /// Parse a table from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, RateTableError> {
        let raw: HashMap<String, RawRate> = serde_json::from_str(json)?;
        let rates = raw
            .into_iter()
            .map(|(category, raw)| raw.into_rate(&category).map(|rate| (category, rate)))
            .collect::<Result<Vec<_>, RateTableError>>()?;
        Self::new(rates)
    }

    /// Load a table from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, RateTableError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Rule for a category, if the category earns points at all.
    pub fn rule_for(&self, category: &str) -> Option<CategoryRate> {
        self.rules.get(&normalize(category)).copied()
    }

    /// A category is eligible iff it appears in the table.
    pub fn is_eligible(&self, category: &str) -> bool {
        self.rule_for(category).is_some()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn check_multiplier(category: &str, kind: &str, multiplier: f64) -> Result<(), RateTableError> {
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(RateTableError::InvalidRate {
            category: category.to_string(),
            reason: format!("{} multiplier must be finite and >= 0, got {}", kind, multiplier),
        });
    }
    Ok(())
}

fn normalize(category: &str) -> String {
    category.trim().to_ascii_lowercase()
}
