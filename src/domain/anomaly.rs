// Anomaly domain models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A neighbouring reading captured for display and repair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    OutOfBounds,
    Dip,
    Peak,
}

/// A flagged point. Lives only until the next scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: Uuid,
    pub kind: AnomalyKind,
    pub time: DateTime<Utc>,
    pub value: f64,
    pub prev_value: Option<f64>,
    pub next_value: Option<f64>,
    pub measurement: String,
    pub entity_id: String,
    pub friendly_name: Option<String>,
    /// Nearest first.
    pub context_before: Vec<ContextPoint>,
    /// Nearest first.
    pub context_after: Vec<ContextPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CheckType {
    Bounds { min: f64, max: f64 },
    Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixMethod {
    #[serde(alias = "Previous Value")]
    PreviousValue,
    #[serde(alias = "Next Value")]
    NextValue,
    #[serde(alias = "average_of_previous_and_next", alias = "Average of Previous and Next")]
    Average,
}

impl FixMethod {
    /// Picks the replacement value, or names the neighbour that is missing.
    pub fn resolve(self, prev: Option<f64>, next: Option<f64>) -> Result<f64, &'static str> {
        match self {
            FixMethod::PreviousValue => prev.ok_or("previous value"),
            FixMethod::NextValue => next.ok_or("next value"),
            FixMethod::Average => match (prev, next) {
                (Some(p), Some(n)) => Ok((p + n) / 2.0),
                _ => Err("previous and next value"),
            },
        }
    }
}

/// Addresses an anomaly of the current scan by position or by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnomalyRef {
    Index(usize),
    Id(Uuid),
}

impl fmt::Display for AnomalyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyRef::Index(idx) => write!(f, "index {}", idx),
            AnomalyRef::Id(id) => write!(f, "id {}", id),
        }
    }
}

impl std::str::FromStr for AnomalyRef {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<usize>() {
            Ok(idx) => Ok(AnomalyRef::Index(idx)),
            Err(_) => s.parse::<Uuid>().map(AnomalyRef::Id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContextRole {
    Before,
    Anomaly,
    After,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextRow {
    pub role: ContextRole,
    pub time: DateTime<Utc>,
    pub value: f64,
}

impl Anomaly {
    /// Rows in chronological order: earlier context, the anomaly, later context.
    pub fn context_rows(&self) -> Vec<ContextRow> {
        let before = self.context_before.iter().rev().map(|c| ContextRow {
            role: ContextRole::Before,
            time: c.time,
            value: c.value,
        });
        let this = std::iter::once(ContextRow {
            role: ContextRole::Anomaly,
            time: self.time,
            value: self.value,
        });
        let after = self.context_after.iter().map(|c| ContextRow {
            role: ContextRole::After,
            time: c.time,
            value: c.value,
        });
        before.chain(this).chain(after).collect()
    }
}
