// Per-entity default bounds
use super::error::CleanerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBound {
    pub unit: String,
    pub min: f64,
    pub max: f64,
}

impl EntityBound {
    pub fn new(unit: impl Into<String>, min: f64, max: f64) -> Result<Self, CleanerError> {
        let bound = Self {
            unit: unit.into(),
            min,
            max,
        };
        bound.validate()?;
        Ok(bound)
    }

    pub fn validate(&self) -> Result<(), CleanerError> {
        if self.min > self.max {
            return Err(CleanerError::InvalidBounds {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Entities seeded when the configuration names none.
pub fn default_entities() -> BTreeMap<String, EntityBound> {
    [
        ("hm800_ch2_power", "W", 0.0, 1000.0),
        ("hm800_yieldday", "Wh", 1.0, 15.0),
        ("hichi_gth_sml_total_in", "kWh", 35000.0, 50000.0),
        ("hm800_power", "W", 0.0, 5000.0),
        ("hichi_gth_sml_power_curr", "W", -1000.0, 5000.0),
        ("hichi_gth_sml_total_out", "kWh", 0.0, 10000.0),
    ]
    .into_iter()
    .filter_map(|(id, unit, min, max)| {
        EntityBound::new(unit, min, max)
            .ok()
            .map(|bound| (id.to_string(), bound))
    })
    .collect()
}
