// Scan request - Fills caller omissions from entity bounds and configured defaults
use crate::application::cleaning_service::{ScanPlan, ENTITY_TAG};
use crate::application::detection::DetectionSettings;
use crate::domain::anomaly::CheckType;
use crate::domain::entity::EntityBound;
use crate::domain::error::CleanerError;
use crate::domain::series::SeriesFilter;
use crate::domain::time_range::{RelativeTime, TimeRange};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    #[default]
    Bounds,
    #[serde(alias = "monotonicity")]
    Trend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanDefaults {
    pub context_size: usize,
    pub range: TimeRange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    pub entity_id: String,
    /// Defaults to the entity's unit, which is what the recorder names its measurements by.
    pub measurement: Option<String>,
    pub start: Option<RelativeTime>,
    pub end: Option<RelativeTime>,
    pub context_size: Option<usize>,
    #[serde(default)]
    pub check: CheckKind,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ScanRequest {
    pub fn resolve(
        self,
        entity: Option<&EntityBound>,
        defaults: &ScanDefaults,
    ) -> Result<ScanPlan, CleanerError> {
        let unknown = || CleanerError::UnknownEntity(self.entity_id.clone());

        let measurement = match (&self.measurement, entity) {
            (Some(m), _) => m.clone(),
            (None, Some(e)) => e.unit.clone(),
            (None, None) => return Err(unknown()),
        };

        let check = match self.check {
            CheckKind::Trend => CheckType::Trend,
            CheckKind::Bounds => {
                let min = self.min.or(entity.map(|e| e.min)).ok_or_else(unknown)?;
                let max = self.max.or(entity.map(|e| e.max)).ok_or_else(unknown)?;
                if min > max {
                    return Err(CleanerError::InvalidBounds { min, max });
                }
                CheckType::Bounds { min, max }
            }
        };

        let range = TimeRange::new(
            self.start.unwrap_or_else(|| defaults.range.start.clone()),
            self.end.unwrap_or_else(|| defaults.range.end.clone()),
        );

        Ok(ScanPlan {
            filter: SeriesFilter {
                measurement,
                tag_key: ENTITY_TAG.to_string(),
                tag_value: self.entity_id,
                range,
            },
            settings: DetectionSettings {
                context_size: self.context_size.unwrap_or(defaults.context_size),
                check,
            },
        })
    }
}
