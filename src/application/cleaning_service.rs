// Cleaning service - Scan for anomalies, then delete or repair the selected ones
use crate::application::anomaly_book::AnomalyBook;
use crate::application::detection::{DetectionSettings, Detector};
use crate::application::series_repository::SeriesRepository;
use crate::domain::anomaly::{Anomaly, AnomalyRef, ContextRow, FixMethod};
use crate::domain::error::CleanerError;
use crate::domain::series::{PointDelete, PointWrite, SeriesFilter};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const ENTITY_TAG: &str = "entity_id";

/// A fully resolved scan: what to fetch and how to judge it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    pub filter: SeriesFilter,
    pub settings: DetectionSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeleteOutcome {
    pub deleted: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FixOutcome {
    pub fixed: usize,
    pub errors: Vec<String>,
}

pub struct CleaningService {
    repository: Arc<dyn SeriesRepository>,
    detector: Detector,
    // scan, delete and fix all hold this for their whole duration
    book: Mutex<AnomalyBook>,
}

impl CleaningService {
    pub fn new(repository: Arc<dyn SeriesRepository>, detector: Detector) -> Self {
        Self {
            repository,
            detector,
            book: Mutex::new(AnomalyBook::default()),
        }
    }

    /// Replaces the current anomaly list. A failed query leaves it empty.
    pub async fn scan(&self, plan: &ScanPlan) -> anyhow::Result<Vec<Anomaly>> {
        let mut book = self.book.lock().await;
        book.clear();

        let groups = self.repository.query_series(&plan.filter).await?;
        let anomalies: Vec<Anomaly> = self
            .detector
            .scan(&groups, &plan.filter.tag_value, plan.settings)
            .collect();

        tracing::info!(
            measurement = %plan.filter.measurement,
            entity_id = %plan.filter.tag_value,
            series = groups.len(),
            points = groups.iter().map(|g| g.points.len()).sum::<usize>(),
            anomalies = anomalies.len(),
            "scan finished"
        );

        book.replace(anomalies.clone());
        Ok(anomalies)
    }

    pub async fn anomalies(&self) -> Vec<Anomaly> {
        self.book.lock().await.anomalies().to_vec()
    }

    pub async fn context(&self, reference: AnomalyRef) -> Result<Vec<ContextRow>, CleanerError> {
        let book = self.book.lock().await;
        Ok(book.get(reference)?.context_rows())
    }

    /// Deletes each selected point. Selections are not deduplicated, and one failure
    /// does not stop the rest.
    pub async fn delete(&self, selection: &[AnomalyRef]) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        if selection.is_empty() {
            return outcome;
        }

        let book = self.book.lock().await;
        for reference in selection {
            let anomaly = match book.get(*reference) {
                Ok(anomaly) => anomaly,
                Err(e) => {
                    tracing::warn!("Skipping delete of {}: {}", reference, e);
                    outcome.errors.push(e.to_string());
                    continue;
                }
            };

            let target = PointDelete {
                measurement: anomaly.measurement.clone(),
                tag_key: ENTITY_TAG.to_string(),
                tag_value: anomaly.entity_id.clone(),
                time: anomaly.time,
            };
            match self.repository.delete_point(&target).await {
                Ok(()) => outcome.deleted += 1,
                Err(e) => {
                    tracing::warn!("Delete failed for {}: {:#}", anomaly.time, e);
                    outcome
                        .errors
                        .push(format!("Failed to delete point at {}: {:#}", anomaly.time.to_rfc3339(), e));
                }
            }
        }

        tracing::info!(deleted = outcome.deleted, failed = outcome.errors.len(), "delete finished");
        outcome
    }

    /// Overwrites each selected point with a value derived from its neighbours.
    /// The in-memory value follows a successful write; the store is not re-read.
    pub async fn fix(&self, selection: &[AnomalyRef], method: FixMethod) -> FixOutcome {
        let mut outcome = FixOutcome::default();
        if selection.is_empty() {
            return outcome;
        }

        let mut book = self.book.lock().await;
        for reference in selection {
            let anomaly = match book.get_mut(*reference) {
                Ok(anomaly) => anomaly,
                Err(e) => {
                    tracing::warn!("Skipping fix of {}: {}", reference, e);
                    outcome.errors.push(e.to_string());
                    continue;
                }
            };
            let time = anomaly.time.to_rfc3339();

            let fix_value = match method.resolve(anomaly.prev_value, anomaly.next_value) {
                Ok(value) => value,
                Err(what) => {
                    outcome
                        .errors
                        .push(CleanerError::MissingNeighborValue { what, time }.to_string());
                    continue;
                }
            };

            let write = repair_write(anomaly, fix_value);
            let rejected = match self.repository.write_point(&write).await {
                Ok(true) => None,
                Ok(false) => Some("store reported failure".to_string()),
                Err(e) => Some(format!("{:#}", e)),
            };
            match rejected {
                None => {
                    tracing::debug!("Fixed {} at {}: {} -> {}", anomaly.entity_id, time, anomaly.value, fix_value);
                    anomaly.value = fix_value;
                    outcome.fixed += 1;
                }
                Some(reason) => {
                    tracing::warn!("Fix rejected for {}: {}", time, reason);
                    outcome
                        .errors
                        .push(CleanerError::WriteRejected { time, reason }.to_string());
                }
            }
        }

        tracing::info!(fixed = outcome.fixed, failed = outcome.errors.len(), ?method, "fix finished");
        outcome
    }
}

/// Rebuilds the sensor point with the tags the recorder writes.
fn repair_write(anomaly: &Anomaly, value: f64) -> PointWrite {
    let mut tags = BTreeMap::new();
    tags.insert("domain".to_string(), "sensor".to_string());
    tags.insert(ENTITY_TAG.to_string(), anomaly.entity_id.clone());
    tags.insert("source".to_string(), "HA".to_string());
    // line protocol has no empty tag values
    if let Some(name) = anomaly.friendly_name.as_ref().filter(|n| !n.is_empty()) {
        tags.insert("friendly_name".to_string(), name.clone());
    }

    PointWrite {
        measurement: anomaly.measurement.clone(),
        tags,
        time: anomaly.time,
        value,
    }
}
