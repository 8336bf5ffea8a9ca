// Repository trait for series data access
use crate::domain::series::{PointDelete, PointWrite, Series, SeriesFilter};
use async_trait::async_trait;

#[async_trait]
pub trait SeriesRepository: Send + Sync {
    /// Range query grouped by the full tag set, in the store's order.
    async fn query_series(&self, filter: &SeriesFilter) -> anyhow::Result<Vec<Series>>;

    /// Delete the point matching measurement, tag and exact timestamp.
    async fn delete_point(&self, target: &PointDelete) -> anyhow::Result<()>;

    /// Upsert a single point. `Ok(false)` means the store declined the write.
    async fn write_point(&self, point: &PointWrite) -> anyhow::Result<bool>;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::domain::error::CleanerError;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Query(SeriesFilter),
        Delete(PointDelete),
        Write(PointWrite),
    }

    /// In-memory store that records every call.
    #[derive(Default)]
    pub struct RecordingRepository {
        pub series: Vec<Series>,
        query_error: Option<CleanerError>,
        reject_writes: bool,
        failing_times: Vec<DateTime<Utc>>,
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingRepository {
        pub fn with_series(series: Vec<Series>) -> Self {
            Self {
                series,
                ..Default::default()
            }
        }

        pub fn failing_query(error: CleanerError) -> Self {
            Self {
                query_error: Some(error),
                ..Default::default()
            }
        }

        /// Writes return `Ok(false)`.
        pub fn rejecting_writes(mut self) -> Self {
            self.reject_writes = true;
            self
        }

        /// Deletes and writes at `time` return an error.
        pub fn failing_at(mut self, time: DateTime<Utc>) -> Self {
            self.failing_times.push(time);
            self
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn writes(&self) -> Vec<PointWrite> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Write(w) => Some(w),
                    _ => None,
                })
                .collect()
        }

        pub fn deletes(&self) -> Vec<PointDelete> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Delete(d) => Some(d),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl SeriesRepository for RecordingRepository {
        async fn query_series(&self, filter: &SeriesFilter) -> anyhow::Result<Vec<Series>> {
            self.record(Call::Query(filter.clone()));
            match &self.query_error {
                Some(err) => Err(err.clone().into()),
                None => Ok(self.series.clone()),
            }
        }

        async fn delete_point(&self, target: &PointDelete) -> anyhow::Result<()> {
            self.record(Call::Delete(target.clone()));
            if self.failing_times.contains(&target.time) {
                anyhow::bail!(CleanerError::StoreUnavailable("connection reset".to_string()));
            }
            Ok(())
        }

        async fn write_point(&self, point: &PointWrite) -> anyhow::Result<bool> {
            self.record(Call::Write(point.clone()));
            if self.failing_times.contains(&point.time) {
                anyhow::bail!(CleanerError::StoreUnavailable("connection reset".to_string()));
            }
            Ok(!self.reject_writes)
        }
    }
}
