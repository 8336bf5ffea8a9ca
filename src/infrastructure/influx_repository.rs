// InfluxDB repository implementation
use crate::application::series_repository::SeriesRepository;
use crate::domain::error::CleanerError;
use crate::domain::series::{Point, PointDelete, PointWrite, Series, SeriesFilter};
use crate::infrastructure::config::InfluxSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use influxdb2::models::DataPoint;
use reqwest::Method;
use serde::Deserialize;
use std::collections::HashMap;

pub struct InfluxRepository {
    base_url: String,
    username: String,
    password: String,
    token: Option<String>,
    database: String,
    retention_policy: Option<String>,
    http: reqwest::Client,
    writer: influxdb2::Client,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    results: Vec<InfluxQLResult>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    name: String,
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    tags: Option<HashMap<String, String>>,
}

impl InfluxRepository {
    pub fn new(settings: &InfluxSettings) -> Self {
        let base_url = if settings.host.contains("://") {
            format!("{}:{}", settings.host.trim_end_matches('/'), settings.port)
        } else {
            format!("http://{}:{}", settings.host, settings.port)
        };

        // 1.8+ accepts "username:password" as the token of the v2 write API
        let write_token = settings
            .token
            .clone()
            .unwrap_or_else(|| format!("{}:{}", settings.username, settings.password));
        let org = settings.org.clone().unwrap_or_else(|| "-".to_string());
        let writer = influxdb2::Client::new(base_url.clone(), org, write_token);

        Self {
            base_url,
            username: settings.username.clone(),
            password: settings.password.clone(),
            token: settings.token.clone(),
            database: settings.database.clone(),
            retention_policy: settings.retention_policy.clone(),
            http: reqwest::Client::new(),
            writer,
        }
    }

    fn build_query_url(&self, query: &str) -> String {
        let rp = self
            .retention_policy
            .as_deref()
            .map(|rp| format!("&rp={}", urlencoding::encode(rp)))
            .unwrap_or_default();
        format!(
            "{}/query?db={}{}&q={}",
            self.base_url,
            urlencoding::encode(&self.database),
            rp,
            urlencoding::encode(query)
        )
    }

    fn bucket(&self) -> String {
        match &self.retention_policy {
            Some(rp) => format!("{}/{}", self.database, rp),
            None => self.database.clone(),
        }
    }

    async fn execute_query(&self, method: Method, query: &str) -> Result<InfluxQLResponse> {
        let url = self.build_query_url(query);

        let request = self
            .http
            .request(method, &url)
            .header("Accept", "application/json");
        let request = match &self.token {
            Some(token) => request.header("Authorization", format!("Token {}", token)),
            None => request.basic_auth(&self.username, Some(&self.password)),
        };

        let response = request
            .send()
            .await
            .map_err(|e| CleanerError::StoreUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(CleanerError::QueryFailed(format!("status {}: {}", status, body.trim())));
        }

        let data = response
            .json::<InfluxQLResponse>()
            .await
            .map_err(|e| CleanerError::QueryFailed(format!("unreadable response: {}", e)))?;

        // Check for errors in the response
        if let Some(error) = data.results.iter().find_map(|r| r.error.as_ref()) {
            anyhow::bail!(CleanerError::QueryFailed(error.clone()));
        }

        Ok(data)
    }
}

#[async_trait]
impl SeriesRepository for InfluxRepository {
    async fn query_series(&self, filter: &SeriesFilter) -> Result<Vec<Series>> {
        let query = select_query(filter);
        tracing::debug!("Executing series query: {}", query);

        let response = self.execute_query(Method::GET, &query).await?;
        let series = series_from_response(response);

        tracing::debug!(
            "Got {} series for {} from {}",
            series.len(),
            filter.tag_value,
            filter.measurement
        );
        Ok(series)
    }

    async fn delete_point(&self, target: &PointDelete) -> Result<()> {
        let query = delete_query(target);
        tracing::debug!("Executing delete: {}", query);
        self.execute_query(Method::POST, &query).await?;
        Ok(())
    }

    async fn write_point(&self, point: &PointWrite) -> Result<bool> {
        let timestamp = point
            .time
            .timestamp_nanos_opt()
            .ok_or_else(|| CleanerError::WriteRejected {
                time: time_literal(point.time),
                reason: "timestamp outside the nanosecond range".to_string(),
            })?;

        let mut builder = DataPoint::builder(point.measurement.as_str());
        for (key, value) in &point.tags {
            builder = builder.tag(key.as_str(), value.as_str());
        }
        let data_point = builder
            .field("value", point.value)
            .timestamp(timestamp)
            .build()
            .context("Failed to build data point")?;

        self.writer
            .write(&self.bucket(), futures::stream::iter(vec![data_point]))
            .await
            .context("InfluxDB write failed")?;

        Ok(true)
    }
}

/// Double-quoted InfluxQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Single-quoted InfluxQL string literal.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn time_literal(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn select_query(filter: &SeriesFilter) -> String {
    format!(
        "SELECT value, friendly_name FROM {} WHERE ({} = {}) AND time > {} AND time < {} GROUP BY *",
        quote_ident(&filter.measurement),
        quote_ident(&filter.tag_key),
        quote_literal(&filter.tag_value),
        filter.range.start.to_influxql(),
        filter.range.end.to_influxql()
    )
}

fn delete_query(target: &PointDelete) -> String {
    format!(
        "DELETE FROM {} WHERE ({} = {}) AND time = {}",
        quote_ident(&target.measurement),
        quote_ident(&target.tag_key),
        quote_literal(&target.tag_value),
        quote_literal(&time_literal(target.time))
    )
}

/// One `Series` per returned group; rows without a numeric value are dropped.
fn series_from_response(response: InfluxQLResponse) -> Vec<Series> {
    response
        .results
        .into_iter()
        .flat_map(|result| result.series.unwrap_or_default())
        .map(|s| {
            let time_idx = s.columns.iter().position(|c| c == "time").unwrap_or(0);
            let value_idx = s.columns.iter().position(|c| c == "value").unwrap_or(1);
            let name_idx = s.columns.iter().position(|c| c == "friendly_name");

            let points: Vec<Point> = s
                .values
                .iter()
                .filter_map(|row| {
                    let time = row.get(time_idx)?.as_str()?;
                    let time = DateTime::parse_from_rfc3339(time).ok()?.with_timezone(&Utc);
                    let value = row.get(value_idx)?.as_f64()?;
                    let point = Point::new(time, value);
                    match name_idx.and_then(|i| row.get(i)).and_then(|v| v.as_str()) {
                        Some(name) => Some(point.with_tag("friendly_name", name)),
                        None => Some(point),
                    }
                })
                .collect();

            let skipped = s.values.len() - points.len();
            if skipped > 0 {
                tracing::debug!("Skipped {} rows without a usable value in {}", skipped, s.name);
            }

            let tags = s.tags.unwrap_or_default().into_iter().collect();
            Series::new(s.name, tags, points)
        })
        .collect()
}
