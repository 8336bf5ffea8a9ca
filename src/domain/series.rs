// Time-series domain models
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A single reading as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub time: DateTime<Utc>,
    pub value: f64,
    pub tags: BTreeMap<String, String>,
}

impl Point {
    pub fn new(time: DateTime<Utc>, value: f64) -> Self {
        Self {
            time,
            value,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Points sharing one tag group, in the order the store returned them.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub points: Vec<Point>,
}

impl Series {
    pub fn new(measurement: String, tags: BTreeMap<String, String>, points: Vec<Point>) -> Self {
        Self {
            measurement,
            tags,
            points,
        }
    }

    /// Looks a tag up on the point first, then on the series group.
    /// `GROUP BY *` reports an absent tag key as `""`, so empty values count as missing.
    pub fn tag_for(&self, idx: usize, key: &str) -> Option<&str> {
        fn non_empty<'a>(tags: &'a BTreeMap<String, String>, key: &str) -> Option<&'a String> {
            tags.get(key).filter(|v| !v.is_empty())
        }
        self.points
            .get(idx)
            .and_then(|p| non_empty(&p.tags, key))
            .or_else(|| non_empty(&self.tags, key))
            .map(String::as_str)
    }
}

/// What to fetch: one measurement, filtered by an exact tag value, over a relative range.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFilter {
    pub measurement: String,
    pub tag_key: String,
    pub tag_value: String,
    pub range: super::time_range::TimeRange,
}

/// An upsert of the single `value` field at an exact timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PointWrite {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// A point addressed by measurement, identifying tag and exact timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PointDelete {
    pub measurement: String,
    pub tag_key: String,
    pub tag_value: String,
    pub time: DateTime<Utc>,
}
