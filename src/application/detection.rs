// Anomaly detection - bounds and trend checks over grouped series
use crate::domain::anomaly::{Anomaly, AnomalyKind, CheckType, ContextPoint};
use crate::domain::series::{Point, Series};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Neighbours of one point, both sides ordered nearest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextWindow {
    pub before: Vec<ContextPoint>,
    pub after: Vec<ContextPoint>,
}

/// Collects up to `size` neighbours on each side of `idx`, clipped at the series edges.
pub fn context_window(points: &[Point], idx: usize, size: usize) -> ContextWindow {
    let to_context = |p: &Point| ContextPoint {
        time: p.time,
        value: p.value,
    };
    let before = points
        .get(..idx)
        .unwrap_or(&[])
        .iter()
        .rev()
        .take(size)
        .map(to_context)
        .collect();
    let after = points
        .get(idx + 1..)
        .unwrap_or(&[])
        .iter()
        .take(size)
        .map(to_context)
        .collect();

    ContextWindow { before, after }
}

/// Values around a trend candidate in chronological order.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendWindow {
    /// Oldest first; the last entry is the immediate predecessor.
    pub before_vals: Vec<f64>,
    /// Immediate successor first.
    pub after_vals: Vec<f64>,
}

fn max_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

fn min_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

impl TrendWindow {
    fn from_context(window: &ContextWindow) -> Self {
        Self {
            before_vals: window.before.iter().rev().map(|c| c.value).collect(),
            after_vals: window.after.iter().map(|c| c.value).collect(),
        }
    }

    pub fn min_before(&self) -> Option<f64> {
        min_of(&self.before_vals)
    }

    /// Highest value before the most recent one, i.e. the trend preceding a flagged point.
    pub fn prior_trend_max(&self) -> Option<f64> {
        self.before_vals
            .split_last()
            .and_then(|(_, earlier)| max_of(earlier))
    }

    /// Ordinary dip/peak rule, without regard to earlier flags.
    fn classify(&self, value: f64) -> Option<AnomalyKind> {
        let prev = *self.before_vals.last()?;
        let next = *self.after_vals.first()?;
        let max_before = max_of(&self.before_vals)?;

        if value < prev && value < next {
            let min_after = min_of(&self.after_vals)?;
            (value < max_before && value < min_after).then_some(AnomalyKind::Dip)
        } else if value > prev && value > next {
            let max_after = max_of(&self.after_vals)?;
            (value > max_before && value > max_after).then_some(AnomalyKind::Peak)
        } else {
            None
        }
    }
}

/// Decides whether a trend candidate directly after a flagged point is a new anomaly
/// or the series recovering from the previous one.
pub trait SuppressionPolicy: Send + Sync + fmt::Debug {
    fn confirm(&self, kind: AnomalyKind, value: f64, window: &TrendWindow) -> bool;
}

/// A dip must still undercut everything before it; a peak must still exceed the
/// values preceding the flagged point.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendContinuation;

impl SuppressionPolicy for TrendContinuation {
    fn confirm(&self, kind: AnomalyKind, value: f64, window: &TrendWindow) -> bool {
        match kind {
            AnomalyKind::Dip => window.min_before().is_some_and(|min| value < min),
            AnomalyKind::Peak => window.prior_trend_max().is_some_and(|max| value > max),
            AnomalyKind::OutOfBounds => true,
        }
    }
}

/// Adjacent candidates are judged like any other.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSuppression;

impl SuppressionPolicy for NoSuppression {
    fn confirm(&self, _kind: AnomalyKind, _value: f64, _window: &TrendWindow) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionKind {
    #[default]
    Continuation,
    None,
}

impl SuppressionKind {
    pub fn policy(self) -> Arc<dyn SuppressionPolicy> {
        match self {
            SuppressionKind::Continuation => Arc::new(TrendContinuation),
            SuppressionKind::None => Arc::new(NoSuppression),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionSettings {
    pub context_size: usize,
    pub check: CheckType,
}

#[derive(Debug, Clone)]
pub struct Detector {
    policy: Arc<dyn SuppressionPolicy>,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(Arc::new(TrendContinuation))
    }
}

impl Detector {
    pub fn new(policy: Arc<dyn SuppressionPolicy>) -> Self {
        Self { policy }
    }

    /// Anomalies of every group, in group order then point order.
    pub fn scan<'a>(
        &'a self,
        groups: &'a [Series],
        entity_id: &'a str,
        settings: DetectionSettings,
    ) -> impl Iterator<Item = Anomaly> + 'a {
        groups
            .iter()
            .flat_map(move |series| self.detect(series, entity_id, settings))
    }

    /// Anomalies of a single series. The index of the last flag is carried as the
    /// scan state, so it starts fresh for every series.
    pub fn detect<'a>(
        &'a self,
        series: &'a Series,
        entity_id: &'a str,
        settings: DetectionSettings,
    ) -> impl Iterator<Item = Anomaly> + 'a {
        let points = &series.points;
        (0..points.len())
            .scan(None::<usize>, move |last_flagged, idx| {
                let window = context_window(points, idx, settings.context_size);
                let value = points[idx].value;
                let kind = match settings.check {
                    CheckType::Bounds { min, max } => bounds_violation(idx, value, min, max),
                    CheckType::Trend => {
                        let adjacent = last_flagged.is_some_and(|last| last + 1 == idx);
                        self.trend_violation(value, &window, settings.context_size, adjacent)
                    }
                };

                if kind.is_some() {
                    *last_flagged = Some(idx);
                }
                Some(kind.map(|kind| build_anomaly(series, idx, kind, entity_id, window)))
            })
            .flatten()
    }

    fn trend_violation(
        &self,
        value: f64,
        window: &ContextWindow,
        context_size: usize,
        adjacent: bool,
    ) -> Option<AnomalyKind> {
        if context_size == 0
            || window.before.len() < context_size
            || window.after.len() < context_size
        {
            return None;
        }

        let trend = TrendWindow::from_context(window);
        let kind = trend.classify(value)?;
        if adjacent && !self.policy.confirm(kind, value, &trend) {
            tracing::trace!(value, ?kind, "treating adjacent candidate as a correction");
            return None;
        }
        Some(kind)
    }
}

/// The first point of a series has nothing to corroborate a glitch against.
fn bounds_violation(idx: usize, value: f64, min: f64, max: f64) -> Option<AnomalyKind> {
    let within = min <= value && value <= max;
    (idx > 0 && !within).then_some(AnomalyKind::OutOfBounds)
}

fn build_anomaly(
    series: &Series,
    idx: usize,
    kind: AnomalyKind,
    entity_id: &str,
    window: ContextWindow,
) -> Anomaly {
    let points = &series.points;
    let point = &points[idx];
    Anomaly {
        id: Uuid::new_v4(),
        kind,
        time: point.time,
        value: point.value,
        prev_value: idx.checked_sub(1).map(|i| points[i].value),
        next_value: points.get(idx + 1).map(|p| p.value),
        measurement: series.measurement.clone(),
        entity_id: entity_id.to_string(),
        friendly_name: series.tag_for(idx, "friendly_name").map(str::to_string),
        context_before: window.before,
        context_after: window.after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn series(values: &[f64]) -> Series {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| Point::new(t0 + Duration::minutes(i as i64), *v))
            .collect();
        Series::new("W".to_string(), BTreeMap::new(), points)
    }

    fn bounds(context_size: usize, min: f64, max: f64) -> DetectionSettings {
        DetectionSettings {
            context_size,
            check: CheckType::Bounds { min, max },
        }
    }

    fn trend(context_size: usize) -> DetectionSettings {
        DetectionSettings {
            context_size,
            check: CheckType::Trend,
        }
    }

    fn flagged(detector: &Detector, s: &Series, settings: DetectionSettings) -> Vec<(f64, AnomalyKind)> {
        detector
            .detect(s, "hm800_power", settings)
            .map(|a| (a.value, a.kind))
            .collect()
    }

    #[test]
    fn test_context_window_clipped_nearest_first() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let window = context_window(&s.points, 1, 3);
        let before: Vec<f64> = window.before.iter().map(|c| c.value).collect();
        let after: Vec<f64> = window.after.iter().map(|c| c.value).collect();
        assert_eq!(before, vec![1.0]);
        assert_eq!(after, vec![3.0, 4.0, 5.0]);

        let window = context_window(&s.points, 4, 2);
        let before: Vec<f64> = window.before.iter().map(|c| c.value).collect();
        assert_eq!(before, vec![4.0, 3.0]);
        assert!(window.after.is_empty());

        let window = context_window(&s.points, 2, 0);
        assert_eq!(window, ContextWindow::default());
    }

    #[test]
    fn test_bounds_single_spike() {
        let detector = Detector::default();
        let s = series(&[5.0, 5.0, 5000.0, 5.0]);
        let anomalies: Vec<Anomaly> = detector.detect(&s, "hm800_ch2_power", bounds(2, 0.0, 1000.0)).collect();

        assert_eq!(anomalies.len(), 1);
        let a = &anomalies[0];
        assert_eq!(a.time, s.points[2].time);
        assert_eq!(a.value, 5000.0);
        assert_eq!(a.prev_value, Some(5.0));
        assert_eq!(a.next_value, Some(5.0));
        assert_eq!(a.kind, AnomalyKind::OutOfBounds);
        assert_eq!(a.measurement, "W");
        assert_eq!(a.entity_id, "hm800_ch2_power");
        assert_eq!(a.context_before.len(), 2);
        assert_eq!(a.context_after.len(), 1);
    }

    #[test]
    fn test_bounds_never_flags_first_point() {
        let detector = Detector::default();
        let s = series(&[-50.0, 2000.0, 10.0]);
        assert_eq!(
            flagged(&detector, &s, bounds(1, 0.0, 1000.0)),
            vec![(2000.0, AnomalyKind::OutOfBounds)]
        );
    }

    #[test]
    fn test_bounds_edges_are_inclusive() {
        let detector = Detector::default();
        let s = series(&[0.0, 0.0, 1000.0, 1000.5]);
        assert_eq!(
            flagged(&detector, &s, bounds(0, 0.0, 1000.0)),
            vec![(1000.5, AnomalyKind::OutOfBounds)]
        );
    }

    #[test]
    fn test_inverted_bounds_flag_everything_after_first() {
        let detector = Detector::default();
        let s = series(&[5.0, 5.0, 5.0]);
        assert_eq!(flagged(&detector, &s, bounds(1, 10.0, 0.0)).len(), 2);
    }

    #[test]
    fn test_single_point_never_flagged() {
        let detector = Detector::default();
        let s = series(&[1e9]);
        assert!(flagged(&detector, &s, bounds(0, 0.0, 1.0)).is_empty());
        assert!(flagged(&detector, &s, trend(0)).is_empty());
        assert!(flagged(&detector, &s, trend(1)).is_empty());
    }

    #[test]
    fn test_trend_without_context_flags_nothing() {
        let detector = Detector::default();
        let s = series(&[10.0, 10.0, 10.0, 2.0, 10.0, 10.0, 10.0]);
        assert!(flagged(&detector, &s, trend(0)).is_empty());
        let s = series(&[10.0, 10.0, 50.0, 10.0, 10.0]);
        assert!(flagged(&detector, &s, trend(0)).is_empty());
    }

    #[test]
    fn test_trend_dip() {
        let detector = Detector::default();
        let s = series(&[10.0, 10.0, 10.0, 2.0, 10.0, 10.0, 10.0]);
        let anomalies: Vec<Anomaly> = detector.detect(&s, "hm800_power", trend(2)).collect();

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].value, 2.0);
        assert_eq!(anomalies[0].kind, AnomalyKind::Dip);
        assert_eq!(anomalies[0].time, s.points[3].time);
    }

    #[test]
    fn test_trend_peak_after_dip_exceeding_prior_trend() {
        let detector = Detector::default();
        let s = series(&[10.0, 10.0, 10.0, 2.0, 11.0, 10.0, 10.0]);
        assert_eq!(
            flagged(&detector, &s, trend(2)),
            vec![(2.0, AnomalyKind::Dip), (11.0, AnomalyKind::Peak)]
        );
    }

    #[test]
    fn test_trend_recovery_after_peak_is_suppressed() {
        let s = series(&[10.0, 10.0, 10.0, 50.0, 11.0, 13.0, 13.0]);

        let detector = Detector::default();
        assert_eq!(flagged(&detector, &s, trend(2)), vec![(50.0, AnomalyKind::Peak)]);

        let detector = Detector::new(SuppressionKind::None.policy());
        assert_eq!(
            flagged(&detector, &s, trend(2)),
            vec![(50.0, AnomalyKind::Peak), (11.0, AnomalyKind::Dip)]
        );
    }

    #[test]
    fn test_trend_needs_full_window() {
        let detector = Detector::default();
        // the dip sits one point from the edge, so a window of 2 never fits
        let s = series(&[10.0, 1.0, 10.0, 10.0, 10.0]);
        assert!(flagged(&detector, &s, trend(2)).is_empty());
        assert_eq!(flagged(&detector, &s, trend(1)), vec![(1.0, AnomalyKind::Dip)]);
    }

    #[test]
    fn test_trend_plateau_not_flagged() {
        let detector = Detector::default();
        let s = series(&[1.0, 2.0, 3.0, 3.0, 4.0, 5.0]);
        assert!(flagged(&detector, &s, trend(2)).is_empty());
    }

    #[test]
    fn test_suppression_state_resets_per_series() {
        let detector = Detector::default();
        let groups = vec![series(&[10.0, 50.0, 10.0]), series(&[10.0, 10.0, 11.0, 10.0])];
        // the second peak sits one index past the first group's flag; it is still judged
        // without adjacency because it belongs to another series
        let values: Vec<f64> = detector
            .scan(&groups, "hm800_power", trend(1))
            .map(|a| a.value)
            .collect();
        assert_eq!(values, vec![50.0, 11.0]);
    }

    #[test]
    fn test_scan_keeps_group_order() {
        let detector = Detector::default();
        let groups = vec![series(&[0.0, 7.0, 1.0]), series(&[0.0, 9.0, 8.0])];
        let values: Vec<f64> = detector
            .scan(&groups, "hm800_power", bounds(1, 0.0, 5.0))
            .map(|a| a.value)
            .collect();
        assert_eq!(values, vec![7.0, 9.0, 8.0]);
    }

    #[test]
    fn test_friendly_name_from_tags() {
        let detector = Detector::default();
        let mut s = series(&[0.0, 7.0]);
        s.tags.insert("friendly_name".to_string(), "Inverter power".to_string());
        let anomaly = detector
            .detect(&s, "hm800_power", bounds(1, 0.0, 5.0))
            .next()
            .unwrap();
        assert_eq!(anomaly.friendly_name.as_deref(), Some("Inverter power"));
    }

    #[test]
    fn test_continuation_policy() {
        let window = TrendWindow {
            before_vals: vec![10.0, 50.0],
            after_vals: vec![13.0, 13.0],
        };
        let policy = TrendContinuation;
        assert!(!policy.confirm(AnomalyKind::Dip, 11.0, &window));
        assert!(policy.confirm(AnomalyKind::Dip, 9.0, &window));
        assert!(policy.confirm(AnomalyKind::Peak, 10.5, &window));
        assert!(!policy.confirm(AnomalyKind::Peak, 10.0, &window));

        let short = TrendWindow {
            before_vals: vec![2.0],
            after_vals: vec![1.0],
        };
        assert!(!policy.confirm(AnomalyKind::Peak, 5.0, &short));
    }
}
