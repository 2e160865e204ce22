//! GPS track utilities: haversine distance, map-rendering decimation, and
//! the duration/distance derivations list pages display.
//!
//! A track is the chronologically ordered sequence of telemetry samples
//! imported from a flight log. Tracks are immutable once loaded; everything
//! here either reads them or produces annotated copies.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters, as used by the logbook service.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Minimum spacing between kept points when thinning a track for the map.
///
/// One sample per second produces excessive marker density; a fixed distance
/// threshold keeps turns and hover segments visually distinct while thinning
/// straight cruise legs.
pub const DECIMATION_MIN_SPACING_M: f64 = 10.0;

/// Minimum number of timestamps for IQR outlier filtering to apply.
const IQR_MIN_SAMPLES: usize = 4;

/// IQR multiplier for duration outlier bounds. More permissive than the
/// standard 1.5 to tolerate large gaps in time-series telemetry.
const IQR_MULTIPLIER: f64 = 2.5;

// ============================================================================
// Track Points
// ============================================================================

/// One telemetry sample of a flight track.
///
/// Latitude and longitude are optional: radio logs keep emitting rows before
/// the GPS has a fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    #[serde(default)]
    pub id: Option<i64>,
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Ground speed in km/h.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Receiver battery voltage.
    #[serde(default)]
    pub rx_bt: Option<f64>,
    /// Downlink signal strength in dB.
    #[serde(default)]
    pub rssi: Option<i32>,
    /// Link quality in percent.
    #[serde(default)]
    pub rqly: Option<i32>,
    /// Haversine distance from the first positioned sample, in meters.
    #[serde(default)]
    pub distance_from_start: Option<f64>,
}

impl TrackPoint {
    /// A bare sample with optional coordinates; telemetry fields start empty.
    pub fn new(
        timestamp: NaiveDateTime,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Self {
        Self {
            id: None,
            timestamp,
            latitude,
            longitude,
            altitude: None,
            speed: None,
            rx_bt: None,
            rssi: None,
            rqly: None,
            distance_from_start: None,
        }
    }

    /// A sample participates in map rendering only with both coordinates.
    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    fn position(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

// ============================================================================
// Geographic Utilities
// ============================================================================

/// Great-circle distance between two coordinates in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Annotate each positioned sample with its distance from the first
/// positioned sample.
pub fn annotate_distances_from_start(points: &mut [TrackPoint]) {
    let mut start: Option<(f64, f64)> = None;
    for point in points.iter_mut() {
        if let Some((lat, lon)) = point.position() {
            let (start_lat, start_lon) = *start.get_or_insert((lat, lon));
            point.distance_from_start = Some(haversine_distance(start_lat, start_lon, lat, lon));
        }
    }
}

// ============================================================================
// Decimation
// ============================================================================

/// Thin a track to a map-rendering subset.
///
/// The returned iterator is lazy and restartable (`Clone`), preserves
/// chronological order, and guarantees:
/// - samples without both coordinates are skipped;
/// - the first and last positioned samples are always kept;
/// - every other kept sample is at least [`DECIMATION_MIN_SPACING_M`] from
///   the previously kept one.
///
/// Zero or one positioned samples pass through unchanged; a track entirely
/// within the spacing threshold reduces to exactly first + last.
pub fn decimate(points: &[TrackPoint]) -> Decimated<'_> {
    Decimated {
        points,
        next: 0,
        last_kept: None,
        last_valid: points.iter().rposition(TrackPoint::has_position),
    }
}

/// Lazy decimating iterator over a track. See [`decimate`].
#[derive(Debug, Clone)]
pub struct Decimated<'a> {
    points: &'a [TrackPoint],
    next: usize,
    last_kept: Option<(f64, f64)>,
    last_valid: Option<usize>,
}

impl<'a> Iterator for Decimated<'a> {
    type Item = &'a TrackPoint;

    fn next(&mut self) -> Option<&'a TrackPoint> {
        let last_valid = self.last_valid?;
        while self.next < self.points.len() {
            let idx = self.next;
            self.next += 1;

            let point = &self.points[idx];
            let Some((lat, lon)) = point.position() else {
                continue;
            };

            match self.last_kept {
                None => {
                    self.last_kept = Some((lat, lon));
                    return Some(point);
                }
                Some((kept_lat, kept_lon)) => {
                    // The final positioned sample closes the path visually
                    // even when it is under the spacing threshold.
                    if idx == last_valid {
                        return Some(point);
                    }
                    if haversine_distance(kept_lat, kept_lon, lat, lon)
                        >= DECIMATION_MIN_SPACING_M
                    {
                        self.last_kept = Some((lat, lon));
                        return Some(point);
                    }
                }
            }
        }
        None
    }
}

// ============================================================================
// Duration
// ============================================================================

/// Flight duration in seconds with statistical outlier filtering.
///
/// Telemetry logs occasionally carry timestamps minutes or hours away from
/// the actual flight (clock resets, tail-end rows). Quartile bounds with a
/// 2.5 IQR margin drop those before taking last-minus-first; fewer than four
/// samples, or bounds that reject everything, fall back to the simple span.
pub fn robust_duration(points: &[TrackPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    let mut epochs: Vec<f64> = points
        .iter()
        .map(|p| p.timestamp.and_utc().timestamp_millis() as f64 / 1000.0)
        .collect();
    epochs.sort_by(f64::total_cmp);

    let n = epochs.len();
    if n < IQR_MIN_SAMPLES {
        return epochs[n - 1] - epochs[0];
    }

    let q1 = epochs[n / 4];
    let q3 = epochs[n * 3 / 4];
    let iqr = q3 - q1;
    let lower = q1 - IQR_MULTIPLIER * iqr;
    let upper = q3 + IQR_MULTIPLIER * iqr;

    let filtered: Vec<f64> = epochs
        .iter()
        .copied()
        .filter(|&t| t >= lower && t <= upper)
        .collect();

    if filtered.len() < 2 {
        return epochs[n - 1] - epochs[0];
    }
    filtered[filtered.len() - 1] - filtered[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(seconds: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(seconds)
    }

    fn point(seconds: i64, lat: Option<f64>, lon: Option<f64>) -> TrackPoint {
        TrackPoint::new(ts(seconds), lat, lon)
    }

    /// ~0.00009 degrees of latitude is ~10 m.
    fn offset_north(base: f64, meters: f64) -> f64 {
        base + meters / 111_320.0
    }

    #[test]
    fn test_haversine_sanity() {
        // London to Paris, roughly 343 km.
        let d = haversine_distance(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((d - 343_000.0).abs() < 5_000.0, "got {d}");

        assert_eq!(haversine_distance(47.0, 8.0, 47.0, 8.0), 0.0);
    }

    #[test]
    fn test_decimate_empty_and_single() {
        let points: Vec<TrackPoint> = vec![];
        assert_eq!(decimate(&points).count(), 0);

        let points = vec![point(0, Some(47.0), Some(8.0))];
        assert_eq!(decimate(&points).count(), 1);

        // Positionless samples only
        let points = vec![point(0, None, None), point(1, None, Some(8.0))];
        assert_eq!(decimate(&points).count(), 0);
    }

    #[test]
    fn test_decimate_all_within_threshold_keeps_first_and_last() {
        // Three samples within ~1 m of each other.
        let base = 47.0;
        let points = vec![
            point(0, Some(base), Some(8.0)),
            point(1, Some(offset_north(base, 0.5)), Some(8.0)),
            point(2, Some(offset_north(base, 1.0)), Some(8.0)),
        ];
        let kept: Vec<_> = decimate(&points).collect();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].timestamp, ts(0));
        assert_eq!(kept[1].timestamp, ts(2));
    }

    #[test]
    fn test_decimate_spacing_property() {
        // 50 samples 3 m apart: kept points (except the mandatory last)
        // must be >= 10 m from their predecessor.
        let base = 47.0;
        let points: Vec<TrackPoint> = (0..50)
            .map(|i| point(i, Some(offset_north(base, i as f64 * 3.0)), Some(8.0)))
            .collect();

        let kept: Vec<_> = decimate(&points).collect();
        assert_eq!(kept[0].timestamp, points[0].timestamp);
        assert_eq!(
            kept.last().unwrap().timestamp,
            points.last().unwrap().timestamp
        );

        for pair in kept.windows(2).take(kept.len().saturating_sub(2)) {
            let d = haversine_distance(
                pair[0].latitude.unwrap(),
                pair[0].longitude.unwrap(),
                pair[1].latitude.unwrap(),
                pair[1].longitude.unwrap(),
            );
            assert!(d >= DECIMATION_MIN_SPACING_M, "kept points {d:.1} m apart");
        }
    }

    #[test]
    fn test_decimate_skips_positionless_samples() {
        let base = 47.0;
        let points = vec![
            point(0, Some(base), Some(8.0)),
            point(1, None, None),
            point(2, Some(offset_north(base, 20.0)), Some(8.0)),
            point(3, None, None),
        ];
        let kept: Vec<_> = decimate(&points).collect();
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|p| p.has_position()));
    }

    #[test]
    fn test_decimate_is_restartable() {
        let base = 47.0;
        let points: Vec<TrackPoint> = (0..20)
            .map(|i| point(i, Some(offset_north(base, i as f64 * 15.0)), Some(8.0)))
            .collect();
        let iter = decimate(&points);
        let first: Vec<_> = iter.clone().collect();
        let second: Vec<_> = iter.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_annotate_distances_from_start() {
        let base = 47.0;
        let mut points = vec![
            point(0, None, None),
            point(1, Some(base), Some(8.0)),
            point(2, Some(offset_north(base, 100.0)), Some(8.0)),
        ];
        annotate_distances_from_start(&mut points);

        assert_eq!(points[0].distance_from_start, None);
        assert_eq!(points[1].distance_from_start, Some(0.0));
        let d = points[2].distance_from_start.unwrap();
        assert!((d - 100.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_robust_duration_simple_cases() {
        assert_eq!(robust_duration(&[]), 0.0);
        assert_eq!(robust_duration(&[point(0, None, None)]), 0.0);

        // Below the IQR sample minimum: simple span.
        let points = vec![point(0, None, None), point(90, None, None)];
        assert_eq!(robust_duration(&points), 90.0);
    }

    #[test]
    fn test_robust_duration_filters_outlier() {
        // Ten samples one second apart plus a bogus row an hour later.
        let mut points: Vec<TrackPoint> = (0..10).map(|i| point(i, None, None)).collect();
        points.push(point(3600, None, None));

        let duration = robust_duration(&points);
        assert!((duration - 9.0).abs() < 1e-6, "got {duration}");
    }

    #[test]
    fn test_track_point_deserializes_api_shape() {
        let json = r#"{
            "id": 7,
            "timestamp": "2023-05-01T10:00:01.250",
            "latitude": 47.05,
            "longitude": 8.31,
            "altitude": 12.5,
            "speed": 18.0,
            "rx_bt": 8.2,
            "rssi": -62,
            "rqly": 98,
            "distance_from_start": 4.2
        }"#;
        let point: TrackPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.id, Some(7));
        assert_eq!(point.rssi, Some(-62));
        assert!(point.has_position());
    }
}
