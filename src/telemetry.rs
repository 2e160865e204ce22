//! CSV telemetry log parsing.
//!
//! Two log formats are recognized by their header row:
//! - **EdgeTX radio logs** (`1RSS(dB)` / `TxBat(V)` columns): one row per
//!   telemetry frame, GPS as a single "lat lon" column, may start before the
//!   receiver has a fix.
//! - **DJI flight logs** (`CUSTOM.dateTime` column): per-sample OSD fields,
//!   placeholder 1970 timestamps and `0.0` coordinates before GPS lock.
//!
//! Parsing is lenient per row (a malformed row is logged and skipped) but
//! strict per file: an empty log, a log with no usable samples, or a flight
//! shorter than [`MIN_FLIGHT_SECONDS`] is rejected with a typed error.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::warn;

use crate::error::{LogbookError, Result};
use crate::track::{annotate_distances_from_start, TrackPoint};

/// Logs spanning less than this are treated as bench tests, not flights.
pub const MIN_FLIGHT_SECONDS: f64 = 30.0;

/// A telemetry log parsed into track points, ready for preview or upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLog {
    /// Aircraft name recovered from the log or the filename prefix.
    pub drone_name: Option<String>,
    pub flight_date: NaiveDate,
    /// Samples in file order, with `distance_from_start` annotated.
    pub points: Vec<TrackPoint>,
    pub duration_seconds: f64,
}

type Row = HashMap<String, String>;

/// Parse a telemetry CSV, detecting the format from its header row.
pub fn parse_log(filename: &str, data: &[u8]) -> Result<ParsedLog> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(data);
    let headers = reader.headers()?.clone();

    let rows: Vec<Row> = reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()?;

    if headers.iter().any(|h| h == "CUSTOM.dateTime") {
        parse_dji(filename, &rows)
    } else if headers.iter().any(|h| h == "1RSS(dB)" || h == "TxBat(V)") {
        parse_edgetx(filename, &rows)
    } else {
        Err(LogbookError::UnknownLogFormat(filename.to_string()))
    }
}

fn reject(filename: &str, reason: &str) -> LogbookError {
    LogbookError::LogRejected {
        filename: filename.to_string(),
        reason: reason.to_string(),
    }
}

/// Non-empty, trimmed cell value.
fn cell<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn base_name(filename: &str) -> &str {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(filename)
}

/// Aircraft name from the filename prefix before the first `-`.
fn drone_name_from_filename(filename: &str) -> Option<String> {
    let prefix = base_name(filename).split('-').next().unwrap_or("").trim();
    (!prefix.is_empty()).then(|| prefix.to_string())
}

/// Shared tail of both parsers: sample-count and duration checks plus
/// distance annotation.
fn finish(
    filename: &str,
    drone_name: Option<String>,
    flight_date: NaiveDate,
    mut points: Vec<TrackPoint>,
) -> Result<ParsedLog> {
    if points.is_empty() {
        return Err(reject(filename, "no valid data"));
    }

    let first = points.iter().map(|p| p.timestamp).min();
    let last = points.iter().map(|p| p.timestamp).max();
    let duration_seconds = match (first, last) {
        (Some(first), Some(last)) => (last - first).num_milliseconds() as f64 / 1000.0,
        _ => 0.0,
    };
    if duration_seconds < MIN_FLIGHT_SECONDS {
        return Err(reject(filename, "short duration"));
    }

    annotate_distances_from_start(&mut points);

    Ok(ParsedLog {
        drone_name,
        flight_date,
        points,
        duration_seconds,
    })
}

// ============================================================================
// EdgeTX
// ============================================================================

fn parse_edgetx(filename: &str, rows: &[Row]) -> Result<ParsedLog> {
    if rows.is_empty() {
        return Err(reject(filename, "empty or malformed"));
    }

    let drone_name = drone_name_from_filename(filename);
    if drone_name.is_none() {
        return Err(reject(filename, "drone name not in filename"));
    }

    let flight_date = cell(&rows[0], "Date")
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .ok_or_else(|| reject(filename, "invalid date format"))?;

    let mut points = Vec::with_capacity(rows.len());
    for row in rows {
        let (Some(date), Some(time)) = (cell(row, "Date"), cell(row, "Time")) else {
            continue;
        };
        let stamp = format!("{date} {time}");
        let timestamp = match NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S%.f") {
            Ok(ts) => ts,
            Err(e) => {
                warn!("[parse_edgetx] {filename}: bad timestamp '{stamp}': {e}");
                continue;
            }
        };

        let mut point = TrackPoint::new(timestamp, None, None);
        // "lat lon" in one column; unparsable GPS means no fix yet.
        if let Some(gps) = cell(row, "GPS") {
            let mut parts = gps.split_whitespace();
            if let (Some(lat), Some(lon)) = (
                parts.next().and_then(|v| v.parse::<f64>().ok()),
                parts.next().and_then(|v| v.parse::<f64>().ok()),
            ) {
                point.latitude = Some(lat);
                point.longitude = Some(lon);
            }
        }
        point.altitude = cell(row, "Alt(m)").and_then(|v| v.parse().ok());
        point.speed = cell(row, "GSpd(kmh)").and_then(|v| v.parse().ok());
        point.rx_bt = cell(row, "RxBt(V)").and_then(|v| v.parse().ok());
        point.rssi = cell(row, "1RSS(dB)").and_then(|v| v.parse().ok());
        point.rqly = cell(row, "RQly(%)").and_then(|v| v.parse().ok());
        points.push(point);
    }

    finish(filename, drone_name, flight_date, points)
}

// ============================================================================
// DJI
// ============================================================================

fn parse_dji_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_utc());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// `0.0` is the DJI placeholder for "no fix", not a real coordinate.
fn dji_coordinate(row: &Row, key: &str) -> Option<f64> {
    cell(row, key)
        .filter(|v| *v != "0.0")
        .and_then(|v| v.parse().ok())
}

fn parse_dji(filename: &str, rows: &[Row]) -> Result<ParsedLog> {
    if rows.is_empty() {
        return Err(reject(filename, "empty or malformed"));
    }

    let drone_name = rows
        .iter()
        .find_map(|row| {
            cell(row, "RECOVER.aircraftName")
                .or_else(|| cell(row, "DETAILS.aircraftName"))
                .map(str::to_string)
        })
        .or_else(|| drone_name_from_filename(filename));

    let mut flight_date = None;
    let mut points = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(raw_stamp) = cell(row, "CUSTOM.dateTime") else {
            continue;
        };
        if raw_stamp.starts_with("1970-01-01") {
            continue;
        }
        let timestamp = match parse_dji_timestamp(raw_stamp) {
            Some(ts) => ts,
            None => {
                warn!("[parse_dji] {filename}: bad timestamp '{raw_stamp}'");
                continue;
            }
        };
        flight_date.get_or_insert(timestamp.date());

        // DJI rows without a fix carry no usable sample at all.
        let (Some(latitude), Some(longitude)) = (
            dji_coordinate(row, "OSD.latitude"),
            dji_coordinate(row, "OSD.longitude"),
        ) else {
            continue;
        };

        let x_speed: f64 = cell(row, "OSD.xSpeed")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0);
        let y_speed: f64 = cell(row, "OSD.ySpeed")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0);

        let mut point = TrackPoint::new(timestamp, None, None);
        point.latitude = Some(latitude);
        point.longitude = Some(longitude);
        point.altitude = cell(row, "OSD.height").and_then(|v| v.parse().ok());
        // m/s components to km/h ground speed
        point.speed = Some((x_speed.powi(2) + y_speed.powi(2)).sqrt() * 3.6);
        point.rssi = cell(row, "RC.downlinkSignal").and_then(|v| v.parse().ok());
        point.rqly = cell(row, "RC.uplinkSignal").and_then(|v| v.parse().ok());
        points.push(point);
    }

    let flight_date = flight_date.ok_or_else(|| reject(filename, "invalid date format"))?;
    finish(filename, drone_name, flight_date, points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edgetx_log(seconds: u32) -> String {
        let mut log =
            String::from("Date,Time,1RSS(dB),RQly(%),RxBt(V),GPS,Alt(m),GSpd(kmh)\n");
        for i in 0..seconds {
            let gps = if i == 0 {
                String::new() // no fix on the first frame
            } else {
                format!("47.0500{i:02} 8.3100{i:02}")
            };
            log.push_str(&format!(
                "2023-06-14,10:00:{:02}.250,-58,99,8.2,{gps},{},{}\n",
                i % 60,
                10 + i,
                18
            ));
        }
        log
    }

    #[test]
    fn test_edgetx_log_parses() {
        let data = edgetx_log(40);
        let parsed = parse_log("Nazgul-2023-06-14.csv", data.as_bytes()).unwrap();

        assert_eq!(parsed.drone_name.as_deref(), Some("Nazgul"));
        assert_eq!(
            parsed.flight_date,
            NaiveDate::from_ymd_opt(2023, 6, 14).unwrap()
        );
        // Fixless rows are kept (radio keeps logging before GPS lock).
        assert_eq!(parsed.points.len(), 40);
        assert!(!parsed.points[0].has_position());
        assert!(parsed.points[1].has_position());
        assert_eq!(parsed.points[1].rssi, Some(-58));
        assert_eq!(parsed.points[1].rqly, Some(99));
        assert_eq!(parsed.points[1].distance_from_start, Some(0.0));
        assert!(parsed.points[39].distance_from_start.unwrap() > 0.0);
        assert!((parsed.duration_seconds - 39.0).abs() < 1e-6);
    }

    #[test]
    fn test_edgetx_short_flight_rejected() {
        let data = edgetx_log(5);
        let err = parse_log("Nazgul-2023-06-14.csv", data.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            LogbookError::LogRejected { ref reason, .. } if reason == "short duration"
        ));
    }

    #[test]
    fn test_edgetx_empty_log_rejected() {
        let data = "Date,Time,1RSS(dB),RQly(%),RxBt(V),GPS,Alt(m),GSpd(kmh)\n";
        let err = parse_log("Nazgul-2023-06-14.csv", data.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            LogbookError::LogRejected { ref reason, .. } if reason == "empty or malformed"
        ));
    }

    fn dji_log() -> String {
        let mut log = String::from(
            "CUSTOM.dateTime,OSD.latitude,OSD.longitude,OSD.height,OSD.xSpeed,OSD.ySpeed,\
             RC.downlinkSignal,RC.uplinkSignal,RECOVER.aircraftName\n",
        );
        // Placeholder timestamp before the clock syncs
        log.push_str("1970-01-01T00:00:00Z,0.0,0.0,0,0,0,,,\n");
        // Synced but no GPS fix yet
        log.push_str("2023-06-14T10:00:00Z,0.0,0.0,0,0,0,90,95,Mavic\n");
        for i in 0..45 {
            log.push_str(&format!(
                "2023-06-14T10:00:{:02}Z,47.10{i:02},8.200,{},3.0,4.0,90,95,Mavic\n",
                (1 + i) % 60,
                15 + i
            ));
        }
        log
    }

    #[test]
    fn test_dji_log_parses() {
        let data = dji_log();
        let parsed = parse_log("DJIFlightRecord.csv", data.as_bytes()).unwrap();

        assert_eq!(parsed.drone_name.as_deref(), Some("Mavic"));
        assert_eq!(
            parsed.flight_date,
            NaiveDate::from_ymd_opt(2023, 6, 14).unwrap()
        );
        // Placeholder and fixless rows are dropped entirely.
        assert_eq!(parsed.points.len(), 45);
        assert!(parsed.points.iter().all(TrackPoint::has_position));
        // sqrt(3^2 + 4^2) m/s = 5 m/s = 18 km/h
        let speed = parsed.points[0].speed.unwrap();
        assert!((speed - 18.0).abs() < 1e-9, "got {speed}");
        assert_eq!(parsed.points[0].rssi, Some(90));
    }

    #[test]
    fn test_dji_date_from_first_synced_timestamp() {
        // The fixless-but-synced row still sets the flight date.
        let data = dji_log();
        let parsed = parse_log("DJIFlightRecord.csv", data.as_bytes()).unwrap();
        assert_eq!(
            parsed.flight_date,
            NaiveDate::from_ymd_opt(2023, 6, 14).unwrap()
        );
    }

    #[test]
    fn test_unknown_format_rejected() {
        let data = "a,b,c\n1,2,3\n";
        let err = parse_log("mystery.csv", data.as_bytes()).unwrap_err();
        assert!(matches!(err, LogbookError::UnknownLogFormat(_)));
    }
}
