//! Typed records for the logbook REST API.
//!
//! Field names mirror the service's JSON bodies one-to-one. Response types
//! carry server-assigned ids; `New*` types are request bodies for create and
//! update operations.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::sort::{DerivedRecord, TableRecord};
use crate::track::TrackPoint;

/// Sort key used for a flight without an assigned location.
///
/// `~` sorts after every ASCII letter, so unassigned flights land at the end
/// of an ascending location sort instead of interleaving with real names.
pub const MISSING_LOCATION_SENTINEL: &str = "~";

// ============================================================================
// Core Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pilot {
    pub id: i64,
    pub name: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drone {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightLocation {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub notes: Option<String>,
    pub is_valid: bool,
    #[serde(default)]
    pub invalidation_notes: Option<String>,
    #[serde(default)]
    pub altitude_offset: Option<f64>,
}

/// Location list entry: the location plus its valid-flight count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightLocationWithStats {
    #[serde(flatten)]
    pub location: FlightLocation,
    pub flight_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryPack {
    pub id: i64,
    pub number: String,
    pub name: String,
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub cycles: i64,
    #[serde(default)]
    pub voltage_level: Option<String>,
    #[serde(default)]
    pub capacity_mah: Option<i64>,
    /// Populated on the battery-pack detail and list endpoints.
    #[serde(default)]
    pub flights: Vec<FlightSummary>,
}

/// Flight as embedded in battery-pack payloads: no pilot/drone expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSummary {
    pub id: i64,
    pub pilot_id: i64,
    pub drone_id: i64,
    pub flight_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub csv_log_path: Option<String>,
    #[serde(default)]
    pub flight_data: Vec<TrackPoint>,
    #[serde(default)]
    pub flight_location: Option<FlightLocation>,
    pub is_valid: bool,
    #[serde(default)]
    pub invalidation_notes: Option<String>,
}

/// Fully expanded flight, as returned by the flights endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: i64,
    pub pilot_id: i64,
    pub drone_id: i64,
    pub flight_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub csv_log_path: Option<String>,
    #[serde(default)]
    pub flight_data: Vec<TrackPoint>,
    #[serde(default)]
    pub flight_location: Option<FlightLocation>,
    #[serde(default)]
    pub battery_packs: Vec<BatteryPack>,
    pub pilot: Pilot,
    pub drone: Drone,
    pub is_valid: bool,
    #[serde(default)]
    pub invalidation_notes: Option<String>,
    /// Robust flight duration in seconds, computed server-side.
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Payload of the paginated flights listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPage {
    pub total_flights: u64,
    pub flights: Vec<Flight>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSetting {
    pub key: String,
    pub value: String,
}

// ============================================================================
// Request Bodies
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPilot {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PilotUpdate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDrone {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFlightLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude_offset: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBatteryPack {
    pub number: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycles: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_mah: Option<i64>,
}

/// Create/update body for flights. The service expects a datetime for the
/// flight date and truncates it to a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFlight {
    pub pilot_id: i64,
    pub drone_id: i64,
    pub flight_date: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Manually captured track, for flights created without a log upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_data: Option<Vec<TrackPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_pack_ids: Option<Vec<i64>>,
}

/// Body for the set-validity endpoints (flights and locations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidityUpdate {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalidation_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltitudeOffsetUpdate {
    pub altitude_offset: f64,
}

// ============================================================================
// Statistics Payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStatistics {
    pub total_flights: u64,
    pub total_pilots: u64,
    pub total_drones: u64,
    pub total_flight_duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightsPerDrone {
    pub drone_id: i64,
    pub drone_name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationStatistics {
    pub total_flights: u64,
    pub total_flight_duration_seconds: f64,
    pub total_distance_meters: f64,
    pub flights_per_drone: Vec<FlightsPerDrone>,
    #[serde(default)]
    pub first_flight_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub last_flight_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryPackUsage {
    pub battery_pack: BatteryPack,
    pub flight_count: u64,
    pub total_duration_seconds: f64,
}

/// Generic `{"message": ...}` acknowledgement returned by delete and import
/// endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub message: String,
}

/// Per-file outcome of a bulk CSV import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkImportResult {
    pub status: String,
    pub filename: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Payload of the bulk CSV import endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkImportReport {
    pub message: String,
    pub results: Vec<BulkImportResult>,
}

// ============================================================================
// Enrichment
// ============================================================================

impl TableRecord for Flight {
    /// Flights sort by date, pilot/drone/location display name, and duration.
    /// An unassigned location becomes [`MISSING_LOCATION_SENTINEL`] so it
    /// sorts after every named location.
    fn derived(&self) -> DerivedRecord {
        let location = self
            .flight_location
            .as_ref()
            .map_or(MISSING_LOCATION_SENTINEL, |loc| loc.name.as_str());

        DerivedRecord::new(self.id)
            .with("flight_date", self.flight_date.to_string())
            .with("pilot", self.pilot.name.as_str())
            .with("drone", self.drone.name.as_str())
            .with("location", location)
            .with("duration", self.duration.unwrap_or(0.0))
    }
}

impl TableRecord for Pilot {
    fn derived(&self) -> DerivedRecord {
        DerivedRecord::new(self.id)
            .with("name", self.name.as_str())
            .with("is_default", i64::from(self.is_default))
    }
}

impl TableRecord for Drone {
    fn derived(&self) -> DerivedRecord {
        DerivedRecord::new(self.id)
            .with("name", self.name.as_str())
            .with("notes", self.notes.clone())
    }
}

impl TableRecord for FlightLocationWithStats {
    fn derived(&self) -> DerivedRecord {
        DerivedRecord::new(self.location.id)
            .with("name", self.location.name.as_str())
            .with("flight_count", self.flight_count)
            .with("is_valid", i64::from(self.location.is_valid))
    }
}

impl TableRecord for BatteryPack {
    fn derived(&self) -> DerivedRecord {
        DerivedRecord::new(self.id)
            .with("number", self.number.as_str())
            .with("name", self.name.as_str())
            .with("cycles", self.cycles)
            .with("purchase_date", self.purchase_date.map(|d| d.to_string()))
            .with("capacity_mah", self.capacity_mah)
    }
}
