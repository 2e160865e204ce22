//! # Flight Logbook
//!
//! Client core for a drone flight logbook service.
//!
//! The service stores pilots, drones, battery packs, flight locations, and
//! flights with imported CSV telemetry tracks. This library provides
//! everything a table/map/chart front end needs between "HTTP response" and
//! "render payload":
//!
//! - Typed records for every API entity
//! - An async REST client (skip/limit pagination, JSON and multipart bodies)
//! - A comparator factory and an explicitly stable sort
//! - GPS track decimation for map rendering
//! - Per-page table view-models (typed filters, one active sort, pagination,
//!   stale-fetch rejection)
//! - EdgeTX and DJI telemetry CSV parsing
//!
//! ## Features
//!
//! - **`http`** (default) - async REST client and the debounced-save helper
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use flight_logbook::{decimate, TrackPoint};
//!
//! let start = NaiveDate::from_ymd_opt(2023, 6, 14)
//!     .unwrap()
//!     .and_hms_opt(10, 0, 0)
//!     .unwrap();
//!
//! // One telemetry sample per second, drifting north ~1.1 m each.
//! let track: Vec<TrackPoint> = (0..120)
//!     .map(|i| {
//!         TrackPoint::new(
//!             start + chrono::Duration::seconds(i),
//!             Some(47.05 + i as f64 * 1e-5),
//!             Some(8.31),
//!         )
//!     })
//!     .collect();
//!
//! // Thin the track for default map rendering; the full track stays
//! // available behind the user's "show all points" toggle.
//! let rendered: Vec<&TrackPoint> = decimate(&track).collect();
//! assert!(rendered.len() < track.len());
//! assert_eq!(rendered[0].timestamp, track[0].timestamp);
//! ```

// Unified error handling
pub mod error;
pub use error::{LogbookError, Result};

// Comparator factory and stable sort
pub mod sort;
pub use sort::{
    field_comparator, stable_sort, DerivedRecord, FieldValue, SortDirection, SortState,
    TableRecord,
};

// GPS track utilities (haversine, decimation, durations)
pub mod track;
pub use track::{
    annotate_distances_from_start, decimate, haversine_distance, robust_duration, Decimated,
    TrackPoint, DECIMATION_MIN_SPACING_M, EARTH_RADIUS_M,
};

// Typed API records
pub mod models;
pub use models::{
    Acknowledgement, AltitudeOffsetUpdate, AppSetting, BatteryPack, BatteryPackUsage,
    BulkImportReport, BulkImportResult, DashboardStatistics, Drone, Flight, FlightLocation,
    FlightLocationWithStats, FlightPage, FlightSummary, FlightsPerDrone, LocationStatistics,
    NewBatteryPack, NewDrone, NewFlight, NewFlightLocation, NewPilot, Pilot, PilotUpdate,
    ValidityUpdate, MISSING_LOCATION_SENTINEL,
};

// Per-page table view-models
pub mod view;
pub use view::{FilterKind, FilterSchema, FilterValue, PageState, TableView};
#[cfg(feature = "http")]
pub use view::Debouncer;

// Telemetry CSV parsing
pub mod telemetry;
pub use telemetry::{parse_log, ParsedLog, MIN_FLIGHT_SECONDS};

// REST client
#[cfg(feature = "http")]
pub mod client;
#[cfg(feature = "http")]
pub use client::{FlightQuery, LogbookClient};
