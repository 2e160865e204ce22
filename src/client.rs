//! Async REST client for the logbook service.
//!
//! Thin typed wrappers over every endpoint. List endpoints are
//! server-paginated via `skip`/`limit` query parameters; create/update
//! bodies are JSON; log and backup imports are multipart uploads.
//!
//! There is no retry layer: a failed call surfaces as an error and the
//! caller keeps whatever it last rendered (stale-but-visible).

use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{LogbookError, Result};
use crate::models::{
    Acknowledgement, AppSetting, BatteryPack, BatteryPackUsage, BulkImportReport,
    DashboardStatistics, Drone, Flight, FlightLocation, FlightLocationWithStats, FlightPage,
    LocationStatistics, NewBatteryPack, NewDrone, NewFlight, NewFlightLocation, NewPilot, Pilot,
    PilotUpdate, AltitudeOffsetUpdate, ValidityUpdate,
};
use crate::view::{FilterValue, TableView};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// In-flight request cap for multi-flight fetches.
const MAX_CONCURRENT_FETCHES: usize = 8;

// ============================================================================
// Flight Query
// ============================================================================

/// Typed query for the paginated flights listing.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightQuery {
    pub skip: u64,
    pub limit: u64,
    pub location_id: Option<i64>,
    pub drone_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub include_invalid: bool,
}

impl Default for FlightQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 25,
            location_id: None,
            drone_id: None,
            start_date: None,
            end_date: None,
            include_invalid: false,
        }
    }
}

impl FlightQuery {
    /// Build the query for a flights page view: its pagination window plus
    /// every active typed filter.
    pub fn from_view(view: &TableView) -> Self {
        let mut query = Self {
            skip: view.page().skip(),
            limit: view.page().page_size,
            ..Self::default()
        };
        if let Some(FilterValue::Id(id)) = view.filter("location_id") {
            query.location_id = Some(*id);
        }
        if let Some(FilterValue::Id(id)) = view.filter("drone_id") {
            query.drone_id = Some(*id);
        }
        if let Some(FilterValue::Date(date)) = view.filter("start_date") {
            query.start_date = Some(*date);
        }
        if let Some(FilterValue::Date(date)) = view.filter("end_date") {
            query.end_date = Some(*date);
        }
        if let Some(FilterValue::Flag(flag)) = view.filter("include_invalid") {
            query.include_invalid = *flag;
        }
        query
    }

    fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("skip".to_string(), self.skip.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        if let Some(id) = self.location_id {
            pairs.push(("location_id".to_string(), id.to_string()));
        }
        if let Some(id) = self.drone_id {
            pairs.push(("drone_id".to_string(), id.to_string()));
        }
        if let Some(date) = self.start_date {
            pairs.push(("start_date".to_string(), date.to_string()));
        }
        if let Some(date) = self.end_date {
            pairs.push(("end_date".to_string(), date.to_string()));
        }
        if self.include_invalid {
            pairs.push(("include_invalid".to_string(), "true".to_string()));
        }
        pairs
    }
}

// ============================================================================
// Client
// ============================================================================

/// Typed client for the logbook REST API.
pub struct LogbookClient {
    client: Client,
    base_url: String,
}

impl LogbookClient {
    /// Create a client against a base URL (e.g. `http://localhost:8000` or
    /// the resolved `/api` proxy prefix).
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-success status to a typed error carrying the body text.
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        warn!("[LogbookClient] HTTP {status}: {message}");
        Err(LogbookError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        debug!("[LogbookClient] GET {path}");
        let response = self.client.get(self.url(path)).query(query).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        debug!("[LogbookClient] POST {path}");
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        debug!("[LogbookClient] PUT {path}");
        let response = self.client.put(self.url(path)).json(body).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn put_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!("[LogbookClient] PUT {path}");
        let response = self.client.put(self.url(path)).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!("[LogbookClient] DELETE {path}");
        let response = self.client.delete(self.url(path)).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    fn paging(skip: u64, limit: u64) -> Vec<(String, String)> {
        vec![
            ("skip".to_string(), skip.to_string()),
            ("limit".to_string(), limit.to_string()),
        ]
    }

    // ========================================================================
    // Pilots
    // ========================================================================

    pub async fn list_pilots(&self, skip: u64, limit: u64) -> Result<Vec<Pilot>> {
        self.get_json("/pilots/", &Self::paging(skip, limit)).await
    }

    pub async fn get_pilot(&self, id: i64) -> Result<Pilot> {
        self.get_json(&format!("/pilots/{id}"), &[]).await
    }

    pub async fn create_pilot(&self, pilot: &NewPilot) -> Result<Pilot> {
        self.post_json("/pilots/", pilot).await
    }

    pub async fn update_pilot(&self, id: i64, pilot: &PilotUpdate) -> Result<Pilot> {
        self.put_json(&format!("/pilots/{id}"), pilot).await
    }

    /// Make this pilot the default, unsetting any previous default.
    pub async fn set_default_pilot(&self, id: i64) -> Result<Pilot> {
        self.put_empty(&format!("/pilots/{id}/set_default")).await
    }

    pub async fn delete_pilot(&self, id: i64) -> Result<Acknowledgement> {
        self.delete_json(&format!("/pilots/{id}")).await
    }

    // ========================================================================
    // Drones
    // ========================================================================

    pub async fn list_drones(&self, skip: u64, limit: u64) -> Result<Vec<Drone>> {
        self.get_json("/drones/", &Self::paging(skip, limit)).await
    }

    pub async fn get_drone(&self, id: i64) -> Result<Drone> {
        self.get_json(&format!("/drones/{id}"), &[]).await
    }

    pub async fn create_drone(&self, drone: &NewDrone) -> Result<Drone> {
        self.post_json("/drones/", drone).await
    }

    pub async fn update_drone(&self, id: i64, drone: &NewDrone) -> Result<Drone> {
        self.put_json(&format!("/drones/{id}"), drone).await
    }

    pub async fn delete_drone(&self, id: i64) -> Result<Acknowledgement> {
        self.delete_json(&format!("/drones/{id}")).await
    }

    /// Per-battery-pack usage stats across this drone's valid flights.
    pub async fn battery_pack_usage(&self, drone_id: i64) -> Result<Vec<BatteryPackUsage>> {
        self.get_json(&format!("/drones/{drone_id}/battery_pack_usage"), &[])
            .await
    }

    // ========================================================================
    // Battery Packs
    // ========================================================================

    pub async fn list_battery_packs(&self, skip: u64, limit: u64) -> Result<Vec<BatteryPack>> {
        self.get_json("/battery_packs/", &Self::paging(skip, limit))
            .await
    }

    pub async fn get_battery_pack(&self, id: i64) -> Result<BatteryPack> {
        self.get_json(&format!("/battery_packs/{id}"), &[]).await
    }

    pub async fn create_battery_pack(&self, pack: &NewBatteryPack) -> Result<BatteryPack> {
        self.post_json("/battery_packs/", pack).await
    }

    pub async fn update_battery_pack(
        &self,
        id: i64,
        pack: &NewBatteryPack,
    ) -> Result<BatteryPack> {
        self.put_json(&format!("/battery_packs/{id}"), pack).await
    }

    pub async fn delete_battery_pack(&self, id: i64) -> Result<Acknowledgement> {
        self.delete_json(&format!("/battery_packs/{id}")).await
    }

    // ========================================================================
    // Flight Locations
    // ========================================================================

    pub async fn list_flight_locations(
        &self,
        skip: u64,
        limit: u64,
        include_invalid: bool,
    ) -> Result<Vec<FlightLocationWithStats>> {
        let mut query = Self::paging(skip, limit);
        if include_invalid {
            query.push(("include_invalid".to_string(), "true".to_string()));
        }
        self.get_json("/flight_locations/", &query).await
    }

    pub async fn get_flight_location(&self, id: i64) -> Result<FlightLocation> {
        self.get_json(&format!("/flight_locations/{id}"), &[]).await
    }

    pub async fn create_flight_location(
        &self,
        location: &NewFlightLocation,
    ) -> Result<FlightLocation> {
        self.post_json("/flight_locations/", location).await
    }

    pub async fn update_flight_location(
        &self,
        id: i64,
        location: &NewFlightLocation,
    ) -> Result<FlightLocation> {
        self.put_json(&format!("/flight_locations/{id}"), location)
            .await
    }

    pub async fn set_location_validity(
        &self,
        id: i64,
        update: &ValidityUpdate,
    ) -> Result<FlightLocation> {
        self.put_json(&format!("/flight_locations/{id}/set_validity"), update)
            .await
    }

    /// Persist the location's altitude offset (the debounced auto-save
    /// target of the location editor).
    pub async fn set_altitude_offset(&self, id: i64, altitude_offset: f64) -> Result<FlightLocation> {
        self.put_json(
            &format!("/flight_locations/{id}/altitude_offset"),
            &AltitudeOffsetUpdate { altitude_offset },
        )
        .await
    }

    pub async fn delete_flight_location(&self, id: i64) -> Result<Acknowledgement> {
        self.delete_json(&format!("/flight_locations/{id}")).await
    }

    pub async fn location_statistics(&self, id: i64) -> Result<LocationStatistics> {
        self.get_json(&format!("/flight_locations/{id}/statistics"), &[])
            .await
    }

    // ========================================================================
    // Flights
    // ========================================================================

    pub async fn list_flights(&self, query: &FlightQuery) -> Result<FlightPage> {
        self.get_json("/flights/", &query.to_pairs()).await
    }

    pub async fn get_flight(&self, id: i64) -> Result<Flight> {
        self.get_json(&format!("/flights/{id}"), &[]).await
    }

    /// Fetch several flights' full records concurrently (the map overlay
    /// renders multiple tracks at once). Results keep the input order; a
    /// failed fetch surfaces as its own error without aborting the rest.
    pub async fn fetch_flights(&self, ids: &[i64]) -> Vec<Result<Flight>> {
        use futures::stream::{self, StreamExt};

        info!(
            "[LogbookClient] Fetching {} flights with {} concurrent requests",
            ids.len(),
            MAX_CONCURRENT_FETCHES
        );
        let results: Vec<Result<Flight>> = stream::iter(ids)
            .map(|id| self.get_flight(*id))
            .buffered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await;

        let failures = results.iter().filter(|r| r.is_err()).count();
        if failures > 0 {
            warn!(
                "[LogbookClient] {}/{} flight fetches failed",
                failures,
                ids.len()
            );
        }
        results
    }

    pub async fn create_flight(&self, flight: &NewFlight) -> Result<Flight> {
        self.post_json("/flights/", flight).await
    }

    pub async fn update_flight(&self, id: i64, flight: &NewFlight) -> Result<Flight> {
        self.put_json(&format!("/flights/{id}"), flight).await
    }

    pub async fn delete_flight(&self, id: i64) -> Result<Acknowledgement> {
        self.delete_json(&format!("/flights/{id}")).await
    }

    pub async fn set_flight_validity(&self, id: i64, update: &ValidityUpdate) -> Result<Flight> {
        self.put_json(&format!("/flights/{id}/set_validity"), update)
            .await
    }

    pub async fn assign_location(&self, flight_id: i64, location_id: i64) -> Result<Flight> {
        self.put_empty(&format!(
            "/flights/{flight_id}/assign_location/{location_id}"
        ))
        .await
    }

    // ========================================================================
    // Statistics & Settings
    // ========================================================================

    pub async fn dashboard_statistics(&self) -> Result<DashboardStatistics> {
        self.get_json("/statistics/", &[]).await
    }

    pub async fn get_setting(&self, key: &str) -> Result<AppSetting> {
        self.get_json(&format!("/settings/{key}"), &[]).await
    }

    pub async fn save_setting(&self, setting: &AppSetting) -> Result<AppSetting> {
        self.post_json("/settings", setting).await
    }

    // ========================================================================
    // Imports & Backups
    // ========================================================================

    /// Upload one telemetry CSV for processing into a flight.
    pub async fn upload_csv(
        &self,
        filename: &str,
        data: Vec<u8>,
        pilot_id: i64,
        drone_id: Option<i64>,
    ) -> Result<Acknowledgement> {
        info!("[LogbookClient] Uploading log '{filename}' ({} bytes)", data.len());
        let file = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("text/csv")?;
        let mut form = Form::new()
            .part("file", file)
            .text("pilot_id", pilot_id.to_string());
        if let Some(drone_id) = drone_id {
            form = form.text("drone_id", drone_id.to_string());
        }

        let response = self
            .client
            .post(self.url("/flights/upload_csv"))
            .multipart(form)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Trigger a server-side bulk import of the log drop directory.
    pub async fn import_all_csvs(&self, pilot_id: i64) -> Result<BulkImportReport> {
        info!("[LogbookClient] Starting bulk CSV import for pilot {pilot_id}");
        let response = self
            .client
            .post(self.url("/flights/import_all_csvs"))
            .form(&[("pilot_id", pilot_id.to_string())])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Full database export as JSON bytes.
    pub async fn export_database(&self) -> Result<Vec<u8>> {
        let response = self.client.get(self.url("/export_db")).send().await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Restore a database from a previously exported JSON document.
    pub async fn import_database(&self, data: Vec<u8>) -> Result<Acknowledgement> {
        info!("[LogbookClient] Importing database ({} bytes)", data.len());
        let file = Part::bytes(data)
            .file_name("database.json".to_string())
            .mime_str("application/json")?;
        let response = self
            .client
            .post(self.url("/import_db"))
            .multipart(Form::new().part("file", file))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Full backup (database plus uploads) as a ZIP archive.
    pub async fn export_backup(&self) -> Result<Vec<u8>> {
        let response = self.client.get(self.url("/admin/export_zip")).send().await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Restore a full ZIP backup.
    pub async fn import_backup(&self, filename: &str, data: Vec<u8>) -> Result<Acknowledgement> {
        info!("[LogbookClient] Importing backup '{filename}' ({} bytes)", data.len());
        let file = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("application/zip")?;
        let response = self
            .client
            .post(self.url("/admin/import_zip"))
            .multipart(Form::new().part("file", file))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}
