//! End-to-end pipeline tests on canned payloads: decode a flights page,
//! enrich to derived records, and drive a table view through filter, sort,
//! pagination, and overlapping-fetch scenarios.

use chrono::NaiveDate;
use flight_logbook::{
    decimate, parse_log, FilterSchema, FilterValue, FlightPage, SortDirection, SortState,
    TableRecord, TableView, MISSING_LOCATION_SENTINEL,
};

fn flight_json(id: i64, date: &str, drone: &str, location: Option<&str>, duration: f64) -> String {
    let location = match location {
        Some(name) => format!(
            r#"{{"id": 9, "name": "{name}", "latitude": 47.1, "longitude": 8.2,
                "notes": null, "is_valid": true, "invalidation_notes": null,
                "altitude_offset": 0.0}}"#
        ),
        None => "null".to_string(),
    };
    format!(
        r#"{{
            "id": {id},
            "pilot_id": 1,
            "drone_id": 2,
            "flight_date": "{date}",
            "notes": null,
            "csv_log_path": null,
            "flight_data": [],
            "flight_location": {location},
            "battery_packs": [],
            "pilot": {{"id": 1, "name": "Alex", "is_default": true}},
            "drone": {{"id": 2, "name": "{drone}", "notes": null}},
            "is_valid": true,
            "invalidation_notes": null,
            "duration": {duration}
        }}"#
    )
}

fn sample_page() -> FlightPage {
    let flights = [
        flight_json(10, "2023-06-14", "Nazgul", Some("Old Quarry"), 310.0),
        flight_json(11, "2023-06-14", "Nazgul", None, 95.0),
        flight_json(12, "2023-05-02", "Mavic", Some("Canal Field"), 512.0),
    ]
    .join(",");
    let json = format!(r#"{{"total_flights": 57, "flights": [{flights}]}}"#);
    serde_json::from_str(&json).unwrap()
}

#[test]
fn flights_page_renders_sorted_and_enriched() {
    let page = sample_page();
    let mut view = TableView::new(FilterSchema::flights(), 25);

    let generation = view.begin_fetch();
    assert!(view.apply_records(generation, &page.flights, page.total_flights));
    assert_eq!(view.total(), 57);
    assert!(view.has_next_page());

    // Location ascending: named locations first, the unassigned flight last.
    view.set_sort(SortState::new("location", SortDirection::Ascending));
    let ids: Vec<i64> = view.rows().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![12, 10, 11]);

    // Date descending with a duplicate date: the tie keeps input order.
    view.set_sort(SortState::new("flight_date", SortDirection::Descending));
    let ids: Vec<i64> = view.rows().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![10, 11, 12]);
}

#[test]
fn missing_location_enriches_to_sentinel() {
    let page = sample_page();
    let derived = page.flights[1].derived();
    assert_eq!(
        derived.fields.get("location"),
        Some(&flight_logbook::FieldValue::Text(
            MISSING_LOCATION_SENTINEL.to_string()
        ))
    );
}

#[test]
fn filter_change_resets_pagination_before_next_fetch() {
    let mut view = TableView::new(FilterSchema::flights(), 25);
    view.set_page_index(3);
    assert_eq!(view.page().skip(), 75);

    view.set_filter(
        "start_date",
        FilterValue::Date(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()),
    )
    .unwrap();

    // The query issued after the filter change starts from page 0.
    let pairs = view.query_pairs();
    assert!(pairs.contains(&("skip".to_string(), "0".to_string())));
    assert!(pairs.contains(&("start_date".to_string(), "2023-06-01".to_string())));
}

#[test]
fn superseded_fetch_result_is_discarded() {
    let page = sample_page();
    let mut view = TableView::new(FilterSchema::flights(), 25);

    // First fetch goes out; before it lands, the user filters again.
    let first = view.begin_fetch();
    view.set_filter("drone_id", FilterValue::Id(2)).unwrap();
    let second = view.begin_fetch();

    // The newer response lands first.
    assert!(view.apply_records(second, &page.flights[..1], 1));
    assert_eq!(view.rows().len(), 1);

    // The stale response arrives late and must not clobber the view.
    assert!(!view.apply_records(first, &page.flights, page.total_flights));
    assert_eq!(view.rows().len(), 1);
    assert_eq!(view.total(), 1);
}

#[test]
fn locations_page_sorts_by_flight_count() {
    let json = r#"[
        {"id": 1, "name": "Old Quarry", "latitude": 47.1, "longitude": 8.2,
         "notes": null, "is_valid": true, "invalidation_notes": null,
         "altitude_offset": 0.0, "flight_count": 9},
        {"id": 2, "name": "Canal Field", "latitude": 47.2, "longitude": 8.3,
         "notes": null, "is_valid": true, "invalidation_notes": null,
         "altitude_offset": 2.5, "flight_count": 31},
        {"id": 3, "name": "Hilltop", "latitude": 47.3, "longitude": 8.4,
         "notes": null, "is_valid": false, "invalidation_notes": "flooded",
         "altitude_offset": 0.0, "flight_count": 0}
    ]"#;
    let locations: Vec<flight_logbook::FlightLocationWithStats> =
        serde_json::from_str(json).unwrap();

    let mut view = TableView::new(FilterSchema::flight_locations(), 25);
    view.set_filter("include_invalid", FilterValue::Flag(true))
        .unwrap();

    let generation = view.begin_fetch();
    assert!(view.apply_records(generation, &locations, locations.len() as u64));

    view.set_sort(SortState::new("flight_count", SortDirection::Descending));
    let ids: Vec<i64> = view.rows().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![2, 1, 3]);
}

#[test]
fn imported_log_decimates_for_rendering() {
    // A 90-second EdgeTX log crawling north ~2.2 m per second.
    let mut log = String::from("Date,Time,1RSS(dB),RQly(%),RxBt(V),GPS,Alt(m),GSpd(kmh)\n");
    for i in 0..90 {
        log.push_str(&format!(
            "2023-06-14,10:{:02}:{:02}.000,-60,98,8.1,47.{:06} 8.310000,15,8\n",
            i / 60,
            i % 60,
            50000 + i * 20
        ));
    }

    let parsed = parse_log("Nazgul-2023-06-14.csv", log.as_bytes()).unwrap();
    assert_eq!(parsed.points.len(), 90);

    let rendered: Vec<_> = decimate(&parsed.points).collect();
    assert!(rendered.len() < parsed.points.len());
    assert_eq!(rendered.first().unwrap().timestamp, parsed.points[0].timestamp);
    assert_eq!(
        rendered.last().unwrap().timestamp,
        parsed.points[89].timestamp
    );
}
