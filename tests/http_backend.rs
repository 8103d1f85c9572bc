use std::collections::BTreeSet;
use std::sync::Arc;

use httptest::matchers::{all_of, contains, request, url_decoded};
use httptest::responders::{json_encoded, status_code};
use httptest::{Expectation, Server};
use serde_json::json;

use spotgrid::{
    AppConfig, AppError, CellCache, FetchCoordinator, GridCellId, HttpSpotBackend, SpotBackend,
};

fn backend_for(server: &Server) -> HttpSpotBackend {
    let config = AppConfig {
        spots_api_base: server.url("/").to_string(),
        http_timeout_ms: 2_000,
        ..AppConfig::default()
    };
    HttpSpotBackend::new(&config).unwrap()
}

fn cell(raw: &str) -> GridCellId {
    raw.parse().unwrap()
}

#[tokio::test]
async fn fetches_cell_with_numeric_strings() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/api/fitness-spots/"),
            request::query(url_decoded(contains(("gridId", "3-4")))),
        ])
        .respond_with(json_encoded(json!({
            "spots": [{
                "place_id": "ChIJ-gym",
                "name": "Kota Gym",
                "address": "Jl. Margonda 1",
                "latitude": "-6.37",
                "longitude": 106.82,
                "rating": "4.6",
                "rating_count": 120,
                "opening_hours": ["Mon 06:00-22:00"]
            }]
        }))),
    );

    let spots = backend_for(&server).fetch_cell(cell("3-4")).await.unwrap();
    assert_eq!(spots.len(), 1);
    let spot = &spots[0];
    let position = spot.position().unwrap();
    assert!((position.lat + 6.37).abs() < 1e-9);
    assert!((position.lng - 106.82).abs() < 1e-9);
    assert_eq!(spot.rating_value(), Some(4.6));
    assert!(spot.extra.contains_key("opening_hours"));
}

#[tokio::test]
async fn malformed_spot_does_not_fail_its_cell() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::path("/api/fitness-spots/")).respond_with(json_encoded(
            json!({
                "spots": [
                    { "place_id": "good", "name": "Good Gym", "latitude": "-6.37", "longitude": 106.82 },
                    { "place_id": "no-lat", "name": "No Lat", "latitude": null, "longitude": 106.8 },
                    { "place_id": "nameless", "name": null, "address": null, "latitude": -6.36, "longitude": 106.81 },
                    { "place_id": "odd-count", "latitude": -6.36, "longitude": 106.81, "rating_count": "many" },
                    { "name": "No Id", "latitude": -6.36, "longitude": 106.81 }
                ]
            }),
        )),
    );

    let cache = Arc::new(CellCache::new());
    let fetcher = FetchCoordinator::new(Arc::new(backend_for(&server)), Arc::clone(&cache), 1);
    let visible: BTreeSet<GridCellId> = [cell("4-3")].into_iter().collect();
    fetcher.ensure_loaded(&visible).await;

    let record = cache.get(&cell("4-3")).unwrap();
    assert!(!record.is_failed());
    let ids: Vec<&str> = record.spots().iter().map(|s| s.place_id.as_str()).collect();
    assert_eq!(ids, vec!["good", "no-lat", "nameless"]);
    assert!(record.spots()[0].position().is_some());
    assert!(record.spots()[1].position().is_none());
    assert_eq!(record.spots()[2].name, "");
}

#[tokio::test]
async fn missing_spots_field_reads_as_empty_cell() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::path("/api/fitness-spots/"))
            .respond_with(json_encoded(json!({ "grid_id": "9-9" }))),
    );

    let spots = backend_for(&server).fetch_cell(cell("9-9")).await.unwrap();
    assert!(spots.is_empty());
}

#[tokio::test]
async fn server_error_leaves_a_failed_record_that_is_not_retried() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::path("/api/fitness-spots/"))
            .times(1)
            .respond_with(status_code(500)),
    );

    let cache = Arc::new(CellCache::new());
    let fetcher = FetchCoordinator::new(Arc::new(backend_for(&server)), Arc::clone(&cache), 1);
    let visible: BTreeSet<GridCellId> = [cell("3-4")].into_iter().collect();

    let first = fetcher.ensure_loaded(&visible).await;
    assert_eq!(first.fetched, 1);
    assert!(cache.get(&cell("3-4")).unwrap().is_failed());

    let second = fetcher.ensure_loaded(&visible).await;
    assert_eq!(second.already_cached, 1);
    assert_eq!(fetcher.fetches_issued(), 1);
}

#[tokio::test]
async fn boundary_parses_and_tolerates_absence() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::path("/api/map-boundaries/")).respond_with(json_encoded(
            json!({ "north": -6.1, "south": -6.6, "east": 107.1, "west": "106.6" }),
        )),
    );
    let boundary = backend_for(&server).fetch_boundary().await.unwrap();
    // a non-numeric edge means no usable boundary
    assert!(boundary.is_none());

    let server = Server::run();
    server.expect(
        Expectation::matching(request::path("/api/map-boundaries/")).respond_with(json_encoded(
            json!({ "north": -6.1, "south": -6.6, "east": 107.1, "west": 106.6 }),
        )),
    );
    let boundary = backend_for(&server).fetch_boundary().await.unwrap().unwrap();
    assert_eq!(boundary.north, -6.1);
    assert_eq!(boundary.west, 106.6);

    let server = Server::run();
    server.expect(
        Expectation::matching(request::path("/api/map-boundaries/"))
            .respond_with(status_code(404)),
    );
    assert!(backend_for(&server).fetch_boundary().await.unwrap().is_none());
}

#[tokio::test]
async fn communities_surface_backend_errors() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::path("/community/by-place-json/ChIJ-gym/")).respond_with(
            json_encoded(json!({
                "communities": [{
                    "id": 3,
                    "name": "Morning Lifters",
                    "description": "Weekday sessions",
                    "contact_info": null
                }]
            })),
        ),
    );
    server.expect(
        Expectation::matching(request::path("/community/by-place-json/missing/")).respond_with(
            status_code(404)
                .append_header("content-type", "application/json")
                .body(r#"{"error": "Fitness spot not found"}"#),
        ),
    );

    let backend = backend_for(&server);
    let communities = backend
        .communities_for(&"ChIJ-gym".to_string())
        .await
        .unwrap();
    assert_eq!(communities.len(), 1);
    assert_eq!(communities[0].name, "Morning Lifters");

    let err = backend
        .communities_for(&"missing".to_string())
        .await
        .unwrap_err();
    match err {
        AppError::Backend(message) => assert!(message.contains("Fitness spot not found")),
        other => panic!("unexpected error: {other:?}"),
    }
}
