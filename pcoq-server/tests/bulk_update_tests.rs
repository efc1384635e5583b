//! Upsert and bulk update tests against a mocked PCO API

use pcoq_common::csv::CsvRow;
use pcoq_server::models::{OutcomeStatus, UpsertAction};
use pcoq_server::services::{bulk_update, upsert_with_details, PcoClient, PcoClientConfig};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> PcoClient {
    PcoClient::new(PcoClientConfig {
        base_url: server.uri(),
        application_id: "app".into(),
        secret: "secret".into(),
        max_requests_per_second: 100,
        max_retries: 3,
        default_retry_after: Duration::from_millis(10),
        max_backoff: Duration::from_secs(1),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn record(value: Value) -> CsvRow {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

fn created(id: &str) -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(json!({
        "data": {"id": id, "type": "Person", "attributes": {}}
    }))
}

#[tokio::test]
async fn test_placeholder_id_creates_without_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/people"))
        .respond_with(created("900"))
        .expect(1)
        .mount(&server)
        .await;

    let report = upsert_with_details(
        &client(&server),
        Some("N/A"),
        &record(json!({"First Name": "Ann"})),
    )
    .await
    .unwrap();

    assert_eq!(report.action, UpsertAction::Created);
    assert_eq!(report.person_id, "900");
}

#[tokio::test]
async fn test_unknown_id_falls_back_to_create() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/people/4242"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/people"))
        .respond_with(created("901"))
        .expect(1)
        .mount(&server)
        .await;

    let report = upsert_with_details(
        &client(&server),
        Some("4242"),
        &record(json!({"Person ID": "4242", "First Name": "Ann"})),
    )
    .await
    .unwrap();

    assert_eq!(report.action, UpsertAction::Created);
    assert_eq!(report.person_id, "901");
}

#[tokio::test]
async fn test_existing_person_is_patched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/people/15"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "15", "type": "Person", "attributes": {"first_name": "Old"}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/people/15"))
        .and(body_partial_json(json!({
            "data": {"type": "Person", "id": "15", "attributes": {"first_name": "New", "grade": 3}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/people"))
        .respond_with(created("999"))
        .expect(0)
        .mount(&server)
        .await;

    let report = upsert_with_details(
        &client(&server),
        Some("15"),
        &record(json!({"First Name": "New", "Grade": "3"})),
    )
    .await
    .unwrap();

    assert_eq!(report.action, UpsertAction::Updated);
    assert_eq!(report.person_id, "15");
    assert!(report.details.is_empty());
}

#[tokio::test]
async fn test_lookup_failure_fails_the_row() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = upsert_with_details(
        &client(&server),
        Some("15"),
        &record(json!({"First Name": "New"})),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_contact_failures_do_not_undo_person() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/people"))
        .respond_with(created("700"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/people/700/phone_numbers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": null})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/people/700/emails"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad email"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/people/700/addresses"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": null})))
        .expect(1)
        .mount(&server)
        .await;

    let row = record(json!({
        "First Name": "Kim",
        "Mobile Phone Number": "(555) 123-4567",
        "Work Phone Number": "555 000 1111",
        "Home Email": "kim@",
        "Home Address Street Line 1": "9 Elm",
        "Home Address City": "Springfield"
    }));
    let report = upsert_with_details(&client(&server), None, &row).await.unwrap();

    assert_eq!(report.action, UpsertAction::Created);
    assert_eq!(
        report.details,
        vec![
            "Mobile phone added".to_string(),
            "Work phone added".to_string(),
            "Home email failed: PCO API error (422): bad email".to_string(),
            "Home address added".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_bulk_rows_isolated_and_ordered() {
    let server = MockServer::start().await;
    // Row 2 looks up an id and PCO fails hard
    Mock::given(method("GET"))
        .and(path("/people/2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("exploded"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/people"))
        .and(body_partial_json(json!({"data": {"attributes": {"first_name": "One"}}})))
        .respond_with(created("101").set_delay(Duration::from_millis(150)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/people"))
        .and(body_partial_json(json!({"data": {"attributes": {"first_name": "Three"}}})))
        .respond_with(created("103"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/people/\d+/.+$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": null})))
        .mount(&server)
        .await;

    let records = vec![
        record(json!({"First Name": "One", "Last Name": "A"})),
        record(json!({"Person ID": "2", "First Name": "Two", "Last Name": "B"})),
        record(json!({"Person ID": "", "First Name": "Three", "Last Name": "C"})),
    ];

    // Three workers: row 1 finishes last but still comes back first
    let report = bulk_update(&client(&server), &records, 3).await;

    assert_eq!(report.results.len(), 3);
    assert_eq!(report.results[0].pco_id, "101");
    assert_eq!(report.results[0].status, OutcomeStatus::Success);
    assert_eq!(report.results[1].status, OutcomeStatus::Error);
    assert_eq!(report.results[1].pco_id, "2");
    assert_eq!(report.results[1].name, "Two B");
    assert_eq!(report.results[1].message, "PCO API error (500): exploded");
    assert_eq!(report.results[2].pco_id, "103");
    assert_eq!(report.results[2].status, OutcomeStatus::Success);

    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.successful, 2);
    assert_eq!(report.summary.errors, 1);
    assert_eq!(report.summary.created, 2);
}
