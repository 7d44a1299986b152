#![allow(clippy::unwrap_used)]
// Integration tests for `NetBoxClient` using wiremock.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rackforge_api::{Error, NetBoxClient, ResourceKind, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, NetBoxClient) {
    let server = MockServer::start().await;
    let token: secrecy::SecretString = "abc123".to_string().into();
    let client = NetBoxClient::new(&server.uri(), &token, &TransportConfig::default()).unwrap();
    (server, client)
}

fn page(results: serde_json::Value, count: i64) -> serde_json::Value {
    json!({ "count": count, "next": null, "previous": null, "results": results })
}

// ── Auth ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_token_header_is_sent() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/dcim/sites/"))
        .and(header("authorization", "Token abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([]), 0)))
        .mount(&server)
        .await;

    let sites = client.all(ResourceKind::Sites).await.unwrap();
    assert!(sites.is_empty());
}

#[tokio::test]
async fn test_unauthorized_maps_to_invalid_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/dcim/sites/"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let result = client.all(ResourceKind::Sites).await;
    assert!(matches!(result, Err(Error::InvalidToken)));
}

// ── Reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_filter_paginates_until_count() {
    let (server, client) = setup().await;

    // Two pages of 100 + a final short page.
    let full: Vec<serde_json::Value> = (0..100).map(|i| json!({"id": i})).collect();
    let tail: Vec<serde_json::Value> = (200..230).map(|i| json!({"id": i})).collect();

    Mock::given(method("GET"))
        .and(path("/api/dcim/devices/"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!(full), 230)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dcim/devices/"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!(full), 230)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dcim/devices/"))
        .and(query_param("offset", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!(tail), 230)))
        .mount(&server)
        .await;

    let devices = client.all(ResourceKind::Devices).await.unwrap();
    assert_eq!(devices.len(), 230);
}

#[tokio::test]
async fn test_get_returns_first_match() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/dcim/devices/"))
        .and(query_param("name", "sw-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            json!([{"id": 11, "name": "sw-01"}, {"id": 12, "name": "sw-01"}]),
            2,
        )))
        .mount(&server)
        .await;

    let device = client
        .get(ResourceKind::Devices, &[("name", "sw-01".into())])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(device.id(), 11);
}

#[tokio::test]
async fn test_get_by_id_404_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/dcim/cables/99/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .mount(&server)
        .await;

    let cable = client.get_by_id(ResourceKind::Cables, 99).await.unwrap();
    assert!(cable.is_none());
}

// ── Writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_returns_record() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/dcim/devices/"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": 42, "name": "sw-01"})),
        )
        .mount(&server)
        .await;

    let mut payload = serde_json::Map::new();
    payload.insert("name".into(), json!("sw-01"));

    let created = client.create(ResourceKind::Devices, &payload).await.unwrap();
    assert_eq!(created.id(), 42);
    assert_eq!(created.name(), Some("sw-01"));
}

#[tokio::test]
async fn test_create_conflict_is_detectable() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/extras/tags/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "slug": ["tag with this slug already exists."]
        })))
        .mount(&server)
        .await;

    let err = client
        .create(ResourceKind::Tags, &serde_json::Map::new())
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "expected conflict, got: {err}");
}

#[tokio::test]
async fn test_update_patches_object_path() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path("/api/dcim/device-bays/7/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7, "installed_device": {"id": 3}
        })))
        .mount(&server)
        .await;

    let mut partial = serde_json::Map::new();
    partial.insert("installed_device".into(), json!(3));

    let updated = client
        .update(ResourceKind::DeviceBays, 7, &partial)
        .await
        .unwrap();
    assert_eq!(updated.relation("installed_device").unwrap().id(), 3);
}

#[tokio::test]
async fn test_delete_tolerates_missing_object() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/dcim/cables/5/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    client.delete(ResourceKind::Cables, 5).await.unwrap();
}
