// Integration tests for `RestClient` using wiremock.
#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use habsync_api::{Error, RestClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RestClient) {
    let server = MockServer::start().await;
    let client = RestClient::with_client(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());
    (server, client)
}

fn item_link(server: &MockServer, name: &str) -> String {
    format!("{}/rest/items/{name}", server.uri())
}

// ── Catalog ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_items_skips_malformed_entries() {
    let (server, client) = setup().await;

    let body = json!([
        {
            "type": "Switch",
            "name": "Kitchen_Light",
            "label": "Kitchen",
            "link": item_link(&server, "Kitchen_Light"),
            "groupNames": ["Kitchen"],
            "state": "OFF"
        },
        {
            "type": "Dimmer",
            "name": "Hall_Dimmer",
            "label": "Hall",
            "link": item_link(&server, "Hall_Dimmer"),
            "state": "40"
        },
        {
            "type": "Number:DataTransferRate",
            "name": "DTR",
            "label": "Download",
            "link": item_link(&server, "DTR"),
            "stateDescription": { "pattern": "%.1f %unit%" }
        },
        { "type": "String", "name": "Broken", "label": "No link" }
    ]);

    Mock::given(method("GET"))
        .and(path("/rest/items"))
        .and(query_param("recursive", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let items = client.list_items().await.unwrap();

    let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Kitchen_Light", "Hall_Dimmer", "DTR"]);
    assert_eq!(items[0].primary_group(), Some("Kitchen"));
    assert_eq!(items[2].pattern(), Some("%.1f %unit%"));
}

#[tokio::test]
async fn test_list_items_rejects_non_array_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "nope" })))
        .mount(&server)
        .await;

    let err = client.list_items().await.unwrap_err();
    assert!(
        matches!(err, Error::Deserialization { .. }),
        "expected Deserialization, got: {err:?}"
    );
}

#[tokio::test]
async fn test_list_items_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/items"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client.list_items().await.unwrap_err();
    assert!(matches!(err, Error::Status { status: 500, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unauthorized_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/items"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.list_items().await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized { status: 401 }));
}

#[tokio::test]
async fn test_unreachable_server() {
    // Port 9 (discard) on localhost is almost never listening.
    let client = RestClient::with_client(
        reqwest::Client::new(),
        Url::parse("http://127.0.0.1:9").unwrap(),
    );

    let err = client.list_items().await.unwrap_err();
    assert!(err.is_unreachable(), "expected unreachable, got: {err:?}");
}

// ── State ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_read_state() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/items/DTR/state"))
        .respond_with(ResponseTemplate::new(200).set_body_string("5 MB/s"))
        .mount(&server)
        .await;

    let state = client.read_state(&item_link(&server, "DTR")).await.unwrap();
    assert_eq!(state, "5 MB/s");
}

#[tokio::test]
async fn test_read_state_unknown_item() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/items/Ghost/state"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client
        .read_state(&item_link(&server, "Ghost"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_write_state_returns_confirmed_value() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/items/Hall_Dimmer"))
        .and(header("content-type", "text/plain"))
        .and(body_string("120"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    // The server clamps out-of-range dimmer values.
    Mock::given(method("GET"))
        .and(path("/rest/items/Hall_Dimmer/state"))
        .respond_with(ResponseTemplate::new(200).set_body_string("100"))
        .expect(1)
        .mount(&server)
        .await;

    let confirmed = client
        .write_state(&item_link(&server, "Hall_Dimmer"), "120")
        .await
        .unwrap();
    assert_eq!(confirmed, "100");
}

#[tokio::test]
async fn test_write_state_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/items/Kitchen_Light"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let err = client
        .write_state(&item_link(&server, "Kitchen_Light"), "BANANA")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Status { status: 400, .. }));
}

// ── Icons ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_icon() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/icon/lightbulb"))
        .and(query_param("anyFormat", "true"))
        .and(query_param("format", "png"))
        .and(query_param("state", "ON"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .mount(&server)
        .await;

    let bytes = client.fetch_icon(Some("lightbulb"), "ON").await.unwrap();
    assert_eq!(&bytes[..], &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_fetch_icon_without_category_makes_no_request() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert!(client.fetch_icon(None, "ON").await.unwrap().is_empty());
    assert!(client.fetch_icon(Some(""), "ON").await.unwrap().is_empty());
}
