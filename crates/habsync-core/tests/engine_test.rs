// Integration tests for `SyncEngine` against a wiremock openHAB server.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use habsync_core::{
    ChangeEvent, ChangeSource, ConnectionConfig, CoreError, EngineState, ItemKind, SyncEngine,
};

// ── Helpers ─────────────────────────────────────────────────────────

const WAIT: Duration = Duration::from_secs(3);

fn link(server: &MockServer, name: &str) -> String {
    format!("{}/rest/items/{name}", server.uri())
}

fn config(server: &MockServer) -> ConnectionConfig {
    let mut config = ConnectionConfig::from_url(&server.uri()).unwrap();
    config.poll_interval = Duration::from_millis(100);
    config.timeout = Duration::from_secs(2);
    config.push_enabled = false;
    config
}

async fn mount_catalog(server: &MockServer) {
    let body = json!([
        {
            "type": "Switch",
            "name": "Kitchen_Light",
            "label": "Kitchen light",
            "link": link(server, "Kitchen_Light"),
            "groupNames": ["Kitchen"],
            "category": "lightbulb",
            "state": "OFF"
        },
        {
            "type": "Dimmer",
            "name": "Hall_Dimmer",
            "label": "Hall",
            "link": link(server, "Hall_Dimmer"),
            "state": "40"
        },
        {
            "type": "Number:DataTransferRate",
            "name": "DTR",
            "label": "Download",
            "link": link(server, "DTR"),
            "groupNames": ["Network"],
            "state": "5 MB/s",
            "stateDescription": { "pattern": "%.1f %unit%" }
        },
        { "type": "Switch", "name": "Broken", "label": "no link" }
    ]);

    Mock::given(method("GET"))
        .and(path("/rest/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(server)
        .await;
}

async fn setup() -> (MockServer, SyncEngine) {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let engine = SyncEngine::new();
    engine.initialize(config(&server)).await.unwrap();
    (server, engine)
}

async fn next_event(sub: &mut habsync_core::ChangeSubscription) -> ChangeEvent {
    let event = tokio::time::timeout(WAIT, sub.recv())
        .await
        .expect("timed out waiting for a change event")
        .expect("subscription ended");
    (*event).clone()
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_initialize_loads_catalog() {
    let (server, engine) = setup().await;

    assert_eq!(engine.state(), EngineState::Steady);
    assert_eq!(engine.items().len(), 3);

    let dtr = link(&server, "DTR");
    assert_eq!(engine.label(&dtr).as_deref(), Some("Download"));
    assert_eq!(engine.cached_state(&dtr).as_deref(), Some("5 MB/s"));
    assert_eq!(engine.display_state(&dtr).as_deref(), Some("5.0 MB/s"));
    assert_eq!(engine.find(&dtr).unwrap().kind, ItemKind::Number);

    let groups: Vec<String> = engine
        .grouped_catalog(|_| true)
        .iter()
        .map(|g| g.label().to_owned())
        .collect();
    assert_eq!(groups, vec!["Kitchen", "Network", "Others"]);

    engine.shutdown().await;
    assert_eq!(engine.state(), EngineState::Uninitialized);
}

#[tokio::test]
async fn test_initialize_failure_leaves_no_registry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/items"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let engine = SyncEngine::new();
    let err = engine.initialize(config(&server)).await.unwrap_err();

    assert!(matches!(err, CoreError::Protocol { .. }), "got: {err:?}");
    assert_eq!(engine.state(), EngineState::LoadFailed);
    assert!(engine.items().is_empty());

    let err = engine
        .send_state(&link(&server, "Kitchen_Light"), "ON")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotInitialized));
}

#[tokio::test]
async fn test_zero_poll_interval_is_rejected() {
    let (server, engine) = setup().await;

    let mut bad = config(&server);
    bad.poll_interval = Duration::ZERO;
    let err = engine.initialize(bad).await.unwrap_err();

    assert!(matches!(err, CoreError::Config { .. }), "got: {err:?}");
    // The running session is left as it was.
    assert_eq!(engine.state(), EngineState::Steady);
    assert_eq!(engine.items().len(), 3);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_reinitialize_retargets_server() {
    let (_first, engine) = setup().await;

    let second = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "type": "String", "name": "Only", "label": "Only", "link": link(&second, "Only") }
        ])))
        .mount(&second)
        .await;

    let count = engine.initialize(config(&second)).await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(engine.items()[0].id, "Only");
    assert_eq!(engine.config().unwrap().url.as_str(), format!("{}/", second.uri()));

    engine.shutdown().await;
}

// ── Refresh cycle ───────────────────────────────────────────────────

#[tokio::test]
async fn test_unwatched_items_are_never_polled() {
    let (server, engine) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/items/Kitchen_Light/state"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OFF"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/items/DTR/state"))
        .respond_with(ResponseTemplate::new(200).set_body_string("5 MB/s"))
        .expect(1..)
        .mount(&server)
        .await;

    assert!(engine.set_watched(&link(&server, "DTR")));
    tokio::time::sleep(Duration::from_millis(450)).await;
    engine.shutdown().await;

    server.verify().await;
}

#[tokio::test]
async fn test_poll_emits_one_event_per_transition() {
    let (server, engine) = setup().await;
    let kitchen = link(&server, "Kitchen_Light");

    Mock::given(method("GET"))
        .and(path("/rest/items/Kitchen_Light/state"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ON"))
        .mount(&server)
        .await;

    let mut sub = engine.subscribe();
    engine.set_watched(&kitchen);

    let event = next_event(&mut sub).await;
    assert_eq!(event.link, kitchen);
    assert_eq!(event.new_state, "ON");
    assert_eq!(event.previous_state.as_deref(), Some("OFF"));
    assert_eq!(event.source, ChangeSource::Poll);

    // Later cycles read the same value: no further events.
    let again = tokio::time::timeout(Duration::from_millis(400), sub.recv()).await;
    assert!(again.is_err(), "unexpected event: {again:?}");

    engine.shutdown().await;
}

#[tokio::test]
async fn test_unwatch_stops_polling() {
    let (server, engine) = setup().await;
    let dtr = link(&server, "DTR");

    Mock::given(method("GET"))
        .and(path("/rest/items/DTR/state"))
        .respond_with(ResponseTemplate::new(200).set_body_string("5 MB/s"))
        .mount(&server)
        .await;

    engine.set_watched(&dtr);
    tokio::time::sleep(Duration::from_millis(250)).await;
    engine.unwatch(&dtr);
    tokio::time::sleep(Duration::from_millis(150)).await;
    let before = server.received_requests().await.unwrap().len();

    tokio::time::sleep(Duration::from_millis(350)).await;
    let after = server.received_requests().await.unwrap().len();
    assert_eq!(before, after);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_server_enters_reconnecting() {
    let (server, engine) = setup().await;
    engine.set_watched(&link(&server, "DTR"));

    let mut states = engine.state_changes();
    drop(server);

    let reached = tokio::time::timeout(WAIT, async {
        loop {
            states.changed().await.unwrap();
            if matches!(*states.borrow(), EngineState::Reconnecting { .. }) {
                break;
            }
        }
    })
    .await;
    assert!(reached.is_ok(), "engine never entered Reconnecting");

    engine.shutdown().await;
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_state_is_optimistic() {
    let (server, engine) = setup().await;
    let kitchen = link(&server, "Kitchen_Light");

    Mock::given(method("POST"))
        .and(path("/rest/items/Kitchen_Light"))
        .and(body_string("ON"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/items/Kitchen_Light/state"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ON"))
        .mount(&server)
        .await;

    let mut sub = engine.subscribe();
    let task = {
        let engine = engine.clone();
        let kitchen = kitchen.clone();
        tokio::spawn(async move { engine.send_state(&kitchen, "ON").await })
    };

    let event = next_event(&mut sub).await;
    assert_eq!(event.source, ChangeSource::Command);
    assert_eq!(engine.cached_state(&kitchen).as_deref(), Some("ON"));
    assert!(!task.is_finished());

    assert_eq!(task.await.unwrap().unwrap(), "ON");
    engine.shutdown().await;
}

#[tokio::test]
async fn test_confirmed_state_reconciles_cache() {
    let (server, engine) = setup().await;
    let hall = link(&server, "Hall_Dimmer");

    Mock::given(method("POST"))
        .and(path("/rest/items/Hall_Dimmer"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/items/Hall_Dimmer/state"))
        .respond_with(ResponseTemplate::new(200).set_body_string("100"))
        .mount(&server)
        .await;

    let mut sub = engine.subscribe();
    let confirmed = engine.send_state(&hall, "120").await.unwrap();
    assert_eq!(confirmed, "100");

    let optimistic = next_event(&mut sub).await;
    let confirmation = next_event(&mut sub).await;
    assert_eq!(optimistic.new_state, "120");
    assert_eq!(confirmation.source, ChangeSource::Confirmation);
    assert_eq!(confirmation.previous_state.as_deref(), Some("120"));
    assert_eq!(engine.cached_state(&hall).as_deref(), Some("100"));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_write_failure_is_not_rolled_back() {
    let (server, engine) = setup().await;
    let kitchen = link(&server, "Kitchen_Light");

    Mock::given(method("POST"))
        .and(path("/rest/items/Kitchen_Light"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = engine.send_state(&kitchen, "ON").await.unwrap_err();
    assert!(matches!(err, CoreError::Protocol { status: Some(500), .. }));
    assert_eq!(engine.cached_state(&kitchen).as_deref(), Some("ON"));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_toggle_lit_dimmer_sends_off() {
    let (server, engine) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/items/Hall_Dimmer"))
        .and(body_string("OFF"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/items/Hall_Dimmer/state"))
        .respond_with(ResponseTemplate::new(200).set_body_string("0"))
        .mount(&server)
        .await;

    let state = engine
        .toggle_state(&link(&server, "Hall_Dimmer"))
        .await
        .unwrap();
    assert_eq!(state, "0");

    engine.shutdown().await;
}

#[tokio::test]
async fn test_adjust_clamps_before_sending() {
    let (server, engine) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/items/Hall_Dimmer"))
        .and(body_string("100"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/items/Hall_Dimmer/state"))
        .respond_with(ResponseTemplate::new(200).set_body_string("100"))
        .mount(&server)
        .await;

    let state = engine
        .adjust_state(&link(&server, "Hall_Dimmer"), 75.0, 0.0, 100.0)
        .await
        .unwrap();
    assert_eq!(state, "100");

    engine.shutdown().await;
}

#[tokio::test]
async fn test_adjust_non_numeric_state() {
    let (server, engine) = setup().await;

    let err = engine
        .adjust_state(&link(&server, "Kitchen_Light"), 10.0, 0.0, 100.0)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValueUnparseable { .. }));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_unknown_link_is_not_found() {
    let (server, engine) = setup().await;

    let err = engine
        .send_state(&link(&server, "Ghost"), "ON")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
    assert!(!engine.set_watched(&link(&server, "Ghost")));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_icon_uses_category_and_cached_state() {
    let (server, engine) = setup().await;

    Mock::given(method("GET"))
        .and(path("/icon/lightbulb"))
        .and(wiremock::matchers::query_param("state", "OFF"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
        .mount(&server)
        .await;

    let icon = engine.icon(&link(&server, "Kitchen_Light")).await.unwrap();
    assert_eq!(&icon[..], b"png");

    // No category, no request.
    let none = engine.icon(&link(&server, "Hall_Dimmer")).await.unwrap();
    assert!(none.is_empty());

    engine.shutdown().await;
}

// ── Subscriptions ───────────────────────────────────────────────────

#[tokio::test]
async fn test_shutdown_ends_subscriptions() {
    let (_server, engine) = setup().await;
    let mut sub = engine.subscribe();

    engine.shutdown().await;
    let ended = tokio::time::timeout(WAIT, sub.recv()).await.unwrap();
    assert!(ended.is_none());
}

#[tokio::test]
async fn test_observer_sees_changes() {
    let (server, engine) = setup().await;
    let kitchen = link(&server, "Kitchen_Light");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = engine.observe(move |e: &ChangeEvent| {
        let _ = tx.send(e.new_state.clone());
    });

    engine
        .registry()
        .update_state(&kitchen, "ON", ChangeSource::Push);

    let seen = tokio::time::timeout(WAIT, rx.recv()).await.unwrap();
    assert_eq!(seen.as_deref(), Some("ON"));

    handle.join().await;
    engine.shutdown().await;
}
