//! Catalog screen driven through a real store against a scripted transport.

use pitstop::ShopClient;
use pitstop::inventory::filter::FilterField;
use pitstop::inventory::purchase::PurchasePhase;
use pitstop::inventory::{
    InventoryAction, InventoryEnvironment, InventoryReducer, InventorySettings, InventoryState, is_in_stock,
};
use pitstop_core::transport::{Endpoint, TransportFailure};
use pitstop_runtime::{Store, StoreError};
use pitstop_testing::helpers::{eventually, init_tracing};
use pitstop_testing::{MockTransport, fixtures};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

type InventoryStore = Store<InventoryState, InventoryAction, InventoryEnvironment, InventoryReducer>;

fn store(transport: &MockTransport) -> InventoryStore {
    init_tracing();
    let settings = InventorySettings {
        filter_debounce: Duration::from_millis(50),
        set_size: 4,
        conflict_statuses: vec![400, 409],
    };
    Store::new(
        InventoryState::default(),
        InventoryReducer,
        InventoryEnvironment::new(ShopClient::new(Arc::new(transport.clone())), settings),
    )
}

fn catalog() -> serde_json::Value {
    fixtures::list(&[
        fixtures::tire(1, "Michelin", "Pilot Sport 4", 8500.0, 12),
        fixtures::tire(2, "Michelin", "CrossClimate 2", 8000.0, 4),
        fixtures::tire(3, "Nokian", "Hakkapeliitta 10", 9900.0, 0),
    ])
}

async fn loaded(store: &InventoryStore) {
    let _ = store.send(InventoryAction::Load).await.unwrap();
    assert!(
        eventually(store, Duration::from_secs(1), |s| !s.is_loading() && !s.visible().is_empty()).await,
        "catalog never loaded"
    );
}

fn ids(state: &InventoryState) -> Vec<Option<i64>> {
    state.tires.items().iter().map(|tire| tire.id).collect()
}

#[tokio::test]
async fn latest_load_wins_when_responses_arrive_out_of_order() {
    let transport = MockTransport::new();
    transport.reply_after(
        Endpoint::ListTires,
        Duration::from_millis(80),
        fixtures::list(&[fixtures::tire(1, "Old", "Stale", 100.0, 4)]),
    );
    transport.reply_after(
        Endpoint::ListTires,
        Duration::from_millis(10),
        fixtures::list(&[fixtures::tire(2, "New", "Fresh", 200.0, 4)]),
    );
    let store = store(&transport);

    let _ = store.send(InventoryAction::Load).await.unwrap();
    let _ = store.send(InventoryAction::Refresh).await.unwrap();

    assert!(eventually(&store, Duration::from_secs(1), |s| ids(s) == vec![Some(2)]).await);

    // Past the first reply's delay: it must not overwrite the newer list
    tokio::time::sleep(Duration::from_millis(120)).await;
    let (items, loading) = store.state(|s| (ids(s), s.is_loading())).await;
    assert_eq!(items, vec![Some(2)]);
    assert!(!loading);
    assert_eq!(transport.calls(Endpoint::ListTires), 2);
}

#[tokio::test]
async fn rapid_filter_edits_recompute_once_with_the_last_value() {
    let transport = MockTransport::new();
    transport.always(Endpoint::ListTires, catalog());
    let store = store(&transport);
    loaded(&store).await;
    let revision = store.state(InventoryState::visible_revision).await;

    for query in ["p", "pi", "pil", "pilo", "pilot"] {
        let _ = store
            .send(InventoryAction::SetFilter(FilterField::SearchText(query.to_string())))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(store.state(InventoryState::visible_revision).await, revision);

    tokio::time::sleep(Duration::from_millis(150)).await;

    let (after, visible) = store
        .state(|s| (s.visible_revision(), s.visible().iter().map(|t| t.id).collect::<Vec<_>>()))
        .await;
    assert_eq!(after, revision + 1);
    assert_eq!(visible, vec![Some(1)]);
}

#[tokio::test]
async fn reset_applies_immediately() {
    let transport = MockTransport::new();
    transport.always(Endpoint::ListTires, catalog());
    let store = store(&transport);
    loaded(&store).await;

    let _ = store
        .send(InventoryAction::SetFilter(FilterField::SearchText("nokian".to_string())))
        .await
        .unwrap();
    let _ = store.send(InventoryAction::ResetFilters).await.unwrap();

    assert_eq!(store.state(|s| s.visible().len()).await, 3);
    assert!(!store.is_running(pitstop::inventory::FILTER_KEY));
}

#[tokio::test]
async fn stock_conflict_rejects_once_and_reloads() {
    let transport = MockTransport::new();
    transport.always(Endpoint::ListTires, catalog());
    let store = store(&transport);
    loaded(&store).await;

    // Someone else bought two of the four units in the meantime
    transport.always(
        Endpoint::ListTires,
        fixtures::list(&[fixtures::tire(2, "Michelin", "CrossClimate 2", 8000.0, 2)]),
    );
    transport.fail_after(
        Endpoint::CreateOrder,
        Duration::from_millis(50),
        TransportFailure::Status {
            status_code: 409,
            body: Some(json!({ "error": "not enough stock" }).to_string()),
        },
    );

    let _ = store.send(InventoryAction::Purchase { tire_id: Some(2) }).await.unwrap();
    let _ = store.send(InventoryAction::Purchase { tire_id: Some(2) }).await.unwrap();

    assert!(
        eventually(&store, Duration::from_secs(1), |s| {
            s.purchase_phase(2) == Some(&PurchasePhase::RejectedStock) && !s.is_loading()
        })
        .await
    );

    assert_eq!(transport.calls(Endpoint::CreateOrder), 1);
    assert_eq!(transport.calls(Endpoint::ListTires), 2);

    let (message, in_stock) = store
        .state(|s| (s.last_error_message(), s.tire(2).is_some_and(|t| is_in_stock(t, 4))))
        .await;
    assert_eq!(message.as_deref(), Some("insufficient stock"));
    assert!(!in_stock);
}

#[tokio::test]
async fn committed_purchase_records_notice_and_refreshes_stock() {
    let transport = MockTransport::new();
    transport.always(Endpoint::ListTires, catalog());
    transport.reply(Endpoint::CreateOrder, json!(42));
    let store = store(&transport);
    loaded(&store).await;

    let _ = store.send(InventoryAction::Purchase { tire_id: Some(1) }).await.unwrap();

    assert!(
        eventually(&store, Duration::from_secs(1), |s| {
            matches!(s.purchase_phase(1), Some(PurchasePhase::Committed { order_id: Some(42) })) && !s.is_loading()
        })
        .await
    );
    assert_eq!(
        store.state(|s| s.purchased_item.clone()).await.as_deref(),
        Some("Michelin Pilot Sport 4")
    );
    assert_eq!(transport.calls(Endpoint::ListTires), 2);
    assert_eq!(
        transport.last_request(Endpoint::CreateOrder).and_then(|r| r.body),
        Some(json!({ "items": { "1": 4 } }))
    );
}

#[tokio::test]
async fn out_of_stock_purchase_never_calls_the_server() {
    let transport = MockTransport::new();
    transport.always(Endpoint::ListTires, catalog());
    let store = store(&transport);
    loaded(&store).await;

    let _ = store.send(InventoryAction::Purchase { tire_id: Some(3) }).await.unwrap();

    assert!(matches!(
        store.state(|s| s.purchase_phase(3).cloned()).await,
        Some(PurchasePhase::RejectedLocal(_))
    ));
    assert_eq!(transport.calls(Endpoint::CreateOrder), 0);
}

#[tokio::test]
async fn failed_load_keeps_previous_items_and_reports() {
    let transport = MockTransport::new();
    transport.reply(Endpoint::ListTires, catalog());
    transport.reject(Endpoint::ListTires, 503, Some("maintenance"));
    let store = store(&transport);
    loaded(&store).await;

    let _ = store.send(InventoryAction::Refresh).await.unwrap();

    assert!(eventually(&store, Duration::from_secs(1), |s| s.last_error_message().is_some()).await);
    let (count, message) = store.state(|s| (s.tires.items().len(), s.last_error_message())).await;
    assert_eq!(count, 3);
    assert_eq!(message.as_deref(), Some("maintenance"));
}

#[tokio::test]
async fn teardown_drops_in_flight_load() {
    let transport = MockTransport::new();
    transport.reply_after(Endpoint::ListTires, Duration::from_millis(50), catalog());
    let store = store(&transport);

    let _ = store.send(InventoryAction::Load).await.unwrap();
    store.teardown();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(store.state(|s| s.tires.items().is_empty()).await);
    assert!(matches!(
        store.send(InventoryAction::Load).await,
        Err(StoreError::ShutdownInProgress)
    ));
}
