mod support;

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use stockroom_storage::OfflineCache;
use stockroom_sync::endpoints::{self, EntryType, NewEntry};
use stockroom_sync::{
    ConnectivityMonitor, Dispatcher, ReadOutcome, ReadRequest, SyncError, WriteOutcome,
    WriteRequest,
};
use stockroom_types::{Connectivity, HttpMethod, Partition, Record};
use support::ScriptedTransport;

fn setup(initial: Connectivity) -> (Arc<ScriptedTransport>, ConnectivityMonitor, Dispatcher) {
    setup_with_cache(initial, OfflineCache::in_memory())
}

fn setup_with_cache(
    initial: Connectivity,
    cache: OfflineCache,
) -> (Arc<ScriptedTransport>, ConnectivityMonitor, Dispatcher) {
    let transport = Arc::new(ScriptedTransport::new());
    let monitor = ConnectivityMonitor::new(initial, 16);
    let dispatcher = Dispatcher::new(transport.clone(), cache, Arc::new(monitor.clone()))
        .with_views(endpoints::collection_views());
    (transport, monitor, dispatcher)
}

fn inventory_rows() -> serde_json::Value {
    json!([
        {"id": 1, "name": "Widget", "quantity": 10},
        {"id": 2, "name": "Gadget", "quantity": 4},
        {"id": 3, "name": "Sprocket", "quantity": 0}
    ])
}

fn widget_entry() -> NewEntry {
    NewEntry {
        name: "Widget".into(),
        brand: String::new(),
        quantity: 5,
        entry_type: EntryType::Intake,
    }
}

// ── Read path ──

#[tokio::test]
async fn fresh_read_is_returned_unmodified_and_mirrored() {
    let (transport, _, dispatcher) = setup(Connectivity::Online);
    transport.respond("/api/inventory", 200, inventory_rows());

    let outcome = dispatcher.read(&endpoints::inventory()).await;
    assert_eq!(outcome, ReadOutcome::Fresh(inventory_rows()));
    assert!(!outcome.is_degraded());

    let cached = dispatcher.cache().get_all(Partition::Inventory).await;
    let ids: Vec<&str> = cached.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn collection_read_replaces_stale_rows() {
    let (transport, _, dispatcher) = setup(Connectivity::Online);
    dispatcher
        .cache()
        .put(
            Partition::Inventory,
            vec![Record::from_json(json!({"id": 99, "name": "Discontinued"})).unwrap()],
        )
        .await;
    transport.respond("/api/inventory", 200, inventory_rows());

    dispatcher.read(&endpoints::inventory()).await;

    let cached = dispatcher.cache().get_all(Partition::Inventory).await;
    assert_eq!(cached.len(), 3);
    assert!(cached.iter().all(|r| r.id.as_str() != "99"));
}

#[tokio::test]
async fn mirroring_twice_is_idempotent() {
    let (transport, _, dispatcher) = setup(Connectivity::Online);
    transport.respond("/api/inventory", 200, inventory_rows());

    dispatcher.read(&endpoints::inventory()).await;
    let first = dispatcher.cache().get_all(Partition::Inventory).await;
    dispatcher.read(&endpoints::inventory()).await;
    let second = dispatcher.cache().get_all(Partition::Inventory).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn filtered_read_merges_into_partition() {
    let (transport, _, dispatcher) = setup(Connectivity::Online);
    transport.respond(
        "/api/sales",
        200,
        json!([{"id": 1, "sale_num": "SALE-1"}, {"id": 2, "sale_num": "SALE-2"}]),
    );
    dispatcher
        .read(&endpoints::sales(&Default::default()))
        .await;

    let filter = endpoints::SalesFilter {
        date: Some("2024-01-15".into()),
        customer: None,
    };
    let request = endpoints::sales(&filter);
    transport.respond(
        &request.endpoint,
        200,
        json!([{"id": 2, "sale_num": "SALE-2", "payment_status": "Paid"}]),
    );
    dispatcher.read(&request).await;

    let cached = dispatcher.cache().get_all(Partition::Sales).await;
    assert_eq!(cached.len(), 2);
    assert_eq!(cached[1].data["payment_status"], "Paid");
}

#[tokio::test]
async fn rows_without_ids_are_skipped_when_mirroring() {
    let (transport, _, dispatcher) = setup(Connectivity::Online);
    transport.respond(
        "/api/inventory",
        200,
        json!([{"id": 1, "name": "Widget"}, {"name": "No id"}, "not an object"]),
    );

    let outcome = dispatcher.read(&endpoints::inventory()).await;
    assert!(matches!(outcome, ReadOutcome::Fresh(_)));
    assert_eq!(dispatcher.cache().get_all(Partition::Inventory).await.len(), 1);
}

#[tokio::test]
async fn unreachable_read_falls_back_to_mirror() {
    let (transport, _, dispatcher) = setup(Connectivity::Online);
    transport.respond("/api/inventory", 200, inventory_rows());
    dispatcher.read(&endpoints::inventory()).await;

    transport.set_down(true);
    let outcome = dispatcher.read(&endpoints::inventory()).await;

    assert!(outcome.is_degraded());
    match outcome {
        ReadOutcome::Cached {
            records,
            mirrored_at,
        } => {
            assert_eq!(records.len(), 3);
            assert_eq!(records[0].data["name"], "Widget");
            assert!(mirrored_at.is_some());
        }
        other => panic!("expected cached records, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_read_falls_back_to_mirror() {
    let (transport, _, dispatcher) = setup(Connectivity::Online);
    transport.respond("/api/inventory", 200, inventory_rows());
    dispatcher.read(&endpoints::inventory()).await;

    transport.respond("/api/inventory", 500, json!({"error": "db down"}));
    let outcome = dispatcher.read(&endpoints::inventory()).await;

    assert_eq!(outcome.rows().map(|rows| rows.len()), Some(3));
}

#[tokio::test]
async fn mirrored_empty_collection_is_distinct_from_no_cache() {
    let (transport, _, dispatcher) = setup(Connectivity::Online);
    transport.respond("/api/expenses", 200, json!([]));
    dispatcher
        .read(&endpoints::expenses(&Default::default()))
        .await;

    transport.set_down(true);
    let expenses = dispatcher
        .read(&endpoints::expenses(&Default::default()))
        .await;
    assert!(matches!(expenses, ReadOutcome::CachedEmpty { mirrored_at: Some(_) }));
    assert_eq!(expenses.rows(), Some(vec![]));

    let sales = dispatcher.read(&endpoints::sales(&Default::default())).await;
    assert_eq!(sales, ReadOutcome::NoCache);
    assert_eq!(sales.rows(), None);
}

#[tokio::test]
async fn summary_view_falls_back_to_last_response() {
    let (transport, _, dispatcher) = setup(Connectivity::Online);
    let request = endpoints::dashboard_metrics(None);
    transport.respond(&request.endpoint, 200, json!({"total_sales": 12}));
    assert!(!dispatcher.read(&request).await.is_degraded());

    transport.set_down(true);
    let outcome = dispatcher.read(&request).await;
    assert!(outcome.is_degraded());
    match outcome {
        ReadOutcome::CachedResponse { body, cached_at } => {
            assert_eq!(body, json!({"total_sales": 12}));
            assert!(cached_at > 0);
        }
        other => panic!("expected cached response, got {other:?}"),
    }
}

#[tokio::test]
async fn response_cache_is_keyed_by_exact_endpoint() {
    let (transport, _, dispatcher) = setup(Connectivity::Online);
    let today = endpoints::sales_summary(Some("2024-05-01"));
    transport.respond(&today.endpoint, 200, json!([{"customer": "Acme", "total": 40}]));
    dispatcher.read(&today).await;

    transport.set_down(true);
    let cached = dispatcher.read(&today).await;
    assert_eq!(cached.rows(), Some(vec![json!({"customer": "Acme", "total": 40})]));
    assert_eq!(
        dispatcher.read(&endpoints::sales_summary(None)).await,
        ReadOutcome::NoCache
    );
    assert_eq!(
        dispatcher.read(&endpoints::sale_detail("S-9")).await,
        ReadOutcome::NoCache
    );
}

#[tokio::test]
async fn failed_summary_read_keeps_previous_response() {
    let (transport, _, dispatcher) = setup(Connectivity::Online);
    let request = endpoints::expenses_summary(None);
    transport.respond(&request.endpoint, 200, json!([{"category": "Rent", "total": 900}]));
    dispatcher.read(&request).await;

    transport.respond(&request.endpoint, 500, json!({"error": "boom"}));
    let outcome = dispatcher.read(&request).await;
    assert!(matches!(
        outcome,
        ReadOutcome::CachedResponse { ref body, .. }
            if *body == json!([{"category": "Rent", "total": 900}])
    ));
}

#[tokio::test]
async fn disabled_cache_still_serves_fresh_reads() {
    let (transport, _, dispatcher) =
        setup_with_cache(Connectivity::Online, OfflineCache::disabled());
    transport.respond("/api/inventory", 200, inventory_rows());

    assert_eq!(
        dispatcher.read(&endpoints::inventory()).await,
        ReadOutcome::Fresh(inventory_rows())
    );
    transport.set_down(true);
    assert_eq!(dispatcher.read(&endpoints::inventory()).await, ReadOutcome::NoCache);
}

#[tokio::test]
async fn refresh_views_rereads_every_collection() {
    let (transport, _, dispatcher) = setup(Connectivity::Online);
    transport.respond("/api/inventory", 200, inventory_rows());
    transport.respond("/api/transactions", 200, json!([]));
    transport.respond("/api/sales", 200, json!([]));

    let fresh = dispatcher.refresh_views().await;

    assert_eq!(fresh, 3);
    assert_eq!(
        transport.endpoints_called(),
        vec!["/api/inventory", "/api/transactions", "/api/sales", "/api/expenses"]
    );
}

// ── Write path ──

#[tokio::test]
async fn online_write_returns_backend_body() {
    let (transport, _, dispatcher) = setup(Connectivity::Online);
    let body = json!({"success": true, "message": "Intake recorded successfully!"});
    transport.respond("/api/add-entry", 200, body.clone());

    let outcome = dispatcher
        .write(endpoints::add_entry(&widget_entry()).unwrap())
        .await
        .unwrap();

    assert_eq!(outcome, WriteOutcome::Completed(body));
    assert_eq!(dispatcher.cache().pending_count().await, 0);
    assert_eq!(
        transport.calls()[0].body,
        Some(json!({"name": "Widget", "brand": "", "quantity": 5, "type": "Intake"}))
    );
}

#[tokio::test]
async fn offline_write_is_queued() {
    let (_, _, dispatcher) = setup(Connectivity::Offline);

    let outcome = dispatcher
        .write(endpoints::add_entry(&widget_entry()).unwrap())
        .await
        .unwrap();

    assert!(outcome.is_queued());
    let pending = dispatcher.cache().list_pending().await;
    assert_eq!(pending.len(), 1);
    let op = &pending[0];
    assert_eq!(op.method, HttpMethod::Post);
    assert_eq!(op.endpoint, "/api/add-entry");
    assert_eq!(
        op.data,
        json!({"name": "Widget", "brand": "", "quantity": 5, "type": "Intake"})
    );
    assert!(!op.synced);
    assert_eq!(outcome, WriteOutcome::Queued(op.clone()));
}

#[tokio::test]
async fn offline_writes_keep_their_order() {
    let (_, _, dispatcher) = setup(Connectivity::Offline);

    dispatcher.write(endpoints::delete_product(7)).await.unwrap();
    dispatcher.write(endpoints::update_reorder("Widget", 3)).await.unwrap();

    let queued: Vec<String> = dispatcher
        .cache()
        .list_pending()
        .await
        .into_iter()
        .map(|op| op.endpoint)
        .collect();
    assert_eq!(queued, vec!["/api/delete-product/7", "/api/update-reorder"]);
}

#[tokio::test]
async fn unreachable_while_online_is_an_error() {
    let (_, _, dispatcher) = setup(Connectivity::Online);

    let err = dispatcher
        .write(endpoints::delete_expense(4))
        .await
        .unwrap_err();

    assert!(err.is_unreachable());
    assert_eq!(dispatcher.cache().pending_count().await, 0);
}

#[tokio::test]
async fn rejected_write_is_never_queued() {
    let (transport, _, dispatcher) = setup(Connectivity::Offline);
    transport.respond(
        "/api/add-entry",
        400,
        json!({"success": false, "error": "Insufficient stock"}),
    );

    let err = dispatcher
        .write(endpoints::add_entry(&widget_entry()).unwrap())
        .await
        .unwrap_err();

    match err {
        SyncError::Rejected { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Insufficient stock");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(dispatcher.cache().pending_count().await, 0);
}

#[tokio::test]
async fn offline_without_cache_reports_queue_unavailable() {
    let (_, _, dispatcher) =
        setup_with_cache(Connectivity::Offline, OfflineCache::disabled());

    let err = dispatcher
        .write(endpoints::delete_sale("SALE-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::QueueUnavailable(_)));
}

#[tokio::test]
async fn failing_store_surfaces_as_queue_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stockroom.db");
    let cache = OfflineCache::open(&path).await;
    assert!(cache.is_available());

    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute_batch("DROP TABLE sync_queue;").unwrap();
    drop(raw);

    let (_, _, dispatcher) = setup_with_cache(Connectivity::Offline, cache);
    let err = dispatcher
        .write(endpoints::delete_sale("SALE-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::QueueUnavailable(ref what) if what.contains("SALE-1")));
}

#[tokio::test]
async fn connectivity_is_read_at_write_time() {
    let (_, monitor, dispatcher) = setup(Connectivity::Online);
    assert!(dispatcher.write(endpoints::delete_product(1)).await.is_err());

    monitor.report(Connectivity::Offline);
    assert!(dispatcher.write(endpoints::delete_product(1)).await.unwrap().is_queued());
}

#[test]
fn get_is_not_a_write() {
    let err = WriteRequest::new(HttpMethod::Get, "/api/inventory", json!(null)).unwrap_err();
    assert!(matches!(err, SyncError::InvalidRequest(_)));
}

#[test]
fn empty_endpoint_is_not_a_write() {
    let err = WriteRequest::new(HttpMethod::Post, "  ", json!({})).unwrap_err();
    assert!(matches!(err, SyncError::InvalidRequest(_)));
}

#[test]
fn read_request_constructors_pick_mirror_mode() {
    use stockroom_sync::MirrorMode;

    assert_eq!(
        ReadRequest::collection(Partition::Inventory, "/api/inventory").mirror,
        MirrorMode::Replace
    );
    assert_eq!(
        ReadRequest::filtered(Partition::Sales, "/api/sales?date=x").mirror,
        MirrorMode::Merge
    );
    let detail = ReadRequest::response("/api/sale/1");
    assert_eq!(detail.partition, None);
    assert_eq!(detail.mirror, MirrorMode::Response);
}
