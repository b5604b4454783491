//! End-to-end cart flows through the file-backed store.

use std::path::Path;
use std::sync::Arc;

use shopbase_core::{LineCandidate, QuantityPolicy};
use shopbase_store::{
    open_store, CartPersistence, CartStore, FileStorage, InlineSink, KeyValueStorage,
    PersistMode, SaveWorker, StoreConfig, StoreError, StoreResult,
};

fn config_in(dir: &Path, mode: PersistMode) -> StoreConfig {
    let mut config = StoreConfig::default();
    config.storage.dir = Some(dir.to_path_buf());
    config.storage.persist_mode = mode;
    config
}

fn mug(variant: &str, price_cents: i64) -> LineCandidate {
    LineCandidate::new(variant, price_cents)
        .product("p-mug", "Mug", "mug")
        .variant(variant)
        .attribute("size", variant)
}

#[test]
fn cart_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), PersistMode::Inline);

    {
        let opened = open_store(&config).unwrap();
        let store = &opened.store;
        store.add_one(mug("v1", 999)).unwrap();
        store.add_line(mug("v2", 500), 3).unwrap();
        store.set_quantity("v1", 2).unwrap();
        store.set_panel_open(true);

        assert_eq!(store.total_item_count(), 5);
        assert_eq!(store.subtotal().cents(), 3498);
    }

    let record = std::fs::read_to_string(dir.path().join("cart-storage.json")).unwrap();
    assert!(record.contains("\"version\":1"));
    assert!(record.contains("\"savedAt\""));

    let reopened = open_store(&config).unwrap();
    let store = &reopened.store;
    assert_eq!(store.total_item_count(), 5);
    assert_eq!(store.subtotal().cents(), 3498);
    assert!(!store.is_panel_open());

    let ids: Vec<_> = store.lines().into_iter().map(|l| l.line_id).collect();
    assert_eq!(ids, vec!["v1", "v2"]);
    assert_eq!(
        store.line("v2").unwrap().selected_attributes.get("size").map(String::as_str),
        Some("v2")
    );

    assert!(store.remove_line("v2"));
    assert_eq!(store.total_item_count(), 2);
}

#[test]
fn corrupt_record_opens_empty_and_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cart-storage.json"), "{\"state\": [oops").unwrap();

    let opened = open_store(&config_in(dir.path(), PersistMode::Inline)).unwrap();
    assert!(opened.store.is_empty());

    opened.store.add_one(mug("v1", 100)).unwrap();

    let reopened = open_store(&config_in(dir.path(), PersistMode::Inline)).unwrap();
    assert_eq!(reopened.store.total_item_count(), 1);
}

#[test]
fn record_from_older_storefront_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let legacy = r#"{
        "state": {
            "items": [{
                "id": "v9",
                "productId": "p9",
                "productName": "Poster",
                "productSlug": "poster",
                "variantName": "A2",
                "price": 9.99,
                "quantity": 2,
                "imageUrl": null,
                "attributes": {"finish": "matte"}
            }]
        },
        "version": 0
    }"#;
    std::fs::write(dir.path().join("cart-storage.json"), legacy).unwrap();

    let opened = open_store(&config_in(dir.path(), PersistMode::Inline)).unwrap();
    let store = &opened.store;
    assert_eq!(store.total_item_count(), 2);
    assert_eq!(store.subtotal().cents(), 1998);
    let poster = store.line("v9").unwrap();
    assert_eq!(poster.unit_price_cents, 999);
    assert_eq!(poster.image_url, None);
    assert_eq!(poster.selected_attributes.get("finish").map(String::as_str), Some("matte"));
    assert!(!store.is_panel_open());

    // The next write upgrades the record in place
    store.add_one(mug("v1", 100)).unwrap();
    let record = std::fs::read_to_string(dir.path().join("cart-storage.json")).unwrap();
    assert!(record.contains("\"version\":1"));
    assert!(!record.contains("\"items\""));

    let reopened = open_store(&config_in(dir.path(), PersistMode::Inline)).unwrap();
    assert_eq!(reopened.store.subtotal().cents(), 2098);
}

#[test]
fn unversioned_lines_record_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let record = r#"{
        "state": {
            "lines": [{
                "lineId": "v9",
                "productId": "p9",
                "productName": "Poster",
                "productSlug": "poster",
                "variantName": "A2",
                "unitPriceCents": 1500,
                "quantity": 2
            }],
            "isOpen": true
        }
    }"#;
    std::fs::write(dir.path().join("cart-storage.json"), record).unwrap();

    let opened = open_store(&config_in(dir.path(), PersistMode::Inline)).unwrap();
    assert_eq!(opened.store.subtotal().cents(), 3000);
    assert_eq!(opened.store.line("v9").unwrap().image_url, None);
    assert!(!opened.store.is_panel_open());
}

#[test]
fn clamp_policy_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), PersistMode::Inline);
    config.cart.quantity_policy = QuantityPolicy::Clamp;
    config.cart.max_item_quantity = 3;

    let opened = open_store(&config).unwrap();
    opened.store.add_line(mug("v1", 100), 10).unwrap();
    assert_eq!(opened.store.line("v1").unwrap().quantity, 3);
}

#[tokio::test]
async fn queued_saves_land_after_close() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), PersistMode::Queued);

    let opened = open_store(&config).unwrap();
    for _ in 0..50 {
        opened.store.add_one(mug("v1", 200)).unwrap();
    }
    opened.store.toggle_panel();

    let saver = opened.saver.clone().unwrap();
    opened.close().await.unwrap();
    assert!(saver.stats().written() >= 1);
    assert_eq!(saver.stats().failed(), 0);

    let reopened = open_store(&config_in(dir.path(), PersistMode::Inline)).unwrap();
    assert_eq!(reopened.store.total_item_count(), 50);
    assert_eq!(reopened.store.subtotal().cents(), 10_000);
}

#[tokio::test]
async fn concurrent_writers_through_worker() {
    let dir = tempfile::tempdir().unwrap();
    let persistence = CartPersistence::new(Arc::new(FileStorage::open(dir.path()).unwrap()), "cart-storage");
    let saver = SaveWorker::spawn(persistence.clone());
    let store = Arc::new(CartStore::open(
        &persistence,
        Arc::new(saver.clone()),
        Default::default(),
    ));

    let writers: Vec<_> = (0..4)
        .map(|n| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..10 {
                    store.add_one(mug(&format!("v{}", n), 100)).unwrap();
                    store.add_one(mug("shared", 100)).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    saver.flush().await.unwrap();

    assert_eq!(store.line("shared").unwrap().quantity, 40);
    assert_eq!(store.total_item_count(), 80);

    // Last write wins: storage holds the final cart
    let saved = persistence.load().unwrap();
    assert_eq!(saved.lines, store.lines());
}

/// Storage that is always unavailable.
struct Offline;

impl KeyValueStorage for Offline {
    fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "storage disabled",
        )))
    }

    fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
        Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "storage disabled",
        )))
    }

    fn remove(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }
}

#[test]
fn cart_keeps_working_without_storage() {
    let persistence = CartPersistence::new(Arc::new(Offline), "cart-storage");
    let sink = Arc::new(InlineSink::new(persistence.clone()));
    let store = CartStore::open(&persistence, sink.clone(), Default::default());

    store.add_line(mug("v1", 999), 2).unwrap();
    store.set_quantity("v1", 3).unwrap();

    assert_eq!(store.total_item_count(), 3);
    assert_eq!(sink.stats().failed(), 2);
    assert_eq!(sink.stats().written(), 0);
}
