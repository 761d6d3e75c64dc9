// tests/ledger_persistence.rs
use rand::Rng;
use stream_sentinel::ledger::DedupLedger;
use stream_sentinel::model::ItemKind;

fn temp_ledger_path() -> std::path::PathBuf {
    let n: u64 = rand::rng().random();
    std::env::temp_dir().join(format!("sentinel-ledger-{n}.json"))
}

#[tokio::test]
async fn is_new_survives_a_restart() {
    let path = temp_ledger_path();

    let ledger = DedupLedger::new(&path, 50);
    assert!(ledger.is_new("guild-1", "UCx", ItemKind::Upload, "vidA"));
    ledger.record("guild-1", "UCx", ItemKind::Upload, "vidA");
    assert!(!ledger.is_new("guild-1", "UCx", ItemKind::Upload, "vidA"));
    ledger.flush().await.unwrap();

    // Fresh process: load the same file.
    let reloaded = DedupLedger::load(&path, 50).await;
    assert!(!reloaded.is_new("guild-1", "UCx", ItemKind::Upload, "vidA"));
    // Kind split survives too.
    assert!(reloaded.is_new("guild-1", "UCx", ItemKind::Live, "vidA"));

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn eviction_order_survives_a_restart() {
    let path = temp_ledger_path();

    let ledger = DedupLedger::new(&path, 2);
    for id in ["A", "B"] {
        ledger.record("t", "ch", ItemKind::Upload, id);
    }
    ledger.flush().await.unwrap();

    let reloaded = DedupLedger::load(&path, 2).await;
    // Capacity 2, inserting C evicts the oldest (A).
    reloaded.record("t", "ch", ItemKind::Upload, "C");
    assert!(reloaded.is_new("t", "ch", ItemKind::Upload, "A"));
    assert!(!reloaded.is_new("t", "ch", ItemKind::Upload, "B"));
    assert!(!reloaded.is_new("t", "ch", ItemKind::Upload, "C"));
    assert_eq!(reloaded.known_ids("t", "ch", ItemKind::Upload), ["B", "C"]);

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn missing_file_loads_empty() {
    let path = temp_ledger_path();
    let ledger = DedupLedger::load(&path, 50).await;
    assert!(ledger.is_new("t", "ch", ItemKind::Upload, "anything"));
    assert_eq!(ledger.tracked_pairs(), 0);
}

#[tokio::test]
async fn corrupt_file_loads_empty() {
    let path = temp_ledger_path();
    std::fs::write(&path, "{ definitely not the ledger shape").unwrap();
    let ledger = DedupLedger::load(&path, 50).await;
    assert!(ledger.is_new("t", "ch", ItemKind::Live, "x"));
    let _ = std::fs::remove_file(&path);
}
