use std::collections::HashSet;
use std::sync::Arc;

use pastebin::server::ids::{allocate_id, ID_LENGTH};
use pastebin::server::sqlite::SqlitePasteStore;
use pastebin::{
    create_paste_store, PasteStore, SharedPasteStore, StoreBackend, StoreError, StoredContent,
    StoredPaste,
};

fn paste(id: &str) -> StoredPaste {
    StoredPaste {
        id: id.to_string(),
        content: StoredContent::Plain {
            text: "roundtrip".into(),
        },
        password_hash: None,
        created_at: 1,
        expires_at: None,
        expire_after_viewing: true,
        viewed: false,
        creator_ip: None,
    }
}

fn stores() -> Vec<SharedPasteStore> {
    vec![
        create_paste_store(&StoreBackend::Memory).expect("memory store"),
        Arc::new(SqlitePasteStore::open_in_memory().expect("sqlite store")),
    ]
}

#[tokio::test]
async fn stores_share_the_same_contract() {
    for store in stores() {
        store.insert(paste("one")).await.unwrap();
        assert!(matches!(
            store.insert(paste("one")).await,
            Err(StoreError::DuplicateId(_))
        ));

        let stored = store.find_by_id("one").await.unwrap();
        assert_eq!(stored.content, paste("one").content);

        assert!(store.mark_viewed("one").await.unwrap());
        assert!(!store.mark_viewed("one").await.unwrap());
        assert!(store.find_by_id("one").await.unwrap().is_consumed());

        assert!(matches!(
            store.find_by_id("two").await,
            Err(StoreError::NotFound(_))
        ));
    }
}

#[tokio::test]
async fn sqlite_store_persists_across_reopen() {
    let path = std::env::temp_dir().join(format!("pastebin-test-{}.db", allocate_id().unwrap()));
    {
        let store = create_paste_store(&StoreBackend::Sqlite {
            path: path.to_string_lossy().into_owned(),
        })
        .unwrap();
        store.insert(paste("durable")).await.unwrap();
    }

    let reopened = SqlitePasteStore::open(&path).unwrap();
    assert!(reopened.find_by_id("durable").await.is_ok());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn concurrent_allocation_yields_distinct_ids() {
    let handles: Vec<_> = (0..8)
        .map(|_| {
            std::thread::spawn(|| {
                (0..1_250)
                    .map(|_| allocate_id().unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert_eq!(id.len(), ID_LENGTH);
            assert!(seen.insert(id), "duplicate id allocated");
        }
    }
    assert_eq!(seen.len(), 10_000);
}
