mod helpers;

use std::sync::Arc;

use helpers::{conversation, memory_store, store_over, write_json};
use serde_json::json;
use tempfile::TempDir;
use vesper_memory::db::vector::{SqliteVecStore, VectorStore};
use vesper_memory::error::MemoryError;
use vesper_memory::memory::store::{MemoryStore, MAX_K};
use vesper_memory::memory::types::{BuildOutcome, Message, NewMessage};

fn export_with(messages: &[(&str, f64, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_json(
        &tmp.path().join("conversations.json"),
        &json!([conversation("c", messages)]),
    );
    tmp
}

fn many_messages(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| Message::new("user", i as f64, &format!("note number {i}")).unwrap())
        .collect()
}

#[test]
fn build_twice_does_not_duplicate() {
    let export = export_with(&[
        ("user", 1.0, "the garden needs water"),
        ("assistant", 2.0, "I will remind you tomorrow"),
        ("user", 3.0, "thanks"),
    ]);
    let store = memory_store(4);

    let first = store.build(export.path()).unwrap();
    let BuildOutcome::Built { chunks, .. } = first else {
        panic!("expected a fresh build, got {first:?}");
    };
    let count = store.entry_count().unwrap();
    assert_eq!(count, chunks as u64);

    assert_eq!(
        store.build(export.path()).unwrap(),
        BuildOutcome::AlreadyBuilt { entries: count }
    );
    assert_eq!(store.entry_count().unwrap(), count);
}

#[test]
fn built_table_survives_reopen() {
    let export = export_with(&[("user", 1.0, "persist me")]);
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("memory.db");

    {
        let store = store_over(Arc::new(SqliteVecStore::open_path(&db_path).unwrap()), 100);
        store.build(export.path()).unwrap();
    }

    let reopened = store_over(Arc::new(SqliteVecStore::open_path(&db_path).unwrap()), 100);
    assert!(reopened.is_ready());
    assert!(matches!(
        reopened.build(export.path()).unwrap(),
        BuildOutcome::AlreadyBuilt { entries: 1 }
    ));
    let hits = reopened.search("persist", 1).unwrap();
    assert!(hits[0].text.ends_with("persist me"));
}

#[test]
fn empty_table_is_dropped_and_rebuilt() {
    let vectors = Arc::new(SqliteVecStore::in_memory().unwrap());
    let seed = store_over(Arc::clone(&vectors), 100);
    seed.build_from_messages(&many_messages(1)).unwrap();
    vectors
        .with_connection(|conn| {
            conn.execute_batch("DELETE FROM \"memory\"; DELETE FROM \"memory_vec\";")?;
            Ok(())
        })
        .unwrap();
    assert!(vectors.exists("memory").unwrap());
    assert_eq!(vectors.count("memory").unwrap(), 0);

    let store = store_over(Arc::clone(&vectors), 100);
    let export = export_with(&[("user", 1.0, "fresh start")]);
    let outcome = store.build(export.path()).unwrap();
    assert!(matches!(outcome, BuildOutcome::Built { healed: true, .. }));
    assert_eq!(store.entry_count().unwrap(), 1);
}

#[test]
fn export_without_messages_gets_placeholder() {
    let tmp = TempDir::new().unwrap();
    write_json(&tmp.path().join("conversations.json"), &json!([]));
    let store = memory_store(100);

    let outcome = store.build(tmp.path()).unwrap();
    assert!(matches!(
        outcome,
        BuildOutcome::Built { placeholder: true, messages: 0, chunks: 1, .. }
    ));
    assert!(store.is_ready());
    assert_eq!(store.entry_count().unwrap(), 1);
}

#[test]
fn missing_export_leaves_store_unbuilt() {
    let tmp = TempDir::new().unwrap();
    let store = memory_store(100);

    assert!(matches!(store.build(tmp.path()), Err(MemoryError::NotFound(_))));
    assert!(!store.is_ready());
    assert!(!store.is_built().unwrap());
    assert!(matches!(store.search("anything", 3), Err(MemoryError::NotReady(_))));
}

#[test]
fn hi_hello_example() {
    let store = memory_store(5500);
    store
        .build_from_messages(&[
            Message::new("user", 1.0, "hi").unwrap(),
            Message::new("assistant", 2.0, "hello").unwrap(),
        ])
        .unwrap();

    assert_eq!(store.entry_count().unwrap(), 1);
    let hits = store.search("hi", 1).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(
        hits[0].text,
        "[USER] (1970-01-01T00:00:01+00:00): hi\n[ASSISTANT] (1970-01-01T00:00:02+00:00): hello"
    );
    assert!(hits[0].score > 0.0);
}

#[test]
fn k_is_clamped() {
    let store = memory_store(1);
    store.build_from_messages(&many_messages(30)).unwrap();
    assert_eq!(store.entry_count().unwrap(), 30);

    assert_eq!(store.search("note", 0).unwrap().len(), 1);
    assert_eq!(store.search("note", 1000).unwrap().len(), MAX_K);
}

#[test]
fn results_are_ranked_by_similarity() {
    let store = memory_store(3);
    store
        .build_from_messages(&[
            Message::new("user", 1.0, "bake sourdough bread").unwrap(),
            Message::new("user", 2.0, "tune the bicycle gears").unwrap(),
            Message::new("user", 3.0, "water the tomato plants").unwrap(),
        ])
        .unwrap();

    let hits = store.search("bicycle gears", 3).unwrap();
    assert!(hits[0].text.contains("bicycle"));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn store_reattaches_after_another_handle_builds() {
    let vectors = Arc::new(SqliteVecStore::in_memory().unwrap());
    let early = store_over(Arc::clone(&vectors), 100);
    assert!(!early.is_ready());

    let builder = store_over(Arc::clone(&vectors), 100);
    builder.build_from_messages(&many_messages(2)).unwrap();

    assert_eq!(early.search("note", 5).unwrap().len(), 1);
    assert!(early.is_ready());
}

#[test]
fn added_messages_are_searchable() {
    let store = memory_store(100);
    store.build_from_messages(&many_messages(1)).unwrap();

    let outcome = store
        .add(vec![
            NewMessage {
                role: "assistant".into(),
                content: "the violin lesson moved to friday".into(),
                timestamp: Some(50.0),
            },
            NewMessage {
                role: "user".into(),
                content: "noted the violin change".into(),
                timestamp: Some(40.0),
            },
        ])
        .unwrap();
    assert_eq!(outcome.added, 1);
    assert_eq!(store.entry_count().unwrap(), 2);

    let hits = store.search("violin lesson", 1).unwrap();
    // sorted by timestamp before chunking
    assert!(hits[0].text.starts_with("[USER] (1970-01-01T00:00:40+00:00): noted"));
}

#[test]
fn concurrent_adds_do_not_lose_entries() {
    let store: Arc<MemoryStore> = Arc::new(memory_store(100));
    store.build_from_messages(&many_messages(1)).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                store
                    .add(vec![NewMessage {
                        role: "user".into(),
                        content: format!("thread {i} says hello"),
                        timestamp: Some(100.0 + i as f64),
                    }])
                    .unwrap();
                store.search("hello", 3).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.entry_count().unwrap(), 5);
}
