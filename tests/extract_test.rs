mod helpers;

use helpers::{conversation, write_json};
use serde_json::json;
use tempfile::TempDir;
use vesper_memory::error::MemoryError;
use vesper_memory::memory::extract::{extract, locate, Layout};

fn contents(source: &std::path::Path) -> Vec<String> {
    extract(source)
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect()
}

#[test]
fn root_aggregate_is_sorted_across_conversations() {
    let tmp = TempDir::new().unwrap();
    write_json(
        &tmp.path().join("conversations.json"),
        &json!([
            conversation("later", &[("user", 30.0, "third"), ("assistant", 40.0, "fourth")]),
            conversation("earlier", &[("user", 10.0, "first"), ("assistant", 20.0, "second")]),
        ]),
    );

    assert_eq!(contents(tmp.path()), vec!["first", "second", "third", "fourth"]);
}

#[test]
fn nested_aggregate_is_found_one_level_down() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("export-2024").join("conversations.json");
    write_json(&path, &json!([conversation("c", &[("user", 1.0, "nested hello")])]));

    assert_eq!(locate(tmp.path()), Some(Layout::Aggregate(path)));
    assert_eq!(contents(tmp.path()), vec!["nested hello"]);
}

#[test]
fn root_aggregate_wins_over_other_layouts() {
    let tmp = TempDir::new().unwrap();
    write_json(
        &tmp.path().join("conversations.json"),
        &json!([conversation("root", &[("user", 1.0, "from root")])]),
    );
    write_json(
        &tmp.path().join("inner").join("conversations.json"),
        &json!([conversation("nested", &[("user", 1.0, "from nested")])]),
    );
    write_json(
        &tmp.path().join("conversations").join("a.json"),
        &conversation("legacy", &[("user", 1.0, "from legacy")]),
    );

    assert_eq!(contents(tmp.path()), vec!["from root"]);
}

#[test]
fn legacy_directory_skips_malformed_files() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("conversations");
    write_json(
        &dir.join("a.json"),
        &conversation("a", &[("user", 5.0, "alpha"), ("assistant", 6.0, "beta")]),
    );
    write_json(
        &dir.join("nested").join("b.json"),
        &conversation("b", &[("user", 1.0, "gamma")]),
    );
    std::fs::write(dir.join("broken.json"), "{ this is not json").unwrap();
    std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

    assert_eq!(
        locate(tmp.path()),
        Some(Layout::PerConversation(dir.clone()))
    );
    assert_eq!(contents(tmp.path()), vec!["gamma", "alpha", "beta"]);
}

#[test]
fn malformed_aggregate_yields_no_messages() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("conversations.json"), "[{\"mapping\": ").unwrap();

    assert!(extract(tmp.path()).unwrap().is_empty());
}

#[test]
fn missing_export_is_not_found() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir(tmp.path().join("unrelated")).unwrap();

    assert!(locate(tmp.path()).is_none());
    assert!(matches!(extract(tmp.path()), Err(MemoryError::NotFound(_))));
    assert!(matches!(
        extract(tmp.path().join("does-not-exist")),
        Err(MemoryError::NotFound(_))
    ));
}

#[test]
fn equal_timestamps_keep_document_order() {
    let tmp = TempDir::new().unwrap();
    write_json(
        &tmp.path().join("conversations.json"),
        &json!([conversation(
            "same time",
            &[
                ("user", 7.0, "one"),
                ("assistant", 7.0, "two"),
                ("user", 7.0, "three"),
                ("user", 0.5, "zero")
            ]
        )]),
    );

    assert_eq!(contents(tmp.path()), vec!["zero", "one", "two", "three"]);
}

#[test]
fn single_conversation_document_is_accepted() {
    let tmp = TempDir::new().unwrap();
    write_json(
        &tmp.path().join("conversations.json"),
        &conversation("solo", &[("system", 2.0, "be kind"), ("user", 3.0, "ok")]),
    );

    let messages = extract(tmp.path()).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role.as_str(), "system");
    assert_eq!(messages[0].render(), "[SYSTEM] (1970-01-01T00:00:02+00:00): be kind");
}
