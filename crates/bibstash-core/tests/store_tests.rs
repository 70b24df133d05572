//! Integration tests for the Library store against real temp files

use std::fs;

use serde_json::{json, Map, Value};
use tempfile::TempDir;

use bibstash_core::{DateVariable, IdType, Library, Name, OnIdCollision, Record, UpdateOutcome};

fn book(family: &str, year: i32) -> Record {
    let mut record = Record::new("book");
    record.authors = Some(vec![Name::family(family)]);
    record.issued = Some(DateVariable::year(year));
    record
}

fn updates(value: Value) -> Map<String, Value> {
    value.as_object().expect("updates must be an object").clone()
}

fn open_temp_library() -> (TempDir, Library) {
    let dir = TempDir::new().unwrap();
    let library = Library::load(dir.path().join("library.json")).unwrap();
    (dir, library)
}

#[test]
fn load_creates_missing_file_and_parents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("library.json");

    let library = Library::load(&path).unwrap();
    assert!(path.exists());
    assert!(library.is_empty());
    assert_eq!(library.file_path(), path.as_path());
}

#[test]
fn add_then_find_by_generated_key() {
    let (_dir, mut library) = open_temp_library();

    let added = library.add(book("Smith", 2023)).unwrap();
    assert_eq!(added.id, "smith-2023");

    let found = library.find("smith-2023", IdType::Id).unwrap();
    assert_eq!(found.custom.uuid, added.custom.uuid);
}

#[test]
fn second_same_author_year_gets_suffix() {
    let (_dir, mut library) = open_temp_library();

    library.add(book("Smith", 2023)).unwrap();
    let second = library.add(book("Smith", 2023)).unwrap();
    assert_eq!(second.id, "smith-2023a");

    let third = library.add(book("Smith", 2023)).unwrap();
    assert_eq!(third.id, "smith-2023b");
}

#[test]
fn add_fills_identity_metadata() {
    let (_dir, mut library) = open_temp_library();

    let added = library.add(book("Smith", 2023)).unwrap();
    assert!(added.custom.uuid.is_some());
    assert!(added.custom.created_at.is_some());
    assert_eq!(added.custom.created_at, added.custom.timestamp);
}

#[test]
fn find_through_every_index() {
    let (_dir, mut library) = open_temp_library();

    let mut record = book("Smith", 2023);
    record.doi = Some("10.1000/xyz".to_string());
    record.pmid = Some("123456".to_string());
    record.isbn = Some("978-3-16-148410-0".to_string());
    let added = library.add(record).unwrap();
    let uuid = added.custom.uuid.clone().unwrap();

    assert!(library.find("smith-2023", IdType::Id).is_some());
    assert!(library.find(&uuid, IdType::Uuid).is_some());
    assert!(library.find("10.1000/xyz", IdType::Doi).is_some());
    assert!(library.find("123456", IdType::Pmid).is_some());
    assert!(library.find("978-3-16-148410-0", IdType::Isbn).is_some());

    assert!(library.find("10.1000/xyz", IdType::Pmid).is_none());
    assert!(library.find_any("10.1000/xyz").is_some());
}

#[test]
fn empty_identifier_fields_are_not_indexed() {
    let (_dir, mut library) = open_temp_library();

    let mut record = book("Smith", 2023);
    record.doi = Some("  ".to_string());
    library.add(record).unwrap();

    assert!(library.find("  ", IdType::Doi).is_none());
    assert!(library.find("", IdType::Doi).is_none());
}

#[test]
fn remove_clears_every_index() {
    let (_dir, mut library) = open_temp_library();

    let mut record = book("Smith", 2023);
    record.doi = Some("10.1000/xyz".to_string());
    let added = library.add(record).unwrap();
    let uuid = added.custom.uuid.clone().unwrap();

    let removed = library.remove("10.1000/xyz", IdType::Doi).unwrap();
    assert_eq!(removed.id, "smith-2023");

    assert!(library.is_empty());
    assert!(library.find("smith-2023", IdType::Id).is_none());
    assert!(library.find(&uuid, IdType::Uuid).is_none());
    assert!(library.find("10.1000/xyz", IdType::Doi).is_none());
}

#[test]
fn remove_missing_is_not_an_error() {
    let (_dir, mut library) = open_temp_library();
    assert!(library.remove("nope", IdType::Id).is_none());
}

#[test]
fn insertion_order_is_preserved() {
    let (_dir, mut library) = open_temp_library();

    library.add(book("Smith", 2023)).unwrap();
    library.add(book("Jones", 2022)).unwrap();
    library.add(book("Brown", 2021)).unwrap();

    let ids: Vec<&str> = library.all().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["smith-2023", "jones-2022", "brown-2021"]);
}

#[test]
fn update_changes_field_and_preserves_identity() {
    let (_dir, mut library) = open_temp_library();

    let added = library.add(book("Smith", 2023)).unwrap();
    let outcome = library
        .update(
            "smith-2023",
            updates(json!({"title": "New Title"})),
            IdType::Id,
            OnIdCollision::Fail,
        )
        .unwrap();

    let UpdateOutcome::Updated(updated) = outcome else {
        panic!("expected Updated, got {outcome:?}");
    };
    assert_eq!(updated.title.as_deref(), Some("New Title"));
    assert_eq!(updated.custom.uuid, added.custom.uuid);
    assert_eq!(updated.custom.created_at, added.custom.created_at);
}

#[test]
fn noop_update_does_not_bump_timestamp() {
    let (_dir, mut library) = open_temp_library();

    let mut record = book("Smith", 2023);
    record.title = Some("Same Title".to_string());
    let added = library.add(record).unwrap();

    let outcome = library
        .update(
            "smith-2023",
            updates(json!({"title": "Same Title"})),
            IdType::Id,
            OnIdCollision::Fail,
        )
        .unwrap();
    assert!(matches!(outcome, UpdateOutcome::Unchanged(_)));

    let after = library.find("smith-2023", IdType::Id).unwrap();
    assert_eq!(after.custom.timestamp, added.custom.timestamp);
}

#[test]
fn update_ignores_protected_custom_fields_for_change_detection() {
    let (_dir, mut library) = open_temp_library();

    let added = library.add(book("Smith", 2023)).unwrap();
    let outcome = library
        .update(
            "smith-2023",
            updates(json!({"custom": {"uuid": "11111111-1111-4111-8111-111111111111"}})),
            IdType::Id,
            OnIdCollision::Fail,
        )
        .unwrap();
    assert!(matches!(outcome, UpdateOutcome::Unchanged(_)));

    // The protected uuid was not overwritten either
    let after = library.find("smith-2023", IdType::Id).unwrap();
    assert_eq!(after.custom.uuid, added.custom.uuid);
}

#[test]
fn update_id_collision_fail_mode_mutates_nothing() {
    let (_dir, mut library) = open_temp_library();

    library.add(book("Smith", 2023)).unwrap();
    library.add(book("Jones", 2022)).unwrap();

    let outcome = library
        .update(
            "smith-2023",
            updates(json!({"id": "jones-2022"})),
            IdType::Id,
            OnIdCollision::Fail,
        )
        .unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome::IdCollision {
            requested: "jones-2022".to_string()
        }
    );

    assert!(library.find("smith-2023", IdType::Id).is_some());
    assert!(library.find("jones-2022", IdType::Id).is_some());
}

#[test]
fn update_id_collision_suffix_mode_renames() {
    let (_dir, mut library) = open_temp_library();

    library.add(book("Smith", 2023)).unwrap();
    library.add(book("Jones", 2022)).unwrap();

    let outcome = library
        .update(
            "smith-2023",
            updates(json!({"id": "jones-2022"})),
            IdType::Id,
            OnIdCollision::Suffix,
        )
        .unwrap();

    let UpdateOutcome::Updated(updated) = outcome else {
        panic!("expected Updated, got {outcome:?}");
    };
    assert!(updated.id.starts_with("jones-2022"));
    assert!(updated.id["jones-2022".len()..]
        .chars()
        .all(|c| c.is_ascii_lowercase()));
    assert_ne!(updated.id, "jones-2022");

    // Old key is fully gone; new key resolves
    assert!(library.find("smith-2023", IdType::Id).is_none());
    assert!(library.find(&updated.id, IdType::Id).is_some());
}

#[test]
fn update_renaming_to_own_key_is_noop() {
    let (_dir, mut library) = open_temp_library();

    library.add(book("Smith", 2023)).unwrap();
    let outcome = library
        .update(
            "smith-2023",
            updates(json!({"id": "smith-2023"})),
            IdType::Id,
            OnIdCollision::Fail,
        )
        .unwrap();
    assert!(matches!(outcome, UpdateOutcome::Unchanged(_)));
}

#[test]
fn update_missing_identifier_is_not_found() {
    let (_dir, mut library) = open_temp_library();
    let outcome = library
        .update(
            "nope",
            updates(json!({"title": "x"})),
            IdType::Id,
            OnIdCollision::Fail,
        )
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::NotFound);
}

#[test]
fn update_null_clears_optional_field() {
    let (_dir, mut library) = open_temp_library();

    let mut record = book("Smith", 2023);
    record.title = Some("Temporary".to_string());
    library.add(record).unwrap();

    let outcome = library
        .update(
            "smith-2023",
            updates(json!({"title": null})),
            IdType::Id,
            OnIdCollision::Fail,
        )
        .unwrap();
    let UpdateOutcome::Updated(updated) = outcome else {
        panic!("expected Updated, got {outcome:?}");
    };
    assert_eq!(updated.title, None);
}

#[test]
fn update_reindexes_changed_doi() {
    let (_dir, mut library) = open_temp_library();

    let mut record = book("Smith", 2023);
    record.doi = Some("10.1/old".to_string());
    library.add(record).unwrap();

    library
        .update(
            "smith-2023",
            updates(json!({"DOI": "10.1/new"})),
            IdType::Id,
            OnIdCollision::Fail,
        )
        .unwrap();

    assert!(library.find("10.1/old", IdType::Doi).is_none());
    assert!(library.find("10.1/new", IdType::Doi).is_some());
}

#[test]
fn save_then_reload_is_self_write_echo() {
    let (_dir, mut library) = open_temp_library();

    library.add(book("Smith", 2023)).unwrap();
    library.save().unwrap();

    let hash_before = library.current_hash().to_string();
    let reloaded = library.reload().unwrap();
    assert!(!reloaded);
    assert_eq!(library.current_hash(), hash_before);
    assert_eq!(library.len(), 1);
    assert!(library.find("smith-2023", IdType::Id).is_some());
}

#[test]
fn external_change_triggers_full_reload() {
    let (_dir, mut library) = open_temp_library();

    library.add(book("Smith", 2023)).unwrap();
    library.save().unwrap();

    // Someone else rewrites the file with a different record set
    fs::write(
        library.file_path(),
        r#"[{"id": "jones-2022", "type": "book"}]"#,
    )
    .unwrap();

    let reloaded = library.reload().unwrap();
    assert!(reloaded);
    assert_eq!(library.len(), 1);
    assert!(library.find("jones-2022", IdType::Id).is_some());
    // Stale index entries are fully gone
    assert!(library.find("smith-2023", IdType::Id).is_none());
}

#[test]
fn save_updates_hash() {
    let (_dir, mut library) = open_temp_library();
    let empty_hash = library.current_hash().to_string();

    library.add(book("Smith", 2023)).unwrap();
    library.save().unwrap();
    assert_ne!(library.current_hash(), empty_hash);
}

#[test]
fn persisted_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("library.json");

    let first_uuid = {
        let mut library = Library::load(&path).unwrap();
        let mut record = book("Smith", 2023);
        record.custom.extra.insert(
            "tags".to_string(),
            json!(["to-read", "methods"]),
        );
        let added = library.add(record).unwrap();
        library.save().unwrap();
        added.custom.uuid.unwrap()
    };

    let library = Library::load(&path).unwrap();
    let record = library.find("smith-2023", IdType::Id).unwrap();
    assert_eq!(record.custom.uuid.as_deref(), Some(first_uuid.as_str()));
    // Passthrough custom fields survived the disk round trip
    assert_eq!(
        record.custom.extra.get("tags"),
        Some(&json!(["to-read", "methods"]))
    );
}

#[test]
fn legacy_timestamp_is_promoted_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("library.json");
    fs::write(
        &path,
        r#"[{"id": "old-2020", "type": "book", "custom": {"timestamp": "2020-01-01T00:00:00Z"}}]"#,
    )
    .unwrap();

    let library = Library::load(&path).unwrap();
    let record = library.find("old-2020", IdType::Id).unwrap();
    assert_eq!(
        record.custom.created_at.as_deref(),
        Some("2020-01-01T00:00:00Z")
    );
    assert_eq!(
        record.custom.timestamp.as_deref(),
        Some("2020-01-01T00:00:00Z")
    );
    assert!(record.custom.uuid.is_some());
}

#[test]
fn duplicate_keys_in_file_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("library.json");
    fs::write(
        &path,
        r#"[{"id": "x", "type": "book"}, {"id": "x", "type": "book"}]"#,
    )
    .unwrap();

    assert!(Library::load(&path).is_err());
}

#[test]
fn institutional_author_uses_literal_name() {
    let (_dir, mut library) = open_temp_library();

    let mut record = Record::new("report");
    record.authors = Some(vec![Name::literal("World Health Organization")]);
    record.issued = Some(DateVariable::year(2021));
    let added = library.add(record).unwrap();
    assert_eq!(added.id, "world_health_organization-2021");
}

#[test]
fn add_rejects_empty_type() {
    let (_dir, mut library) = open_temp_library();

    // An empty type would persist a file load() itself refuses
    assert!(library.add(Record::new("")).is_err());
    assert!(library.add(Record::new("  ")).is_err());
    assert!(library.is_empty());

    // The saved file stays loadable
    library.save().unwrap();
    assert!(Library::load(library.file_path()).is_ok());
}

#[test]
fn update_rejects_empty_type() {
    let (_dir, mut library) = open_temp_library();

    library.add(book("Smith", 2023)).unwrap();
    let result = library.update(
        "smith-2023",
        updates(json!({"type": ""})),
        IdType::Id,
        OnIdCollision::Fail,
    );
    assert!(result.is_err());

    // Record untouched; a save/load cycle still succeeds
    let record = library.find("smith-2023", IdType::Id).unwrap();
    assert_eq!(record.record_type, "book");
    library.save().unwrap();
    assert!(Library::load(library.file_path()).is_ok());
}

#[test]
fn update_sanitizes_renamed_key() {
    let (_dir, mut library) = open_temp_library();

    library.add(book("Smith", 2023)).unwrap();
    let outcome = library
        .update(
            "smith-2023",
            updates(json!({"id": "has spaces!"})),
            IdType::Id,
            OnIdCollision::Fail,
        )
        .unwrap();

    let UpdateOutcome::Updated(updated) = outcome else {
        panic!("expected Updated, got {outcome:?}");
    };
    assert_eq!(updated.id, "hasspaces");
    assert!(library.find("hasspaces", IdType::Id).is_some());
    assert!(library.find("has spaces!", IdType::Id).is_none());
    assert!(library.find("smith-2023", IdType::Id).is_none());
}

#[test]
fn update_rejects_key_that_sanitizes_to_nothing() {
    let (_dir, mut library) = open_temp_library();

    library.add(book("Smith", 2023)).unwrap();
    let result = library.update(
        "smith-2023",
        updates(json!({"id": "!!!"})),
        IdType::Id,
        OnIdCollision::Fail,
    );
    assert!(result.is_err());
    assert!(library.find("smith-2023", IdType::Id).is_some());
}

#[test]
fn record_without_metadata_gets_fallback_key() {
    let (_dir, mut library) = open_temp_library();

    let added = library.add(Record::new("misc")).unwrap();
    assert_eq!(added.id, "anon-nd-untitled");
}
