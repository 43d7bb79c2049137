use ladder_core::db::open_db_in_memory;
use ladder_core::model::{now_epoch_ms, ModelDefinition, PropertyOptions};
use ladder_core::repo::{content_fingerprint, RecordListQuery, StoredRecord};
use ladder_core::{
    FieldValue, ModelRegistry, Normalizable, Record, RecordRepository, RepoError,
    SqliteRecordRepository, VocabularyRegistry,
};
use std::sync::Arc;
use uuid::Uuid;

const BIBO_EDITION: &str = "http://purl.org/ontology/bibo/edition";

fn registry() -> ModelRegistry {
    let registry = ModelRegistry::new(Arc::new(VocabularyRegistry::builtin()));
    registry
        .define_model(&ModelDefinition::new(
            "Resource",
            "Ltenant1",
            ["dc"],
            ["dc.BibliographicResource"],
        ))
        .unwrap();
    registry
}

fn restore(registry: &ModelRegistry, stored: &StoredRecord) -> Record {
    let descriptor = registry
        .get(&stored.model.namespace, &stored.model.name)
        .unwrap();
    Record::from_document(descriptor, &stored.document, registry.vocabularies()).unwrap()
}

#[test]
fn dynamic_properties_survive_a_round_trip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::new(&conn);
    let registry = registry();
    let descriptor = registry.get("Ltenant1", "Resource").unwrap();

    let mut record = Record::new(descriptor);
    record.set("title", vec![FieldValue::plain("Moominvalley in November")]).unwrap();
    let delta = record
        .define_property(
            "edition",
            BIBO_EDITION,
            &PropertyOptions::default(),
            registry.vocabularies(),
        )
        .unwrap();
    assert_eq!(delta.field_name, "edition");
    record.set("edition", vec![FieldValue::plain("2nd")]).unwrap();
    record.assert_type("http://purl.org/ontology/bibo/Book");

    let id = repo.create_record(&record).unwrap();
    let stored = repo.get_record(id, false).unwrap().unwrap();
    assert_eq!(stored.fingerprint.as_deref(), Some(record.fingerprint().as_str()));

    let loaded = restore(&registry, &stored);
    assert_eq!(loaded.id(), id);
    assert_eq!(loaded.get("edition").unwrap(), [FieldValue::plain("2nd")]);
    assert_eq!(
        loaded.get("title").unwrap(),
        [FieldValue::plain("Moominvalley in November")]
    );
    assert_eq!(loaded.types(), ["http://purl.org/ontology/bibo/Book".to_string()]);
}

#[test]
fn empty_records_store_no_fingerprint() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::new(&conn);
    let registry = registry();
    let descriptor = registry.get("Ltenant1", "Resource").unwrap();

    let first = Record::new(Arc::clone(&descriptor));
    let second = Record::new(descriptor);
    assert!(content_fingerprint(&first).is_none());

    let first_id = repo.create_record(&first).unwrap();
    let second_id = repo.create_record(&second).unwrap();
    assert_ne!(first_id, second_id);
    assert!(repo
        .get_record(first_id, false)
        .unwrap()
        .unwrap()
        .fingerprint
        .is_none());
}

#[test]
fn duplicate_content_is_reported_as_conflict() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::new(&conn);
    let registry = registry();
    let descriptor = registry.get("Ltenant1", "Resource").unwrap();

    let mut first = Record::new(Arc::clone(&descriptor));
    first.set("title", vec![FieldValue::plain("Sculptor's Daughter")]).unwrap();
    let mut second = Record::new(descriptor);
    second.set("title", vec![FieldValue::plain("Sculptor's Daughter")]).unwrap();

    repo.create_record(&first).unwrap();
    let err = repo.create_record(&second).unwrap_err();
    assert!(matches!(err, RepoError::DuplicateFingerprint { .. }));

    let winner = repo
        .find_by_fingerprint(&first.descriptor().key(), &first.fingerprint())
        .unwrap()
        .unwrap();
    assert_eq!(winner.id, first.id());
}

#[test]
fn listing_honours_deletion_and_paging() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::new(&conn);
    let registry = registry();
    let descriptor = registry.get("Ltenant1", "Resource").unwrap();

    let mut ids = Vec::new();
    for title in ["The Moomins and the Great Flood", "Comet in Moominland", "Moominsummer Madness"] {
        let mut record = Record::new(Arc::clone(&descriptor));
        record.set("title", vec![FieldValue::plain(title)]).unwrap();
        ids.push(repo.create_record(&record).unwrap());
    }
    repo.soft_delete_record(ids[0], now_epoch_ms()).unwrap();

    let live = repo.list_records(&RecordListQuery::default()).unwrap();
    assert_eq!(live.len(), 2);
    assert!(live.iter().all(|stored| stored.id != ids[0]));

    let all = repo
        .list_records(&RecordListQuery {
            include_deleted: true,
            ..RecordListQuery::default()
        })
        .unwrap();
    assert_eq!(all.len(), 3);

    let page = repo
        .list_records(&RecordListQuery {
            model: Some(descriptor.key()),
            limit: Some(1),
            offset: 1,
            ..RecordListQuery::default()
        })
        .unwrap();
    assert_eq!(page.len(), 1);

    assert!(repo.get_record(ids[0], false).unwrap().is_none());
    let deleted = repo.get_record(ids[0], true).unwrap().unwrap();
    assert!(deleted.is_deleted);
}

#[test]
fn unknown_ids_are_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::new(&conn);
    let missing = Uuid::new_v4();

    assert!(matches!(
        repo.soft_delete_record(missing, 1),
        Err(RepoError::NotFound(id)) if id == missing
    ));
}
