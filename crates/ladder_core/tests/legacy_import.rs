use ladder_core::db::open_db_in_memory;
use ladder_core::legacy::marc::{MarcField, MarcReader, MarcRecord, Subfield};
use ladder_core::legacy::marcxml::to_marcxml;
use ladder_core::model::ModelDefinition;
use ladder_core::{
    CatalogError, CatalogService, FieldValue, LegacyFormat, LegacyMapper, MapperError,
    ModelRegistry, SqliteRecordRepository, SqliteSearchIndex, VocabularyRegistry,
};
use std::sync::Arc;

fn comet() -> MarcRecord {
    MarcRecord::new("00000nam a2200000 a 4500")
        .with_field(MarcField::control("001", "ocm123"))
        .with_field(MarcField::control("008", "900101s1946    sw            000 1 swe d"))
        .with_field(MarcField::data(
            "100",
            '1',
            ' ',
            vec![Subfield::new('a', "Jansson, Tove,"), Subfield::new('d', "1914-2001.")],
        ))
        .with_field(MarcField::data(
            "245",
            '1',
            '0',
            vec![Subfield::new('a', "Comet in Moominland /"), Subfield::new('c', "Tove Jansson.")],
        ))
        .with_field(MarcField::data(
            "650",
            ' ',
            '0',
            vec![Subfield::new('a', "Comets"), Subfield::new('v', "Juvenile fiction.")],
        ))
}

fn models() -> Arc<ModelRegistry> {
    let registry = ModelRegistry::new(Arc::new(VocabularyRegistry::builtin()));
    registry
        .define_model(&ModelDefinition::new(
            "Resource",
            "Ltenant1",
            ["dc"],
            ["dc.BibliographicResource"],
        ))
        .unwrap();
    Arc::new(registry)
}

#[test]
fn imported_marc_is_mapped_lifted_and_persisted() {
    let conn = open_db_in_memory().unwrap();
    let models = models();
    let service = CatalogService::new(
        SqliteRecordRepository::new(&conn),
        SqliteSearchIndex::new(&conn),
        Arc::clone(&models),
    );
    let descriptor = models.get("Ltenant1", "Resource").unwrap();

    let bytes = comet().to_iso2709().unwrap();
    let id = service
        .import_legacy(descriptor, LegacyFormat::Marc21, &bytes)
        .unwrap();
    assert_eq!(service.pending_legacy_jobs(), 1);

    let report = service.run_legacy_jobs();
    assert_eq!(report.succeeded, 1);
    assert_eq!(service.pending_legacy_jobs(), 0);

    let record = service.get_record(id).unwrap();
    assert_eq!(record.get("title").unwrap(), [FieldValue::plain("Comet in Moominland")]);
    assert_eq!(record.get("creator").unwrap(), [FieldValue::plain("Jansson, Tove")]);
    assert_eq!(
        record.get("subject").unwrap(),
        [FieldValue::plain("Comets"), FieldValue::plain("Juvenile fiction")]
    );
    assert_eq!(record.get("language").unwrap(), [FieldValue::plain("swe")]);
    let mods = record.raw_payloads().mods.as_ref().unwrap().to_text().unwrap();
    assert!(mods.contains("<namePart type=\"date\">1914-2001</namePart>"));
    assert_eq!(
        record.raw_payloads().marc.as_ref().unwrap().to_bytes().unwrap(),
        bytes
    );
}

#[test]
fn two_unmapped_imports_do_not_dedupe() {
    let conn = open_db_in_memory().unwrap();
    let models = models();
    let service = CatalogService::new(
        SqliteRecordRepository::new(&conn),
        SqliteSearchIndex::new(&conn),
        Arc::clone(&models),
    );
    let descriptor = models.get("Ltenant1", "Resource").unwrap();
    let bytes = comet().to_iso2709().unwrap();

    let first = service
        .import_legacy(Arc::clone(&descriptor), LegacyFormat::Marc21, &bytes)
        .unwrap();
    let second = service
        .import_legacy(descriptor, LegacyFormat::Marc21, &bytes)
        .unwrap();
    assert_ne!(first, second);
}

#[test]
fn jobs_for_deleted_records_end_in_dead_letters() {
    let conn = open_db_in_memory().unwrap();
    let models = models();
    let service = CatalogService::new(
        SqliteRecordRepository::new(&conn),
        SqliteSearchIndex::new(&conn),
        Arc::clone(&models),
    );
    let descriptor = models.get("Ltenant1", "Resource").unwrap();
    let xml = to_marcxml(&[comet()]).unwrap();

    let id = service
        .import_legacy(descriptor, LegacyFormat::MarcXml, xml.as_bytes())
        .unwrap();
    service.delete_record(id).unwrap();

    let report = service.run_legacy_jobs();
    assert_eq!(report.dead, 1);
    let failed = service.failed_legacy_jobs();
    assert_eq!(failed[0].job.record_id, id);
    assert_eq!(failed[0].job.attempts, 1);

    assert_eq!(service.requeue_failed_legacy_jobs(), 1);
    assert_eq!(service.pending_legacy_jobs(), 1);
    assert!(service.failed_legacy_jobs().is_empty());

    let report = service.run_legacy_jobs();
    assert_eq!(report.dead, 1);
    assert_eq!(service.failed_legacy_jobs()[0].job.attempts, 1);
}

#[test]
fn unreadable_input_is_rejected_before_persisting() {
    let conn = open_db_in_memory().unwrap();
    let models = models();
    let service = CatalogService::new(
        SqliteRecordRepository::new(&conn),
        SqliteSearchIndex::new(&conn),
        Arc::clone(&models),
    );
    let descriptor = models.get("Ltenant1", "Resource").unwrap();

    let err = service
        .import_legacy(descriptor, LegacyFormat::MarcXml, b"<rdf/>")
        .unwrap_err();
    assert!(matches!(err, CatalogError::Mapper(MapperError::Marc(_))));
    assert_eq!(service.pending_legacy_jobs(), 0);
}

#[test]
fn damaged_stream_still_yields_readable_records() {
    let mut stream = comet().to_iso2709().unwrap();
    stream.extend_from_slice(b"short\x1d");
    stream.extend(comet().to_iso2709().unwrap());

    let parsed: Vec<_> = MarcReader::new(&stream).collect();
    assert_eq!(parsed.len(), 3);
    assert!(parsed[1].is_err());

    let mods = LegacyMapper::new(LegacyFormat::Marc21).map_bytes(&stream).unwrap();
    assert!(mods.contains("<modsCollection"));
    assert_eq!(mods.matches("<title>Comet in Moominland</title>").count(), 2);
}
