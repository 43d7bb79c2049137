//! Catalog record use-case service.
//!
//! # Responsibility
//! - Provide create-or-reuse, update, load and delete entry points.
//! - Keep the search index in step with every persisted write.
//! - Run statement ingestion, similarity queries and legacy import jobs.
//!
//! # Invariants
//! - Every write re-derives the record's graph view before persistence.
//! - Creating content that already exists returns the existing id.
//! - Soft-deleted records are removed from the search index.
//! - Repository and index must not be inside an open transaction when the
//!   service writes.

use crate::config::CatalogConfig;
use crate::graph::export::Exporter;
use crate::graph::sync::{GraphSynchronizer, IngestOutcome};
use crate::graph::Statement;
use crate::legacy::{
    lift_mods, DeadLetter, DrainReport, JobQueue, JobResult, LegacyFormat, LegacyJob,
    LegacyMapper, MapperError,
};
use crate::model::{
    now_epoch_ms, CompressedPayload, DocumentError, ModelDescriptor, ModelKey, ModelRegistry,
    Record, RecordId,
};
use crate::repo::{RecordListQuery, RecordRepository, RepoError, StoredRecord};
use crate::search::{IndexForm, Indexable, ScoredHit, SearchError, SearchIndex};
use crate::similarity::{SimilarityEngine, SimilaritySettings};
use log::{info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug)]
pub enum CatalogError {
    Repo(RepoError),
    Search(SearchError),
    Mapper(MapperError),
    Document(DocumentError),
    NotFound(RecordId),
    /// Stored record belongs to a model that is not registered.
    UnknownModel(ModelKey),
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Search(err) => write!(f, "{err}"),
            Self::Mapper(err) => write!(f, "{err}"),
            Self::Document(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::UnknownModel(key) => write!(f, "model not registered: {key}"),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Search(err) => Some(err),
            Self::Mapper(err) => Some(err),
            Self::Document(err) => Some(err),
            Self::NotFound(_) | Self::UnknownModel(_) => None,
        }
    }
}

impl From<RepoError> for CatalogError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<SearchError> for CatalogError {
    fn from(value: SearchError) -> Self {
        Self::Search(value)
    }
}

impl From<MapperError> for CatalogError {
    fn from(value: MapperError) -> Self {
        Self::Mapper(value)
    }
}

impl From<DocumentError> for CatalogError {
    fn from(value: DocumentError) -> Self {
        Self::Document(value)
    }
}

/// Result of [`CatalogService::create_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(RecordId),
    /// A live record with the same canonical content already existed.
    Reused(RecordId),
}

impl CreateOutcome {
    pub fn id(self) -> RecordId {
        match self {
            Self::Created(id) | Self::Reused(id) => id,
        }
    }

    pub fn is_reused(self) -> bool {
        matches!(self, Self::Reused(_))
    }
}

/// Use-case service over one repository and one search index.
pub struct CatalogService<R: RecordRepository, I: SearchIndex> {
    repo: R,
    index: I,
    models: Arc<ModelRegistry>,
    sync: GraphSynchronizer,
    settings: SimilaritySettings,
    base_uri: String,
    index_form: IndexForm,
    published: Mutex<BTreeSet<ModelKey>>,
    jobs: Mutex<JobQueue>,
}

impl<R: RecordRepository, I: SearchIndex> CatalogService<R, I> {
    pub fn new(repo: R, index: I, models: Arc<ModelRegistry>) -> Self {
        let sync = GraphSynchronizer::new(Arc::clone(models.vocabularies()));
        Self {
            repo,
            index,
            models,
            sync,
            settings: SimilaritySettings::default(),
            base_uri: "http://localhost".to_string(),
            index_form: IndexForm::default(),
            published: Mutex::new(BTreeSet::new()),
            jobs: Mutex::new(JobQueue::new(3)),
        }
    }

    /// Service configured from `config`: every tenant's models are defined
    /// in `models`, and the similarity settings, export base URI and job
    /// attempt limit are applied.
    pub fn from_config(
        repo: R,
        index: I,
        models: Arc<ModelRegistry>,
        config: &CatalogConfig,
    ) -> Self {
        for tenant in &config.tenants {
            let defined = models.define_tenant_models(tenant);
            info!(
                "event=tenant_models module=service status=ok tenant={} models={}",
                tenant.id,
                defined.len()
            );
        }
        Self::new(repo, index, models)
            .with_settings(config.search.settings())
            .with_base_uri(config.base_uri.clone())
            .with_max_attempts(config.jobs.max_attempts)
    }

    pub fn with_settings(mut self, settings: SimilaritySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    pub fn with_index_form(mut self, form: IndexForm) -> Self {
        self.index_form = form;
        self
    }

    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            jobs: Mutex::new(JobQueue::new(max_attempts)),
            ..self
        }
    }

    pub fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    pub fn synchronizer(&self) -> &GraphSynchronizer {
        &self.sync
    }

    pub fn settings(&self) -> SimilaritySettings {
        self.settings
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn max_attempts(&self) -> u32 {
        self.lock_jobs().max_attempts()
    }

    /// Persists `record`, or returns the id of the live record of the same
    /// model whose canonical content is identical.
    pub fn create_record(&self, record: &mut Record) -> CatalogResult<CreateOutcome> {
        record.refresh_graph();
        match self.repo.create_record(record) {
            Ok(id) => {
                self.reindex(record)?;
                Ok(CreateOutcome::Created(id))
            }
            Err(RepoError::DuplicateFingerprint { model, fingerprint }) => {
                let winner = self
                    .repo
                    .find_by_fingerprint(&model, &fingerprint)?
                    .ok_or_else(|| {
                        CatalogError::Repo(RepoError::DuplicateFingerprint {
                            model: model.clone(),
                            fingerprint: fingerprint.clone(),
                        })
                    })?;
                info!(
                    "event=record_dedup module=service status=ok model={model} candidate={} existing={}",
                    record.id(),
                    winner.id
                );
                Ok(CreateOutcome::Reused(winner.id))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Persists changes to an existing record and reindexes it.
    pub fn update_record(&self, record: &mut Record) -> CatalogResult<()> {
        record.touch(now_epoch_ms());
        record.refresh_graph();
        self.repo.update_record(record)?;
        self.reindex(record)
    }

    /// Loads a live record and rehydrates its dynamic fields.
    pub fn get_record(&self, id: RecordId) -> CatalogResult<Record> {
        let stored = self
            .repo
            .get_record(id, false)?
            .ok_or(CatalogError::NotFound(id))?;
        self.hydrate(&stored)
    }

    pub fn list_records(&self, query: &RecordListQuery) -> CatalogResult<Vec<Record>> {
        self.repo
            .list_records(query)?
            .iter()
            .map(|stored| self.hydrate(stored))
            .collect()
    }

    pub fn delete_record(&self, id: RecordId) -> CatalogResult<()> {
        self.repo.soft_delete_record(id, now_epoch_ms())?;
        self.index.remove_document(id)?;
        Ok(())
    }

    /// Ingests statements into a stored record and persists the result.
    pub fn ingest_statements<S>(
        &self,
        id: RecordId,
        statements: S,
    ) -> CatalogResult<Vec<IngestOutcome>>
    where
        S: IntoIterator<Item = Statement>,
    {
        let mut record = self.get_record(id)?;
        let outcomes = statements
            .into_iter()
            .map(|statement| self.sync.ingest_statement(&mut record, statement))
            .collect();
        self.update_record(&mut record)?;
        Ok(outcomes)
    }

    /// Indexed records of the same model resembling `record`, never
    /// including `record` itself.
    pub fn find_similar(&self, record: &Record) -> CatalogResult<Vec<ScoredHit>> {
        let mapping = self.models.mapping_for(record.descriptor());
        let engine = SimilarityEngine::new(&self.index, self.settings);
        Ok(engine.find_similar(record.id(), record, &mapping)?)
    }

    /// Similar records whose canonical content equals `record`'s.
    pub fn exact_duplicates(&self, record: &Record) -> CatalogResult<Vec<RecordId>> {
        let mapping = self.models.mapping_for(record.descriptor());
        let engine = SimilarityEngine::new(&self.index, self.settings);
        let load = |id: RecordId| match self.repo.get_record(id, false) {
            Ok(stored) => stored.map(|stored| stored.document),
            Err(err) => {
                warn!("event=duplicate_load module=service status=error id={id} error={err}");
                None
            }
        };
        Ok(engine.exact_duplicates(record.id(), record, &mapping, load)?)
    }

    /// Stores a legacy payload on a new record and queues its mapping job.
    ///
    /// The payload is parsed up front so unreadable input is rejected
    /// before anything is persisted.
    pub fn import_legacy(
        &self,
        descriptor: Arc<ModelDescriptor>,
        format: LegacyFormat,
        bytes: &[u8],
    ) -> CatalogResult<RecordId> {
        LegacyMapper::new(format).parse(bytes)?;
        let mut record = Record::new(descriptor);
        record.raw_payloads_mut().marc =
            Some(CompressedPayload::from_bytes(bytes).map_err(MapperError::Payload)?);
        let id = self.create_record(&mut record)?.id();
        self.lock_jobs().enqueue(id, format);
        Ok(id)
    }

    /// Runs queued legacy jobs: map to MODS, lift MODS into statements and
    /// persist.
    pub fn run_legacy_jobs(&self) -> DrainReport {
        let mut jobs = self.lock_jobs();
        let mut handler = |job: &LegacyJob| match self.run_legacy_job(job) {
            Ok(()) => JobResult::Success,
            Err(CatalogError::Mapper(err)) if err.is_retryable() => {
                JobResult::retry(err.to_string())
            }
            Err(CatalogError::Search(err)) => JobResult::retry(err.to_string()),
            Err(err) => JobResult::fatal(err.to_string()),
        };
        jobs.drain(&mut handler)
    }

    pub fn pending_legacy_jobs(&self) -> usize {
        self.lock_jobs().pending_len()
    }

    pub fn failed_legacy_jobs(&self) -> Vec<DeadLetter> {
        self.lock_jobs().dead_letters().to_vec()
    }

    /// Moves every failed legacy job back to the queue with a fresh attempt
    /// count. Returns how many were requeued.
    pub fn requeue_failed_legacy_jobs(&self) -> usize {
        self.lock_jobs().requeue_dead()
    }

    fn run_legacy_job(&self, job: &LegacyJob) -> CatalogResult<()> {
        let mut record = self.get_record(job.record_id)?;
        LegacyMapper::new(job.format).map(&mut record)?;

        let mods = match &record.raw_payloads().mods {
            Some(payload) => payload.to_text().map_err(MapperError::Payload)?,
            None => return Err(MapperError::MissingPayload.into()),
        };
        let subject = record.subject();
        for (predicate, object) in lift_mods(&mods).map_err(MapperError::Transform)? {
            self.sync
                .ingest_statement(&mut record, Statement::new(subject.clone(), predicate, object));
        }
        self.update_record(&mut record)
    }

    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, JobQueue> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hydrate(&self, stored: &StoredRecord) -> CatalogResult<Record> {
        let descriptor = self
            .models
            .get(&stored.model.namespace, &stored.model.name)
            .ok_or_else(|| CatalogError::UnknownModel(stored.model.clone()))?;
        Ok(Record::from_document(
            descriptor,
            &stored.document,
            self.models.vocabularies(),
        )?)
    }

    fn reindex(&self, record: &Record) -> CatalogResult<()> {
        let key = record.descriptor().key();
        let first_use = self
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        if first_use {
            let mapping = self.models.mapping_for(record.descriptor());
            if let Err(err) = self.index.put_mapping(&mapping) {
                self.published
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&key);
                return Err(err.into());
            }
        }

        let exporter = Exporter::new(&self.base_uri, self.models.vocabularies());
        let document = record.indexed_json(&self.index_form, &exporter, None);
        self.index.index_document(&key, record.id(), &document)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogError, CatalogService, CreateOutcome};
    use crate::db::open_db_in_memory;
    use crate::model::{FieldValue, ModelDefinition, ModelRegistry, Record};
    use crate::repo::SqliteRecordRepository;
    use crate::search::SqliteSearchIndex;
    use crate::vocab::VocabularyRegistry;
    use std::sync::Arc;
    use uuid::Uuid;

    fn registry() -> Arc<ModelRegistry> {
        let registry = ModelRegistry::new(Arc::new(VocabularyRegistry::builtin()));
        registry
            .define_model(&ModelDefinition::new(
                "Resource",
                "Ltest",
                ["dc"],
                ["dc.BibliographicResource"],
            ))
            .unwrap();
        Arc::new(registry)
    }

    #[test]
    fn identical_content_reuses_the_first_record() {
        let conn = open_db_in_memory().unwrap();
        let models = registry();
        let service = CatalogService::new(
            SqliteRecordRepository::new(&conn),
            SqliteSearchIndex::new(&conn),
            Arc::clone(&models),
        );
        let descriptor = models.get("Ltest", "Resource").unwrap();

        let mut first = Record::new(Arc::clone(&descriptor));
        first.set("title", vec![FieldValue::plain("Same Title")]).unwrap();
        let mut second = Record::new(descriptor);
        second.set("title", vec![FieldValue::plain("Same Title")]).unwrap();

        let created = service.create_record(&mut first).unwrap();
        let reused = service.create_record(&mut second).unwrap();
        assert_eq!(created, CreateOutcome::Created(first.id()));
        assert_eq!(reused, CreateOutcome::Reused(first.id()));
    }

    #[test]
    fn missing_and_deleted_records_are_not_found() {
        let conn = open_db_in_memory().unwrap();
        let models = registry();
        let service = CatalogService::new(
            SqliteRecordRepository::new(&conn),
            SqliteSearchIndex::new(&conn),
            Arc::clone(&models),
        );
        assert!(matches!(
            service.get_record(Uuid::new_v4()),
            Err(CatalogError::NotFound(_))
        ));

        let mut record = Record::new(models.get("Ltest", "Resource").unwrap());
        record.set("title", vec![FieldValue::plain("Gone")]).unwrap();
        let id = service.create_record(&mut record).unwrap().id();
        service.delete_record(id).unwrap();
        assert!(matches!(service.get_record(id), Err(CatalogError::NotFound(_))));
    }
}
