use crate::collection::Document;
use crate::common::{Options, Value, DOC_ID};
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::hooks::{EventKind, HookPipeline, Operation, Stage};
use crate::path::{
    collection_path, new_document_id, parent_document_path, validate_id, NestingPath, TypePath,
};
use crate::query::{evaluate, Criteria, FieldSelector, FindOptions};
use crate::service::{DocumentServiceBuilder, ServiceConfig};
use crate::store::PathValues;
use crate::validation::ValidationMode;
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Field to delta map of [DocumentService::increment].
pub type Increments = IndexMap<String, Value>;

/// Service over documents of a root type.
pub type RootDocumentService = DocumentService<0>;
/// Service over documents nested once inside a root document.
pub type SubDocumentService = DocumentService<1>;
/// Service over documents nested twice.
pub type SubSubDocumentService = DocumentService<2>;

/// CRUD lifecycle engine over documents addressed by `N` parent ids.
///
/// Every operation takes the parent ids first, outermost first. Mutations
/// run the callback stages of the service's [HookPipeline] in a fixed order
/// and dispatch lifecycle events afterwards; events nobody listens to are
/// skipped without building their payload.
///
/// Root documents are queried through the repository. Nested collections are
/// read whole and evaluated in memory.
///
/// # Examples
///
/// ```rust,ignore
/// let tasks: SubDocumentService = DocumentService::builder("project")
///     .nested("tasks", "task")
///     .repository(repository.clone())
///     .build()?;
///
/// let task = tasks.create(["p1"], doc! { title: "write docs" }, &Options::new())?;
/// let id = task.id().unwrap_or_default();
/// tasks.update(["p1"], &id, doc! { done: true }, &Options::new())?;
/// let open = tasks.find(["p1"], &filter_by(Criteria::new().with("done", false)?))?;
/// ```
#[derive(Clone)]
pub struct DocumentService<const N: usize> {
    inner: Arc<DocumentServiceInner>,
}

pub(crate) struct DocumentServiceInner {
    pub(crate) config: ServiceConfig,
    pub(crate) pipeline: HookPipeline,
}

/// A create that went through validation and awaits persistence.
pub(crate) struct PreparedCreate {
    pub(crate) document: Document,
}

/// An update that went through validation and awaits persistence.
pub(crate) struct PreparedUpdate {
    pub(crate) id: String,
    pub(crate) document: Document,
    pub(crate) old: Option<Document>,
}

/// A delete whose pre-save stage ran.
pub(crate) struct PreparedDelete {
    pub(crate) id: String,
    pub(crate) old: Option<Document>,
}

impl<const N: usize> DocumentService<N> {
    /// Starts a [DocumentServiceBuilder] whose root type is `type_name`.
    pub fn builder(type_name: &str) -> DocumentServiceBuilder<N> {
        DocumentServiceBuilder::new(type_name)
    }

    pub(crate) fn new(config: ServiceConfig) -> Self {
        let pipeline = HookPipeline::new(
            config.type_path().clone(),
            config.callbacks().clone(),
            config.events().clone(),
        );
        DocumentService {
            inner: Arc::new(DocumentServiceInner { config, pipeline }),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    pub fn type_path(&self) -> &TypePath {
        self.inner.config.type_path()
    }

    pub(crate) fn pipeline(&self) -> &HookPipeline {
        &self.inner.pipeline
    }

    /// Documents matching `options`, sorted, filtered, then paginated.
    pub fn find(&self, parents: [&str; N], options: &FindOptions) -> NestdocResult<Vec<Document>> {
        Ok(self.find_with_total(parents, options)?.0)
    }

    /// Like [Self::find], also returning the number of matches before
    /// pagination.
    pub fn find_with_total(
        &self,
        parents: [&str; N],
        options: &FindOptions,
    ) -> NestdocResult<(Vec<Document>, usize)> {
        if N == 0 {
            let repository = self.inner.config.repository();
            let page = repository.find(
                &options.criteria,
                &options.fields,
                options.limit,
                options.offset,
                &options.sorts,
            )?;
            let total = repository.count(&options.criteria)?;
            return Ok((page, total));
        }

        let children = self.all_children(parents)?;
        Ok(evaluate(children, options))
    }

    /// The document with `id`, projected by `fields`.
    pub fn get(&self, parents: [&str; N], id: &str, fields: &FieldSelector) -> NestdocResult<Document> {
        let document = self.fetch(parents, id)?;
        if fields.is_empty() {
            Ok(document)
        } else {
            Ok(fields.project(&document))
        }
    }

    /// The first document whose `field` equals `value`.
    pub fn get_by<T: Into<Value>>(
        &self,
        parents: [&str; N],
        field: &str,
        value: T,
        fields: &FieldSelector,
    ) -> NestdocResult<Document> {
        let criteria = Criteria::new().with(field, value)?;
        let options = FindOptions::new()
            .criteria(criteria)
            .selector(fields.clone())
            .limit(1);
        match self.find(parents, &options)?.into_iter().next() {
            Some(document) => Ok(document),
            None => {
                log::error!("No {} with {} matching", self.type_path(), field);
                Err(NestdocError::new(
                    &format!("No {} found with this {}", self.type_path().type_name(), field),
                    ErrorKind::NotFound,
                ))
            }
        }
    }

    /// The documents with `ids`, in the order asked. Fails on the first
    /// missing id.
    pub fn get_bulk(
        &self,
        parents: [&str; N],
        ids: &[&str],
        fields: &FieldSelector,
    ) -> NestdocResult<Vec<Document>> {
        ids.iter().map(|id| self.get(parents, id, fields)).collect()
    }

    /// One document picked uniformly among those matching `criteria`.
    pub fn get_random(
        &self,
        parents: [&str; N],
        criteria: &Criteria,
        fields: &FieldSelector,
    ) -> NestdocResult<Document> {
        let options = FindOptions::new()
            .criteria(criteria.clone())
            .fields(&[DOC_ID]);
        let ids: Vec<String> = self
            .find(parents, &options)?
            .into_iter()
            .filter_map(|document| document.id())
            .collect();

        let mut rng = rand::thread_rng();
        match ids.choose(&mut rng) {
            Some(id) => self.get(parents, id, fields),
            None => {
                log::error!("No {} matches {:?}", self.type_path(), criteria);
                Err(NestdocError::new(
                    &format!("No {} matches the criteria", self.type_path().type_name()),
                    ErrorKind::NotFound,
                ))
            }
        }
    }

    pub fn has(&self, parents: [&str; N], id: &str) -> NestdocResult<bool> {
        let path = self.document_path(parents, id)?;
        self.inner.config.repository().has(&path)
    }

    pub fn has_not(&self, parents: [&str; N], id: &str) -> NestdocResult<bool> {
        Ok(!self.has(parents, id)?)
    }

    /// Whether a document whose `field` equals `value` exists.
    pub fn has_by<T: Into<Value>>(&self, parents: [&str; N], field: &str, value: T) -> NestdocResult<bool> {
        let criteria = Criteria::new().with(field, value)?;
        let options = FindOptions::new()
            .criteria(criteria)
            .fields(&[DOC_ID])
            .limit(1);
        Ok(!self.find(parents, &options)?.is_empty())
    }

    /// Fails with `NotFound` unless the document exists.
    pub fn check_exist(&self, parents: [&str; N], id: &str) -> NestdocResult<()> {
        if self.has(parents, id)? {
            return Ok(());
        }
        log::error!("{} {} does not exist", self.type_path(), id);
        Err(NestdocError::new(
            &format!("{} {} not found", self.type_path().type_name(), id),
            ErrorKind::NotFound,
        ))
    }

    /// Fails with `Conflict` when the document exists.
    pub fn check_not_exist(&self, parents: [&str; N], id: &str) -> NestdocResult<()> {
        if !self.has(parents, id)? {
            return Ok(());
        }
        log::error!("{} {} already exists", self.type_path(), id);
        Err(NestdocError::new(
            &format!("{} {} already exists", self.type_path().type_name(), id),
            ErrorKind::Conflict,
        ))
    }

    /// Creates a document from `data`.
    ///
    /// An `id` in `data` is kept, otherwise one is generated. Fails with
    /// `Conflict` when the id is taken.
    pub fn create(&self, parents: [&str; N], data: Document, options: &Options) -> NestdocResult<Document> {
        self.check_parent(parents)?;
        let prepared = self.prepare_create(parents, data, options)?;
        let persisted = self.persist_creates(parents, vec![prepared.document])?;
        match persisted.into_iter().next() {
            Some(document) => self.complete_create(parents, document, options),
            None => {
                log::error!("Repository returned nothing for a created {}", self.type_path());
                Err(NestdocError::new(
                    "Repository did not return the created document",
                    ErrorKind::BackendError,
                ))
            }
        }
    }

    /// Updates the document when `data` carries the id of an existing one,
    /// creates it otherwise.
    pub fn create_or_update(
        &self,
        parents: [&str; N],
        data: Document,
        options: &Options,
    ) -> NestdocResult<Document> {
        match data.id() {
            Some(id) if self.has(parents, &id)? => self.update(parents, &id, data, options),
            _ => self.create(parents, data, options),
        }
    }

    /// Sets the fields of `data` on the document, leaving other fields alone.
    ///
    /// Returns the written fields along with the id.
    pub fn update(
        &self,
        parents: [&str; N],
        id: &str,
        data: Document,
        options: &Options,
    ) -> NestdocResult<Document> {
        let prepared = self.prepare_update(parents, id, data, options)?;
        let values = self.update_values(parents, &prepared)?;
        self.inner.config.repository().set_many(values)?;
        self.complete_update(parents, prepared, options)
    }

    /// Updates the first document whose `field` equals `value`.
    pub fn update_by<T: Into<Value>>(
        &self,
        parents: [&str; N],
        field: &str,
        value: T,
        data: Document,
        options: &Options,
    ) -> NestdocResult<Document> {
        let target = self.get_by(parents, field, value, &FieldSelector::of(&[DOC_ID]))?;
        match target.id() {
            Some(id) => self.update(parents, &id, data, options),
            None => {
                log::error!("Stored {} has no id", self.type_path());
                Err(NestdocError::new(
                    &format!("Stored {} has no id", self.type_path().type_name()),
                    ErrorKind::InternalError,
                ))
            }
        }
    }

    pub fn delete(&self, parents: [&str; N], id: &str, options: &Options) -> NestdocResult<()> {
        let prepared = self.prepare_delete(parents, id, options)?;
        let path = self.document_path(parents, &prepared.id)?;
        self.inner.config.repository().unset(&[path])?;
        self.complete_delete(prepared, options)?;
        Ok(())
    }

    /// Removes the documents matching `criteria` without running callbacks
    /// and returns how many were removed.
    ///
    /// Nested collections can only be purged whole; non-empty criteria fail
    /// with `UnsupportedOperation`.
    pub fn purge(&self, parents: [&str; N], criteria: &Criteria) -> NestdocResult<usize> {
        let repository = self.inner.config.repository();
        let collection = match collection_path(self.type_path(), &parents)? {
            Some(collection) => collection,
            None => {
                let removed = repository.delete_many(criteria)?;
                log::debug!("Purged {} {} documents", removed, self.type_path());
                return Ok(removed);
            }
        };

        if !criteria.is_empty() {
            log::error!("Cannot purge {} with criteria {:?}", self.type_path(), criteria);
            return Err(NestdocError::new(
                &format!(
                    "Purging {} documents by criteria is not supported, nested collections are replaced whole",
                    self.type_path().type_name()
                ),
                ErrorKind::UnsupportedOperation,
            ));
        }

        let removed = self.all_children(parents)?.len();
        repository.set(&collection, Value::Document(Document::new()))?;
        log::debug!("Purged {} {} documents under {}", removed, self.type_path(), collection);
        Ok(removed)
    }

    /// Purges the collection, then creates `items` one by one.
    pub fn replace_all(
        &self,
        parents: [&str; N],
        items: Vec<Document>,
        options: &Options,
    ) -> NestdocResult<Vec<Document>> {
        self.check_parent(parents)?;
        self.purge(parents, &Criteria::new())?;
        items
            .into_iter()
            .map(|data| self.create(parents, data, options))
            .collect()
    }

    /// Adds each delta to its field; the document must exist.
    pub fn increment(&self, parents: [&str; N], id: &str, increments: &Increments) -> NestdocResult<()> {
        if increments.is_empty() {
            log::error!("No field to increment on {} {}", self.type_path(), id);
            return Err(NestdocError::new(
                "At least one field to increment is required",
                ErrorKind::MissingData,
            ));
        }

        self.check_exist(parents, id)?;
        let path = NestingPath::new(parents, id)?;
        let repository = self.inner.config.repository();
        for (field, delta) in increments.iter() {
            let field_path = path.field_path(self.type_path(), field)?;
            repository.increment(&field_path, delta)?;
        }
        Ok(())
    }

    /// Subtracts each delta from its field; the document must exist.
    pub fn decrement(&self, parents: [&str; N], id: &str, decrements: &Increments) -> NestdocResult<()> {
        let mut negated = Increments::with_capacity(decrements.len());
        for (field, delta) in decrements.iter() {
            negated.insert(field.clone(), negate(field, delta)?);
        }
        self.increment(parents, id, &negated)
    }

    pub fn increment_field<T: Into<Value>>(
        &self,
        parents: [&str; N],
        id: &str,
        field: &str,
        delta: T,
    ) -> NestdocResult<()> {
        let mut increments = Increments::new();
        increments.insert(field.to_string(), delta.into());
        self.increment(parents, id, &increments)
    }

    pub fn decrement_field<T: Into<Value>>(
        &self,
        parents: [&str; N],
        id: &str,
        field: &str,
        delta: T,
    ) -> NestdocResult<()> {
        let mut decrements = Increments::new();
        decrements.insert(field.to_string(), delta.into());
        self.decrement(parents, id, &decrements)
    }

    pub(crate) fn document_path(&self, parents: [&str; N], id: &str) -> NestdocResult<String> {
        NestingPath::new(parents, id)?.document_path(self.type_path())
    }

    /// Fails with `NotFound` when the document owning the collection is
    /// missing.
    pub(crate) fn check_parent(&self, parents: [&str; N]) -> NestdocResult<()> {
        let parent = match parent_document_path(self.type_path(), &parents)? {
            Some(parent) => parent,
            None => return Ok(()),
        };

        if self.inner.config.repository().has(&parent)? {
            return Ok(());
        }
        log::error!("Parent {} of {} does not exist", parent, self.type_path());
        Err(NestdocError::new(
            &format!("Parent document {} not found", parent),
            ErrorKind::NotFound,
        ))
    }

    /// Reads the whole document, failing with `NotFound` when absent.
    pub(crate) fn fetch(&self, parents: [&str; N], id: &str) -> NestdocResult<Document> {
        let path = self.document_path(parents, id)?;
        match self.inner.config.repository().get(&path)? {
            Value::Document(mut document) => {
                if !document.has_id() {
                    document.set_id(id);
                }
                Ok(document)
            }
            Value::Null => {
                log::error!("{} {} does not exist", self.type_path(), id);
                Err(NestdocError::new(
                    &format!("{} {} not found", self.type_path().type_name(), id),
                    ErrorKind::NotFound,
                ))
            }
            other => {
                log::error!("Path {} holds a {} instead of a document", path, other.type_name());
                Err(NestdocError::new(
                    &format!("Stored {} {} is not a document", self.type_path().type_name(), id),
                    ErrorKind::BackendError,
                ))
            }
        }
    }

    /// Every document of a nested collection, in storage order.
    fn all_children(&self, parents: [&str; N]) -> NestdocResult<Vec<Document>> {
        let collection = match collection_path(self.type_path(), &parents)? {
            Some(collection) => collection,
            None => return Ok(Vec::new()),
        };

        let value = match self.inner.config.repository().get(&collection) {
            Ok(value) => value,
            Err(e) if e.kind() == &ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        match value {
            Value::Document(children) => Ok(children
                .iter()
                .filter_map(|(key, child)| match child {
                    Value::Document(child) => {
                        let mut child = child.clone();
                        if !child.has_id() {
                            child.set_id(key);
                        }
                        Some(child)
                    }
                    other => {
                        log::warn!("Skipping {} entry {} of type {}", collection, key, other.type_name());
                        None
                    }
                })
                .collect()),
            Value::Null => Ok(Vec::new()),
            other => {
                log::error!("Collection {} holds a {}", collection, other.type_name());
                Err(NestdocError::new(
                    &format!("Collection {} is not a document", collection),
                    ErrorKind::BackendError,
                ))
            }
        }
    }

    /// Runs create up to and including `create.pre_save`.
    pub(crate) fn prepare_create(
        &self,
        parents: [&str; N],
        data: Document,
        options: &Options,
    ) -> NestdocResult<PreparedCreate> {
        let pipeline = self.pipeline();
        let config = self.config();

        let data = pipeline.run_data(Stage::PreValidate(Operation::Create), data, options)?;
        let requested = data.id();
        if let Some(id) = &requested {
            validate_id(id)?;
            self.check_not_exist(parents, id)?;
        }

        let validated = config.validator().validate(
            &self.type_path().name(),
            ValidationMode::Create,
            data.without_id(),
            options.clean_data(config.clean_data()),
            true,
            options,
        )?;
        let document = pipeline.run_document(Stage::Validated(Operation::Create), validated, options)?;
        let document = config.refresh(document, options)?;
        let document = pipeline.run_document(Stage::BeforeSave, document, options)?;
        let mut document = pipeline.run_document(Stage::PreSave(Operation::Create), document, options)?;

        // root ids are assigned by the repository
        match requested {
            Some(id) => document.set_id(&id),
            None if N > 0 => document.set_id(&new_document_id()),
            None => {
                document.remove(DOC_ID);
            }
        }
        Ok(PreparedCreate { document })
    }

    /// Writes prepared documents in a single repository call and returns them
    /// with their ids, in input order.
    pub(crate) fn persist_creates(
        &self,
        parents: [&str; N],
        documents: Vec<Document>,
    ) -> NestdocResult<Vec<Document>> {
        let repository = self.inner.config.repository();
        if N == 0 {
            log::debug!("Creating {} {} documents", documents.len(), self.type_path());
            return repository.create_many(documents);
        }

        let mut values = PathValues::with_capacity(documents.len());
        let mut persisted = Vec::with_capacity(documents.len());
        for mut document in documents {
            let id = match document.id() {
                Some(id) => id,
                None => {
                    let id = new_document_id();
                    document.set_id(&id);
                    id
                }
            };
            let path = self.document_path(parents, &id)?;
            if values.contains_key(&path) {
                log::error!("{} {} is created twice in one batch", self.type_path(), id);
                return Err(NestdocError::new(
                    &format!("{} {} already exists", self.type_path().type_name(), id),
                    ErrorKind::Conflict,
                ));
            }
            values.insert(path, Value::Document(document.clone()));
            persisted.push(document);
        }

        log::debug!("Creating {} {} documents", persisted.len(), self.type_path());
        repository.set_many(values)?;
        Ok(persisted)
    }

    /// Runs create from `create.saved` on, then dispatches events.
    pub(crate) fn complete_create(
        &self,
        parents: [&str; N],
        persisted: Document,
        options: &Options,
    ) -> NestdocResult<Document> {
        let pipeline = self.pipeline();
        let saved = pipeline.run_data(Stage::OperationSaved(Operation::Create), persisted.clone(), options)?;

        let id = match saved.id().or_else(|| persisted.id()) {
            Some(id) => id,
            None => {
                log::error!("Created {} came back without an id", self.type_path());
                return Err(NestdocError::new(
                    &format!("Created {} has no id", self.type_path().type_name()),
                    ErrorKind::InternalError,
                ));
            }
        };

        let mut document = persisted;
        document.set_id(&id);
        let document = pipeline.run_document(Stage::Saved, document, options)?;
        let document = pipeline.run_document(Stage::Created, document, options)?;

        pipeline.emit(EventKind::Created, &id, || Ok((Some(document.clone()), None)));
        pipeline.emit(EventKind::CreatedFull, &id, || {
            Ok((Some(self.fetch(parents, &id)?), None))
        });
        pipeline.emit(EventKind::CreatedNotify, &id, || Ok((Some(document.clone()), None)));
        Ok(document)
    }

    /// Runs update up to and including `update.pre_save`.
    pub(crate) fn prepare_update(
        &self,
        parents: [&str; N],
        id: &str,
        data: Document,
        options: &Options,
    ) -> NestdocResult<PreparedUpdate> {
        let pipeline = self.pipeline();
        let config = self.config();

        self.check_exist(parents, id)?;
        let old = if pipeline.needs_old(Operation::Update) {
            Some(self.fetch(parents, id)?)
        } else {
            None
        };

        let data = pipeline.run_data(Stage::PreValidate(Operation::Update), data, options)?;
        let validated = config.validator().validate(
            &self.type_path().name(),
            ValidationMode::Update,
            data.without_id(),
            options.clean_data(config.clean_data()),
            false,
            options,
        )?;
        let document = pipeline.run_document(Stage::Validated(Operation::Update), validated, options)?;
        let document = config.refresh(document, options)?;
        let document = pipeline.run_document(Stage::BeforeSave, document, options)?;
        let document = pipeline.run_document(Stage::PreSave(Operation::Update), document, options)?;

        Ok(PreparedUpdate {
            id: id.to_string(),
            document: document.without_id(),
            old,
        })
    }

    /// Storage paths and values a prepared update writes.
    pub(crate) fn update_values(&self, parents: [&str; N], prepared: &PreparedUpdate) -> NestdocResult<PathValues> {
        let path = NestingPath::new(parents, &prepared.id)?;
        let mut values = PathValues::with_capacity(prepared.document.size());
        for (field, value) in prepared.document.iter() {
            values.insert(path.field_path(self.type_path(), field)?, value.clone());
        }
        Ok(values)
    }

    /// Runs update from `update.saved` on, then dispatches events.
    pub(crate) fn complete_update(
        &self,
        parents: [&str; N],
        prepared: PreparedUpdate,
        options: &Options,
    ) -> NestdocResult<Document> {
        let pipeline = self.pipeline();
        let PreparedUpdate { id, document, old } = prepared;

        let saved = pipeline.run_data(Stage::OperationSaved(Operation::Update), document, options)?;
        let mut document = saved;
        document.set_id(&id);
        let document = pipeline.run_document(Stage::Saved, document, options)?;
        let document = pipeline.run_document(Stage::Updated, document, options)?;

        pipeline.emit(EventKind::Updated, &id, || Ok((Some(document.clone()), None)));
        pipeline.emit(EventKind::UpdatedOld, &id, || Ok((Some(document.clone()), old.clone())));
        pipeline.emit(EventKind::UpdatedFull, &id, || {
            Ok((Some(self.fetch(parents, &id)?), None))
        });
        pipeline.emit(EventKind::UpdatedFullWithOld, &id, || {
            Ok((Some(self.fetch(parents, &id)?), old.clone()))
        });
        Ok(document)
    }

    /// Runs delete up to and including `delete.pre_save`.
    pub(crate) fn prepare_delete(
        &self,
        parents: [&str; N],
        id: &str,
        options: &Options,
    ) -> NestdocResult<PreparedDelete> {
        let pipeline = self.pipeline();

        self.check_exist(parents, id)?;
        let old = if pipeline.needs_old(Operation::Delete) {
            Some(self.fetch(parents, id)?)
        } else {
            None
        };

        let old = pipeline.run_removal(Stage::PreSave(Operation::Delete), id, old, options)?;
        Ok(PreparedDelete {
            id: id.to_string(),
            old,
        })
    }

    /// Runs delete from `delete.saved` on, then dispatches events. Returns
    /// the previous state when it was fetched.
    pub(crate) fn complete_delete(
        &self,
        prepared: PreparedDelete,
        options: &Options,
    ) -> NestdocResult<Option<Document>> {
        let pipeline = self.pipeline();
        let PreparedDelete { id, old } = prepared;

        let old = pipeline.run_removal(Stage::OperationSaved(Operation::Delete), &id, old, options)?;
        let old = pipeline.run_removal(Stage::Deleted, &id, old, options)?;

        pipeline.emit(EventKind::Deleted, &id, || Ok((None, None)));
        pipeline.emit(EventKind::DeletedOld, &id, || Ok((None, old.clone())));
        pipeline.emit(EventKind::DeletedWithOld, &id, || Ok((None, old.clone())));
        Ok(old)
    }
}

impl<const N: usize> Debug for DocumentService<N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("type_path", &self.type_path().name())
            .field("parents", &N)
            .finish()
    }
}

fn negate(field: &str, delta: &Value) -> NestdocResult<Value> {
    match delta {
        Value::I64(value) => match value.checked_neg() {
            Some(negated) => Ok(Value::I64(negated)),
            None => {
                log::error!("Cannot decrement {} by {}", field, value);
                Err(NestdocError::new(
                    &format!("Field {} cannot be decremented by {} without overflow", field, value),
                    ErrorKind::InvalidOperation,
                ))
            }
        },
        Value::F64(value) => Ok(Value::F64(-value)),
        other => {
            log::error!("Cannot decrement {} by a {}", field, other.type_name());
            Err(NestdocError::new(
                &format!("Field {} can only be decremented by a number", field),
                ErrorKind::InvalidOperation,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::hooks::{CallbackRegistry, EventDispatcher, EventListener, LifecycleEvent, Subject};
    use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
    use crate::query::{filter_by, SortOrder};
    use crate::store::{MemoryRepository, RepositoryProvider, VolatileRepository};
    use crate::validation::{FieldRule, FieldType, Schema, SchemaValidator};

    fn validator() -> SchemaValidator {
        let validator = SchemaValidator::new();
        validator.register(
            "project",
            Schema::new()
                .field(FieldRule::new("name", FieldType::String).required())
                .field(FieldRule::new("stars", FieldType::Int).default_value(0)),
        );
        validator.register(
            "project.task",
            Schema::new()
                .field(FieldRule::new("title", FieldType::String).required())
                .field(FieldRule::new("done", FieldType::Bool).default_value(false))
                .field(FieldRule::new("rank", FieldType::Int)),
        );
        validator
    }

    fn projects(repository: &MemoryRepository) -> RootDocumentService {
        DocumentService::builder("project")
            .repository(repository.clone())
            .validator(validator())
            .build()
            .unwrap()
    }

    fn tasks(repository: &MemoryRepository) -> SubDocumentService {
        DocumentService::builder("project")
            .nested("tasks", "task")
            .repository(repository.clone())
            .validator(validator())
            .build()
            .unwrap()
    }

    fn seeded() -> (MemoryRepository, RootDocumentService, SubDocumentService) {
        let repository = MemoryRepository::new();
        let projects = projects(&repository);
        projects
            .create([], doc! { id: "p1", name: "nestdoc" }, &Options::new())
            .unwrap();
        let tasks = tasks(&repository);
        (repository, projects, tasks)
    }

    #[test]
    fn test_create_root_assigns_id() {
        let repository = MemoryRepository::new();
        let projects = projects(&repository);
        let created = projects
            .create([], doc! { name: "nestdoc" }, &Options::new())
            .unwrap();

        let id = created.id().unwrap();
        assert_eq!(created.get("stars").as_i64(), Some(&0));
        assert!(projects.has([], &id).unwrap());
        assert_eq!(projects.get([], &id, &FieldSelector::new()).unwrap(), created);
    }

    #[test]
    fn test_create_conflicts_on_existing_id() {
        let (_, projects, _) = seeded();
        let err = projects
            .create([], doc! { id: "p1", name: "again" }, &Options::new())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::Conflict);
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_create_rejects_invalid_data_before_saving() {
        let repository = MemoryRepository::new();
        let projects = projects(&repository);
        let err = projects
            .create([], doc! { stars: 3 }, &Options::new())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationFailed);
        assert_eq!(repository.size(), 0);
    }

    #[test]
    fn test_nested_create_and_get() {
        let (repository, _, tasks) = seeded();
        let task = tasks
            .create(["p1"], doc! { title: "write" }, &Options::new())
            .unwrap();
        let id = task.id().unwrap();

        let stored = repository.get(&format!("p1.tasks.{}", id)).unwrap();
        assert_eq!(stored.as_document().and_then(|d| d.id()), Some(id.clone()));
        assert_eq!(
            tasks.get(["p1"], &id, &FieldSelector::of(&["title"])).unwrap(),
            doc! { id: (id.as_str()), title: "write" }
        );
    }

    #[test]
    fn test_nested_create_needs_parent() {
        let (_, _, tasks) = seeded();
        let err = tasks
            .create(["p2"], doc! { title: "orphan" }, &Options::new())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);
    }

    #[test]
    fn test_update_sets_only_given_fields() {
        let (_, projects, tasks) = seeded();
        tasks
            .create(["p1"], doc! { id: "t1", title: "write", rank: 2 }, &Options::new())
            .unwrap();

        let updated = tasks
            .update(["p1"], "t1", doc! { done: true }, &Options::new())
            .unwrap();
        assert_eq!(updated, doc! { id: "t1", done: true });

        let stored = tasks.get(["p1"], "t1", &FieldSelector::new()).unwrap();
        assert_eq!(stored.get("title").as_str(), Some("write"));
        assert_eq!(stored.get("rank").as_i64(), Some(&2));
        assert_eq!(stored.get("done").as_bool(), Some(&true));

        let project = projects.get([], "p1", &FieldSelector::new()).unwrap();
        assert_eq!(project.get("name").as_str(), Some("nestdoc"));
    }

    #[test]
    fn test_update_missing_document() {
        let (_, _, tasks) = seeded();
        let err = tasks
            .update(["p1"], "nope", doc! { done: true }, &Options::new())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_update_by_field() {
        let (_, _, tasks) = seeded();
        tasks
            .create(["p1"], doc! { id: "t1", title: "write" }, &Options::new())
            .unwrap();
        let updated = tasks
            .update_by(["p1"], "title", "write", doc! { rank: 9 }, &Options::new())
            .unwrap();
        assert_eq!(updated.id(), Some("t1".to_string()));
        assert_eq!(
            tasks.get(["p1"], "t1", &FieldSelector::new()).unwrap().get("rank").as_i64(),
            Some(&9)
        );
    }

    #[test]
    fn test_create_or_update() {
        let (_, _, tasks) = seeded();
        tasks
            .create_or_update(["p1"], doc! { id: "t1", title: "first" }, &Options::new())
            .unwrap();
        tasks
            .create_or_update(["p1"], doc! { id: "t1", title: "second" }, &Options::new())
            .unwrap();

        let all = tasks.find(["p1"], &FindOptions::new()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].get("title").as_str(), Some("second"));
    }

    #[test]
    fn test_delete() {
        let (_, _, tasks) = seeded();
        tasks
            .create(["p1"], doc! { id: "t1", title: "write" }, &Options::new())
            .unwrap();
        tasks.delete(["p1"], "t1", &Options::new()).unwrap();
        assert!(tasks.has_not(["p1"], "t1").unwrap());

        let err = tasks.delete(["p1"], "t1", &Options::new()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);
    }

    #[test]
    fn test_find_nested_sorts_filters_and_paginates() {
        let (_, _, tasks) = seeded();
        for (id, rank, done) in [("a", 3, false), ("b", 1, true), ("c", 2, false), ("d", 4, false)] {
            tasks
                .create(["p1"], doc! { id: id, title: id, rank: rank, done: done }, &Options::new())
                .unwrap();
        }

        let options = filter_by(Criteria::new().with("done", false).unwrap())
            .sort_by("rank", SortOrder::Ascending)
            .fields(&["rank"])
            .limit(2);
        let (page, total) = tasks.find_with_total(["p1"], &options).unwrap();
        assert_eq!(total, 3);
        assert_eq!(page, vec![doc! { id: "c", rank: 2 }, doc! { id: "a", rank: 3 }]);
    }

    #[test]
    fn test_find_root_with_total() {
        let (_, projects, _) = seeded();
        projects
            .create([], doc! { id: "p2", name: "other", stars: 5 }, &Options::new())
            .unwrap();
        let options = FindOptions::new().sort_by("id", SortOrder::Descending).limit(1);
        let (page, total) = projects.find_with_total([], &options).unwrap();
        assert_eq!(total, 2);
        assert_eq!(page[0].id(), Some("p2".to_string()));
    }

    #[test]
    fn test_find_in_missing_collection_is_empty() {
        let (_, _, tasks) = seeded();
        assert!(tasks.find(["p1"], &FindOptions::new()).unwrap().is_empty());
        assert!(tasks.find(["p9"], &FindOptions::new()).unwrap().is_empty());
    }

    #[test]
    fn test_get_by_and_has_by() {
        let (_, _, tasks) = seeded();
        tasks
            .create(["p1"], doc! { id: "t1", title: "write", rank: 5 }, &Options::new())
            .unwrap();
        assert!(tasks.has_by(["p1"], "rank", 5).unwrap());
        assert!(!tasks.has_by(["p1"], "rank", 6).unwrap());
        assert_eq!(
            tasks
                .get_by(["p1"], "title", "write", &FieldSelector::new())
                .unwrap()
                .id(),
            Some("t1".to_string())
        );
        let err = tasks
            .get_by(["p1"], "title", "read", &FieldSelector::new())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);
    }

    #[test]
    fn test_get_bulk_and_random() {
        let (_, _, tasks) = seeded();
        for id in ["a", "b", "c"] {
            tasks
                .create(["p1"], doc! { id: id, title: id }, &Options::new())
                .unwrap();
        }
        let found = tasks
            .get_bulk(["p1"], &["c", "a"], &FieldSelector::new())
            .unwrap();
        assert_eq!(found[0].id(), Some("c".to_string()));
        assert_eq!(found[1].id(), Some("a".to_string()));
        assert!(tasks.get_bulk(["p1"], &["a", "z"], &FieldSelector::new()).is_err());

        let criteria = Criteria::new().with("title", "b").unwrap();
        let random = tasks
            .get_random(["p1"], &criteria, &FieldSelector::new())
            .unwrap();
        assert_eq!(random.id(), Some("b".to_string()));

        let none = Criteria::new().with("title", "z").unwrap();
        assert_eq!(
            tasks
                .get_random(["p1"], &none, &FieldSelector::new())
                .unwrap_err()
                .kind(),
            &ErrorKind::NotFound
        );
    }

    #[test]
    fn test_purge() {
        let (_, projects, tasks) = seeded();
        for id in ["a", "b"] {
            tasks
                .create(["p1"], doc! { id: id, title: id }, &Options::new())
                .unwrap();
        }

        let criteria = Criteria::new().with("title", "a").unwrap();
        let err = tasks.purge(["p1"], &criteria).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnsupportedOperation);
        assert_eq!(err.status_code(), 500);

        assert_eq!(tasks.purge(["p1"], &Criteria::new()).unwrap(), 2);
        assert!(tasks.find(["p1"], &FindOptions::new()).unwrap().is_empty());
        assert!(projects.has([], "p1").unwrap());

        let criteria = Criteria::new().with("name", "nestdoc").unwrap();
        assert_eq!(projects.purge([], &criteria).unwrap(), 1);
        assert!(projects.has_not([], "p1").unwrap());
    }

    #[test]
    fn test_replace_all() {
        let (_, _, tasks) = seeded();
        tasks
            .create(["p1"], doc! { id: "old", title: "old" }, &Options::new())
            .unwrap();
        let created = tasks
            .replace_all(
                ["p1"],
                vec![doc! { title: "x" }, doc! { id: "y", title: "y" }],
                &Options::new(),
            )
            .unwrap();
        assert_eq!(created.len(), 2);
        assert!(tasks.has_not(["p1"], "old").unwrap());
        assert!(tasks.has(["p1"], "y").unwrap());
    }

    #[test]
    fn test_increment_and_decrement() {
        let (_, projects, _) = seeded();
        projects.increment_field([], "p1", "stars", 7).unwrap();
        assert_eq!(
            projects.get([], "p1", &FieldSelector::new()).unwrap().get("stars").as_i64(),
            Some(&7)
        );
        projects.decrement_field([], "p1", "stars", 7).unwrap();
        assert_eq!(
            projects.get([], "p1", &FieldSelector::new()).unwrap().get("stars").as_i64(),
            Some(&0)
        );

        let mut increments = Increments::new();
        increments.insert("stars".to_string(), Value::from(2));
        increments.insert("views".to_string(), Value::from(1.5));
        projects.increment([], "p1", &increments).unwrap();
        let project = projects.get([], "p1", &FieldSelector::new()).unwrap();
        assert_eq!(project.get("stars").as_i64(), Some(&2));
        assert_eq!(project.get("views").as_f64(), Some(&1.5));

        assert_eq!(
            projects.increment_field([], "nope", "stars", 1).unwrap_err().kind(),
            &ErrorKind::NotFound
        );
        assert_eq!(
            projects.decrement_field([], "p1", "stars", "x").unwrap_err().kind(),
            &ErrorKind::InvalidOperation
        );
        assert_eq!(
            projects.increment([], "p1", &Increments::new()).unwrap_err().kind(),
            &ErrorKind::MissingData
        );

        assert_eq!(
            projects.decrement_field([], "p1", "stars", i64::MIN).unwrap_err().kind(),
            &ErrorKind::InvalidOperation
        );
        projects.increment_field([], "p1", "stars", i64::MAX - 2).unwrap();
        assert_eq!(
            projects.increment_field([], "p1", "stars", 1).unwrap_err().kind(),
            &ErrorKind::InvalidOperation
        );
        assert_eq!(
            projects.get([], "p1", &FieldSelector::new()).unwrap().get("stars").as_i64(),
            Some(&i64::MAX)
        );
    }

    #[test]
    fn test_invalid_ids() {
        let (_, _, tasks) = seeded();
        assert_eq!(tasks.has(["p1"], "a.b").unwrap_err().kind(), &ErrorKind::InvalidId);
        let err = tasks
            .create(["p1"], doc! { id: "a.b", title: "x" }, &Options::new())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidId);
    }

    #[test]
    fn test_callbacks_run_in_order() {
        let repository = MemoryRepository::new();
        let stages: Atomic<Vec<String>> = atomic(Vec::new());
        let callbacks = CallbackRegistry::new();
        for stage in [
            "create.pre_validate",
            "create.validated",
            "pre_save",
            "create.pre_save",
            "create.saved",
            "saved",
            "created",
        ] {
            let sink = stages.clone();
            let stage_name = stage.to_string();
            callbacks.register(&format!("project.{}", stage), move |subject: Subject, _: &Options| {
                let kind = if subject.is_data() { "data" } else { "document" };
                sink.write_with(|s| s.push(format!("{}:{}", stage_name, kind)));
                Ok(subject)
            });
        }

        let projects: RootDocumentService = DocumentService::builder("project")
            .repository(repository)
            .callbacks(callbacks)
            .build()
            .unwrap();
        projects
            .create([], doc! { name: "x" }, &Options::new())
            .unwrap();

        assert_eq!(
            stages.read_with(|s| s.clone()),
            vec![
                "create.pre_validate:data",
                "create.validated:document",
                "pre_save:document",
                "create.pre_save:document",
                "create.saved:data",
                "saved:document",
                "created:document",
            ]
        );
    }

    #[test]
    fn test_refresher_computes_fields() {
        let repository = MemoryRepository::new();
        let projects: RootDocumentService = DocumentService::builder("project")
            .repository(repository)
            .refresher(|mut document: Document, _: &Options| {
                let name = document.get("name").as_str().unwrap_or_default().to_uppercase();
                document.put("slug", name)?;
                Ok(document)
            })
            .build()
            .unwrap();
        let created = projects
            .create([], doc! { name: "abc" }, &Options::new())
            .unwrap();
        assert_eq!(created.get("slug").as_str(), Some("ABC"));
    }

    #[test]
    fn test_delete_with_old_event() {
        let (repository, _, _) = seeded();
        let events = EventDispatcher::new();
        let seen: Atomic<Vec<String>> = atomic(Vec::new());
        let sink = seen.clone();
        events
            .subscribe(
                "project.task.deleted.withOld",
                EventListener::new(move |event: LifecycleEvent| {
                    let title = event
                        .old()
                        .and_then(|d| d.get("title").as_str().map(|s| s.to_string()))
                        .unwrap_or_default();
                    sink.write_with(|s| s.push(title));
                    Ok(())
                }),
            )
            .unwrap();

        let tasks: SubDocumentService = DocumentService::builder("project")
            .nested("tasks", "task")
            .repository(repository)
            .events(events)
            .build()
            .unwrap();
        tasks
            .create(["p1"], doc! { id: "t1", title: "write" }, &Options::new())
            .unwrap();
        tasks.delete(["p1"], "t1", &Options::new()).unwrap();
        assert_eq!(seen.read_with(|s| s.clone()), vec!["write".to_string()]);
    }

    #[test]
    fn test_volatile_service() {
        let projects: RootDocumentService = DocumentService::builder("project")
            .repository(VolatileRepository)
            .build()
            .unwrap();
        let created = projects
            .create([], doc! { name: "x" }, &Options::new())
            .unwrap();
        assert!(created.has_id());
        assert!(projects.find([], &FindOptions::new()).unwrap().is_empty());
        assert!(projects.has_not([], &created.id().unwrap()).unwrap());
    }
}
