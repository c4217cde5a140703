use crate::collection::Document;
use crate::common::Options;
use crate::errors::{ErrorKind, ImportItemError, ImportReport, NestdocError, NestdocResult};
use crate::query::Criteria;
use crate::service::engine::{PreparedDelete, PreparedUpdate};
use crate::service::DocumentService;
use crate::store::PathValues;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

/// Caller supplied position of a bulk item.
///
/// Indices are opaque: they are carried through every phase so results and
/// failures can be matched back to what the caller submitted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BulkIndex(String);

impl BulkIndex {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<usize> for BulkIndex {
    fn from(index: usize) -> Self {
        BulkIndex(index.to_string())
    }
}

impl From<&str> for BulkIndex {
    fn from(index: &str) -> Self {
        BulkIndex(index.to_string())
    }
}

impl From<String> for BulkIndex {
    fn from(index: String) -> Self {
        BulkIndex(index)
    }
}

impl Display for BulkIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bulk input or output documents keyed by caller index.
pub type BulkItems = IndexMap<BulkIndex, Document>;

/// Bulk input ids keyed by caller index.
pub type BulkIds = IndexMap<BulkIndex, String>;

/// Keys `documents` by their position.
pub fn bulk_items(documents: Vec<Document>) -> BulkItems {
    documents
        .into_iter()
        .enumerate()
        .map(|(index, document)| (BulkIndex::from(index), document))
        .collect()
}

/// Keys `ids` by their position.
pub fn bulk_ids<S: AsRef<str>>(ids: &[S]) -> BulkIds {
    ids.iter()
        .enumerate()
        .map(|(index, id)| (BulkIndex::from(index), id.as_ref().to_string()))
        .collect()
}

fn record(report: &mut ImportReport, index: BulkIndex, error: &NestdocError) {
    report.add_failure(index, ImportItemError::from_error(error));
}

fn duplicate(type_name: &str, id: &str) -> NestdocError {
    log::error!("{} {} appears twice in one batch", type_name, id);
    NestdocError::new(
        &format!("{} {} appears more than once in the batch", type_name, id),
        ErrorKind::Conflict,
    )
}

/// Bulk variants of the lifecycle operations.
///
/// Each runs in three phases: every item is prepared on its own, failures
/// being recorded against its index; the prepared items are written in one
/// repository call; every written item is completed. When the write fails,
/// all the items it carried fail with its message. Items that succeed stay
/// committed; when any item failed the operation then returns an `Import`
/// error whose [ImportReport] holds both the failures and the successes.
impl<const N: usize> DocumentService<N> {
    pub fn create_bulk(
        &self,
        parents: [&str; N],
        items: BulkItems,
        options: &Options,
    ) -> NestdocResult<BulkItems> {
        self.check_batch("create", items.len())?;
        let report = self.create_bulk_report(parents, items, options);
        self.finish_bulk("create", report)
    }

    /// Updates documents identified by the `id` each item carries.
    pub fn update_bulk(
        &self,
        parents: [&str; N],
        items: BulkItems,
        options: &Options,
    ) -> NestdocResult<BulkItems> {
        self.check_batch("update", items.len())?;
        let report = self.update_bulk_report(parents, items, options);
        self.finish_bulk("update", report)
    }

    /// Deletes documents by id. Succeeded entries hold the previous state
    /// when it was fetched, the bare id otherwise.
    pub fn delete_bulk(
        &self,
        parents: [&str; N],
        ids: BulkIds,
        options: &Options,
    ) -> NestdocResult<BulkItems> {
        self.check_batch("delete", ids.len())?;
        let report = self.delete_bulk_report(parents, ids, options);
        self.finish_bulk("delete", report)
    }

    /// Updates the items whose id exists and creates the others.
    pub fn create_or_update_bulk(
        &self,
        parents: [&str; N],
        items: BulkItems,
        options: &Options,
    ) -> NestdocResult<BulkItems> {
        self.check_batch("create or update", items.len())?;
        let order: Vec<BulkIndex> = items.keys().cloned().collect();
        let (mut report, creates, existing) = self.partition_existing(parents, items);

        if !creates.is_empty() {
            report.merge(self.create_bulk_report(parents, creates, options));
        }
        if !existing.is_empty() {
            report.merge(self.update_bulk_report(parents, existing, options));
        }
        report.reorder(&order);
        self.finish_bulk("create or update", report)
    }

    /// Deletes the items whose id exists and creates the others.
    pub fn create_or_delete_bulk(
        &self,
        parents: [&str; N],
        items: BulkItems,
        options: &Options,
    ) -> NestdocResult<BulkItems> {
        self.check_batch("create or delete", items.len())?;
        let order: Vec<BulkIndex> = items.keys().cloned().collect();
        let (mut report, creates, existing) = self.partition_existing(parents, items);

        if !creates.is_empty() {
            report.merge(self.create_bulk_report(parents, creates, options));
        }
        if !existing.is_empty() {
            let ids: BulkIds = existing
                .into_iter()
                .filter_map(|(index, document)| document.id().map(|id| (index, id)))
                .collect();
            report.merge(self.delete_bulk_report(parents, ids, options));
        }
        report.reorder(&order);
        self.finish_bulk("create or delete", report)
    }

    /// Purges the collection, then creates `items` in bulk.
    pub fn replace_bulk(
        &self,
        parents: [&str; N],
        items: BulkItems,
        options: &Options,
    ) -> NestdocResult<BulkItems> {
        self.check_batch("replace", items.len())?;
        self.check_parent(parents)?;
        self.purge(parents, &Criteria::new())?;
        let report = self.create_bulk_report(parents, items, options);
        self.finish_bulk("replace", report)
    }

    fn check_batch(&self, operation: &str, size: usize) -> NestdocResult<()> {
        if size == 0 {
            log::error!("Bulk {} of {} called without items", operation, self.type_path());
            return Err(NestdocError::new(
                &format!("Bulk {} needs at least one item", operation),
                ErrorKind::MissingData,
            ));
        }

        if let Some(max) = self.config().max_bulk_items() {
            if size > max {
                log::error!(
                    "Bulk {} of {} with {} items exceeds the limit of {}",
                    operation,
                    self.type_path(),
                    size,
                    max
                );
                return Err(NestdocError::new(
                    &format!("Bulk {} accepts at most {} items, got {}", operation, max, size),
                    ErrorKind::InvalidOperation,
                ));
            }
        }
        Ok(())
    }

    fn finish_bulk(&self, operation: &str, report: ImportReport) -> NestdocResult<BulkItems> {
        if report.has_failures() {
            log::error!(
                "Bulk {} of {}: {} items failed, {} succeeded",
                operation,
                self.type_path(),
                report.failures().len(),
                report.succeeded().len()
            );
            return Err(NestdocError::import(report));
        }
        log::debug!(
            "Bulk {} of {}: {} items succeeded",
            operation,
            self.type_path(),
            report.succeeded().len()
        );
        Ok(report.into_succeeded())
    }

    /// Splits items into those without an existing id and those with one.
    fn partition_existing(
        &self,
        parents: [&str; N],
        items: BulkItems,
    ) -> (ImportReport, BulkItems, BulkItems) {
        let mut report = ImportReport::new();
        let mut creates = BulkItems::new();
        let mut existing = BulkItems::new();

        for (index, document) in items {
            let id = match document.id() {
                Some(id) => id,
                None => {
                    creates.insert(index, document);
                    continue;
                }
            };
            match self.has(parents, &id) {
                Ok(true) => {
                    existing.insert(index, document);
                }
                Ok(false) => {
                    creates.insert(index, document);
                }
                Err(e) => record(&mut report, index, &e),
            }
        }
        (report, creates, existing)
    }

    fn create_bulk_report(&self, parents: [&str; N], items: BulkItems, options: &Options) -> ImportReport {
        let mut report = ImportReport::new();
        if let Err(e) = self.check_parent(parents) {
            for index in items.into_keys() {
                record(&mut report, index, &e);
            }
            return report;
        }

        let type_name = self.type_path().type_name().to_string();
        let mut seen = HashSet::new();
        let mut indices = Vec::with_capacity(items.len());
        let mut prepared = Vec::with_capacity(items.len());
        for (index, data) in items {
            match self.prepare_create(parents, data, options) {
                Ok(create) => {
                    if let Some(id) = create.document.id() {
                        if !seen.insert(id.clone()) {
                            record(&mut report, index, &duplicate(&type_name, &id));
                            continue;
                        }
                    }
                    indices.push(index);
                    prepared.push(create.document);
                }
                Err(e) => record(&mut report, index, &e),
            }
        }

        if prepared.is_empty() {
            return report;
        }

        match self.persist_creates(parents, prepared) {
            Ok(persisted) => {
                for (index, document) in indices.into_iter().zip(persisted) {
                    match self.complete_create(parents, document, options) {
                        Ok(document) => report.add_success(index, document),
                        Err(e) => record(&mut report, index, &e),
                    }
                }
            }
            Err(e) => {
                for index in indices {
                    record(&mut report, index, &e);
                }
            }
        }
        report
    }

    fn update_bulk_report(&self, parents: [&str; N], items: BulkItems, options: &Options) -> ImportReport {
        let mut report = ImportReport::new();
        let type_name = self.type_path().type_name().to_string();
        let mut seen = HashSet::new();
        let mut values = PathValues::new();
        let mut prepared: Vec<(BulkIndex, PreparedUpdate)> = Vec::with_capacity(items.len());

        for (index, data) in items {
            let id = match data.id() {
                Some(id) => id,
                None => {
                    log::error!("Bulk update item {} of {} has no id", index, self.type_path());
                    let error = NestdocError::new(
                        &format!("An id is required to update a {}", type_name),
                        ErrorKind::MissingData,
                    );
                    record(&mut report, index, &error);
                    continue;
                }
            };
            if !seen.insert(id.clone()) {
                record(&mut report, index, &duplicate(&type_name, &id));
                continue;
            }

            let update = self
                .prepare_update(parents, &id, data, options)
                .and_then(|update| Ok((self.update_values(parents, &update)?, update)));
            match update {
                Ok((update_values, update)) => {
                    values.extend(update_values);
                    prepared.push((index, update));
                }
                Err(e) => record(&mut report, index, &e),
            }
        }

        if prepared.is_empty() {
            return report;
        }

        log::debug!("Updating {} {} documents", prepared.len(), self.type_path());
        if let Err(e) = self.config().repository().set_many(values) {
            for (index, _) in prepared {
                record(&mut report, index, &e);
            }
            return report;
        }

        for (index, update) in prepared {
            match self.complete_update(parents, update, options) {
                Ok(document) => report.add_success(index, document),
                Err(e) => record(&mut report, index, &e),
            }
        }
        report
    }

    fn delete_bulk_report(&self, parents: [&str; N], ids: BulkIds, options: &Options) -> ImportReport {
        let mut before_persist = ImportReport::new();
        let mut after_persist = ImportReport::new();
        let type_name = self.type_path().type_name().to_string();
        let mut seen = HashSet::new();
        let mut paths = Vec::with_capacity(ids.len());
        let mut prepared: Vec<(BulkIndex, PreparedDelete)> = Vec::with_capacity(ids.len());

        for (index, id) in ids {
            if !seen.insert(id.clone()) {
                record(&mut before_persist, index, &duplicate(&type_name, &id));
                continue;
            }

            let delete = self
                .prepare_delete(parents, &id, options)
                .and_then(|delete| Ok((self.document_path(parents, &delete.id)?, delete)));
            match delete {
                Ok((path, delete)) => {
                    paths.push(path);
                    prepared.push((index, delete));
                }
                Err(e) => record(&mut before_persist, index, &e),
            }
        }

        if !prepared.is_empty() {
            log::debug!("Deleting {} {} documents", prepared.len(), self.type_path());
            match self.config().repository().unset(&paths) {
                Ok(_) => {
                    for (index, delete) in prepared {
                        let id = delete.id.clone();
                        match self.complete_delete(delete, options) {
                            Ok(old) => {
                                let document = old.unwrap_or_else(|| {
                                    let mut document = Document::new();
                                    document.set_id(&id);
                                    document
                                });
                                after_persist.add_success(index, document);
                            }
                            Err(e) => record(&mut after_persist, index, &e),
                        }
                    }
                }
                Err(e) => {
                    for (index, _) in prepared {
                        record(&mut after_persist, index, &e);
                    }
                }
            }
        }

        if before_persist.has_failures() || after_persist.has_failures() {
            log::warn!(
                "Bulk delete of {}: {} items failed before the write, {} after",
                self.type_path(),
                before_persist.failures().len(),
                after_persist.failures().len()
            );
        }
        before_persist.merge(after_persist);
        before_persist
    }
}
