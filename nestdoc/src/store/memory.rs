use crate::collection::Document;
use crate::common::{atomic, Atomic, ReadExecutor, Value, WriteExecutor, FIELD_SEPARATOR};
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::path::{new_document_id, validate_id};
use crate::query::{evaluate, Criteria, FieldSelector, FindOptions, SortSpec};
use crate::store::{PathValues, RepositoryProvider};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Repository keeping root documents in memory, keyed by id.
///
/// Each call holds the lock for its whole duration, so batch writes such as
/// [RepositoryProvider::set_many] and [RepositoryProvider::create_many] are
/// atomic.
#[derive(Clone)]
pub struct MemoryRepository {
    inner: Arc<MemoryRepositoryInner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        MemoryRepository {
            inner: Arc::new(MemoryRepositoryInner::new()),
        }
    }

    /// Number of root documents.
    pub fn size(&self) -> usize {
        self.inner.documents.read_with(|docs| docs.len())
    }

    /// Copy of every root document, in id order.
    pub fn snapshot(&self) -> Vec<Document> {
        self.inner
            .documents
            .read_with(|docs| docs.values().cloned().collect())
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        MemoryRepository::new()
    }
}

impl RepositoryProvider for MemoryRepository {
    fn get(&self, path: &str) -> NestdocResult<Value> {
        self.inner.get(path)
    }

    fn set(&self, path: &str, value: Value) -> NestdocResult<()> {
        self.inner
            .documents
            .write_with(|docs| MemoryRepositoryInner::set_path(docs, path, value))
    }

    fn set_many(&self, values: PathValues) -> NestdocResult<()> {
        self.inner.set_many(values)
    }

    fn unset(&self, paths: &[String]) -> NestdocResult<()> {
        self.inner.unset(paths)
    }

    fn increment(&self, path: &str, delta: &Value) -> NestdocResult<()> {
        self.inner.increment(path, delta)
    }

    fn has(&self, path: &str) -> NestdocResult<bool> {
        self.inner.has(path)
    }

    fn find(
        &self,
        criteria: &Criteria,
        fields: &FieldSelector,
        limit: Option<i64>,
        offset: i64,
        sorts: &SortSpec,
    ) -> NestdocResult<Vec<Document>> {
        let options = FindOptions {
            criteria: criteria.clone(),
            fields: fields.clone(),
            sorts: sorts.clone(),
            limit,
            offset,
        };
        let (page, _) = evaluate(self.snapshot(), &options);
        Ok(page)
    }

    fn count(&self, criteria: &Criteria) -> NestdocResult<usize> {
        Ok(self
            .inner
            .documents
            .read_with(|docs| docs.values().filter(|doc| criteria.matches(doc)).count()))
    }

    fn delete_many(&self, criteria: &Criteria) -> NestdocResult<usize> {
        Ok(self.inner.documents.write_with(|docs| {
            let before = docs.len();
            docs.retain(|_, doc| !criteria.matches(doc));
            before - docs.len()
        }))
    }

    fn create_many(&self, documents: Vec<Document>) -> NestdocResult<Vec<Document>> {
        self.inner.create_many(documents)
    }
}

struct MemoryRepositoryInner {
    documents: Atomic<BTreeMap<String, Document>>,
}

impl MemoryRepositoryInner {
    fn new() -> Self {
        MemoryRepositoryInner {
            documents: atomic(BTreeMap::new()),
        }
    }

    fn get(&self, path: &str) -> NestdocResult<Value> {
        let (id, field) = split_path(path)?;
        self.documents.read_with(|docs| {
            let doc = match docs.get(id) {
                Some(doc) => doc,
                None => return Err(not_found(path)),
            };
            match field {
                None => Ok(Value::Document(doc.clone())),
                Some(field) if doc.contains_field(field) => Ok(doc.get(field)),
                Some(_) => Err(not_found(path)),
            }
        })
    }

    fn has(&self, path: &str) -> NestdocResult<bool> {
        let (id, field) = split_path(path)?;
        Ok(self.documents.read_with(|docs| match (docs.get(id), field) {
            (Some(_), None) => true,
            (Some(doc), Some(field)) => !doc.get(field).is_null(),
            (None, _) => false,
        }))
    }

    fn set_many(&self, values: PathValues) -> NestdocResult<()> {
        self.documents.write_with(|docs| {
            // validate every path before touching the map
            for path in values.keys() {
                split_path(path)?;
            }
            for (path, value) in values {
                Self::set_path(docs, &path, value)?;
            }
            Ok(())
        })
    }

    fn set_path(docs: &mut BTreeMap<String, Document>, path: &str, value: Value) -> NestdocResult<()> {
        let (id, field) = split_path(path)?;
        match field {
            None => match value {
                Value::Document(mut doc) => {
                    doc.set_id(id);
                    docs.insert(id.to_string(), doc);
                    Ok(())
                }
                other => {
                    log::error!("Cannot store a {} as root document {}", other.type_name(), id);
                    Err(NestdocError::new(
                        &format!("Root document {} must be a document, got {}", id, other.type_name()),
                        ErrorKind::InvalidOperation,
                    ))
                }
            },
            Some(field) => {
                let doc = docs.entry(id.to_string()).or_insert_with(|| {
                    let mut doc = Document::new();
                    doc.set_id(id);
                    doc
                });
                doc.put(field, value)
            }
        }
    }

    fn unset(&self, paths: &[String]) -> NestdocResult<()> {
        self.documents.write_with(|docs| {
            for path in paths {
                let (id, field) = split_path(path)?;
                match field {
                    None => {
                        docs.remove(id);
                    }
                    Some(field) => {
                        if let Some(doc) = docs.get_mut(id) {
                            doc.remove(field);
                        }
                    }
                }
            }
            Ok(())
        })
    }

    fn increment(&self, path: &str, delta: &Value) -> NestdocResult<()> {
        let (id, field) = split_path(path)?;
        let field = match field {
            Some(field) => field,
            None => {
                log::error!("Cannot increment root document {}", id);
                return Err(NestdocError::new(
                    &format!("Cannot increment the whole document {}", id),
                    ErrorKind::InvalidOperation,
                ));
            }
        };

        self.documents.write_with(|docs| {
            let doc = match docs.get_mut(id) {
                Some(doc) => doc,
                None => return Err(not_found(path)),
            };
            let current = doc.get(field);
            let updated = add_numbers(&current, delta).ok_or_else(|| {
                log::error!("Cannot increment {} holding {:?} by {:?}", path, current, delta);
                NestdocError::new(
                    &format!(
                        "Cannot increment {} holding a {} by {}",
                        path,
                        current.type_name(),
                        delta.type_name()
                    ),
                    ErrorKind::InvalidOperation,
                )
            })?;
            doc.put(field, updated)
        })
    }

    fn create_many(&self, documents: Vec<Document>) -> NestdocResult<Vec<Document>> {
        self.documents.write_with(|docs| {
            let mut prepared = Vec::with_capacity(documents.len());
            let mut seen = HashSet::new();
            for mut doc in documents {
                let id = match doc.id() {
                    Some(id) => id,
                    None => {
                        let id = new_document_id();
                        doc.set_id(&id);
                        id
                    }
                };
                validate_id(&id)?;

                if docs.contains_key(&id) || !seen.insert(id.clone()) {
                    log::error!("Document {} already exists", id);
                    return Err(NestdocError::new(
                        &format!("Document {} already exists", id),
                        ErrorKind::Conflict,
                    ));
                }
                prepared.push((id, doc));
            }

            let mut created = Vec::with_capacity(prepared.len());
            for (id, doc) in prepared {
                docs.insert(id, doc.clone());
                created.push(doc);
            }
            Ok(created)
        })
    }
}

fn split_path(path: &str) -> NestdocResult<(&str, Option<&str>)> {
    let (id, field) = match path.split_once(FIELD_SEPARATOR) {
        Some((id, field)) => (id, Some(field)),
        None => (path, None),
    };

    if id.is_empty() || field.map(|f| f.is_empty()).unwrap_or(false) {
        log::error!("Invalid repository path '{}'", path);
        return Err(NestdocError::new(
            &format!("Invalid repository path '{}'", path),
            ErrorKind::InvalidOperation,
        ));
    }
    Ok((id, field))
}

fn not_found(path: &str) -> NestdocError {
    log::error!("Nothing stored at {}", path);
    NestdocError::new(&format!("Nothing stored at {}", path), ErrorKind::NotFound)
}

fn add_numbers(current: &Value, delta: &Value) -> Option<Value> {
    match (current, delta) {
        (Value::Null, Value::I64(d)) => Some(Value::I64(*d)),
        (Value::Null, Value::F64(d)) => Some(Value::F64(*d)),
        (Value::I64(c), Value::I64(d)) => c.checked_add(*d).map(Value::I64),
        (Value::I64(_) | Value::F64(_), Value::I64(_) | Value::F64(_)) => {
            Some(Value::F64(current.as_number()? + delta.as_number()?))
        }
        _ => None,
    }
}
