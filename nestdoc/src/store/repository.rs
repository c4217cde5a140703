use crate::collection::Document;
use crate::common::Value;
use crate::errors::NestdocResult;
use crate::query::{Criteria, FieldSelector, SortSpec};
use indexmap::IndexMap;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// Path to value map written by [RepositoryProvider::set_many].
pub type PathValues = IndexMap<String, Value>;

/// Storage backend of a document service.
///
/// Every single call must be atomic. The engine never spans a transaction
/// over several calls.
pub trait RepositoryProvider: Send + Sync {
    /// Reads the value at `path`; fails with `NotFound` when nothing is
    /// stored there.
    fn get(&self, path: &str) -> NestdocResult<Value>;

    /// Writes `value` at `path`, creating intermediate documents.
    fn set(&self, path: &str, value: Value) -> NestdocResult<()>;

    /// Writes several paths at once.
    fn set_many(&self, values: PathValues) -> NestdocResult<()>;

    /// Removes the values at `paths`; missing paths are ignored.
    fn unset(&self, paths: &[String]) -> NestdocResult<()>;

    /// Adds the numeric `delta` to the value at `path`, a missing value
    /// counting as zero.
    fn increment(&self, path: &str, delta: &Value) -> NestdocResult<()>;

    fn has(&self, path: &str) -> NestdocResult<bool>;

    /// Returns the root documents matching `criteria`, sorted, then projected
    /// and paginated.
    fn find(
        &self,
        criteria: &Criteria,
        fields: &FieldSelector,
        limit: Option<i64>,
        offset: i64,
        sorts: &SortSpec,
    ) -> NestdocResult<Vec<Document>>;

    fn count(&self, criteria: &Criteria) -> NestdocResult<usize>;

    /// Removes the root documents matching `criteria` and returns how many
    /// were removed.
    fn delete_many(&self, criteria: &Criteria) -> NestdocResult<usize>;

    /// Inserts root documents, assigning ids to those without one.
    ///
    /// Fails with `Conflict`, writing nothing, when an id is already taken or
    /// repeated in the batch.
    fn create_many(&self, documents: Vec<Document>) -> NestdocResult<Vec<Document>>;
}

/// Shared handle on a [RepositoryProvider].
#[derive(Clone)]
pub struct Repository {
    inner: Arc<dyn RepositoryProvider>,
}

impl Repository {
    pub fn new<T: RepositoryProvider + 'static>(inner: T) -> Self {
        Repository {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for Repository {
    type Target = Arc<dyn RepositoryProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Debug for Repository {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").finish()
    }
}
