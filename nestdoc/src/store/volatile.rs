use crate::collection::Document;
use crate::common::Value;
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::path::new_document_id;
use crate::query::{Criteria, FieldSelector, SortSpec};
use crate::store::{PathValues, RepositoryProvider};

/// Repository that discards every write and never finds anything.
///
/// Backs services whose documents only live for the duration of an
/// operation: the hook pipeline still runs, nothing is kept.
#[derive(Clone, Copy, Debug, Default)]
pub struct VolatileRepository;

impl VolatileRepository {
    pub fn new() -> Self {
        VolatileRepository
    }
}

impl RepositoryProvider for VolatileRepository {
    fn get(&self, path: &str) -> NestdocResult<Value> {
        log::error!("Volatile repository holds nothing at {}", path);
        Err(NestdocError::new(
            &format!("Nothing stored at {}", path),
            ErrorKind::NotFound,
        ))
    }

    fn set(&self, path: &str, _value: Value) -> NestdocResult<()> {
        log::debug!("Discarding write to {}", path);
        Ok(())
    }

    fn set_many(&self, values: PathValues) -> NestdocResult<()> {
        log::debug!("Discarding {} writes", values.len());
        Ok(())
    }

    fn unset(&self, _paths: &[String]) -> NestdocResult<()> {
        Ok(())
    }

    fn increment(&self, path: &str, _delta: &Value) -> NestdocResult<()> {
        log::debug!("Discarding increment of {}", path);
        Ok(())
    }

    fn has(&self, _path: &str) -> NestdocResult<bool> {
        Ok(false)
    }

    fn find(
        &self,
        _criteria: &Criteria,
        _fields: &FieldSelector,
        _limit: Option<i64>,
        _offset: i64,
        _sorts: &SortSpec,
    ) -> NestdocResult<Vec<Document>> {
        Ok(Vec::new())
    }

    fn count(&self, _criteria: &Criteria) -> NestdocResult<usize> {
        Ok(0)
    }

    fn delete_many(&self, _criteria: &Criteria) -> NestdocResult<usize> {
        Ok(0)
    }

    fn create_many(&self, documents: Vec<Document>) -> NestdocResult<Vec<Document>> {
        Ok(documents
            .into_iter()
            .map(|mut doc| {
                if !doc.has_id() {
                    doc.set_id(&new_document_id());
                }
                doc
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_writes_are_discarded() {
        let repository = VolatileRepository::new();
        repository.set("p1", Value::from(doc! { name: "x" })).unwrap();
        assert!(!repository.has("p1").unwrap());
        assert_eq!(repository.get("p1").unwrap_err().kind(), &ErrorKind::NotFound);
        assert_eq!(repository.count(&Criteria::new()).unwrap(), 0);
        assert!(repository
            .find(&Criteria::new(), &FieldSelector::new(), None, 0, &SortSpec::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_create_many_assigns_ids() {
        let created = VolatileRepository
            .create_many(vec![doc! { name: "x" }, doc! { id: "p2" }])
            .unwrap();
        assert!(created[0].has_id());
        assert_eq!(created[1].id(), Some("p2".to_string()));
    }
}
