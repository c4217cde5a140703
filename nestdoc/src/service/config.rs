use crate::collection::Document;
use crate::common::Options;
use crate::errors::NestdocResult;
use crate::hooks::{Callbacks, Events};
use crate::path::TypePath;
use crate::store::Repository;
use crate::validation::Validator;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Recomputes derived fields of a document between validation and save.
pub trait RefreshFn: Send + Sync + Fn(Document, &Options) -> NestdocResult<Document> {}

impl<F> RefreshFn for F where F: Send + Sync + Fn(Document, &Options) -> NestdocResult<Document> {}

/// Immutable configuration of one document service.
///
/// Built by [crate::service::DocumentServiceBuilder]; cloning is cheap.
#[derive(Clone)]
pub struct ServiceConfig {
    inner: Arc<ServiceConfigInner>,
}

pub(crate) struct ServiceConfigInner {
    pub(crate) type_path: TypePath,
    pub(crate) repository: Repository,
    pub(crate) validator: Validator,
    pub(crate) callbacks: Callbacks,
    pub(crate) events: Events,
    pub(crate) refresher: Option<Arc<dyn RefreshFn>>,
    pub(crate) clean_data: bool,
    pub(crate) max_bulk_items: Option<usize>,
}

impl ServiceConfig {
    pub(crate) fn new(inner: ServiceConfigInner) -> Self {
        ServiceConfig {
            inner: Arc::new(inner),
        }
    }

    pub fn type_path(&self) -> &TypePath {
        &self.inner.type_path
    }

    pub fn repository(&self) -> &Repository {
        &self.inner.repository
    }

    pub fn validator(&self) -> &Validator {
        &self.inner.validator
    }

    pub fn callbacks(&self) -> &Callbacks {
        &self.inner.callbacks
    }

    pub fn events(&self) -> &Events {
        &self.inner.events
    }

    /// Default of the `clean_data` option.
    pub fn clean_data(&self) -> bool {
        self.inner.clean_data
    }

    /// Largest accepted bulk batch; `None` when unbounded.
    pub fn max_bulk_items(&self) -> Option<usize> {
        self.inner.max_bulk_items
    }

    pub(crate) fn refresh(&self, document: Document, options: &Options) -> NestdocResult<Document> {
        match &self.inner.refresher {
            Some(refresher) => refresher(document, options),
            None => Ok(document),
        }
    }
}

impl Debug for ServiceConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("type_path", &self.inner.type_path.name())
            .field("clean_data", &self.inner.clean_data)
            .field("max_bulk_items", &self.inner.max_bulk_items)
            .field("refresher", &self.inner.refresher.is_some())
            .finish()
    }
}
