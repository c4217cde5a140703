use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::hooks::{CallbackInvoker, Callbacks, EventNotifier, Events};
use crate::path::{NestingDepth, TypePath};
use crate::service::config::ServiceConfigInner;
use crate::service::{DocumentService, RefreshFn, ServiceConfig};
use crate::store::{Repository, RepositoryProvider, VolatileRepository};
use crate::validation::{Validator, ValidatorProvider};
use std::sync::Arc;

/// Fluent builder of a [DocumentService] addressed by `N` parent ids.
///
/// The first failing step is remembered and reported by [Self::build].
///
/// # Examples
///
/// ```rust,ignore
/// let comments: SubSubDocumentService = DocumentService::builder("project")
///     .nested("tasks", "task")
///     .nested("comments", "comment")
///     .repository(MemoryRepository::new())
///     .validator(schema_validator)
///     .callbacks(callback_registry.clone())
///     .events(event_dispatcher.clone())
///     .build()?;
/// ```
pub struct DocumentServiceBuilder<const N: usize> {
    error: Option<NestdocError>,
    type_path: Option<TypePath>,
    repository: Option<Repository>,
    validator: Option<Validator>,
    callbacks: Option<Callbacks>,
    events: Option<Events>,
    refresher: Option<Arc<dyn RefreshFn>>,
    clean_data: bool,
    max_bulk_items: Option<usize>,
}

impl<const N: usize> DocumentServiceBuilder<N> {
    /// Starts a builder whose root type is `type_name`.
    pub fn new(type_name: &str) -> Self {
        let (type_path, error) = match TypePath::new(type_name) {
            Ok(type_path) => (Some(type_path), None),
            Err(e) => (None, Some(e)),
        };

        DocumentServiceBuilder {
            error,
            type_path,
            repository: None,
            validator: None,
            callbacks: None,
            events: None,
            refresher: None,
            clean_data: true,
            max_bulk_items: None,
        }
    }

    /// Adds a nesting level stored under `collection_field` of the previous
    /// level.
    pub fn nested(mut self, collection_field: &str, type_name: &str) -> Self {
        if self.error.is_none() {
            if let Some(type_path) = self.type_path.take() {
                match type_path.nested(collection_field, type_name) {
                    Ok(type_path) => self.type_path = Some(type_path),
                    Err(e) => self.error = Some(e),
                }
            }
        }
        self
    }

    pub fn repository<T: RepositoryProvider + 'static>(mut self, repository: T) -> Self {
        self.repository = Some(Repository::new(repository));
        self
    }

    pub fn validator<T: ValidatorProvider + 'static>(mut self, validator: T) -> Self {
        self.validator = Some(Validator::new(validator));
        self
    }

    pub fn callbacks<T: CallbackInvoker + 'static>(mut self, callbacks: T) -> Self {
        self.callbacks = Some(Callbacks::new(callbacks));
        self
    }

    pub fn events<T: EventNotifier + 'static>(mut self, events: T) -> Self {
        self.events = Some(Events::new(events));
        self
    }

    /// Computed-field hook run after validation on create and update.
    pub fn refresher(mut self, refresher: impl RefreshFn + 'static) -> Self {
        self.refresher = Some(Arc::new(refresher));
        self
    }

    /// Default of the `clean_data` option, `true` unless changed.
    pub fn clean_data(mut self, clean_data: bool) -> Self {
        self.clean_data = clean_data;
        self
    }

    pub fn max_bulk_items(mut self, max_bulk_items: usize) -> Self {
        self.max_bulk_items = Some(max_bulk_items);
        self
    }

    pub fn build(self) -> NestdocResult<DocumentService<N>> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let depth = NestingDepth::from_parent_count(N)?;
        let type_path = match self.type_path {
            Some(type_path) => type_path,
            None => {
                log::error!("Document service built without a type");
                return Err(NestdocError::new(
                    "Document service needs a type name",
                    ErrorKind::InvalidOperation,
                ));
            }
        };

        if type_path.depth() != depth.level_count() {
            log::error!(
                "Type {} has {} levels but the service takes {} parent ids",
                type_path,
                type_path.depth(),
                N
            );
            return Err(NestdocError::new(
                &format!(
                    "Type {} declares {} levels, a service with {} parent ids needs {}",
                    type_path,
                    type_path.depth(),
                    N,
                    depth.level_count()
                ),
                ErrorKind::InvalidOperation,
            ));
        }

        let repository = self.repository.unwrap_or_else(|| {
            log::debug!("No repository configured for {}, using a volatile one", type_path);
            Repository::new(VolatileRepository)
        });

        let config = ServiceConfig::new(ServiceConfigInner {
            type_path,
            repository,
            validator: self.validator.unwrap_or_default(),
            callbacks: self.callbacks.unwrap_or_default(),
            events: self.events.unwrap_or_default(),
            refresher: self.refresher,
            clean_data: self.clean_data,
            max_bulk_items: self.max_bulk_items,
        });
        Ok(DocumentService::new(config))
    }
}
