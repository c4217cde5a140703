use crate::collection::Document;
use crate::common::Options;
use crate::errors::NestdocResult;
use dashmap::DashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// What a callback receives and returns.
#[derive(Clone, Debug, PartialEq)]
pub enum Subject {
    /// Raw, unvalidated or written data.
    Data(Document),
    /// A validated or persisted document.
    Document(Document),
    /// The target of a delete, with its previous state when it was fetched.
    Removal { id: String, old: Option<Document> },
}

impl Subject {
    pub fn document(&self) -> Option<&Document> {
        match self {
            Subject::Data(doc) | Subject::Document(doc) => Some(doc),
            Subject::Removal { old, .. } => old.as_ref(),
        }
    }

    /// The carried document; for a removal, the old document if any.
    pub fn into_document(self) -> Option<Document> {
        match self {
            Subject::Data(doc) | Subject::Document(doc) => Some(doc),
            Subject::Removal { old, .. } => old,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Subject::Data(_))
    }
}

pub trait CallbackFn: Send + Sync + Fn(Subject, &Options) -> NestdocResult<Subject> {}

impl<F> CallbackFn for F where F: Send + Sync + Fn(Subject, &Options) -> NestdocResult<Subject> {}

/// Something able to run the callbacks registered under a hook name.
///
/// Implementations must return the subject unchanged when nothing is
/// registered for `name`.
pub trait CallbackInvoker: Send + Sync {
    fn callback(&self, name: &str, subject: Subject, options: &Options) -> NestdocResult<Subject>;
}

/// Shared handle on a [CallbackInvoker].
#[derive(Clone)]
pub struct Callbacks {
    inner: Arc<dyn CallbackInvoker>,
}

impl Callbacks {
    pub fn new<T: CallbackInvoker + 'static>(inner: T) -> Self {
        Callbacks {
            inner: Arc::new(inner),
        }
    }

    pub fn callback(&self, name: &str, subject: Subject, options: &Options) -> NestdocResult<Subject> {
        self.inner.callback(name, subject, options)
    }
}

impl Default for Callbacks {
    fn default() -> Self {
        Callbacks::new(CallbackRegistry::new())
    }
}

impl Debug for Callbacks {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks").finish()
    }
}

/// Callbacks keyed by fully qualified hook name.
///
/// Callbacks registered under one name run in registration order, each
/// receiving the subject returned by the previous one. The first failure
/// stops the chain.
///
/// # Examples
///
/// ```rust,ignore
/// let registry = CallbackRegistry::new();
/// registry.register("project.task.create.validated", |subject, _options| {
///     match subject {
///         Subject::Document(mut doc) => {
///             doc.put("status", "open")?;
///             Ok(Subject::Document(doc))
///         }
///         other => Ok(other),
///     }
/// });
/// ```
#[derive(Clone)]
pub struct CallbackRegistry {
    inner: Arc<CallbackRegistryInner>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        CallbackRegistry {
            inner: Arc::new(CallbackRegistryInner::new()),
        }
    }

    pub fn register(&self, name: &str, callback: impl CallbackFn + 'static) {
        self.inner.register(name, Arc::new(callback));
    }

    /// Removes every callback registered under `name`.
    pub fn unregister(&self, name: &str) {
        self.inner.unregister(name);
    }

    pub fn count(&self, name: &str) -> usize {
        self.inner.count(name)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.callbacks.is_empty()
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        CallbackRegistry::new()
    }
}

impl CallbackInvoker for CallbackRegistry {
    fn callback(&self, name: &str, subject: Subject, options: &Options) -> NestdocResult<Subject> {
        self.inner.callback(name, subject, options)
    }
}

struct CallbackRegistryInner {
    callbacks: DashMap<String, Vec<Arc<dyn CallbackFn>>>,
}

impl CallbackRegistryInner {
    fn new() -> Self {
        CallbackRegistryInner {
            callbacks: DashMap::new(),
        }
    }

    #[inline]
    fn register(&self, name: &str, callback: Arc<dyn CallbackFn>) {
        self.callbacks
            .entry(name.to_string())
            .or_default()
            .push(callback);
    }

    #[inline]
    fn unregister(&self, name: &str) {
        self.callbacks.remove(name);
    }

    #[inline]
    fn count(&self, name: &str) -> usize {
        self.callbacks.get(name).map(|c| c.len()).unwrap_or(0)
    }

    fn callback(&self, name: &str, subject: Subject, options: &Options) -> NestdocResult<Subject> {
        // clone the chain so callbacks may register further callbacks
        let chain = match self.callbacks.get(name) {
            Some(chain) => chain.clone(),
            None => return Ok(subject),
        };

        let mut current = subject;
        for callback in chain.iter() {
            current = callback(current, options)?;
        }
        Ok(current)
    }
}
