use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::path::NestingDepth;
use crate::service::{RootDocumentService, SubDocumentService, SubSubDocumentService};
use std::collections::HashMap;
use std::sync::Arc;

/// A registered service, typed by how deep its documents sit.
#[derive(Clone, Debug)]
pub enum ServiceHandle {
    Document(RootDocumentService),
    SubDocument(SubDocumentService),
    SubSubDocument(SubSubDocumentService),
}

impl ServiceHandle {
    /// Dotted type name of the service, e.g. `project.task`.
    pub fn name(&self) -> String {
        match self {
            ServiceHandle::Document(service) => service.type_path().name(),
            ServiceHandle::SubDocument(service) => service.type_path().name(),
            ServiceHandle::SubSubDocument(service) => service.type_path().name(),
        }
    }

    pub fn depth(&self) -> NestingDepth {
        match self {
            ServiceHandle::Document(_) => NestingDepth::Document,
            ServiceHandle::SubDocument(_) => NestingDepth::SubDocument,
            ServiceHandle::SubSubDocument(_) => NestingDepth::SubSubDocument,
        }
    }
}

impl From<RootDocumentService> for ServiceHandle {
    fn from(service: RootDocumentService) -> Self {
        ServiceHandle::Document(service)
    }
}

impl From<SubDocumentService> for ServiceHandle {
    fn from(service: SubDocumentService) -> Self {
        ServiceHandle::SubDocument(service)
    }
}

impl From<SubSubDocumentService> for ServiceHandle {
    fn from(service: SubSubDocumentService) -> Self {
        ServiceHandle::SubSubDocument(service)
    }
}

/// Lookup table from dotted type names to services.
///
/// Populated once at startup; lookups hand out cheap clones.
///
/// # Examples
///
/// ```rust,ignore
/// let registry = ServiceRegistry::new();
/// registry.register(projects)?;
/// registry.register(tasks)?;
///
/// let tasks = registry.sub_document("project.task")?;
/// tasks.delete(["p1"], "t1", &Options::new())?;
/// ```
#[derive(Clone)]
pub struct ServiceRegistry {
    inner: Arc<ServiceRegistryInner>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        ServiceRegistry {
            inner: Arc::new(ServiceRegistryInner::new()),
        }
    }

    /// Registers `service` under its type name; fails with `Conflict` when
    /// the name is taken.
    pub fn register<S: Into<ServiceHandle>>(&self, service: S) -> NestdocResult<()> {
        self.inner.register(service.into())
    }

    pub fn get(&self, name: &str) -> NestdocResult<ServiceHandle> {
        self.inner.get(name)
    }

    pub fn document(&self, name: &str) -> NestdocResult<RootDocumentService> {
        match self.get(name)? {
            ServiceHandle::Document(service) => Ok(service),
            other => Err(wrong_depth(name, NestingDepth::Document, other.depth())),
        }
    }

    pub fn sub_document(&self, name: &str) -> NestdocResult<SubDocumentService> {
        match self.get(name)? {
            ServiceHandle::SubDocument(service) => Ok(service),
            other => Err(wrong_depth(name, NestingDepth::SubDocument, other.depth())),
        }
    }

    pub fn sub_sub_document(&self, name: &str) -> NestdocResult<SubSubDocumentService> {
        match self.get(name)? {
            ServiceHandle::SubSubDocument(service) => Ok(service),
            other => Err(wrong_depth(name, NestingDepth::SubSubDocument, other.depth())),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.services.read_with(|services| services.contains_key(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .services
            .read_with(|services| services.keys().cloned().collect());
        names.sort();
        names
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        ServiceRegistry::new()
    }
}

struct ServiceRegistryInner {
    services: Atomic<HashMap<String, ServiceHandle>>,
}

impl ServiceRegistryInner {
    fn new() -> Self {
        ServiceRegistryInner {
            services: atomic(HashMap::new()),
        }
    }

    fn register(&self, handle: ServiceHandle) -> NestdocResult<()> {
        let name = handle.name();
        self.services.write_with(|services| {
            if services.contains_key(&name) {
                log::error!("A service for {} is already registered", name);
                return Err(NestdocError::new(
                    &format!("A service for {} is already registered", name),
                    ErrorKind::Conflict,
                ));
            }
            log::debug!("Registering service {}", name);
            services.insert(name, handle);
            Ok(())
        })
    }

    fn get(&self, name: &str) -> NestdocResult<ServiceHandle> {
        match self.services.read_with(|services| services.get(name).cloned()) {
            Some(handle) => Ok(handle),
            None => {
                log::error!("No service registered for {}", name);
                Err(NestdocError::new(
                    &format!("No service registered for {}", name),
                    ErrorKind::NotFound,
                ))
            }
        }
    }
}

fn wrong_depth(name: &str, expected: NestingDepth, actual: NestingDepth) -> NestdocError {
    log::error!("Service {} is a {:?} service, not a {:?} one", name, actual, expected);
    NestdocError::new(
        &format!("Service {} does not serve {:?} documents", name, expected),
        ErrorKind::InvalidOperation,
    )
}
