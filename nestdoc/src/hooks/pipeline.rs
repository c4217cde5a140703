use crate::collection::Document;
use crate::common::Options;
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::hooks::{Callbacks, EventKind, Events, LifecycleEvent, Operation, Stage, Subject};
use crate::path::TypePath;
use std::sync::Arc;

/// Callbacks and events of one service, named after its type path.
#[derive(Clone)]
pub struct HookPipeline {
    inner: Arc<HookPipelineInner>,
}

struct HookPipelineInner {
    type_path: TypePath,
    callbacks: Callbacks,
    events: Events,
}

impl HookPipeline {
    pub fn new(type_path: TypePath, callbacks: Callbacks, events: Events) -> Self {
        HookPipeline {
            inner: Arc::new(HookPipelineInner {
                type_path,
                callbacks,
                events,
            }),
        }
    }

    pub fn type_path(&self) -> &TypePath {
        &self.inner.type_path
    }

    /// Runs the callbacks of `stage`.
    pub fn run(&self, stage: Stage, subject: Subject, options: &Options) -> NestdocResult<Subject> {
        let name = self.inner.type_path.hook_name(&stage.name());
        log::debug!("Running callback stage {}", name);
        self.inner.callbacks.callback(&name, subject, options)
    }

    /// Runs `stage` on raw data and returns the resulting document.
    pub fn run_data(&self, stage: Stage, data: Document, options: &Options) -> NestdocResult<Document> {
        let subject = self.run(stage, Subject::Data(data), options)?;
        self.expect_document(stage, subject)
    }

    /// Runs `stage` on a document and returns the resulting document.
    pub fn run_document(&self, stage: Stage, document: Document, options: &Options) -> NestdocResult<Document> {
        let subject = self.run(stage, Subject::Document(document), options)?;
        self.expect_document(stage, subject)
    }

    /// Runs a delete stage and returns the old document it carried on.
    pub fn run_removal(
        &self,
        stage: Stage,
        id: &str,
        old: Option<Document>,
        options: &Options,
    ) -> NestdocResult<Option<Document>> {
        let subject = Subject::Removal {
            id: id.to_string(),
            old,
        };
        Ok(self.run(stage, subject, options)?.into_document())
    }

    pub fn is_observed(&self, kind: EventKind) -> bool {
        let name = self.inner.type_path.hook_name(kind.name());
        self.inner.events.is_observed(&name)
    }

    /// Whether an observed event of `operation` asks for the previous state.
    pub fn needs_old(&self, operation: Operation) -> bool {
        EventKind::ALL
            .iter()
            .filter(|kind| kind.operation() == operation && kind.needs_old())
            .any(|kind| self.is_observed(*kind))
    }

    /// Dispatches `kind` when observed.
    ///
    /// `payload` yields the `(document, old)` pair and is only called for an
    /// observed event. Payload and listener failures are logged, never
    /// returned.
    pub fn emit<F>(&self, kind: EventKind, id: &str, payload: F)
    where
        F: FnOnce() -> NestdocResult<(Option<Document>, Option<Document>)>,
    {
        if !self.is_observed(kind) {
            return;
        }

        let name = self.inner.type_path.hook_name(kind.name());
        let (document, old) = match payload() {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Skipping event {} for {}: {}", name, id, e);
                return;
            }
        };

        log::debug!("Dispatching event {} for {}", name, id);
        let event = LifecycleEvent::new(&name, id, document, old);
        if let Err(e) = self.inner.events.dispatch(&name, event) {
            log::warn!("Listener of {} failed for {}: {}", name, id, e);
        }
    }

    fn expect_document(&self, stage: Stage, subject: Subject) -> NestdocResult<Document> {
        match subject.into_document() {
            Some(document) => Ok(document),
            None => {
                let name = self.inner.type_path.hook_name(&stage.name());
                log::error!("Callback {} returned no document", name);
                Err(NestdocError::new(
                    &format!("Callback {} must return a document", name),
                    ErrorKind::InternalError,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
    use crate::doc;
    use crate::hooks::{CallbackRegistry, EventDispatcher, EventListener};

    fn task_path() -> TypePath {
        TypePath::new("project")
            .and_then(|p| p.nested("tasks", "task"))
            .unwrap()
    }

    #[test]
    fn test_run_uses_qualified_names() {
        let callbacks = CallbackRegistry::new();
        callbacks.register("project.task.create.validated", |subject: Subject, _: &Options| {
            let mut doc = subject.into_document().unwrap_or_default();
            doc.put("status", "open")?;
            Ok(Subject::Document(doc))
        });
        let pipeline = HookPipeline::new(task_path(), Callbacks::new(callbacks), Events::default());

        let doc = pipeline
            .run_document(Stage::Validated(Operation::Create), doc! { title: "x" }, &Options::new())
            .unwrap();
        assert_eq!(doc.get("status").as_str(), Some("open"));

        let untouched = pipeline
            .run_document(Stage::Validated(Operation::Update), doc! { title: "x" }, &Options::new())
            .unwrap();
        assert!(!untouched.contains_key("status"));
    }

    #[test]
    fn test_removal_without_document_is_an_error_for_documents() {
        let callbacks = CallbackRegistry::new();
        callbacks.register("project.task.saved", |_: Subject, _: &Options| {
            Ok(Subject::Removal {
                id: "x".to_string(),
                old: None,
            })
        });
        let pipeline = HookPipeline::new(task_path(), Callbacks::new(callbacks), Events::default());
        let err = pipeline
            .run_document(Stage::Saved, doc! {}, &Options::new())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InternalError);
    }

    #[test]
    fn test_emit_skips_payload_when_unobserved() {
        let pipeline = HookPipeline::new(task_path(), Callbacks::default(), Events::default());
        let built: Atomic<bool> = atomic(false);
        pipeline.emit(EventKind::UpdatedFull, "t1", || {
            built.write_with(|b| *b = true);
            Ok((None, None))
        });
        assert!(!built.read_with(|b| *b));
    }

    #[test]
    fn test_emit_observed_event() {
        let events = EventDispatcher::new();
        let seen: Atomic<Vec<String>> = atomic(Vec::new());
        let sink = seen.clone();
        events
            .subscribe(
                "project.task.deleted.withOld",
                EventListener::new(move |event: LifecycleEvent| {
                    let old = event.old().and_then(|d| d.id()).unwrap_or_default();
                    sink.write_with(|s| s.push(format!("{}:{}", event.name(), old)));
                    Ok(())
                }),
            )
            .unwrap();

        let pipeline = HookPipeline::new(task_path(), Callbacks::default(), Events::new(events));
        assert!(pipeline.needs_old(Operation::Delete));
        assert!(!pipeline.needs_old(Operation::Update));

        pipeline.emit(EventKind::DeletedWithOld, "t1", || {
            Ok((None, Some(doc! { id: "t1" })))
        });
        assert_eq!(
            seen.read_with(|s| s.clone()),
            vec!["project.task.deleted.withOld:t1".to_string()]
        );
    }

    #[test]
    fn test_emit_swallows_listener_failures() {
        let events = EventDispatcher::new();
        events
            .subscribe(
                "project.task.created",
                EventListener::new(|_: LifecycleEvent| {
                    Err(NestdocError::new("down", ErrorKind::InternalError))
                }),
            )
            .unwrap();
        let pipeline = HookPipeline::new(task_path(), Callbacks::default(), Events::new(events));
        pipeline.emit(EventKind::Created, "t1", || Ok((Some(doc! { id: "t1" }), None)));
    }
}
