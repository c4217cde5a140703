use nestdoc::collection::Document;
use nestdoc::common::{atomic, Atomic, Options, ReadExecutor, Value, WriteExecutor};
use nestdoc::errors::{ErrorKind, NestdocError, NestdocResult};
use nestdoc::hooks::{CallbackInvoker, EventNotifier, LifecycleEvent, Subject};
use nestdoc::query::{Criteria, FieldSelector, SortSpec};
use nestdoc::service::{
    DocumentService, RootDocumentService, SubDocumentService, SubSubDocumentService,
};
use nestdoc::store::{MemoryRepository, PathValues, RepositoryProvider};
use nestdoc::validation::{FieldRule, FieldType, Schema, SchemaValidator};
use std::backtrace::Backtrace;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Runs a test between a setup and a teardown step.
///
/// The teardown runs whether the test failed or not. Failures and panics are
/// reported with their timing and a backtrace, then re-raised as a panic.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> NestdocResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> NestdocResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> NestdocResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();

    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        match before() {
            Ok(ctx) => match test(ctx.clone()) {
                Ok(_) => match after(ctx) {
                    Ok(_) => Ok(()),
                    Err(e) => Err((format!("After run failed: {:?}", e), backtrace.to_string())),
                },
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            },
            Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        }
    });

    let elapsed = start_time.elapsed();
    let (error, backtrace) = match result {
        Ok(Ok(_)) => return,
        Ok(Err((e, bt))) => (e, bt),
        Err(panic_err) => {
            let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", panic_err.type_id())
            };
            (format!("Panic: {}", err_msg), Backtrace::capture().to_string())
        }
    };

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {:?}", elapsed);
    eprintln!("Error: {}", error);
    if !backtrace.is_empty() && !backtrace.contains("disabled") {
        eprintln!("\nBacktrace:\n{}", backtrace);
    }
    eprintln!("=====================================================\n");

    panic!("{}", error);
}

/// Collaborators shared by the services of one test.
#[derive(Clone)]
pub struct TestContext {
    repository: CountingRepository,
    hooks: RecordingHooks,
    validator: SchemaValidator,
}

impl TestContext {
    pub fn new(repository: CountingRepository, hooks: RecordingHooks, validator: SchemaValidator) -> Self {
        Self {
            repository,
            hooks,
            validator,
        }
    }

    pub fn repository(&self) -> CountingRepository {
        self.repository.clone()
    }

    pub fn hooks(&self) -> RecordingHooks {
        self.hooks.clone()
    }

    pub fn validator(&self) -> SchemaValidator {
        self.validator.clone()
    }

    /// Service over `project` documents.
    pub fn projects(&self) -> NestdocResult<RootDocumentService> {
        DocumentService::builder("project")
            .repository(self.repository())
            .validator(self.validator())
            .callbacks(self.hooks())
            .events(self.hooks())
            .build()
    }

    /// Service over `task` documents stored under `project.tasks`.
    pub fn tasks(&self) -> NestdocResult<SubDocumentService> {
        DocumentService::builder("project")
            .nested("tasks", "task")
            .repository(self.repository())
            .validator(self.validator())
            .callbacks(self.hooks())
            .events(self.hooks())
            .build()
    }

    /// Service over `comment` documents stored under `project.tasks.comments`.
    pub fn comments(&self) -> NestdocResult<SubSubDocumentService> {
        DocumentService::builder("project")
            .nested("tasks", "task")
            .nested("comments", "comment")
            .repository(self.repository())
            .validator(self.validator())
            .callbacks(self.hooks())
            .events(self.hooks())
            .build()
    }
}

/// Schemas of the `project`, `project.task` and `project.task.comment`
/// types used across the integration tests.
pub fn test_validator() -> SchemaValidator {
    let validator = SchemaValidator::new();
    validator.register(
        "project",
        Schema::new()
            .field(FieldRule::new("name", FieldType::String).required())
            .field(FieldRule::new("stars", FieldType::Int).default_value(0))
            .field(FieldRule::new("owner", FieldType::Document)),
    );
    validator.register(
        "project.task",
        Schema::new()
            .field(FieldRule::new("title", FieldType::String).required())
            .field(FieldRule::new("done", FieldType::Bool).default_value(false))
            .field(FieldRule::new("rank", FieldType::Int))
            .field(FieldRule::new("age", FieldType::Any))
            .field(FieldRule::new("tags", FieldType::Array)),
    );
    validator.register(
        "project.task.comment",
        Schema::new()
            .field(FieldRule::new("body", FieldType::String).required())
            .field(FieldRule::new("likes", FieldType::Int).default_value(0)),
    );
    validator
}

pub fn create_test_context() -> NestdocResult<TestContext> {
    Ok(TestContext::new(
        CountingRepository::new(),
        RecordingHooks::new(),
        test_validator(),
    ))
}

pub fn cleanup(ctx: TestContext) -> NestdocResult<()> {
    let removed = ctx.projects()?.purge([], &Criteria::new())?;
    log::debug!("Removed {} projects after test", removed);
    ctx.hooks().clear();
    Ok(())
}

pub fn random_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Seeds a project and returns its id.
pub fn seed_project(ctx: &TestContext) -> NestdocResult<String> {
    let id = random_id();
    let mut data = Document::new();
    data.put("id", id.as_str())?;
    data.put("name", format!("project {}", id))?;
    ctx.projects()?.create([], data, &Options::new())?;
    ctx.hooks().clear();
    ctx.repository().reset_gets();
    Ok(id)
}

/// What a [RecordingHooks] saw, in order.
#[derive(Clone, Debug)]
pub enum HookRecord {
    /// A callback stage ran, with whether it received raw data.
    Callback { name: String, data: bool },
    /// An observed event was dispatched.
    Event(LifecycleEvent),
}

impl HookRecord {
    /// `name` for callbacks, `event:name` for events.
    pub fn label(&self) -> String {
        match self {
            HookRecord::Callback { name, .. } => name.clone(),
            HookRecord::Event(event) => format!("event:{}", event.name()),
        }
    }
}

/// Callback invoker and event notifier recording everything it is asked
/// to do.
///
/// Callbacks pass their subject through, optionally after a registered
/// transform. Events count as observed only for names passed to
/// [RecordingHooks::observe].
#[derive(Clone)]
pub struct RecordingHooks {
    inner: Arc<RecordingHooksInner>,
}

struct RecordingHooksInner {
    records: Atomic<Vec<HookRecord>>,
    observed: Atomic<HashSet<String>>,
    rejected: Atomic<HashSet<String>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        RecordingHooks {
            inner: Arc::new(RecordingHooksInner {
                records: atomic(Vec::new()),
                observed: atomic(HashSet::new()),
                rejected: atomic(HashSet::new()),
            }),
        }
    }

    /// Marks the event `name` as having a listener.
    pub fn observe(&self, name: &str) {
        self.inner.observed.write_with(|observed| observed.insert(name.to_string()));
    }

    /// Makes the callback `name` fail with a conflict.
    pub fn reject(&self, name: &str) {
        self.inner.rejected.write_with(|rejected| rejected.insert(name.to_string()));
    }

    pub fn records(&self) -> Vec<HookRecord> {
        self.inner.records.read_with(|records| records.clone())
    }

    /// Labels of every record, see [HookRecord::label].
    pub fn labels(&self) -> Vec<String> {
        self.records().iter().map(|record| record.label()).collect()
    }

    /// Dispatched events named `name`.
    pub fn events(&self, name: &str) -> Vec<LifecycleEvent> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                HookRecord::Event(event) if event.name() == name => Some(event),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.inner.records.write_with(|records| records.clear());
    }
}

impl Default for RecordingHooks {
    fn default() -> Self {
        RecordingHooks::new()
    }
}

impl CallbackInvoker for RecordingHooks {
    fn callback(&self, name: &str, subject: Subject, _options: &Options) -> NestdocResult<Subject> {
        let record = HookRecord::Callback {
            name: name.to_string(),
            data: subject.is_data(),
        };
        self.inner.records.write_with(|records| records.push(record));

        if self.inner.rejected.read_with(|rejected| rejected.contains(name)) {
            return Err(NestdocError::new(
                &format!("Rejected by {}", name),
                ErrorKind::Conflict,
            ));
        }
        Ok(subject)
    }
}

impl EventNotifier for RecordingHooks {
    fn dispatch(&self, _name: &str, event: LifecycleEvent) -> NestdocResult<()> {
        self.inner
            .records
            .write_with(|records| records.push(HookRecord::Event(event)));
        Ok(())
    }

    fn is_observed(&self, name: &str) -> bool {
        self.inner.observed.read_with(|observed| observed.contains(name))
    }
}

/// [MemoryRepository] counting how often values are read.
#[derive(Clone)]
pub struct CountingRepository {
    repository: MemoryRepository,
    gets: Arc<AtomicUsize>,
}

impl CountingRepository {
    pub fn new() -> Self {
        CountingRepository {
            repository: MemoryRepository::new(),
            gets: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `get` calls since creation or the last reset.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn reset_gets(&self) {
        self.gets.store(0, Ordering::SeqCst);
    }

    pub fn memory(&self) -> &MemoryRepository {
        &self.repository
    }
}

impl Default for CountingRepository {
    fn default() -> Self {
        CountingRepository::new()
    }
}

impl RepositoryProvider for CountingRepository {
    fn get(&self, path: &str) -> NestdocResult<Value> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.repository.get(path)
    }

    fn set(&self, path: &str, value: Value) -> NestdocResult<()> {
        self.repository.set(path, value)
    }

    fn set_many(&self, values: PathValues) -> NestdocResult<()> {
        self.repository.set_many(values)
    }

    fn unset(&self, paths: &[String]) -> NestdocResult<()> {
        self.repository.unset(paths)
    }

    fn increment(&self, path: &str, delta: &Value) -> NestdocResult<()> {
        self.repository.increment(path, delta)
    }

    fn has(&self, path: &str) -> NestdocResult<bool> {
        self.repository.has(path)
    }

    fn find(
        &self,
        criteria: &Criteria,
        fields: &FieldSelector,
        limit: Option<i64>,
        offset: i64,
        sorts: &SortSpec,
    ) -> NestdocResult<Vec<Document>> {
        self.repository.find(criteria, fields, limit, offset, sorts)
    }

    fn count(&self, criteria: &Criteria) -> NestdocResult<usize> {
        self.repository.count(criteria)
    }

    fn delete_many(&self, criteria: &Criteria) -> NestdocResult<usize> {
        self.repository.delete_many(criteria)
    }

    fn create_many(&self, documents: Vec<Document>) -> NestdocResult<Vec<Document>> {
        self.repository.create_many(documents)
    }
}
