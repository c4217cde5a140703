use nestdoc::common::{Options, Value};
use nestdoc::doc;
use nestdoc::errors::ErrorKind;
use nestdoc::query::FieldSelector;
use nestdoc::service::Increments;
use nestdoc::store::RepositoryProvider;
use nestdoc_int_test::test_util::{cleanup, create_test_context, run_test, seed_project, HookRecord};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_create_runs_stages_in_order() {
    run_test(
        || create_test_context(),
        |ctx| {
            let project = seed_project(&ctx)?;
            let hooks = ctx.hooks();
            hooks.observe("project.task.created");
            hooks.observe("project.task.created.full");

            ctx.tasks()?
                .create([&project], doc! { title: "write" }, &Options::new())?;

            assert_eq!(
                hooks.labels(),
                vec![
                    "project.task.create.pre_validate",
                    "project.task.create.validated",
                    "project.task.pre_save",
                    "project.task.create.pre_save",
                    "project.task.create.saved",
                    "project.task.saved",
                    "project.task.created",
                    "event:project.task.created",
                    "event:project.task.created.full",
                ]
            );

            let data_flags: Vec<bool> = hooks
                .records()
                .iter()
                .filter_map(|record| match record {
                    HookRecord::Callback { data, .. } => Some(*data),
                    HookRecord::Event(_) => None,
                })
                .collect();
            assert_eq!(data_flags, vec![true, false, false, false, true, false, false]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_create_order_ignores_optional_listeners() {
    run_test(
        || create_test_context(),
        |ctx| {
            let project = seed_project(&ctx)?;
            let hooks = ctx.hooks();
            hooks.observe("project.task.created");

            ctx.tasks()?
                .create([&project], doc! { title: "write" }, &Options::new())?;

            let labels = hooks.labels();
            assert_eq!(labels.len(), 8);
            assert_eq!(labels[6], "project.task.created");
            assert_eq!(labels[7], "event:project.task.created");
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_unobserved_full_event_never_refetches() {
    run_test(
        || create_test_context(),
        |ctx| {
            let project = seed_project(&ctx)?;
            let tasks = ctx.tasks()?;
            let repository = ctx.repository();
            tasks.create([&project], doc! { id: "t1", title: "write" }, &Options::new())?;

            repository.reset_gets();
            tasks.update([&project], "t1", doc! { done: true }, &Options::new())?;
            assert_eq!(repository.gets(), 0);
            assert!(ctx.hooks().events("project.task.updated.full").is_empty());

            ctx.hooks().observe("project.task.updated.full");
            repository.reset_gets();
            tasks.update([&project], "t1", doc! { rank: 3 }, &Options::new())?;
            assert_eq!(repository.gets(), 1);

            let events = ctx.hooks().events("project.task.updated.full");
            assert_eq!(events.len(), 1);
            let full = events[0].document().cloned().unwrap_or_default();
            assert_eq!(full.get("title").as_str(), Some("write"));
            assert_eq!(full.get("done").as_bool(), Some(&true));
            assert_eq!(full.get("rank").as_i64(), Some(&3));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_update_fetches_old_only_when_observed() {
    run_test(
        || create_test_context(),
        |ctx| {
            let project = seed_project(&ctx)?;
            let tasks = ctx.tasks()?;
            tasks.create([&project], doc! { id: "t1", title: "draft" }, &Options::new())?;

            ctx.hooks().observe("project.task.updated_old");
            ctx.repository().reset_gets();
            tasks.update([&project], "t1", doc! { title: "final" }, &Options::new())?;
            assert_eq!(ctx.repository().gets(), 1);

            let events = ctx.hooks().events("project.task.updated_old");
            assert_eq!(events.len(), 1);
            assert_eq!(
                events[0].old().map(|old| old.get("title")),
                Some(Value::from("draft"))
            );
            assert_eq!(
                events[0].document().map(|doc| doc.get("title")),
                Some(Value::from("final"))
            );
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_create_or_update_creates_once_then_updates() {
    run_test(
        || create_test_context(),
        |ctx| {
            let project = seed_project(&ctx)?;
            let tasks = ctx.tasks()?;
            let hooks = ctx.hooks();

            let payload = doc! { id: "t1", title: "same", rank: 2 };
            tasks.create_or_update([&project], payload.clone(), &Options::new())?;
            tasks.create_or_update([&project], payload.clone(), &Options::new())?;

            let labels = hooks.labels();
            let count = |name: &str| labels.iter().filter(|label| label.as_str() == name).count();
            assert_eq!(count("project.task.create.pre_validate"), 1);
            assert_eq!(count("project.task.update.pre_validate"), 1);

            tasks.create([&project], doc! { id: "t2", title: "same", rank: 2 }, &Options::new())?;
            tasks.update([&project], "t2", doc! { title: "same", rank: 2 }, &Options::new())?;

            let upserted = tasks.get([&project], "t1", &FieldSelector::new())?;
            let direct = tasks.get([&project], "t2", &FieldSelector::new())?;
            assert_eq!(upserted.without_id(), direct.without_id());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_validation_failure_stops_before_persistence() {
    run_test(
        || create_test_context(),
        |ctx| {
            let project = seed_project(&ctx)?;
            let tasks = ctx.tasks()?;

            let err = tasks
                .create([&project], doc! { id: "t1", done: "yes" }, &Options::new())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ValidationFailed);
            assert_eq!(err.status_code(), 412);
            let errors = err.validation_errors().unwrap();
            assert!(errors.field("title").is_some());
            assert!(errors.field("done").is_some());

            assert_eq!(ctx.hooks().labels(), vec!["project.task.create.pre_validate"]);
            assert!(!tasks.has([&project], "t1")?);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_rejecting_callback_aborts_create() {
    run_test(
        || create_test_context(),
        |ctx| {
            let project = seed_project(&ctx)?;
            let tasks = ctx.tasks()?;
            ctx.hooks().reject("project.task.create.pre_save");

            let err = tasks
                .create([&project], doc! { id: "t1", title: "blocked" }, &Options::new())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::Conflict);
            assert!(!tasks.has([&project], "t1")?);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_clean_data_option() {
    run_test(
        || create_test_context(),
        |ctx| {
            let project = seed_project(&ctx)?;
            let tasks = ctx.tasks()?;

            let created = tasks.create(
                [&project],
                doc! { title: "a", color: "red" },
                &Options::new(),
            )?;
            assert!(!created.contains_key("color"));

            let strict = Options::new().with("clean_data", false)?;
            let err = tasks
                .create([&project], doc! { title: "b", color: "red" }, &strict)
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ValidationFailed);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_delete_lifecycle() {
    run_test(
        || create_test_context(),
        |ctx| {
            let project = seed_project(&ctx)?;
            let tasks = ctx.tasks()?;
            tasks.create([&project], doc! { id: "t1", title: "gone soon" }, &Options::new())?;

            let hooks = ctx.hooks();
            hooks.clear();
            hooks.observe("project.task.deleted");
            hooks.observe("project.task.deleted_old");

            tasks.delete([&project], "t1", &Options::new())?;
            assert_eq!(
                hooks.labels(),
                vec![
                    "project.task.delete.pre_save",
                    "project.task.delete.saved",
                    "project.task.deleted",
                    "event:project.task.deleted",
                    "event:project.task.deleted_old",
                ]
            );
            let old = hooks.events("project.task.deleted_old")[0].old().cloned();
            assert_eq!(old.map(|old| old.get("title")), Some(Value::from("gone soon")));

            let err = tasks.delete([&project], "t1", &Options::new()).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::NotFound);
            assert_eq!(err.status_code(), 404);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_increment_then_decrement_restores_value() {
    run_test(
        || create_test_context(),
        |ctx| {
            let project = seed_project(&ctx)?;
            let projects = ctx.projects()?;
            let before = projects.get([], &project, &FieldSelector::new())?.get("stars");

            projects.increment_field([], &project, "stars", 7)?;
            assert_eq!(
                projects.get([], &project, &FieldSelector::new())?.get("stars").as_i64(),
                Some(&7)
            );
            projects.decrement_field([], &project, "stars", 7)?;
            assert_eq!(projects.get([], &project, &FieldSelector::new())?.get("stars"), before);

            let tasks = ctx.tasks()?;
            tasks.create([&project], doc! { id: "t1", title: "count", rank: 1 }, &Options::new())?;
            let mut increments = Increments::new();
            increments.insert("rank".to_string(), Value::from(4));
            tasks.increment([&project], "t1", &increments)?;
            tasks.decrement([&project], "t1", &increments)?;
            assert_eq!(
                tasks.get([&project], "t1", &FieldSelector::new())?.get("rank").as_i64(),
                Some(&1)
            );
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_depth_three_reads_where_it_writes() {
    run_test(
        || create_test_context(),
        |ctx| {
            let project = seed_project(&ctx)?;
            ctx.tasks()?
                .create([&project], doc! { id: "t1", title: "discuss" }, &Options::new())?;
            let comments = ctx.comments()?;

            comments.create([&project, "t1"], doc! { id: "c1", body: "first" }, &Options::new())?;
            let path = format!("{}.tasks.t1.comments.c1", project);
            let memory = ctx.repository();

            let stored = memory.memory().get(&path)?;
            let read = comments.get([&project, "t1"], "c1", &FieldSelector::new())?;
            assert_eq!(stored, Value::Document(read.clone()));
            assert_eq!(read.get("likes").as_i64(), Some(&0));

            comments.update([&project, "t1"], "c1", doc! { likes: 2 }, &Options::new())?;
            assert_eq!(memory.memory().get(&format!("{}.likes", path))?, Value::from(2));

            comments.delete([&project, "t1"], "c1", &Options::new())?;
            assert!(!memory.memory().has(&path)?);
            assert!(comments.has_not([&project, "t1"], "c1")?);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_nested_create_requires_parent() {
    run_test(
        || create_test_context(),
        |ctx| {
            let project = seed_project(&ctx)?;
            let err = ctx
                .comments()?
                .create([&project, "missing"], doc! { body: "orphan" }, &Options::new())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::NotFound);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
