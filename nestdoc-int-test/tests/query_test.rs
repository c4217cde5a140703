use nestdoc::collection::Document;
use nestdoc::common::Options;
use nestdoc::doc;
use nestdoc::errors::ErrorKind;
use nestdoc::query::{
    filter_by, limit_to, order_by, skip_by, Criteria, FieldSelector, FindOptions, SortOrder,
    SortSpec,
};
use nestdoc::service::SubDocumentService;
use nestdoc_int_test::test_util::{cleanup, create_test_context, run_test, seed_project, TestContext};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn ids(documents: &[Document]) -> Vec<String> {
    documents.iter().filter_map(|document| document.id()).collect()
}

/// Seeds five tasks `a` to `e` and returns the project id with the service.
fn seed_tasks(ctx: &TestContext) -> nestdoc::errors::NestdocResult<(String, SubDocumentService)> {
    let project = seed_project(ctx)?;
    let tasks = ctx.tasks()?;
    let options = Options::new();
    tasks.create([&project], doc! { id: "a", title: "alpha", rank: 9, age: 5, tags: ["x"] }, &options)?;
    tasks.create([&project], doc! { id: "b", title: "bravo", rank: 10, age: "5" }, &options)?;
    tasks.create([&project], doc! { id: "c", title: "charlie", rank: 2, age: 6, done: true }, &options)?;
    tasks.create([&project], doc! { id: "d", title: "delta", rank: 2, age: "" }, &options)?;
    tasks.create([&project], doc! { id: "e", title: "echo", rank: 7 }, &options)?;
    Ok((project, tasks))
}

#[test]
fn test_typed_criteria_cast_both_sides() {
    run_test(
        || create_test_context(),
        |ctx| {
            let (project, tasks) = seed_tasks(&ctx)?;

            let typed = Criteria::from_document(&doc! { "age:int": "5" })?;
            let found = tasks.find([&project], &filter_by(typed))?;
            assert_eq!(ids(&found), vec!["a", "b"]);

            let strict = Criteria::new().with("age", "5")?;
            let found = tasks.find([&project], &filter_by(strict))?;
            assert_eq!(ids(&found), vec!["b"]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_unknown_cast_is_rejected() {
    run_test(
        || create_test_context(),
        |_ctx| {
            let err = Criteria::new().with("age:date", "5").unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_empty_sentinels() {
    run_test(
        || create_test_context(),
        |ctx| {
            let (project, tasks) = seed_tasks(&ctx)?;

            let empty = Criteria::new().with("age", "*empty*")?;
            assert_eq!(ids(&tasks.find([&project], &filter_by(empty))?), vec!["d", "e"]);

            let tagged = Criteria::new().with("tags", "*notempty*")?;
            assert_eq!(ids(&tasks.find([&project], &filter_by(tagged))?), vec!["a"]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_or_groups() {
    run_test(
        || create_test_context(),
        |ctx| {
            let (project, tasks) = seed_tasks(&ctx)?;

            let criteria = Criteria::from_document(&doc! {
                "$or": [{ title: "alpha" }, { title: "echo" }, { done: true }]
            })?;
            assert_eq!(ids(&tasks.find([&project], &filter_by(criteria))?), vec!["a", "c", "e"]);

            let narrowed = Criteria::new()
                .with("rank:int", 2)?
                .or(Criteria::new().with("done", true)?);
            assert_eq!(ids(&tasks.find([&project], &filter_by(narrowed))?), vec!["c"]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_sorting_compares_plain_strings() {
    run_test(
        || create_test_context(),
        |ctx| {
            let (project, tasks) = seed_tasks(&ctx)?;

            let ascending = tasks.find([&project], &order_by("rank", SortOrder::Ascending))?;
            assert_eq!(ids(&ascending), vec!["b", "c", "d", "e", "a"]);

            let sorts = SortSpec::new()
                .by("rank", SortOrder::Ascending)
                .by("title", SortOrder::Descending);
            let tie_broken = tasks.find([&project], &FindOptions::new().sorts(sorts))?;
            assert_eq!(ids(&tie_broken), vec!["b", "d", "c", "e", "a"]);

            let flags = SortSpec::from_document(&doc! { title: "0" });
            let descending = tasks.find([&project], &FindOptions::new().sorts(flags))?;
            assert_eq!(ids(&descending), vec!["e", "d", "c", "b", "a"]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_pagination_window() {
    run_test(
        || create_test_context(),
        |ctx| {
            let (project, tasks) = seed_tasks(&ctx)?;

            let page = FindOptions::new().offset(1).limit(2);
            assert_eq!(ids(&tasks.find([&project], &page)?), vec!["b", "c"]);
            assert_eq!(ids(&tasks.find([&project], &skip_by(4))?), vec!["e"]);
            assert!(tasks.find([&project], &skip_by(10))?.is_empty());
            assert_eq!(tasks.find([&project], &limit_to(0))?.len(), 5);
            assert_eq!(tasks.find([&project], &skip_by(-3))?.len(), 5);

            let (page, total) = tasks.find_with_total(
                [&project],
                &filter_by(Criteria::new().with("done", false)?).limit(2),
            )?;
            assert_eq!(ids(&page), vec!["a", "b"]);
            assert_eq!(total, 4);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_projection_without_criteria() {
    run_test(
        || create_test_context(),
        |ctx| {
            let (project, tasks) = seed_tasks(&ctx)?;

            let found = tasks.find([&project], &FindOptions::new().fields(&["title"]))?;
            assert_eq!(found.len(), 5);
            for task in found.iter() {
                assert_eq!(task.fields().len(), 2);
                assert!(task.contains_key("title"));
            }

            let hidden = tasks.get([&project], "a", &FieldSelector::of(&["!tags", "!age"]))?;
            assert!(!hidden.contains_key("tags"));
            assert!(!hidden.contains_key("age"));
            assert_eq!(hidden.get("rank").as_i64(), Some(&9));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_lookups_by_field() {
    run_test(
        || create_test_context(),
        |ctx| {
            let (project, tasks) = seed_tasks(&ctx)?;

            let charlie = tasks.get_by([&project], "title", "charlie", &FieldSelector::new())?;
            assert_eq!(charlie.id().as_deref(), Some("c"));
            assert!(tasks.has_by([&project], "rank", 7)?);
            assert!(!tasks.has_by([&project], "rank", 99)?);

            let err = tasks
                .get_by([&project], "title", "zulu", &FieldSelector::new())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::NotFound);

            let bulk = tasks.get_bulk([&project], &["e", "a"], &FieldSelector::of(&["title"]))?;
            assert_eq!(ids(&bulk), vec!["e", "a"]);

            let random = tasks.get_random(
                [&project],
                &Criteria::new().with("rank:int", 2)?,
                &FieldSelector::new(),
            )?;
            assert!(matches!(random.id().as_deref(), Some("c") | Some("d")));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_root_find_counts_before_pagination() {
    run_test(
        || create_test_context(),
        |ctx| {
            let projects = ctx.projects()?;
            for name in ["one", "two", "three"] {
                projects.create([], doc! { name: name, stars: 1 }, &Options::new())?;
            }

            let options = filter_by(Criteria::new().with("stars", 1)?)
                .sort_by("name", SortOrder::Ascending)
                .limit(2);
            let (page, total) = projects.find_with_total([], &options)?;
            assert_eq!(total, 3);
            let names: Vec<String> = page
                .iter()
                .filter_map(|project| project.get("name").as_str().map(String::from))
                .collect();
            assert_eq!(names, vec!["one", "three"]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
