//! # Nestdoc - Nested Document Lifecycle Engine
//!
//! Nestdoc turns declared document types into CRUD services. Documents may be
//! nested up to three levels deep (document, sub-document, sub-sub-document)
//! inside the storage representation of their root document, and every
//! mutation runs through a fixed pipeline of callback stages and lifecycle
//! events.
//!
//! ## Key Features
//!
//! - **Depth-generic services**: one [`service::DocumentService`] engine serves
//!   root, sub and sub-sub documents, addressed by 0, 1 or 2 parent ids
//! - **Hook pipeline**: transforming callbacks for every stage, plus
//!   fire-and-forget events that cost nothing when nobody listens
//! - **Bulk operations**: per-item failure isolation with an aggregated
//!   [`errors::ImportReport`] keyed by caller supplied indices
//! - **In-memory querying**: typed criteria casts, `*empty*` sentinels, `$or`
//!   groups, multi-key sorts and pagination over nested collections
//! - **Pluggable collaborators**: repository, validator, callbacks and events
//!   are traits injected through the builder
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nestdoc::common::Options;
//! use nestdoc::doc;
//! use nestdoc::service::{DocumentService, SubDocumentService};
//! use nestdoc::store::MemoryRepository;
//!
//! let repository = MemoryRepository::new();
//! let projects = DocumentService::<0>::builder("project")
//!     .repository(repository.clone())
//!     .build()?;
//! let tasks: SubDocumentService = DocumentService::builder("project")
//!     .nested("tasks", "task")
//!     .repository(repository)
//!     .build()?;
//!
//! projects.create([], doc! { id: "p1", name: "Apollo" }, &Options::new())?;
//! let task = tasks.create(["p1"], doc! { title: "launch" }, &Options::new())?;
//! ```
//!
//! ## Module Organization
//!
//! - [`collection`] - The [`collection::Document`] type and the `doc!` macro
//! - [`common`] - Values, options, constants and shared utilities
//! - [`errors`] - Error types, validation errors and import reports
//! - [`hooks`] - Callback registry, event dispatcher and the hook pipeline
//! - [`path`] - Type paths, nesting paths and storage path construction
//! - [`query`] - Criteria, field selection, sorting and in-memory evaluation
//! - [`service`] - The lifecycle engine, bulk operations, builder and registry
//! - [`store`] - Repository abstraction with memory and volatile backends
//! - [`validation`] - Validator abstraction and a schema based validator

pub mod collection;
pub mod common;
pub mod errors;
pub mod hooks;
pub mod path;
pub mod query;
pub mod service;
pub mod store;
pub mod validation;
