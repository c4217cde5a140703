use std::fmt::{Display, Formatter};

/// The mutation a stage belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// A callback stage of the create, update and delete pipelines.
///
/// Stage names are appended to the dotted type name of the service, so
/// `Stage::PreSave(Operation::Create)` on a `project.task` service runs the
/// callbacks registered under `project.task.create.pre_save`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// `<op>.pre_validate`, receives the raw data.
    PreValidate(Operation),
    /// `<op>.validated`, receives the validated document.
    Validated(Operation),
    /// `pre_save`, receives the document about to be written on create or
    /// update, before `<op>.pre_save`.
    BeforeSave,
    /// `<op>.pre_save`, receives the document about to be written.
    PreSave(Operation),
    /// `<op>.saved`, receives the written data.
    OperationSaved(Operation),
    /// `saved`, receives the saved document after create or update.
    Saved,
    Created,
    Updated,
    Deleted,
}

impl Stage {
    pub fn name(&self) -> String {
        match self {
            Stage::PreValidate(op) => format!("{}.pre_validate", op.name()),
            Stage::Validated(op) => format!("{}.validated", op.name()),
            Stage::BeforeSave => "pre_save".to_string(),
            Stage::PreSave(op) => format!("{}.pre_save", op.name()),
            Stage::OperationSaved(op) => format!("{}.saved", op.name()),
            Stage::Saved => "saved".to_string(),
            Stage::Created => "created".to_string(),
            Stage::Updated => "updated".to_string(),
            Stage::Deleted => "deleted".to_string(),
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The events a pipeline may dispatch after a mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    CreatedFull,
    CreatedNotify,
    Updated,
    UpdatedOld,
    UpdatedFull,
    UpdatedFullWithOld,
    Deleted,
    DeletedOld,
    DeletedWithOld,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::CreatedFull => "created.full",
            EventKind::CreatedNotify => "created.notify",
            EventKind::Updated => "updated",
            EventKind::UpdatedOld => "updated_old",
            EventKind::UpdatedFull => "updated.full",
            EventKind::UpdatedFullWithOld => "updated.fullWithOld",
            EventKind::Deleted => "deleted",
            EventKind::DeletedOld => "deleted_old",
            EventKind::DeletedWithOld => "deleted.withOld",
        }
    }

    pub const ALL: [EventKind; 10] = [
        EventKind::Created,
        EventKind::CreatedFull,
        EventKind::CreatedNotify,
        EventKind::Updated,
        EventKind::UpdatedOld,
        EventKind::UpdatedFull,
        EventKind::UpdatedFullWithOld,
        EventKind::Deleted,
        EventKind::DeletedOld,
        EventKind::DeletedWithOld,
    ];

    /// The mutation dispatching this event.
    pub fn operation(&self) -> Operation {
        match self {
            EventKind::Created | EventKind::CreatedFull | EventKind::CreatedNotify => Operation::Create,
            EventKind::Updated
            | EventKind::UpdatedOld
            | EventKind::UpdatedFull
            | EventKind::UpdatedFullWithOld => Operation::Update,
            EventKind::Deleted | EventKind::DeletedOld | EventKind::DeletedWithOld => Operation::Delete,
        }
    }

    /// Whether the payload carries the document as it was before the mutation.
    pub fn needs_old(&self) -> bool {
        matches!(
            self,
            EventKind::UpdatedOld
                | EventKind::UpdatedFullWithOld
                | EventKind::DeletedOld
                | EventKind::DeletedWithOld
        )
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
