use backtrace::Backtrace;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::collection::Document;
use crate::common::{atomic, Atomic};
use crate::service::BulkIndex;

/// Error kinds for nestdoc operations.
///
/// Each kind maps to a conventional HTTP-like status number through
/// [`ErrorKind::status_code`], so outer layers can translate failures without
/// inspecting messages.
///
/// # Examples
///
/// ```rust,ignore
/// use nestdoc::errors::{NestdocError, ErrorKind, NestdocResult};
///
/// fn example() -> NestdocResult<()> {
///     Err(NestdocError::new("Document not found", ErrorKind::NotFound))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// The referenced document or path does not exist
    NotFound,
    /// A document already exists where uniqueness is required
    Conflict,
    /// The validator rejected the payload
    ValidationFailed,
    /// Bulk input was empty or missing
    MissingData,
    /// The identifier is empty or cannot be embedded in a storage path
    InvalidId,
    /// The operation is not supported for this kind of service
    UnsupportedOperation,
    /// The operation is not valid in the current context (configuration misuse)
    InvalidOperation,
    /// One or more items of a bulk operation failed
    Import,
    /// Error in event processing
    EventError,
    /// Error from the repository backend
    BackendError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl ErrorKind {
    /// Returns the HTTP-like status number for this kind.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 403,
            ErrorKind::ValidationFailed
            | ErrorKind::MissingData
            | ErrorKind::InvalidId
            | ErrorKind::Import => 412,
            ErrorKind::UnsupportedOperation
            | ErrorKind::InvalidOperation
            | ErrorKind::EventError
            | ErrorKind::BackendError
            | ErrorKind::InternalError => 500,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::Conflict => write!(f, "Conflict"),
            ErrorKind::ValidationFailed => write!(f, "Validation failed"),
            ErrorKind::MissingData => write!(f, "Missing data"),
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::UnsupportedOperation => write!(f, "Unsupported operation"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::Import => write!(f, "Import error"),
            ErrorKind::EventError => write!(f, "Event error"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Field level validation messages, keyed by field name.
///
/// Field order follows the order in which the validator reported them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    fields: IndexMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        ValidationErrors {
            fields: IndexMap::new(),
        }
    }

    /// Records a message against a field.
    pub fn add(&mut self, field: &str, message: &str) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, field: &str) -> Option<&Vec<String>> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.fields.iter()
    }

    /// Flattens the errors into `field: message` lines.
    pub fn messages(&self) -> Vec<String> {
        self.fields
            .iter()
            .flat_map(|(field, messages)| {
                messages.iter().map(move |m| format!("{}: {}", field, m))
            })
            .collect()
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.messages().join(", "))
    }
}

/// The error recorded for one item of a bulk operation.
///
/// Validator failures keep their field errors; every other failure degrades
/// to its message.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportItemError {
    Validation(ValidationErrors),
    Message(String),
}

impl ImportItemError {
    pub(crate) fn from_error(error: &NestdocError) -> Self {
        match error.validation_errors() {
            Some(errors) => ImportItemError::Validation(errors.clone()),
            None => ImportItemError::Message(error.message().to_string()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        match self {
            ImportItemError::Validation(errors) => errors.messages(),
            ImportItemError::Message(message) => vec![message.clone()],
        }
    }
}

/// Outcome of a bulk operation that had at least one failing item.
///
/// Documents of the items that succeeded are carried along so callers get
/// the full successful result set next to the per-index failures.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    failures: IndexMap<BulkIndex, ImportItemError>,
    succeeded: IndexMap<BulkIndex, Document>,
}

impl ImportReport {
    pub fn new() -> Self {
        ImportReport::default()
    }

    pub fn add_failure(&mut self, index: BulkIndex, error: ImportItemError) {
        self.failures.insert(index, error);
    }

    pub fn add_success(&mut self, index: BulkIndex, document: Document) {
        self.succeeded.insert(index, document);
    }

    pub fn failures(&self) -> &IndexMap<BulkIndex, ImportItemError> {
        &self.failures
    }

    pub fn succeeded(&self) -> &IndexMap<BulkIndex, Document> {
        &self.succeeded
    }

    pub(crate) fn into_succeeded(self) -> IndexMap<BulkIndex, Document> {
        self.succeeded
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Folds another report into this one, keeping original indices.
    pub fn merge(&mut self, other: ImportReport) {
        self.failures.extend(other.failures);
        self.succeeded.extend(other.succeeded);
    }

    /// Reorders failures and successes to follow the caller's `order`.
    pub(crate) fn reorder(&mut self, order: &[BulkIndex]) {
        let position: HashMap<&BulkIndex, usize> =
            order.iter().enumerate().map(|(at, index)| (index, at)).collect();
        let rank = |index: &BulkIndex| position.get(index).copied().unwrap_or(usize::MAX);
        self.failures.sort_by(|a, _, b, _| rank(a).cmp(&rank(b)));
        self.succeeded.sort_by(|a, _, b, _| rank(a).cmp(&rank(b)));
    }

    /// All failure messages prefixed with the caller index they belong to.
    pub fn messages(&self) -> Vec<String> {
        self.failures
            .iter()
            .flat_map(|(index, error)| {
                error
                    .messages()
                    .into_iter()
                    .map(move |m| format!("#{}: {}", index, m))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
enum ErrorDetails {
    Validation(ValidationErrors),
    Import(ImportReport),
}

/// Custom nestdoc error type.
///
/// `NestdocError` carries a message, an [`ErrorKind`], an optional cause and,
/// for validation and bulk failures, the structured details behind the message.
///
/// # Examples
///
/// ```rust,ignore
/// use nestdoc::errors::{NestdocError, ErrorKind};
///
/// let err = NestdocError::new("Document not found", ErrorKind::NotFound);
/// assert_eq!(err.status_code(), 404);
///
/// let cause = NestdocError::new("path missing", ErrorKind::NotFound);
/// let err = NestdocError::new_with_cause("Update failed", ErrorKind::NotFound, cause);
/// ```
#[derive(Clone)]
pub struct NestdocError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<NestdocError>>,
    details: Option<Box<ErrorDetails>>,
    backtrace: Atomic<Backtrace>,
}

impl NestdocError {
    /// Creates a new `NestdocError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        NestdocError {
            message: message.to_string(),
            error_kind,
            cause: None,
            details: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `NestdocError` with a cause error.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: NestdocError) -> Self {
        NestdocError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            details: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a `ValidationFailed` error carrying field level messages.
    pub fn validation(message: &str, errors: ValidationErrors) -> Self {
        let mut error = NestdocError::new(message, ErrorKind::ValidationFailed);
        error.details = Some(Box::new(ErrorDetails::Validation(errors)));
        error
    }

    /// Creates an `Import` error wrapping a bulk report.
    pub fn import(report: ImportReport) -> Self {
        let message = format!(
            "Bulk operation failed for {} item(s): {}",
            report.failures().len(),
            report.messages().join("; ")
        );
        let mut error = NestdocError::new(&message, ErrorKind::Import);
        error.details = Some(Box::new(ErrorDetails::Import(report)));
        error
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&NestdocError> {
        self.cause.as_deref()
    }

    pub fn status_code(&self) -> u16 {
        self.error_kind.status_code()
    }

    /// Field errors of a validation failure, searched through the cause chain.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self.details.as_deref() {
            Some(ErrorDetails::Validation(errors)) => Some(errors),
            _ => self.cause.as_ref().and_then(|c| c.validation_errors()),
        }
    }

    /// The per-item report of a failed bulk operation.
    pub fn import_report(&self) -> Option<&ImportReport> {
        match self.details.as_deref() {
            Some(ErrorDetails::Import(report)) => Some(report),
            _ => None,
        }
    }
}

impl Display for NestdocError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for NestdocError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for NestdocError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for nestdoc operations.
pub type NestdocResult<T> = Result<T, NestdocError>;

impl From<String> for NestdocError {
    fn from(msg: String) -> Self {
        NestdocError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for NestdocError {
    fn from(msg: &str) -> Self {
        NestdocError::new(msg, ErrorKind::InternalError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_error_has_no_cause() {
        let error = NestdocError::new("An error occurred", ErrorKind::NotFound);
        assert_eq!(error.message(), "An error occurred");
        assert_eq!(error.kind(), &ErrorKind::NotFound);
        assert!(error.cause().is_none());
    }

    #[test]
    fn error_with_cause_exposes_source() {
        let cause = NestdocError::new("path missing", ErrorKind::NotFound);
        let error = NestdocError::new_with_cause("update failed", ErrorKind::NotFound, cause);
        assert!(error.source().is_some());
        assert_eq!(error.cause().map(|c| c.message()), Some("path missing"));
    }

    #[test]
    fn status_codes_follow_kind() {
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        assert_eq!(ErrorKind::Conflict.status_code(), 403);
        assert_eq!(ErrorKind::ValidationFailed.status_code(), 412);
        assert_eq!(ErrorKind::Import.status_code(), 412);
        assert_eq!(ErrorKind::MissingData.status_code(), 412);
        assert_eq!(ErrorKind::UnsupportedOperation.status_code(), 500);
        assert_eq!(ErrorKind::InternalError.status_code(), 500);
    }

    #[test]
    fn validation_errors_survive_wrapping() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "This value should not be blank.");
        errors.add("name", "Too short.");
        errors.add("age", "Must be an integer.");
        let inner = NestdocError::validation("invalid project", errors);
        let outer = NestdocError::new_with_cause("create failed", ErrorKind::ValidationFailed, inner);

        let found = outer.validation_errors().unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found.field("name").unwrap().len(), 2);
        assert_eq!(
            found.messages(),
            vec![
                "name: This value should not be blank.".to_string(),
                "name: Too short.".to_string(),
                "age: Must be an integer.".to_string(),
            ]
        );
    }

    #[test]
    fn import_item_error_degrades_generic_errors_to_message() {
        let error = NestdocError::new("Document p1 already exists", ErrorKind::Conflict);
        assert_eq!(
            ImportItemError::from_error(&error),
            ImportItemError::Message("Document p1 already exists".to_string())
        );

        let mut errors = ValidationErrors::new();
        errors.add("title", "required");
        let error = NestdocError::validation("invalid", errors.clone());
        assert_eq!(ImportItemError::from_error(&error), ImportItemError::Validation(errors));
    }

    #[test]
    fn import_report_merge_keeps_indices() {
        let mut left = ImportReport::new();
        left.add_failure(BulkIndex::from(3), ImportItemError::Message("boom".to_string()));
        let mut right = ImportReport::new();
        right.add_failure(BulkIndex::from("x"), ImportItemError::Message("bang".to_string()));
        right.add_success(BulkIndex::from(0), Document::new());
        left.merge(right);

        assert_eq!(left.failures().len(), 2);
        assert_eq!(left.succeeded().len(), 1);
        assert_eq!(left.messages(), vec!["#3: boom".to_string(), "#x: bang".to_string()]);

        let error = NestdocError::import(left);
        assert_eq!(error.kind(), &ErrorKind::Import);
        assert_eq!(error.import_report().unwrap().failures().len(), 2);
        assert!(error.message().contains("2 item(s)"));
    }

    #[test]
    fn from_string_is_internal() {
        let error: NestdocError = "oops".into();
        assert_eq!(error.kind(), &ErrorKind::InternalError);
    }
}
