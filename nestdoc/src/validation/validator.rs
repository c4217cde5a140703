use crate::collection::Document;
use crate::common::Options;
use crate::errors::NestdocResult;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValidationMode {
    Create,
    Update,
}

impl Display for ValidationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationMode::Create => write!(f, "create"),
            ValidationMode::Update => write!(f, "update"),
        }
    }
}

/// Turns raw input into a validated document.
///
/// Implementations fail with a `ValidationFailed` error carrying
/// [crate::errors::ValidationErrors] when the data is rejected. They never
/// assign the document id.
pub trait ValidatorProvider: Send + Sync {
    /// Validates `data` for `type_name`.
    ///
    /// `clean_data` drops fields the type does not know instead of rejecting
    /// them. `clear_missing` resets known fields absent from `data`; updates
    /// pass `false` so omitted fields stay untouched.
    fn validate(
        &self,
        type_name: &str,
        mode: ValidationMode,
        data: Document,
        clean_data: bool,
        clear_missing: bool,
        options: &Options,
    ) -> NestdocResult<Document>;
}

/// Shared handle on a [ValidatorProvider].
#[derive(Clone)]
pub struct Validator {
    inner: Arc<dyn ValidatorProvider>,
}

impl Validator {
    pub fn new<T: ValidatorProvider + 'static>(inner: T) -> Self {
        Validator {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for Validator {
    type Target = Arc<dyn ValidatorProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Default for Validator {
    fn default() -> Self {
        Validator::new(PassthroughValidator)
    }
}

impl Debug for Validator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator").finish()
    }
}

/// Accepts any data as is.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughValidator;

impl ValidatorProvider for PassthroughValidator {
    fn validate(
        &self,
        type_name: &str,
        mode: ValidationMode,
        data: Document,
        _clean_data: bool,
        _clear_missing: bool,
        _options: &Options,
    ) -> NestdocResult<Document> {
        log::debug!("Accepting {} data for {} without validation", mode, type_name);
        Ok(data)
    }
}
