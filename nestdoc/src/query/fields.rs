use crate::collection::Document;
use crate::common::{DOC_ID, EXCLUDE_PREFIX};
use smallvec::SmallVec;

/// Projection applied to documents returned by reads.
///
/// Names prefixed with `!` are excluded, other names are included. An empty
/// selector keeps every field. When at least one field is included, `id` is
/// kept too unless it is explicitly excluded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSelector {
    include: SmallVec<[String; 8]>,
    exclude: SmallVec<[String; 8]>,
}

impl FieldSelector {
    pub fn new() -> Self {
        FieldSelector {
            include: SmallVec::new(),
            exclude: SmallVec::new(),
        }
    }

    /// Builds a selector from field names such as `["title", "!secret"]`.
    pub fn of<S: AsRef<str>>(fields: &[S]) -> Self {
        let mut selector = FieldSelector::new();
        for field in fields {
            selector = selector.field(field.as_ref());
        }
        selector
    }

    pub fn field(mut self, field: &str) -> Self {
        match field.strip_prefix(EXCLUDE_PREFIX) {
            Some(excluded) if !excluded.is_empty() => self.exclude.push(excluded.to_string()),
            Some(_) => {}
            None if !field.is_empty() => self.include.push(field.to_string()),
            None => {}
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn included(&self) -> &[String] {
        &self.include
    }

    pub fn excluded(&self) -> &[String] {
        &self.exclude
    }

    /// Returns the projected copy of `document`.
    pub fn project(&self, document: &Document) -> Document {
        if self.is_empty() {
            return document.clone();
        }

        let mut projected = if self.include.is_empty() {
            document.clone()
        } else {
            let mut projected = Document::new();
            let keep_id = !self.exclude.iter().any(|field| field == DOC_ID);
            if keep_id && document.contains_key(DOC_ID) {
                projected.put(DOC_ID, document.get(DOC_ID)).ok();
            }
            for field in self.include.iter() {
                if document.contains_field(field) {
                    // include names are non-empty, so put cannot fail
                    projected.put(field.as_str(), document.get(field)).ok();
                }
            }
            projected
        };

        for field in self.exclude.iter() {
            projected.remove(field);
        }
        projected
    }
}

impl<S: AsRef<str>> From<Vec<S>> for FieldSelector {
    fn from(fields: Vec<S>) -> Self {
        FieldSelector::of(&fields)
    }
}
