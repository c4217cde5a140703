use crate::query::{Criteria, FieldSelector, SortOrder, SortSpec};

/// Everything a read needs besides the parent ids: which documents, which
/// fields, in what order and which window of the result.
///
/// # Examples
///
/// ```rust,ignore
/// let options = FindOptions::new()
///     .criteria(Criteria::new().with("status", "open")?)
///     .fields(&["title", "!secret"])
///     .sort_by("created", SortOrder::Descending)
///     .offset(20)
///     .limit(10);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindOptions {
    pub(crate) criteria: Criteria,
    pub(crate) fields: FieldSelector,
    pub(crate) sorts: SortSpec,
    pub(crate) limit: Option<i64>,
    pub(crate) offset: i64,
}

/// Find options filtered by `criteria`.
pub fn filter_by(criteria: Criteria) -> FindOptions {
    FindOptions::new().criteria(criteria)
}

/// Find options sorted by a single field.
pub fn order_by(field_name: &str, sort_order: SortOrder) -> FindOptions {
    FindOptions::new().sort_by(field_name, sort_order)
}

pub fn skip_by(offset: i64) -> FindOptions {
    FindOptions::new().offset(offset)
}

pub fn limit_to(limit: i64) -> FindOptions {
    FindOptions::new().limit(limit)
}

impl FindOptions {
    pub fn new() -> FindOptions {
        FindOptions {
            criteria: Criteria::new(),
            fields: FieldSelector::new(),
            sorts: SortSpec::new(),
            limit: None,
            offset: 0,
        }
    }

    pub fn criteria(mut self, criteria: Criteria) -> FindOptions {
        self.criteria = criteria;
        self
    }

    pub fn fields<S: AsRef<str>>(mut self, fields: &[S]) -> FindOptions {
        self.fields = FieldSelector::of(fields);
        self
    }

    pub fn selector(mut self, fields: FieldSelector) -> FindOptions {
        self.fields = fields;
        self
    }

    pub fn sort_by(mut self, field_name: &str, sort_order: SortOrder) -> FindOptions {
        self.sorts = self.sorts.by(field_name, sort_order);
        self
    }

    pub fn sorts(mut self, sorts: SortSpec) -> FindOptions {
        self.sorts = sorts;
        self
    }

    /// Maximum number of documents; zero or negative means unbounded.
    pub fn limit(mut self, limit: i64) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    /// Number of documents to skip; negative counts as zero.
    pub fn offset(mut self, offset: i64) -> FindOptions {
        self.offset = offset;
        self
    }

    pub fn get_criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn get_fields(&self) -> &FieldSelector {
        &self.fields
    }

    pub fn get_sorts(&self) -> &SortSpec {
        &self.sorts
    }

    pub fn get_limit(&self) -> Option<i64> {
        self.limit
    }

    pub fn get_offset(&self) -> i64 {
        self.offset
    }
}
