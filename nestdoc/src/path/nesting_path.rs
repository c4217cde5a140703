use crate::common::FIELD_SEPARATOR;
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::path::{validate_id, TypePath};
use std::fmt::{Display, Formatter};

/// How deep a document sits below its root document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NestingDepth {
    Document,
    SubDocument,
    SubSubDocument,
}

impl NestingDepth {
    /// Depth of a document addressed by `count` parent identifiers.
    pub fn from_parent_count(count: usize) -> NestdocResult<NestingDepth> {
        match count {
            0 => Ok(NestingDepth::Document),
            1 => Ok(NestingDepth::SubDocument),
            2 => Ok(NestingDepth::SubSubDocument),
            _ => {
                log::error!("Unsupported nesting with {} parent ids", count);
                Err(NestdocError::new(
                    &format!("Documents cannot be nested below {} parents", count),
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }

    pub fn parent_count(&self) -> usize {
        match self {
            NestingDepth::Document => 0,
            NestingDepth::SubDocument => 1,
            NestingDepth::SubSubDocument => 2,
        }
    }

    /// Number of type levels, 1 to 3.
    pub fn level_count(&self) -> usize {
        self.parent_count() + 1
    }
}

/// Identifies one document by its parent identifiers and its own identifier.
///
/// Paths interleave identifiers with the collection fields of a [TypePath]:
///
/// | path     | `project/task/comment` with ids `p1`, `t1`, `c1` |
/// |----------|--------------------------------------------------|
/// | document | `p1.tasks.t1.comments.c1`                        |
/// | field    | `p1.tasks.t1.comments.c1.body`                   |
/// | children | `p1.tasks.t1.comments`                           |
/// | parent   | `p1.tasks.t1`                                    |
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NestingPath {
    Document {
        id: String,
    },
    SubDocument {
        parent_id: String,
        id: String,
    },
    SubSubDocument {
        p_parent_id: String,
        parent_id: String,
        id: String,
    },
}

impl NestingPath {
    /// Builds a path from `N` parent identifiers and the document identifier.
    ///
    /// Every identifier is validated with [validate_id].
    pub fn new<const N: usize>(parents: [&str; N], id: &str) -> NestdocResult<NestingPath> {
        for parent in parents.iter() {
            validate_id(parent)?;
        }
        validate_id(id)?;

        match parents.as_slice() {
            [] => Ok(NestingPath::Document { id: id.to_string() }),
            [parent_id] => Ok(NestingPath::SubDocument {
                parent_id: parent_id.to_string(),
                id: id.to_string(),
            }),
            [p_parent_id, parent_id] => Ok(NestingPath::SubSubDocument {
                p_parent_id: p_parent_id.to_string(),
                parent_id: parent_id.to_string(),
                id: id.to_string(),
            }),
            _ => {
                log::error!("Unsupported nesting with {} parent ids", N);
                Err(NestdocError::new(
                    &format!("Documents cannot be nested below {} parents", N),
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }

    /// Path of the parent document, `None` for root documents.
    pub fn parent(&self) -> Option<NestingPath> {
        match self {
            NestingPath::Document { .. } => None,
            NestingPath::SubDocument { parent_id, .. } => Some(NestingPath::Document {
                id: parent_id.clone(),
            }),
            NestingPath::SubSubDocument {
                p_parent_id,
                parent_id,
                ..
            } => Some(NestingPath::SubDocument {
                parent_id: p_parent_id.clone(),
                id: parent_id.clone(),
            }),
        }
    }

    pub fn depth(&self) -> NestingDepth {
        match self {
            NestingPath::Document { .. } => NestingDepth::Document,
            NestingPath::SubDocument { .. } => NestingDepth::SubDocument,
            NestingPath::SubSubDocument { .. } => NestingDepth::SubSubDocument,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            NestingPath::Document { id }
            | NestingPath::SubDocument { id, .. }
            | NestingPath::SubSubDocument { id, .. } => id,
        }
    }

    pub fn parent_ids(&self) -> Vec<&str> {
        match self {
            NestingPath::Document { .. } => vec![],
            NestingPath::SubDocument { parent_id, .. } => vec![parent_id.as_str()],
            NestingPath::SubSubDocument {
                p_parent_id,
                parent_id,
                ..
            } => vec![p_parent_id.as_str(), parent_id.as_str()],
        }
    }

    /// Storage path of the whole document.
    pub fn document_path(&self, type_path: &TypePath) -> NestdocResult<String> {
        self.check_depth(type_path)?;
        let parent_ids = self.parent_ids();
        let mut segments: Vec<&str> = Vec::with_capacity(parent_ids.len() * 2 + 1);
        for (parent_id, field) in parent_ids.iter().zip(type_path.collection_fields()) {
            segments.push(parent_id);
            segments.push(field);
        }
        segments.push(self.id());
        Ok(segments.join(FIELD_SEPARATOR))
    }

    /// Storage path of one field of the document.
    pub fn field_path(&self, type_path: &TypePath, field: &str) -> NestdocResult<String> {
        Ok(format!(
            "{}{}{}",
            self.document_path(type_path)?,
            FIELD_SEPARATOR,
            field
        ))
    }

    /// Storage path of the collection holding this document and its siblings.
    ///
    /// `None` for root documents, which live in the repository itself.
    pub fn children_path(&self, type_path: &TypePath) -> NestdocResult<Option<String>> {
        self.check_depth(type_path)?;
        collection_path(type_path, &self.parent_ids())
    }

    /// Storage path of the parent document, `None` for root documents.
    pub fn parent_path(&self, type_path: &TypePath) -> NestdocResult<Option<String>> {
        self.check_depth(type_path)?;
        let parent_ids = self.parent_ids();
        if parent_ids.is_empty() {
            return Ok(None);
        }

        let fields: Vec<&str> = type_path.collection_fields().collect();
        let mut segments: Vec<&str> = Vec::with_capacity(parent_ids.len() * 2);
        for (index, parent_id) in parent_ids.iter().enumerate() {
            if index > 0 {
                segments.push(fields[index - 1]);
            }
            segments.push(parent_id);
        }
        Ok(Some(segments.join(FIELD_SEPARATOR)))
    }

    fn check_depth(&self, type_path: &TypePath) -> NestdocResult<()> {
        if type_path.depth() != self.depth().level_count() {
            log::error!(
                "Path {} does not match the depth of type {}",
                self,
                type_path
            );
            return Err(NestdocError::new(
                &format!(
                    "Type {} is {} levels deep but the path has {} parent ids",
                    type_path,
                    type_path.depth(),
                    self.depth().parent_count()
                ),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}

impl Display for NestingPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut ids = self.parent_ids();
        ids.push(self.id());
        write!(f, "{}", ids.join("/"))
    }
}

/// Storage path of the collection addressed by `parents`.
///
/// `None` when `parents` is empty: root documents live in the repository
/// itself rather than under a path.
pub fn collection_path(type_path: &TypePath, parents: &[&str]) -> NestdocResult<Option<String>> {
    if type_path.depth() != parents.len() + 1 {
        log::error!(
            "Type {} cannot be addressed with {} parent ids",
            type_path,
            parents.len()
        );
        return Err(NestdocError::new(
            &format!(
                "Type {} is {} levels deep but {} parent ids were given",
                type_path,
                type_path.depth(),
                parents.len()
            ),
            ErrorKind::InvalidOperation,
        ));
    }

    if parents.is_empty() {
        return Ok(None);
    }

    let mut segments: Vec<&str> = Vec::with_capacity(parents.len() * 2);
    for (parent_id, field) in parents.iter().zip(type_path.collection_fields()) {
        validate_id(parent_id)?;
        segments.push(parent_id);
        segments.push(field);
    }
    Ok(Some(segments.join(FIELD_SEPARATOR)))
}

/// Storage path of the document owning the collection addressed by
/// `parents`; `None` for root documents.
pub fn parent_document_path(type_path: &TypePath, parents: &[&str]) -> NestdocResult<Option<String>> {
    let collection = match collection_path(type_path, parents)? {
        Some(collection) => collection,
        None => return Ok(None),
    };
    Ok(collection
        .rsplit_once(FIELD_SEPARATOR)
        .map(|(parent, _)| parent.to_string()))
}
