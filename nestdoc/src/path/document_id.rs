use crate::common::FIELD_SEPARATOR;
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use uuid::Uuid;

/// Generates a fresh document identifier.
pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

/// Checks that `id` can be used as one segment of a storage path.
///
/// Identifiers must be non-empty and must not contain the field separator,
/// otherwise two different documents could resolve to the same path.
pub fn validate_id(id: &str) -> NestdocResult<()> {
    if id.is_empty() {
        log::error!("Document id cannot be empty");
        return Err(NestdocError::new(
            "Document id cannot be empty",
            ErrorKind::InvalidId,
        ));
    }

    if id.contains(FIELD_SEPARATOR) {
        log::error!("Document id {} contains the field separator", id);
        return Err(NestdocError::new(
            &format!("Document id '{}' cannot contain '{}'", id, FIELD_SEPARATOR),
            ErrorKind::InvalidId,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_id_is_valid() {
        let id = new_document_id();
        assert!(validate_id(&id).is_ok());
        assert_ne!(id, new_document_id());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("t1").is_ok());

        let err = validate_id("").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidId);
        assert_eq!(err.status_code(), 412);

        let err = validate_id("a.b").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidId);
    }
}
