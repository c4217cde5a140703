// document constants
pub const DOC_ID: &str = "id";
pub const FIELD_SEPARATOR: &str = ".";

// criteria constants
pub const OR_OPERATOR: &str = "$or";
pub const EMPTY_SENTINEL: &str = "*empty*";
pub const NOT_EMPTY_SENTINEL: &str = "*notempty*";
pub const CAST_SEPARATOR: char = ':';
pub const EXCLUDE_PREFIX: char = '!';

// nesting constants
pub const MAX_NESTING_DEPTH: usize = 3;

// option keys
pub const OPTION_CLEAN_DATA: &str = "clean_data";
