use crate::collection::Document;
use crate::common::{Options, Value, DOC_ID};
use crate::errors::{ErrorKind, NestdocError, NestdocResult, ValidationErrors};
use crate::validation::{ValidationMode, ValidatorProvider};
use dashmap::DashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Expected type of a schema field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    Float,
    String,
    Bool,
    Array,
    Document,
    /// Any value.
    Any,
}

impl FieldType {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::Int => value.as_i64().is_some(),
            FieldType::Float => value.is_number(),
            FieldType::String => value.is_string(),
            FieldType::Bool => value.is_bool(),
            FieldType::Array => value.is_array(),
            FieldType::Document => value.is_document(),
            FieldType::Any => true,
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Bool => "bool",
            FieldType::Array => "array",
            FieldType::Document => "document",
            FieldType::Any => "any",
        };
        write!(f, "{}", name)
    }
}

/// Rule for one field of a [Schema].
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRule {
    name: String,
    field_type: FieldType,
    required: bool,
    default: Value,
}

impl FieldRule {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        FieldRule {
            name: name.to_string(),
            field_type,
            required: false,
            default: Value::Null,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value written when the field is missing and missing fields are cleared.
    pub fn default_value<T: Into<Value>>(mut self, value: T) -> Self {
        self.default = value.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Field rules of one document type.
///
/// # Examples
///
/// ```rust,ignore
/// let schema = Schema::new()
///     .field(FieldRule::new("title", FieldType::String).required())
///     .field(FieldRule::new("done", FieldType::Bool).default_value(false));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    rules: Vec<FieldRule>,
}

impl Schema {
    pub fn new() -> Self {
        Schema { rules: Vec::new() }
    }

    pub fn field(mut self, rule: FieldRule) -> Self {
        self.rules.retain(|r| r.name != rule.name);
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    fn validate(
        &self,
        mode: ValidationMode,
        data: Document,
        clean_data: bool,
        clear_missing: bool,
    ) -> Result<Document, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut validated = Document::new();

        for (field, value) in data.iter() {
            if field == DOC_ID {
                continue;
            }
            match self.rule(field) {
                Some(rule) => {
                    if !value.is_null() && !rule.field_type.accepts(value) {
                        errors.add(
                            field,
                            &format!("This value should be of type {}.", rule.field_type),
                        );
                    } else {
                        validated.put(field.as_str(), value.clone()).ok();
                    }
                }
                None if clean_data => {
                    log::debug!("Dropping unknown field {}", field);
                }
                None => errors.add(field, "This form should not contain extra fields."),
            }
        }

        for rule in self.rules.iter() {
            let present = data.contains_key(&rule.name);
            if !present && clear_missing {
                validated.put(rule.name.as_str(), rule.default.clone()).ok();
            }

            if rule.required {
                let value = validated.get(&rule.name);
                let checked = present || clear_missing || mode == ValidationMode::Create;
                if checked && value.is_null() {
                    errors.add(&rule.name, "This value should not be blank.");
                }
            }
        }

        if errors.is_empty() {
            Ok(validated)
        } else {
            Err(errors)
        }
    }
}

/// [ValidatorProvider] checking documents against per-type schemas.
///
/// Types are looked up by their dotted type name (`project.task`).
#[derive(Clone)]
pub struct SchemaValidator {
    inner: Arc<SchemaValidatorInner>,
}

struct SchemaValidatorInner {
    schemas: DashMap<String, Schema>,
}

impl SchemaValidator {
    pub fn new() -> Self {
        SchemaValidator {
            inner: Arc::new(SchemaValidatorInner {
                schemas: DashMap::new(),
            }),
        }
    }

    pub fn register(&self, type_name: &str, schema: Schema) {
        self.inner.schemas.insert(type_name.to_string(), schema);
    }

    pub fn has_schema(&self, type_name: &str) -> bool {
        self.inner.schemas.contains_key(type_name)
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        SchemaValidator::new()
    }
}

impl ValidatorProvider for SchemaValidator {
    fn validate(
        &self,
        type_name: &str,
        mode: ValidationMode,
        data: Document,
        clean_data: bool,
        clear_missing: bool,
        _options: &Options,
    ) -> NestdocResult<Document> {
        let schema = match self.inner.schemas.get(type_name) {
            Some(schema) => schema.clone(),
            None => {
                log::error!("No schema registered for {}", type_name);
                return Err(NestdocError::new(
                    &format!("No schema registered for type {}", type_name),
                    ErrorKind::InternalError,
                ));
            }
        };

        schema
            .validate(mode, data, clean_data, clear_missing)
            .map_err(|errors| {
                log::error!("Invalid {} data for {}: {}", mode, type_name, errors);
                NestdocError::validation(&format!("Invalid {} data", type_name), errors)
            })
    }
}
