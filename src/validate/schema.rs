//! A JSON-schema-backed [`Validator`] for decoded API payloads.

use std::marker::PhantomData;

use serde::Serialize;

use crate::errors::ScanError;
use crate::validate::Validator;

/// Validates a decoded value against a compiled JSON schema by first
/// re-serializing it to [`serde_json::Value`] and running that through the
/// schema, rather than validating the raw response bytes directly — this
/// keeps validation composable with repairs, which mutate the decoded value.
pub struct SchemaValidator<T> {
    schema: jsonschema::Validator,
    _marker: PhantomData<fn(&T)>,
}

impl<T> SchemaValidator<T> {
    /// Compiles `json_schema` into a reusable validator for `T`.
    pub fn new(json_schema: &str) -> Result<Self, ScanError> {
        if json_schema.trim().is_empty() {
            return Err(ScanError::InvalidSchema(
                "json schema cannot be empty".to_string(),
            ));
        }

        let schema_value: serde_json::Value = serde_json::from_str(json_schema)?;
        let schema = jsonschema::validator_for(&schema_value)
            .map_err(|e| ScanError::InvalidSchema(e.to_string()))?;

        Ok(Self {
            schema,
            _marker: PhantomData,
        })
    }
}

impl<T: Serialize + Send + Sync> Validator<T> for SchemaValidator<T> {
    fn validate(&self, value: &T) -> Result<(), ScanError> {
        let instance = serde_json::to_value(value)?;
        self.schema
            .validate(&instance)
            .map_err(|error| ScanError::Validation(error.to_string()))
    }
}
