//! Schema validation seam.
//!
//! Schema-language semantics are out of scope for this crate: validation is an
//! external capability behind the [`SchemaValidator`] trait, and the
//! [`SchemaRegistry`] is a plain value owned by the caller rather than ambient
//! module state. A versioned collection with an attached validator rejects
//! invalid documents before any write is attempted.

use bson::Document as RawDocument;
use std::collections::HashMap;
use std::fmt;

use crate::error::{StoreError, StoreResult};

/// External validation capability: decides whether a record matches a schema.
pub trait SchemaValidator: Send + Sync {
    /// Returns whether the record conforms to this schema.
    fn validate(&self, record: &RawDocument) -> bool;
}

impl<F> SchemaValidator for F
where
    F: Fn(&RawDocument) -> bool + Send + Sync,
{
    fn validate(&self, record: &RawDocument) -> bool {
        self(record)
    }
}

/// Registry of named schema validators.
///
/// Registration is first-wins: re-registering an id keeps the original
/// validator.
#[derive(Default)]
pub struct SchemaRegistry {
    validators: HashMap<String, Box<dyn SchemaValidator>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a validator under a schema id, unless one is already present.
    pub fn register(&mut self, id: impl Into<String>, validator: Box<dyn SchemaValidator>) {
        self.validators.entry(id.into()).or_insert(validator);
    }

    /// Looks up a registered validator.
    pub fn validator(&self, id: &str) -> Option<&dyn SchemaValidator> {
        self.validators.get(id).map(Box::as_ref)
    }

    /// Validates a record against a registered schema.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the schema is unknown or rejects the
    /// record.
    pub fn check(&self, id: &str, record: &RawDocument) -> StoreResult<()> {
        let validator = self.validator(id).ok_or_else(|| {
            StoreError::Validation(format!("no schema registered for '{id}'"))
        })?;

        if !validator.validate(record) {
            return Err(StoreError::Validation(format!(
                "document does not validate against schema '{id}'"
            )));
        }

        Ok(())
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn requires_message() -> Box<dyn SchemaValidator> {
        Box::new(|record: &RawDocument| record.get("message").is_some())
    }

    #[test]
    fn check_accepts_and_rejects() {
        let mut registry = SchemaRegistry::new();
        registry.register("note", requires_message());

        assert!(registry.check("note", &doc! { "message": "A" }).is_ok());
        assert!(matches!(
            registry.check("note", &doc! { "title": "A" }),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn unknown_schema_is_a_validation_error() {
        let registry = SchemaRegistry::new();
        assert!(registry.check("missing", &doc! {}).is_err());
    }

    #[test]
    fn registration_is_first_wins() {
        let mut registry = SchemaRegistry::new();
        registry.register("note", Box::new(|_: &RawDocument| true));
        registry.register("note", Box::new(|_: &RawDocument| false));

        assert!(registry.check("note", &doc! {}).is_ok());
    }
}
