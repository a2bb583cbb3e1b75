//! Form and record validation
//!
//! Field-level checks live in [`fields`]; checks that probe a remote host
//! (URL reachability, OAI-PMH Identify, DOI resolution) live in [`remote`].

mod fields;
mod remote;

pub use fields::{max_length, required, valid_choices, valid_email, valid_url};
pub use remote::{DoiResolves, UrlResolves, ValidOaiUrl};

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const FIELD_REQUIRED: &str = "This field is required.";
pub const INVALID_URL: &str = "Enter a valid URL.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const URL_DOES_NOT_RESOLVE: &str = "URL does not resolve, please enter a valid URL";
pub const INVALID_OAI_URL: &str = "Invalid OAI URL, could not retrieve a valid Identify response";
pub const DOI_DOES_NOT_RESOLVE: &str = "DOI does not resolve, please enter a valid DOI";

/// Key used for errors that belong to the object rather than a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ValidationError {}

/// Field name -> messages, serialized as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Record the outcome of a check against `field`, passing the value through.
    pub fn check<T>(&mut self, field: &str, outcome: Result<T, ValidationError>) -> Option<T> {
        match outcome {
            Ok(value) => Some(value),
            Err(e) => {
                self.add(field, e.0);
                None
            }
        }
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_messages_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("url", INVALID_URL);
        errors.add("url", URL_DOES_NOT_RESOLVE);
        errors.add("title", FIELD_REQUIRED);

        assert_eq!(errors.get("url").unwrap().len(), 2);
        assert!(errors.has("title"));
        assert!(!errors.has("doi"));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_check_passes_value_through() {
        let mut errors = ValidationErrors::new();
        let value = errors.check("title", required(Some("Ducks")));
        assert_eq!(value.as_deref(), Some("Ducks"));
        assert!(errors.is_empty());

        let missing = errors.check("title", required(None));
        assert!(missing.is_none());
        assert_eq!(errors.get("title").unwrap(), [FIELD_REQUIRED.to_string()]);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut errors = ValidationErrors::new();
        errors.add(NON_FIELD_ERRORS, DOI_DOES_NOT_RESOLVE);
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["non_field_errors"][0], DOI_DOES_NOT_RESOLVE);
    }
}
