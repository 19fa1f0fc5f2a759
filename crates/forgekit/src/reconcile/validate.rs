//! Required-field checks for decoded server objects.
//!
//! Decoded objects keep optional wire fields as `Option` (or empty strings
//! from `#[serde(default)]`), so a response missing an identity field still
//! decodes. Validation then rejects it instead of letting a default value
//! flow into comparisons.

use crate::platform::{ProviderError, Result};

/// Outcome of validating one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validation {
    /// Object kind, for error messages.
    pub kind: &'static str,
    /// First required field found missing, if any.
    pub missing: Option<&'static str>,
}

impl Validation {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.missing.is_none()
    }

    /// Convert into a `Result`, failing with `ValidationFailed`.
    pub fn into_result(self) -> Result<()> {
        match self.missing {
            None => Ok(()),
            Some(field) => Err(ProviderError::ValidationFailed {
                kind: self.kind,
                field,
            }),
        }
    }
}

/// Something that can be checked for required fields.
pub trait Validate {
    fn validate(&self) -> Validation;
}

/// A field value that can be absent.
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl<T> Presence for Option<T> {
    #[inline]
    fn is_present(&self) -> bool {
        self.is_some()
    }
}

impl Presence for String {
    #[inline]
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Presence for str {
    #[inline]
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

/// Builder recording the first missing required field.
///
/// ```ignore
/// Validator::new("repository")
///     .require("slug", &self.slug)
///     .require("project", &self.project)
///     .finish()
/// ```
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct Validator {
    kind: &'static str,
    missing: Option<&'static str>,
}

impl Validator {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            missing: None,
        }
    }

    pub fn require<P: Presence + ?Sized>(mut self, field: &'static str, value: &P) -> Self {
        if self.missing.is_none() && !value.is_present() {
            self.missing = Some(field);
        }
        self
    }

    /// Require a condition computed by the caller, e.g. a non-zero id.
    pub fn require_that(mut self, field: &'static str, present: bool) -> Self {
        if self.missing.is_none() && !present {
            self.missing = Some(field);
        }
        self
    }

    pub fn finish(self) -> Validation {
        Validation {
            kind: self.kind,
            missing: self.missing,
        }
    }
}

/// Validate a single object, returning it on success.
pub fn validated<T: Validate>(object: T) -> Result<T> {
    object.validate().into_result()?;
    Ok(object)
}

/// Validate every element, failing on the first malformed one.
///
/// The whole list is rejected: callers never see a filtered subset.
pub fn validate_all<T: Validate>(objects: &[T]) -> Result<()> {
    objects
        .iter()
        .try_for_each(|object| object.validate().into_result())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Thing {
        id: Option<u64>,
        name: String,
    }

    impl Validate for Thing {
        fn validate(&self) -> Validation {
            Validator::new("thing")
                .require("id", &self.id)
                .require("name", &self.name)
                .finish()
        }
    }

    #[test]
    fn complete_object_passes() {
        let thing = Thing {
            id: Some(1),
            name: "a".to_string(),
        };
        assert!(thing.validate().is_valid());
        assert!(validated(thing).is_ok());
    }

    #[test]
    fn reports_first_missing_field() {
        let thing = Thing {
            id: None,
            name: String::new(),
        };
        let validation = thing.validate();
        assert_eq!(validation.missing, Some("id"));
        match validation.into_result() {
            Err(ProviderError::ValidationFailed { kind, field }) => {
                assert_eq!(kind, "thing");
                assert_eq!(field, "id");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn validate_all_rejects_whole_list() {
        let things = vec![
            Thing {
                id: Some(1),
                name: "a".to_string(),
            },
            Thing {
                id: Some(2),
                name: String::new(),
            },
        ];
        let err = validate_all(&things).expect_err("second element is malformed");
        assert!(err.is_validation_failed());
    }

    #[test]
    fn require_that_uses_caller_condition() {
        let validation = Validator::new("key").require_that("id", false).finish();
        assert_eq!(validation.missing, Some("id"));
    }
}
