//! A structural validator keyed off named field rules, standing in for the
//! struct-tag-driven validation (`nonnil`, `min=N`, ...) Go's
//! `gopkg.in/validator.v2` provides via reflection. Rust has no equivalent
//! tag reflection, so rules are registered explicitly as extractor closures.

use crate::errors::ScanError;
use crate::validate::Validator;

type Rule<T> = Box<dyn Fn(&T) -> Result<(), String> + Send + Sync>;

/// A validator built from named field rules, each checked in registration order.
pub struct TagValidator<T> {
    rules: Vec<(String, Rule<T>)>,
}

impl<T> Default for TagValidator<T> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<T> TagValidator<T> {
    /// Constructs an empty validator with no rules registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named rule. `check` returns `Err(reason)` on failure.
    pub fn rule(
        mut self,
        name: impl Into<String>,
        check: impl Fn(&T) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.rules.push((name.into(), Box::new(check)));
        self
    }

    /// Registers a `nonnil`-equivalent rule: the extracted `Option` must be `Some`.
    pub fn nonnil<F, U>(self, name: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&T) -> Option<&U> + Send + Sync + 'static,
    {
        self.rule(name, move |value| {
            extract(value)
                .map(|_| ())
                .ok_or_else(|| "must not be nil".to_string())
        })
    }

    /// Registers a `min=N`-equivalent rule over an extracted numeric field.
    pub fn min<F>(self, name: impl Into<String>, minimum: i64, extract: F) -> Self
    where
        F: Fn(&T) -> i64 + Send + Sync + 'static,
    {
        self.rule(name, move |value| {
            let actual = extract(value);
            if actual < minimum {
                Err(format!("must be at least {minimum}, got {actual}"))
            } else {
                Ok(())
            }
        })
    }
}

impl<T: Send + Sync> Validator<T> for TagValidator<T> {
    fn validate(&self, value: &T) -> Result<(), ScanError> {
        for (name, check) in &self.rules {
            if let Err(reason) = check(value) {
                return Err(ScanError::Validation(format!("{name}: {reason}")));
            }
        }
        Ok(())
    }
}
