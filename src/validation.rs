//! Validation Support
//!
//! A small rule-string validation engine for query parameters. Rules are written the
//! way they are in route definitions (`"integer|min:1|max:300"`) and checked one
//! attribute at a time; failures are collected into [`ValidationErrors`] so a request
//! can be rejected with every problem listed at once.
//!
//! Custom rules are closures registered on a single [`Validator`] instance. There is
//! no global registry: a collection builds its own validator for each validation run,
//! with rules that capture its configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! use mason_collection::validation::{Validator, ValidationErrors};
//!
//! let allowed = ["created", "content"];
//! let validator = Validator::new().extend("known_field", move |_attr, value, _args| {
//!     if allowed.contains(&value) {
//!         Ok(())
//!     } else {
//!         Err(format!("'{value}' is not a known field."))
//!     }
//! });
//!
//! let mut errors = ValidationErrors::new();
//! validator.check(&mut errors, "limit", "25", "integer|min:1|max:300")?;
//! validator.check(&mut errors, "field", "snake", "known_field")?;
//! assert_eq!(errors.len(), 1);
//! ```

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::errors::ApiError;

/// Validation error with field name and message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// The parameter that failed validation, in dotted form (`filters.content.0`)
    pub field: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Create a new empty validation errors collection
    #[must_use]
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add a validation error
    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Check if there are any errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Get all errors
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Consume the collection, returning the errors
    #[must_use]
    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    /// Convert to Result
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one error was collected.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} error(s):", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// A named rule: receives the attribute name, the value and the rule arguments
/// (`min:1` has the single argument `"1"`) and returns the failure message.
pub type Rule<'a> = Box<dyn Fn(&str, &str, &[&str]) -> Result<(), String> + Send + Sync + 'a>;

/// Rule-string validator with the built-in rules `required`, `integer`, `numeric`,
/// `boolean`, `min`, `max` and `in`, plus any custom rules added with [`Validator::extend`].
pub struct Validator<'a> {
    rules: HashMap<String, Rule<'a>>,
}

impl Default for Validator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Validator<'a> {
    /// Create a validator holding only the built-in rules
    #[must_use]
    pub fn new() -> Self {
        let mut validator = Self {
            rules: HashMap::new(),
        };
        validator.insert("required", |attr, value, _| {
            validators::validate_required(attr, value)
        });
        validator.insert("integer", |attr, value, _| {
            validators::validate_integer(attr, value)
        });
        validator.insert("numeric", |attr, value, _| {
            validators::validate_numeric(attr, value)
        });
        validator.insert("boolean", |attr, value, _| {
            validators::validate_boolean(attr, value)
        });
        validator.insert("min", |attr, value, args| {
            let min = rule_number(args, "min")?;
            validators::validate_range(attr, value, Some(min), None)
        });
        validator.insert("max", |attr, value, args| {
            let max = rule_number(args, "max")?;
            validators::validate_range(attr, value, None, Some(max))
        });
        validator.insert("in", |attr, value, args| {
            validators::validate_in(attr, value, args)
        });
        validator
    }

    /// Register a custom named rule, replacing any rule with the same name
    #[must_use]
    pub fn extend<F>(mut self, name: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&str, &str, &[&str]) -> Result<(), String> + Send + Sync + 'a,
    {
        self.insert(name, rule);
        self
    }

    fn insert<F>(&mut self, name: impl Into<String>, rule: F)
    where
        F: Fn(&str, &str, &[&str]) -> Result<(), String> + Send + Sync + 'a,
    {
        self.rules.insert(name.into(), Box::new(rule));
    }

    /// Whether a rule with this name is registered
    #[must_use]
    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Check `value` against a `|`-separated rule string.
    ///
    /// Rules run in order and stop at the first failure for this attribute; the failure
    /// is added to `errors`. Returns whether the value passed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the rule string names an unknown rule.
    pub fn check(
        &self,
        errors: &mut ValidationErrors,
        attribute: &str,
        value: &str,
        rules: &str,
    ) -> Result<bool, ApiError> {
        for rule in rules.split('|').map(str::trim).filter(|r| !r.is_empty()) {
            let (name, args) = parse_rule(rule);
            let check = self.rules.get(name).ok_or_else(|| {
                ApiError::configuration(format!("unknown validation rule '{name}'"))
            })?;

            if let Err(message) = check(attribute, value, &args) {
                errors.add(ValidationError::new(attribute, message));
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Split `"min:1"` into `("min", ["1"])` and `"in:a,b"` into `("in", ["a", "b"])`
fn parse_rule(rule: &str) -> (&str, Vec<&str>) {
    match rule.split_once(':') {
        Some((name, args)) => (name, args.split(',').map(str::trim).collect()),
        None => (rule, Vec::new()),
    }
}

fn rule_number(args: &[&str], rule: &str) -> Result<f64, String> {
    args.first()
        .and_then(|arg| arg.parse::<f64>().ok())
        .ok_or_else(|| format!("The {rule} rule needs a numeric argument."))
}

/// Helper validators for common patterns
pub mod validators {
    /// Validate value is not empty
    ///
    /// # Errors
    /// Returns the failure message when the value is blank.
    pub fn validate_required(field: &str, value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err(format!("The {field} field is required."));
        }
        Ok(())
    }

    /// Validate value is an integer
    ///
    /// # Errors
    /// Returns the failure message when the value does not parse as an integer.
    pub fn validate_integer(field: &str, value: &str) -> Result<(), String> {
        value
            .trim()
            .parse::<i64>()
            .map(|_| ())
            .map_err(|_| format!("The {field} must be an integer."))
    }

    /// Validate value is a finite number
    ///
    /// # Errors
    /// Returns the failure message when the value is not numeric.
    pub fn validate_numeric(field: &str, value: &str) -> Result<(), String> {
        match value.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => Ok(()),
            _ => Err(format!("The {field} must be a number.")),
        }
    }

    /// Validate value is a boolean literal
    ///
    /// # Errors
    /// Returns the failure message for anything but `true`, `false`, `1` or `0`.
    pub fn validate_boolean(field: &str, value: &str) -> Result<(), String> {
        match value.trim() {
            "true" | "false" | "1" | "0" => Ok(()),
            _ => Err(format!("The {field} field must be true or false.")),
        }
    }

    /// Validate a number is within range. Non-numeric values are measured by their
    /// length in characters instead.
    ///
    /// # Errors
    /// Returns the failure message when the value is out of range.
    pub fn validate_range(
        field: &str,
        value: &str,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<(), String> {
        let (measured, unit) = match value.trim().parse::<f64>() {
            Ok(number) => (number, ""),
            #[allow(clippy::cast_precision_loss)]
            Err(_) => (value.chars().count() as f64, " characters"),
        };

        if let Some(min_val) = min
            && measured < min_val
        {
            return Err(format!("The {field} must be at least {min_val}{unit}."));
        }

        if let Some(max_val) = max
            && measured > max_val
        {
            return Err(format!("The {field} may not be greater than {max_val}{unit}."));
        }

        Ok(())
    }

    /// Validate value is one of a fixed set
    ///
    /// # Errors
    /// Returns the failure message when the value is not in `allowed`.
    pub fn validate_in(field: &str, value: &str, allowed: &[&str]) -> Result<(), String> {
        if allowed.contains(&value) {
            Ok(())
        } else {
            Err(format!("The selected {field} is invalid."))
        }
    }
}
