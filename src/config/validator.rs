//! Configuration validation for stack configurations.
//!
//! All problems are collected in one pass so `validate` can report every
//! issue at once. Errors stop assembly; warnings do not, unless the
//! validator runs in strict mode.

use crate::error::{ConfigError, Result, StackError};
use std::collections::HashSet;
use tracing::{debug, warn};
use validator::ValidateEmail;

use super::spec::{AssemblyBackend, AssemblyConfig, NotificationConfig, StackConfig, StackSettings};

/// Maximum length of a stack name.
const MAX_STACK_NAME_LEN: usize = 128;

/// Validator for stack configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Promote warnings to errors.
    strict: bool,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self { strict: false }
    }

    /// Treats warnings as errors.
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Validates a stack configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error found, or the first warning in strict mode.
    pub fn validate(&self, config: &StackConfig) -> Result<ValidationResult> {
        let result = Self::collect(config);

        if let Some(first_error) = result.errors.first() {
            return Err(StackError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }));
        }

        if self.strict
            && let Some(first_warning) = result.warnings.first()
        {
            return Err(StackError::Config(ConfigError::validation_general(format!(
                "{first_warning} (strict mode)"
            ))));
        }

        for warning in &result.warnings {
            warn!("{warning}");
        }
        debug!("Configuration validation passed");
        Ok(result)
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn collect(config: &StackConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_stack(&config.stack, &mut result);
        Self::validate_notifications(&config.notifications, &mut result);
        Self::validate_assembly(&config.assembly, &mut result);

        result
    }

    fn validate_stack(stack: &StackSettings, result: &mut ValidationResult) {
        if stack.name.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("stack.name"),
                message: String::from("Stack name cannot be empty"),
            });
        } else if !is_valid_stack_name(&stack.name) {
            result.errors.push(ValidationError {
                field: String::from("stack.name"),
                message: format!(
                    "Stack name '{}' is invalid. Must start with a letter and contain only alphanumerics and hyphens.",
                    stack.name
                ),
            });
        }

        if stack.region.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("stack.region"),
                message: String::from("Region cannot be empty"),
            });
        }
    }

    fn validate_notifications(notifications: &NotificationConfig, result: &mut ValidationResult) {
        if notifications.emails.is_empty() {
            result.warnings.push(String::from(
                "notifications.emails: list is empty, alarms will never be delivered",
            ));
            return;
        }

        let mut seen = HashSet::new();
        for (i, email) in notifications.emails.iter().enumerate() {
            let email = email.trim();
            if !is_valid_email(email) {
                result.errors.push(ValidationError {
                    field: format!("notifications.emails[{i}]"),
                    message: format!("'{email}' is not a valid email address"),
                });
            }

            if !seen.insert(email.to_ascii_lowercase()) {
                result.warnings.push(format!(
                    "notifications.emails[{i}]: duplicate address '{email}' will receive every alert twice"
                ));
            }
        }
    }

    fn validate_assembly(assembly: &AssemblyConfig, result: &mut ValidationResult) {
        match assembly.backend {
            AssemblyBackend::S3 => {
                if assembly.bucket.as_ref().is_none_or(String::is_empty) {
                    result.errors.push(ValidationError {
                        field: String::from("assembly.bucket"),
                        message: String::from("S3 bucket name is required when using S3 backend"),
                    });
                }
            }
            AssemblyBackend::Local => {
                if assembly.path.as_ref().is_some_and(|p| p.trim().is_empty()) {
                    result.errors.push(ValidationError {
                        field: String::from("assembly.path"),
                        message: String::from("Local assembly path cannot be blank"),
                    });
                }
            }
        }
    }
}

/// Returns true when the string is a syntactically valid email address.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    email.validate_email()
}

/// Stack names start with a letter and continue with alphanumerics or hyphens.
fn is_valid_stack_name(name: &str) -> bool {
    if name.len() > MAX_STACK_NAME_LEN {
        return false;
    }

    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return false;
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::assemble;

    #[test]
    fn test_valid_stack_name() {
        assert!(is_valid_stack_name("applicationmetrics"));
        assert!(is_valid_stack_name("Metrics-Prod-2"));
        assert!(!is_valid_stack_name("2metrics"));
        assert!(!is_valid_stack_name("metrics_prod"));
        assert!(!is_valid_stack_name(&"a".repeat(129)));
    }

    #[test]
    fn test_email_syntax() {
        assert!(is_valid_email("ops@example.com"));
        assert!(!is_valid_email("ops.example.com"));
        assert!(!is_valid_email("ops@"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_empty_list_is_a_warning() {
        let config = StackConfig::with_emails(Vec::<String>::new());
        let result = ConfigValidator::new().validate(&config).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn test_empty_list_fails_in_strict_mode() {
        let config = StackConfig::with_emails(Vec::<String>::new());
        let result = ConfigValidator::new().strict(true).validate(&config);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_email_is_an_error() {
        let config = StackConfig::with_emails(["ops@example.com", "not-an-address"]);
        let collected = ConfigValidator::collect(&config);
        assert_eq!(collected.error_count(), 1);
        assert_eq!(collected.errors[0].field, "notifications.emails[1]");
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_duplicates_warn_but_pass() {
        let config = StackConfig::with_emails(["ops@example.com", "OPS@example.com"]);
        let result = ConfigValidator::new().validate(&config).unwrap();
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let config = StackConfig::with_emails([" ops@example.com", "ops@example.com\t"]);
        let result = ConfigValidator::new().validate(&config).unwrap();
        assert_eq!(result.warning_count(), 1);
        assert!(assemble(&config).is_ok());
    }

    #[test]
    fn test_s3_backend_requires_bucket() {
        let mut config = StackConfig::with_emails(["ops@example.com"]);
        config.assembly.backend = AssemblyBackend::S3;
        let collected = ConfigValidator::collect(&config);
        assert_eq!(collected.errors[0].field, "assembly.bucket");
    }
}
