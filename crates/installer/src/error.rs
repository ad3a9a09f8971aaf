//! Installer error types.
//!
//! Every component returns [`Result`]; only the binary converts an error into
//! a printed message and a non-zero exit status.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while collecting configuration or provisioning.
#[derive(Error, Debug)]
pub enum InstallerError {
    /// A configuration key required by a step has no value.
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    /// An external tool exited unsuccessfully.
    ///
    /// `command` is the display form of the command, with secret arguments
    /// masked and environment overrides omitted.
    #[error("Error running: {command} (exit status: {})", status.map_or_else(|| "signal".to_string(), |s| s.to_string()))]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// An expected entry is absent from the infrastructure state document.
    #[error("Could not find {resource_type}.{name} in terraform state")]
    ResourceNotFound { resource_type: String, name: String },

    /// A poll bound was exceeded.
    #[error(
        "Timed out after {attempts} attempt(s) ({elapsed:?}) waiting for {what}. \
         Please wait a few moments and then re-run the installer."
    )]
    Timeout {
        what: String,
        attempts: u32,
        elapsed: Duration,
    },

    /// A resource in terraform state lacks an attribute a step reads.
    #[error("{resource} has no attribute '{attribute}' in terraform state")]
    MissingAttribute { resource: String, attribute: String },

    /// A live resource does not match the expected configuration.
    #[error("Unexpected {what}: expected '{expected}', found '{actual}'")]
    ValidationMismatch {
        what: String,
        expected: String,
        actual: String,
    },

    /// Required command line tools are not installed.
    #[error("Missing required tools: {}\n{instructions}", missing.join(", "))]
    MissingRequirements {
        missing: Vec<String>,
        instructions: String,
    },

    /// Configuration is present but unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Output from an external tool could not be interpreted.
    #[error("Unexpected output from {command}: {message}")]
    UnexpectedOutput { command: String, message: String },

    /// Terminal prompt failed.
    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    /// Terraform template rendering failed.
    #[error("Template error: {0}")]
    Template(#[from] handlebars::RenderError),

    /// An embedded template failed to parse.
    #[error("Template syntax error: {0}")]
    TemplateSyntax(#[from] handlebars::TemplateError),

    /// HTTP client construction failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl InstallerError {
    /// Whether re-running the installer is the documented recovery path.
    #[must_use]
    pub fn is_retryable_by_rerun(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias for installer operations.
pub type Result<T> = std::result::Result<T, InstallerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_display() {
        let err = InstallerError::CommandFailed {
            command: "convox rack install aws demo".into(),
            status: Some(2),
            stderr: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "Error running: convox rack install aws demo (exit status: 2)"
        );
    }

    #[test]
    fn test_timeout_mentions_rerun() {
        let err = InstallerError::Timeout {
            what: "app convox-app".into(),
            attempts: 5,
            elapsed: Duration::from_secs(15),
        };
        assert!(err.to_string().contains("re-run the installer"));
        assert!(err.is_retryable_by_rerun());
    }

    #[test]
    fn test_validation_mismatch_shows_both_values() {
        let err = InstallerError::ValidationMismatch {
            what: "rack region".into(),
            expected: "us-east-1".into(),
            actual: "eu-west-1".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("us-east-1"));
        assert!(msg.contains("eu-west-1"));
    }
}
