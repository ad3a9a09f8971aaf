//! Checks that the command line tools the installer drives are installed.

use std::path::PathBuf;

use colored::Colorize;
use tracing::debug;

use crate::error::{InstallerError, Result};
use crate::paths::Platform;
use crate::ui;

/// A required command line tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Executable name.
    pub name: &'static str,
    /// Homebrew formula providing it.
    pub brew: &'static str,
    /// Installation documentation.
    pub docs: &'static str,
}

/// Tools every installation needs.
pub const REQUIREMENTS: [Requirement; 3] = [
    Requirement {
        name: "convox",
        brew: "convox",
        docs: "https://docs.convox.com/getting-started/introduction",
    },
    Requirement {
        name: "aws",
        brew: "awscli",
        docs: "https://docs.aws.amazon.com/cli/latest/userguide/cli-chap-install.html",
    },
    Requirement {
        name: "terraform",
        brew: "terraform",
        docs: "https://developer.hashicorp.com/terraform/install",
    },
];

/// Validates that required tools can be found.
pub struct RequirementsValidator {
    requirements: Vec<Requirement>,
    platform: Platform,
    find: Box<dyn Fn(&str) -> Option<PathBuf>>,
}

impl RequirementsValidator {
    /// Validator that searches `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lookup(Platform::current(), |name| which::which(name).ok())
    }

    /// Validator with an explicit platform and lookup.
    pub fn with_lookup(
        platform: Platform,
        find: impl Fn(&str) -> Option<PathBuf> + 'static,
    ) -> Self {
        Self {
            requirements: REQUIREMENTS.to_vec(),
            platform,
            find: Box::new(find),
        }
    }

    fn lookup(&self) -> Vec<(&Requirement, Option<PathBuf>)> {
        self.requirements
            .iter()
            .map(|req| {
                let found = (self.find)(req.name);
                debug!(command = req.name, found = ?found, "Looked up command");
                (req, found)
            })
            .collect()
    }

    /// Check every requirement and print the result.
    ///
    /// # Errors
    ///
    /// Returns `MissingRequirements` listing every missing tool, with
    /// install instructions for the platform.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        for (req, found) in self.lookup() {
            ui::print_tool_check(req.name, found.as_deref());
            if found.is_none() {
                missing.push(req);
            }
        }

        if missing.is_empty() {
            return Ok(());
        }

        let instructions = match self.platform {
            Platform::MacOs => format!(
                "Please run: brew install {}",
                missing.iter().map(|r| r.brew).collect::<Vec<_>>().join(" ")
            ),
            Platform::Other => {
                let mut lines = vec!["Installation Instructions:".to_string()];
                lines.extend(missing.iter().map(|r| format!("* {}: {}", r.name, r.docs)));
                lines.join("\n")
            }
        };
        println!("  {}", instructions.bright_black());

        Err(InstallerError::MissingRequirements {
            missing: missing.iter().map(|r| r.name.to_string()).collect(),
            instructions,
        })
    }
}

/// Check that every required tool is on `PATH`.
///
/// # Errors
///
/// Returns `MissingRequirements` listing every missing tool.
pub fn ensure_requirements() -> Result<()> {
    RequirementsValidator::new().validate()
}

impl Default for RequirementsValidator {
    fn default() -> Self {
        Self::new()
    }
}
