//! File system locations used by the installer.
//!
//! Computed once at startup and passed to the components that need them.

use std::path::{Path, PathBuf};

use crate::error::{InstallerError, Result};

/// Host platform, as far as directory layout is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Other,
}

impl Platform {
    /// Detect the platform this binary was built for.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Other
        }
    }

    /// Convox CLI configuration directory relative to the home directory.
    #[must_use]
    pub fn convox_dir(self, home: &Path) -> PathBuf {
        match self {
            Self::MacOs => home.join("Library").join("Preferences").join("convox"),
            Self::Other => home.join(".config").join("convox"),
        }
    }
}

/// Resolved installer paths.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Convox CLI configuration directory.
    pub convox_dir: PathBuf,
    /// Directory in which the application's `.convox/app` is written.
    pub workdir: PathBuf,
}

impl Paths {
    /// Build paths from explicit directories.
    pub fn new(convox_dir: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            convox_dir: convox_dir.into(),
            workdir: workdir.into(),
        }
    }

    /// Detect paths for the current user and platform.
    ///
    /// # Errors
    ///
    /// Returns an error if the home or current directory cannot be determined.
    pub fn detect() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            InstallerError::InvalidConfig("Could not determine home directory".into())
        })?;
        let workdir = std::env::current_dir()?;
        Ok(Self::new(Platform::current().convox_dir(&home), workdir))
    }

    /// Saved installer answers.
    #[must_use]
    pub fn installer_config(&self) -> PathBuf {
        self.convox_dir.join("installer_config")
    }

    /// Pointer to the rack the convox CLI operates against.
    #[must_use]
    pub fn current_file(&self) -> PathBuf {
        self.convox_dir.join("current")
    }

    /// Directory holding one terraform directory per rack.
    #[must_use]
    pub fn racks_dir(&self) -> PathBuf {
        self.convox_dir.join("racks")
    }

    /// Terraform directory for a named rack.
    #[must_use]
    pub fn rack_dir(&self, stack_name: &str) -> PathBuf {
        self.racks_dir().join(stack_name)
    }

    /// Terraform state written by `terraform apply` in a rack directory.
    #[must_use]
    pub fn terraform_state(&self, stack_name: &str) -> PathBuf {
        self.rack_dir(stack_name).join("terraform.tfstate")
    }

    /// The `.convox/app` file that selects the default app for `workdir`.
    #[must_use]
    pub fn app_file(&self) -> PathBuf {
        self.workdir.join(".convox").join("app")
    }
}
