//! Convox Installer Library.
//!
//! Interactive, re-runnable provisioning of a Convox rack on AWS together
//! with an application and its backing services (S3 uploads bucket, RDS
//! database, ElastiCache cluster).
//!
//! Configuration is collected once by [`PromptEngine`] into a [`Config`]
//! that persists after every answer. [`Installer`] then runs each
//! provisioning step as check, create, poll. A step whose resource already
//! exists is skipped, so a failed run is recovered by running it again.
//!
//! # Example
//!
//! ```no_run
//! use convox_installer::{
//!     config::{config_keys, full_installation_prompts},
//!     Config, DialoguerPrompter, Installer, Paths, PromptEngine, SystemRunner,
//! };
//!
//! fn main() -> convox_installer::Result<()> {
//!     let paths = Paths::detect()?;
//!     let prompts = full_installation_prompts();
//!     let mut config = Config::load(
//!         paths.installer_config(),
//!         &config_keys(&prompts),
//!         &Default::default(),
//!     )?;
//!
//!     let prompter = DialoguerPrompter::default();
//!     PromptEngine::new(&prompter).prompt_for_config(&prompts, &mut config)?;
//!
//!     Installer::new(config, paths, &SystemRunner)?.run_to_completion()
//! }
//! ```

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

pub mod aws;
pub mod command;
pub mod config;
pub mod convox;
pub mod error;
pub mod mock;
pub mod orchestrator;
pub mod paths;
pub mod poller;
pub mod prompt;
pub mod reconcile;
pub mod requirements;
pub mod state;
pub mod templates;
pub mod terraform;
pub mod ui;

// Re-export commonly used types at the crate root
pub use command::{Command, CommandRunner, SystemRunner};
pub use config::{Config, PromptSpec};
pub use error::{InstallerError, Result};
pub use orchestrator::{Installer, PollSettings};
pub use paths::Paths;
pub use poller::PollPolicy;
pub use prompt::{DialoguerPrompter, PromptEngine, Prompter};
pub use reconcile::{reconcile, ProvisioningStep, StepOutcome};
pub use requirements::RequirementsValidator;
pub use state::InstallStep;
