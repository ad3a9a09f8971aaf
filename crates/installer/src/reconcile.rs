//! Check, create, poll.
//!
//! Every external resource is brought to its desired state by the same
//! sequence: an existence check that never mutates anything, a single create
//! when the check fails, then bounded polling of the same check.

use std::fmt;

use tracing::info;

use crate::error::Result;
use crate::poller::{poll_until, PollPolicy};

/// An idempotent provisioning step.
pub trait ProvisioningStep {
    /// Human-readable identity, e.g. `app convox-app`.
    fn name(&self) -> String;

    /// Whether the resource already exists in its desired state.
    ///
    /// # Errors
    ///
    /// Returns an error if the check itself cannot be performed.
    fn exists(&self) -> Result<bool>;

    /// Issue the create or update. Called at most once per reconcile.
    ///
    /// # Errors
    ///
    /// Returns an error if the create command fails.
    fn create(&self) -> Result<()>;

    /// Bound for waiting on the resource after `create`.
    fn poll_policy(&self) -> PollPolicy;
}

/// How a reconciled step reached `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The first check found the resource.
    AlreadyExists,
    /// Created, then observed after `checks` polls.
    Created { checks: u32 },
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists => f.write_str("already exists"),
            Self::Created { .. } => f.write_str("created"),
        }
    }
}

/// Drive `step` to `Ready`.
///
/// # Errors
///
/// Propagates check and create errors. Returns `Timeout` if the resource is
/// not observed within the step's poll policy.
pub fn reconcile(step: &dyn ProvisioningStep) -> Result<StepOutcome> {
    let name = step.name();

    info!(step = %name, "Checking");
    if step.exists()? {
        info!(step = %name, "Already exists");
        return Ok(StepOutcome::AlreadyExists);
    }

    info!(step = %name, "Creating");
    step.create()?;

    let checks = poll_until(&name, step.poll_policy(), || step.exists())?;
    info!(step = %name, checks, "Ready");
    Ok(StepOutcome::Created { checks })
}
