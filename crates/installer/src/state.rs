//! The fixed installation sequence.
//!
//! No step pointer is persisted. A re-run starts from the beginning and every
//! step's existence check turns already-completed work into a no-op.

use serde::{Deserialize, Serialize};

/// Installation steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStep {
    /// Not yet started.
    NotStarted,
    /// Moving stale convox `host`/`rack` files aside.
    BackingUpConvoxConfig,
    /// Installing the convox rack.
    InstallingRack,
    /// Waiting for the rack API and checking where it runs.
    ValidatingRack,
    /// Creating the convox app.
    CreatingApp,
    /// Attaching the private docker registry.
    AddingRegistry,
    /// Creating the uploads bucket.
    CreatingBucket,
    /// Applying the uploads bucket CORS policy.
    ConfiguringBucketCors,
    /// Writing the IAM user and bucket policy.
    WritingS3Access,
    /// Writing the RDS database resource.
    WritingDatabase,
    /// Writing the ElastiCache resource.
    WritingCache,
    /// Running terraform apply.
    ApplyingTerraform,
    /// Injecting connection details into the app environment.
    SettingAppEnvironment,
    /// Deploying the app.
    DeployingApp,
    /// Creating, migrating and seeding the app database.
    SettingUpDatabase,
    /// Looking up the default service domain and handing it to the app.
    SettingDomainName,
    /// Switching to the health check that also covers the database.
    PromotingHealthCheck,
    /// Waiting for the app to answer HTTP requests.
    WaitingForApp,
    /// Installation complete.
    Complete,
}

impl InstallStep {
    /// Get the next step in the sequence.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::NotStarted => Self::BackingUpConvoxConfig,
            Self::BackingUpConvoxConfig => Self::InstallingRack,
            Self::InstallingRack => Self::ValidatingRack,
            Self::ValidatingRack => Self::CreatingApp,
            Self::CreatingApp => Self::AddingRegistry,
            Self::AddingRegistry => Self::CreatingBucket,
            Self::CreatingBucket => Self::ConfiguringBucketCors,
            Self::ConfiguringBucketCors => Self::WritingS3Access,
            Self::WritingS3Access => Self::WritingDatabase,
            Self::WritingDatabase => Self::WritingCache,
            Self::WritingCache => Self::ApplyingTerraform,
            Self::ApplyingTerraform => Self::SettingAppEnvironment,
            Self::SettingAppEnvironment => Self::DeployingApp,
            Self::DeployingApp => Self::SettingUpDatabase,
            Self::SettingUpDatabase => Self::SettingDomainName,
            Self::SettingDomainName => Self::PromotingHealthCheck,
            Self::PromotingHealthCheck => Self::WaitingForApp,
            Self::WaitingForApp | Self::Complete => Self::Complete,
        }
    }

    /// Get a human-readable description of the step.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::BackingUpConvoxConfig => "Backing up convox host and rack files",
            Self::InstallingRack => "Installing Convox rack",
            Self::ValidatingRack => "Validating rack API",
            Self::CreatingApp => "Creating Convox app",
            Self::AddingRegistry => "Adding Docker registry",
            Self::CreatingBucket => "Creating S3 bucket for uploads",
            Self::ConfiguringBucketCors => "Configuring S3 bucket CORS policy",
            Self::WritingS3Access => "Writing S3 access resources",
            Self::WritingDatabase => "Writing database resources",
            Self::WritingCache => "Writing cache resources",
            Self::ApplyingTerraform => "Applying terraform",
            Self::SettingAppEnvironment => "Setting app environment",
            Self::DeployingApp => "Deploying app",
            Self::SettingUpDatabase => "Setting up the database",
            Self::SettingDomainName => "Setting domain name",
            Self::PromotingHealthCheck => "Promoting complete health check",
            Self::WaitingForApp => "Waiting for app to respond",
            Self::Complete => "Complete",
        }
    }

    /// Get the step number for progress display.
    #[must_use]
    pub fn step_number(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::BackingUpConvoxConfig => 1,
            Self::InstallingRack => 2,
            Self::ValidatingRack => 3,
            Self::CreatingApp => 4,
            Self::AddingRegistry => 5,
            Self::CreatingBucket => 6,
            Self::ConfiguringBucketCors => 7,
            Self::WritingS3Access => 8,
            Self::WritingDatabase => 9,
            Self::WritingCache => 10,
            Self::ApplyingTerraform => 11,
            Self::SettingAppEnvironment => 12,
            Self::DeployingApp => 13,
            Self::SettingUpDatabase => 14,
            Self::SettingDomainName => 15,
            Self::PromotingHealthCheck => 16,
            Self::WaitingForApp => 17,
            Self::Complete => 18,
        }
    }

    /// Total number of steps.
    pub const TOTAL_STEPS: u8 = 18;
}

impl std::fmt::Display for InstallStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_progression() {
        let mut step = InstallStep::NotStarted;
        let mut steps = vec![step];

        while step != InstallStep::Complete {
            step = step.next();
            steps.push(step);
        }

        assert_eq!(steps.last(), Some(&InstallStep::Complete));
        assert_eq!(InstallStep::Complete.next(), InstallStep::Complete);
        // Every step appears once and numbers increase by one.
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(usize::from(step.step_number()), i);
        }
    }

    #[test]
    fn test_step_numbers() {
        assert_eq!(InstallStep::NotStarted.step_number(), 0);
        assert_eq!(
            InstallStep::Complete.step_number(),
            InstallStep::TOTAL_STEPS
        );
    }

    #[test]
    fn test_order_matches_sequence() {
        assert!(InstallStep::InstallingRack < InstallStep::CreatingApp);
        assert!(InstallStep::WritingCache < InstallStep::ApplyingTerraform);
        assert_eq!(InstallStep::DeployingApp.next(), InstallStep::SettingUpDatabase);
        assert_eq!(InstallStep::PromotingHealthCheck.next(), InstallStep::WaitingForApp);
        assert_eq!(InstallStep::ApplyingTerraform.to_string(), "Applying terraform");
    }
}
