//! Terraform resource files for the application's AWS resources.
//!
//! Templates are embedded at compile time and rendered with `handlebars` into
//! the rack's terraform directory, next to the files convox generates.

use std::path::PathBuf;

use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use crate::config::{write_atomically, Config};
use crate::error::Result;
use crate::poller::PollPolicy;
use crate::reconcile::ProvisioningStep;

const DATABASE_NAME: &str = "app_production";
const DATABASE_ALLOCATED_STORAGE_GB: u32 = 20;

/// A terraform file the installer manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerraformFile {
    /// IAM user, access key and bucket policy for uploads.
    S3Access,
    /// `aws_db_instance.app_database`.
    Database,
    /// `aws_elasticache_cluster.app_cache`.
    Cache,
}

impl TerraformFile {
    pub const ALL: [Self; 3] = [Self::S3Access, Self::Database, Self::Cache];

    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::S3Access => "s3_access.tf",
            Self::Database => "database.tf",
            Self::Cache => "cache.tf",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Self::S3Access => include_str!("../templates/s3_access.tf.hbs"),
            Self::Database => include_str!("../templates/database.tf.hbs"),
            Self::Cache => include_str!("../templates/cache.tf.hbs"),
        }
    }
}

/// Values substituted into the templates.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateData {
    pub stack_name: String,
    pub s3_bucket_name: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,
    pub database_instance_class: String,
    pub database_allocated_storage: u32,
    pub cache_node_type: String,
}

impl TemplateData {
    /// Collect template values from configuration.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfig` for the first absent key.
    pub fn from_config(config: &Config) -> Result<Self> {
        crate::require_config!(
            config,
            "stack_name",
            "s3_bucket_name",
            "database_username",
            "database_password",
            "database_instance_class",
            "cache_node_type",
        )?;

        Ok(Self {
            stack_name: config.get("stack_name")?.to_string(),
            s3_bucket_name: config.get("s3_bucket_name")?.to_string(),
            database_name: DATABASE_NAME.to_string(),
            database_username: config.get("database_username")?.to_string(),
            database_password: config.get("database_password")?.to_string(),
            database_instance_class: config.get("database_instance_class")?.to_string(),
            database_allocated_storage: DATABASE_ALLOCATED_STORAGE_GB,
            cache_node_type: config.get("cache_node_type")?.to_string(),
        })
    }
}

/// Compiled terraform templates.
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    /// Compile every embedded template.
    ///
    /// # Errors
    ///
    /// Returns `TemplateSyntax` if an embedded template does not parse.
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        for file in TerraformFile::ALL {
            registry.register_template_string(file.file_name(), file.source())?;
        }
        Ok(Self { registry })
    }

    /// Render one file.
    ///
    /// # Errors
    ///
    /// Returns `Template` if a referenced value is missing.
    pub fn render(&self, file: TerraformFile, data: &TemplateData) -> Result<String> {
        Ok(self.registry.render(file.file_name(), data)?)
    }
}

/// A rendered terraform file in the rack directory.
///
/// Exists when the file on disk is byte-identical to `content`.
pub struct TerraformFileStep {
    pub path: PathBuf,
    pub content: String,
    pub policy: PollPolicy,
}

impl ProvisioningStep for TerraformFileStep {
    fn name(&self) -> String {
        format!("terraform file {}", self.path.display())
    }

    fn exists(&self) -> Result<bool> {
        match std::fs::read(&self.path) {
            Ok(current) => Ok(current == self.content.as_bytes()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn create(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        debug!(path = %self.path.display(), "Writing terraform file");
        write_atomically(&self.path, self.content.as_bytes())
    }

    fn poll_policy(&self) -> PollPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::reconcile::{reconcile, StepOutcome};

    fn data() -> TemplateData {
        TemplateData {
            stack_name: "demo".into(),
            s3_bucket_name: "app-uploads-1234".into(),
            database_name: DATABASE_NAME.into(),
            database_username: "example_app".into(),
            database_password: "p@ss&word".into(),
            database_instance_class: "db.t3.small".into(),
            database_allocated_storage: 20,
            cache_node_type: "cache.t3.micro".into(),
        }
    }

    #[test]
    fn test_render_all_templates() {
        let templates = Templates::new().unwrap();

        let s3 = templates.render(TerraformFile::S3Access, &data()).unwrap();
        assert!(s3.contains(r#"resource "aws_iam_access_key" "uploads""#));
        assert!(s3.contains("arn:aws:s3:::app-uploads-1234/*"));

        let db = templates.render(TerraformFile::Database, &data()).unwrap();
        assert!(db.contains(r#"resource "aws_db_instance" "app_database""#));
        assert!(db.contains("allocated_storage         = 20"));
        // HCL, not HTML: no entity escaping.
        assert!(db.contains(r#"password                  = "p@ss&word""#));

        let cache = templates.render(TerraformFile::Cache, &data()).unwrap();
        assert!(cache.contains(r#"node_type       = "cache.t3.micro""#));
        assert!(cache.contains(r#"cluster_id      = "demo-app-cache""#));
    }

    #[test]
    fn test_from_config_requires_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::empty(dir.path().join("installer_config"));
        config.set("stack_name", "demo").unwrap();
        assert!(matches!(
            TemplateData::from_config(&config),
            Err(crate::error::InstallerError::MissingConfig(key)) if key == "s3_bucket_name"
        ));
    }

    #[test]
    fn test_file_step_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let step = TerraformFileStep {
            path: dir.path().join("racks").join("demo").join("cache.tf"),
            content: "resource {}\n".into(),
            policy: PollPolicy::new(3, Duration::ZERO),
        };

        assert_eq!(reconcile(&step).unwrap(), StepOutcome::Created { checks: 1 });
        assert_eq!(std::fs::read_to_string(&step.path).unwrap(), "resource {}\n");
        assert_eq!(reconcile(&step).unwrap(), StepOutcome::AlreadyExists);
    }

    #[test]
    fn test_changed_content_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.tf");
        std::fs::write(&path, "old").unwrap();
        let step = TerraformFileStep {
            path: path.clone(),
            content: "new".into(),
            policy: PollPolicy::new(3, Duration::ZERO),
        };
        assert!(!step.exists().unwrap());
        reconcile(&step).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }
}
