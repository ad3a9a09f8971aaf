//! Installer orchestration.
//!
//! [`Installer`] exposes every provisioning operation as a method and walks
//! them in [`InstallStep`] order in [`Installer::run_to_completion`].

use std::time::Duration;

use tracing::{debug, info};

use crate::aws::{AwsCredentials, Bucket, BucketCors};
use crate::command::CommandRunner;
use crate::config::Config;
use crate::convox::{self, App, Rack, Registry};
use crate::error::Result;
use crate::paths::Paths;
use crate::poller::{poll_until_elapsed, PollPolicy};
use crate::reconcile::{reconcile, StepOutcome};
use crate::require_config;
use crate::state::InstallStep;
use crate::templates::{TemplateData, Templates, TerraformFile, TerraformFileStep};
use crate::terraform::{self, cache_url, database_url, TerraformState};
use crate::ui;

/// Cheap health check served before the database is migrated.
pub const MINIMAL_HEALTH_CHECK_PATH: &str = "/health/site";

/// Full health check, promoted once the database is ready.
pub const COMPLETE_HEALTH_CHECK_PATH: &str = "/health";

/// Poll bounds for each kind of resource.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub rack_install: PollPolicy,
    pub rack_api: PollPolicy,
    pub app: PollPolicy,
    pub registry: PollPolicy,
    pub bucket: PollPolicy,
    pub bucket_cors: PollPolicy,
    pub terraform_file: PollPolicy,
    pub http_timeout: Duration,
    pub http_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            rack_install: PollPolicy::new(10, Duration::from_secs(5)),
            rack_api: PollPolicy::new(10, Duration::from_secs(5)),
            app: PollPolicy::new(5, Duration::from_secs(3)),
            registry: PollPolicy::new(5, Duration::from_secs(3)),
            bucket: PollPolicy::new(10, Duration::from_secs(3)),
            bucket_cors: PollPolicy::new(5, Duration::from_secs(3)),
            terraform_file: PollPolicy::new(3, Duration::from_secs(1)),
            http_timeout: Duration::from_secs(600),
            http_interval: Duration::from_secs(5),
        }
    }
}

impl PollSettings {
    /// Same attempt bounds without any sleeping.
    #[must_use]
    pub fn immediate() -> Self {
        let d = Self::default();
        Self {
            rack_install: d.rack_install.immediate(),
            rack_api: d.rack_api.immediate(),
            app: d.app.immediate(),
            registry: d.registry.immediate(),
            bucket: d.bucket.immediate(),
            bucket_cors: d.bucket_cors.immediate(),
            terraform_file: d.terraform_file.immediate(),
            http_timeout: Duration::ZERO,
            http_interval: Duration::ZERO,
        }
    }
}

/// Checks whether a URL answers with a 2xx status.
pub trait HttpProbe {
    fn is_ok(&self, url: &str) -> bool;
}

/// [`HttpProbe`] backed by a blocking `reqwest` client.
pub struct ReqwestProbe {
    client: reqwest::blocking::Client,
}

impl ReqwestProbe {
    /// # Errors
    ///
    /// Returns `Http` if the client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

impl HttpProbe for ReqwestProbe {
    fn is_ok(&self, url: &str) -> bool {
        match self.client.get(url).send() {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                info!(url, error = %e, "Not reachable yet");
                false
            }
        }
    }
}

/// Connection details for the uploads bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3BucketDetails {
    pub name: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Main installer struct that orchestrates the full installation process.
pub struct Installer<'a> {
    config: Config,
    paths: Paths,
    runner: &'a dyn CommandRunner,
    poll: PollSettings,
    templates: Templates,
    probe: Box<dyn HttpProbe>,
    domain: Option<String>,
}

impl<'a> Installer<'a> {
    /// Create an installer over a collected configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded templates or HTTP client fail to
    /// initialise.
    pub fn new(config: Config, paths: Paths, runner: &'a dyn CommandRunner) -> Result<Self> {
        Ok(Self {
            config,
            paths,
            runner,
            poll: PollSettings::default(),
            templates: Templates::new()?,
            probe: Box::new(ReqwestProbe::new()?),
            domain: None,
        })
    }

    #[must_use]
    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    #[must_use]
    pub fn with_http_probe(mut self, probe: impl HttpProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Run installation to completion.
    ///
    /// Every step is idempotent, so on failure the operator re-runs the
    /// installer and finished steps are skipped by their existence checks.
    ///
    /// # Errors
    ///
    /// Returns the first step error.
    pub fn run_to_completion(&mut self) -> Result<()> {
        ui::print_section("Starting Installation");

        let mut step = InstallStep::NotStarted.next();
        while step != InstallStep::Complete {
            ui::print_progress_step(step.step_number(), InstallStep::TOTAL_STEPS, step.description());

            if let Err(e) = self.execute_step(step) {
                debug!(step = ?step, error = %e, "Step failed");
                ui::print_warning(&format!(
                    "Stopped at step {}/{}: {}",
                    step.step_number(),
                    InstallStep::TOTAL_STEPS,
                    step.description()
                ));
                return Err(e);
            }
            step = step.next();
        }

        self.print_success_summary();
        Ok(())
    }

    fn execute_step(&mut self, step: InstallStep) -> Result<()> {
        info!(step = ?step, "Executing step");

        match step {
            InstallStep::NotStarted | InstallStep::Complete => {}
            InstallStep::BackingUpConvoxConfig => self.backup_convox_host_and_rack()?,
            InstallStep::InstallingRack => ui::print_outcome("Rack", self.install_convox()?),
            InstallStep::ValidatingRack => self.validate_convox_rack_api()?,
            InstallStep::CreatingApp => {
                ui::print_outcome("App", self.create_convox_app()?);
                self.set_default_app_for_directory()?;
            }
            InstallStep::AddingRegistry => ui::print_outcome("Registry", self.add_docker_registry()?),
            InstallStep::CreatingBucket => ui::print_outcome("S3 bucket", self.create_s3_bucket()?),
            InstallStep::ConfiguringBucketCors => {
                ui::print_outcome("CORS policy", self.set_s3_bucket_cors_policy()?);
            }
            InstallStep::WritingS3Access => {
                ui::print_outcome("s3_access.tf", self.write_terraform_file(TerraformFile::S3Access)?);
            }
            InstallStep::WritingDatabase => {
                ui::print_outcome("database.tf", self.write_terraform_file(TerraformFile::Database)?);
            }
            InstallStep::WritingCache => {
                ui::print_outcome("cache.tf", self.write_terraform_file(TerraformFile::Cache)?);
            }
            InstallStep::ApplyingTerraform => self.apply_terraform()?,
            InstallStep::SettingAppEnvironment => {
                let env = self.app_environment()?;
                self.set_app_environment(&env)?;
            }
            InstallStep::DeployingApp => self.deploy_app()?,
            InstallStep::SettingUpDatabase => self.setup_database()?,
            InstallStep::SettingDomainName => {
                let domain = self.set_domain_name()?;
                ui::print_kv("Domain", &domain);
            }
            InstallStep::PromotingHealthCheck => self.promote_health_check()?,
            InstallStep::WaitingForApp => {
                let domain = match self.domain.clone() {
                    Some(domain) => domain,
                    None => self.default_service_domain_name()?,
                };
                self.wait_for_http_ok(&format!("https://{domain}"))?;
                self.domain = Some(domain);
            }
        }
        Ok(())
    }

    fn stack_name(&self) -> Result<&str> {
        self.config.get("stack_name")
    }

    fn app_name(&self) -> Result<&str> {
        self.config.get("convox_app_name")
    }

    fn aws_credentials(&self) -> Result<AwsCredentials> {
        require_config!(
            self.config,
            "aws_access_key_id",
            "aws_secret_access_key",
            "aws_region"
        )?;
        Ok(AwsCredentials {
            access_key_id: self.config.get("aws_access_key_id")?.to_string(),
            secret_access_key: self.config.get("aws_secret_access_key")?.to_string(),
            region: self.config.get("aws_region")?.to_string(),
        })
    }

    /// Move the convox CLI's `host` and `rack` files to `.bak`.
    ///
    /// # Errors
    ///
    /// Returns an error if a rename fails.
    pub fn backup_convox_host_and_rack(&self) -> Result<()> {
        for backup in convox::backup_host_and_rack(&self.paths.convox_dir)? {
            ui::print_info(&format!("Moved existing convox config to {}", backup.display()));
        }
        Ok(())
    }

    /// Install the rack if its directory is missing, then point the CLI at it.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfig` before running anything if a key is absent.
    pub fn install_convox(&self) -> Result<StepOutcome> {
        require_config!(
            self.config,
            "stack_name",
            "aws_region",
            "instance_type",
            "aws_access_key_id",
            "aws_secret_access_key"
        )?;
        let stack_name = self.stack_name()?;

        let outcome = reconcile(&Rack {
            runner: self.runner,
            paths: &self.paths,
            stack_name,
            region: self.config.get("aws_region")?,
            instance_type: self.config.get("instance_type")?,
            access_key_id: self.config.get("aws_access_key_id")?,
            secret_access_key: self.config.get("aws_secret_access_key")?,
            policy: self.poll.rack_install,
        })?;

        convox::write_current(&self.paths, stack_name)?;
        Ok(outcome)
    }

    /// Wait for the rack API and check its provider and region.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` or `ValidationMismatch`.
    pub fn validate_convox_rack_api(&self) -> Result<()> {
        require_config!(self.config, "stack_name", "aws_region")?;
        convox::validate_rack_api(
            self.runner,
            self.stack_name()?,
            self.config.get("aws_region")?,
            self.poll.rack_api,
        )
    }

    /// Create the app unless it is already running.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfig`, `CommandFailed` or `Timeout`.
    pub fn create_convox_app(&self) -> Result<StepOutcome> {
        require_config!(self.config, "stack_name", "convox_app_name")?;
        reconcile(&App {
            runner: self.runner,
            stack_name: self.stack_name()?,
            name: self.app_name()?,
            policy: self.poll.app,
        })
    }

    /// Make convox commands in the working directory default to the app.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn set_default_app_for_directory(&self) -> Result<()> {
        convox::set_default_app_for_directory(&self.paths, self.app_name()?)
    }

    /// Attach the private docker registry unless already attached.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfig`, `CommandFailed` or `Timeout`.
    pub fn add_docker_registry(&self) -> Result<StepOutcome> {
        require_config!(
            self.config,
            "stack_name",
            "docker_registry_url",
            "docker_registry_username",
            "docker_registry_password"
        )?;
        reconcile(&Registry {
            runner: self.runner,
            stack_name: self.stack_name()?,
            url: self.config.get("docker_registry_url")?,
            username: self.config.get("docker_registry_username")?,
            password: self.config.get("docker_registry_password")?,
            policy: self.poll.registry,
        })
    }

    /// Create the uploads bucket unless it exists.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfig`, `CommandFailed` or `Timeout`.
    pub fn create_s3_bucket(&self) -> Result<StepOutcome> {
        require_config!(self.config, "s3_bucket_name")?;
        let credentials = self.aws_credentials()?;
        reconcile(&Bucket {
            runner: self.runner,
            credentials: &credentials,
            name: self.config.get("s3_bucket_name")?,
            policy: self.poll.bucket,
        })
    }

    /// Apply the configured CORS policy unless the live one is equivalent.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfig`, `InvalidConfig`, `CommandFailed` or `Timeout`.
    pub fn set_s3_bucket_cors_policy(&self) -> Result<StepOutcome> {
        require_config!(self.config, "s3_bucket_name", "s3_bucket_cors_policy")?;
        let credentials = self.aws_credentials()?;
        reconcile(&BucketCors {
            runner: self.runner,
            credentials: &credentials,
            bucket: self.config.get("s3_bucket_name")?,
            desired: BucketCors::parse_policy(self.config.get("s3_bucket_cors_policy")?)?,
            policy: self.poll.bucket_cors,
        })
    }

    /// Render `file` into the rack directory unless it is already current.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfig`, `Template` or an IO error.
    pub fn write_terraform_file(&self, file: TerraformFile) -> Result<StepOutcome> {
        let data = TemplateData::from_config(&self.config)?;
        reconcile(&TerraformFileStep {
            path: self.paths.rack_dir(&data.stack_name).join(file.file_name()),
            content: self.templates.render(file, &data)?,
            policy: self.poll.terraform_file,
        })
    }

    /// Run `terraform init` and `terraform apply` once in the rack directory.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` on any non-zero exit. Never retried.
    pub fn apply_terraform(&self) -> Result<()> {
        require_config!(
            self.config,
            "stack_name",
            "aws_access_key_id",
            "aws_secret_access_key"
        )?;
        terraform::apply(
            self.runner,
            &self.paths.rack_dir(self.stack_name()?),
            self.config.get("aws_access_key_id")?,
            self.config.get("aws_secret_access_key")?,
        )
    }

    /// Parsed `terraform.tfstate` of the rack.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file is missing or invalid.
    pub fn terraform_state(&self) -> Result<TerraformState> {
        TerraformState::load(&self.paths.terraform_state(self.stack_name()?))
    }

    /// Bucket name and the access key created for it.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the access key is not in state.
    pub fn s3_bucket_details(&self) -> Result<S3BucketDetails> {
        require_config!(self.config, "stack_name", "s3_bucket_name")?;
        let key = self
            .terraform_state()?
            .resource("aws_iam_access_key", "uploads")?;
        Ok(S3BucketDetails {
            name: self.config.get("s3_bucket_name")?.to_string(),
            access_key_id: key.attribute("id")?,
            secret_access_key: key.attribute("secret")?,
        })
    }

    /// `postgres://` URL of the app database.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` or `MissingAttribute`.
    pub fn rds_details(&self) -> Result<String> {
        database_url(
            &self
                .terraform_state()?
                .resource("aws_db_instance", "app_database")?,
        )
    }

    /// `redis://` URL of the app cache.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` or `MissingAttribute`.
    pub fn elasticache_details(&self) -> Result<String> {
        cache_url(
            &self
                .terraform_state()?
                .resource("aws_elasticache_cluster", "app_cache")?,
        )
    }

    /// Environment variables the app is configured with.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfig` or a terraform state error.
    pub fn app_environment(&self) -> Result<Vec<(String, String)>> {
        require_config!(
            self.config,
            "aws_region",
            "admin_email",
            "admin_password",
            "secret_key_base",
            "data_encryption_key"
        )?;
        let bucket = self.s3_bucket_details()?;

        Ok(vec![
            ("HEALTH_CHECK_PATH".into(), MINIMAL_HEALTH_CHECK_PATH.into()),
            ("DATABASE_URL".into(), self.rds_details()?),
            ("REDIS_URL".into(), self.elasticache_details()?),
            ("AWS_ACCESS_KEY_ID".into(), bucket.access_key_id),
            ("AWS_ACCESS_KEY_SECRET".into(), bucket.secret_access_key),
            ("AWS_UPLOADS_S3_BUCKET".into(), bucket.name),
            ("AWS_UPLOADS_S3_REGION".into(), self.config.get("aws_region")?.into()),
            ("SECRET_KEY_BASE".into(), self.config.get("secret_key_base")?.into()),
            ("DATA_ENCRYPTION_KEY".into(), self.config.get("data_encryption_key")?.into()),
            ("ADMIN_NAME".into(), "Admin".into()),
            ("ADMIN_EMAIL".into(), self.config.get("admin_email")?.into()),
            ("ADMIN_PASSWORD".into(), self.config.get("admin_password")?.into()),
        ])
    }

    /// Set `vars` on the app.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` if convox rejects the change.
    pub fn set_app_environment(&self, vars: &[(String, String)]) -> Result<()> {
        require_config!(self.config, "stack_name", "convox_app_name")?;
        convox::set_environment(self.runner, self.stack_name()?, self.app_name()?, vars)
    }

    /// Deploy the app from the working directory.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` if the deploy fails.
    pub fn deploy_app(&self) -> Result<()> {
        require_config!(self.config, "stack_name", "convox_app_name")?;
        convox::deploy(
            self.runner,
            self.stack_name()?,
            self.app_name()?,
            &self.paths.workdir,
        )
    }

    /// Run `convox <args>` against the app from the working directory.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfig` or `CommandFailed`.
    pub fn run_convox_command(&self, args: &[&str]) -> Result<()> {
        require_config!(self.config, "stack_name", "convox_app_name")?;
        convox::run_command(
            self.runner,
            self.stack_name()?,
            self.app_name()?,
            &self.paths.workdir,
            args,
        )
    }

    /// Create, migrate and seed the database in a one-off process.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` if any rake task fails.
    pub fn setup_database(&self) -> Result<()> {
        require_config!(self.config, "default_service")?;
        let service = self.config.get("default_service")?;
        self.run_convox_command(&[
            "run",
            service,
            "rake",
            "db:create",
            "db:migrate",
            "db:seed",
        ])
    }

    /// Look up the service domain and set it as `DOMAIN_NAME` on the app.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` or `CommandFailed`.
    pub fn set_domain_name(&mut self) -> Result<String> {
        let domain = self.default_service_domain_name()?;
        self.set_app_environment(&[("DOMAIN_NAME".to_string(), domain.clone())])?;
        self.domain = Some(domain.clone());
        Ok(domain)
    }

    /// Switch the app to the complete health check and wait for the release.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` if the promotion fails.
    pub fn promote_health_check(&self) -> Result<()> {
        require_config!(self.config, "stack_name", "convox_app_name")?;
        convox::promote_environment(
            self.runner,
            self.stack_name()?,
            self.app_name()?,
            &[(
                "HEALTH_CHECK_PATH".to_string(),
                COMPLETE_HEALTH_CHECK_PATH.to_string(),
            )],
        )
    }

    /// Domain of the configured default service.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the service has no domain.
    pub fn default_service_domain_name(&self) -> Result<String> {
        require_config!(
            self.config,
            "stack_name",
            "convox_app_name",
            "default_service"
        )?;
        convox::service_domain(
            self.runner,
            self.stack_name()?,
            self.app_name()?,
            self.config.get("default_service")?,
        )
    }

    /// Wait until `url` answers with a 2xx status.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` once the configured wait has elapsed.
    pub fn wait_for_http_ok(&self, url: &str) -> Result<()> {
        let spinner = ui::Spinner::new(&format!("Waiting for {url}"));
        let result = poll_until_elapsed(url, self.poll.http_timeout, self.poll.http_interval, || {
            Ok(self.probe.is_ok(url))
        });
        match &result {
            Ok(elapsed) => spinner.finish(&format!("{url} is up after {}s", elapsed.as_secs())),
            Err(_) => spinner.fail(&format!("{url} did not respond")),
        }
        result.map(|_| ())
    }

    fn print_success_summary(&self) {
        ui::print_section("Installation Complete!");
        ui::print_success("Your Convox rack and app are ready.");

        if let Some(domain) = &self.domain {
            ui::print_kv("URL", &format!("https://{domain}"));
        }
        if let (Some(email), Some(password)) = (
            self.config.value("admin_email"),
            self.config.value("admin_password"),
        ) {
            ui::print_kv("Email", email);
            ui::print_kv("Password", password);
        }

        println!();
        ui::print_info("To deploy your changes, run: convox deploy --wait");
        ui::print_info(
            "The rack's terraform files are in the racks directory of your convox config.",
        );
        ui::print_warning(
            "Enable termination protection for the RDS and ElastiCache resources in the AWS console.",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstallerError;
    use crate::mock::{MockResponse, MockRunner};

    struct AlwaysUp;

    impl HttpProbe for AlwaysUp {
        fn is_ok(&self, _url: &str) -> bool {
            true
        }
    }

    struct NeverUp;

    impl HttpProbe for NeverUp {
        fn is_ok(&self, _url: &str) -> bool {
            false
        }
    }

    fn installer<'a>(
        dir: &tempfile::TempDir,
        runner: &'a MockRunner,
        values: &[(&str, &str)],
    ) -> Installer<'a> {
        let paths = Paths::new(dir.path().join("convox"), dir.path().join("src"));
        let mut config = Config::empty(paths.installer_config());
        for (k, v) in values {
            config.set(*k, *v).unwrap();
        }
        Installer::new(config, paths, runner)
            .unwrap()
            .with_poll_settings(PollSettings::immediate())
            .with_http_probe(AlwaysUp)
    }

    #[test]
    fn test_missing_config_fails_before_any_command() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        let installer = installer(&dir, &runner, &[("stack_name", "demo")]);

        let err = installer.install_convox().unwrap_err();
        assert!(matches!(err, InstallerError::MissingConfig(key) if key == "aws_region"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_wait_for_http_ok() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        let up = installer(&dir, &runner, &[]);
        up.wait_for_http_ok("https://web.example.com").unwrap();

        let down = installer(&dir, &runner, &[]).with_http_probe(NeverUp);
        assert!(matches!(
            down.wait_for_http_ok("https://web.example.com"),
            Err(InstallerError::Timeout { .. })
        ));
    }

    #[test]
    fn test_setup_database_runs_rake_in_workdir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockRunner::new().on("convox run", MockResponse::success(""));
        let installer = installer(
            &dir,
            &runner,
            &[
                ("stack_name", "demo"),
                ("convox_app_name", "convox-app"),
                ("default_service", "web"),
            ],
        );

        installer.setup_database().unwrap();
        let call = &runner.calls()[0];
        assert_eq!(
            call.to_string(),
            "convox run web rake db:create db:migrate db:seed --app convox-app --rack demo"
        );
        assert_eq!(call.cwd.as_deref(), Some(dir.path().join("src").as_path()));
    }

    #[test]
    fn test_run_convox_command_requires_app() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        let installer = installer(&dir, &runner, &[("stack_name", "demo")]);

        let err = installer.run_convox_command(&["ps"]).unwrap_err();
        assert!(matches!(err, InstallerError::MissingConfig(key) if key == "convox_app_name"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_cors_policy_must_be_json() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        let installer = installer(
            &dir,
            &runner,
            &[
                ("aws_region", "us-east-1"),
                ("aws_access_key_id", "A"),
                ("aws_secret_access_key", "B"),
                ("s3_bucket_name", "app-uploads-1234"),
                ("s3_bucket_cors_policy", "cors_rule {}"),
            ],
        );
        assert!(matches!(
            installer.set_s3_bucket_cors_policy(),
            Err(InstallerError::InvalidConfig(_))
        ));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_state_details() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        let installer = installer(
            &dir,
            &runner,
            &[("stack_name", "demo"), ("s3_bucket_name", "app-uploads-1234")],
        );

        assert!(installer.s3_bucket_details().is_err());

        let state_path = installer.paths().terraform_state("demo");
        std::fs::create_dir_all(state_path.parent().unwrap()).unwrap();
        std::fs::write(
            &state_path,
            r#"{ "resources": [
                { "type": "aws_iam_access_key", "name": "uploads",
                  "instances": [ { "attributes": { "id": "AKIA", "secret": "shh" } } ] }
            ] }"#,
        )
        .unwrap();

        assert_eq!(
            installer.s3_bucket_details().unwrap(),
            S3BucketDetails {
                name: "app-uploads-1234".into(),
                access_key_id: "AKIA".into(),
                secret_access_key: "shh".into(),
            }
        );
        assert!(matches!(
            installer.rds_details(),
            Err(InstallerError::ResourceNotFound { .. })
        ));
    }
}
