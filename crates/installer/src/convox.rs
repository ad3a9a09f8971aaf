//! Convox rack, app and registry operations via the `convox` CLI.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::command::{Command, CommandRunner};
use crate::config::write_atomically;
use crate::error::{InstallerError, Result};
use crate::paths::Paths;
use crate::poller::{poll_until, PollPolicy};
use crate::reconcile::ProvisioningStep;

/// Provider a rack must report after installation.
const EXPECTED_PROVIDER: &str = "aws";
const RUNNING: &str = "running";

/// `convox api get <path> --rack <rack>`, parsed as `T`.
fn api_get<T>(runner: &dyn CommandRunner, path: &str, rack: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let command = Command::new("convox").args(["api", "get", path, "--rack", rack]);
    let stdout = runner.capture(&command)?;
    serde_json::from_str(&stdout).map_err(|e| InstallerError::UnexpectedOutput {
        command: command.to_string(),
        message: e.to_string(),
    })
}

/// The convox rack: installed when its terraform directory exists.
pub struct Rack<'a> {
    pub runner: &'a dyn CommandRunner,
    pub paths: &'a Paths,
    pub stack_name: &'a str,
    pub region: &'a str,
    pub instance_type: &'a str,
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub policy: PollPolicy,
}

impl ProvisioningStep for Rack<'_> {
    fn name(&self) -> String {
        format!("rack {}", self.stack_name)
    }

    fn exists(&self) -> Result<bool> {
        let dir = self.paths.rack_dir(self.stack_name);
        debug!(dir = %dir.display(), "Checking for rack directory");
        Ok(dir.is_dir())
    }

    fn create(&self) -> Result<()> {
        let command = Command::new("convox")
            .args(["rack", "install", "aws", self.stack_name])
            .arg(format!("region={}", self.region))
            .arg(format!("node_type={}", self.instance_type))
            .env("AWS_ACCESS_KEY_ID", self.access_key_id)
            .env("AWS_SECRET_ACCESS_KEY", self.secret_access_key)
            .env("AWS_DEFAULT_REGION", self.region);
        self.runner.run(&command)
    }

    fn poll_policy(&self) -> PollPolicy {
        self.policy
    }
}

#[derive(Debug, Deserialize)]
struct SystemInfo {
    #[serde(default)]
    status: String,
    #[serde(default)]
    provider: String,
    #[serde(default)]
    region: String,
}

/// Wait for the rack API to report `running`, then check provider and region.
///
/// # Errors
///
/// Returns `Timeout` if the rack never reports running, or
/// `ValidationMismatch` if it runs somewhere unexpected.
pub fn validate_rack_api(
    runner: &dyn CommandRunner,
    stack_name: &str,
    region: &str,
    policy: PollPolicy,
) -> Result<()> {
    let mut system: Option<SystemInfo> = None;
    poll_until(&format!("rack {stack_name} API"), policy, || {
        let info: SystemInfo = match api_get(runner, "/system", stack_name) {
            Ok(info) => info,
            // Unreachable or half-started API: not ready yet.
            Err(e @ (InstallerError::CommandFailed { .. } | InstallerError::UnexpectedOutput { .. })) => {
                debug!(error = %e, "Rack API not ready");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        let running = info.status == RUNNING;
        debug!(status = %info.status, "Rack status");
        system = Some(info);
        Ok(running)
    })?;

    let Some(system) = system else {
        return Ok(());
    };
    if system.provider != EXPECTED_PROVIDER {
        return Err(InstallerError::ValidationMismatch {
            what: "rack provider".into(),
            expected: EXPECTED_PROVIDER.into(),
            actual: system.provider,
        });
    }
    if system.region != region {
        return Err(InstallerError::ValidationMismatch {
            what: "rack region".into(),
            expected: region.into(),
            actual: system.region,
        });
    }

    info!(rack = stack_name, "Rack API is running");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct AppInfo {
    name: String,
    #[serde(default)]
    status: String,
}

/// A convox app, present once it reports `running`.
pub struct App<'a> {
    pub runner: &'a dyn CommandRunner,
    pub stack_name: &'a str,
    pub name: &'a str,
    pub policy: PollPolicy,
}

impl ProvisioningStep for App<'_> {
    fn name(&self) -> String {
        format!("app {}", self.name)
    }

    fn exists(&self) -> Result<bool> {
        let apps: Vec<AppInfo> = api_get(self.runner, "/apps", self.stack_name)?;
        Ok(apps
            .iter()
            .any(|app| app.name == self.name && app.status == RUNNING))
    }

    fn create(&self) -> Result<()> {
        self.runner.run(&Command::new("convox").args([
            "apps",
            "create",
            self.name,
            "--wait",
            "--rack",
            self.stack_name,
        ]))
    }

    fn poll_policy(&self) -> PollPolicy {
        self.policy
    }
}

#[derive(Debug, Deserialize)]
struct RegistryInfo {
    server: String,
}

/// A private docker registry attached to the rack.
pub struct Registry<'a> {
    pub runner: &'a dyn CommandRunner,
    pub stack_name: &'a str,
    pub url: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub policy: PollPolicy,
}

impl ProvisioningStep for Registry<'_> {
    fn name(&self) -> String {
        format!("registry {}", self.url)
    }

    fn exists(&self) -> Result<bool> {
        let registries: Vec<RegistryInfo> =
            api_get(self.runner, "/registries", self.stack_name)?;
        Ok(registries.iter().any(|r| r.server == self.url))
    }

    fn create(&self) -> Result<()> {
        self.runner.run(
            &Command::new("convox")
                .args(["registries", "add", self.url, self.username])
                .secret_arg(self.password)
                .args(["--rack", self.stack_name]),
        )
    }

    fn poll_policy(&self) -> PollPolicy {
        self.policy
    }
}

#[derive(Debug, Deserialize)]
struct ServiceInfo {
    name: String,
    #[serde(default)]
    domain: String,
}

/// Domain of `service` in `app`.
///
/// # Errors
///
/// Returns `ResourceNotFound` if the app has no such service or it has no
/// domain yet.
pub fn service_domain(
    runner: &dyn CommandRunner,
    stack_name: &str,
    app: &str,
    service: &str,
) -> Result<String> {
    let services: Vec<ServiceInfo> =
        api_get(runner, &format!("/apps/{app}/services"), stack_name)?;
    services
        .into_iter()
        .find(|s| s.name == service && !s.domain.is_empty())
        .map(|s| s.domain)
        .ok_or_else(|| InstallerError::ResourceNotFound {
            resource_type: "service".into(),
            name: service.into(),
        })
}

fn env_set_command(flags: &[&str], stack_name: &str, app: &str, vars: &[(String, String)]) -> Command {
    vars.iter()
        .fold(
            Command::new("convox").args(["env", "set"]).args(flags.iter().copied()),
            |cmd, (k, v)| cmd.secret_assignment(k, v),
        )
        .args(["--app", app, "--rack", stack_name])
}

/// `convox env set K=V ...` with every value masked in logs and errors.
///
/// The change is staged as a release and goes live with the next deploy.
///
/// # Errors
///
/// Returns `CommandFailed` if convox rejects the change.
pub fn set_environment(
    runner: &dyn CommandRunner,
    stack_name: &str,
    app: &str,
    vars: &[(String, String)],
) -> Result<()> {
    info!(app, count = vars.len(), "Setting app environment");
    runner.run(&env_set_command(&[], stack_name, app, vars))
}

/// `convox env set --promote --wait K=V ...`: set and release immediately.
///
/// # Errors
///
/// Returns `CommandFailed` if convox rejects the change or the promotion fails.
pub fn promote_environment(
    runner: &dyn CommandRunner,
    stack_name: &str,
    app: &str,
    vars: &[(String, String)],
) -> Result<()> {
    info!(app, count = vars.len(), "Promoting app environment");
    runner.run(&env_set_command(
        &["--promote", "--wait"],
        stack_name,
        app,
        vars,
    ))
}

/// `convox <args> --app <app> --rack <stack>` from `workdir`.
///
/// # Errors
///
/// Returns `CommandFailed` on a non-zero exit.
pub fn run_command(
    runner: &dyn CommandRunner,
    stack_name: &str,
    app: &str,
    workdir: &Path,
    args: &[&str],
) -> Result<()> {
    runner.run(
        &Command::new("convox")
            .args(args.iter().copied())
            .args(["--app", app, "--rack", stack_name])
            .current_dir(workdir),
    )
}

/// `convox deploy --wait` from `workdir`.
///
/// # Errors
///
/// Returns `CommandFailed` if the deploy fails.
pub fn deploy(
    runner: &dyn CommandRunner,
    stack_name: &str,
    app: &str,
    workdir: &Path,
) -> Result<()> {
    runner.run(
        &Command::new("convox")
            .args(["deploy", "--wait", "--app", app, "--rack", stack_name])
            .current_dir(workdir),
    )
}

/// Move the convox CLI's `host` and `rack` files aside so they cannot
/// redirect commands to another rack.
///
/// Returns the backups written.
///
/// # Errors
///
/// Returns an error if a rename fails.
pub fn backup_host_and_rack(convox_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut moved = Vec::new();
    for name in ["host", "rack"] {
        let path = convox_dir.join(name);
        if path.exists() {
            let backup = convox_dir.join(format!("{name}.bak"));
            info!(from = %path.display(), to = %backup.display(), "Backing up convox file");
            std::fs::rename(&path, &backup)?;
            moved.push(backup);
        }
    }
    Ok(moved)
}

/// Point the convox CLI at `stack_name`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_current(paths: &Paths, stack_name: &str) -> Result<()> {
    let path = paths.current_file();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let content = json!({ "name": stack_name, "type": "terraform" }).to_string();
    write_atomically(&path, content.as_bytes())
}

/// Write `<workdir>/.convox/app` so convox commands there default to `app`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn set_default_app_for_directory(paths: &Paths, app: &str) -> Result<()> {
    let path = paths.app_file();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    debug!(path = %path.display(), app, "Setting default app");
    std::fs::write(&path, app)?;
    Ok(())
}
