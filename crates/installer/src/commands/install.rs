use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use indexmap::IndexMap;
use tracing::debug;

use convox_installer::config::{config_keys, full_installation_prompts};
use convox_installer::requirements::ensure_requirements;
use convox_installer::{ui, Config, DialoguerPrompter, Installer, Paths, PromptEngine, SystemRunner};

/// Install a Convox rack and the application
#[derive(Args, Debug)]
pub struct InstallCommand {
    /// Application directory to deploy from (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    workdir: Option<PathBuf>,

    /// Set a configuration value, taking precedence over saved and env values
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    overrides: Vec<(String, String)>,

    /// Skip the confirmation when no questions were asked
    #[arg(short, long)]
    yes: bool,
}

impl InstallCommand {
    pub fn run(&self) -> Result<()> {
        ui::print_banner();

        ui::print_section("Checking requirements");
        ensure_requirements()?;

        let paths = self.paths()?;
        debug!(convox_dir = %paths.convox_dir.display(), workdir = %paths.workdir.display(), "Resolved paths");

        let prompts = full_installation_prompts();
        let overrides: IndexMap<String, String> = self.overrides.iter().cloned().collect();
        let mut config = Config::load(paths.installer_config(), &config_keys(&prompts), &overrides)
            .with_context(|| {
                format!(
                    "Failed to load saved config from {}",
                    paths.installer_config().display()
                )
            })?;

        let prompter = DialoguerPrompter::default();
        PromptEngine::new(&prompter)
            .auto_confirm(self.yes)
            .prompt_for_config(&prompts, &mut config)?;

        let runner = SystemRunner;
        Installer::new(config, paths, &runner)?.run_to_completion()?;
        Ok(())
    }

    /// The convox directory is always the platform location the convox CLI
    /// itself writes racks to. Only the app directory can be moved.
    fn paths(&self) -> Result<Paths> {
        let mut paths = Paths::detect().context("Failed to determine installer directories")?;
        if let Some(workdir) = &self.workdir {
            paths.workdir.clone_from(workdir);
        }
        Ok(paths)
    }
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("missing key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
