//! Interactive configuration collection.
//!
//! [`PromptEngine`] walks a prompt script, asks only for what is missing,
//! shows a summary and loops in revision mode until the operator confirms.

use std::fmt::Write as _;

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};
use tracing::debug;

use crate::config::{Config, PromptSpec};
use crate::error::Result;
use crate::ui;

/// Question text for the final confirmation.
pub const CONFIRM_PROMPT: &str =
    "Would you like to start the Convox installation? (press 'n' to correct any settings)";

/// Source of operator answers.
pub trait Prompter {
    /// Ask for a line of text. `default` is pre-filled and editable.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal interaction fails.
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Ask a yes/no question.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal interaction fails.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Terminal prompts via `dialoguer`.
#[derive(Default)]
pub struct DialoguerPrompter {
    theme: ColorfulTheme,
}

impl Prompter for DialoguerPrompter {
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme).with_prompt(prompt.trim_end());
        if let Some(default) = default {
            input = input.with_initial_text(default);
        }
        Ok(input.interact_text()?)
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .interact()?)
    }
}

/// Runs the ask/summary/confirm loop over a prompt script.
pub struct PromptEngine<'a> {
    prompter: &'a dyn Prompter,
    auto_confirm: bool,
}

impl<'a> PromptEngine<'a> {
    pub fn new(prompter: &'a dyn Prompter) -> Self {
        Self {
            prompter,
            auto_confirm: false,
        }
    }

    /// Skip the confirmation when the first pass asked nothing.
    #[must_use]
    pub fn auto_confirm(mut self, yes: bool) -> Self {
        self.auto_confirm = yes;
        self
    }

    /// Fill `config` from `prompts` until the operator accepts the summary.
    ///
    /// Keys that already have a value are skipped on the first pass. After a
    /// rejected summary every key without a forced value is asked again with
    /// its current value pre-filled.
    ///
    /// # Errors
    ///
    /// Returns an error if prompting fails or the config cannot be saved.
    pub fn prompt_for_config(&self, prompts: &[PromptSpec], config: &mut Config) -> Result<()> {
        let mut revising = false;

        loop {
            let mut asked = 0;
            for spec in prompts {
                if let Some(section) = &spec.section {
                    ui::print_section(section);
                }
                if let Some(info) = &spec.info {
                    ui::print_info(info);
                }
                if spec.key.is_some() && self.ask(spec, config, revising)? {
                    asked += 1;
                }
            }

            config.save()?;
            println!("{}", render_summary(prompts, config));

            if self.auto_confirm && !revising && asked == 0 {
                debug!("Configuration complete, skipping confirmation");
                return Ok(());
            }

            ui::print_info("Please double check all of these configuration details.");
            if self.prompter.confirm(CONFIRM_PROMPT)? {
                return Ok(());
            }
            println!();
            revising = true;
        }
    }

    /// Handle one keyed prompt. Returns whether the operator was asked.
    fn ask(&self, spec: &PromptSpec, config: &mut Config, revising: bool) -> Result<bool> {
        let Some(key) = spec.key.as_deref() else {
            return Ok(false);
        };

        if config.contains(key) && !revising {
            debug!(key, "Found existing config");
            return Ok(false);
        }

        if let Some(provider) = &spec.value {
            if !config.contains(key) {
                config.set(key, provider.resolve())?;
            }
            return Ok(false);
        }

        let default = if revising {
            config.value(key).map(str::to_string)
        } else {
            spec.default.clone()
        };

        let prompt = spec.prompt_text();
        let answer = loop {
            let answer = self.prompter.input(&prompt, default.as_deref())?;
            if !answer.trim().is_empty() {
                break answer;
            }
            ui::print_warning("A value is required.");
        };

        config.set(key, answer)?;
        Ok(true)
    }
}

/// Column-aligned `title: value` lines for every visible keyed prompt.
///
/// The title column is as wide as the longest title of any keyed prompt,
/// hidden ones included, plus three.
#[must_use]
pub fn render_summary(prompts: &[PromptSpec], config: &Config) -> String {
    let width = prompts
        .iter()
        .filter(|p| p.key.is_some())
        .filter_map(PromptSpec::display_title)
        .map(|t| t.chars().count())
        .max()
        .unwrap_or(0)
        + 3;

    let rule = "=".repeat(44);
    let mut out = format!("\n{rule}\n{:^44}\n{rule}\n\n", "SUMMARY");

    for spec in prompts.iter().filter(|p| !p.hidden) {
        let (Some(key), Some(title)) = (spec.key.as_deref(), spec.display_title()) else {
            continue;
        };
        let value = config.value(key).unwrap_or_default();
        let label = format!("{title}:");
        let _ = writeln!(out, "    {label:<width$} {value}");
    }

    let _ = write!(
        out,
        "\nWe've saved your configuration to: {}\n\
         If anything goes wrong during the installation, \
         you can restart the script to reload the config and continue.\n",
        config.path().display()
    );
    out
}
