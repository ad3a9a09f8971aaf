//! Operator-facing console output.
//!
//! Everything the operator is meant to read goes through here. Diagnostics
//! go through `tracing` instead.

use std::path::Path;
use std::time::Duration;

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};

use crate::reconcile::StepOutcome;

const RULE_WIDTH: usize = 44;

fn ok_mark() -> ColoredString {
    "✓".green().bold()
}

fn fail_mark() -> ColoredString {
    "✗".red().bold()
}

pub fn print_banner() {
    println!();
    println!("{}", "Convox Installer".cyan().bold());
    println!(
        "  {}",
        "Installs a Convox rack and your application on AWS".bright_black()
    );
    println!();
}

/// Title underlined to a fixed width.
pub fn print_section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
    println!("{}", "=".repeat(RULE_WIDTH.max(title.chars().count())).bright_black());
    println!();
}

/// `[current/total] message`
pub fn print_progress_step(current: u8, total: u8, message: &str) {
    let counter = format!("[{current:>2}/{total}]");
    println!("{} {}", counter.bright_black(), message.bold());
}

/// How a provisioning step finished.
pub fn print_outcome(what: &str, outcome: StepOutcome) {
    match outcome {
        StepOutcome::AlreadyExists => {
            println!("  {} {what} {}", ok_mark(), "(already exists)".bright_black());
        }
        StepOutcome::Created { checks } => println!(
            "  {} {what} {}",
            ok_mark(),
            format!("created, ready after {checks} check(s)").green()
        ),
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", ok_mark(), message.green());
}

pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message.yellow());
}

/// Errors go to stderr.
pub fn print_error(message: &str) {
    eprintln!("{} {}", fail_mark(), message.red());
}

pub fn print_info(message: &str) {
    println!("{} {message}", "i".blue().bold());
}

/// Indented `key: value` line.
pub fn print_kv(key: &str, value: &str) {
    println!("  {} {}", format!("{key}:").bright_black(), value.green());
}

/// Result of looking up a required tool.
pub fn print_tool_check(name: &str, found: Option<&Path>) {
    match found {
        Some(path) => println!(
            "  {} {name} {}",
            ok_mark(),
            path.display().to_string().bright_black()
        ),
        None => println!("  {} {name} {}", fail_mark(), "not found".red()),
    }
}

/// Spinner shown while waiting on something slow.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(format!("{} {message}", ok_mark()));
    }

    pub fn fail(&self, message: &str) {
        self.bar.abandon_with_message(format!("{} {message}", fail_mark()));
    }
}
