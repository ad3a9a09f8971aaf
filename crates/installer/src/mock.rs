//! Scripted runner and prompter for tests.
//!
//! [`MockRunner`] answers commands by display-string prefix and records every
//! call. [`MockPrompter`] replays queued answers and records what was asked.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;

use crate::command::{Command, CommandOutput, CommandRunner};
use crate::error::{InstallerError, Result};
use crate::prompt::Prompter;

/// Predefined outcome for a matched command.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    fn output(&self) -> CommandOutput {
        CommandOutput {
            status: self.status,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }
}

type Effect = Box<dyn Fn(&Command)>;

struct Rule {
    prefix: String,
    responses: VecDeque<MockResponse>,
    effect: Option<Effect>,
}

/// Command runner that returns scripted responses.
///
/// Commands are matched against their display form (secrets masked) by the
/// longest registered prefix. Responses for a prefix are consumed in order;
/// the last one repeats.
#[derive(Default)]
pub struct MockRunner {
    rules: RefCell<Vec<Rule>>,
    calls: RefCell<Vec<Command>>,
}

impl MockRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for commands starting with `prefix`.
    #[must_use]
    pub fn on(self, prefix: impl Into<String>, response: MockResponse) -> Self {
        self.rule_mut(prefix.into(), |rule| rule.responses.push_back(response));
        self
    }

    /// Run `effect` whenever a command starting with `prefix` is issued.
    #[must_use]
    pub fn on_effect(self, prefix: impl Into<String>, effect: impl Fn(&Command) + 'static) -> Self {
        self.rule_mut(prefix.into(), |rule| rule.effect = Some(Box::new(effect)));
        self
    }

    fn rule_mut(&self, prefix: String, f: impl FnOnce(&mut Rule)) {
        let mut rules = self.rules.borrow_mut();
        if let Some(rule) = rules.iter_mut().find(|r| r.prefix == prefix) {
            f(rule);
        } else {
            let mut rule = Rule {
                prefix,
                responses: VecDeque::new(),
                effect: None,
            };
            f(&mut rule);
            rules.push(rule);
        }
    }

    /// Every command issued, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Command> {
        self.calls.borrow().clone()
    }

    /// Display form of every command issued, in order.
    #[must_use]
    pub fn call_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(ToString::to_string).collect()
    }

    /// Number of issued commands starting with `prefix`.
    #[must_use]
    pub fn count(&self, prefix: &str) -> usize {
        self.call_lines()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

impl CommandRunner for MockRunner {
    fn output(&self, command: &Command) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(command.clone());
        let line = command.to_string();

        let mut rules = self.rules.borrow_mut();
        let Some(rule) = rules
            .iter_mut()
            .filter(|r| line.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len())
        else {
            return Ok(MockResponse::failure(127, format!("no mock response for: {line}")).output());
        };

        if let Some(effect) = &rule.effect {
            effect(command);
        }

        let response = if rule.responses.len() > 1 {
            rule.responses.pop_front()
        } else {
            rule.responses.front().cloned()
        };
        Ok(response.unwrap_or_else(|| MockResponse::success("")).output())
    }
}

/// A recorded text question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskedInput {
    pub prompt: String,
    pub default: Option<String>,
}

/// Prompter that replays queued answers.
///
/// Running out of answers is an error so loops cannot spin forever.
#[derive(Debug, Default)]
pub struct MockPrompter {
    answers: RefCell<VecDeque<String>>,
    confirms: RefCell<VecDeque<bool>>,
    inputs: RefCell<Vec<AskedInput>>,
    confirm_count: RefCell<usize>,
}

impl MockPrompter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn answers<I, S>(self, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.answers
            .borrow_mut()
            .extend(answers.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn confirms(self, confirms: impl IntoIterator<Item = bool>) -> Self {
        self.confirms.borrow_mut().extend(confirms);
        self
    }

    /// Text questions asked so far.
    #[must_use]
    pub fn inputs(&self) -> Vec<AskedInput> {
        self.inputs.borrow().clone()
    }

    #[must_use]
    pub fn confirm_count(&self) -> usize {
        *self.confirm_count.borrow()
    }
}

fn exhausted(what: &str) -> InstallerError {
    InstallerError::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("no scripted {what} left"),
    ))
}

impl Prompter for MockPrompter {
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        self.inputs.borrow_mut().push(AskedInput {
            prompt: prompt.to_string(),
            default: default.map(str::to_string),
        });
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| exhausted("answer"))
    }

    fn confirm(&self, _prompt: &str) -> Result<bool> {
        *self.confirm_count.borrow_mut() += 1;
        self.confirms
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| exhausted("confirmation"))
    }
}
