//! Installer configuration: prompt declarations and the persisted answer store.
//!
//! Values are loaded with precedence `file < environment < explicit override`
//! and every change is written back to disk as a whole document.

use std::cell::OnceCell;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{InstallerError, Result};

/// CORS policy applied to the uploads bucket, in `put-bucket-cors` format.
pub const S3_BUCKET_CORS_POLICY: &str = r#"{
  "CORSRules": [
    {
      "AllowedHeaders": ["Authorization", "cache-control", "x-requested-with"],
      "AllowedMethods": ["PUT", "POST", "GET"],
      "AllowedOrigins": ["*"],
      "ExposeHeaders": [],
      "MaxAgeSeconds": 3000
    }
  ]
}"#;

/// Where a forced value comes from.
pub enum ValueSource {
    /// A fixed value.
    Literal(String),
    /// Computed on first use (e.g. a random password).
    Generated(Box<dyn Fn() -> String>),
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

/// A forced value for a prompt, resolved at most once.
#[derive(Debug)]
pub struct ValueProvider {
    source: ValueSource,
    resolved: OnceCell<String>,
}

impl ValueProvider {
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            source: ValueSource::Literal(value.into()),
            resolved: OnceCell::new(),
        }
    }

    pub fn generated(generator: impl Fn() -> String + 'static) -> Self {
        Self {
            source: ValueSource::Generated(Box::new(generator)),
            resolved: OnceCell::new(),
        }
    }

    /// Resolve the value, invoking a generator only the first time.
    pub fn resolve(&self) -> &str {
        self.resolved.get_or_init(|| match &self.source {
            ValueSource::Literal(value) => value.clone(),
            ValueSource::Generated(generator) => generator(),
        })
    }
}

/// One entry of the prompt script.
///
/// Entries without a key are section headers or info banners.
#[derive(Debug, Default)]
pub struct PromptSpec {
    pub key: Option<String>,
    pub title: Option<String>,
    pub prompt: Option<String>,
    pub default: Option<String>,
    pub value: Option<ValueProvider>,
    pub hidden: bool,
    pub section: Option<String>,
    pub info: Option<String>,
}

impl PromptSpec {
    /// A question stored under `key`.
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    /// A non-interactive section header.
    pub fn section(title: impl Into<String>) -> Self {
        Self {
            section: Some(title.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(ValueProvider::literal(value));
        self
    }

    #[must_use]
    pub fn generated(mut self, generator: impl Fn() -> String + 'static) -> Self {
        self.value = Some(ValueProvider::generated(generator));
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    /// Label used in questions and the summary.
    #[must_use]
    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref().or(self.key.as_deref())
    }

    /// Question text, falling back to "Please enter your {title}: ".
    #[must_use]
    pub fn prompt_text(&self) -> String {
        match (&self.prompt, self.display_title()) {
            (Some(prompt), _) => prompt.clone(),
            (None, Some(title)) => format!("Please enter your {title}: "),
            (None, None) => String::new(),
        }
    }
}

/// Keys declared by a prompt script, in order.
#[must_use]
pub fn config_keys(prompts: &[PromptSpec]) -> Vec<String> {
    prompts.iter().filter_map(|p| p.key.clone()).collect()
}

/// The prompts every installation asks.
#[must_use]
pub fn default_prompts() -> Vec<PromptSpec> {
    vec![
        PromptSpec::key("stack_name")
            .title("Convox Stack Name")
            .prompt("Please enter a name for your Convox installation")
            .default_value("convox"),
        PromptSpec::key("aws_region")
            .title("AWS Region")
            .default_value("us-east-1"),
        PromptSpec::key("instance_type")
            .title("EC2 Instance Type")
            .default_value("t3.medium"),
        PromptSpec::section("Admin AWS Credentials"),
        PromptSpec::key("aws_access_key_id").title("AWS Access Key ID"),
        PromptSpec::key("aws_secret_access_key").title("AWS Secret Access Key"),
    ]
}

/// Default prompts plus everything the full application install needs.
#[must_use]
pub fn full_installation_prompts() -> Vec<PromptSpec> {
    let mut prompts = default_prompts();
    prompts.extend([
        PromptSpec::section("Docker Registry Authentication").info(
            "You should have received authentication details for the Docker Registry\n\
             via email. If not, please contact your vendor's support team.",
        ),
        PromptSpec::key("docker_registry_url").title("Docker Registry URL"),
        PromptSpec::key("docker_registry_username").title("Docker Registry Username"),
        PromptSpec::key("docker_registry_password").title("Docker Registry Password"),
        PromptSpec::key("convox_app_name")
            .title("Convox App Name")
            .value("convox-app"),
        PromptSpec::key("default_service")
            .title("Default Convox Service (for domain)")
            .value("web")
            .hidden(),
        PromptSpec::key("admin_email")
            .title("Admin User Email")
            .prompt(
                "Please enter the email address you would like to use \
                 for the default admin user",
            )
            .default_value("admin@example.com"),
        PromptSpec::key("admin_password")
            .title("Admin User Password")
            .generated(|| random_hex(8)),
        PromptSpec::key("s3_bucket_name")
            .title("S3 Bucket for Uploads")
            .generated(|| format!("app-uploads-{}", random_hex(4))),
        PromptSpec::key("s3_bucket_cors_policy")
            .value(S3_BUCKET_CORS_POLICY)
            .hidden(),
        PromptSpec::key("database_username")
            .value("example_app")
            .hidden(),
        PromptSpec::key("database_password")
            .generated(|| random_hex(16))
            .hidden(),
        PromptSpec::key("database_instance_class")
            .value("db.t3.small")
            .hidden(),
        PromptSpec::key("cache_node_type")
            .value("cache.t3.micro")
            .hidden(),
        PromptSpec::key("secret_key_base")
            .generated(|| random_hex(64))
            .hidden(),
        PromptSpec::key("data_encryption_key")
            .generated(|| random_hex(32))
            .hidden(),
    ]);
    prompts
}

/// Hex encoding of `bytes` random bytes.
#[must_use]
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0_u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

#[derive(Deserialize)]
struct StoredDocument {
    #[serde(default)]
    config: IndexMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct StoredDocumentRef<'a> {
    config: &'a IndexMap<String, String>,
}

/// Configuration values backed by a JSON file.
#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
    values: IndexMap<String, String>,
}

impl Config {
    /// An empty configuration that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: IndexMap::new(),
        }
    }

    /// Load from `path`, the process environment, and `overrides`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(
        path: impl Into<PathBuf>,
        keys: &[String],
        overrides: &IndexMap<String, String>,
    ) -> Result<Self> {
        Self::load_with_env(path, keys, |name| std::env::var(name).ok(), overrides)
    }

    /// Load with an explicit environment lookup.
    ///
    /// Only `keys` are kept from the file. An environment variable named
    /// after the upper-cased key replaces the file value when it is not
    /// blank; `overrides` replace both.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_with_env(
        path: impl Into<PathBuf>,
        keys: &[String],
        env: impl Fn(&str) -> Option<String>,
        overrides: &IndexMap<String, String>,
    ) -> Result<Self> {
        let mut config = Self::empty(path);

        if config.path.exists() {
            debug!(path = %config.path.display(), "Loading saved config");
            let content = std::fs::read_to_string(&config.path)?;
            let mut stored: StoredDocument = serde_json::from_str(&content)?;
            for key in keys {
                if let Some(value) = stored.config.shift_remove(key) {
                    config.values.insert(key.clone(), json_to_string(value));
                }
            }
        }

        for key in keys {
            let env_key = key.to_uppercase();
            if let Some(value) = env(&env_key).filter(|v| !v.trim().is_empty()) {
                debug!(key = %key, env_key = %env_key, "Found value in env var");
                config.values.insert(key.clone(), value);
            }
        }

        for (key, value) in overrides {
            config.values.insert(key.clone(), value.clone());
        }

        Ok(config)
    }

    /// File the configuration persists to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All values, in insertion order.
    #[must_use]
    pub fn values(&self) -> &IndexMap<String, String> {
        &self.values
    }

    /// Value for `key`, if any.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Value for `key`.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfig` if the key has no value.
    pub fn get(&self, key: &str) -> Result<&str> {
        self.value(key)
            .ok_or_else(|| InstallerError::MissingConfig(key.to_string()))
    }

    /// Set a value and persist the whole document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.values.insert(key.into(), value.into());
        self.save()
    }

    /// Fail on the first key in `keys` that has no value.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfig` naming the first absent key.
    pub fn require(&self, keys: &[&str]) -> Result<()> {
        match keys.iter().find(|key| !self.contains(key)) {
            Some(key) => Err(InstallerError::MissingConfig((*key).to_string())),
            None => Ok(()),
        }
    }

    /// Write the whole document, replacing the file atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let content = serde_json::to_string(&StoredDocumentRef {
            config: &self.values,
        })?;
        write_atomically(&self.path, format!("{content}\n").as_bytes())?;

        debug!(path = %self.path.display(), keys = self.values.len(), "Saved config");
        Ok(())
    }
}

/// Fail with `MissingConfig` on the first absent key, in the order given.
///
/// ```
/// # use convox_installer::{config::Config, require_config};
/// let config = Config::empty("/tmp/unused");
/// assert!(require_config!(config, "stack_name").is_err());
/// ```
#[macro_export]
macro_rules! require_config {
    ($config:expr, $($key:expr),+ $(,)?) => {
        $config.require(&[$($key),+])
    };
}

/// Replace `path` with `content` via a temporary file in the same directory.
pub(crate) fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(content)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn json_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}
