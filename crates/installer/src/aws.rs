//! S3 uploads bucket and its CORS policy, via the `aws` CLI.

use serde_json::Value;
use tracing::debug;

use crate::command::{Command, CommandRunner};
use crate::error::{InstallerError, Result};
use crate::poller::PollPolicy;
use crate::reconcile::ProvisioningStep;

/// Region in which `create-bucket` must not be given a location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// Admin credentials passed to every `aws` invocation through the environment.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl AwsCredentials {
    /// `aws <args>` with the credentials as environment overrides.
    #[must_use]
    pub fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::new("aws")
            .args(args)
            .env("AWS_ACCESS_KEY_ID", &self.access_key_id)
            .env("AWS_SECRET_ACCESS_KEY", &self.secret_access_key)
            .env("AWS_DEFAULT_REGION", &self.region)
    }
}

/// The uploads bucket.
pub struct Bucket<'a> {
    pub runner: &'a dyn CommandRunner,
    pub credentials: &'a AwsCredentials,
    pub name: &'a str,
    pub policy: PollPolicy,
}

impl ProvisioningStep for Bucket<'_> {
    fn name(&self) -> String {
        format!("S3 bucket {}", self.name)
    }

    fn exists(&self) -> Result<bool> {
        let query = format!("Buckets[?Name=='{}'].Name", self.name);
        let stdout = self.runner.capture(&self.credentials.command([
            "s3api",
            "list-buckets",
            "--query",
            query.as_str(),
            "--output",
            "text",
        ]))?;
        Ok(!stdout.trim().is_empty())
    }

    fn create(&self) -> Result<()> {
        let region = self.credentials.region.as_str();
        let mut command = self.credentials.command([
            "s3api",
            "create-bucket",
            "--bucket",
            self.name,
            "--region",
            region,
        ]);
        if region != DEFAULT_REGION {
            command = command.args([
                "--create-bucket-configuration".to_string(),
                format!("LocationConstraint={region}"),
            ]);
        }
        self.runner.run(&command)
    }

    fn poll_policy(&self) -> PollPolicy {
        self.policy
    }
}

/// The CORS configuration of the uploads bucket.
///
/// Exists when the live policy is structurally equal to `desired`.
pub struct BucketCors<'a> {
    pub runner: &'a dyn CommandRunner,
    pub credentials: &'a AwsCredentials,
    pub bucket: &'a str,
    pub desired: Value,
    pub policy: PollPolicy,
}

impl BucketCors<'_> {
    /// Parse the policy text stored in configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `policy` is not JSON.
    pub fn parse_policy(policy: &str) -> Result<Value> {
        serde_json::from_str(policy).map_err(|e| {
            InstallerError::InvalidConfig(format!("s3_bucket_cors_policy is not valid JSON: {e}"))
        })
    }

    /// Live policy, or `None` when the bucket has none.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` for failures other than a missing policy.
    pub fn current(&self) -> Result<Option<Value>> {
        let command =
            self.credentials
                .command(["s3api", "get-bucket-cors", "--bucket", self.bucket]);
        let output = self.runner.output(&command)?;

        if !output.success() {
            if output.stderr.contains("NoSuchCORSConfiguration") {
                return Ok(None);
            }
            return Err(InstallerError::CommandFailed {
                command: command.to_string(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }

        let value = serde_json::from_str(&output.stdout).map_err(|e| {
            InstallerError::UnexpectedOutput {
                command: command.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(Some(value))
    }
}

impl ProvisioningStep for BucketCors<'_> {
    fn name(&self) -> String {
        format!("CORS policy for S3 bucket {}", self.bucket)
    }

    fn exists(&self) -> Result<bool> {
        let matches = self
            .current()?
            .is_some_and(|current| json_equivalent(&current, &self.desired));
        debug!(bucket = self.bucket, matches, "Compared CORS policy");
        Ok(matches)
    }

    fn create(&self) -> Result<()> {
        self.runner.run(&self.credentials.command([
            "s3api".to_string(),
            "put-bucket-cors".to_string(),
            "--bucket".to_string(),
            self.bucket.to_string(),
            "--cors-configuration".to_string(),
            self.desired.to_string(),
        ]))
    }

    fn poll_policy(&self) -> PollPolicy {
        self.policy
    }
}

/// Structural equality ignoring array order.
///
/// Object keys whose value is `null` or an empty array are treated as absent,
/// since S3 omits empty lists when echoing a policy back.
#[must_use]
pub fn json_equivalent(a: &Value, b: &Value) -> bool {
    canonical(a) == canonical(b)
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut items: Vec<Value> = items.iter().map(canonical).collect();
            items.sort_by_cached_key(Value::to_string);
            Value::Array(items)
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !is_empty(v))
                .map(|(k, v)| (k.clone(), canonical(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::config::S3_BUCKET_CORS_POLICY;
    use crate::mock::{MockResponse, MockRunner};
    use crate::reconcile::{reconcile, StepOutcome};

    fn credentials(region: &str) -> AwsCredentials {
        AwsCredentials {
            access_key_id: "A".into(),
            secret_access_key: "B".into(),
            region: region.into(),
        }
    }

    const LIST: &str = "aws s3api list-buckets --query Buckets[?Name=='app-uploads-1234'].Name";

    #[test]
    fn test_json_equivalent_ignores_array_order() {
        assert!(json_equivalent(
            &json!({ "AllowedHeaders": ["b", "a"] }),
            &json!({ "AllowedHeaders": ["a", "b"] })
        ));
        assert!(!json_equivalent(
            &json!({ "AllowedHeaders": ["a"] }),
            &json!({ "AllowedHeaders": ["a", "b"] })
        ));
        assert!(json_equivalent(
            &json!({ "CORSRules": [{ "AllowedOrigins": ["*"], "ExposeHeaders": [] }] }),
            &json!({ "CORSRules": [{ "AllowedOrigins": ["*"] }] })
        ));
        assert!(!json_equivalent(&json!({ "MaxAgeSeconds": 3000 }), &json!({ "MaxAgeSeconds": 60 })));
    }

    #[test]
    fn test_bucket_created_outside_default_region() {
        let runner = MockRunner::new()
            .on(LIST, MockResponse::success("\n"))
            .on(LIST, MockResponse::success("app-uploads-1234\n"))
            .on("aws s3api create-bucket", MockResponse::success(""));
        let credentials = credentials("eu-west-1");
        let step = Bucket {
            runner: &runner,
            credentials: &credentials,
            name: "app-uploads-1234",
            policy: PollPolicy::new(10, Duration::ZERO),
        };

        assert_eq!(reconcile(&step).unwrap(), StepOutcome::Created { checks: 1 });
        assert_eq!(runner.count("aws s3api create-bucket"), 1);

        let create = &runner.calls()[1];
        assert_eq!(
            create.to_string(),
            "aws s3api create-bucket --bucket app-uploads-1234 --region eu-west-1 \
             --create-bucket-configuration LocationConstraint=eu-west-1"
        );
        assert_eq!(create.env_value("AWS_SECRET_ACCESS_KEY"), Some("B"));
        assert_eq!(create.env_value("AWS_DEFAULT_REGION"), Some("eu-west-1"));
    }

    #[test]
    fn test_bucket_in_us_east_1_has_no_location_constraint() {
        let runner = MockRunner::new().on("aws", MockResponse::success(""));
        let credentials = credentials("us-east-1");
        let step = Bucket {
            runner: &runner,
            credentials: &credentials,
            name: "app-uploads-1234",
            policy: PollPolicy::new(1, Duration::ZERO),
        };
        step.create().unwrap();
        assert_eq!(
            runner.call_lines(),
            vec!["aws s3api create-bucket --bucket app-uploads-1234 --region us-east-1"]
        );
    }

    #[test]
    fn test_unchanged_cors_policy_is_not_reapplied() {
        let live = json!({
            "CORSRules": [{
                "AllowedHeaders": ["x-requested-with", "cache-control", "Authorization"],
                "AllowedMethods": ["GET", "POST", "PUT"],
                "AllowedOrigins": ["*"],
                "MaxAgeSeconds": 3000
            }]
        });
        let runner = MockRunner::new().on(
            "aws s3api get-bucket-cors",
            MockResponse::success(live.to_string()),
        );
        let credentials = credentials("us-east-1");
        let step = BucketCors {
            runner: &runner,
            credentials: &credentials,
            bucket: "app-uploads-1234",
            desired: BucketCors::parse_policy(S3_BUCKET_CORS_POLICY).unwrap(),
            policy: PollPolicy::new(5, Duration::ZERO),
        };

        assert_eq!(reconcile(&step).unwrap(), StepOutcome::AlreadyExists);
        assert_eq!(runner.count("aws s3api put-bucket-cors"), 0);
    }

    #[test]
    fn test_missing_cors_policy_is_applied() {
        let desired = BucketCors::parse_policy(S3_BUCKET_CORS_POLICY).unwrap();
        let runner = MockRunner::new()
            .on(
                "aws s3api get-bucket-cors",
                MockResponse::failure(
                    254,
                    "An error occurred (NoSuchCORSConfiguration) when calling the GetBucketCors operation",
                ),
            )
            .on(
                "aws s3api get-bucket-cors",
                MockResponse::success(desired.to_string()),
            )
            .on("aws s3api put-bucket-cors", MockResponse::success(""));
        let credentials = credentials("us-east-1");
        let step = BucketCors {
            runner: &runner,
            credentials: &credentials,
            bucket: "app-uploads-1234",
            desired,
            policy: PollPolicy::new(5, Duration::ZERO),
        };

        assert_eq!(reconcile(&step).unwrap(), StepOutcome::Created { checks: 1 });
        assert_eq!(runner.count("aws s3api put-bucket-cors"), 1);
    }

    #[test]
    fn test_cors_read_failure_is_fatal() {
        let runner = MockRunner::new().on(
            "aws s3api get-bucket-cors",
            MockResponse::failure(254, "AccessDenied"),
        );
        let credentials = credentials("us-east-1");
        let step = BucketCors {
            runner: &runner,
            credentials: &credentials,
            bucket: "app-uploads-1234",
            desired: json!({}),
            policy: PollPolicy::new(5, Duration::ZERO),
        };
        assert!(matches!(
            reconcile(&step),
            Err(InstallerError::CommandFailed { .. })
        ));
        assert_eq!(runner.count("aws s3api put-bucket-cors"), 0);
    }
}
