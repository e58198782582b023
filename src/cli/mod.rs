//! # Wrapper around the `rhoas` command line tool
//!
//! Every command runs in verbose mode (`-v`) so the HTTP exchange with the control plane is
//! printed and a failure can be classified like an API error.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::command::{AsyncProcess, CommandNotStarted, ProcessOutput};
use crate::config::E2eConfig;
use crate::kafka_instance::{Topic, TopicsList};
use crate::kafka_mgmt::{KafkaRequest, KafkaRequestList, KafkaRequestPayload};
use crate::registry_mgmt::{Registry, RegistryList};
use crate::retry::backoff::Backoff;
use crate::retry::classifier::{is_retryable_creation, is_server_error};
use crate::retry::{DEFAULT_MAX_RETRIES, RetryPolicy, retry, retry_with_policy};

pub mod error;
pub mod model;

pub use error::CliError;
use model::{ConsumerGroup, ConsumerGroupList, Record, ServiceAccount};

pub const DEFAULT_CLI_TIMEOUT: Duration = Duration::from_secs(3 * 60);
pub const PRODUCE_TIMEOUT: Duration = Duration::from_secs(10);
/// Kafka creation through the CLI is attempted about 12 times, 10 seconds apart.
pub const KAFKA_CREATION_BACKOFF: Backoff =
    Backoff::new(Duration::from_secs(10), Duration::from_secs(120));

/// Binary used when the configuration does not name one.
pub const DEFAULT_CLI_BINARY: &str = "rhoas";

const VERBOSE_FLAG: &str = "-v";

#[derive(Debug)]
pub struct Cli {
    workdir: PathBuf,
    cmd: String,
    timeout: Duration,
    creation_backoff: Backoff,
}

impl Cli {
    /// Runs `binary` from its own directory.
    pub fn new(binary: impl AsRef<Path>) -> Result<Self, CliError> {
        let binary = binary.as_ref();
        let name = binary
            .file_name()
            .ok_or_else(|| CliError::InvalidBinary(binary.to_path_buf()))?;
        let workdir = binary
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        Ok(Self {
            workdir: workdir.to_path_buf(),
            cmd: format!("./{}", name.to_string_lossy()),
            timeout: DEFAULT_CLI_TIMEOUT,
            creation_backoff: KAFKA_CREATION_BACKOFF,
        })
    }

    /// Uses the configured `cli_binary`, `rhoas` from the working directory when unset, bounded
    /// by `cli_timeout`.
    pub fn from_config(config: &E2eConfig) -> Result<Self, CliError> {
        let binary = config
            .cli_binary
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_CLI_BINARY));
        Ok(Self::new(binary)?.with_timeout(config.cli_timeout))
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn with_creation_backoff(self, creation_backoff: Backoff) -> Self {
        Self {
            creation_backoff,
            ..self
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn command<I, S>(&self, args: I) -> CommandNotStarted
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = std::iter::once(VERBOSE_FLAG.to_string())
            .chain(args.into_iter().map(|arg| arg.as_ref().to_string()))
            .collect();
        CommandNotStarted::new(&self.cmd, args).with_workdir(&self.workdir)
    }

    fn exec_async<I, S>(&self, args: I) -> Result<AsyncProcess, CliError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let command = self.command(args);
        debug!(command = %command.description(), "running cli");
        Ok(command.start()?)
    }

    fn exec<I, S>(&self, args: I) -> Result<ProcessOutput, CliError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self.exec_async(args)?.sync(self.timeout)?)
    }

    /// Runs the command, retrying once when the control plane answered with a server error.
    fn exec_with_retry(&self, args: &[&str]) -> Result<ProcessOutput, CliError> {
        retry(DEFAULT_MAX_RETRIES, || self.exec(args), is_server_error)
    }

    fn exec_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, CliError> {
        Ok(self.exec_with_retry(args)?.parse_json()?)
    }

    /// Starts the browser based login and returns the running process, which prints the SSO
    /// url to follow.
    pub fn login(
        &self,
        api_gateway: Option<&str>,
        auth_url: Option<&str>,
        insecure: bool,
    ) -> Result<AsyncProcess, CliError> {
        let mut args = vec!["login"];
        if let Some(api_gateway) = api_gateway {
            args.extend(["--api-gateway", api_gateway]);
        }
        if let Some(auth_url) = auth_url {
            args.extend(["--auth-url", auth_url]);
        }
        if insecure {
            args.push("--insecure");
        }
        args.push("--print-sso-url");
        self.exec_async(args)
    }

    pub fn logout(&self) -> Result<(), CliError> {
        self.exec(["logout"]).map(|_| ())
    }

    pub fn help(&self) -> Result<String, CliError> {
        Ok(self.exec(["--help"])?.stdout().to_string())
    }

    pub fn create_kafka(&self, payload: &KafkaRequestPayload) -> Result<KafkaRequest, CliError> {
        let mut args = vec!["kafka", "create", "--bypass-checks", "--name", payload.name.as_str()];
        if let Some(provider) = payload.cloud_provider.as_deref() {
            args.extend(["--provider", provider]);
        }
        if let Some(region) = payload.region.as_deref() {
            args.extend(["--region", region]);
        }

        info!(kafka = %payload.name, "create kafka instance through the cli");
        let output = retry_with_policy(
            RetryPolicy::FixedInterval(self.creation_backoff),
            || self.exec(&args),
            is_retryable_creation,
        )?;
        Ok(output.parse_json()?)
    }

    pub fn delete_kafka(&self, id: &str) -> Result<(), CliError> {
        self.exec_with_retry(&["kafka", "delete", "--id", id, "-y"])
            .map(|_| ())
    }

    pub fn describe_kafka_by_id(&self, id: &str) -> Result<KafkaRequest, CliError> {
        self.exec_json(&["kafka", "describe", "--id", id])
    }

    pub fn describe_kafka_by_name(&self, name: &str) -> Result<KafkaRequest, CliError> {
        self.exec_json(&["kafka", "describe", "--name", name])
    }

    pub fn use_kafka(&self, id: &str) -> Result<(), CliError> {
        self.exec_with_retry(&["kafka", "use", "--id", id])
            .map(|_| ())
    }

    pub fn list_kafka(&self) -> Result<KafkaRequestList, CliError> {
        self.exec_json(&["kafka", "list", "-o", "json"])
    }

    pub fn search_kafka_by_name(&self, name: &str) -> Result<KafkaRequestList, CliError> {
        self.exec_json(&["kafka", "list", "--search", name, "-o", "json"])
    }

    pub fn create_topic(&self, name: &str, partitions: Option<u32>) -> Result<Topic, CliError> {
        let partitions = partitions.map(|p| p.to_string());
        let mut args = vec!["kafka", "topic", "create", "--name", name];
        if let Some(partitions) = partitions.as_deref() {
            args.extend(["--partitions", partitions]);
        }
        args.extend(["-o", "json"]);
        self.exec_json(&args)
    }

    pub fn delete_topic(&self, name: &str) -> Result<(), CliError> {
        self.exec_with_retry(&["kafka", "topic", "delete", "--name", name, "-y"])
            .map(|_| ())
    }

    pub fn list_topics(&self) -> Result<TopicsList, CliError> {
        self.exec_json(&["kafka", "topic", "list", "-o", "json"])
    }

    pub fn describe_topic(&self, name: &str) -> Result<Topic, CliError> {
        self.exec_json(&["kafka", "topic", "describe", "--name", name, "-o", "json"])
    }

    pub fn update_topic(&self, name: &str, retention_ms: &str) -> Result<(), CliError> {
        self.exec_with_retry(&[
            "kafka",
            "topic",
            "update",
            "--name",
            name,
            "--retention-ms",
            retention_ms,
        ])
        .map(|_| ())
    }

    pub fn list_consumer_groups(&self) -> Result<ConsumerGroupList, CliError> {
        self.exec_json(&["kafka", "consumer-group", "list", "-o", "json"])
    }

    pub fn describe_consumer_group(&self, id: &str) -> Result<ConsumerGroup, CliError> {
        self.exec_json(&["kafka", "consumer-group", "describe", "--id", id, "-o", "json"])
    }

    pub fn delete_consumer_group(&self, id: &str) -> Result<(), CliError> {
        self.exec_with_retry(&["kafka", "consumer-group", "delete", "--id", id, "-y"])
            .map(|_| ())
    }

    /// Creates a service account and writes its credentials as JSON to `output_file`.
    pub fn create_service_account(&self, name: &str, output_file: &Path) -> Result<(), CliError> {
        let output_file = output_file.to_string_lossy().into_owned();
        self.exec_with_retry(&[
            "service-account",
            "create",
            "--short-description",
            name,
            "--file-format",
            "json",
            "--output-file",
            output_file.as_str(),
            "--overwrite",
        ])
        .map(|_| ())
    }

    pub fn describe_service_account(&self, id: &str) -> Result<ServiceAccount, CliError> {
        self.exec_json(&["service-account", "describe", "--id", id])
    }

    pub fn list_service_accounts(&self) -> Result<Vec<ServiceAccount>, CliError> {
        self.exec_json(&["service-account", "list", "-o", "json"])
    }

    pub fn delete_service_account(&self, id: &str) -> Result<(), CliError> {
        self.exec_with_retry(&["service-account", "delete", "--id", id, "-y"])
            .map(|_| ())
    }

    pub fn create_service_registry(&self, name: &str) -> Result<Registry, CliError> {
        self.exec_json(&["service-registry", "create", "--name", name])
    }

    /// Describes the registry `id`, or the one currently in use when `id` is `None`.
    pub fn describe_service_registry(&self, id: Option<&str>) -> Result<Registry, CliError> {
        match id {
            Some(id) => self.exec_json(&["service-registry", "describe", "--id", id]),
            None => self.exec_json(&["service-registry", "describe"]),
        }
    }

    pub fn list_service_registry(&self) -> Result<RegistryList, CliError> {
        self.exec_json(&["service-registry", "list", "-o", "json"])
    }

    pub fn use_service_registry(&self, id: &str) -> Result<(), CliError> {
        self.exec_with_retry(&["service-registry", "use", "--id", id])
            .map(|_| ())
    }

    pub fn delete_service_registry(&self, id: &str) -> Result<(), CliError> {
        self.exec_with_retry(&["service-registry", "delete", "--id", id, "-y"])
            .map(|_| ())
    }

    /// Consumes the records of `partition`, optionally starting at `offset`.
    pub fn consume_records(
        &self,
        topic: &str,
        instance_id: &str,
        partition: i32,
        offset: Option<i64>,
    ) -> Result<Vec<Record>, CliError> {
        let partition = partition.to_string();
        let offset = offset.map(|o| o.to_string());
        let mut args = vec![
            "kafka",
            "topic",
            "consume",
            "--instance-id",
            instance_id,
            "--name",
            topic,
        ];
        if let Some(offset) = offset.as_deref() {
            args.extend(["--offset", offset]);
        }
        args.extend(["--partition", partition.as_str(), "--format", "json"]);

        Ok(self.exec_with_retry(&args)?.parse_json_records()?)
    }

    /// Produces `message` by writing it to the CLI stdin and returns the record it printed.
    pub fn produce_record(
        &self,
        topic: &str,
        instance_id: &str,
        message: &str,
        partition_and_key: Option<(i32, &str)>,
    ) -> Result<Record, CliError> {
        let partition = partition_and_key.map(|(partition, _)| partition.to_string());
        let mut args = vec![
            "kafka",
            "topic",
            "produce",
            "--instance-id",
            instance_id,
            "--name",
            topic,
        ];
        if let (Some(partition), Some((_, key))) = (partition.as_deref(), partition_and_key) {
            args.extend(["--partition", partition, "--key", key]);
        }

        let mut process = self.exec_async(args)?;
        process.write_stdin(message.as_bytes())?;
        process.close_stdin();
        let output = process.sync(PRODUCE_TIMEOUT)?;
        Ok(output.parse_json()?)
    }
}
