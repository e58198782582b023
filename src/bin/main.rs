use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info};

use managed_services_e2e::client::token::SsoTokenRetriever;
use managed_services_e2e::client::{ApiClient, ClientError, try_build_http_client};
use managed_services_e2e::config::{self, E2eConfig, E2eConfigError};
use managed_services_e2e::kafka_mgmt::{HttpKafkaMgmtApi, KafkaError, KafkaLifecycle};
use managed_services_e2e::logging::{Logging, LoggingError};
use managed_services_e2e::registry_mgmt::utils::{REGISTRY_READY, wait_until_registry_is_ready};
use managed_services_e2e::registry_mgmt::{HttpRegistryMgmtApi, RegistryError};

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// YAML configuration file, `MAS_E2E_*` environment variables override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Log level, defaults to the configured `log_level`
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Wait until a Kafka instance is ready and all its hosts resolve
    WaitKafkaReady {
        #[arg(long)]
        id: String,
    },
    /// Wait until a Kafka instance is gone
    WaitKafkaDeleted {
        #[arg(long)]
        id: String,
    },
    /// Wait until a service registry is ready
    WaitRegistryReady {
        #[arg(long)]
        id: String,
    },
    /// Delete a Kafka instance by name, unless `skip_kafka_teardown` is set
    CleanKafka {
        #[arg(long)]
        name: String,
    },
    /// Delete every Kafka instance of an owner and wait for each deletion
    CleanKafkasByOwner {
        #[arg(long)]
        owner: String,
    },
}

#[derive(Error, Debug)]
enum RunError {
    #[error(transparent)]
    Config(#[from] E2eConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Kafka(#[from] KafkaError<ClientError>),

    #[error(transparent)]
    Registry(#[from] RegistryError<ClientError>),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load the configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    if let Err(err) = Logging::try_init(level) {
        eprintln!("Failed to initialize tracing: {err}");
        return ExitCode::FAILURE;
    }

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: &E2eConfig) -> Result<(), RunError> {
    match command {
        Commands::WaitKafkaReady { id } => {
            let kafka = kafka_lifecycle(config)?.wait_until_kafka_is_ready(&id)?;
            info!(kafka_id = %kafka.id, bootstrap = ?kafka.bootstrap_server_host, "kafka instance is ready");
        }
        Commands::WaitKafkaDeleted { id } => {
            kafka_lifecycle(config)?.wait_until_kafka_is_deleted(&id)?;
        }
        Commands::WaitRegistryReady { id } => {
            let api = HttpRegistryMgmtApi::new(api_client(config)?);
            let registry = wait_until_registry_is_ready(&api, &id, REGISTRY_READY)?;
            info!(registry_id = %registry.id, url = ?registry.registry_url, "registry is ready");
        }
        Commands::CleanKafka { name } => {
            kafka_lifecycle(config)?.clean_kafka_instance(&name)?;
        }
        Commands::CleanKafkasByOwner { owner } => {
            kafka_lifecycle(config)?.clean_kafka_instances_by_owner(&owner)?;
        }
    }
    Ok(())
}

fn api_client(config: &E2eConfig) -> Result<ApiClient, RunError> {
    let http = try_build_http_client(config.http_timeout)?;
    let retriever = SsoTokenRetriever::new(
        http.clone(),
        config.sso_token_url()?,
        config.sso.client_id.as_str(),
        config.offline_token()?,
    );
    Ok(ApiClient::new(http, config.api_url()?, retriever))
}

fn kafka_lifecycle(
    config: &E2eConfig,
) -> Result<KafkaLifecycle<HttpKafkaMgmtApi<SsoTokenRetriever>>, RunError> {
    let api = HttpKafkaMgmtApi::new(api_client(config)?);
    Ok(KafkaLifecycle::new(api).with_skip_teardown(config.skip_kafka_teardown))
}
