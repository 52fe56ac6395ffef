//! `akv` - read and write Azure Key Vault secrets, encrypt and decrypt with vault keys.
//!
//! Authentication is picked from the environment, see `akv auth`.

use std::env;

use anyhow::{Context, Result};
use azure_keyvault_client::models::{
    DecryptRequest, EncryptRequest, EncryptionAlgorithm, SecretAttributes, SetSecretRequest,
};
use azure_keyvault_client::{
    AuthenticatorFactory, EnvConfig, HttpClientFactory, HttpClientOptions, KeyVaultClient,
    DEFAULT_PAGE_SIZE,
};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;

const VAULT_RESOURCE: &str = "https://vault.azure.net";

/// Azure Key Vault command-line client
#[derive(Parser)]
#[command(name = "akv")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Vault base URL, e.g. https://my-vault.vault.azure.net
    #[arg(long, global = true, env = "AZURE_KEY_VAULT_URL")]
    vault_url: Option<String>,

    /// Also try workload identity federation before managed identity
    #[arg(long, global = true)]
    workload_identity: bool,

    /// Retries for throttled or failed requests (0-100)
    #[arg(long, global = true, default_value_t = 10)]
    max_retries: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show which authentication method is used and check a token can be acquired
    Auth,
    #[command(flatten)]
    Vault(VaultCommand),
}

#[derive(Subcommand)]
enum VaultCommand {
    /// Print a secret value
    Get {
        name: String,
        /// Specific version instead of the latest one
        #[arg(long)]
        secret_version: Option<String>,
    },
    /// Create or update a secret
    Set {
        name: String,
        value: String,
        #[arg(long)]
        content_type: Option<String>,
        /// Create the secret disabled
        #[arg(long)]
        disabled: bool,
    },
    /// List secret names
    List {
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
    /// Delete a secret
    Delete { name: String },
    /// Encrypt a UTF-8 string with a vault key, printing base64url ciphertext
    Encrypt {
        key: String,
        key_version: String,
        plaintext: String,
        #[arg(long, default_value = "RSA-OAEP-256")]
        alg: EncryptionAlgorithm,
    },
    /// Decrypt base64url ciphertext produced by `encrypt`
    Decrypt {
        key: String,
        key_version: String,
        ciphertext: String,
        #[arg(long, default_value = "RSA-OAEP-256")]
        alg: EncryptionAlgorithm,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logger()?;
    let cli = Cli::parse();

    let http = HttpClientFactory::with_options(
        HttpClientOptions::default().with_max_retries(cli.max_retries),
    );
    let authenticators = if cli.workload_identity {
        AuthenticatorFactory::workload_identity()
    } else {
        AuthenticatorFactory::new()
    };

    let command = match cli.command {
        Command::Auth => return check_auth(&http, &authenticators).await,
        Command::Vault(command) => command,
    };

    let vault_url = cli
        .vault_url
        .context("Vault URL is not set, use --vault-url or AZURE_KEY_VAULT_URL")?;
    let client = KeyVaultClient::builder()
        .vault_url(vault_url)
        .http_factory(http)
        .authenticator_factory(authenticators)
        .build()
        .await?;

    run(&client, command).await
}

async fn run(client: &KeyVaultClient, command: VaultCommand) -> Result<()> {
    match command {
        VaultCommand::Get {
            name,
            secret_version,
        } => {
            let secret = client.get_secret(&name, secret_version.as_deref()).await?;
            println!("{}", secret.value);
        }
        VaultCommand::Set {
            name,
            value,
            content_type,
            disabled,
        } => {
            let attributes = SecretAttributes {
                enabled: Some(!disabled),
                ..Default::default()
            };
            let mut request = SetSecretRequest::new(value, attributes);
            if let Some(content_type) = content_type {
                request = request.with_content_type(content_type);
            }
            let secret = client.set_secret(&request, &name).await?;
            println!("{}", secret.id);
        }
        VaultCommand::List { page_size } => {
            for item in client.get_all_secrets(page_size).await? {
                println!("{}", item.name()?);
            }
        }
        VaultCommand::Delete { name } => {
            let deleted = client.delete_secret(&name).await?;
            println!("{}", serde_json::to_string_pretty(&deleted)?);
        }
        VaultCommand::Encrypt {
            key,
            key_version,
            plaintext,
            alg,
        } => {
            let request = EncryptRequest::new(alg, plaintext);
            let result = client.encrypt(&request, &key, &key_version).await?;
            println!("{}", result.value);
        }
        VaultCommand::Decrypt {
            key,
            key_version,
            ciphertext,
            alg,
        } => {
            let request = DecryptRequest::new(alg, ciphertext);
            let result = client.decrypt(&request, &key, &key_version).await?;
            println!("{}", String::from_utf8_lossy(&result.decoded_value()?));
        }
    }
    Ok(())
}

async fn check_auth(http: &HttpClientFactory, authenticators: &AuthenticatorFactory) -> Result<()> {
    let authenticator = authenticators
        .get_authenticator(http, &EnvConfig::from_env(), VAULT_RESOURCE)
        .await?;
    println!("{}", authenticator.name());

    let token = authenticator
        .get_authentication_token()
        .await
        .with_context(|| format!("{} failed to acquire a token", authenticator.name()))?;
    println!("token acquired ({} bytes)", token.len());
    Ok(())
}

fn init_logger() -> Result<Option<WorkerGuard>> {
    use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
    use tracing_log::LogTracer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::{EnvFilter, Registry};

    // stdout carries command output
    if !env::var("JSON_LOG").is_ok_and(|s| s.parse().unwrap_or_default()) {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
        return Ok(None);
    }

    // Redirect the logs from log library to tracing's subscribers.
    LogTracer::init()?;

    let app_name = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")).to_string();
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);
    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(JsonStorageLayer)
        .with(bunyan_formatting_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(Some(guard))
}
