use clap::Parser;
use imdscache::{Config, ConfigError, CredentialManager, EnvironmentMapping};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// imdscache: cached instance-role credentials from the metadata service
#[derive(Parser, Debug)]
#[command(name = "imdscache")]
#[command(about = "Fetch, cache and refresh temporary credentials from the instance metadata service", long_about = None)]
struct Cli {
    /// Path to a JSON or YAML configuration file
    #[arg(short, long, env = "IMDSCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Credential cache file
    #[arg(long, env = "IMDSCACHE_CACHE_FILE")]
    cache_file: Option<PathBuf>,

    /// Base address of the metadata service
    #[arg(long, env = "IMDSCACHE_ENDPOINT")]
    endpoint: Option<String>,

    /// Timeout for each metadata request, in seconds
    #[arg(long, env = "IMDSCACHE_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Print `export` statements for the credentials on stdout
    #[arg(long, conflicts_with = "command")]
    export: bool,

    /// Command to run with the credentials in its environment
    #[arg(last = true)]
    command: Vec<String>,
}

impl Cli {
    /// Defaults, then the config file, then flags and environment
    fn resolve_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(cache_file) = &self.cache_file {
            config.cache_file = cache_file.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so `--export` output can be eval'd
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.resolve_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Using cache file: {}", config.cache_file.display());

    let mut manager = match CredentialManager::new(&config) {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!("Failed to initialize credential manager: {}", e);
            std::process::exit(1);
        }
    };

    let credentials = match manager.get_credentials().await {
        Ok(credentials) => credentials,
        Err(e) => {
            tracing::error!("{}: {}", e, e.cause());
            std::process::exit(1);
        }
    };
    let env = credentials.environment();

    if !cli.command.is_empty() {
        let code = run_command(&cli.command, &env).await;
        std::process::exit(code);
    }

    if cli.export {
        for (key, value) in &env {
            println!("export {}={}", key, shell_quote(value));
        }
        return;
    }

    tracing::info!("Retrieved credentials:");
    tracing::info!("Access Key ID: {}", credentials.access_key_id);
    tracing::info!("Expiration: {}", credentials.expiration);
    tracing::info!(
        "AWS_SECRET_ACCESS_KEY: {}",
        mask(&credentials.secret_access_key)
    );
    tracing::info!("AWS_SESSION_TOKEN: {}", mask(&credentials.session_token));
}

/// Run `command` with the credentials injected into its environment only
async fn run_command(command: &[String], env: &EnvironmentMapping) -> i32 {
    let (program, args) = match command.split_first() {
        Some(split) => split,
        None => return 0,
    };

    tracing::info!("Running {} with instance credentials", program);
    match tokio::process::Command::new(program)
        .args(args)
        .envs(env)
        .status()
        .await
    {
        Ok(status) => status.code().unwrap_or(1),
        Err(e) => {
            tracing::error!("Failed to run {}: {}", program, e);
            127
        }
    }
}

fn mask(secret: &str) -> String {
    "*".repeat(secret.len())
}

/// Single-quote a value for POSIX shells
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
