use anyhow::Result;
use clap::{Parser, Subcommand};
use gembridge_auth::{CredentialStore, FileCredentialStore, GoogleAuth, OAuthClientCredentials};
use gembridge_config::Config;
use gembridge_proxy::AppState;
use std::{path::PathBuf, sync::Arc};

#[derive(Parser, Debug)]
#[command(
    name = "gembridge",
    about = "gembridge — local OpenAI/Anthropic-compatible proxy for Gemini Code Assist"
)]
struct Cli {
    /// Path to the YAML/JSON configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the proxy server.
    Serve {
        /// Override the listening port (default: 8317).
        #[arg(short, long)]
        port: Option<u16>,
        /// Override the listening address (default: 127.0.0.1).
        #[arg(long)]
        host: Option<String>,
    },
    /// Sign in with Google and store the credential.
    Login,
    /// Remove the stored credential.
    Logout,
    /// Show authentication status.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port, host } => cmd_serve(config, port, host).await,
        Commands::Login => cmd_login(&config).await,
        Commands::Logout => cmd_logout(&config).await,
        Commands::Status => cmd_status(&config).await,
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path).map_err(|e| anyhow::anyhow!("config error: {e}")),
        None => Ok(Config::default()),
    }
}

fn open_store(config: &Config) -> Arc<dyn CredentialStore> {
    let path = config
        .credentials_path
        .clone()
        .unwrap_or_else(FileCredentialStore::default_path);
    Arc::new(FileCredentialStore::new(path))
}

fn oauth_credentials(config: &Config) -> Option<OAuthClientCredentials> {
    config
        .oauth
        .client_id()
        .map(|client_id| OAuthClientCredentials {
            client_id,
            client_secret: config.oauth.client_secret(),
        })
}

async fn cmd_serve(mut config: Config, port: Option<u16>, host: Option<String>) -> Result<()> {
    if let Some(p) = port {
        config.port = p;
    }
    if let Some(h) = host {
        config.host = h;
    }

    let store = open_store(&config);
    let auth = Arc::new(GoogleAuth::new(
        rquest::Client::new(),
        store,
        oauth_credentials(&config),
        config.project.clone(),
    ));

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, auth);
    let app = gembridge_proxy::make_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "gembridge listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn cmd_login(config: &Config) -> Result<()> {
    let credentials = oauth_credentials(config).ok_or_else(|| {
        anyhow::anyhow!(
            "no OAuth client configured; set oauth.client_id in the config file or \
             GEMBRIDGE_OAUTH_CLIENT_ID in the environment"
        )
    })?;
    let store = open_store(config);
    let http = rquest::Client::new();
    gembridge_auth::login(&http, &credentials, &store)
        .await
        .map_err(|e| anyhow::anyhow!("login failed: {e}"))?;
    eprintln!("login successful");
    Ok(())
}

async fn cmd_logout(config: &Config) -> Result<()> {
    let store = open_store(config);
    store
        .remove()
        .await
        .map_err(|e| anyhow::anyhow!("logout failed: {e}"))?;
    eprintln!("logged out");
    Ok(())
}

async fn cmd_status(config: &Config) -> Result<()> {
    let store = open_store(config);
    match store.load().await {
        Ok(Some(token)) => {
            let state = match token.state() {
                gembridge_types::TokenState::Valid => "authenticated",
                gembridge_types::TokenState::Expired => "expired (refreshable)",
                gembridge_types::TokenState::Invalid => "expired (login required)",
            };
            println!("google: {state}");
        }
        Ok(None) => println!("google: not authenticated"),
        Err(e) => println!("google: error ({e})"),
    }
    Ok(())
}
