//! # SWAN Exchange Node
//!
//! Entry point for the `swan-node` binary. Parses CLI arguments, initializes
//! logging and metrics, and serves one domain's transaction processor over
//! HTTP.
//!
//! - `run`     : start the node from a TOML configuration
//! - `init`    : generate a signing key and starter configuration
//! - `status`  : query a running node's status endpoint
//! - `version` : print build version information

mod api;
mod cli;
mod config;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use swan_protocol::crypto::DomainKeypair;
use swan_protocol::exchange::{HttpTransport, TransactionProcessor};
use swan_protocol::record::{DomainSigner, SignerRegistry};

use cli::{Commands, SwanNodeCli};
use config::NodeConfig;
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = SwanNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Loads the configuration and serves the exchange API and metrics until a
/// shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format);

    let node_config = NodeConfig::from_toml_file(&args.config)
        .with_context(|| format!("failed to load configuration {}", args.config.display()))?;
    let keypair = node_config
        .load_keypair()
        .context("failed to load signing key")?;
    let domain = node_config.domain;

    tracing::info!(
        domain = %domain.host,
        public_key = %keypair.public_key().to_hex(),
        suppliers = domain.suppliers.len(),
        adverts = domain.adverts.len(),
        bad_actor = domain.bad_actor,
        port = args.port,
        metrics_port = args.metrics_port,
        "starting swan-node"
    );
    if domain.bad_actor {
        tracing::warn!(domain = %domain.host, "bad actor mode enabled");
    }

    // --- Signing ---
    let mut signers = SignerRegistry::new();
    signers.register(Arc::new(DomainSigner::new(domain.host.clone(), keypair)));

    // --- Supplier transport ---
    let transport = HttpTransport::new(domain.scheme.clone(), domain.supplier_timeout())
        .context("failed to build HTTP client")?;

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            swan_protocol::config::PROTOCOL_VERSION,
        ),
        processor: Arc::new(TransactionProcessor::new(
            domain,
            signers,
            Arc::new(transport),
        )),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    tracing::info!("swan-node stopped");
    Ok(())
}

/// Writes `<host>.key` and `<host>.toml` into the output directory.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("swan_node=info", LogFormat::Pretty);

    let out_dir = &args.out_dir;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create directory {}", out_dir.display()))?;

    let key_name = format!("{}.key", args.host);
    let key_path = out_dir.join(&key_name);
    let config_path = out_dir.join(format!("{}.toml", args.host));
    for path in [&key_path, &config_path] {
        if path.exists() && !args.force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }
    }

    let config = NodeConfig::template(&args.host, key_name.into());
    config
        .validate()
        .with_context(|| format!("cannot initialize domain '{}'", args.host))?;

    let keypair = DomainKeypair::generate();
    write_key(&key_path, &keypair)?;

    let toml = config
        .to_toml_string()
        .context("failed to render configuration")?;
    std::fs::write(&config_path, toml)
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    let public_key = keypair.public_key().to_hex();
    tracing::info!(
        domain = %args.host,
        public_key = %public_key,
        key_path = %key_path.display(),
        "signing key generated"
    );

    println!("Domain initialized.");
    println!("  Domain        : {}", args.host);
    println!("  Configuration : {}", config_path.display());
    println!("  Signing key   : {}", key_path.display());
    println!("  Public key    : {}", public_key);

    Ok(())
}

fn write_key(path: &Path, keypair: &DomainKeypair) -> Result<()> {
    std::fs::write(path, keypair.secret_key_hex())
        .with_context(|| format!("failed to write signing key to {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Fetches `/status` from a running node and prints the JSON body.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.url.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("failed to reach {}", url))?;

    let status = response.status();
    let text = response.text().await?;
    let body: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("invalid status response from {}", url))?;
    if !status.is_success() {
        bail!("{} returned {}: {}", url, status, body);
    }

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("swan-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", swan_protocol::config::PROTOCOL_VERSION);
    println!("record    v{}", swan_protocol::config::RECORD_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
