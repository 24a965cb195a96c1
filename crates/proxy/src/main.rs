//! Frontdoor - Main entry point
//!
//! A multi-tenant front door built on Pingora.

// Allow field reassignment for Pingora's Opt/ServerConf structs
#![allow(clippy::field_reassign_with_default)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pingora::prelude::*;
use pingora::server::configuration::ServerConf;
use tracing::{error, info, warn};

use frontdoor_config::{ConfigOverrides, FrontDoorConfig};
use frontdoor_proxy::{
    site_source, ApprovalRequest, DomainApprovalGate, DomainApprover, DomainRegistry, FrontDoor,
};

/// Frontdoor - multi-tenant virtual hosting with certificate policy management
#[derive(Parser, Debug)]
#[command(name = "frontdoor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long = "config", env = "FRONTDOOR_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Maintainer contact for certificate requests
    #[arg(long = "maintainer-email", env = "FRONTDOOR_MAINTAINER_EMAIL", global = true)]
    maintainer_email: Option<String>,

    /// Directory containing one subdirectory per site
    #[arg(long = "sites", env = "FRONTDOOR_SITES", global = true)]
    sites: Option<PathBuf>,

    /// Directory holding the certificate policy document
    #[arg(long = "policy-dir", env = "FRONTDOOR_POLICY_DIR", global = true)]
    policy_dir: Option<PathBuf>,

    /// Use the staging certificate authority
    #[arg(
        long = "staging",
        env = "FRONTDOOR_STAGING",
        value_parser = clap::builder::BoolishValueParser::new(),
        global = true
    )]
    staging: Option<bool>,

    /// Run in daemon mode (background)
    #[arg(short = 'd', long = "daemon")]
    daemon: bool,

    /// Upgrade from a running instance
    #[arg(short = 'u', long = "upgrade")]
    upgrade: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the server (default)
    Run,
    /// Validate configuration, discover sites and exit
    Test,
    /// Reconcile the certificate policy document and exit
    Reconcile,
    /// Ask the approval gate about a fresh certificate for a domain
    Approve {
        /// Domain to request a certificate for
        domain: String,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let result = match &cli.command {
        None | Some(Commands::Run) => run_server(&cli),
        Some(Commands::Test) => test_config(&cli),
        Some(Commands::Reconcile) => reconcile_policy(&cli),
        Some(Commands::Approve { domain }) => approve_domain(&cli, domain),
    };

    if let Err(ref e) = result {
        error!(error = %format!("{:#}", e), "frontdoor exited with an error");
    }
    result
}

fn init_logging(verbose: bool, format: LogFormat) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

/// Load the configuration file (or embedded default) and apply overrides
fn load_config(cli: &Cli) -> Result<FrontDoorConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            FrontDoorConfig::from_file(path).context("Failed to load configuration file")?
        }
        None => {
            info!("No configuration specified, using embedded default configuration");
            FrontDoorConfig::default_embedded().context("Failed to load embedded configuration")?
        }
    };

    config.apply_overrides(ConfigOverrides {
        maintainer_email: cli.maintainer_email.clone(),
        sites_source: cli.sites.clone(),
        policy_dir: cli.policy_dir.clone(),
        staging: cli.staging,
    });
    config.validate().context("Configuration validation failed")?;

    Ok(config)
}

/// Validate configuration, discover sites and exit
fn test_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    let registry = DomainRegistry::discover(&site_source(&config))
        .with_context(|| format!("Failed to discover sites in {}", config.sites.source.display()))?;

    info!("Configuration test successful:");
    info!("  - listening on {}", config.server.listen);
    if let Some((addr, _, _)) = config.server.tls_listener() {
        info!("  - TLS listening on {}", addr);
    }
    info!("  - {} site(s), {} host name(s)", registry.site_count(), registry.len());
    info!("  - policy document {}", config.acme.policy_path().display());
    info!("  - certificate authority {}", config.acme.directory_url());

    if registry.is_empty() {
        warn!("No sites found in {}", config.sites.source.display());
    }

    println!(
        "frontdoor: configuration {} test is successful",
        cli.config
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(embedded)".to_string())
    );
    Ok(())
}

/// Reconcile the policy document and report what happened
fn reconcile_policy(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let front_door = FrontDoor::bootstrap(config).context("Startup failed")?;

    let outcome = front_door.policy_outcome();
    let state = if outcome.created {
        "created"
    } else if outcome.changed {
        "updated"
    } else {
        "unchanged"
    };

    println!(
        "frontdoor: policy {} {} ({} site(s))",
        front_door.config().acme.policy_path().display(),
        state,
        outcome.document.sites.len()
    );
    for subject in &outcome.dropped {
        println!("frontdoor: dropped {}", subject);
    }
    Ok(())
}

/// Print the approval decision for a fresh certificate request
fn approve_domain(cli: &Cli, domain: &str) -> Result<()> {
    let config = load_config(cli)?;

    let registry = DomainRegistry::discover(&site_source(&config))
        .with_context(|| format!("Failed to discover sites in {}", config.sites.source.display()))?;
    let gate = DomainApprovalGate::new(registry.into(), config.acme.maintainer_email.clone());

    let decision = gate
        .approve(&ApprovalRequest::new(domain), None)
        .context("Certificate request rejected")?;

    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

/// Run the server
fn run_server(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let front_door = FrontDoor::bootstrap(config).context("Startup failed")?;
    let config = front_door.config();

    // Build Pingora options
    let mut pingora_opt = Opt::default();
    pingora_opt.daemon = cli.daemon || config.server.daemon;
    pingora_opt.upgrade = cli.upgrade;

    let mut pingora_conf = ServerConf::default();
    if let Some(ref pid_path) = config.server.pid_file {
        pingora_conf.pid_file = pid_path.to_string_lossy().to_string();
    }

    let mut server = Server::new_with_opt_and_conf(Some(pingora_opt), pingora_conf);
    server.bootstrap();

    let mut service = http_proxy_service(&server.configuration, front_door.service());

    service.add_tcp(&config.server.listen);
    info!("HTTP listening on: {}", config.server.listen);

    if let Some((addr, cert, key)) = config.server.tls_listener() {
        let cert_path = cert.to_string_lossy();
        let key_path = key.to_string_lossy();
        let mut tls_settings =
            pingora::listeners::tls::TlsSettings::intermediate(&cert_path, &key_path).map_err(
                |e| anyhow::anyhow!("Failed to load TLS certificate {}: {}", cert_path, e),
            )?;
        tls_settings.enable_h2();
        service.add_tls_with_settings(addr, None, tls_settings);
        info!(cert_file = %cert_path, "HTTPS listening on: {}", addr);
    }

    server.add_service(service);

    setup_signal_handlers();

    info!(
        sites = front_door.registry().site_count(),
        hosts = front_door.registry().len(),
        policy = %config.acme.policy_path().display(),
        "Frontdoor started successfully"
    );

    server.run_forever();
}

/// Setup signal handlers for graceful operations
fn setup_signal_handlers() {
    use signal_hook::consts::signal::*;
    use signal_hook::iterator::Signals;
    use std::thread;

    let mut signals =
        Signals::new([SIGTERM, SIGINT, SIGHUP]).expect("Failed to register signal handlers");

    thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, initiating graceful shutdown");
                    std::process::exit(0);
                }
                SIGHUP => {
                    info!("Received SIGHUP; sites are discovered at startup, restart to pick up changes");
                }
                _ => {}
            }
        }
    });
}
