// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyward - a multi-tenant API credential vault with rotation enforcement.
//!
//! This is the binary entry point: configuration, logging, and dispatch to
//! the credential commands and the rotation daemon.

mod commands;
mod output;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use keyward_config::KeywardConfig;
use keyward_core::{
    CredentialId, CredentialStatus, CredentialUpdate, Environment, KeywardError,
    RotationInterval,
};
use keyward_vault::NewCredential;

use crate::commands::{Context, Format};

/// Keyward - encrypted API credential vault with rotation enforcement.
#[derive(Parser, Debug)]
#[command(name = "keyward", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the rotation scheduler until interrupted.
    Serve,
    /// Run one rotation scan now.
    Scan,
    /// Store a new credential (value is read from a hidden prompt).
    Add {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        service: String,
        #[arg(long)]
        description: Option<String>,
        /// development, staging, or production.
        #[arg(long, default_value_t = Environment::Development)]
        environment: Environment,
        /// Repeat for several tags.
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Rotation interval in days (1-365).
        #[arg(long, value_parser = parse_interval)]
        interval_days: Option<RotationInterval>,
        /// Protect with an owner passphrase instead of the service secret.
        #[arg(long)]
        passphrase: bool,
    },
    /// Change a credential's name, description, environment, tags, or interval.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(long)]
        environment: Option<Environment>,
        /// Replace the tag list. Repeat for several tags.
        #[arg(long = "tag", value_name = "TAG", conflicts_with = "clear_tags")]
        tags: Vec<String>,
        #[arg(long)]
        clear_tags: bool,
        /// New rotation interval in days (1-365).
        #[arg(long, value_parser = parse_interval)]
        interval_days: Option<RotationInterval>,
    },
    /// List credential metadata.
    List {
        #[arg(long)]
        owner: Option<String>,
    },
    /// Show one credential's metadata.
    Show { id: String },
    /// Decrypt and print a credential value.
    Reveal { id: String },
    /// Replace a credential value with a new one from a hidden prompt.
    Rotate { id: String },
    /// Replace a credential value with a random one and print it.
    Regenerate {
        id: String,
        /// Random bytes to generate (printed hex-encoded).
        #[arg(long, default_value_t = 32)]
        bytes: usize,
    },
    /// Move a service-secret credential to passphrase protection.
    Rewrap { id: String },
    /// Mark a credential active.
    Activate { id: String },
    /// Mark a credential inactive.
    Deactivate { id: String },
    /// Permanently delete a credential.
    Delete {
        id: String,
        /// Confirm deletion.
        #[arg(long)]
        yes: bool,
    },
}

fn parse_interval(s: &str) -> Result<RotationInterval, String> {
    let days: u16 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a whole number of days"))?;
    RotationInterval::new(days).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => keyward_config::load_and_validate_path(path),
        None => keyward_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            keyward_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.service.log_level);

    if let Err(e) = run(cli, config).await {
        if e.is_decryption_failure() {
            eprintln!("error: {}", KeywardError::Decryption);
        } else {
            eprintln!("error: {e}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: KeywardConfig) -> Result<(), KeywardError> {
    let format = Format { json: cli.json };

    match cli.command {
        Commands::Serve => return serve::run_serve(config).await,
        Commands::Scan => {
            let report = serve::run_scan(&config).await?;
            if format.json {
                println!("{}", output::to_json(&report)?);
            } else {
                println!("{}", output::format_report(&report));
            }
            return Ok(());
        }
        _ => {}
    }

    let ctx = Context::open(&config, format).await?;
    let result = dispatch(&ctx, cli.command).await;
    ctx.close().await?;
    result
}

async fn dispatch(ctx: &Context, command: Commands) -> Result<(), KeywardError> {
    match command {
        Commands::Add {
            owner,
            name,
            service,
            description,
            environment,
            tags,
            interval_days,
            passphrase,
        } => {
            let new = NewCredential {
                owner_id: owner,
                name,
                service,
                description,
                environment,
                tags,
                rotation_interval: interval_days,
            };
            ctx.add(new, passphrase).await
        }
        Commands::Update {
            id,
            name,
            description,
            clear_description,
            environment,
            tags,
            clear_tags,
            interval_days,
        } => {
            let changes = CredentialUpdate {
                name,
                description: if clear_description {
                    Some(None)
                } else {
                    description.map(Some)
                },
                environment,
                tags: if clear_tags {
                    Some(Vec::new())
                } else {
                    (!tags.is_empty()).then_some(tags)
                },
                rotation_interval: interval_days,
            };
            ctx.update(&CredentialId::from(id.as_str()), changes).await
        }
        Commands::List { owner } => ctx.list(owner.as_deref()).await,
        Commands::Show { id } => ctx.show(&CredentialId::from(id.as_str())).await,
        Commands::Reveal { id } => ctx.reveal(&CredentialId::from(id.as_str())).await,
        Commands::Rotate { id } => ctx.rotate(&CredentialId::from(id.as_str())).await,
        Commands::Regenerate { id, bytes } => {
            ctx.regenerate(&CredentialId::from(id.as_str()), bytes).await
        }
        Commands::Rewrap { id } => ctx.rewrap(&CredentialId::from(id.as_str())).await,
        Commands::Activate { id } => {
            ctx.set_status(&CredentialId::from(id.as_str()), CredentialStatus::Active)
                .await
        }
        Commands::Deactivate { id } => {
            ctx.set_status(&CredentialId::from(id.as_str()), CredentialStatus::Inactive)
                .await
        }
        Commands::Delete { id, yes } => ctx.delete(&CredentialId::from(id.as_str()), yes).await,
        Commands::Serve | Commands::Scan => Err(KeywardError::Internal(
            "daemon commands are dispatched before the vault opens".to_string(),
        )),
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
///
/// Logs go to stderr so revealed values on stdout stay pipeable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("keyward={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
