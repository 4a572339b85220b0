//! `ucp-trust`: key management, signing, verification and capability
//! negotiation from the command line.
//!
//! Configuration is read from `--config` (default `ucp-trust.toml`); a missing
//! file means defaults. Logs go to stderr, controlled by `LOG_FORMAT` and
//! `RUST_LOG`.

mod commands;
mod observability;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use ucp_trust::{config::TrustConfig, keys::FileConfigStore};

use crate::{
    commands::{Session, negotiate_documents, parse_keys, read_input},
    observability::{HealthStatus, LogFormat, init_observability},
};

#[derive(Debug, Parser)]
#[command(name = "ucp-trust", version, about = "Signing identities and capability negotiation for UCP")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "ucp-trust.toml")]
    config: PathBuf,

    /// Scope to operate on (defaults to `default_scope` from the configuration)
    #[arg(long, global = true)]
    scope: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a new signing key, replacing any existing one, and print the JWK Set
    Keygen,

    /// Print the JWK Set, generating a key on first use
    Jwks,

    /// Sign JSON claims as a compact token
    SignToken {
        /// Claims as a JSON object
        claims: String,
    },

    /// Verify a compact token against the scope's keys and print its claims
    VerifyToken {
        /// Compact token
        token: String,
    },

    /// Produce a detached signature over a body
    SignDetached {
        /// Body file (stdin if omitted or `-`)
        #[arg(long)]
        body: Option<PathBuf>,
    },

    /// Verify a detached signature over a body
    VerifyDetached {
        /// Detached signature `header..signature`
        signature: String,

        /// Body file (stdin if omitted or `-`)
        #[arg(long)]
        body: Option<PathBuf>,

        /// JWK Set or profile with the signer's keys (defaults to the scope's own keys)
        #[arg(long)]
        keys: Option<PathBuf>,
    },

    /// Sign a JSON payload and store the signature in one of its top-level fields
    SignPayload {
        /// Payload file (stdin if omitted or `-`)
        #[arg(long)]
        payload: Option<PathBuf>,

        /// Field that holds the signature and is excluded from the signed content
        #[arg(long, default_value = "signature")]
        field: String,
    },

    /// Verify a signature stored inside a JSON payload
    VerifyPayload {
        /// Dot-separated path of the signature, e.g. `ap2.merchant_authorization`
        #[arg(long)]
        path: String,

        /// Payload file (stdin if omitted or `-`)
        #[arg(long)]
        payload: Option<PathBuf>,

        /// JWK Set or profile with the signer's keys (defaults to the scope's own keys)
        #[arg(long)]
        keys: Option<PathBuf>,
    },

    /// Negotiate capabilities between two capability lists or profiles
    Negotiate {
        /// Capabilities the platform supports
        available: PathBuf,

        /// Capabilities the business offers
        requested: PathBuf,
    },

    /// Report on the scope's signing identity
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = TrustConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    init_observability(LogFormat::resolve(&config.log_format), cli.verbose);

    let scope = cli.scope.clone().unwrap_or_else(|| config.default_scope.clone());
    debug!(scope = %scope, key_store = %config.key_store.display(), "starting");

    let output = run(cli.command, &config, &scope)?;
    println!("{output}");
    Ok(())
}

fn run(command: Command, config: &TrustConfig, scope: &str) -> Result<String> {
    let session = Session::new(FileConfigStore::open(&config.key_store), scope);

    match command {
        Command::Keygen => session.keygen(),
        Command::Jwks => session.jwks(),
        Command::SignToken { claims } => session.sign_token(&claims),
        Command::VerifyToken { token } => session.verify_token(&token),
        Command::SignDetached { body } => session.sign_detached(&read_input(body.as_deref())?),
        Command::VerifyDetached { signature, body, keys } => {
            let keys = keys.as_deref().map(load_keys).transpose()?;
            session.verify_detached(&signature, &read_input(body.as_deref())?, keys)?;
            Ok("valid".to_owned())
        }
        Command::SignPayload { payload, field } => {
            session.sign_payload(&read_input(payload.as_deref())?, &field)
        }
        Command::VerifyPayload { path, payload, keys } => {
            let keys = keys.as_deref().map(load_keys).transpose()?;
            session.verify_payload(&read_input(payload.as_deref())?, &path, keys)?;
            Ok("valid".to_owned())
        }
        Command::Negotiate { available, requested } => {
            negotiate_documents(&read_text(&available)?, &read_text(&requested)?)
        }
        Command::Doctor => {
            let report = session.doctor(&config.key_store.display().to_string());
            let json = report.to_json()?;
            if report.status == HealthStatus::Unhealthy {
                anyhow::bail!("{json}");
            }
            Ok(json)
        }
    }
}

fn load_keys(path: &Path) -> Result<Vec<ucp_trust::keys::Jwk>> {
    parse_keys(&read_text(path)?).with_context(|| format!("invalid key file {}", path.display()))
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}
