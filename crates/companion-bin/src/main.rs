//! Companion background process: credential vault, rate limiting, and the
//! message host the extension talks to.

mod app;
mod gate;
mod handlers;
mod host;
mod protocol;

use std::path::PathBuf;

use app::Services;
use clap::{Parser, Subcommand};
use companion_config_and_utils::{init_logging, Config, Paths};
use companion_vault::FileIdentity;
use protocol::{Action, Reply};
use tokio::io::BufReader;
use tracing::info;

/// Companion background command-line interface.
#[derive(Parser)]
#[command(name = "companion-background")]
#[command(about = "Credential vault and rate limiter for the companion extension")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (store, identity, logs, config). Defaults to ~/.companion
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve newline-delimited JSON requests on stdin/stdout
    Serve,
    /// Create the installation identity if it does not exist yet
    Provision,
    /// Encrypt a value under the installation key
    Encrypt { plaintext: String },
    /// Decrypt a stored value (legacy plaintext passes through)
    Decrypt { stored: String },
    /// Check and record a call against a rate-limit category
    CheckRate { category: String },
    /// Encrypt and store the API key
    SaveSecret { plaintext: String },
    /// Print the stored API key
    RevealSecret,
    /// Remove the stored API key
    ClearSecret,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;

    let mut config = Config::load(&paths)?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
        config.validate()?;
    }

    // Initialize logging
    init_logging(
        &config.log_level,
        Some(paths.log_file().as_path()),
        config.also_stderr,
    );

    let identity = FileIdentity::new(paths.installation_id_file());

    let action = match cli.command {
        None | Some(Commands::Serve) => {
            identity.provision()?;
            let services = Services::open(&paths);
            let stdin = BufReader::new(tokio::io::stdin());
            host::serve(&services, stdin, tokio::io::stdout()).await?;
            return Ok(());
        }
        Some(Commands::Provision) => {
            let id = identity.provision()?;
            info!("Installation identity ready");
            println!("{}", id);
            return Ok(());
        }
        Some(Commands::Encrypt { plaintext }) => Action::EncryptSecret { plaintext },
        Some(Commands::Decrypt { stored }) => Action::DecryptSecret { stored },
        Some(Commands::CheckRate { category }) => Action::CheckRate { category },
        Some(Commands::SaveSecret { plaintext }) => Action::SaveSecret { plaintext },
        Some(Commands::RevealSecret) => Action::RevealSecret,
        Some(Commands::ClearSecret) => Action::ClearSecret,
    };

    let services = Services::open(&paths);
    let reply = handlers::handle(&services, action).await;
    println!("{}", serde_json::to_string(&reply)?);

    if let Reply::Error { error } = reply {
        return Err(error.into());
    }
    Ok(())
}
