use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jotter::config::{self, Config};

#[derive(Parser)]
#[command(name = "jotter", version, about = "Self-hosted notes service. One binary, SQLite inside, bearer-token auth.")]
struct Cli {
    /// Path to config.toml (defaults to ~/.jotter/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the API server (the default when no subcommand is given).
    Serve {
        /// Bind host override.
        #[arg(long)]
        host: Option<String>,

        /// Bind port override.
        #[arg(long)]
        port: Option<u16>,

        /// SQLite database path override.
        #[arg(long)]
        database: Option<PathBuf>,
    },

    /// Write a starter config with a freshly generated signing secret.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("JOTTER_LOG")
                .unwrap_or_else(|_| EnvFilter::new("jotter=info")),
        )
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
        database: None,
    });

    match command {
        Command::Serve { host, port, database } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(database) = database {
                config.database.path = Some(database);
            }
            jotter::server::run_server(config).await
        }
        Command::Init { force } => {
            let path = cli
                .config
                .unwrap_or_else(config::default_config_path);
            Config::write_starter(&path, force)?;
            println!("🔐 Wrote {} with a fresh signing secret.", path.display());
            Ok(())
        }
    }
}
