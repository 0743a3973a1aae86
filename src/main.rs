use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{AuthCommand, ConfigCommand, DocCommand, DraftCommand};
use loomsync::{Config, LocalStore};

#[derive(Parser)]
#[command(name = "loomsync")]
#[command(version)]
#[command(about = "Edit site content offline and publish it as atomic commits", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in to a repository
    Auth(AuthCommand),

    /// Work with documents in the repository
    Doc(DocCommand),

    /// Manage unpublished drafts
    Draft(DraftCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loomsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    let command = match cli.command {
        Some(Commands::Config(cmd)) => return cmd.run(&config),
        Some(command) => command,
        None => {
            println!("Use --help to see available commands");
            return Ok(());
        }
    };

    let store = LocalStore::open(&config.database_path.value).await?;
    let result = match command {
        Commands::Auth(cmd) => cmd.run(&store, &config).await,
        Commands::Doc(cmd) => cmd.run(&store, &config).await,
        Commands::Draft(cmd) => cmd.run(&store).await,
        Commands::Config(_) => Ok(()),
    };
    store.close().await;

    result
}
