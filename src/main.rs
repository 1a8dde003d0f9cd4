use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "skein")]
#[command(about = "Chronological multi-source log merger", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Run,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Diagnostics go to stderr; stdout belongs to the merged stream.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skein=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = skein::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run) | None => {
            skein::cli::run::run(config_path).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                skein::cli::config::init(stdout)?;
            }
        },
    }

    Ok(())
}
