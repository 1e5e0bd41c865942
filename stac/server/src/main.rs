use clap::{Parser, Subcommand};
use stac_server::config::Config;
use tracing::Level;

/// STAC API server backed by PostgreSQL.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Print the resolved settings as shell `export` statements
    Env,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = Config::from_env()?;

    let level = if config.reload {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => stac_server::web::start_web_server(config).await,
        Commands::Env => {
            print!("{}", config.to_env_exports());
            Ok(())
        }
    }
}
