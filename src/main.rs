use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use embed_token::comms::http_api;
use embed_token::config::Config;
use embed_token::registry::generate_token;
use embed_token::utils::logging;

#[derive(Parser)]
#[command(name = "embed-token", version, about = "Short-lived handoff tokens for embedded dashboards")]
struct AppCli {
    /// JSON config file; environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP token service
    Serve {
        /// Overrides the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print a random secret suitable for API_KEY
    GenerateKey,
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Config::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AppCli::parse();

    let port_override = match args.command {
        Some(Commands::GenerateKey) => {
            println!("{}", generate_token());
            return Ok(());
        }
        Some(Commands::Serve { port }) => port,
        // Default: serve with the configured port
        None => None,
    };

    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = port_override {
        config.port = port;
    }
    logging::init(config.log_format);
    info!(version = embed_token::VERSION, "starting token service");
    http_api::serve(config).await?;

    Ok(())
}
