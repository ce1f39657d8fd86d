//! newsdesk - AWS news assistant for the terminal

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{chat_command, init_command, status_command, tools_command};

/// newsdesk - ask what AWS just launched
#[derive(Parser)]
#[command(name = "newsdesk")]
#[command(about = "◆ AWS news assistant for your terminal")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config and audit directory
    Init,
    /// Chat with the assistant
    Chat {
        /// Message to send
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Print the tool descriptors sent to the model
    Tools,
    /// Show system status
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let (label, outcome) = match cli.command {
        Commands::Init => ("Init", init_command().await),
        Commands::Chat { message } => ("Chat", chat_command(message).await),
        Commands::Tools => ("Tools", tools_command().await),
        Commands::Status => ("Status", status_command().await),
    };

    if let Err(e) = outcome {
        error!("{} failed: {:#}", label, e);
        std::process::exit(1);
    }
}
