mod gemini_client;
mod cli;

use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use crate::cli::chat::ChatContext;
use crate::gemini_client::{DEFAULT_MODEL, GeminiClient};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Question to ask once, without starting an interactive session
    #[arg(short, long)]
    input: Option<String>,

    /// Gemini model that answers the questions
    #[arg(short, long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL, global = true)]
    model: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat {
        /// Question to ask once, without starting an interactive session
        #[arg(short, long)]
        input: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let client = match GeminiClient::new(cli.model.as_str()) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize Gemini client: {}", e);
            writeln!(io::stderr(), "Failed to initialize Gemini client: {}", e)?;
            return Ok(ExitCode::FAILURE);
        }
    };

    info!("Starting BaseBot with model {}", client.model());

    let input = match cli.command {
        Some(Commands::Chat { input }) => input.or(cli.input),
        None => cli.input,
    };

    let mut chat_context = ChatContext::new(
        Box::new(io::stdout()),
        input,
        true,
        Box::new(client),
    );
    chat_context.run().await
}
