mod cli;
mod utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use cli::{
    chat::{chat_cmd, generate_cmd},
    hash::hash_cmd,
    list::list_cmd,
    ColorMode,
};
use tracing_subscriber::EnvFilter;
use xinfer::config::read_config;
use xinfer::ProviderId;

const LOG_ENV_VAR: &str = "XINFER_LOG";

#[derive(
    Parser, Default, Clone, Copy, ValueEnum, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum RequestedColorMode {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "xinfer")]
#[command(
    about = "Run inference on Hub models through third-party providers",
    version = "0.0.1"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, default_value_t = RequestedColorMode::default())]
    color: RequestedColorMode,
    /// Read the configuration from the specified file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a chat completion
    Chat(GenerationArgs),
    /// Run a text generation
    Generate(GenerationArgs),
    /// List registered models or providers
    List(ListArgs),
    /// Print the SHA-256 digest of files
    Hash(HashArgs),
}

#[derive(Parser)]
pub(crate) struct GenerationArgs {
    /// The Hub model to run
    #[arg(short, long)]
    model: String,
    /// Use the specified provider instead of picking one
    #[arg(short, long)]
    provider: Option<ProviderId>,
    /// Limit the number of generated tokens
    #[arg(long)]
    max_tokens: Option<u64>,
    /// Wait for the whole answer instead of streaming it
    #[arg(long)]
    no_stream: bool,
    /// The prompt, read from standard input when omitted
    prompt: Option<String>,
}

/// Possible listings
#[derive(Subcommand)]
pub(crate) enum ListObject {
    /// Registered models
    Models(ListModelArgs),
    /// Providers
    Providers,
}

/// Output formats
#[derive(
    Parser, ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum ListingFormat {
    /// Format the output as a table
    #[default]
    Table,
    /// Format the output as JSON
    Json,
    /// Format the output as a table without a header
    HeaderlessTable,
}

#[derive(Parser)]
pub(crate) struct ListArgs {
    /// Output the listing with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
    /// List the specified object
    #[command(subcommand)]
    object: ListObject,
}

#[derive(Parser, Default)]
pub(crate) struct ListModelArgs {
    /// Limit listing to the specified provider
    #[arg(short, long)]
    provider: Option<ProviderId>,
}

#[derive(Parser)]
pub(crate) struct HashArgs {
    /// Files to hash
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn init_logging(color: ColorMode) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(matches!(color, ColorMode::On))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let color = ColorMode::resolve_auto(cli.color);

    utils::errors::configure_color(color);
    init_logging(color);

    // Hashing does not depend on the configuration.
    if let Commands::Hash(args) = &cli.command {
        hash_cmd(args);
        return;
    }

    let config = match read_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => die!("{}", err),
    };

    match &cli.command {
        Commands::Chat(args) => chat_cmd(&config, args).await,
        Commands::Generate(args) => generate_cmd(&config, args).await,
        Commands::List(args) => list_cmd(&config, args),
        Commands::Hash(_) => {}
    }
}
