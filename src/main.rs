use clap::{Parser, Subcommand};
use source_scout::{
    DEFAULT_BASE_URL, DEFAULT_PROXY_BASE_URL, DEFAULT_SERVER_COUNT, EnvelopeDecoder, MediaKind,
    MediaObject, Provider, ScoutConfig, VidZeeProvider,
};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Collect playable stream sources for a title from all mirror servers
#[derive(Debug, Parser)]
#[command(name = "source_scout", version, about)]
struct Cli {
    /// Origin of the mirror player API
    #[arg(long, env = "SOURCE_SCOUT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Number of mirror servers to probe
    #[arg(long, env = "SOURCE_SCOUT_SERVERS", default_value_t = DEFAULT_SERVER_COUNT)]
    servers: usize,

    /// Timeout for each mirror probe, in milliseconds
    #[arg(long, env = "SOURCE_SCOUT_PROBE_TIMEOUT_MS", default_value_t = 8000)]
    probe_timeout_ms: u64,

    /// Timeout for the health probe, in milliseconds
    #[arg(long, env = "SOURCE_SCOUT_HEALTH_TIMEOUT_MS", default_value_t = 5000)]
    health_timeout_ms: u64,

    /// Origin of the proxy that rewritten URLs point at
    #[arg(long, env = "SOURCE_SCOUT_PROXY_URL", default_value = DEFAULT_PROXY_BASE_URL)]
    proxy_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Collect sources for a movie
    Movie {
        /// TMDB id of the movie
        tmdb_id: String,
    },

    /// Collect sources for a TV episode
    Tv {
        /// TMDB id of the show
        tmdb_id: String,
        #[arg(short, long)]
        season: Option<u32>,
        #[arg(short, long)]
        episode: Option<u32>,
    },

    /// Check whether the mirror origin is reachable
    Health,

    /// Decode an encrypted envelope and print its plaintext
    Decode {
        /// Base64 envelope
        envelope: String,
    },
}

impl Cli {
    fn config(&self) -> ScoutConfig {
        ScoutConfig {
            base_url: self.base_url.clone(),
            server_count: self.servers,
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            health_timeout: Duration::from_millis(self.health_timeout_ms),
            proxy_base_url: self.proxy_url.clone(),
            ..ScoutConfig::default()
        }
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("source_scout=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_provider(config: ScoutConfig) -> Option<VidZeeProvider> {
    match VidZeeProvider::new(config) {
        Ok(provider) => Some(provider),
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

/// Runs one aggregation and prints the result as JSON
async fn print_sources(config: ScoutConfig, media: MediaObject, kind: MediaKind) -> ExitCode {
    let Some(provider) = build_provider(config) else {
        return ExitCode::FAILURE;
    };

    let result = provider.aggregate(&media, kind).await;

    match serde_json::to_string_pretty(&result) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: failed to serialize result: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let config = cli.config();

    match cli.command {
        Command::Movie { tmdb_id } => {
            print_sources(config, MediaObject::movie(tmdb_id), MediaKind::Movie).await
        }
        Command::Tv {
            tmdb_id,
            season,
            episode,
        } => {
            let media = MediaObject {
                tmdb_id,
                season,
                episode,
            };
            print_sources(config, media, MediaKind::Tv).await
        }
        Command::Health => {
            let Some(provider) = build_provider(config) else {
                return ExitCode::FAILURE;
            };

            if provider.health_check().await {
                println!("healthy");
                ExitCode::SUCCESS
            } else {
                println!("unhealthy");
                ExitCode::FAILURE
            }
        }
        Command::Decode { envelope } => {
            // Prints an empty line when the envelope cannot be opened
            println!("{}", EnvelopeDecoder::default().decode(&envelope));
            ExitCode::SUCCESS
        }
    }
}
