use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use audio_resolver::resolver::utils::build_http_client;
use audio_resolver::{AudioResolver, ResolverConfig, SearchClient};

#[derive(Parser, Debug)]
#[command(name = "audio-resolver", version, about = "Resolve video links into local audio files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve one or more references and print the local paths
    ///
    /// Flags override the matching `RESOLVER_*` / `YTDLP_PATH` environment variables.
    Resolve {
        /// Local file paths or YouTube links
        #[arg(required = true)]
        references: Vec<String>,

        /// Strategy priority, e.g. "extraction,proxy,metadata"
        #[arg(long)]
        strategies: Option<String>,

        #[arg(long)]
        proxy_url: Option<String>,

        #[arg(long)]
        metadata_url: Option<String>,

        #[arg(long)]
        artifact_dir: Option<PathBuf>,

        /// unique | content-hash
        #[arg(long)]
        naming: Option<String>,

        /// canonical | exact
        #[arg(long)]
        cache_keying: Option<String>,

        #[arg(long)]
        fetch_timeout_secs: Option<u64>,

        #[arg(long)]
        max_extractions: Option<usize>,

        #[arg(long)]
        ytdlp_path: Option<String>,

        /// HTTP or SOCKS5 proxy for outgoing requests
        #[arg(long)]
        network_proxy: Option<String>,
    },
    /// Search YouTube and print watch links
    Search {
        query: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(code) => code,
        Err(message) => {
            error!("{}", message);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<ExitCode, String> {
    match command {
        Command::Resolve {
            references,
            strategies,
            proxy_url,
            metadata_url,
            artifact_dir,
            naming,
            cache_keying,
            fetch_timeout_secs,
            max_extractions,
            ytdlp_path,
            network_proxy,
        } => {
            let overrides: HashMap<&'static str, String> = [
                ("RESOLVER_STRATEGIES", strategies),
                ("RESOLVER_PROXY_URL", proxy_url),
                ("RESOLVER_METADATA_URL", metadata_url),
                (
                    "RESOLVER_ARTIFACT_DIR",
                    artifact_dir.map(|d| d.to_string_lossy().into_owned()),
                ),
                ("RESOLVER_NAMING", naming),
                ("RESOLVER_CACHE_KEYING", cache_keying),
                ("RESOLVER_FETCH_TIMEOUT_SECS", fetch_timeout_secs.map(|s| s.to_string())),
                ("RESOLVER_MAX_EXTRACTIONS", max_extractions.map(|n| n.to_string())),
                ("YTDLP_PATH", ytdlp_path),
                ("RESOLVER_NETWORK_PROXY", network_proxy),
            ]
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect();

            let config =
                ResolverConfig::from_env_with_overrides(|key| overrides.get(key).cloned())
                    .map_err(|e| e.to_string())?;
            let resolver = AudioResolver::from_config(&config).map_err(|e| e.to_string())?;

            let handles: Vec<_> = references
                .into_iter()
                .map(|reference| {
                    let resolver = resolver.clone();
                    tokio::spawn(async move {
                        let result = resolver.resolve(&reference).await;
                        (reference, result)
                    })
                })
                .collect();

            let mut failed = false;
            for handle in handles {
                let (reference, result) = handle.await.map_err(|e| e.to_string())?;
                match result {
                    Ok(path) => println!("{}\t{}", reference, path.display()),
                    Err(e) => {
                        failed = true;
                        eprintln!("{}", e.user_message());
                    }
                }
            }
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Command::Search { query } => {
            let client = build_http_client(None).map_err(|e| e.to_string())?;
            let search = SearchClient::from_env(client).map_err(|e| e.to_string())?;
            let results = search.search(&query).await.map_err(|e| e.to_string())?;
            for item in results.items {
                println!("{}\t{}", item.link, item.title);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
