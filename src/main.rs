//! # Chat Recall CLI (`recall`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall ingest <files>` | Parse chat HTML exports and ingest them |
//! | `recall search` | Search stored messages (semantic, hybrid, or listing) |
//! | `recall delete` | Delete chunks by id and/or username |
//! | `recall fetch` | Pull posts from the remote source and ingest them |
//! | `recall serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Ingest an exported channel page
//! recall ingest data/html/crypto_news__2025-01.html
//!
//! # Hybrid search: semantically close AND mentioning BTC
//! recall search --query "market outlook" --tokens '$BTC'
//!
//! # List everything a channel has stored
//! recall search --username crypto_news
//!
//! # Drop a channel from the index
//! recall delete --username crypto_news
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use chat_recall::chunker::MessageChunker;
use chat_recall::config::{load_config, Config};
use chat_recall::embedding::{create_provider, EmbeddingProvider};
use chat_recall::export::parse_export_files;
use chat_recall::fetcher::PostsClient;
use chat_recall::filter::MetadataFilter;
use chat_recall::index::VectorIndex;
use chat_recall::index_http::ChromaHttpIndex;
use chat_recall::ingest::{delete_chunks, ingest_messages, DeleteSelector};
use chat_recall::search::{search, SearchRequest};
use chat_recall::server::run_server;
use chat_recall::tickers::expand_terms;

/// Chat Recall — ingestion and hybrid retrieval for chat messages over an
/// external vector index.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Chat message ingestion and hybrid retrieval",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse chat HTML export files and ingest their messages.
    Ingest {
        /// Export files to parse; the channel name is taken from the file
        /// stem up to the first "__".
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Search stored messages.
    ///
    /// With `--query` runs a semantic lookup; adding `--tokens` constrains
    /// hits to chunks containing at least one token. Without `--query`
    /// entries are listed by filters alone.
    Search {
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Token symbols required via full-text match ($BTC, BTC/USDT, ...).
        #[arg(long)]
        tokens: Vec<String>,
        /// Only return chunks from this username.
        #[arg(long)]
        username: Option<String>,
        /// Collapse multiple chunks of one message into one hit.
        #[arg(long)]
        unique: bool,
    },

    /// Delete chunks by explicit ids and/or all chunks of a username.
    Delete {
        #[arg(long)]
        ids: Vec<String>,
        #[arg(long)]
        username: Option<String>,
    },

    /// Fetch posts from the remote source and ingest them.
    Fetch {
        #[arg(long)]
        usernames: Vec<String>,
        #[arg(long, default_value_t = 500)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Start the JSON HTTP server.
    Serve,
}

fn components(
    config: &Config,
) -> Result<(Arc<dyn VectorIndex>, Arc<dyn EmbeddingProvider>, MessageChunker)> {
    let index: Arc<dyn VectorIndex> = Arc::new(ChromaHttpIndex::new(&config.index)?);
    let embedder = create_provider(&config.embedding)?;
    let chunker = MessageChunker::from_config(&config.chunking)?;
    Ok((index, embedder, chunker))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { files } => {
            let messages = parse_export_files(&files)?;
            let (index, embedder, chunker) = components(&config)?;
            let added =
                ingest_messages(index.as_ref(), embedder.as_ref(), &chunker, &messages).await?;
            println!("parsed {} messages, added {} chunks", messages.len(), added);
        }

        Commands::Search {
            query,
            limit,
            tokens,
            username,
            unique,
        } => {
            let (index, embedder, _) = components(&config)?;
            let request = SearchRequest {
                query,
                limit,
                metadata_filter: username.map(MetadataFilter::by_username),
                text_filter: None,
                full_text_terms: expand_terms(&tokens),
                unique,
            };
            let results = search(index.as_ref(), embedder.as_ref(), &request).await?;
            if results.is_empty() {
                println!("No results.");
            } else {
                print!("{results}");
            }
        }

        Commands::Delete { ids, username } => {
            let (index, _, _) = components(&config)?;
            let ids = (!ids.is_empty()).then_some(ids);
            let selector = username.map(|username| DeleteSelector {
                username: Some(username),
            });
            delete_chunks(index.as_ref(), ids.as_deref(), selector.as_ref()).await?;
            println!("ok");
        }

        Commands::Fetch {
            usernames,
            limit,
            offset,
        } => {
            let fetcher_config = config
                .fetcher
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("no [fetcher] section configured"))?;
            let fetcher = PostsClient::new(fetcher_config)?;
            let messages = fetcher.fetch_posts(&usernames, limit, offset).await?;
            let (index, embedder, chunker) = components(&config)?;
            let added =
                ingest_messages(index.as_ref(), embedder.as_ref(), &chunker, &messages).await?;
            println!("fetched {} messages, added {} chunks", messages.len(), added);
        }

        Commands::Serve => {
            run_server(&config).await?;
        }
    }

    Ok(())
}
