//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the
//! appropriate commands. `ask` drives the streaming core; the remaining
//! subcommands are thin wrappers over the registry, history, and storage
//! clients.

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::api::history::HistoryOrder;
use crate::api::{chats, history, storage, Author, ChatStreamRequest};
use crate::core::chat_stream::{stream_chat, StreamController, StreamParams, StreamState};
use crate::core::config::Config;
use crate::core::errors::StreamError;
use crate::core::history_cache::HistoryCache;

#[derive(Parser)]
#[command(name = "ragline")]
#[command(about = "A terminal client for retrieval-augmented chat backends")]
#[command(
    long_about = "Ragline talks to a retrieval-augmented chat backend: it streams answers \
with their source citations to the terminal and manages the backend's chats, \
models, and document storages.\n\n\
Configuration:\n\
  Use 'ragline set base-url <url>' to point at your backend (defaults to\n\
  http://localhost:8040). Other keys: token, default-model, collection,\n\
  with-gpt, first-byte-timeout.\n\n\
Controls during 'ask':\n\
  Ctrl+C            Cancel the stream; text received so far is kept"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a query and stream the answer to stdout
    Ask {
        /// Question text (multiple words are joined with spaces)
        #[arg(required = true)]
        query: Vec<String>,
        /// Chat to attach the exchange to; persists both sides to its history
        #[arg(short, long)]
        chat: Option<i64>,
        /// Model to answer with (overrides the configured default)
        #[arg(short, long)]
        model: Option<String>,
        /// Document collection to retrieve from
        #[arg(long)]
        collection: Option<String>,
        /// Ask the backend to also consult its hosted model
        #[arg(long)]
        with_gpt: bool,
    },
    /// List chats, most recently active first
    Chats,
    /// Create a new chat
    NewChat {
        name: String,
        /// Model id the chat answers with
        #[arg(short, long)]
        model: i64,
    },
    /// List available models
    Models,
    /// Show a chat's history
    History {
        chat_id: i64,
        #[arg(long)]
        limit: Option<u32>,
        /// Newest entries first instead of oldest first
        #[arg(long)]
        newest_first: bool,
    },
    /// List document storages
    Storages,
    /// Create a document storage
    NewStorage {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List files in a storage
    Files { storage_id: i64 },
    /// Upload a local file into a storage
    Upload { storage_id: i64, path: PathBuf },
    /// Ingest a URL into a storage
    AddUrl { storage_id: i64, url: String },
    /// Delete a file from a storage
    RmFile { storage_id: i64, file_id: i64 },
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key (can be multiple words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Option<Vec<String>>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()
        .unwrap()
        .block_on(async_main())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let args = Args::parse();

    match args.command {
        Commands::Ask {
            query,
            chat,
            model,
            collection,
            with_gpt,
        } => run_ask(query.join(" "), chat, model, collection, with_gpt).await,
        Commands::Chats => {
            let (client, base_url) = backend()?;
            let listing = chats::list_chats_by_recency(&client, &base_url).await?;
            if listing.is_empty() {
                println!("No chats yet. Create one with: ragline new-chat <name> --model <id>");
            }
            for chat in listing {
                println!("{:>6}  {}  (model {})", chat.id, chat.name, chat.model_id);
            }
            Ok(())
        }
        Commands::NewChat { name, model } => {
            let (client, base_url) = backend()?;
            let chat = chats::create_chat(&client, &base_url, &name, model).await?;
            println!("✅ Created chat {} ({})", chat.id, chat.name);
            Ok(())
        }
        Commands::Models => {
            let (client, base_url) = backend()?;
            for model in chats::list_models(&client, &base_url).await? {
                println!(
                    "{:>6}  {}  [{}, context {}]",
                    model.id,
                    model.name,
                    model.kind.as_str(),
                    model.context_window
                );
            }
            Ok(())
        }
        Commands::History {
            chat_id,
            limit,
            newest_first,
        } => {
            let (client, base_url) = backend()?;
            let order = if newest_first {
                HistoryOrder::Desc
            } else {
                HistoryOrder::Asc
            };
            let entries = history::fetch_history(&client, &base_url, chat_id, limit, order).await?;
            for entry in entries {
                println!("[{}] {}: {}", entry.created_at, entry.author.as_str(), entry.text);
            }
            Ok(())
        }
        Commands::Storages => {
            let (client, base_url) = backend()?;
            for item in storage::list_storages(&client, &base_url).await? {
                match &item.description {
                    Some(description) => {
                        println!("{:>6}  {}  ({description})", item.id, item.name)
                    }
                    None => println!("{:>6}  {}", item.id, item.name),
                }
            }
            Ok(())
        }
        Commands::NewStorage { name, description } => {
            let (client, base_url) = backend()?;
            let created =
                storage::create_storage(&client, &base_url, &name, description.as_deref()).await?;
            println!("✅ Created storage {} ({})", created.id, created.name);
            Ok(())
        }
        Commands::Files { storage_id } => {
            let (client, base_url) = backend()?;
            for file in storage::list_files(&client, &base_url, storage_id).await? {
                println!("{:>6}  {}  [{}, {} bytes]", file.id, file.name, file.kind, file.size);
            }
            Ok(())
        }
        Commands::Upload { storage_id, path } => {
            let (client, base_url) = backend()?;
            storage::upload_file(&client, &base_url, storage_id, &path).await?;
            println!("✅ Uploaded {} to storage {storage_id}", path.display());
            Ok(())
        }
        Commands::AddUrl { storage_id, url } => {
            let (client, base_url) = backend()?;
            storage::add_url(&client, &base_url, storage_id, &url).await?;
            println!("✅ Queued {url} for ingestion into storage {storage_id}");
            Ok(())
        }
        Commands::RmFile {
            storage_id,
            file_id,
        } => {
            let (client, base_url) = backend()?;
            storage::delete_file(&client, &base_url, storage_id, file_id).await?;
            println!("✅ Deleted file {file_id} from storage {storage_id}");
            Ok(())
        }
        Commands::Set { key, value } => run_set(&key, value),
        Commands::Unset { key } => run_unset(&key),
    }
}

fn backend() -> Result<(reqwest::Client, String), Box<dyn Error>> {
    let config = Config::load()?;
    Ok((reqwest::Client::new(), config.endpoint_base()))
}

async fn run_ask(
    query: String,
    chat: Option<i64>,
    model: Option<String>,
    collection: Option<String>,
    with_gpt: bool,
) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let client = reqwest::Client::new();
    let base_url = config.endpoint_base();

    // Prime the history cache and persist the user's side before streaming,
    // mirroring the save-then-stream order the backend expects.
    let mut cache = HistoryCache::new();
    if let Some(chat_id) = chat {
        let prior = match cache.get(chat_id) {
            Some(cached) => cached.len(),
            None => {
                let fetched =
                    history::fetch_history(&client, &base_url, chat_id, None, HistoryOrder::Asc)
                        .await?;
                let count = fetched.len();
                cache.set(chat_id, fetched);
                count
            }
        };
        eprintln!("(chat {chat_id}: {prior} prior messages)");
        history::save_message(&client, &base_url, chat_id, &query, Author::User).await?;
    }

    let request = ChatStreamRequest {
        chat_id: chat,
        collection_name: collection.or_else(|| config.collection.clone()),
        token: config.access_token.clone(),
        selected_model: model.or_else(|| config.default_model.clone()),
        with_gpt: if with_gpt { Some(true) } else { config.with_gpt },
        ..ChatStreamRequest::new(query)
    };

    let mut controller = StreamController::new();
    let (cancel_token, _stream_id) = controller.begin();
    let interrupt = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let params = StreamParams {
        client: client.clone(),
        base_url: base_url.clone(),
        request,
        first_byte_timeout: config.first_byte_timeout(),
        cancel_token,
    };

    let mut state = StreamState::begin();
    let mut printed = 0usize;
    let result = stream_chat(params, &mut state, |snapshot| {
        if snapshot.full_text.len() > printed {
            print!("{}", &snapshot.full_text[printed..]);
            let _ = io::stdout().flush();
            printed = snapshot.full_text.len();
        }
    })
    .await;
    println!();

    match result {
        Ok(()) => {
            if !state.sources.is_empty() {
                println!("Sources:");
                for source in &state.sources {
                    println!("  - {source}");
                }
            }
            if let Some(chat_id) = chat {
                history::save_message(&client, &base_url, chat_id, &state.full_text, Author::Model)
                    .await?;
                // Server-side ids and timestamps are unknown here, so drop
                // the cached copy instead of appending a fabricated entry.
                cache.invalidate(chat_id);
            }
            Ok(())
        }
        Err(StreamError::Cancelled) => {
            eprintln!(
                "⚠️  Stream cancelled; keeping the {} characters received so far",
                state.full_text.chars().count()
            );
            Ok(())
        }
        Err(err) => {
            if !state.full_text.is_empty() {
                eprintln!(
                    "⚠️  Stream failed after {} characters of partial output",
                    state.full_text.chars().count()
                );
            }
            Err(err.into())
        }
    }
}

fn run_set(key: &str, value: Option<Vec<String>>) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    let joined = value.map(|parts| parts.join(" ")).filter(|v| !v.is_empty());

    let Some(joined) = joined else {
        config.print_all();
        return Ok(());
    };

    match key {
        "base-url" => {
            config.base_url = Some(joined.clone());
            config.save()?;
            println!("✅ Set base-url to: {joined}");
        }
        "token" => {
            config.access_token = Some(joined);
            config.save()?;
            println!("✅ Set token");
        }
        "default-model" => {
            config.default_model = Some(joined.clone());
            config.save()?;
            println!("✅ Set default-model to: {joined}");
        }
        "collection" => {
            config.collection = Some(joined.clone());
            config.save()?;
            println!("✅ Set collection to: {joined}");
        }
        "with-gpt" => match joined.as_str() {
            "on" | "true" => {
                config.with_gpt = Some(true);
                config.save()?;
                println!("✅ Set with-gpt to: on");
            }
            "off" | "false" => {
                config.with_gpt = Some(false);
                config.save()?;
                println!("✅ Set with-gpt to: off");
            }
            other => {
                eprintln!("⚠️  with-gpt takes on/off, got: {other}");
                std::process::exit(1);
            }
        },
        "first-byte-timeout" => match joined.parse::<u64>() {
            Ok(secs) => {
                config.first_byte_timeout_secs = Some(secs);
                config.save()?;
                println!("✅ Set first-byte-timeout to: {secs}s");
            }
            Err(_) => {
                eprintln!("⚠️  first-byte-timeout takes whole seconds, got: {joined}");
                std::process::exit(1);
            }
        },
        _ => {
            eprintln!("❌ Unknown config key: {key}");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn run_unset(key: &str) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    match key {
        "base-url" => config.base_url = None,
        "token" => config.access_token = None,
        "default-model" => config.default_model = None,
        "collection" => config.collection = None,
        "with-gpt" => config.with_gpt = None,
        "first-byte-timeout" => config.first_byte_timeout_secs = None,
        _ => {
            eprintln!("❌ Unknown config key: {key}");
            std::process::exit(1);
        }
    }
    config.save()?;
    println!("✅ Unset {key}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_collects_multi_word_queries() {
        let args = Args::try_parse_from([
            "ragline", "ask", "how", "do", "I", "close", "the", "quarter",
        ])
        .expect("parse ask");
        match args.command {
            Commands::Ask { query, chat, .. } => {
                assert_eq!(query.join(" "), "how do I close the quarter");
                assert_eq!(chat, None);
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn ask_accepts_chat_and_model_flags() {
        let args = Args::try_parse_from([
            "ragline", "ask", "--chat", "7", "--model", "saiga", "--with-gpt", "привет",
        ])
        .expect("parse ask with flags");
        match args.command {
            Commands::Ask {
                chat,
                model,
                with_gpt,
                ..
            } => {
                assert_eq!(chat, Some(7));
                assert_eq!(model.as_deref(), Some("saiga"));
                assert!(with_gpt);
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn ask_requires_a_query() {
        assert!(Args::try_parse_from(["ragline", "ask"]).is_err());
    }

    #[test]
    fn upload_takes_storage_and_path() {
        let args = Args::try_parse_from(["ragline", "upload", "2", "notes/report.pdf"])
            .expect("parse upload");
        match args.command {
            Commands::Upload { storage_id, path } => {
                assert_eq!(storage_id, 2);
                assert_eq!(path, PathBuf::from("notes/report.pdf"));
            }
            _ => panic!("expected upload command"),
        }
    }
}
