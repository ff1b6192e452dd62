//! # mailrag CLI
//!
//! The `mailrag` binary is the interface to the email RAG pipeline. It
//! provides commands for index initialization, incremental mail sync,
//! retrieval inspection, one-shot questions, and an interactive chat
//! session with conversation memory.
//!
//! ## Usage
//!
//! ```bash
//! mailrag --config ./config/mailrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mailrag init` | Create the index database (idempotent) |
//! | `mailrag sources` | List configured accounts and index counts |
//! | `mailrag sync <label>\|all` | Incrementally ingest one or all accounts |
//! | `mailrag search "<query>"` | Show the top-k retrieved messages with scores |
//! | `mailrag ask "<question>"` | Answer one question (no prior history) |
//! | `mailrag chat` | Interactive session; `:clear` resets history, `:quit` exits |

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use mailrag::answer::answer_question;
use mailrag::config::{self, AccountConfig, Config, SyncConfig};
use mailrag::embedding::{Embedder, OllamaEmbedder};
use mailrag::history::ConversationLog;
use mailrag::index::EmbeddingIndex;
use mailrag::ingest::{sync_account, SyncOptions, SyncReport};
use mailrag::llm::OllamaChat;
use mailrag::models::Provider;
use mailrag::progress::ProgressMode;
use mailrag::source::MailSource;
use mailrag::source_gmail::GmailSource;
use mailrag::source_yahoo::YahooSource;

/// mailrag, a local-first RAG assistant for personal email.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/mailrag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "mailrag",
    about = "mailrag — a local-first retrieval-augmented question answering tool for personal email",
    version,
    long_about = "mailrag ingests mail from Yahoo (IMAP) and Gmail (REST API) into a \
    persistent embedding index and answers natural-language questions by retrieving \
    relevant messages and forwarding them to a locally hosted language model."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mailrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database.
    ///
    /// Creates the index directory and SQLite schema. Idempotent; running
    /// it multiple times is safe.
    Init,

    /// List configured accounts and their status.
    ///
    /// Shows each account's provider, whether its credential environment
    /// variable is set, and how many of its messages are indexed.
    Sources,

    /// Incrementally ingest mail from one account, or `all`.
    ///
    /// Enumerates message ids from the provider, skips ids already in the
    /// index, and fetches, normalizes, embeds, and stores the rest.
    /// Re-running converges on the same index state.
    Sync {
        /// Account label from the config file, or `all`.
        account: String,

        /// Maximum number of message ids to process.
        #[arg(long)]
        limit: Option<usize>,

        /// List and count without fetching or writing.
        #[arg(long)]
        dry_run: bool,

        /// Progress output: `auto`, `off`, `human`, or `json` (stderr).
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Retrieve the top-k messages for a query, with similarity scores.
    ///
    /// Debug view of the retrieval half of the pipeline; no language
    /// model involved.
    Search {
        /// The query text.
        query: String,

        /// Maximum number of results (defaults to retrieval.top_k).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a single question against the index.
    ///
    /// Runs with an empty conversation history; use `chat` for a session
    /// with memory.
    Ask {
        /// The question text.
        question: String,
    },

    /// Interactive question answering with conversation memory.
    ///
    /// History lives for the session only. `:clear` resets it, `:quit`
    /// or end-of-input exits.
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let index = EmbeddingIndex::open(&cfg.index.dir).await?;
            index.close().await;
            println!("Index initialized at {}", cfg.index.db_path().display());
        }
        Commands::Sources => {
            run_sources(&cfg).await?;
        }
        Commands::Sync {
            account,
            limit,
            dry_run,
            progress,
        } => {
            run_sync(&cfg, &account, limit, dry_run, &progress).await?;
        }
        Commands::Search { query, limit } => {
            run_search(&cfg, &query, limit).await?;
        }
        Commands::Ask { question } => {
            run_ask(&cfg, &question).await?;
        }
        Commands::Chat => {
            run_chat(&cfg).await?;
        }
    }

    Ok(())
}

/// Build the concrete adapter for one configured account, pulling
/// credentials from the environment.
fn build_source(account: &AccountConfig, sync_cfg: &SyncConfig) -> Result<Box<dyn MailSource>> {
    match account.provider() {
        Provider::Yahoo => {
            let user = account.user.clone().expect("validated yahoo user");
            let env = account.password_env.as_deref().expect("validated env name");
            let password = std::env::var(env).with_context(|| {
                format!(
                    "environment variable {} not set for account '{}'",
                    env, account.label
                )
            })?;
            Ok(Box::new(YahooSource::new(
                &account.label,
                user,
                password,
                &account.mailbox,
            )))
        }
        Provider::Gmail => {
            let env = account.token_env.as_deref().expect("validated env name");
            let token = std::env::var(env).with_context(|| {
                format!(
                    "environment variable {} not set for account '{}'",
                    env, account.label
                )
            })?;
            Ok(Box::new(GmailSource::new(
                &account.label,
                token,
                sync_cfg.page_size,
                sync_cfg.fetch_full_bodies,
            )?))
        }
    }
}

async fn run_sources(cfg: &Config) -> Result<()> {
    if cfg.accounts.is_empty() {
        println!("No accounts configured.");
        return Ok(());
    }

    let index = if cfg.index.db_path().exists() {
        Some(EmbeddingIndex::open(&cfg.index.dir).await?)
    } else {
        None
    };

    println!(
        "{:<20} {:<10} {:<14} INDEXED",
        "ACCOUNT", "PROVIDER", "CREDENTIALS"
    );
    for account in &cfg.accounts {
        let env = match account.provider() {
            Provider::Yahoo => account.password_env.as_deref(),
            Provider::Gmail => account.token_env.as_deref(),
        };
        let creds = match env {
            Some(name) if std::env::var(name).is_ok() => "OK".to_string(),
            Some(name) => format!("MISSING {}", name),
            None => "MISSING".to_string(),
        };
        let indexed = match &index {
            Some(idx) => idx.count_account(&account.label).await?.to_string(),
            None => "-".to_string(),
        };
        println!(
            "{:<20} {:<10} {:<14} {}",
            account.label, account.provider, creds, indexed
        );
    }

    if let Some(idx) = index {
        idx.close().await;
    }
    Ok(())
}

async fn run_sync(
    cfg: &Config,
    account: &str,
    limit: Option<usize>,
    dry_run: bool,
    progress: &str,
) -> Result<()> {
    let mode = match progress {
        "auto" => ProgressMode::default_for_tty(),
        "off" => ProgressMode::Off,
        "human" => ProgressMode::Human,
        "json" => ProgressMode::Json,
        other => bail!(
            "Unknown progress mode: '{}'. Use auto, off, human, or json.",
            other
        ),
    };
    let reporter = mode.reporter();

    let selected: Vec<&AccountConfig> = if account == "all" {
        cfg.accounts.iter().collect()
    } else {
        let found = cfg.accounts.iter().find(|a| a.label == account);
        match found {
            Some(a) => vec![a],
            None => bail!(
                "Unknown account: '{}'. Configured: {}",
                account,
                cfg.accounts
                    .iter()
                    .map(|a| a.label.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    };

    if selected.is_empty() {
        bail!("No accounts configured.");
    }

    let index = EmbeddingIndex::open(&cfg.index.dir).await?;
    let embedder = OllamaEmbedder::new(&cfg.embedding)?;

    let opts = SyncOptions {
        limit,
        dry_run,
        on_fetch_error: cfg.sync.on_fetch_error,
    };

    for account in selected {
        let mut source = build_source(account, &cfg.sync)?;
        let report = sync_account(
            &index,
            &embedder,
            source.as_mut(),
            &opts,
            reporter.as_ref(),
        )
        .await?;
        print_report(&account.label, &report, dry_run);
    }

    index.close().await;
    Ok(())
}

fn print_report(label: &str, report: &SyncReport, dry_run: bool) {
    if dry_run {
        println!("sync {} (dry-run)", label);
        println!("  listed: {} messages", report.listed);
        println!("  would index: {}", report.indexed);
        println!("  already indexed: {}", report.already_indexed);
    } else {
        println!("sync {}", label);
        println!("  listed: {} messages", report.listed);
        println!("  indexed: {}", report.indexed);
        println!("  already indexed: {}", report.already_indexed);
        println!("  skipped: {}", report.skipped_failed);
        println!("ok");
    }
}

async fn run_search(cfg: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let index = EmbeddingIndex::open(&cfg.index.dir).await?;
    let embedder = OllamaEmbedder::new(&cfg.embedding)?;

    let query_vec = embedder.embed(query).await?;
    let k = limit.unwrap_or(cfg.retrieval.top_k);
    let hits = index.search(&query_vec, k).await?;

    if hits.is_empty() {
        println!("No results.");
        index.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let excerpt: String = hit.text.chars().take(160).collect();
        println!("{}. [{:.3}] {}", i + 1, hit.score, hit.id);
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
        println!();
    }

    index.close().await;
    Ok(())
}

async fn run_ask(cfg: &Config, question: &str) -> Result<()> {
    let index = EmbeddingIndex::open(&cfg.index.dir).await?;
    let embedder = OllamaEmbedder::new(&cfg.embedding)?;
    let llm = OllamaChat::new(&cfg.llm)?;

    let mut log = ConversationLog::new();
    let answer = answer_question(
        &index,
        &embedder,
        &llm,
        &mut log,
        question,
        cfg.retrieval.top_k,
    )
    .await?;

    println!("{}", answer);
    index.close().await;
    Ok(())
}

async fn run_chat(cfg: &Config) -> Result<()> {
    let index = EmbeddingIndex::open(&cfg.index.dir).await?;
    let embedder = OllamaEmbedder::new(&cfg.embedding)?;
    let llm = OllamaChat::new(&cfg.llm)?;

    let mut log = ConversationLog::new();

    println!("mailrag chat. :clear resets history, :quit exits.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // end of input
        }
        let line = line.trim();

        match line {
            "" => continue,
            ":quit" | ":exit" => break,
            ":clear" => {
                log.clear();
                println!("History cleared.");
                continue;
            }
            question => {
                match answer_question(
                    &index,
                    &embedder,
                    &llm,
                    &mut log,
                    question,
                    cfg.retrieval.top_k,
                )
                .await
                {
                    Ok(answer) => {
                        println!("{}", answer);
                        println!();
                    }
                    Err(e) => {
                        eprintln!("Error: {}", e);
                    }
                }
            }
        }
    }

    index.close().await;
    Ok(())
}
