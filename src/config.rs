use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::models::Provider;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding the index database. Created on `init`.
    pub dir: PathBuf,
}

impl IndexConfig {
    /// Path of the SQLite file inside the index directory.
    pub fn db_path(&self) -> PathBuf {
        self.dir.join("mailrag.sqlite")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ollama_endpoint(),
            model: default_embedding_model(),
            timeout_secs: default_embed_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ollama_endpoint(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

/// Policy applied when fetching (or embedding) a single message fails.
///
/// One knob shared by both adapters rather than per-provider behavior.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorPolicy {
    /// Log a warning and continue with the next message.
    Skip,
    /// Abort the account's sync on the first failure.
    Abort,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_fetch_error_policy")]
    pub on_fetch_error: FetchErrorPolicy,
    /// Gmail message-list page bound.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Fetch full Gmail bodies instead of the snippet proxy.
    ///
    /// Off by default: the snippet keeps sync cheap, at the cost of
    /// indexing only a preview of each Gmail message.
    #[serde(default)]
    pub fetch_full_bodies: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            on_fetch_error: default_fetch_error_policy(),
            page_size: default_page_size(),
            fetch_full_bodies: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccountConfig {
    /// Caller-supplied label distinguishing this mailbox in the index.
    pub label: String,
    /// `yahoo` or `gmail`.
    pub provider: String,
    /// Yahoo login name.
    #[serde(default)]
    pub user: Option<String>,
    /// Environment variable holding the Yahoo app password.
    #[serde(default)]
    pub password_env: Option<String>,
    /// Environment variable holding a pre-authorized Gmail access token.
    /// The OAuth flow that produces it lives outside this tool.
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
}

impl AccountConfig {
    pub fn provider(&self) -> Provider {
        // load_config has already validated the string
        self.provider.parse().expect("validated provider")
    }
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_llm_model() -> String {
    "llama3".to_string()
}
fn default_embed_timeout_secs() -> u64 {
    30
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    3
}
fn default_top_k() -> usize {
    5
}
fn default_fetch_error_policy() -> FetchErrorPolicy {
    FetchErrorPolicy::Skip
}
fn default_page_size() -> usize {
    500
}
fn default_mailbox() -> String {
    "INBOX".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.sync.page_size < 1 {
        anyhow::bail!("sync.page_size must be >= 1");
    }

    // Validate accounts
    let mut seen_labels = HashSet::new();
    for account in &config.accounts {
        if account.label.trim().is_empty() {
            anyhow::bail!("account labels must not be empty");
        }
        if !seen_labels.insert(account.label.clone()) {
            anyhow::bail!("duplicate account label: '{}'", account.label);
        }

        let provider: Provider = account
            .provider
            .parse()
            .map_err(|e: String| anyhow::anyhow!("account '{}': {}", account.label, e))?;

        match provider {
            Provider::Yahoo => {
                if account.user.is_none() || account.password_env.is_none() {
                    anyhow::bail!(
                        "yahoo account '{}' requires 'user' and 'password_env'",
                        account.label
                    );
                }
            }
            Provider::Gmail => {
                if account.token_env.is_none() {
                    anyhow::bail!("gmail account '{}' requires 'token_env'", account.label);
                }
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mailrag.toml");
        std::fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let (_tmp, path) = write_config(
            r#"
[index]
dir = "./data"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.sync.on_fetch_error, FetchErrorPolicy::Skip);
        assert_eq!(cfg.sync.page_size, 500);
        assert!(!cfg.sync.fetch_full_bodies);
        assert_eq!(cfg.embedding.model, "nomic-embed-text");
        assert_eq!(cfg.llm.model, "llama3");
        assert!(cfg.accounts.is_empty());
        assert!(cfg.index.db_path().ends_with("mailrag.sqlite"));
    }

    #[test]
    fn yahoo_account_requires_credentials() {
        let (_tmp, path) = write_config(
            r#"
[index]
dir = "./data"

[[accounts]]
label = "yahoo-alice"
provider = "yahoo"
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("password_env"));
    }

    #[test]
    fn gmail_account_requires_token_env() {
        let (_tmp, path) = write_config(
            r#"
[index]
dir = "./data"

[[accounts]]
label = "gmail-alice"
provider = "gmail"
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("token_env"));
    }

    #[test]
    fn duplicate_labels_rejected() {
        let (_tmp, path) = write_config(
            r#"
[index]
dir = "./data"

[[accounts]]
label = "alice"
provider = "yahoo"
user = "alice@yahoo.com"
password_env = "PW"

[[accounts]]
label = "alice"
provider = "gmail"
token_env = "TOK"
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("duplicate account label"));
    }

    #[test]
    fn unknown_provider_rejected() {
        let (_tmp, path) = write_config(
            r#"
[index]
dir = "./data"

[[accounts]]
label = "x"
provider = "outlook"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn abort_policy_parses() {
        let (_tmp, path) = write_config(
            r#"
[index]
dir = "./data"

[sync]
on_fetch_error = "abort"
fetch_full_bodies = true
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.sync.on_fetch_error, FetchErrorPolicy::Abort);
        assert!(cfg.sync.fetch_full_bodies);
    }
}
