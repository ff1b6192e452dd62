//! # mailrag
//!
//! A local-first retrieval-augmented question answering tool for personal
//! email.
//!
//! mailrag pulls messages from Yahoo (IMAP) and Gmail (REST API), embeds
//! them into a persistent vector index, and answers natural-language
//! questions by retrieving the most relevant messages and handing them to
//! a locally hosted language model together with the conversation history.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │  Adapters   │──▶│  Normalize   │──▶│  SQLite   │
//! │ Yahoo/Gmail │   │   + Embed   │   │  vectors  │
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │
//!                       question ──────────┤
//!                                          ▼
//!                                    ┌──────────┐
//!                                    │ Retrieve  │──▶ Ollama ──▶ answer
//!                                    │ + prompt  │
//!                                    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mailrag init                  # create the index database
//! mailrag sync all              # ingest every configured account
//! mailrag ask "when is my invoice due"
//! mailrag chat                  # interactive session with memory
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`source`] | Mail source adapter interface |
//! | [`source_yahoo`] | Yahoo IMAP adapter |
//! | [`source_gmail`] | Gmail REST adapter |
//! | [`normalize`] | Raw message to canonical document |
//! | [`embedding`] | Embedding collaborator and vector utilities |
//! | [`index`] | Persistent embedding index |
//! | [`ingest`] | Incremental sync pipeline |
//! | [`llm`] | Language model collaborator |
//! | [`history`] | Conversation state |
//! | [`answer`] | Retrieval-augmented answering |

pub mod answer;
pub mod config;
pub mod embedding;
pub mod error;
pub mod history;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod source;
pub mod source_gmail;
pub mod source_yahoo;
