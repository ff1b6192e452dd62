//! Core data models used throughout mailrag.
//!
//! These types represent the messages and documents that flow through the
//! ingestion and retrieval pipeline.

use std::fmt;
use std::str::FromStr;

/// Mail provider a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Yahoo,
    Gmail,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Yahoo => write!(f, "Yahoo"),
            Provider::Gmail => write!(f, "Gmail"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yahoo" => Ok(Provider::Yahoo),
            "gmail" => Ok(Provider::Gmail),
            other => Err(format!(
                "unknown provider: '{}'. Must be yahoo or gmail.",
                other
            )),
        }
    }
}

/// Raw message handed from a source adapter to the normalizer.
///
/// Yahoo delivers full RFC822 bytes over IMAP; the Gmail API has already
/// split the message into headers and a body proxy, so its adapter hands
/// over pre-extracted fields.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub provider: Provider,
    pub payload: RawPayload,
}

#[derive(Debug, Clone)]
pub enum RawPayload {
    /// A complete RFC822 message as fetched over IMAP.
    Rfc822(Vec<u8>),
    /// Header fields and body text already extracted by an HTTP API.
    Fields {
        subject: String,
        date: String,
        body: String,
    },
}

/// Canonical text document produced by the normalizer.
///
/// `date` is the raw provider-supplied header string, deliberately not
/// parsed: retrieval works over the serialized text and the original
/// phrasing is what the language model sees.
#[derive(Debug, Clone)]
pub struct CanonicalDocument {
    pub provider: Provider,
    pub subject: String,
    pub date: String,
    pub body: String,
}

impl CanonicalDocument {
    /// Serialize to the single text blob that gets embedded and stored.
    pub fn render(&self) -> String {
        format!(
            "[{}] Subject: {}\nDate: {}\nBody: {}",
            self.provider, self.subject, self.date, self.body
        )
    }
}

/// Compose the globally unique, stable document id for a message.
///
/// Account labels are caller-supplied and distinct per account/provider
/// pairing, which keeps composed ids collision-free across providers.
pub fn compose_doc_id(account_label: &str, native_id: &str) -> String {
    format!("{}:{}", account_label, native_id)
}

/// A retrieval result from the embedding index.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_is_deterministic() {
        assert_eq!(compose_doc_id("alice", "1"), "alice:1");
        assert_eq!(compose_doc_id("alice", "1"), compose_doc_id("alice", "1"));
    }

    #[test]
    fn doc_ids_distinct_across_accounts() {
        assert_ne!(compose_doc_id("alice", "1"), compose_doc_id("bob", "1"));
    }

    #[test]
    fn render_format() {
        let doc = CanonicalDocument {
            provider: Provider::Yahoo,
            subject: "Invoice".to_string(),
            date: "Mon, 3 Feb 2025 10:00:00 +0000".to_string(),
            body: "Your invoice is due".to_string(),
        };
        assert_eq!(
            doc.render(),
            "[Yahoo] Subject: Invoice\nDate: Mon, 3 Feb 2025 10:00:00 +0000\nBody: Your invoice is due"
        );
    }

    #[test]
    fn provider_parse() {
        assert_eq!("yahoo".parse::<Provider>().unwrap(), Provider::Yahoo);
        assert_eq!("Gmail".parse::<Provider>().unwrap(), Provider::Gmail);
        assert!("outlook".parse::<Provider>().is_err());
    }
}
