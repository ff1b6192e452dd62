//! Gmail mail source adapter.
//!
//! Talks to the Gmail REST API with a pre-authorized bearer token. The
//! OAuth flow that produces the token is an external concern; this adapter
//! only consumes it. Message ids are listed page by page with an opaque
//! continuation token, and each message is fetched individually.
//!
//! By default the provider-supplied snippet stands in for the body, which
//! keeps sync cheap but indexes only a preview of each message. Setting
//! `fetch_full_bodies` in the sync config switches to the concatenated
//! text/plain parts of the full payload.

use async_trait::async_trait;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use std::time::Duration;

use crate::error::SourceError;
use crate::models::{Provider, RawMessage, RawPayload};
use crate::source::MailSource;

const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GmailSource {
    label: String,
    token: String,
    page_size: usize,
    fetch_full_bodies: bool,
    client: reqwest::Client,
}

impl GmailSource {
    pub fn new(
        label: impl Into<String>,
        token: impl Into<String>,
        page_size: usize,
        fetch_full_bodies: bool,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Protocol(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            label: label.into(),
            token: token.into(),
            page_size,
            fetch_full_bodies,
            client,
        })
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, SourceError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SourceError::Protocol(format!("Gmail request failed: {}", e)))?;

        let status = resp.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(SourceError::Auth {
                account: self.label.clone(),
                reason: format!("Gmail API returned {}", status),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Protocol(format!(
                "Gmail API error {}: {}",
                status, body
            )));
        }

        resp.json()
            .await
            .map_err(|e| SourceError::Protocol(format!("invalid Gmail response: {}", e)))
    }
}

#[async_trait]
impl MailSource for GmailSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn provider(&self) -> Provider {
        Provider::Gmail
    }

    async fn connect(&mut self) -> Result<(), SourceError> {
        if self.token.trim().is_empty() {
            return Err(SourceError::Auth {
                account: self.label.clone(),
                reason: "empty access token".to_string(),
            });
        }
        // Cheap call that fails fast on a revoked or expired token.
        self.get_json(&format!("{}/profile", API_BASE)).await?;
        Ok(())
    }

    async fn list_ids(&mut self) -> Result<Vec<String>, SourceError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!("{}/messages?maxResults={}", API_BASE, self.page_size);
            if let Some(ref token) = page_token {
                url.push_str("&pageToken=");
                url.push_str(token);
            }

            let json = self.get_json(&url).await?;

            if let Some(messages) = json.get("messages").and_then(|m| m.as_array()) {
                for message in messages {
                    if let Some(id) = message.get("id").and_then(|i| i.as_str()) {
                        ids.push(id.to_string());
                    }
                }
            }

            match json.get("nextPageToken").and_then(|t| t.as_str()) {
                Some(token) => page_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(ids)
    }

    async fn fetch(&mut self, native_id: &str) -> Result<RawMessage, SourceError> {
        let url = format!("{}/messages/{}?format=full", API_BASE, native_id);

        let json = self.get_json(&url).await.map_err(|e| match e {
            // Auth stays auth; everything else is a per-message failure.
            SourceError::Auth { .. } => e,
            other => SourceError::Fetch {
                id: native_id.to_string(),
                reason: other.to_string(),
            },
        })?;

        let (subject, date) = extract_headers(&json);

        let body = if self.fetch_full_bodies {
            let mut full = String::new();
            if let Some(payload) = json.get("payload") {
                collect_plain_parts(payload, &mut full);
            }
            if full.is_empty() {
                snippet(&json)
            } else {
                full
            }
        } else {
            snippet(&json)
        };

        Ok(RawMessage {
            provider: Provider::Gmail,
            payload: RawPayload::Fields {
                subject,
                date,
                body,
            },
        })
    }

    async fn close(&mut self) {
        // Stateless HTTP client; nothing to release.
    }
}

fn snippet(message: &serde_json::Value) -> String {
    message
        .get("snippet")
        .and_then(|s| s.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Pull Subject and Date out of the payload header list.
fn extract_headers(message: &serde_json::Value) -> (String, String) {
    let mut subject = String::new();
    let mut date = String::new();

    if let Some(headers) = message
        .get("payload")
        .and_then(|p| p.get("headers"))
        .and_then(|h| h.as_array())
    {
        for header in headers {
            let name = header.get("name").and_then(|n| n.as_str()).unwrap_or("");
            let value = header.get("value").and_then(|v| v.as_str()).unwrap_or("");
            if name.eq_ignore_ascii_case("Subject") && subject.is_empty() {
                subject = value.to_string();
            } else if name.eq_ignore_ascii_case("Date") && date.is_empty() {
                date = value.to_string();
            }
        }
    }

    (subject, date)
}

/// Append every base64url-encoded text/plain part in traversal order.
fn collect_plain_parts(payload: &serde_json::Value, out: &mut String) {
    let mime = payload
        .get("mimeType")
        .and_then(|m| m.as_str())
        .unwrap_or("");

    if mime.eq_ignore_ascii_case("text/plain") {
        if let Some(data) = payload
            .get("body")
            .and_then(|b| b.get("data"))
            .and_then(|d| d.as_str())
        {
            if let Some(bytes) = decode_body_data(data) {
                out.push_str(&String::from_utf8_lossy(&bytes));
            }
        }
    }

    if let Some(parts) = payload.get("parts").and_then(|p| p.as_array()) {
        for part in parts {
            collect_plain_parts(part, out);
        }
    }
}

/// Gmail body data is URL-safe base64, usually unpadded.
fn decode_body_data(data: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(data)
        .or_else(|_| URL_SAFE.decode(data))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> serde_json::Value {
        serde_json::json!({
            "id": "18f0a",
            "snippet": "Your invoice is due",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [
                    { "name": "Subject", "value": "Invoice" },
                    { "name": "Date", "value": "Mon, 3 Feb 2025 10:00:00 +0000" },
                    { "name": "From", "value": "billing@example.com" }
                ],
                "parts": [
                    {
                        "mimeType": "text/plain",
                        "body": { "data": URL_SAFE_NO_PAD.encode("full body text") }
                    },
                    {
                        "mimeType": "text/html",
                        "body": { "data": URL_SAFE_NO_PAD.encode("<p>html</p>") }
                    }
                ]
            }
        })
    }

    #[test]
    fn headers_extracted() {
        let (subject, date) = extract_headers(&sample_message());
        assert_eq!(subject, "Invoice");
        assert_eq!(date, "Mon, 3 Feb 2025 10:00:00 +0000");
    }

    #[test]
    fn headers_default_to_empty() {
        let (subject, date) = extract_headers(&serde_json::json!({ "id": "x" }));
        assert_eq!(subject, "");
        assert_eq!(date, "");
    }

    #[test]
    fn plain_parts_collected_html_skipped() {
        let mut out = String::new();
        collect_plain_parts(&sample_message()["payload"], &mut out);
        assert_eq!(out, "full body text");
    }

    #[test]
    fn decode_handles_padded_and_unpadded() {
        let padded = URL_SAFE.encode("abc");
        let unpadded = URL_SAFE_NO_PAD.encode("abc");
        assert_eq!(decode_body_data(&padded).unwrap(), b"abc");
        assert_eq!(decode_body_data(&unpadded).unwrap(), b"abc");
    }

    #[test]
    fn snippet_fallback() {
        assert_eq!(snippet(&sample_message()), "Your invoice is due");
        assert_eq!(snippet(&serde_json::json!({})), "");
    }
}
