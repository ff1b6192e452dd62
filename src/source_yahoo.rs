//! Yahoo mail source adapter.
//!
//! Speaks IMAP over TLS against `imap.mail.yahoo.com`, authenticating with
//! username and app password. The `imap` crate is blocking, so every
//! session operation runs under `spawn_blocking`, moving the session in
//! and out of the closure.

use async_trait::async_trait;
use native_tls::TlsConnector;
use tokio::task;
use tracing::warn;

use crate::error::SourceError;
use crate::models::{Provider, RawMessage, RawPayload};
use crate::source::MailSource;

const IMAP_SERVER: &str = "imap.mail.yahoo.com";
const IMAP_PORT: u16 = 993;

type ImapSession = imap::Session<native_tls::TlsStream<std::net::TcpStream>>;

pub struct YahooSource {
    label: String,
    user: String,
    app_password: String,
    mailbox: String,
    session: Option<ImapSession>,
}

impl YahooSource {
    pub fn new(
        label: impl Into<String>,
        user: impl Into<String>,
        app_password: impl Into<String>,
        mailbox: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            user: user.into(),
            app_password: app_password.into(),
            mailbox: mailbox.into(),
            session: None,
        }
    }

    fn take_session(&mut self) -> Result<ImapSession, SourceError> {
        self.session
            .take()
            .ok_or_else(|| SourceError::Protocol("IMAP session not connected".to_string()))
    }
}

#[async_trait]
impl MailSource for YahooSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn provider(&self) -> Provider {
        Provider::Yahoo
    }

    async fn connect(&mut self) -> Result<(), SourceError> {
        let user = self.user.clone();
        let password = self.app_password.clone();
        let mailbox = self.mailbox.clone();
        let label = self.label.clone();

        let session = task::spawn_blocking(move || -> Result<ImapSession, SourceError> {
            let tls = TlsConnector::builder()
                .build()
                .map_err(|e| SourceError::Protocol(format!("TLS setup failed: {}", e)))?;

            let client = imap::connect((IMAP_SERVER, IMAP_PORT), IMAP_SERVER, &tls)
                .map_err(|e| SourceError::Protocol(format!("IMAP connect failed: {}", e)))?;

            let mut session = client.login(&user, &password).map_err(|(e, _)| {
                SourceError::Auth {
                    account: label,
                    reason: e.to_string(),
                }
            })?;

            session.select(&mailbox).map_err(|e| {
                SourceError::Protocol(format!("select '{}' failed: {}", mailbox, e))
            })?;

            Ok(session)
        })
        .await
        .map_err(|e| SourceError::Protocol(format!("IMAP task failed: {}", e)))??;

        self.session = Some(session);
        Ok(())
    }

    async fn list_ids(&mut self) -> Result<Vec<String>, SourceError> {
        let session = self.take_session()?;

        let (session, result) = task::spawn_blocking(move || {
            let mut session = session;
            let result = session
                .uid_search("ALL")
                .map(|uids| {
                    let mut ids: Vec<u32> = uids.into_iter().collect();
                    // Server order is unspecified; sort for deterministic runs.
                    ids.sort_unstable();
                    ids.into_iter().map(|u| u.to_string()).collect::<Vec<_>>()
                })
                .map_err(|e| SourceError::Protocol(format!("UID search failed: {}", e)));
            (session, result)
        })
        .await
        .map_err(|e| SourceError::Protocol(format!("IMAP task failed: {}", e)))?;

        self.session = Some(session);
        result
    }

    async fn fetch(&mut self, native_id: &str) -> Result<RawMessage, SourceError> {
        let session = self.take_session()?;
        let id = native_id.to_string();

        let (session, result) = task::spawn_blocking(move || {
            let mut session = session;
            let result = fetch_raw(&mut session, &id);
            (session, result)
        })
        .await
        .map_err(|e| SourceError::Protocol(format!("IMAP task failed: {}", e)))?;

        self.session = Some(session);

        result.map(|bytes| RawMessage {
            provider: Provider::Yahoo,
            payload: RawPayload::Rfc822(bytes),
        })
    }

    async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            let label = self.label.clone();
            let _ = task::spawn_blocking(move || {
                let mut session = session;
                if let Err(e) = session.logout() {
                    warn!(account = %label, "IMAP logout failed: {}", e);
                }
            })
            .await;
        }
    }
}

/// Fetch the full RFC822 bytes for one UID. BODY.PEEK leaves the
/// message's seen-flag untouched on the server.
fn fetch_raw(session: &mut ImapSession, id: &str) -> Result<Vec<u8>, SourceError> {
    let fetches = session
        .uid_fetch(id, "(BODY.PEEK[])")
        .map_err(|e| SourceError::Fetch {
            id: id.to_string(),
            reason: e.to_string(),
        })?;

    let fetch = fetches.iter().next().ok_or_else(|| SourceError::Fetch {
        id: id.to_string(),
        reason: "no data returned".to_string(),
    })?;

    let body = fetch.body().ok_or_else(|| SourceError::Fetch {
        id: id.to_string(),
        reason: "missing message body".to_string(),
    })?;

    Ok(body.to_vec())
}
