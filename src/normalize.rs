//! Message normalization.
//!
//! Converts a raw provider message into a [`CanonicalDocument`]. This is a
//! pure function and it never fails: malformed MIME, unknown charsets, and
//! broken encodings all degrade to lossy UTF-8 so that one bad message can
//! never abort an ingestion run.

use mailparse::{MailHeaderMap, ParsedMail};

use crate::models::{CanonicalDocument, Provider, RawMessage, RawPayload};

/// Normalize a raw message into its canonical document.
pub fn normalize(raw: &RawMessage) -> CanonicalDocument {
    match &raw.payload {
        RawPayload::Fields {
            subject,
            date,
            body,
        } => CanonicalDocument {
            provider: raw.provider,
            subject: subject.clone(),
            date: date.clone(),
            body: body.clone(),
        },
        RawPayload::Rfc822(bytes) => normalize_rfc822(raw.provider, bytes),
    }
}

fn normalize_rfc822(provider: Provider, bytes: &[u8]) -> CanonicalDocument {
    let parsed = match mailparse::parse_mail(bytes) {
        Ok(p) => p,
        Err(_) => {
            // Not parseable as mail at all. Index what we can read.
            return CanonicalDocument {
                provider,
                subject: String::new(),
                date: String::new(),
                body: String::from_utf8_lossy(bytes).into_owned(),
            };
        }
    };

    // get_first_value decodes RFC 2047 encoded words; unknown encodings
    // come back as their raw form rather than an error.
    let subject = parsed.headers.get_first_value("Subject").unwrap_or_default();
    let date = parsed.headers.get_first_value("Date").unwrap_or_default();

    let mut body = String::new();
    if parsed.subparts.is_empty() {
        // Single-part message: take the decoded body whatever its type.
        body.push_str(&part_text(&parsed));
    } else {
        collect_text_plain(&parsed, &mut body);
    }

    CanonicalDocument {
        provider,
        subject,
        date,
        body,
    }
}

/// Append every text/plain leaf part in traversal order.
fn collect_text_plain(part: &ParsedMail, out: &mut String) {
    if part.subparts.is_empty() {
        if part.ctype.mimetype.eq_ignore_ascii_case("text/plain") {
            out.push_str(&part_text(part));
        }
        return;
    }
    for sub in &part.subparts {
        collect_text_plain(sub, out);
    }
}

/// Decoded part body, falling back to lossy UTF-8 of the raw payload.
fn part_text(part: &ParsedMail) -> String {
    match part.get_body() {
        Ok(text) => text,
        Err(_) => part
            .get_body_raw()
            .map(|raw| String::from_utf8_lossy(&raw).into_owned())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rfc822(provider: Provider, bytes: &[u8]) -> CanonicalDocument {
        normalize(&RawMessage {
            provider,
            payload: RawPayload::Rfc822(bytes.to_vec()),
        })
    }

    #[test]
    fn simple_message() {
        let raw = b"Subject: Invoice\r\nDate: Mon, 3 Feb 2025 10:00:00 +0000\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nYour invoice is due";
        let doc = rfc822(Provider::Yahoo, raw);
        assert_eq!(doc.subject, "Invoice");
        assert_eq!(doc.date, "Mon, 3 Feb 2025 10:00:00 +0000");
        assert!(doc.body.contains("Your invoice is due"));
    }

    #[test]
    fn rfc2047_subject_decoded() {
        let raw =
            b"Subject: =?UTF-8?B?SMOpbGxv?=\r\nContent-Type: text/plain\r\n\r\nbody";
        let doc = rfc822(Provider::Yahoo, raw);
        assert_eq!(doc.subject, "H\u{e9}llo");
    }

    #[test]
    fn multipart_concatenates_plain_parts_in_order() {
        let raw = b"Subject: Mixed\r\nMIME-Version: 1.0\r\nContent-Type: multipart/alternative; boundary=\"b1\"\r\n\r\n--b1\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nfirst part\r\n--b1\r\nContent-Type: text/html\r\n\r\n<p>html part</p>\r\n--b1\r\nContent-Type: text/plain\r\n\r\nsecond part\r\n--b1--\r\n";
        let doc = rfc822(Provider::Yahoo, raw);
        let first = doc.body.find("first part").expect("first part present");
        let second = doc.body.find("second part").expect("second part present");
        assert!(first < second, "parts must keep traversal order");
        assert!(!doc.body.contains("html part"));
    }

    #[test]
    fn missing_headers_yield_empty_fields() {
        let raw = b"Content-Type: text/plain\r\n\r\nno headers here";
        let doc = rfc822(Provider::Yahoo, raw);
        assert_eq!(doc.subject, "");
        assert_eq!(doc.date, "");
        assert!(doc.body.contains("no headers here"));
    }

    #[test]
    fn malformed_bytes_never_panic() {
        let raw: Vec<u8> = vec![0xff, 0xfe, 0x00, 0x41, b'\r', b'\n', 0xc3, 0x28];
        let doc = rfc822(Provider::Yahoo, &raw);
        // Whatever mailparse makes of this, normalization must produce a
        // document rather than an error.
        let _ = doc.render();
    }

    #[test]
    fn gmail_fields_pass_through() {
        let doc = normalize(&RawMessage {
            provider: Provider::Gmail,
            payload: RawPayload::Fields {
                subject: "Hi".to_string(),
                date: "Tue, 4 Mar 2025 09:00:00 +0000".to_string(),
                body: "snippet text".to_string(),
            },
        });
        assert_eq!(doc.provider, Provider::Gmail);
        assert_eq!(
            doc.render(),
            "[Gmail] Subject: Hi\nDate: Tue, 4 Mar 2025 09:00:00 +0000\nBody: snippet text"
        );
    }
}
