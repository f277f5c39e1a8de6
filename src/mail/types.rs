//! Mailbox types: the remote part tree, listing pages, and message summaries.

use serde::{Deserialize, Serialize};

use crate::mail::extract::derive_head;

// ── Remote listing ──────────────────────────────────────────────────

/// Reference to a message in a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: None,
        }
    }
}

/// One page of a newest-first listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    /// Message references, newest first. Absent in the API response when empty.
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    /// Token for the next (older) page, if any.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

// ── Raw message ─────────────────────────────────────────────────────

/// A message as returned by the remote source: metadata plus a MIME part tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    /// Epoch milliseconds, serialized as a decimal string by the API.
    #[serde(default)]
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

impl RawMessage {
    /// Message timestamp in epoch milliseconds; 0 when missing or unparseable.
    pub fn timestamp_millis(&self) -> i64 {
        self.internal_date
            .as_deref()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    /// First header with the given name (case-insensitive) on the root part.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload.as_ref().and_then(|p| p.header(name))
    }
}

/// A node of the MIME part tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub part_id: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Inline body of a part. `data` is base64url-encoded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

// ── Summary ─────────────────────────────────────────────────────────

/// Classification-ready view of one message.
///
/// Built once per fetch and only shared by reference afterwards. `head` is
/// derived from `full_text` at construction and cached, since both pipeline
/// stages read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub full_text: String,
    pub head: String,
    /// Epoch milliseconds; the source of truth for "latest".
    pub timestamp: i64,
    pub thread_id: String,
}

impl MessageSummary {
    pub fn new(
        id: impl Into<String>,
        sender: impl Into<String>,
        subject: impl Into<String>,
        full_text: impl Into<String>,
        timestamp: i64,
        thread_id: impl Into<String>,
        head_max_chars: usize,
    ) -> Self {
        let full_text = full_text.into();
        let head = derive_head(&full_text, head_max_chars);
        Self {
            id: id.into(),
            sender: sender.into(),
            subject: subject.into(),
            full_text,
            head,
            timestamp,
            thread_id: thread_id.into(),
        }
    }
}
