//! Body extraction: turns a raw part tree into a [`MessageSummary`].
//!
//! - Plain text is preferred; the first `text/html` leaf is converted only
//!   when no plain leaf exists anywhere in the tree.
//! - HTML conversion drops scripts, styles, and quoted-reply containers.
//! - The "head" is the recent, quote-free top of the body used for matching.
//!
//! Pure string processing, no I/O.

use std::sync::LazyLock;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;
use scraper::{ElementRef, Html, Node};

use crate::error::ExtractError;
use crate::mail::types::{MessagePart, MessageSummary, RawMessage};

/// Markers after which the rest of a body is quoted history.
///
/// Matched case-insensitively; the earliest occurrence of any marker wins.
pub const QUOTE_SEPARATORS: &[&str] = &[
    "-----original message-----",
    "original message",
    "wrote:",
    "написал",
    "написала",
    "написав",
    "пише",
    "через linkedin",
];

/// Elements whose content never reaches the extracted text.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "blockquote"];

/// CSS classes used by mail clients for quoted-reply containers.
const QUOTE_CONTAINER_CLASSES: &[&str] = &["gmail_quote", "yahoo_quoted"];

const ZERO_WIDTH: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

static ANGLE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(https?://[^>\s]+)>").expect("valid regex"));

static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// base64url with or without padding.
const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Build a summary from a fetched message.
///
/// Fails only when a text part carries an undecodable payload; a message
/// without any text part yields an empty body.
pub fn extract_summary(
    raw: &RawMessage,
    head_max_chars: usize,
) -> Result<MessageSummary, ExtractError> {
    let bodies = match &raw.payload {
        Some(payload) => find_bodies(payload)?,
        None => Bodies::default(),
    };

    let full_text = match (bodies.plain, bodies.html) {
        (Some(plain), _) => plain,
        (None, Some(html)) => html_to_text(&html),
        (None, None) => String::new(),
    };

    Ok(MessageSummary::new(
        raw.id.clone(),
        raw.header("From").unwrap_or_default(),
        raw.header("Subject").unwrap_or_default(),
        full_text,
        raw.timestamp_millis(),
        raw.thread_id.clone(),
        head_max_chars,
    ))
}

/// First plain body (already whitespace-normalized) and first raw HTML body.
#[derive(Debug, Default)]
struct Bodies {
    plain: Option<String>,
    html: Option<String>,
}

/// Depth-first, first-branch-preferred search of the part tree.
fn find_bodies(part: &MessagePart) -> Result<Bodies, ExtractError> {
    let mime = part.mime_type.to_ascii_lowercase();

    if let Some(data) = part.body.data.as_deref().filter(|d| !d.is_empty())
        && mime.starts_with("text/")
    {
        let decoded = decode_body(data, part)?;
        return Ok(if mime == "text/html" {
            Bodies {
                plain: None,
                html: Some(decoded),
            }
        } else {
            // text/plain, and other text/* subtypes with odd charsets
            Bodies {
                plain: Some(normalize_readable(&decoded)),
                html: None,
            }
        });
    }

    let mut found = Bodies::default();
    for child in &part.parts {
        let child_bodies = find_bodies(child)?;
        if found.plain.is_none() {
            found.plain = child_bodies.plain.filter(|s| !s.is_empty());
        }
        if found.html.is_none() {
            found.html = child_bodies.html.filter(|s| !s.is_empty());
        }
        if found.plain.is_some() && found.html.is_some() {
            break;
        }
    }
    Ok(found)
}

fn decode_body(data: &str, part: &MessagePart) -> Result<String, ExtractError> {
    let bytes = BODY_ENGINE
        .decode(data.trim())
        .map_err(|e| ExtractError::Payload {
            part: part
                .part_id
                .clone()
                .unwrap_or_else(|| part.mime_type.clone()),
            reason: e.to_string(),
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Convert an HTML body to readable plain text.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len() / 2);
    collect_text(document.root_element(), &mut out);
    normalize_readable(&out)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = child_el.value().name();
                if SKIPPED_ELEMENTS.contains(&name) || is_quote_container(child_el) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let start = out.len();
                collect_text(child_el, out);
                if name == "p" && out.len() > start && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn is_quote_container(element: ElementRef<'_>) -> bool {
    element
        .value()
        .classes()
        .any(|class| QUOTE_CONTAINER_CLASSES.contains(&class))
}

/// Whitespace cleanup that keeps text human-readable.
///
/// Unescapes HTML entities, removes zero-width characters, unwraps
/// `<https://...>` links, collapses in-line whitespace while keeping line
/// breaks, and caps blank-line runs.
pub fn normalize_readable(text: &str) -> String {
    let unescaped = html_escape::decode_html_entities(text);
    let visible: String = unescaped
        .chars()
        .filter(|c| !ZERO_WIDTH.contains(c))
        .collect();
    let unwrapped = ANGLE_URL.replace_all(&visible, "$1");

    let collapsed = unwrapped
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n");

    BLANK_RUN
        .replace_all(&collapsed, "\n\n")
        .trim()
        .to_string()
}

/// Extract the recent, quote-free head of a body.
///
/// Cuts at the earliest [`QUOTE_SEPARATORS`] match, drops `>`-quoted lines,
/// then keeps at most `max_chars` characters.
pub fn derive_head(full_text: &str, max_chars: usize) -> String {
    let recent = match quote_cut(full_text) {
        Some(cut) => &full_text[..cut],
        None => full_text,
    };

    let kept = recent
        .lines()
        .filter(|line| !line.trim_start().starts_with('>'))
        .collect::<Vec<_>>()
        .join("\n");

    let truncated: String = kept.chars().take(max_chars).collect();
    truncated.trim().to_string()
}

/// Byte offset of the earliest quote separator, matched case-insensitively.
fn quote_cut(text: &str) -> Option<usize> {
    // One folded char per source char, so positions map back to `text`.
    let folded: Vec<(usize, char)> = text
        .char_indices()
        .map(|(offset, c)| (offset, fold_single(c)))
        .collect();

    QUOTE_SEPARATORS
        .iter()
        .filter_map(|marker| {
            let needle: Vec<char> = marker.chars().collect();
            folded
                .windows(needle.len())
                .position(|window| window.iter().map(|(_, c)| *c).eq(needle.iter().copied()))
                .map(|pos| folded[pos].0)
        })
        .min()
}

fn fold_single(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}
