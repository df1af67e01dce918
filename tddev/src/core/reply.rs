//! Extraction of JSON payloads from free-form model replies.

use serde::de::DeserializeOwned;

const FENCE: &str = "```";

/// Return the JSON-looking part of a reply.
///
/// Replies are accepted as plain JSON or wrapped in a fenced code block, with
/// or without a language tag. Only the first fenced block is considered; an
/// unterminated fence runs to the end of the reply.
pub fn extract_json(reply: &str) -> &str {
    let Some(open) = reply.find(FENCE) else {
        return reply.trim();
    };
    let mut body = &reply[open + FENCE.len()..];

    // Skip a language tag such as `json` or `JSON` on the fence line.
    if let Some(newline) = body.find('\n') {
        let tag = body[..newline].trim();
        if tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            body = &body[newline + 1..];
        }
    }

    let end = body.find(FENCE).unwrap_or(body.len());
    body[..end].trim()
}

/// Parse the JSON payload of a model reply into `T`.
pub fn parse_reply<T: DeserializeOwned>(reply: &str) -> serde_json::Result<T> {
    serde_json::from_str(extract_json(reply))
}
