//! Anthropic Messages API wire format.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{LlmError, Provider, Role, encode_image, image_media_type, post_json};

pub(super) const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
pub const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub model: &'a str,
    pub messages: Vec<Turn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct Turn {
    role: Role,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

impl Turn {
    pub fn text(role: Role, text: &str) -> Self {
        Self {
            role,
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
        }
    }

    /// User turn with inline base64 images followed by the text.
    ///
    /// Paths that do not exist are skipped with a warning.
    pub fn with_images(text: &str, images: &[PathBuf]) -> Result<Self, LlmError> {
        let mut content = Vec::with_capacity(images.len() + 1);
        for path in images {
            if !path.exists() {
                warn!(path = %path.display(), "image not found, skipping");
                continue;
            }
            content.push(ContentBlock::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: image_media_type(path),
                    data: encode_image(Provider::Anthropic, path)?,
                },
            });
        }
        content.push(ContentBlock::Text {
            text: text.to_string(),
        });
        Ok(Self {
            role: Role::User,
            content,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub fn send(
    http: &reqwest::blocking::Client,
    api_key: &str,
    request: &Request<'_>,
) -> Result<String, LlmError> {
    let builder = http
        .post(Provider::Anthropic.endpoint())
        .header("x-api-key", api_key)
        .header("anthropic-version", API_VERSION);
    let body = post_json(Provider::Anthropic, builder, request)?;
    parse_response(&body)
}

fn parse_response(body: &str) -> Result<String, LlmError> {
    let response: Response = serde_json::from_str(body).map_err(|e| {
        LlmError::provider_with_source(Provider::Anthropic, "decode response", e)
    })?;
    response
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .ok_or_else(|| LlmError::provider(Provider::Anthropic, "response has no text block"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_puts_system_at_top_level() {
        let request = Request {
            model: "claude-sonnet-4-5-20250929",
            messages: vec![Turn::text(Role::User, "hi")],
            system: Some("be brief"),
            temperature: 0.0,
            max_tokens: 16,
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["system"], "be brief");
        assert_eq!(
            value["messages"],
            json!([{"role": "user", "content": [{"type": "text", "text": "hi"}]}])
        );
    }

    #[test]
    fn request_omits_absent_system() {
        let request = Request {
            model: "m",
            messages: Vec::new(),
            system: None,
            temperature: 0.0,
            max_tokens: 16,
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert!(value.get("system").is_none());
    }

    #[test]
    fn images_precede_text_and_missing_files_are_skipped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let image = temp.path().join("design.png");
        std::fs::write(&image, [0x89, b'P', b'N', b'G']).expect("write image");
        let missing = temp.path().join("missing.jpg");

        let turn = Turn::with_images("describe", &[image, missing]).expect("turn");
        let value = serde_json::to_value(&turn).expect("serialize");
        let content = value["content"].as_array().expect("content array");
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[0]["source"]["media_type"], "image/png");
        assert_eq!(content[0]["source"]["data"], "iVBORw==");
        assert_eq!(content[1]["text"], "describe");
    }

    #[test]
    fn first_text_block_is_the_answer() {
        let body = r#"{"content":[{"type":"tool_use","id":"x"},{"type":"text","text":"hello"},{"type":"text","text":"later"}]}"#;
        assert_eq!(parse_response(body).expect("parse"), "hello");
    }

    #[test]
    fn empty_content_is_a_provider_error() {
        let err = parse_response(r#"{"content":[]}"#).unwrap_err();
        assert!(matches!(err, LlmError::Provider { provider: Provider::Anthropic, .. }));
        assert!(parse_response("not json").is_err());
    }
}
