//! OpenAI Chat Completions wire format.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{ChatMessage, LlmError, Provider, Role, encode_image, image_media_type, post_json};

pub(super) const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub model: &'a str,
    pub messages: Vec<Turn>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct Turn {
    role: &'static str,
    content: Content,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Content {
    Text(String),
    Parts(Vec<Part>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Part {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

impl Turn {
    fn plain(role: &'static str, text: &str) -> Self {
        Self {
            role,
            content: Content::Text(text.to_string()),
        }
    }

    /// User turn with the text followed by one image part per entry.
    ///
    /// Existing local files are inlined as `data:` URLs; anything else is
    /// passed through as a remote URL.
    pub fn with_images(text: &str, images: &[PathBuf]) -> Result<Self, LlmError> {
        let mut parts = vec![Part::Text {
            text: text.to_string(),
        }];
        for path in images {
            let url = if path.exists() {
                format!(
                    "data:{};base64,{}",
                    image_media_type(path),
                    encode_image(Provider::OpenAi, path)?
                )
            } else {
                path.to_string_lossy().into_owned()
            };
            parts.push(Part::ImageUrl {
                image_url: ImageUrl { url },
            });
        }
        Ok(Self {
            role: "user",
            content: Content::Parts(parts),
        })
    }
}

/// Conversation turns with the system prompt, if any, as the leading message.
pub fn with_system(system: Option<&str>, messages: &[ChatMessage]) -> Vec<Turn> {
    let mut turns = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system {
        turns.push(Turn::plain("system", system));
    }
    turns.extend(messages.iter().map(|m| {
        let role = match m.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Turn::plain(role, &m.content)
    }));
    turns
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub fn send(
    http: &reqwest::blocking::Client,
    api_key: &str,
    request: &Request<'_>,
) -> Result<String, LlmError> {
    let builder = http.post(Provider::OpenAi.endpoint()).bearer_auth(api_key);
    let body = post_json(Provider::OpenAi, builder, request)?;
    parse_response(&body)
}

fn parse_response(body: &str) -> Result<String, LlmError> {
    let response: Response = serde_json::from_str(body)
        .map_err(|e| LlmError::provider_with_source(Provider::OpenAi, "decode response", e))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LlmError::provider(Provider::OpenAi, "response has no message content"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn system_prompt_leads_the_conversation() {
        let turns = with_system(
            Some("be brief"),
            &[
                ChatMessage::user("hi"),
                ChatMessage {
                    role: Role::Assistant,
                    content: "hello".to_string(),
                },
            ],
        );
        let value = serde_json::to_value(&turns).expect("serialize");
        assert_eq!(
            value,
            json!([
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"},
            ])
        );
    }

    #[test]
    fn local_images_become_data_urls_and_others_pass_through() {
        let temp = tempfile::tempdir().expect("tempdir");
        let image = temp.path().join("mock.gif");
        std::fs::write(&image, b"GIF").expect("write image");

        let turn = Turn::with_images(
            "compare",
            &[image, PathBuf::from("https://example.com/design.png")],
        )
        .expect("turn");
        let value = serde_json::to_value(&turn).expect("serialize");
        let parts = value["content"].as_array().expect("parts");
        assert_eq!(parts[0], json!({"type": "text", "text": "compare"}));
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/gif;base64,R0lG");
        assert_eq!(
            parts[2]["image_url"]["url"],
            "https://example.com/design.png"
        );
    }

    #[test]
    fn first_choice_is_the_answer() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"done"}},{"message":{"content":"ignored"}}]}"#;
        assert_eq!(parse_response(body).expect("parse"), "done");
    }

    #[test]
    fn missing_content_is_a_provider_error() {
        let err = parse_response(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap_err();
        assert!(matches!(err, LlmError::Provider { provider: Provider::OpenAi, .. }));
        assert!(parse_response(r#"{"choices":[]}"#).is_err());
    }
}
