use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tasks::Role;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// A chat completion chunk: `{choices: [{index, delta: {role?, content?}}]}`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ChatCompletionChunk {
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Token {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub text: String,
    #[serde(default)]
    pub special: bool,
}

/// A raw text generation chunk: `{token, generated_text}`. The full text is
/// only set on the last chunk.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TextGenerationChunk {
    pub token: Token,
    pub generated_text: Option<String>,
}

/// One delta of a streamed generation. Whatever the vendor's wire format,
/// the content of a chunk is only the text that is new since the previous
/// chunk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum StreamChunk {
    Chat(ChatCompletionChunk),
    Text(TextGenerationChunk),
}

impl StreamChunk {
    /// The new text carried by the chunk, on its first choice.
    pub fn delta_text(&self) -> Option<&str> {
        match self {
            StreamChunk::Chat(chunk) => chunk
                .choices
                .first()
                .and_then(|choice| choice.delta.content.as_deref()),
            StreamChunk::Text(chunk) => chunk.delta_text(),
        }
    }
}

impl TextGenerationChunk {
    pub fn delta_text(&self) -> Option<&str> {
        if self.token.special {
            None
        } else {
            Some(&self.token.text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chunk_shapes_are_told_apart() {
        let chat: StreamChunk = serde_json::from_value(json!({
            "choices": [{"index": 0, "delta": {"content": "Hi"}}]
        }))
        .unwrap();
        assert!(matches!(chat, StreamChunk::Chat(_)));
        assert_eq!(chat.delta_text(), Some("Hi"));

        let text: StreamChunk = serde_json::from_value(json!({
            "token": {"id": 7, "text": " there", "special": false},
            "generated_text": null
        }))
        .unwrap();
        assert!(matches!(text, StreamChunk::Text(_)));
        assert_eq!(text.delta_text(), Some(" there"));
    }

    #[test]
    fn special_tokens_carry_no_text() {
        let chunk = TextGenerationChunk {
            token: Token {
                id: Some(2),
                text: "</s>".to_string(),
                special: true,
            },
            generated_text: Some("done".to_string()),
        };

        assert_eq!(chunk.delta_text(), None);
    }
}
