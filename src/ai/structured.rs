//! JSON-returning calls on top of a plain text [`LlmClient`].

use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::client::{LlmClient, LlmRequest};
use super::repair::{json_regions, parse_json, strip_code_fences};

/// Model output budget used when a prompt does not set one.
pub const DEFAULT_MAX_TOKENS: u32 = 16_000;

/// Text sent to the model; the output schema is appended by the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Asks a model for a JSON array of objects and recovers it from the reply.
pub struct StructuredGenerator<C> {
    client: C,
    timeout: Duration,
}

impl<C: LlmClient> StructuredGenerator<C> {
    pub fn new(client: C, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Objects returned by the model for `prompt`.
    ///
    /// Failures, timeouts and unparseable replies all yield an empty list.
    pub async fn generate_structured(&self, prompt: &Prompt, schema: &Value) -> Vec<Map<String, Value>> {
        let schema_text = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        let request = LlmRequest {
            system: prompt.system.clone(),
            user: format!(
                "{}\n\nRespond with a JSON array only. Each element must match this JSON schema:\n{}",
                prompt.user, schema_text
            ),
            max_tokens: prompt.max_tokens,
        };

        let text = match tokio::time::timeout(self.timeout, self.client.complete(request)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(error = %e, "model call failed");
                return Vec::new();
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "model call timed out");
                return Vec::new();
            }
        };
        items_from_response(&text)
    }
}

/// Objects from a raw model reply.
///
/// The first JSON array (or object) that parses is used. An object whose
/// only field is an array is unwrapped; any other object is a single item.
pub fn items_from_response(text: &str) -> Vec<Map<String, Value>> {
    let body = strip_code_fences(text);
    match json_regions(body).find_map(parse_json) {
        Some(value) => objects(value),
        None => {
            debug!(chars = text.len(), "model reply contains no usable JSON");
            Vec::new()
        }
    }
}

fn objects(value: Value) -> Vec<Map<String, Value>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::Array(_)) = map.values().next() {
                    let inner = map.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null);
                    return objects(inner);
                }
            }
            vec![map]
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::LlmError;
    use async_trait::async_trait;
    use serde_json::json;

    struct Canned(Result<&'static str, ()>);

    #[async_trait]
    impl LlmClient for Canned {
        async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
            assert!(request.user.contains("JSON schema"));
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(()) => Err(LlmError::Stream("boom".to_string())),
            }
        }
    }

    struct Slow;

    #[async_trait]
    impl LlmClient for Slow {
        async fn complete(&self, _request: LlmRequest) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("[{\"a\": 1}]".to_string())
        }
    }

    fn prompt() -> Prompt {
        Prompt::new("You extract facts.", "Extract config keys.")
    }

    #[test]
    fn test_items_from_response() {
        assert_eq!(items_from_response("```json\n[{\"a\": 1}, 2]\n```").len(), 1);
        let wrapped = items_from_response("{\"config\": [{\"key\": \"A\"}, {\"key\": \"B\"}]}");
        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[1]["key"], json!("B"));
        assert_eq!(items_from_response("{\"key\": \"A\", \"source\": \"env\"}").len(), 1);
        assert!(items_from_response("I could not find anything.").is_empty());
    }

    #[test]
    fn test_truncated_reply_recovers_item() {
        let items = items_from_response(r#"[{"key": "FOO", "required": tru"#);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["required"], json!(true));
    }

    #[tokio::test]
    async fn test_generate_structured() {
        let generator = StructuredGenerator::new(Canned(Ok("[{\"key\": \"PORT\"}]")), Duration::from_secs(1));
        let items = generator.generate_structured(&prompt(), &json!({"type": "object"})).await;
        assert_eq!(items[0]["key"], json!("PORT"));
    }

    #[tokio::test]
    async fn test_client_error_yields_empty() {
        let generator = StructuredGenerator::new(Canned(Err(())), Duration::from_secs(1));
        assert!(generator.generate_structured(&prompt(), &json!({})).await.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_yields_empty() {
        let generator = StructuredGenerator::new(Slow, Duration::from_millis(20));
        assert!(generator.generate_structured(&prompt(), &json!({})).await.is_empty());
    }
}
