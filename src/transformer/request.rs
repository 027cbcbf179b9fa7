//! Typed request documents on both sides of the translation.
//!
//! [`ChatRequest`] is what callers send; [`UpstreamRequest`] is what the
//! upstream receives. Both keep the fields the translation inspects as named
//! members and carry everything else in an explicit parameter bag.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Standard Parameters
// ============================================================================

/// Field names the upstream accepts natively, in canonical order.
///
/// `model` and `messages` are listed for completeness; the merger resolves
/// them separately and never applies defaults to them.
pub const STANDARD_PARAMS: &[&str] = &[
    "model",
    "messages",
    // sampling
    "temperature",
    "top_p",
    "n",
    "stop",
    "max_tokens",
    "max_completion_tokens",
    "presence_penalty",
    "frequency_penalty",
    "logit_bias",
    "logprobs",
    "top_logprobs",
    "seed",
    // streaming
    "stream",
    "stream_options",
    // tools and functions
    "tools",
    "tool_choice",
    "parallel_tool_calls",
    "functions",
    "function_call",
    // output shaping
    "response_format",
    "reasoning_effort",
    "modalities",
    "audio",
    // bookkeeping
    "user",
    "metadata",
    "store",
    "service_tier",
    // image
    "size",
    "quality",
    "style",
];

/// Fields resolved outside the parameter bags.
pub const RESERVED_FIELDS: &[&str] = &["model", "messages", "extra_body"];

pub fn is_standard_param(name: &str) -> bool {
    STANDARD_PARAMS.contains(&name)
}

pub fn is_reserved_field(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

// ============================================================================
// Incoming
// ============================================================================

/// OpenAI-style chat completion request as sent by the caller.
///
/// Decoding never fails on the inspected fields: a non-string `model` or a
/// non-object `extra_body` is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub model: Option<String>,

    #[serde(default)]
    pub messages: Option<Value>,

    #[serde(default, deserialize_with = "lenient_object")]
    pub extra_body: Option<Map<String, Value>>,

    /// Every other top-level field, standard or not
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl ChatRequest {
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_object<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => Some(map),
        _ => None,
    })
}

// ============================================================================
// Outgoing
// ============================================================================

/// Request body sent to the upstream chat completions endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpstreamRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Value>,

    /// Native upstream parameters
    #[serde(flatten)]
    pub params: Map<String, Value>,

    /// Side-channel parameters; omitted from the wire when empty
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extra_body: Map<String, Value>,
}

impl UpstreamRequest {
    /// Whether `name` is already set as a native parameter or in `extra_body`.
    pub fn has_param(&self, name: &str) -> bool {
        match name {
            "model" => self.model.is_some(),
            "messages" => self.messages.is_some(),
            _ => self.params.contains_key(name) || self.extra_body.contains_key(name),
        }
    }

    /// Whether the resolved request asks for a streamed response.
    pub fn is_streaming(&self) -> bool {
        matches!(self.params.get("stream"), Some(Value::Bool(true)))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_params_contains_core_fields() {
        for name in ["model", "messages", "temperature", "tools", "size", "quality", "style"] {
            assert!(is_standard_param(name), "{} should be standard", name);
        }
        assert!(!is_standard_param("aspect"));
        assert!(!is_standard_param("extra_body"));
    }

    #[test]
    fn test_standard_params_unique() {
        let mut seen = std::collections::HashSet::new();
        for name in STANDARD_PARAMS {
            assert!(seen.insert(*name), "duplicate standard param {}", name);
        }
    }

    #[test]
    fn test_chat_request_splits_named_fields() {
        let request: ChatRequest = serde_json::from_value(json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.5,
            "extra_body": {"thinking_budget": 10},
            "custom": true
        }))
        .unwrap();

        assert_eq!(request.model.as_deref(), Some("gpt-4"));
        assert_eq!(request.messages.as_ref().unwrap()[0]["content"], "hi");
        assert_eq!(request.extra_body.as_ref().unwrap()["thinking_budget"], 10);
        assert_eq!(request.param("temperature"), Some(&json!(0.5)));
        assert_eq!(request.param("custom"), Some(&json!(true)));
        assert!(request.param("model").is_none());
        assert!(request.param("extra_body").is_none());
    }

    #[test]
    fn test_chat_request_malformed_fields_are_absent() {
        let request: ChatRequest = serde_json::from_value(json!({
            "model": 42,
            "extra_body": "not an object"
        }))
        .unwrap();

        assert!(request.model.is_none());
        assert!(request.extra_body.is_none());
        assert!(request.messages.is_none());
    }

    #[test]
    fn test_upstream_request_omits_empty_parts() {
        let request = UpstreamRequest {
            model: Some("m".to_string()),
            ..Default::default()
        };
        assert_eq!(request.to_value(), json!({"model": "m"}));
    }

    #[test]
    fn test_upstream_request_flattens_params() {
        let mut request = UpstreamRequest::default();
        request.params.insert("stream".to_string(), json!(true));
        request.extra_body.insert("aspect".to_string(), json!("7:4"));

        assert!(request.is_streaming());
        assert!(request.has_param("aspect"));
        assert_eq!(
            request.to_value(),
            json!({"stream": true, "extra_body": {"aspect": "7:4"}})
        );
    }

    #[test]
    fn test_is_streaming_requires_boolean_true() {
        let mut request = UpstreamRequest::default();
        assert!(!request.is_streaming());
        request.params.insert("stream".to_string(), json!("true"));
        assert!(!request.is_streaming());
        request.params.insert("stream".to_string(), json!(false));
        assert!(!request.is_streaming());
    }
}
