//! Image generation on top of chat completions.
//!
//! The upstream renders images through a chat model on a single fixed canvas
//! and takes the aspect ratio as a side-channel `aspect` parameter. Requests
//! to `/v1/images/generations` are re-expressed as chat requests here, and
//! the chat response is turned back into an images response.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::merge::merge_request;
use super::request::{ChatRequest, UpstreamRequest};
use crate::core::config::{TranslationConfig, ASPECT_PARAM};
use crate::core::error::{AppError, Result};

/// Model id used for every image generation.
pub const IMAGE_MODEL: &str = "dall-e-3";

/// Canvas size the upstream accepts.
pub const CANVAS_SIZE: &str = "1024x1024";

/// Token budget of the synthetic chat request.
pub const IMAGE_MAX_TOKENS: u32 = 4096;

/// `revised_prompt` returned with every image; not derived from upstream.
pub const REVISED_PROMPT: &str = "Image generated from the provided prompt";

static IMAGE_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s)]+").expect("valid image url pattern"));

/// `POST /v1/images/generations` body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,

    #[serde(default)]
    pub size: Option<String>,

    /// Forwarded untouched, like any other standard chat parameter
    #[serde(default)]
    pub quality: Option<Value>,

    #[serde(default)]
    pub style: Option<Value>,
}

/// Images API response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResponse {
    pub created: i64,
    pub data: Vec<ImageData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub revised_prompt: String,
    pub url: String,
}

/// Map a requested pixel size to the upstream aspect ratio.
///
/// `Ok(None)` means the square canvas, which needs no aspect parameter.
pub fn aspect_for_size(size: &str) -> Result<Option<&'static str>> {
    match size {
        "1024x1024" => Ok(None),
        "1792x1024" => Ok(Some("7:4")),
        "1024x1792" => Ok(Some("4:7")),
        other => Err(AppError::InvalidSize(other.to_string())),
    }
}

/// Build the synthetic chat request for an image generation.
pub fn image_chat_request(request: &ImageRequest) -> Result<ChatRequest> {
    let size = request.size.as_deref().unwrap_or(CANVAS_SIZE);
    let aspect = aspect_for_size(size)?;

    let mut params = Map::new();
    params.insert("max_tokens".to_string(), json!(IMAGE_MAX_TOKENS));
    params.insert("size".to_string(), json!(CANVAS_SIZE));
    if let Some(quality) = &request.quality {
        params.insert("quality".to_string(), quality.clone());
    }
    if let Some(style) = &request.style {
        params.insert("style".to_string(), style.clone());
    }
    if let Some(aspect) = aspect {
        params.insert(ASPECT_PARAM.to_string(), json!(aspect));
    }

    Ok(ChatRequest {
        model: Some(IMAGE_MODEL.to_string()),
        messages: Some(json!([{ "role": "user", "content": request.prompt }])),
        extra_body: None,
        params,
    })
}

/// Translate an image request into the upstream chat payload.
///
/// The `aspect` parameter only survives the merge when `aspect` is a
/// configured extra parameter; see [`TranslationConfig::supports_aspect`].
pub fn adapt_image_request(
    request: &ImageRequest,
    config: &TranslationConfig,
) -> Result<UpstreamRequest> {
    let chat = image_chat_request(request)?;
    Ok(merge_request(&chat, config))
}

/// Find the first http(s) URL in `text`, ending at whitespace or `)`.
pub fn extract_image_url(text: &str) -> Option<&str> {
    IMAGE_URL_RE.find(text).map(|m| m.as_str())
}

/// Text of the first choice's message.
///
/// Array content is reduced to its text parts, joined by newlines.
fn message_text(body: &Value) -> String {
    match body.pointer("/choices/0/message/content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(text) => Some(text.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// Build the images response from an upstream chat completion body.
///
/// Never fails: a response without a URL yields an empty `url`.
pub fn extract_image_response(body: &Value, created: i64) -> ImageResponse {
    let text = message_text(body);
    let url = extract_image_url(&text).unwrap_or_default().to_string();

    ImageResponse {
        created,
        data: vec![ImageData {
            revised_prompt: REVISED_PROMPT.to_string(),
            url,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn image_request(size: Option<&str>) -> ImageRequest {
        ImageRequest {
            prompt: "a lighthouse at dusk".to_string(),
            size: size.map(str::to_string),
            quality: None,
            style: None,
        }
    }

    fn aspect_config() -> TranslationConfig {
        TranslationConfig {
            extra_body_params: [ASPECT_PARAM.to_string()].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_aspect_table() {
        assert_eq!(aspect_for_size("1024x1024").unwrap(), None);
        assert_eq!(aspect_for_size("1792x1024").unwrap(), Some("7:4"));
        assert_eq!(aspect_for_size("1024x1792").unwrap(), Some("4:7"));
    }

    #[test]
    fn test_unsupported_size_is_rejected() {
        for size in ["512x512", "256x256", "1024X1024", ""] {
            match aspect_for_size(size) {
                Err(AppError::InvalidSize(value)) => assert_eq!(value, size),
                other => panic!("expected InvalidSize for {:?}, got {:?}", size, other),
            }
        }
    }

    #[test]
    fn test_square_request_has_no_aspect() {
        let out = adapt_image_request(&image_request(None), &aspect_config()).unwrap();
        assert_eq!(
            out.to_value(),
            json!({
                "model": "dall-e-3",
                "messages": [{"role": "user", "content": "a lighthouse at dusk"}],
                "max_tokens": 4096,
                "size": "1024x1024"
            })
        );
    }

    #[test]
    fn test_wide_request_forces_canvas_and_sets_aspect() {
        let out =
            adapt_image_request(&image_request(Some("1792x1024")), &aspect_config()).unwrap();
        assert_eq!(out.params["size"], json!("1024x1024"));
        assert_eq!(out.extra_body["aspect"], json!("7:4"));
    }

    #[test]
    fn test_tall_request_sets_aspect() {
        let out =
            adapt_image_request(&image_request(Some("1024x1792")), &aspect_config()).unwrap();
        assert_eq!(out.extra_body["aspect"], json!("4:7"));
    }

    #[test]
    fn test_aspect_dropped_without_extra_param_config() {
        let out = adapt_image_request(
            &image_request(Some("1792x1024")),
            &TranslationConfig::default(),
        )
        .unwrap();
        assert!(out.extra_body.is_empty());
        assert!(!out.params.contains_key("aspect"));
    }

    #[test]
    fn test_quality_and_style_are_forwarded() {
        let request = ImageRequest {
            quality: Some(json!("hd")),
            style: Some(json!("vivid")),
            ..image_request(None)
        };
        let out = adapt_image_request(&request, &TranslationConfig::default()).unwrap();
        assert_eq!(out.params["quality"], json!("hd"));
        assert_eq!(out.params["style"], json!("vivid"));
    }

    #[test]
    fn test_non_string_quality_is_accepted_and_forwarded() {
        let request: ImageRequest =
            serde_json::from_value(json!({"prompt": "a fox", "quality": 1, "style": null}))
                .unwrap();
        assert_eq!(request.style, None);

        let out = adapt_image_request(&request, &TranslationConfig::default()).unwrap();
        assert_eq!(out.params["quality"], json!(1));
        assert!(!out.params.contains_key("style"));
    }

    #[test]
    fn test_image_model_alias_and_defaults_apply() {
        let config = TranslationConfig {
            model_mapping: [("dall-e-3".to_string(), "FLUX-pro".to_string())]
                .into_iter()
                .collect(),
            model_default_params: [(
                "dall-e-3".to_string(),
                json!({"quality": "standard"}).as_object().cloned().unwrap(),
            )]
            .into_iter()
            .collect(),
            ..aspect_config()
        };
        let out = adapt_image_request(&image_request(None), &config).unwrap();
        assert_eq!(out.model.as_deref(), Some("FLUX-pro"));
        assert_eq!(out.params["quality"], json!("standard"));
    }

    #[test]
    fn test_extract_url_stops_at_paren_and_whitespace() {
        assert_eq!(
            extract_image_url("![image](https://cdn.example.com/a.png) done"),
            Some("https://cdn.example.com/a.png")
        );
        assert_eq!(
            extract_image_url("see http://x.test/img.jpg\nthanks"),
            Some("http://x.test/img.jpg")
        );
        assert_eq!(extract_image_url("no link here"), None);
    }

    #[test]
    fn test_extract_image_response_first_url() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Here: https://a.test/1.png and https://a.test/2.png"
                }
            }]
        });
        let response = extract_image_response(&body, 1_700_000_000);
        assert_eq!(response.created, 1_700_000_000);
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].url, "https://a.test/1.png");
        assert_eq!(response.data[0].revised_prompt, REVISED_PROMPT);
    }

    #[test]
    fn test_extract_image_response_from_content_parts() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": [
                        {"type": "text", "text": "Generating..."},
                        {"type": "text", "text": "https://a.test/parts.webp"}
                    ]
                }
            }]
        });
        let response = extract_image_response(&body, 0);
        assert_eq!(response.data[0].url, "https://a.test/parts.webp");
    }

    #[test]
    fn test_extract_image_response_without_url() {
        for body in [
            json!({"choices": [{"message": {"content": "I can't draw that."}}]}),
            json!({"choices": []}),
            json!({}),
        ] {
            let response = extract_image_response(&body, 0);
            assert_eq!(response.data[0].url, "");
        }
    }
}
