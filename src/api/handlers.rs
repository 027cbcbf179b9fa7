//! HTTP request handlers for the gateway API.
//!
//! This module contains the chat completions and image generation handlers,
//! the model listing, the capability document, health and metrics.

use crate::api::models::*;
use crate::api::streaming::{relay_buffered, relay_stream};
use crate::api::upstream::UpstreamClient;
use crate::core::config::TranslationConfig;
use crate::core::logging::get_request_id;
use crate::core::middleware::ModelName;
use crate::core::{AppError, Result};
use crate::transformer::{
    adapt_image_request, aspect_for_size, extract_image_response, merge_request, ChatRequest,
    ImageRequest, CANVAS_SIZE, IMAGE_MODEL,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::Value;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub translation: Arc<TranslationConfig>,
    pub upstream: UpstreamClient,
    /// Operator switch for `/v1/images/generations`
    pub image_generation: bool,
}

impl AppState {
    /// Build the state, asserting the image generation precondition.
    ///
    /// Non-square sizes depend on `aspect` being an extra parameter; without
    /// it those sizes are refused rather than silently rendered square.
    pub fn new(
        translation: TranslationConfig,
        upstream: UpstreamClient,
        image_generation: bool,
    ) -> Self {
        if !image_generation {
            tracing::info!("Image generation disabled by configuration");
        } else if !translation.supports_aspect() {
            tracing::error!(
                "Image generation requires \"aspect\" in extraBodyParams; \
                 only 1024x1024 images will be served"
            );
        }

        Self {
            translation: Arc::new(translation),
            upstream,
            image_generation,
        }
    }

    /// Whether an image with the given aspect can be served as requested.
    pub fn can_render(&self, aspect: Option<&str>) -> bool {
        self.image_generation && (aspect.is_none() || self.translation.supports_aspect())
    }
}

/// Extract the caller's bearer token.
///
/// The token is never validated here; the upstream is the sole authority.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
        .filter(|token| !token.is_empty())
        .ok_or(AppError::MissingCredential)
}

fn with_model(mut response: Response, model: Option<&str>) -> Response {
    if let Some(model) = model {
        response
            .extensions_mut()
            .insert(ModelName(model.to_string()));
    }
    response
}

/// Handle chat completion requests.
///
/// The upstream answer is relayed verbatim, streamed when the resolved
/// request asks for streaming.
#[tracing::instrument(
    skip(state, headers, payload),
    fields(request_id = %get_request_id(), model = tracing::field::Empty)
)]
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response> {
    let token = bearer_token(&headers)?;
    let Json(request) = payload.map_err(|e| AppError::InvalidBody(e.body_text()))?;

    if let Some(model) = &request.model {
        tracing::Span::current().record("model", model.as_str());
    }

    let upstream_request = merge_request(&request, &state.translation);
    let is_stream = upstream_request.is_streaming();

    tracing::debug!(
        caller_model = ?request.model,
        upstream_model = ?upstream_request.model,
        stream = is_stream,
        extra_body = upstream_request.extra_body.len(),
        "Processing chat completion request"
    );

    let response = state
        .upstream
        .send(token, &upstream_request, "chat")
        .await?;

    let relayed = if is_stream {
        relay_stream(response)?
    } else {
        relay_buffered(response).await?
    };
    Ok(with_model(relayed, request.model.as_deref()))
}

/// Handle image generation requests by routing them through chat completions.
#[tracing::instrument(skip(state, headers, payload), fields(request_id = %get_request_id()))]
pub async fn image_generations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Response> {
    let token = bearer_token(&headers)?;
    let Json(request) = payload.map_err(|e| AppError::InvalidBody(e.body_text()))?;

    let aspect = aspect_for_size(request.size.as_deref().unwrap_or(CANVAS_SIZE))?;
    if !state.can_render(aspect) {
        return Err(AppError::ImageGenerationDisabled);
    }

    let upstream_request = adapt_image_request(&request, &state.translation)?;

    tracing::debug!(
        size = ?request.size,
        upstream_model = ?upstream_request.model,
        aspect = ?upstream_request.extra_body.get("aspect"),
        "Processing image generation request"
    );

    let response = state
        .upstream
        .send(token, &upstream_request, "image")
        .await?;
    let bytes = response.bytes().await.map_err(AppError::Network)?;
    let body = serde_json::from_slice::<Value>(&bytes).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Upstream image response is not valid JSON");
        Value::Null
    });

    let images = extract_image_response(&body, chrono::Utc::now().timestamp());
    if images.data.iter().all(|image| image.url.is_empty()) {
        tracing::warn!("No image URL found in upstream response");
    }

    Ok(with_model(Json(images).into_response(), Some(IMAGE_MODEL)))
}

/// List available models: configured aliases plus the image model.
#[tracing::instrument(skip(state))]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    let mut aliases: Vec<&str> = state
        .translation
        .model_mapping
        .keys()
        .map(String::as_str)
        .filter(|alias| *alias != IMAGE_MODEL)
        .collect();
    aliases.sort_unstable();

    let data = aliases
        .into_iter()
        .chain(std::iter::once(IMAGE_MODEL))
        .map(ModelInfo::new)
        .collect();

    Json(ModelList {
        object: "list".to_string(),
        data,
    })
}

/// Describe the service. Answers every route not otherwise handled.
pub async fn service_info(State(state): State<Arc<AppState>>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "OpenAI-compatible gateway translating chat completion and image \
                      generation requests for the Poe API"
            .to_string(),
        endpoints: vec![
            EndpointInfo::new(
                "POST",
                "/v1/chat/completions",
                "Chat completions, streamed or buffered",
                true,
            ),
            EndpointInfo::new(
                "POST",
                "/v1/images/generations",
                "Image generation via chat completions",
                true,
            ),
            EndpointInfo::new("GET", "/v1/models", "Available models", false),
            EndpointInfo::new("GET", "/health", "Liveness check", false),
            EndpointInfo::new("GET", "/metrics", "Prometheus metrics", false),
        ],
        image_generation: ImageCapability {
            enabled: state.image_generation,
            model: IMAGE_MODEL.to_string(),
            sizes: ["1024x1024", "1792x1024", "1024x1792"]
                .into_iter()
                .filter(|size| {
                    aspect_for_size(size)
                        .map(|aspect| state.can_render(aspect))
                        .unwrap_or(false)
                })
                .map(str::to_string)
                .collect(),
        },
    })
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Prometheus metrics endpoint.
#[tracing::instrument]
pub async fn metrics_handler() -> Result<Response> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(buffer.into())
        .map_err(|e| AppError::Internal(e.to_string()))
}
