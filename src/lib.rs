//! Poe Gateway - an OpenAI-compatible front for the Poe API
//!
//! The gateway accepts OpenAI-style chat completion and image generation
//! requests and forwards them to Poe, which speaks the same wire shape with a
//! different parameter dialect:
//!
//! - **Model aliasing**: caller-facing model names map to upstream names
//! - **Extra parameters**: provider-specific fields are moved into `extra_body`
//! - **Model defaults**: per-model parameter defaults fill gaps the caller left
//! - **Image generation**: size-based image requests become chat requests
//!   with an encoded aspect ratio
//! - **Streaming**: Server-Sent Events are relayed byte for byte
//!
//! # Architecture
//!
//! - [`transformer`]: the pure request translation (merger, image adapter,
//!   response extractor)
//! - [`api`]: HTTP handlers, routing, upstream calls and response relaying
//! - [`core`]: configuration, errors, logging context, metrics, middleware
//!
//! # Configuration
//!
//! Environment variables (all optional):
//! - `HOST` / `PORT`: bind address (default `0.0.0.0:3000`)
//! - `UPSTREAM_URL`: upstream chat completions endpoint
//! - `CONFIG_PATH`: translation document (default `config.json`)
//! - `VERIFY_SSL`: verify upstream certificates (default true)
//! - `REQUEST_TIMEOUT_SECS`: upstream timeout (default 300)
//! - `IMAGE_GENERATION`: enable `/v1/images/generations` (default true;
//!   non-square sizes additionally require `aspect` in `extraBodyParams`)

pub mod api;
pub mod core;
pub mod transformer;

// Re-export commonly used types for convenience
pub use api::{build_router, AppState, UpstreamClient};
pub use core::{AppConfig, AppError, Result, TranslationConfig};
pub use transformer::{merge_request, ChatRequest, UpstreamRequest};
