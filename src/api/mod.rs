//! API layer for the gateway.
//!
//! This module contains the HTTP handlers, the route table, upstream
//! execution and response relaying.

pub mod handlers;
pub mod models;
pub mod router;
pub mod streaming;
pub mod upstream;

// Re-export commonly used types
pub use handlers::{
    bearer_token, chat_completions, health, image_generations, list_models, metrics_handler,
    service_info, AppState,
};
pub use models::{ModelInfo, ModelList, ServiceInfo};
pub use router::build_router;
pub use streaming::{relay_buffered, relay_stream, RelayStream};
pub use upstream::UpstreamClient;
