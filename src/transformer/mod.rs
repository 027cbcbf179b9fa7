//! Request translation between the OpenAI dialect and the upstream dialect.
//!
//! ```text
//! POST /v1/chat/completions        POST /v1/images/generations
//!          │                                  │
//!          │                       [image::image_chat_request]
//!          │                                  │
//!          └──────────► [merge::merge_request] ◄┘
//!                               │
//!                        UpstreamRequest ──► upstream
//!                                               │
//!          verbatim relay ◄─────────────────────┤
//!                                               ▼
//!                                [image::extract_image_response]
//! ```
//!
//! Everything in this module is total and side-effect free; only the
//! upstream call in [`crate::api::upstream`] can fail.

pub mod image;
pub mod merge;
pub mod request;

pub use image::{
    adapt_image_request, aspect_for_size, extract_image_response, extract_image_url,
    ImageData, ImageRequest, ImageResponse, CANVAS_SIZE, IMAGE_MODEL,
};
pub use merge::merge_request;
pub use request::{ChatRequest, UpstreamRequest, STANDARD_PARAMS};
