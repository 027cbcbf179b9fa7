//! Relaying upstream chat completion responses to the caller.
//!
//! Streaming responses are forwarded chunk by chunk, byte for byte, in the
//! order received. Nothing is parsed or rewritten on the way through.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::core::error::{AppError, Result};
use crate::core::logging::get_request_id;

pub const CONTENT_TYPE_EVENT_STREAM: &str = "text/event-stream";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Pass-through stream over the upstream body.
///
/// Dropping it drops the upstream response, which releases the upstream
/// connection. A drop before the upstream finished means the caller went
/// away, and is logged as such.
pub struct RelayStream<E> {
    inner: BoxStream<'static, std::result::Result<Bytes, E>>,
    request_id: String,
    chunks: usize,
    bytes: usize,
    finished: bool,
}

impl<E: 'static> RelayStream<E> {
    pub fn new<S>(inner: S, request_id: String) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    {
        Self {
            inner: inner.boxed(),
            request_id,
            chunks: 0,
            bytes: 0,
            finished: false,
        }
    }
}

impl<E: std::fmt::Display> Stream for RelayStream<E> {
    type Item = std::result::Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.chunks += 1;
                self.bytes += chunk.len();
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::error!(
                    request_id = %self.request_id,
                    chunks = self.chunks,
                    error = %e,
                    "Upstream stream error"
                );
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Ready(None) => {
                self.finished = true;
                tracing::debug!(
                    request_id = %self.request_id,
                    chunks = self.chunks,
                    bytes = self.bytes,
                    "Upstream stream completed"
                );
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<E> Drop for RelayStream<E> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::info!(
                request_id = %self.request_id,
                chunks = self.chunks,
                bytes = self.bytes,
                "Client disconnected mid-stream, releasing upstream connection"
            );
        }
    }
}

fn upstream_status(response: &reqwest::Response) -> StatusCode {
    StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::OK)
}

/// Relay a streaming upstream response as `text/event-stream`.
pub fn relay_stream(response: reqwest::Response) -> Result<Response> {
    let status = upstream_status(&response);
    let stream = RelayStream::new(response.bytes_stream(), get_request_id());

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, CONTENT_TYPE_EVENT_STREAM)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Relay a buffered upstream response body unchanged as `application/json`.
pub async fn relay_buffered(response: reqwest::Response) -> Result<Response> {
    let status = upstream_status(&response);
    let body = response.bytes().await.map_err(AppError::Network)?;

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, CONTENT_TYPE_JSON)
        .body(Body::from(body))
        .map_err(|e| AppError::Internal(e.to_string()))
}
