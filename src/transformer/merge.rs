//! Parameter classification and merging.
//!
//! Turns a caller's [`ChatRequest`] into an [`UpstreamRequest`] by sorting
//! every field into one of three namespaces:
//!
//! - standard parameters, sent as top-level fields;
//! - extra parameters, sent inside `extra_body`;
//! - per-model defaults, filled in only where the caller left a gap.
//!
//! Precedence, highest first: the caller's `extra_body` entry, the caller's
//! top-level field, the configured default.

use serde_json::Value;

use super::request::{
    is_reserved_field, is_standard_param, ChatRequest, UpstreamRequest, STANDARD_PARAMS,
};
use crate::core::config::TranslationConfig;

/// Inclusive bounds accepted for `temperature`.
pub const TEMPERATURE_RANGE: (f64, f64) = (0.0, 2.0);

/// Build the upstream request for `request` under `config`.
///
/// Total and pure: malformed or missing fields are simply absent from the
/// result, and the same input always yields the same output.
pub fn merge_request(request: &ChatRequest, config: &TranslationConfig) -> UpstreamRequest {
    let mut out = UpstreamRequest {
        model: request
            .model
            .as_deref()
            .map(|model| config.resolve_model(model).to_string()),
        messages: request.messages.clone(),
        ..Default::default()
    };

    for name in STANDARD_PARAMS.iter().copied() {
        if is_reserved_field(name) {
            continue;
        }
        if let Some(value) = request.param(name) {
            let value = if name == "temperature" {
                clamp_temperature(value)
            } else {
                value.clone()
            };
            out.params.insert(name.to_string(), value);
        }
    }

    for (name, value) in &request.params {
        if config.is_extra_param(name) {
            out.extra_body.insert(name.clone(), value.clone());
        }
    }

    if let Some(extra_body) = &request.extra_body {
        for (name, value) in extra_body {
            out.extra_body.insert(name.clone(), value.clone());
        }
    }

    if let Some(defaults) = request
        .model
        .as_deref()
        .and_then(|model| config.defaults_for(model))
    {
        for (name, value) in defaults {
            if is_reserved_field(name) || out.has_param(name) {
                continue;
            }
            if config.is_extra_param(name) {
                out.extra_body.insert(name.clone(), value.clone());
            } else {
                out.params.insert(name.clone(), value.clone());
            }
        }
    }

    let dropped: Vec<&str> = request
        .params
        .keys()
        .map(String::as_str)
        .filter(|name| !is_standard_param(name) && !config.is_extra_param(name))
        .collect();
    if !dropped.is_empty() {
        tracing::debug!(
            model = ?request.model,
            dropped = ?dropped,
            "Dropping parameters not recognized upstream"
        );
    }

    out
}

/// Clamp a numeric temperature into [`TEMPERATURE_RANGE`].
///
/// In-range numbers are returned untouched; non-numeric values pass through.
fn clamp_temperature(value: &Value) -> Value {
    let Some(t) = value.as_f64() else {
        return value.clone();
    };
    let (min, max) = TEMPERATURE_RANGE;
    if t < min {
        Value::from(min)
    } else if t > max {
        Value::from(max)
    } else {
        value.clone()
    }
}
