//! API response models that are not part of the translation itself.

use serde::{Deserialize, Serialize};

/// Fixed creation timestamp reported for every listed model.
pub const MODEL_CREATED: i64 = 1677610602;

/// Owner reported for every listed model.
pub const MODEL_OWNER: &str = "poe";

/// Model information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "model".to_string(),
            created: MODEL_CREATED,
            owned_by: MODEL_OWNER.to_string(),
        }
    }
}

/// List of available models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

/// Capability document served on every route the gateway does not handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
    pub image_generation: ImageCapability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub method: String,
    pub path: String,
    pub description: String,
    pub auth: bool,
}

impl EndpointInfo {
    pub fn new(method: &str, path: &str, description: &str, auth: bool) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            description: description.to_string(),
            auth,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageCapability {
    pub enabled: bool,
    pub model: String,
    pub sizes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
