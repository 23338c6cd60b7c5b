//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Field names are camelCase, matching the node wire format.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    response::Response,
};
use loom_core::{ApiRoute, Edge, LoomError, ModuleSpec, Node};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A handler failure: HTTP status plus the `{ error }` body.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<LoomError> for ApiError {
    fn from(e: LoomError) -> Self {
        let status = match &e {
            LoomError::NodeNotFound(_) | LoomError::SpecNotFound(_) => StatusCode::NOT_FOUND,
            LoomError::MissingModuleNode
            | LoomError::InvalidNode(_)
            | LoomError::InvalidContent(_)
            | LoomError::IngestFailed(_)
            | LoomError::DeserializationError(_) => StatusCode::BAD_REQUEST,
            LoomError::SerializationError(_) | LoomError::IoError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

/// Keeps axum's status (400, 415 or 422) but answers with `{ error }`.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Graph status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub backend: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub module_count: usize,
    /// typeId -> node count
    pub type_counts: BTreeMap<String, usize>,
}

// =============================================================================
// NODE / EDGE RESPONSES
// =============================================================================

/// Acknowledges a node or edge write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    pub success: bool,
    /// Id of the written node; absent for edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl WriteResponse {
    pub fn node(id: impl Into<String>) -> Self {
        Self {
            success: true,
            id: Some(id.into()),
        }
    }

    pub fn edge() -> Self {
        Self {
            success: true,
            id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeListResponse {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgesResponse {
    pub outgoing: Vec<Edge>,
    pub incoming: Vec<Edge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesResponse {
    pub modules: Vec<Node>,
}

/// Declared APIs read back from api nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesResponse {
    pub routes: Vec<ApiRoute>,
}

// =============================================================================
// REFLECT / INGEST
// =============================================================================

/// Query string of `GET /reflect/spec/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReflectParams {
    /// Store the generated nodes. Defaults to true.
    #[serde(default = "default_persist")]
    pub persist: bool,
}

fn default_persist() -> bool {
    true
}

impl Default for ReflectParams {
    fn default() -> Self {
        Self {
            persist: default_persist(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectResponse {
    pub meta_nodes: Vec<Node>,
    pub spec_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub meta_nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub spec: ModuleSpec,
    pub success: bool,
    pub message: String,
}

impl IngestResponse {
    pub fn success(spec: ModuleSpec, node_count: usize) -> Self {
        let message = format!("Ingested module '{}' from {} nodes", spec.id, node_count);
        Self {
            spec,
            success: true,
            message,
        }
    }
}
