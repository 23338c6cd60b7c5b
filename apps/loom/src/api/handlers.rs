//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Reflection and ingest are CPU-bound and run on the blocking pool. The
//! session lock is never held across them.
//!
//! Body and query extractors are taken as `Result` so decode failures leave
//! through `ApiError` with the usual `{ error }` body.

use super::{
    AppState,
    types::{
        ApiError, EdgesResponse, HealthResponse, IngestRequest, IngestResponse, ModulesResponse,
        NodeListResponse, ReflectParams, ReflectResponse, RoutesResponse, StatusResponse,
        WriteResponse,
    },
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::IntoResponse,
};
use loom_core::{Edge, Ingestor, ModuleSpec, Node, Reflector, primitives::MAX_META_NODES};

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run a CPU-bound closure off the async runtime.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::internal(format!("Background task failed: {}", e)))
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Get graph status.
pub async fn status_handler(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let session = state.session.read().await;
    let type_counts = session.type_counts()?;

    Ok(Json(StatusResponse {
        backend: session.backend_name().to_string(),
        node_count: session.node_count()?,
        edge_count: session.edge_count()?,
        module_count: session.list_modules()?.len(),
        type_counts,
    }))
}

// =============================================================================
// NODE HANDLERS
// =============================================================================

/// Insert or replace a node.
pub async fn upsert_node_handler(
    State(state): State<AppState>,
    body: Result<Json<Node>, JsonRejection>,
) -> ApiResult<WriteResponse> {
    let Json(node) = body?;
    let id = node.id.clone();
    state.session.write().await.upsert(node)?;
    Ok(Json(WriteResponse::node(id)))
}

/// Insert or replace the node at `id`. The body must carry the same id.
pub async fn replace_node_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Node>, JsonRejection>,
) -> ApiResult<WriteResponse> {
    let Json(node) = body?;
    if node.id != id {
        return Err(ApiError::bad_request(format!(
            "Node id '{}' does not match path id '{}'",
            node.id, id
        )));
    }
    state.session.write().await.upsert(node)?;
    Ok(Json(WriteResponse::node(id)))
}

/// Get one node by id.
pub async fn get_node_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Node> {
    Ok(Json(state.session.read().await.get(&id)?))
}

/// List nodes of one type.
pub async fn nodes_by_type_handler(
    State(state): State<AppState>,
    Path(type_id): Path<String>,
) -> ApiResult<NodeListResponse> {
    let nodes = state.session.read().await.get_nodes_by_type(&type_id)?;
    Ok(Json(NodeListResponse { nodes }))
}

// =============================================================================
// EDGE HANDLERS
// =============================================================================

/// Insert or replace an edge. Both endpoints must exist.
pub async fn upsert_edge_handler(
    State(state): State<AppState>,
    body: Result<Json<Edge>, JsonRejection>,
) -> ApiResult<WriteResponse> {
    let Json(edge) = body?;
    state.session.write().await.upsert_edge(edge)?;
    Ok(Json(WriteResponse::edge()))
}

/// Outgoing and incoming edges of a node.
pub async fn node_edges_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<EdgesResponse> {
    let session = state.session.read().await;
    session.get(&id)?;
    Ok(Json(EdgesResponse {
        outgoing: session.get_edges_from(&id)?,
        incoming: session.get_edges_to(&id)?,
    }))
}

// =============================================================================
// SPEC HANDLERS
// =============================================================================

/// List module-typed nodes.
pub async fn modules_handler(State(state): State<AppState>) -> ApiResult<ModulesResponse> {
    let modules = state.session.read().await.list_modules()?;
    Ok(Json(ModulesResponse { modules }))
}

/// Every declared API across stored api nodes.
pub async fn routes_handler(State(state): State<AppState>) -> ApiResult<RoutesResponse> {
    let routes = state.session.read().await.list_routes()?;
    Ok(Json(RoutesResponse { routes }))
}

/// Store a module spec as a spec-holder node.
pub async fn register_spec_handler(
    State(state): State<AppState>,
    body: Result<Json<ModuleSpec>, JsonRejection>,
) -> ApiResult<Node> {
    let Json(spec) = body?;
    Ok(Json(state.session.write().await.register_spec(&spec)?))
}

/// Reflect a stored spec into schema nodes.
///
/// A spec whose content does not decode still answers 200, with whatever
/// nodes were produced. Only an unknown id is an error.
pub async fn reflect_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<ReflectParams>, QueryRejection>,
) -> ApiResult<ReflectResponse> {
    let Query(params) = params?;
    let holder = state.session.read().await.find_spec_holder(&id)?;
    let spec_id = holder.id.clone();

    let meta_nodes = run_blocking(move || Reflector::reflect(&holder)).await?;

    let outcome = state
        .session
        .write()
        .await
        .record_reflection(spec_id, meta_nodes, params.persist)?;
    Ok(Json(ReflectResponse {
        meta_nodes: outcome.meta_nodes,
        spec_id: outcome.spec_id,
    }))
}

/// Rebuild a spec from a caller-supplied node set.
pub async fn ingest_handler(
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> ApiResult<IngestResponse> {
    let Json(request) = body?;
    let node_count = request.meta_nodes.len();
    if node_count > MAX_META_NODES {
        return Err(ApiError::bad_request(format!(
            "Too many nodes: {} (maximum {})",
            node_count, MAX_META_NODES
        )));
    }

    let spec = run_blocking(move || Ingestor::ingest(&request.meta_nodes))
        .await?
        .inspect_err(|e| tracing::warn!(event = "ingest_failed", node_count, "{}", e))?;

    tracing::info!(event = "spec_ingested", module_id = %spec.id, node_count, "Ingested spec");
    Ok(Json(IngestResponse::success(spec, node_count)))
}
