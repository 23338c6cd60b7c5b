//! # Reflector
//!
//! Flattens a module spec into a family of independent graph nodes.
//!
//! - One module node, then for each declared type one type node followed by
//!   one property node per field, then one api node per declared API
//! - Parent/child links are duplicated identifying strings in `meta`; no
//!   edges are created
//! - Parameters stay inside the api node's content
//! - Every node gets a fresh id and is tagged `Ice`
//!
//! Reflection never fails. A source whose content does not decode as a spec
//! is logged and produces whatever was emitted before the failure.

use crate::primitives::{
    API_TYPE_ID, META_API_NAME, META_MODULE_ID, META_PARENT_MODULE, META_PARENT_TYPE,
    META_PROPERTY_NAME, META_SPEC_ID, META_TYPE_NAME, MODULE_TYPE_ID, PROPERTY_TYPE_ID,
    TYPE_TYPE_ID,
};
use crate::spec::{ApiSpec, FieldSpec, ModuleSpec, TypeHeader, TypeSpec};
use crate::{ContentRef, ContentState, LoomError, Node};
use uuid::Uuid;

/// The Reflector turns spec-holder nodes into schema artifact nodes.
///
/// Stateless: both entry points are pure functions of their input apart
/// from id generation.
pub struct Reflector;

impl Reflector {
    /// Reflect the spec stored in `source`'s content.
    ///
    /// `source.id` becomes the `specId` of every emitted node. Returns an
    /// empty list if the content is missing or is not a module spec.
    pub fn reflect(source: &Node) -> Vec<Node> {
        let mut nodes = Vec::new();
        let result = source
            .decode_content::<ModuleSpec>()
            .and_then(|spec| Self::emit(&spec.with_defaults(&source.id), &source.id, &mut nodes));

        if let Err(e) = result {
            tracing::warn!(
                event = "reflect_failed",
                spec_id = %source.id,
                emitted = nodes.len(),
                "Spec reflection stopped early: {}",
                e
            );
        }
        nodes
    }

    /// Reflect an already decoded spec, stamping `spec_id` as the source id.
    ///
    /// Identity defaults are applied with `spec_id` as the fallback id.
    pub fn reflect_spec(spec: &ModuleSpec, spec_id: &str) -> Result<Vec<Node>, LoomError> {
        let mut nodes = Vec::new();
        Self::emit(&spec.clone().with_defaults(spec_id), spec_id, &mut nodes)?;
        Ok(nodes)
    }

    /// Append all nodes for `spec` to `out`, in declaration order.
    fn emit(spec: &ModuleSpec, spec_id: &str, out: &mut Vec<Node>) -> Result<(), LoomError> {
        out.push(Self::module_node(spec, spec_id)?);

        for type_spec in &spec.types {
            out.push(Self::type_node(spec, spec_id, type_spec)?);
            for field in &type_spec.fields {
                out.push(Self::property_node(spec, spec_id, type_spec, field)?);
            }
        }

        for api in &spec.apis {
            out.push(Self::api_node(spec, spec_id, api)?);
        }

        tracing::debug!(spec_id, module_id = %spec.id, nodes = out.len(), "Reflected spec");
        Ok(())
    }

    fn module_node(spec: &ModuleSpec, spec_id: &str) -> Result<Node, LoomError> {
        let title = spec.title.clone().unwrap_or_else(|| spec.name.clone());
        Ok(artifact(MODULE_TYPE_ID, "module")
            .with_title(title)
            .with_description(spec.description.clone().unwrap_or_default())
            .with_content(ContentRef::json(&spec.header())?)
            .with_meta(META_SPEC_ID, spec_id)
            .with_meta(META_MODULE_ID, spec.id.as_str()))
    }

    fn type_node(spec: &ModuleSpec, spec_id: &str, type_spec: &TypeSpec) -> Result<Node, LoomError> {
        Ok(artifact(TYPE_TYPE_ID, "type")
            .with_title(type_spec.name.as_str())
            .with_description(type_spec.description.clone().unwrap_or_default())
            .with_content(ContentRef::json(&TypeHeader::from(type_spec))?)
            .with_meta(META_SPEC_ID, spec_id)
            .with_meta(META_MODULE_ID, spec.id.as_str())
            .with_meta(META_TYPE_NAME, type_spec.name.as_str())
            .with_meta(META_PARENT_MODULE, spec.id.as_str()))
    }

    fn property_node(
        spec: &ModuleSpec,
        spec_id: &str,
        type_spec: &TypeSpec,
        field: &FieldSpec,
    ) -> Result<Node, LoomError> {
        Ok(artifact(PROPERTY_TYPE_ID, "property")
            .with_title(field.name.as_str())
            .with_description(field.description.clone().unwrap_or_default())
            .with_content(ContentRef::json(field)?)
            .with_meta(META_SPEC_ID, spec_id)
            .with_meta(META_MODULE_ID, spec.id.as_str())
            .with_meta(META_TYPE_NAME, type_spec.name.as_str())
            .with_meta(META_PROPERTY_NAME, field.name.as_str())
            .with_meta(META_PARENT_TYPE, type_spec.name.as_str()))
    }

    fn api_node(spec: &ModuleSpec, spec_id: &str, api: &ApiSpec) -> Result<Node, LoomError> {
        Ok(artifact(API_TYPE_ID, "api")
            .with_title(api.name.as_str())
            .with_description(api.description.clone().unwrap_or_default())
            .with_content(ContentRef::json(api)?)
            .with_meta(META_SPEC_ID, spec_id)
            .with_meta(META_MODULE_ID, spec.id.as_str())
            .with_meta(META_API_NAME, api.name.as_str())
            .with_meta(META_PARENT_MODULE, spec.id.as_str()))
    }
}

/// A fresh `Ice` node of the given kind.
fn artifact(type_id: &str, prefix: &str) -> Node {
    Node::new(format!("{}-{}", prefix, Uuid::new_v4()), type_id).with_state(ContentState::Ice)
}

// =============================================================================
// TESTS
// =============================================================================
