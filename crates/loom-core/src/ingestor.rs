//! # Ingestor Module
//!
//! Rebuilds a module spec from a flat set of schema artifact nodes.
//!
//! - Locate the module node; there is no fallback if it is missing
//! - Match property nodes to type nodes by `meta.typeName`
//! - Read api parameters straight from api node content
//! - `dependencies` are never reconstructed
//!
//! Unlike reflection, ingest is strict: any failure aborts the whole pass and
//! is returned as a single `LoomError::IngestFailed`.

use crate::primitives::{API_TYPE_ID, META_TYPE_NAME, MODULE_TYPE_ID, PROPERTY_TYPE_ID, TYPE_TYPE_ID};
use crate::spec::{ApiSpec, FieldSpec, ModuleHeader, ModuleSpec, TypeHeader, TypeSpec};
use crate::{LoomError, Node};
use std::collections::BTreeMap;

/// One-pass index over an ingest input, keyed by reflection kind.
///
/// Built once per call so matching properties to types stays linear in the
/// size of the node set.
#[derive(Debug, Default)]
struct NodeIndex<'a> {
    module: Option<&'a Node>,
    types: Vec<&'a Node>,
    /// typeName -> property nodes, in input order
    properties: BTreeMap<&'a str, Vec<&'a Node>>,
    apis: Vec<&'a Node>,
}

impl<'a> NodeIndex<'a> {
    fn build(nodes: &'a [Node]) -> Self {
        let mut index = Self::default();
        for node in nodes {
            match node.type_id.as_str() {
                MODULE_TYPE_ID => {
                    // First module node wins.
                    index.module.get_or_insert(node);
                }
                TYPE_TYPE_ID => index.types.push(node),
                PROPERTY_TYPE_ID => {
                    if let Some(type_name) = node.meta_str(META_TYPE_NAME) {
                        index.properties.entry(type_name).or_default().push(node);
                    }
                }
                API_TYPE_ID => index.apis.push(node),
                _ => {}
            }
        }
        index
    }

    fn properties_of(&self, type_name: &str) -> &[&'a Node] {
        self.properties.get(type_name).map_or(&[], Vec::as_slice)
    }
}

/// The Ingestor reconstructs `ModuleSpec`s from node sets.
pub struct Ingestor;

impl Ingestor {
    /// Rebuild the spec described by `nodes`.
    ///
    /// Nodes of unrelated types are ignored. Two type nodes sharing a name
    /// each receive the fields of both, since properties are matched by
    /// name alone.
    pub fn ingest(nodes: &[Node]) -> Result<ModuleSpec, LoomError> {
        Self::assemble(nodes).map_err(|e| LoomError::IngestFailed(Box::new(e)))
    }

    fn assemble(nodes: &[Node]) -> Result<ModuleSpec, LoomError> {
        let index = NodeIndex::build(nodes);
        let module = index.module.ok_or(LoomError::MissingModuleNode)?;

        let header = module
            .decode_content::<ModuleHeader>()?
            .with_defaults(&module.id);

        let types = index
            .types
            .iter()
            .map(|node| Self::assemble_type(&index, node))
            .collect::<Result<Vec<_>, _>>()?;

        let apis = index
            .apis
            .iter()
            .map(|node| node.decode_content::<ApiSpec>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ModuleSpec {
            id: header.id,
            name: header.name,
            version: header.version,
            description: header.description,
            title: header.title,
            dependencies: Vec::new(),
            types,
            apis,
        })
    }

    fn assemble_type(index: &NodeIndex<'_>, node: &Node) -> Result<TypeSpec, LoomError> {
        let header: TypeHeader = node.decode_content()?;
        let fields = index
            .properties_of(&header.name)
            .iter()
            .map(|prop| prop.decode_content::<FieldSpec>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TypeSpec {
            name: header.name,
            description: header.description,
            fields,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::primitives::META_PROPERTY_NAME;
    use crate::spec::ParameterSpec;
    use crate::{ContentRef, JSON_MEDIA_TYPE, Reflector};

    fn greeter() -> ModuleSpec {
        ModuleSpec {
            id: "m1".to_string(),
            name: "Greeter".to_string(),
            version: "1.0".to_string(),
            description: Some("Says hello".to_string()),
            title: Some("Greeter Module".to_string()),
            dependencies: Vec::new(),
            types: vec![TypeSpec {
                name: "Person".to_string(),
                description: Some("Someone to greet".to_string()),
                fields: vec![FieldSpec::new("age", "int", true)],
            }],
            apis: vec![ApiSpec {
                name: "greet".to_string(),
                verb: "GET".to_string(),
                route: "/greet/{id}".to_string(),
                description: None,
                parameters: vec![ParameterSpec::new("id", "string", true)],
            }],
        }
    }

    fn property(type_name: &str, field: &FieldSpec) -> Node {
        Node::new(format!("p-{}-{}", type_name, field.name), PROPERTY_TYPE_ID)
            .with_content(ContentRef::json(field).expect("encode"))
            .with_meta(META_TYPE_NAME, type_name)
            .with_meta(META_PROPERTY_NAME, field.name.as_str())
    }

    #[test]
    fn greeter_roundtrip() {
        let spec = greeter();
        let nodes = Reflector::reflect_spec(&spec, "spec-1").expect("reflect");
        assert_eq!(nodes.len(), 4);

        let rebuilt = Ingestor::ingest(&nodes).expect("ingest");
        assert_eq!(rebuilt, spec);
    }

    #[test]
    fn empty_input_fails() {
        let result = Ingestor::ingest(&[]);
        assert!(matches!(result, Err(LoomError::IngestFailed(_))));
    }

    #[test]
    fn missing_module_node_is_wrapped() {
        let nodes = vec![Node::new("t1", TYPE_TYPE_ID)];
        let Err(LoomError::IngestFailed(cause)) = Ingestor::ingest(&nodes) else {
            panic!("expected wrapped failure");
        };
        assert!(matches!(*cause, LoomError::MissingModuleNode));
    }

    #[test]
    fn undecodable_type_aborts_whole_ingest() {
        let mut nodes = Reflector::reflect_spec(&greeter(), "spec-1").expect("reflect");
        nodes[1].content = Some(ContentRef::inline_text(JSON_MEDIA_TYPE, "{broken"));

        let Err(LoomError::IngestFailed(cause)) = Ingestor::ingest(&nodes) else {
            panic!("expected wrapped failure");
        };
        assert!(matches!(*cause, LoomError::DeserializationError(_)));
    }

    #[test]
    fn module_without_content_fails() {
        let nodes = vec![Node::new("m", MODULE_TYPE_ID)];
        assert!(Ingestor::ingest(&nodes).is_err());
    }

    #[test]
    fn module_defaults_applied() {
        let nodes = vec![
            Node::new("mod-node", MODULE_TYPE_ID)
                .with_content(ContentRef::inline_text(JSON_MEDIA_TYPE, "{}")),
        ];
        let spec = Ingestor::ingest(&nodes).expect("ingest");
        assert_eq!(spec.id, "mod-node");
        assert_eq!(spec.name, "Unknown");
        assert_eq!(spec.version, "0.1.0");
    }

    #[test]
    fn dependencies_are_dropped() {
        let mut spec = greeter();
        spec.dependencies = vec!["auth".to_string(), "ledger".to_string()];
        let nodes = Reflector::reflect_spec(&spec, "spec-1").expect("reflect");

        let rebuilt = Ingestor::ingest(&nodes).expect("ingest");
        assert!(rebuilt.dependencies.is_empty());
    }

    #[test]
    fn unrelated_and_orphan_nodes_are_ignored() {
        let mut nodes = Reflector::reflect_spec(&greeter(), "spec-1").expect("reflect");
        nodes.push(Node::new("note-1", "app.note"));
        nodes.push(property("Ghost", &FieldSpec::new("boo", "string", false)));
        nodes.push(
            Node::new("p-untagged", PROPERTY_TYPE_ID)
                .with_content(ContentRef::json(&FieldSpec::new("x", "int", false)).expect("encode")),
        );

        let rebuilt = Ingestor::ingest(&nodes).expect("ingest");
        assert_eq!(rebuilt, greeter());
    }

    /// Two type nodes with the same name cannot be told apart; each ends up
    /// with the union of both field sets. Existing behavior, kept as is.
    #[test]
    fn same_named_types_merge_fields() {
        let type_node = |id: &str| {
            Node::new(id, TYPE_TYPE_ID)
                .with_content(
                    ContentRef::json(&TypeHeader {
                        name: "Person".to_string(),
                        description: None,
                    })
                    .expect("encode"),
                )
                .with_meta(META_TYPE_NAME, "Person")
        };
        let module = Node::new("m", MODULE_TYPE_ID).with_content(
            ContentRef::json(&ModuleHeader {
                id: "m".to_string(),
                ..ModuleHeader::default()
            })
            .expect("encode"),
        );
        let nodes = vec![
            module,
            type_node("t1"),
            property("Person", &FieldSpec::new("age", "int", true)),
            type_node("t2"),
            property("Person", &FieldSpec::new("email", "string", false)),
        ];

        let spec = Ingestor::ingest(&nodes).expect("ingest");
        assert_eq!(spec.types.len(), 2);
        for ty in &spec.types {
            let names: Vec<_> = ty.fields.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(names, vec!["age", "email"]);
        }
    }

    #[test]
    fn first_module_node_wins() {
        let header = |id: &str| {
            ContentRef::json(&ModuleHeader {
                id: id.to_string(),
                ..ModuleHeader::default()
            })
            .expect("encode")
        };
        let nodes = vec![
            Node::new("a", MODULE_TYPE_ID).with_content(header("first")),
            Node::new("b", MODULE_TYPE_ID).with_content(header("second")),
        ];
        assert_eq!(Ingestor::ingest(&nodes).expect("ingest").id, "first");
    }
}
