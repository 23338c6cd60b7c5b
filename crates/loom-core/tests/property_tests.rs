//! # Property-Based Tests
//!
//! Round-trip and identity invariants of the reflection engine, plus
//! determinism of the snapshot format.

use loom_core::{
    ApiSpec, FieldSpec, Graph, GraphStore, Ingestor, ModuleSpec, Node, ParameterSpec, Reflector,
    TypeSpec, graph_to_bytes,
};
use proptest::collection::{btree_map, vec};
use proptest::option;
use proptest::prelude::*;
use std::collections::BTreeSet;

// =============================================================================
// STRATEGIES
// =============================================================================

fn ident() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,11}"
}

fn text() -> impl Strategy<Value = Option<String>> {
    option::of("[ -~]{0,24}")
}

fn field() -> impl Strategy<Value = FieldSpec> {
    (ident(), ident(), any::<bool>(), text()).prop_map(|(name, field_type, required, description)| {
        FieldSpec {
            name,
            field_type,
            required,
            description,
        }
    })
}

fn parameter() -> impl Strategy<Value = ParameterSpec> {
    (ident(), ident(), any::<bool>(), text()).prop_map(|(name, param_type, required, description)| {
        ParameterSpec {
            name,
            param_type,
            required,
            description,
        }
    })
}

fn api() -> impl Strategy<Value = ApiSpec> {
    (
        ident(),
        prop::sample::select(vec!["GET", "POST", "PUT", "DELETE"]),
        "/[a-z]{1,8}(/\\{[a-z]{1,4}\\})?",
        text(),
        vec(parameter(), 0..4),
    )
        .prop_map(|(name, verb, route, description, parameters)| ApiSpec {
            name,
            verb: verb.to_string(),
            route,
            description,
            parameters,
        })
}

/// Specs with unique type names; same-named types merge on ingest and are
/// covered separately.
fn module_spec() -> impl Strategy<Value = ModuleSpec> {
    (
        ident(),
        ident(),
        "[0-9]\\.[0-9]{1,2}",
        text(),
        text(),
        btree_map(ident(), (text(), vec(field(), 0..5)), 0..4),
        vec(api(), 0..4),
    )
        .prop_map(|(id, name, version, description, title, types, apis)| ModuleSpec {
            id,
            name,
            version,
            description,
            title,
            dependencies: Vec::new(),
            types: types
                .into_iter()
                .map(|(name, (description, fields))| TypeSpec {
                    name,
                    description,
                    fields,
                })
                .collect(),
            apis,
        })
}

fn expected_node_count(spec: &ModuleSpec) -> usize {
    1 + spec.types.iter().map(|t| 1 + t.fields.len()).sum::<usize>() + spec.apis.len()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Ingest after reflect reproduces the spec exactly.
    #[test]
    fn reflect_then_ingest_roundtrips(spec in module_spec()) {
        let nodes = Reflector::reflect_spec(&spec, "holder").expect("reflect");
        let rebuilt = Ingestor::ingest(&nodes).expect("ingest");
        prop_assert_eq!(rebuilt, spec);
    }

    /// Node count is one module, one per type and field, one per api.
    #[test]
    fn reflection_emits_one_node_per_artifact(spec in module_spec()) {
        let nodes = Reflector::reflect_spec(&spec, "holder").expect("reflect");
        prop_assert_eq!(nodes.len(), expected_node_count(&spec));
    }

    /// Input order of the node set does not matter beyond declaration order
    /// of siblings.
    #[test]
    fn ingest_ignores_module_position(spec in module_spec()) {
        let mut nodes = Reflector::reflect_spec(&spec, "holder").expect("reflect");
        nodes.rotate_left(1);
        let rebuilt = Ingestor::ingest(&nodes).expect("ingest");
        prop_assert_eq!(rebuilt, spec);
    }

    /// Dependencies never survive the round trip.
    #[test]
    fn dependencies_always_empty(spec in module_spec(), deps in vec(ident(), 1..4)) {
        let mut spec = spec;
        spec.dependencies = deps;
        let nodes = Reflector::reflect_spec(&spec, "holder").expect("reflect");
        prop_assert!(Ingestor::ingest(&nodes).expect("ingest").dependencies.is_empty());
    }

    /// Reflecting twice yields id-disjoint sets of equal size.
    #[test]
    fn reflection_ids_are_fresh(spec in module_spec()) {
        let first = Reflector::reflect_spec(&spec, "holder").expect("reflect");
        let second = Reflector::reflect_spec(&spec, "holder").expect("reflect");

        let a: BTreeSet<_> = first.iter().map(|n| n.id.as_str()).collect();
        let b: BTreeSet<_> = second.iter().map(|n| n.id.as_str()).collect();
        prop_assert_eq!(a.len(), first.len());
        prop_assert_eq!(first.len(), second.len());
        prop_assert!(a.is_disjoint(&b));
    }

    /// Snapshot bytes do not depend on insertion order.
    #[test]
    fn snapshot_bytes_are_order_independent(ids in vec(ident(), 1..30)) {
        let mut forward = Graph::new();
        let mut backward = Graph::new();

        for id in &ids {
            forward.upsert(Node::new(id.as_str(), "app.note")).expect("upsert");
        }
        for id in ids.iter().rev() {
            backward.upsert(Node::new(id.as_str(), "app.note")).expect("upsert");
        }

        prop_assert_eq!(
            graph_to_bytes(&forward).expect("bytes"),
            graph_to_bytes(&backward).expect("bytes")
        );
    }
}
