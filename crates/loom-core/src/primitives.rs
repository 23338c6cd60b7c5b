//! # Primitives
//!
//! Hardcoded constants shared by the graph stores, the reflection engine
//! and the app layer.
//!
//! ## Reflection vocabulary
//!
//! Schema artifacts are linked by value equality on meta keys, never by
//! edges. The keys below are the complete set the engine writes and reads.

// =============================================================================
// REFLECTION NODE KINDS
// =============================================================================

/// Type id of a module node (and of spec-holder nodes).
pub const MODULE_TYPE_ID: &str = "loom.meta/module";

/// Type id of a declared data type node.
pub const TYPE_TYPE_ID: &str = "loom.meta/type";

/// Type id of a single field of a declared data type.
pub const PROPERTY_TYPE_ID: &str = "loom.meta/property";

/// Type id of a declared API. Parameters stay inside its content.
pub const API_TYPE_ID: &str = "loom.meta/api";

// =============================================================================
// META KEYS
// =============================================================================

/// Id of the node the spec was reflected from.
pub const META_SPEC_ID: &str = "specId";
/// The reflected module's own id.
pub const META_MODULE_ID: &str = "moduleId";
pub const META_TYPE_NAME: &str = "typeName";
pub const META_PARENT_TYPE: &str = "parentType";
pub const META_PROPERTY_NAME: &str = "propertyName";
pub const META_PARENT_MODULE: &str = "parentModule";
pub const META_API_NAME: &str = "apiName";

// =============================================================================
// DEFAULTS
// =============================================================================

/// Module name used when a spec omits it.
pub const DEFAULT_MODULE_NAME: &str = "Unknown";

/// Module version used when a spec omits it.
pub const DEFAULT_MODULE_VERSION: &str = "0.1.0";

// =============================================================================
// PERSISTENCE FORMAT
// =============================================================================

/// Magic bytes for the Loom snapshot file header.
pub const MAGIC_BYTES: &[u8; 4] = b"LOOM";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum number of nodes accepted by a single ingest request.
pub const MAX_META_NODES: usize = 10_000;

/// Maximum length of a node id.
pub const MAX_ID_LENGTH: usize = 512;
