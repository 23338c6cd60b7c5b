//! # Core Type Definitions
//!
//! The universal vocabulary every Loom subsystem stores data in:
//! - Graph units (`Node`, `Edge`, `EdgeWeight`)
//! - Node payloads (`ContentRef`, `ContentBody`)
//! - Lifecycle tag (`ContentState`)
//! - Error types (`LoomError`)
//!
//! There is no behavior here beyond identity and shape checks. Hierarchy
//! between nodes is expressed either through edges or, for schema artifacts,
//! through shared values in `Node::meta`.

use crate::primitives::MAX_ID_LENGTH;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Media type used for every inline JSON payload produced by the engine.
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Open annotation map attached to nodes and edges.
///
/// BTreeMap keeps key order stable across serialization.
pub type Meta = BTreeMap<String, serde_json::Value>;

// =============================================================================
// EDGE WEIGHT
// =============================================================================

/// Weight of a directed edge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct EdgeWeight(pub i64);

impl EdgeWeight {
    /// Create a new edge weight with the given value.
    #[must_use]
    pub const fn new(weight: i64) -> Self {
        Self(weight)
    }

    /// Get the raw weight value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

// =============================================================================
// CONTENT STATE
// =============================================================================

/// Lifecycle tag carried by every node.
///
/// Advisory only: no store or engine operation checks or enforces a
/// transition between states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum ContentState {
    /// Immutable schema artifact. Everything reflection emits is Ice.
    Ice,
    /// Live, mutable application data.
    #[default]
    Water,
    /// Transient or derived data that may be regenerated at any time.
    Gas,
}

impl std::fmt::Display for ContentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ice => write!(f, "Ice"),
            Self::Water => write!(f, "Water"),
            Self::Gas => write!(f, "Gas"),
        }
    }
}

// =============================================================================
// CONTENT REFERENCE
// =============================================================================

/// The single payload carried by a `ContentRef`.
///
/// On the wire the variant name is the key next to `mediaType`, e.g.
/// `{"mediaType": "application/json", "inlineJson": "{...}"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentBody {
    /// Inline structured text (JSON for everything the engine writes).
    InlineJson(String),
    /// Inline binary payload, base64 encoded on the wire.
    InlineBytes(#[serde(with = "base64_bytes")] Vec<u8>),
    /// Reference to content stored outside the graph.
    ExternalUri(String),
}

/// Payload descriptor attached to a node.
///
/// Two refs are equal iff their media types are equal and the one populated
/// payload is equal, which is exactly the derived equality.
///
/// Decoding requires exactly one payload key next to `mediaType`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ContentRefWire")]
pub struct ContentRef {
    pub media_type: String,
    #[serde(flatten)]
    pub body: ContentBody,
}

/// Wire form of `ContentRef` with every payload key optional.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentRefWire {
    media_type: String,
    #[serde(default)]
    inline_json: Option<String>,
    #[serde(default)]
    inline_bytes: Option<String>,
    #[serde(default)]
    external_uri: Option<String>,
}

impl TryFrom<ContentRefWire> for ContentRef {
    type Error = LoomError;

    fn try_from(wire: ContentRefWire) -> Result<Self, Self::Error> {
        let body = match (wire.inline_json, wire.inline_bytes, wire.external_uri) {
            (Some(text), None, None) => ContentBody::InlineJson(text),
            (None, Some(encoded), None) => ContentBody::InlineBytes(base64_bytes::decode(&encoded)?),
            (None, None, Some(uri)) => ContentBody::ExternalUri(uri),
            (None, None, None) => {
                return Err(LoomError::InvalidContent("content has no payload".to_string()));
            }
            _ => {
                return Err(LoomError::InvalidContent(
                    "content carries more than one payload".to_string(),
                ));
            }
        };
        Ok(Self {
            media_type: wire.media_type,
            body,
        })
    }
}

impl ContentRef {
    /// Inline structured text with an explicit media type.
    #[must_use]
    pub fn inline_text(media_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            body: ContentBody::InlineJson(text.into()),
        }
    }

    /// Inline binary payload.
    #[must_use]
    pub fn inline_bytes(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            body: ContentBody::InlineBytes(bytes),
        }
    }

    /// Reference to an external location.
    #[must_use]
    pub fn external(media_type: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            body: ContentBody::ExternalUri(uri.into()),
        }
    }

    /// Serialize `value` as an inline `application/json` payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, LoomError> {
        let text = serde_json::to_string(value)?;
        Ok(Self::inline_text(JSON_MEDIA_TYPE, text))
    }

    /// Decode the payload as structured text into `T`.
    ///
    /// Inline bytes are decoded as UTF-8 JSON as well. External references
    /// cannot be resolved here and are rejected.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, LoomError> {
        match &self.body {
            ContentBody::InlineJson(text) => Ok(serde_json::from_str(text)?),
            ContentBody::InlineBytes(bytes) => Ok(serde_json::from_slice(bytes)?),
            ContentBody::ExternalUri(uri) => Err(LoomError::InvalidContent(format!(
                "external content '{}' cannot be decoded inline",
                uri
            ))),
        }
    }

    /// Check shape validity: a media type is present and an external
    /// reference actually points somewhere.
    pub fn validate(&self) -> Result<(), LoomError> {
        if self.media_type.trim().is_empty() {
            return Err(LoomError::InvalidContent("empty media type".to_string()));
        }
        if let ContentBody::ExternalUri(uri) = &self.body
            && uri.trim().is_empty()
        {
            return Err(LoomError::InvalidContent(
                "external reference without uri".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serde adapter: `Vec<u8>` <-> standard base64 string.
mod base64_bytes {
    use super::LoomError;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        decode(&encoded).map_err(serde::de::Error::custom)
    }

    pub fn decode(encoded: &str) -> Result<Vec<u8>, LoomError> {
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| LoomError::InvalidContent(format!("invalid base64 payload: {}", e)))
    }
}

// =============================================================================
// NODE
// =============================================================================

/// A Node is the universal unit of stored information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Store-unique identifier.
    pub id: String,
    /// Discriminator for what this node holds.
    pub type_id: String,
    /// Lifecycle tag.
    #[serde(default)]
    pub state: ContentState,
    /// Optional language tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Optional payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentRef>,
    /// Open annotations.
    #[serde(default)]
    pub meta: Meta,
}

impl Node {
    /// Create a new live node with no content and empty meta.
    #[must_use]
    pub fn new(id: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            state: ContentState::default(),
            locale: None,
            title: String::new(),
            description: String::new(),
            content: None,
            meta: Meta::new(),
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: ContentState) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: ContentRef) -> Self {
        self.content = Some(content);
        self
    }

    /// Attach a single meta entry.
    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    /// Read a meta entry as a string slice.
    ///
    /// Non-string values are treated as absent.
    #[must_use]
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(serde_json::Value::as_str)
    }

    /// Decode this node's content as JSON.
    pub fn decode_content<T: DeserializeOwned>(&self) -> Result<T, LoomError> {
        self.content
            .as_ref()
            .ok_or_else(|| LoomError::InvalidContent(format!("node '{}' has no content", self.id)))?
            .decode_json()
    }

    /// Check the identity and shape invariants of a node.
    pub fn validate(&self) -> Result<(), LoomError> {
        if self.id.trim().is_empty() {
            return Err(LoomError::InvalidNode("empty id".to_string()));
        }
        if self.id.len() > MAX_ID_LENGTH {
            return Err(LoomError::InvalidNode(format!(
                "id length {} exceeds maximum {}",
                self.id.len(),
                MAX_ID_LENGTH
            )));
        }
        if self.type_id.trim().is_empty() {
            return Err(LoomError::InvalidNode(format!(
                "node '{}' has empty typeId",
                self.id
            )));
        }
        if let Some(content) = &self.content {
            content.validate()?;
        }
        Ok(())
    }
}

// =============================================================================
// EDGE
// =============================================================================

/// A labeled, weighted directed relation between two node ids.
///
/// An edge is identified by `(from_id, role, to_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub from_id: String,
    pub to_id: String,
    pub role: String,
    #[serde(default)]
    pub weight: EdgeWeight,
    #[serde(default)]
    pub meta: Meta,
}

impl Edge {
    /// Create an edge with weight 1 and empty meta.
    #[must_use]
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            role: role.into(),
            weight: EdgeWeight::new(1),
            meta: Meta::new(),
        }
    }

    #[must_use]
    pub fn with_weight(mut self, weight: EdgeWeight) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn validate(&self) -> Result<(), LoomError> {
        if self.from_id.is_empty() || self.to_id.is_empty() {
            return Err(LoomError::InvalidNode(
                "edge endpoints must be non-empty".to_string(),
            ));
        }
        if self.role.trim().is_empty() {
            return Err(LoomError::InvalidNode(format!(
                "edge {} -> {} has empty role",
                self.from_id, self.to_id
            )));
        }
        Ok(())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Loom core.
///
/// Reflection never surfaces these to its caller; every other fallible
/// operation returns `Result<T, LoomError>`.
#[derive(Debug, Error)]
pub enum LoomError {
    /// The requested node was not found in the store.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// No spec-holder node matched the requested id.
    #[error("Spec not found: {0}")]
    SpecNotFound(String),

    /// A node set handed to ingest has no module node.
    #[error("No module node found in node set")]
    MissingModuleNode,

    /// A node or edge violates its shape invariants.
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// A content payload is missing, malformed, or cannot be decoded inline.
    #[error("Invalid content: {0}")]
    InvalidContent(String),

    /// Spec reconstruction failed. Wraps the first underlying failure.
    #[error("Failed to ingest spec: {0}")]
    IngestFailed(#[source] Box<LoomError>),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O or storage engine error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl LoomError {
    /// True for lookups that missed, as opposed to bad input or I/O.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NodeNotFound(_) | Self::SpecNotFound(_))
    }
}

impl From<serde_json::Error> for LoomError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            LoomError::DeserializationError(e.to_string())
        } else {
            LoomError::SerializationError(e.to_string())
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
