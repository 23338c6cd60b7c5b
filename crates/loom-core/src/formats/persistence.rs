//! # Persistence Format
//!
//! Snapshot serialization for Loom graphs. File I/O lives in the app layer.
//!
//! Format: Header (5 bytes) + JSON-serialized `GraphSnapshot`.
//! - 4 bytes: Magic ("LOOM")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is parsed.

use crate::{Graph, GraphSnapshot, LoomError, primitives};

/// Maximum allowed payload size for a snapshot.
///
/// Checked before deserialization so corrupted or hostile input cannot force
/// a large allocation.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024; // 500 MB

/// Header length in bytes.
const HEADER_LEN: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all graph data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), LoomError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(LoomError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(LoomError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoomError> {
        let Some(header) = bytes.get(..HEADER_LEN) else {
            return Err(LoomError::DeserializationError(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a snapshot to bytes (header + payload).
pub fn snapshot_to_bytes(snapshot: &GraphSnapshot) -> Result<Vec<u8>, LoomError> {
    let payload =
        serde_json::to_vec(snapshot).map_err(|e| LoomError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a snapshot from bytes.
///
/// Validates, in order: minimum size, maximum size, header magic and
/// version. Only then is the payload parsed.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<GraphSnapshot, LoomError> {
    if bytes.len() < HEADER_LEN {
        return Err(LoomError::DeserializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_LEN
        )));
    }
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(LoomError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    PersistenceHeader::from_bytes(bytes)?.validate()?;

    serde_json::from_slice(&bytes[HEADER_LEN..]).map_err(|e| {
        LoomError::DeserializationError(format!("Failed to deserialize graph data: {}", e))
    })
}

/// Serialize an in-memory graph.
pub fn graph_to_bytes(graph: &Graph) -> Result<Vec<u8>, LoomError> {
    snapshot_to_bytes(&GraphSnapshot::from(graph))
}

/// Deserialize and rebuild an in-memory graph. Node and edge invariants are
/// re-checked on the way in.
pub fn graph_from_bytes(bytes: &[u8]) -> Result<Graph, LoomError> {
    Graph::try_from(snapshot_from_bytes(bytes)?)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContentRef, Edge, GraphStore, JSON_MEDIA_TYPE, Node};

    fn sample_graph() -> Graph {
        let mut graph = Graph::new();
        graph
            .upsert(
                Node::new("a", "app.note")
                    .with_content(ContentRef::inline_bytes("application/octet-stream", vec![0, 1, 255]))
                    .with_meta("tags", serde_json::json!(["x", "y"])),
            )
            .expect("upsert");
        graph
            .upsert(Node::new("b", "app.note").with_content(ContentRef::inline_text(JSON_MEDIA_TYPE, "{}")))
            .expect("upsert");
        graph.upsert_edge(Edge::new("a", "b", "links")).expect("edge");
        graph
    }

    #[test]
    fn header_roundtrip() {
        let header = PersistenceHeader::new();
        let restored = PersistenceHeader::from_bytes(&header.to_bytes()).expect("parse header");
        assert_eq!(restored, header);
        assert!(restored.validate().is_ok());
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let graph = sample_graph();
        let bytes1 = graph_to_bytes(&graph).expect("serialize");
        assert_eq!(&bytes1[0..4], primitives::MAGIC_BYTES);

        let restored = graph_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = graph_to_bytes(&restored).expect("serialize again");
        assert_eq!(bytes1, bytes2);
        assert_eq!(restored.edge_count().expect("count"), 1);
    }

    #[test]
    fn rejects_short_input() {
        assert!(snapshot_from_bytes(b"LOO").is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = graph_to_bytes(&sample_graph()).expect("serialize");
        bytes[0] = b'X';
        let err = snapshot_from_bytes(&bytes).expect_err("bad magic");
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn rejects_future_version() {
        let mut bytes = graph_to_bytes(&sample_graph()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        let err = snapshot_from_bytes(&bytes).expect_err("bad version");
        assert!(err.to_string().contains("Unsupported version"));
    }

    #[test]
    fn rejects_corrupted_payload() {
        let mut bytes = PersistenceHeader::new().to_bytes().to_vec();
        bytes.extend_from_slice(b"{not json");
        assert!(snapshot_from_bytes(&bytes).is_err());
    }

    #[test]
    fn rejects_dangling_edge_in_payload() {
        let snapshot = GraphSnapshot {
            nodes: vec![Node::new("a", "t")],
            edges: vec![Edge::new("a", "ghost", "r")],
        };
        let bytes = snapshot_to_bytes(&snapshot).expect("serialize");
        assert!(snapshot_from_bytes(&bytes).is_ok());
        assert!(graph_from_bytes(&bytes).is_err());
    }
}
