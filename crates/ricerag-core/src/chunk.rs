//! Chunk value objects: the immutable unit of indexed content.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of an indexed chunk, preserved across re-indexing runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChunkId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ChunkId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Provenance classification. The engine stores and returns it; filtering on
/// it is the caller's concern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    #[default]
    Trusted,
    Untrusted,
}

impl TrustLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "trusted" => Some(TrustLevel::Trusted),
            "untrusted" => Some(TrustLevel::Untrusted),
            _ => None,
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustLevel::Trusted => f.write_str("trusted"),
            TrustLevel::Untrusted => f.write_str("untrusted"),
        }
    }
}

/// Metadata stored beside every chunk at ingestion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source document filename.
    pub source: String,
    #[serde(default)]
    pub trust: TrustLevel,
    /// Content-type tag ("text", "pdf", "md", ...).
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Ingestion-assigned quality score in [0, 1].
    #[serde(default = "default_quality")]
    pub quality: f32,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

fn default_kind() -> String {
    "text".to_string()
}

fn default_quality() -> f32 {
    1.0
}

impl ChunkMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            trust: TrustLevel::default(),
            kind: default_kind(),
            quality: default_quality(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_trust(mut self, trust: TrustLevel) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality.clamp(0.0, 1.0);
        self
    }
}

/// Immutable unit of indexed content. Created once by the ingestion
/// collaborator; read-only to the retrieval engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(id: impl Into<ChunkId>, content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }
}

/// A chunk paired with its embedding vector, ready for indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_level_round_trips_through_display() {
        for level in [TrustLevel::Trusted, TrustLevel::Untrusted] {
            assert_eq!(TrustLevel::parse(&level.to_string()), Some(level));
        }
        assert_eq!(TrustLevel::parse("unknown"), None);
    }

    #[test]
    fn metadata_defaults_fill_missing_fields() {
        let metadata: ChunkMetadata = serde_json::from_str(r#"{"source":"manual.pdf"}"#).unwrap();
        assert_eq!(metadata.source, "manual.pdf");
        assert_eq!(metadata.trust, TrustLevel::Trusted);
        assert_eq!(metadata.kind, "text");
        assert!((metadata.quality - 1.0).abs() < f32::EPSILON);
        assert!(metadata.extra.is_empty());
    }

    #[test]
    fn quality_is_clamped_to_unit_interval() {
        let metadata = ChunkMetadata::new("a.txt").with_quality(1.7);
        assert!((metadata.quality - 1.0).abs() < f32::EPSILON);
        let metadata = ChunkMetadata::new("a.txt").with_quality(-0.2);
        assert_eq!(metadata.quality, 0.0);
    }

    #[test]
    fn chunk_id_is_ordered_by_string_value() {
        assert!(ChunkId::from("a") < ChunkId::from("b"));
    }
}
