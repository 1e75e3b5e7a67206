//! Dataset manifests and compute results
//!
//! Serde model of the artifacts the compute backend and the static
//! build pipeline both emit. Upstream artifacts are versioned
//! independently of this client, so every field is defaulted and
//! unknown fields are retained in a flattened `extra` map instead of
//! failing deserialization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-figure manifest metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FigureManifest {
    /// Citation keys this figure contributes, in canonical order.
    #[serde(default)]
    pub citation_keys: Vec<String>,
    /// Authoritative reference numbering, when the build exports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<ReferenceOrderEntry>>,
    /// Artifact path of the figure payload, relative to the build root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Fields this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One entry of a figure's explicit reference ordering.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReferenceOrderEntry {
    #[serde(default)]
    pub key: String,
    /// Index values are taken from the manifest as-is; no uniqueness or
    /// monotonicity is enforced on this side of the contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
}

/// Indirection to a dataset-specific manifest artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ManifestPointer {
    #[serde(default)]
    pub path: String,
}

/// Build/dataset manifest: provenance, layer groupings, and the figure
/// table of contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DatasetManifest {
    /// Canonical citation ordering for the whole dataset.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Layers (comparison cohorts) the dataset carries.
    #[serde(default)]
    pub layers: Vec<String>,
    /// Citation keys grouped per layer.
    #[serde(default)]
    pub layer_citation_keys: BTreeMap<String, Vec<String>>,
    /// Pre-rendered reference texts grouped per layer.
    #[serde(default)]
    pub layer_references: BTreeMap<String, Vec<String>>,
    /// Figure manifests keyed by figure name.
    #[serde(default)]
    pub figures: BTreeMap<String, FigureManifest>,
    /// Optional indirection to a richer dataset manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_manifest: Option<ManifestPointer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A reference list entry: either a bare text line or a keyed record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ReferenceEntry {
    Text(String),
    Record {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        n: Option<u64>,
    },
}

impl ReferenceEntry {
    /// The reference text, whichever shape the entry has.
    pub fn text(&self) -> &str {
        match self {
            ReferenceEntry::Text(text) => text,
            ReferenceEntry::Record { text, .. } => text,
        }
    }

    /// The citation key, when the entry carries one.
    pub fn key(&self) -> Option<&str> {
        match self {
            ReferenceEntry::Text(_) => None,
            ReferenceEntry::Record { key, .. } => key.as_deref(),
        }
    }
}

impl From<String> for ReferenceEntry {
    fn from(text: String) -> Self {
        ReferenceEntry::Text(text)
    }
}

/// One committed compute outcome. Immutable once received; a newer
/// result supersedes it wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComputeResult {
    #[serde(default)]
    pub manifest: DatasetManifest,
    /// Figure payloads keyed by figure name. Payload schemas belong to
    /// the rendering layer and are carried opaquely.
    #[serde(default)]
    pub figures: BTreeMap<String, Value>,
    #[serde(default)]
    pub references: Vec<ReferenceEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
}
