//! Static result assembly
//!
//! When the live compute endpoint is unavailable, the pipeline
//! reconstructs a baseline [`ComputeResult`] entirely from static
//! build artifacts: the dataset manifest, the figure payloads it
//! names, and the exported reference list. Schema mismatches degrade
//! field by field; only a manifest that cannot be fetched at all is
//! fatal.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use footprint_core::{ComputeResult, DatasetManifest, ReferenceEntry};

use crate::types::{Result, TallyError};

use super::resolver::{ArtifactStore, MARKER_DIR};

/// Entry-point manifest artifact.
const MANIFEST_ARTIFACT: &str = "manifest.json";

/// Reference exports, tried in order.
const REFERENCE_ARTIFACTS: [&str; 2] = ["references.html", "references.txt"];

/// Assembles compute results from static artifacts.
pub struct StaticAssembler {
    artifacts: Arc<ArtifactStore>,
}

impl StaticAssembler {
    pub fn new(artifacts: Arc<ArtifactStore>) -> Self {
        Self { artifacts }
    }

    /// Reconstruct the baseline compute result from static artifacts.
    pub async fn assemble(&self) -> Result<ComputeResult> {
        let manifest = self.load_manifest().await?;
        let figures = self.load_figures(&manifest).await;
        let references = self.load_references().await;

        info!(
            figures = figures.len(),
            references = references.len(),
            dataset = manifest.dataset_id.as_deref().unwrap_or("unknown"),
            "Assembled compute result from static artifacts"
        );

        Ok(ComputeResult {
            dataset_id: manifest.dataset_id.clone(),
            references: references.into_iter().map(ReferenceEntry::Text).collect(),
            figures,
            manifest,
        })
    }

    /// Load the dataset manifest, following the optional
    /// `dataset_manifest.path` indirection.
    async fn load_manifest(&self) -> Result<DatasetManifest> {
        let value = self.artifacts.get_json(MANIFEST_ARTIFACT).await?;
        let mut manifest = parse_manifest(MANIFEST_ARTIFACT, &value)?;

        if let Some(pointer) = manifest.dataset_manifest.clone() {
            if !pointer.path.is_empty() {
                match self.artifacts.get_json(&pointer.path).await {
                    Ok(inner_value) => match parse_manifest(&pointer.path, &inner_value) {
                        Ok(inner) => {
                            debug!(path = %pointer.path, "Using dataset-specific manifest");
                            manifest = inner;
                        }
                        Err(e) => {
                            warn!(path = %pointer.path, error = %e, "Dataset manifest unusable, keeping top-level manifest");
                        }
                    },
                    Err(e) => {
                        warn!(path = %pointer.path, error = %e, "Dataset manifest unavailable, keeping top-level manifest");
                    }
                }
            }
        }

        note_duplicate_order_indices(&manifest);
        Ok(manifest)
    }

    /// Fetch every figure payload the manifest names. Missing or
    /// corrupt figures are skipped, not fatal.
    async fn load_figures(&self, manifest: &DatasetManifest) -> BTreeMap<String, Value> {
        let mut figures = BTreeMap::new();
        for (name, figure) in &manifest.figures {
            let path = figure
                .path
                .clone()
                .unwrap_or_else(|| format!("{}/{}.json", MARKER_DIR, name));
            match self.artifacts.get_json(&path).await {
                Ok(value) => {
                    figures.insert(name.clone(), value.as_ref().clone());
                }
                Err(e) => {
                    warn!(figure = %name, path = %path, error = %e, "Figure artifact unavailable, skipped");
                }
            }
        }
        figures
    }

    /// Load the exported reference list, trying each known export in
    /// order. Absence degrades to an empty list.
    async fn load_references(&self) -> Vec<String> {
        for path in REFERENCE_ARTIFACTS {
            match self.artifacts.get_reference_list(path).await {
                Ok(list) if !list.is_empty() => return list.as_ref().clone(),
                Ok(_) => {}
                Err(e) => {
                    debug!(path = path, error = %e, "Reference export unavailable");
                }
            }
        }
        warn!("No reference export found in static artifacts");
        Vec::new()
    }
}

fn parse_manifest(path: &str, value: &Value) -> Result<DatasetManifest> {
    serde_json::from_value(value.clone()).map_err(|e| TallyError::Parse {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// The figure `order` contract trusts the manifest's index values
/// as-is; duplicates are reproduced, but worth a trace.
fn note_duplicate_order_indices(manifest: &DatasetManifest) {
    for (name, figure) in &manifest.figures {
        let Some(order) = figure.order.as_ref() else {
            continue;
        };
        let mut seen = std::collections::HashSet::new();
        let duplicated = order
            .iter()
            .filter_map(|entry| entry.index)
            .any(|index| !seen.insert(index));
        if duplicated {
            debug!(figure = %name, "Figure order carries duplicate index values");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::fetch::testing::MemoryFetcher;

    fn assembler_with(fetcher: MemoryFetcher) -> StaticAssembler {
        StaticAssembler::new(Arc::new(ArtifactStore::new(Arc::new(fetcher))))
    }

    fn seeded_fetcher() -> MemoryFetcher {
        let fetcher = MemoryFetcher::new();
        fetcher.insert(
            "manifest.json",
            r#"{
                "dataset_id": "baseline",
                "sources": ["smith2019"],
                "layers": ["baseline"],
                "layer_citation_keys": {"baseline": ["smith2019"]},
                "figures": {"summary": {"citation_keys": ["smith2019"]}}
            }"#,
        );
        fetcher.insert("figures/summary.json", r#"{"kg_per_week": 42.5}"#);
        fetcher.insert("references.txt", "[1] Smith 2019.");
        fetcher
    }

    #[tokio::test]
    async fn assembles_manifest_figures_and_references() {
        let assembler = assembler_with(seeded_fetcher());
        let result = assembler.assemble().await.unwrap();

        assert_eq!(result.dataset_id.as_deref(), Some("baseline"));
        assert_eq!(result.figures["summary"]["kg_per_week"], 42.5);
        assert_eq!(result.references.len(), 1);
        assert_eq!(result.references[0].text(), "[1] Smith 2019.");
    }

    #[tokio::test]
    async fn follows_dataset_manifest_indirection() {
        let fetcher = seeded_fetcher();
        fetcher.insert(
            "manifest.json",
            r#"{"dataset_manifest": {"path": "datasets/city.json"}}"#,
        );
        fetcher.insert(
            "datasets/city.json",
            r#"{"dataset_id": "city", "figures": {"summary": {}}}"#,
        );
        let assembler = assembler_with(fetcher);
        let result = assembler.assemble().await.unwrap();
        assert_eq!(result.dataset_id.as_deref(), Some("city"));
    }

    #[tokio::test]
    async fn broken_indirection_keeps_top_level_manifest() {
        let fetcher = seeded_fetcher();
        fetcher.insert(
            "manifest.json",
            r#"{"dataset_id": "baseline", "dataset_manifest": {"path": "missing.json"}}"#,
        );
        let assembler = assembler_with(fetcher);
        let result = assembler.assemble().await.unwrap();
        assert_eq!(result.dataset_id.as_deref(), Some("baseline"));
    }

    #[tokio::test]
    async fn missing_figure_is_skipped_not_fatal() {
        let fetcher = seeded_fetcher();
        fetcher.insert(
            "manifest.json",
            r#"{"figures": {"summary": {}, "ghost": {}}}"#,
        );
        let assembler = assembler_with(fetcher);
        let result = assembler.assemble().await.unwrap();
        assert!(result.figures.contains_key("summary"));
        assert!(!result.figures.contains_key("ghost"));
    }

    #[tokio::test]
    async fn explicit_figure_path_wins_over_convention() {
        let fetcher = seeded_fetcher();
        fetcher.insert(
            "manifest.json",
            r#"{"figures": {"summary": {"path": "alt/figures/other.json"}}}"#,
        );
        fetcher.insert("alt/figures/other.json", r#"{"kg_per_week": 1.0}"#);
        let assembler = assembler_with(fetcher);
        let result = assembler.assemble().await.unwrap();
        assert_eq!(result.figures["summary"]["kg_per_week"], 1.0);
    }

    #[tokio::test]
    async fn html_reference_export_is_preferred() {
        let fetcher = seeded_fetcher();
        fetcher.insert(
            "references.html",
            "<ol><li>[1] From HTML.</li></ol>",
        );
        let assembler = assembler_with(fetcher);
        let result = assembler.assemble().await.unwrap();
        assert_eq!(result.references[0].text(), "[1] From HTML.");
    }

    #[tokio::test]
    async fn missing_manifest_is_fatal() {
        let assembler = assembler_with(MemoryFetcher::new());
        assert!(assembler.assemble().await.is_err());
    }

    #[tokio::test]
    async fn missing_references_degrade_to_empty() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("manifest.json", r#"{"dataset_id": "bare"}"#);
        let assembler = assembler_with(fetcher);
        let result = assembler.assemble().await.unwrap();
        assert!(result.references.is_empty());
    }
}
