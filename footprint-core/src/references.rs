//! Reference parsing and reconciliation
//!
//! Builds of the dataset export their bibliography in whatever shape
//! the upstream tooling produced: newline-delimited plain text, an
//! HTML `<ol>`/`<ul>`, or a full HTML page. [`parse_reference_list`]
//! accepts all of them without erroring.
//!
//! [`reconcile_references`] merges per-layer citation-key sets with the
//! manifest's canonical ordering into a single de-duplicated, numbered
//! reference list scoped to the currently active layers. Every schema
//! mismatch degrades to a documented fallback; this function never
//! fails.

use std::collections::{HashMap, HashSet};

use crate::manifest::{ComputeResult, DatasetManifest, ReferenceOrderEntry};

// ============================================================================
// Parsing
// ============================================================================

/// Parse a reference resource into one entry per reference.
///
/// - plain newline-delimited text: one reference per line
/// - HTML with `<li>` items: the item texts, tags stripped
/// - a full HTML document without list items: the stripped body split
///   into lines (empty only when the document carries no text at all)
/// - any other markup fragment: the whitespace-normalized body text as
///   a single entry
pub fn parse_reference_list(input: &str) -> Vec<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let lower = trimmed.to_ascii_lowercase();
    let has_list_markup =
        lower.contains("<li") || lower.contains("<ol") || lower.contains("<ul");
    if has_list_markup {
        let items = extract_list_items(trimmed, &lower);
        if !items.is_empty() {
            return items;
        }
    }

    let is_document = lower.starts_with("<!doctype") || lower.starts_with("<html");
    if is_document {
        // Malformed full document: line-split whatever text survives
        // tag stripping rather than erroring.
        return strip_tags(trimmed)
            .lines()
            .map(|line| normalize_whitespace(line))
            .filter(|line| !line.is_empty())
            .collect();
    }

    let looks_like_markup = has_list_markup
        || lower.contains("</")
        || lower.contains("<p")
        || lower.contains("<div")
        || lower.contains("<br");
    if looks_like_markup {
        let body = normalize_whitespace(&strip_tags(trimmed));
        return if body.is_empty() { Vec::new() } else { vec![body] };
    }

    trimmed
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Extract `<li>` item texts. `lower` must be the ASCII-lowercased copy
/// of `html` (byte offsets line up because ASCII lowering preserves
/// length).
fn extract_list_items(html: &str, lower: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut cursor = 0;

    while let Some(open) = lower[cursor..].find("<li") {
        let open = cursor + open;
        let Some(tag_end) = lower[open..].find('>') else {
            break;
        };
        let content_start = open + tag_end + 1;
        let content_end = match lower[content_start..].find("</li") {
            Some(close) => content_start + close,
            // Unclosed item: run to the next item or end of input.
            None => match lower[content_start..].find("<li") {
                Some(next) => content_start + next,
                None => html.len(),
            },
        };

        let text = normalize_whitespace(&strip_tags(&html[content_start..content_end]));
        if !text.is_empty() {
            items.push(text);
        }
        cursor = content_end.max(content_start);
        if cursor >= html.len() {
            break;
        }
    }

    items
}

/// Remove markup tags, keeping the text (and its newlines) between them.
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                // Tag boundaries separate words in the source markup.
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    decode_entities(&out)
}

/// Decode the handful of entities bibliography exports actually use.
fn decode_entities(input: &str) -> String {
    input
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip a leading bracketed index prefix (`[12] `), if present.
fn clean_reference(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix('[') {
        if let Some(close) = rest.find(']') {
            if close > 0 && rest[..close].bytes().all(|b| b.is_ascii_digit()) {
                return rest[close + 1..].trim_start().to_string();
            }
        }
    }
    trimmed.to_string()
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Produce the ordered, de-duplicated reference list for the currently
/// active layers.
pub fn reconcile_references(active_layers: &[String], result: &ComputeResult) -> Vec<String> {
    let manifest = &result.manifest;
    let active_keys = active_citation_keys(active_layers, result);
    let canonical = canonical_key_order(manifest);

    // Canonical order stably partitioned: active keys first, then the
    // remainder of the canonical order.
    let mut ordered: Vec<&String> = canonical
        .iter()
        .filter(|key| active_keys.contains(key.as_str()))
        .collect();
    ordered.extend(canonical.iter().filter(|key| !active_keys.contains(key.as_str())));

    let key_index: HashMap<&str, usize> = canonical
        .iter()
        .enumerate()
        .map(|(i, key)| (key.as_str(), i))
        .collect();
    let by_key: HashMap<&str, &str> = result
        .references
        .iter()
        .filter_map(|entry| entry.key().map(|key| (key, entry.text())))
        .collect();

    let mut seen = HashSet::new();
    let mut entries: Vec<(Option<String>, String)> = Vec::new();
    for key in ordered {
        let text = by_key.get(key.as_str()).copied().or_else(|| {
            key_index
                .get(key.as_str())
                .and_then(|i| result.references.get(*i))
                .map(|entry| entry.text())
        });
        if let Some(text) = text {
            let cleaned = clean_reference(text);
            if !cleaned.is_empty() && seen.insert(cleaned.clone()) {
                entries.push((Some(key.clone()), cleaned));
            }
        }
    }

    // Key-based path produced nothing (mismatched schema): fall back to
    // per-layer reference texts, then to the raw list uncut. Fallback
    // texts carry no citation key.
    if entries.is_empty() {
        for layer in active_layers {
            for text in manifest.layer_references.get(layer).into_iter().flatten() {
                let cleaned = clean_reference(text);
                if !cleaned.is_empty() && seen.insert(cleaned.clone()) {
                    entries.push((None, cleaned));
                }
            }
        }
    }
    if entries.is_empty() {
        for entry in &result.references {
            let cleaned = clean_reference(entry.text());
            if !cleaned.is_empty() && seen.insert(cleaned.clone()) {
                entries.push((None, cleaned));
            }
        }
    }

    renumber(manifest, entries)
}

/// Union of the active layers' citation keys across manifest-level
/// groupings and figure payloads that carry their own groupings.
fn active_citation_keys<'a>(
    active_layers: &'a [String],
    result: &'a ComputeResult,
) -> HashSet<&'a str> {
    let mut keys = HashSet::new();
    for layer in active_layers {
        if let Some(layer_keys) = result.manifest.layer_citation_keys.get(layer) {
            keys.extend(layer_keys.iter().map(String::as_str));
        }
        for payload in result.figures.values() {
            let figure_keys = payload
                .get("layer_citation_keys")
                .and_then(|map| map.get(layer))
                .and_then(|value| value.as_array());
            if let Some(figure_keys) = figure_keys {
                keys.extend(figure_keys.iter().filter_map(|value| value.as_str()));
            }
        }
    }
    keys
}

/// Canonical citation ordering: manifest `sources`, falling back to
/// the figures' citation keys in figure-name order. First occurrence
/// wins for duplicate keys.
fn canonical_key_order(manifest: &DatasetManifest) -> Vec<String> {
    let mut canonical: Vec<String> = Vec::new();
    let mut seen = HashSet::new();

    let source_keys: Box<dyn Iterator<Item = &String>> = if manifest.sources.is_empty() {
        Box::new(
            manifest
                .figures
                .values()
                .flat_map(|figure| figure.citation_keys.iter()),
        )
    } else {
        Box::new(manifest.sources.iter())
    };
    for key in source_keys {
        if seen.insert(key.as_str().to_string()) {
            canonical.push(key.clone());
        }
    }
    canonical
}

/// Number the reconciled texts. A figure manifest exporting an `order`
/// array of matching length is authoritative: each text's index is
/// looked up by its citation key (active-layer filtering reorders the
/// list, so position alone says nothing), applied as-is. Texts without
/// a matching key fall back to positional numbering.
fn renumber(manifest: &DatasetManifest, entries: Vec<(Option<String>, String)>) -> Vec<String> {
    let order = manifest
        .figures
        .values()
        .filter_map(|figure| figure.order.as_deref())
        .find(|order| !entries.is_empty() && order.len() == entries.len());

    let index_by_key: HashMap<&str, u64> = order
        .map(|order: &[ReferenceOrderEntry]| {
            order
                .iter()
                .filter_map(|entry| entry.index.map(|index| (entry.key.as_str(), index)))
                .collect()
        })
        .unwrap_or_default();

    entries
        .into_iter()
        .enumerate()
        .map(|(i, (key, text))| {
            let n = key
                .as_deref()
                .and_then(|key| index_by_key.get(key).copied())
                .unwrap_or(i as u64 + 1);
            format!("[{}] {}", n, text)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{FigureManifest, ReferenceEntry};
    use std::collections::BTreeMap;

    #[test]
    fn parses_plain_newline_text() {
        assert_eq!(
            parse_reference_list("[1] A.\n[2] B."),
            vec!["[1] A.".to_string(), "[2] B.".to_string()]
        );
    }

    #[test]
    fn parses_html_ordered_list() {
        assert_eq!(
            parse_reference_list("<ol><li>[1] A.</li></ol>"),
            vec!["[1] A.".to_string()]
        );
    }

    #[test]
    fn parses_unclosed_list_items() {
        assert_eq!(
            parse_reference_list("<ul><li>First <li>Second</ul>"),
            vec!["First".to_string(), "Second".to_string()]
        );
    }

    #[test]
    fn strips_nested_markup_inside_items() {
        assert_eq!(
            parse_reference_list("<ol><li><em>A</em> &amp; B</li></ol>"),
            vec!["A & B".to_string()]
        );
    }

    #[test]
    fn malformed_doctype_falls_back_to_line_splitting() {
        let input = "<!DOCTYPE html><html><body>\n[1] A.\n[2] B.\n</body></html>";
        assert_eq!(
            parse_reference_list(input),
            vec!["[1] A.".to_string(), "[2] B.".to_string()]
        );
    }

    #[test]
    fn empty_document_yields_empty_list() {
        assert!(parse_reference_list("<!DOCTYPE html><html><head></head></html>").is_empty());
        assert!(parse_reference_list("   ").is_empty());
    }

    #[test]
    fn markup_fragment_collapses_to_body_text() {
        assert_eq!(
            parse_reference_list("<p>Only   one\nreference</p>"),
            vec!["Only one reference".to_string()]
        );
    }

    #[test]
    fn clean_reference_strips_index_prefix() {
        assert_eq!(clean_reference("[12] Smith 2019."), "Smith 2019.");
        assert_eq!(clean_reference("[x] Not an index"), "[x] Not an index");
        assert_eq!(clean_reference("No prefix"), "No prefix");
    }

    fn result_with_layers() -> ComputeResult {
        ComputeResult {
            manifest: DatasetManifest {
                sources: vec!["a".into(), "b".into(), "c".into()],
                layers: vec!["baseline".into(), "professional".into()],
                layer_citation_keys: BTreeMap::from([
                    ("baseline".to_string(), vec!["a".to_string()]),
                    ("professional".to_string(), vec!["c".to_string()]),
                ]),
                ..Default::default()
            },
            references: vec![
                ReferenceEntry::Text("[1] Ref A.".into()),
                ReferenceEntry::Text("[2] Ref B.".into()),
                ReferenceEntry::Text("[3] Ref C.".into()),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn active_layer_keys_come_first_in_canonical_order() {
        let result = result_with_layers();
        let refs = reconcile_references(&["professional".to_string()], &result);
        // "c" is active so Ref C leads; the rest of the canonical order
        // follows; everything is renumbered positionally.
        assert_eq!(refs, vec!["[1] Ref C.", "[2] Ref A.", "[3] Ref B."]);
    }

    #[test]
    fn union_across_active_layers() {
        let result = result_with_layers();
        let refs = reconcile_references(
            &["baseline".to_string(), "professional".to_string()],
            &result,
        );
        assert_eq!(refs, vec!["[1] Ref A.", "[2] Ref C.", "[3] Ref B."]);
    }

    #[test]
    fn keyed_entries_resolve_by_key_over_position() {
        let mut result = result_with_layers();
        result.references = vec![
            ReferenceEntry::Record {
                text: "[9] Keyed C.".into(),
                key: Some("c".into()),
                n: Some(9),
            },
            ReferenceEntry::Text("[1] Ref A.".into()),
            ReferenceEntry::Text("[2] Ref B.".into()),
        ];
        let refs = reconcile_references(&["professional".to_string()], &result);
        assert_eq!(refs[0], "[1] Keyed C.");
    }

    #[test]
    fn falls_back_to_layer_references_when_keys_mismatch() {
        let mut result = result_with_layers();
        result.manifest.sources.clear();
        result.manifest.layer_citation_keys.clear();
        result.manifest.layer_references = BTreeMap::from([(
            "baseline".to_string(),
            vec!["[1] Layer text.".to_string()],
        )]);
        let refs = reconcile_references(&["baseline".to_string()], &result);
        assert_eq!(refs, vec!["[1] Layer text."]);
    }

    #[test]
    fn falls_back_to_raw_list_when_everything_is_missing() {
        let mut result = result_with_layers();
        result.manifest = DatasetManifest::default();
        let refs = reconcile_references(&["baseline".to_string()], &result);
        assert_eq!(refs, vec!["[1] Ref A.", "[2] Ref B.", "[3] Ref C."]);
    }

    #[test]
    fn figure_payload_citation_keys_join_the_union() {
        let mut result = result_with_layers();
        result.manifest.layer_citation_keys.clear();
        result.figures.insert(
            "summary".to_string(),
            serde_json::json!({"layer_citation_keys": {"baseline": ["b"]}}),
        );
        let refs = reconcile_references(&["baseline".to_string()], &result);
        assert_eq!(refs[0], "[1] Ref B.");
    }

    #[test]
    fn manifest_order_is_authoritative_over_position() {
        let mut result = result_with_layers();
        result.manifest.figures.insert(
            "summary".to_string(),
            FigureManifest {
                order: Some(vec![
                    ReferenceOrderEntry {
                        key: "a".into(),
                        index: Some(4),
                    },
                    ReferenceOrderEntry {
                        key: "b".into(),
                        index: Some(5),
                    },
                    ReferenceOrderEntry {
                        key: "c".into(),
                        index: Some(6),
                    },
                ]),
                ..Default::default()
            },
        );
        let refs = reconcile_references(&["baseline".to_string()], &result);
        assert_eq!(refs, vec!["[4] Ref A.", "[5] Ref B.", "[6] Ref C."]);
    }

    #[test]
    fn order_indices_follow_keys_when_filtering_reorders() {
        let mut result = result_with_layers();
        result.manifest.figures.insert(
            "summary".to_string(),
            FigureManifest {
                order: Some(vec![
                    ReferenceOrderEntry {
                        key: "a".into(),
                        index: Some(4),
                    },
                    ReferenceOrderEntry {
                        key: "b".into(),
                        index: Some(5),
                    },
                    ReferenceOrderEntry {
                        key: "c".into(),
                        index: Some(6),
                    },
                ]),
                ..Default::default()
            },
        );
        // "c" is active so Ref C leads the list, but it keeps its
        // manifest-assigned number.
        let refs = reconcile_references(&["professional".to_string()], &result);
        assert_eq!(refs, vec!["[6] Ref C.", "[4] Ref A.", "[5] Ref B."]);
    }

    #[test]
    fn mismatched_order_length_keeps_positional_numbering() {
        let mut result = result_with_layers();
        result.manifest.figures.insert(
            "summary".to_string(),
            FigureManifest {
                order: Some(vec![ReferenceOrderEntry {
                    key: "a".into(),
                    index: Some(7),
                }]),
                ..Default::default()
            },
        );
        let refs = reconcile_references(&["baseline".to_string()], &result);
        assert_eq!(refs[0], "[1] Ref A.");
    }

    #[test]
    fn duplicate_texts_are_deduplicated() {
        let mut result = result_with_layers();
        result.references = vec![
            ReferenceEntry::Text("[1] Same text.".into()),
            ReferenceEntry::Text("[2] Same text.".into()),
            ReferenceEntry::Text("[3] Other.".into()),
        ];
        let refs = reconcile_references(&["baseline".to_string()], &result);
        assert_eq!(refs.len(), 2);
    }
}
