// Tue Jan 13 2026 - Alex

//! Chunk-load expressions in minified module source, and the host's
//! chunk-to-asset map.

use crate::pattern::{cache, Captures, PatternError, Regex};
use crate::registry::{ChunkId, ModuleId};
use indexmap::IndexSet;

/// `n.e("12")` calls (optionally in `Promise.all([...])`, or a bare
/// `Promise.resolve()`) chained into `.then(n.bind(n,"34"))`. Group 1 holds
/// the chunk-load calls, group 2 the entry point.
pub const DEFAULT_CHUNK_LOAD_PATTERN: &str = r#"(?:(?:Promise\.all\(\[)?(\i\.e\("?[^)]+?"?\)[^\]]*?)(?:\]\))?|Promise\.resolve\(\))\.then\(\i\.bind\(\i,"?([^)]+?)"?\)\)"#;

/// Like the default pattern but only loads that fetch at least one chunk.
pub const LAZY_CHUNK_PATTERN: &str = r#"(?:(?:Promise\.all\(\[)?(\i\.e\("?[^)]+?"?\)[^\]]*?)(?:\]\))?)\.then\(\i\.bind\(\i,"?([^)]+?)"?\)\)"#;

pub const CHUNK_IDS_PATTERN: &str = r#"\("?([^")]+?)"?\)"#;

/// Keys of the asset map: `"123":` style or bare `123:`. A quoted number
/// directly followed by `,` or `}` is a value, not a key, and is skipped.
const ASSET_MAP_PATTERN: &str = r#""([\deE]+?)"([,}])?|([\deE]+?):"#;

const WASM_MAGIC: &[u8] = b"\0asm";

pub fn default_chunk_load_regex() -> Result<Regex, PatternError> {
    cache::compile(DEFAULT_CHUNK_LOAD_PATTERN)
}

pub fn lazy_chunk_regex() -> Result<Regex, PatternError> {
    cache::compile(LAZY_CHUNK_PATTERN)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkGroup {
    pub chunk_ids: Vec<ChunkId>,
    pub entry_point: ModuleId,
}

fn match_failed(regex: &Regex, e: fancy_regex::Error) -> PatternError {
    PatternError::MatchFailed {
        pattern: regex.as_str().to_string(),
        reason: e.to_string(),
    }
}

pub fn parse_chunk_ids(raw: &str) -> Result<Vec<ChunkId>, PatternError> {
    let regex = cache::compile(CHUNK_IDS_PATTERN)?;
    let mut ids = Vec::new();
    for caps in regex.captures_iter(raw) {
        let caps = caps.map_err(|e| match_failed(&regex, e))?;
        if let Some(id) = caps.get(1) {
            ids.push(ChunkId::from(id.as_str()));
        }
    }
    Ok(ids)
}

fn group_from(caps: &Captures<'_>) -> Result<Option<ChunkGroup>, PatternError> {
    let Some(entry) = caps.get(2) else {
        return Ok(None);
    };
    let chunk_ids = match caps.get(1) {
        Some(raw) => parse_chunk_ids(raw.as_str())?,
        None => Vec::new(),
    };
    Ok(Some(ChunkGroup {
        chunk_ids,
        entry_point: ModuleId::from(entry.as_str()),
    }))
}

/// Every lazy chunk load in a module's source, in source order.
pub fn extract_chunk_groups(source: &str) -> Result<Vec<ChunkGroup>, PatternError> {
    let regex = lazy_chunk_regex()?;
    let mut groups = Vec::new();
    for caps in regex.captures_iter(source) {
        let caps = caps.map_err(|e| match_failed(&regex, e))?;
        if let Some(group) = group_from(&caps)? {
            groups.push(group);
        }
    }
    Ok(groups)
}

/// The first load `matcher` finds. The matcher must capture chunk-load
/// calls as group 1 (optional) and the entry point as group 2.
pub fn extract_first_group(source: &str, matcher: &Regex) -> Result<Option<ChunkGroup>, PatternError> {
    match matcher.captures(source).map_err(|e| match_failed(matcher, e))? {
        Some(caps) => group_from(&caps),
        None => Ok(None),
    }
}

/// Chunk ids named as keys in the asset map, first occurrence order.
pub fn parse_asset_map(text: &str) -> Result<Vec<ChunkId>, PatternError> {
    let regex = cache::compile(ASSET_MAP_PATTERN)?;
    let mut ids = IndexSet::new();

    for caps in regex.captures_iter(text) {
        let caps = caps.map_err(|e| match_failed(&regex, e))?;
        let id = match (caps.get(1), caps.get(2), caps.get(3)) {
            (Some(quoted), None, _) => quoted.as_str(),
            (None, _, Some(bare)) => bare.as_str(),
            _ => continue,
        };
        ids.insert(ChunkId::from(id));
    }

    Ok(ids.into_iter().collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Script,
    Wasm,
    Worker,
}

impl AssetKind {
    pub fn is_loadable(&self) -> bool {
        matches!(self, AssetKind::Script)
    }
}

pub fn classify_asset(body: &[u8], worker_marker: &str) -> AssetKind {
    if body.starts_with(WASM_MAGIC) {
        return AssetKind::Wasm;
    }
    match std::str::from_utf8(body) {
        Ok(text) if text.contains(worker_marker) => AssetKind::Worker,
        Ok(_) => AssetKind::Script,
        Err(_) => AssetKind::Wasm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<ChunkId> {
        list.iter().map(|s| ChunkId::from(*s)).collect()
    }

    #[test]
    fn test_extract_promise_all_group() {
        let source = r#"e=>Promise.all([n.e("123"),n.e("456")]).then(n.bind(n,"789"))"#;
        let groups = extract_chunk_groups(source).unwrap();
        assert_eq!(
            groups,
            vec![ChunkGroup {
                chunk_ids: ids(&["123", "456"]),
                entry_point: ModuleId::from("789"),
            }]
        );
    }

    #[test]
    fn test_extract_single_and_unquoted() {
        let source = r#"a(()=>n.e(12).then(n.bind(n,34)));b(()=>n.e("7").then(n.bind(n,"8")))"#;
        let groups = extract_chunk_groups(source).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].chunk_ids, ids(&["12"]));
        assert_eq!(groups[0].entry_point, ModuleId::from("34"));
        assert_eq!(groups[1].entry_point, ModuleId::from("8"));
    }

    #[test]
    fn test_lazy_pattern_ignores_resolved_promise() {
        let source = r#"Promise.resolve().then(n.bind(n,"5"))"#;
        assert!(extract_chunk_groups(source).unwrap().is_empty());

        let default = default_chunk_load_regex().unwrap();
        let group = extract_first_group(source, &default).unwrap().unwrap();
        assert!(group.chunk_ids.is_empty());
        assert_eq!(group.entry_point, ModuleId::from("5"));
    }

    #[test]
    fn test_parse_asset_map_skips_values() {
        let text = r#"{1:"abc",2:"def","33":"123",44:"9e9"}"#;
        assert_eq!(parse_asset_map(text).unwrap(), ids(&["1", "2", "33", "44"]));
    }

    #[test]
    fn test_classify_asset() {
        assert_eq!(classify_asset(b"\0asm\x01\0\0\0", "importScripts("), AssetKind::Wasm);
        assert_eq!(classify_asset(b"self.importScripts(\"x\")", "importScripts("), AssetKind::Worker);
        assert_eq!(classify_asset(b"(self.webpackChunk=[]).push()", "importScripts("), AssetKind::Script);
        assert!(!AssetKind::Worker.is_loadable());
    }
}
