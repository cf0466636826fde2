// Tue Jan 13 2026 - Alex

use crate::manifest::ManifestError;
use crate::patch::PatchSpec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A lookup an extension makes at start-up. Code fragments are plain text,
/// or a regex when wrapped in slashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupSpec {
    ByProps(Vec<String>),
    ByCode(Vec<String>),
    ByStoreName(String),
    ByFactoryCode(Vec<String>),
    ComponentByCode(Vec<String>),
    ModuleFactory(Vec<String>),
    ExtractAndLoadChunks {
        code: Vec<String>,
        #[serde(default)]
        matcher: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSpec {
    pub name: String,
    #[serde(default)]
    pub bootstrap: bool,
    #[serde(default)]
    pub patches: Vec<PatchSpec>,
    #[serde(default)]
    pub lookups: Vec<LookupSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionManifest {
    pub extensions: Vec<ExtensionSpec>,
}

impl ExtensionManifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let manifest: ExtensionManifest = serde_json::from_str(text)?;
        let mut seen = std::collections::HashSet::new();
        for ext in &manifest.extensions {
            if !seen.insert(ext.name.as_str()) {
                return Err(ManifestError::DuplicateName(ext.name.clone()));
            }
        }
        Ok(manifest)
    }

    pub fn patch_count(&self) -> usize {
        self.extensions.iter().map(|e| e.patches.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "extensions": [{
            "name": "Demo",
            "patches": [{
                "find": "FOO_MARKER",
                "replacement": [{"match": "BAR=1", "replace": "BAR=2"}]
            }],
            "lookups": [
                {"by_props": ["fooExport"]},
                {"by_store_name": "UserStore"},
                {"extract_and_load_chunks": {"code": ["/\\i\\.settings/"]}}
            ]
        }]
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ExtensionManifest::parse(MANIFEST).unwrap();
        let ext = &manifest.extensions[0];
        assert!(!ext.bootstrap);
        assert_eq!(ext.patches[0].replacement[0].expected, 1);
        assert_eq!(ext.lookups[0], LookupSpec::ByProps(vec!["fooExport".to_string()]));
        assert_eq!(
            ext.lookups[2],
            LookupSpec::ExtractAndLoadChunks {
                code: vec![r"/\i\.settings/".to_string()],
                matcher: None
            }
        );
        assert_eq!(manifest.patch_count(), 1);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let text = r#"{"extensions": [{"name": "A"}, {"name": "A"}]}"#;
        assert!(matches!(ExtensionManifest::parse(text), Err(ManifestError::DuplicateName(_))));
    }
}
