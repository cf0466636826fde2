// Tue Jan 13 2026 - Alex

use crate::output::OutputError;
use crate::patch::BadPatch;
use crate::registry::ModuleId;
use crate::utils::string::to_code_block;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadStart {
    pub plugin: String,
    pub error: String,
}

/// Everything a verification run found, grouped the way it is reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub bad_patches: Vec<BadPatch>,
    /// Warnings only; never make a run fail.
    pub slow_patches: Vec<BadPatch>,
    pub bad_finds: Vec<String>,
    pub bad_starts: Vec<BadStart>,
    pub other_errors: Vec<String>,
    pub ignored_errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal: Option<String>,
    pub finished: bool,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_findings(&self) -> bool {
        !self.bad_patches.is_empty()
            || !self.bad_finds.is_empty()
            || !self.bad_starts.is_empty()
            || !self.other_errors.is_empty()
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    pub fn finding_count(&self) -> usize {
        self.bad_patches.len() + self.bad_finds.len() + self.bad_starts.len() + self.other_errors.len()
    }

    pub fn to_json(&self) -> Result<String, OutputError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_markdown(&self, title: &str) -> String {
        let mut out = format!("# {}\n\n", title);

        if let Some(reason) = &self.fatal {
            let _ = writeln!(out, "**Verification aborted:** {}\n", reason);
        }

        section(&mut out, "Bad Patches", &self.bad_patches, render_patch);
        section(&mut out, "Slow Patches", &self.slow_patches, render_patch);
        section(&mut out, "Bad Webpack Finds", &self.bad_finds, |f| {
            format!("- {}", to_code_block(f, 2))
        });
        section(&mut out, "Bad Starts", &self.bad_starts, |s| {
            format!("- {}\n  - Error: {}", s.plugin, to_code_block(&s.error, 2))
        });
        section(&mut out, "Host Errors", &self.other_errors, |e| {
            format!("- {}", to_code_block(e, 2))
        });

        if !self.ignored_errors.is_empty() {
            let _ = writeln!(out, "_{} known host errors ignored._", self.ignored_errors.len());
        }
        out
    }

    pub fn save_json(&self, path: &Path) -> Result<(), OutputError> {
        write_file(path, &self.to_json()?)
    }

    pub fn save_markdown(&self, path: &Path, title: &str) -> Result<(), OutputError> {
        write_file(path, &self.to_markdown(title))
    }
}

fn render_patch(p: &BadPatch) -> String {
    let module = p.module.as_ref().map_or("-", ModuleId::as_str);
    let mut item = format!(
        "- **{}** ({})\n  - ID: `{}`\n  - Match: {}",
        p.owner,
        p.kind,
        module,
        to_code_block(&p.pattern, 2)
    );
    if let Some(detail) = &p.detail {
        let _ = write!(item, "\n  - Detail: {}", detail);
    }
    item
}

fn section<T>(out: &mut String, title: &str, items: &[T], render: impl Fn(&T) -> String) {
    let _ = writeln!(out, "## {}\n", title);
    if items.is_empty() {
        out.push_str("None\n\n");
        return;
    }
    for item in items {
        out.push_str(&render(item));
        out.push('\n');
    }
    out.push('\n');
}

fn write_file(path: &Path, text: &str) -> Result<(), OutputError> {
    std::fs::write(path, text).map_err(|source| OutputError::Write {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::BadPatchKind;

    fn sample() -> Report {
        Report {
            bad_patches: vec![BadPatch {
                owner: "Demo".to_string(),
                kind: BadPatchKind::WrongCount,
                module: Some(ModuleId::from("42")),
                pattern: "/a```b/".to_string(),
                detail: Some("expected 1, found 2".to_string()),
            }],
            bad_finds: vec!["findByProps(\"x\")".to_string()],
            ..Report::default()
        }
    }

    #[test]
    fn test_findings_ignore_slow_patches() {
        let mut report = Report::new();
        report.slow_patches = sample().bad_patches;
        assert!(!report.has_findings());
        assert!(sample().has_findings());
        assert_eq!(sample().finding_count(), 2);
    }

    #[test]
    fn test_markdown_sections() {
        let md = sample().to_markdown("Report");
        assert!(md.starts_with("# Report\n"));
        assert!(md.contains("- **Demo** (had wrong count)"));
        assert!(md.contains("`\u{200B}`\u{200B}`"));
        assert!(md.contains("## Bad Starts\n\nNone"));
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        sample().save_json(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let back: Report = serde_json::from_str(&text).unwrap();
        assert_eq!(back, sample());
    }
}
