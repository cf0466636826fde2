// Tue Jan 13 2026 - Alex

//! The line protocol between a verification run and whoever collects its
//! findings: `<sentinel> <tag> <payload>`, one finding per line.

use crate::patch::{BadPatch, BadPatchKind};
use crate::pattern::cache;
use crate::registry::ModuleId;
use crate::utils::string::StringUtils;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    PatchFailure,
    FindFailure,
    StartFailure,
    HostError,
    Fatal,
    Finished,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::PatchFailure,
        Category::FindFailure,
        Category::StartFailure,
        Category::HostError,
        Category::Fatal,
        Category::Finished,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Category::PatchFailure => "webpack-patch-failure",
            Category::FindFailure => "webpack-find-failure",
            Category::StartFailure => "plugin-start-failure",
            Category::HostError => "host-error",
            Category::Fatal => "fatal",
            Category::Finished => "test-finished",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.tag() == tag)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticLine {
    pub category: Category,
    pub payload: String,
}

impl DiagnosticLine {
    pub fn new(category: Category, payload: impl Into<String>) -> Self {
        Self {
            category,
            payload: payload.into(),
        }
    }

    /// `Patch by <owner> <what happened> (Module id is <id>): <pattern>`,
    /// with the detail after a tab.
    pub fn patch(bad: &BadPatch) -> Self {
        let module = bad.module.as_ref().map_or("-", ModuleId::as_str);
        let mut payload = format!(
            "Patch by {} {} (Module id is {}): {}",
            bad.owner,
            bad.kind.phrase(),
            module,
            bad.pattern
        );
        if let Some(detail) = &bad.detail {
            payload.push('\t');
            payload.push_str(detail);
        }
        Self::new(Category::PatchFailure, payload)
    }

    pub fn find(description: &str) -> Self {
        Self::new(Category::FindFailure, format!("Failed to find: {}", description))
    }

    pub fn start(plugin: &str, error: &str) -> Self {
        Self::new(Category::StartFailure, format!("{}: {}", plugin, error))
    }

    pub fn host_error(message: &str) -> Self {
        Self::new(Category::HostError, message)
    }

    pub fn fatal(reason: &str) -> Self {
        Self::new(Category::Fatal, reason)
    }

    pub fn finished() -> Self {
        Self::new(Category::Finished, "")
    }

    pub fn render(&self, sentinel: &str) -> String {
        if self.payload.is_empty() {
            return format!("{} {}", sentinel, self.category.tag());
        }
        format!(
            "{} {} {}",
            sentinel,
            self.category.tag(),
            StringUtils::escape_line(&self.payload)
        )
    }

    /// `None` for lines that are not ours or carry an unknown tag.
    pub fn parse(line: &str, sentinel: &str) -> Option<Self> {
        let rest = line.trim_end_matches(['\r', '\n']).strip_prefix(sentinel)?;
        let rest = rest.strip_prefix(' ')?;
        let (tag, payload) = rest.split_once(' ').unwrap_or((rest, ""));
        let category = Category::from_tag(tag)?;
        Some(Self::new(category, StringUtils::unescape_line(payload)))
    }

    pub fn as_bad_patch(&self) -> Option<BadPatch> {
        if self.category != Category::PatchFailure {
            return None;
        }
        parse_patch_payload(&self.payload)
    }

    pub fn as_bad_start(&self) -> Option<(String, String)> {
        if self.category != Category::StartFailure {
            return None;
        }
        let (plugin, error) = self.payload.split_once(": ")?;
        Some((plugin.to_string(), error.to_string()))
    }

    pub fn find_description(&self) -> Option<&str> {
        if self.category != Category::FindFailure {
            return None;
        }
        Some(self.payload.strip_prefix("Failed to find: ").unwrap_or(&self.payload))
    }
}

const PATCH_PAYLOAD: &str =
    r"(?s)^Patch by (.+?) (had wrong count|errored|found no module|was slow) \(Module id is ([^)]*)\): (.*)$";

fn parse_patch_payload(payload: &str) -> Option<BadPatch> {
    let regex = cache::compile(PATCH_PAYLOAD).ok()?;
    let (head, detail) = match payload.split_once('\t') {
        Some((head, detail)) => (head, Some(detail.to_string())),
        None => (payload, None),
    };
    let caps = regex.captures(head).ok().flatten()?;
    let kind = BadPatchKind::from_phrase(&caps[2])?;
    let module = match &caps[3] {
        "-" => None,
        id => Some(ModuleId::from(id)),
    };

    Some(BadPatch {
        owner: caps[1].to_string(),
        kind,
        module,
        pattern: caps[4].to_string(),
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTINEL: &str = "[BundleInterceptor]";

    #[test]
    fn test_patch_line_survives_the_channel() {
        let bad = BadPatch {
            owner: "Demo Plugin".to_string(),
            kind: BadPatchKind::WrongCount,
            module: Some(ModuleId::from("123")),
            pattern: "/BAR=1/".to_string(),
            detail: Some("expected 1, found 2".to_string()),
        };
        let line = DiagnosticLine::patch(&bad).render(SENTINEL);
        assert_eq!(
            line,
            "[BundleInterceptor] webpack-patch-failure Patch by Demo Plugin had wrong count (Module id is 123): /BAR=1/\\texpected 1, found 2"
        );

        let parsed = DiagnosticLine::parse(&line, SENTINEL).unwrap();
        assert_eq!(parsed.as_bad_patch(), Some(bad));
    }

    #[test]
    fn test_unfound_patch_has_no_module() {
        let bad = BadPatch {
            owner: "Demo".to_string(),
            kind: BadPatchKind::Unfound,
            module: None,
            pattern: "\"FOO\"".to_string(),
            detail: None,
        };
        let parsed = DiagnosticLine::parse(&DiagnosticLine::patch(&bad).render(SENTINEL), SENTINEL).unwrap();
        assert_eq!(parsed.as_bad_patch().unwrap().module, None);
    }

    #[test]
    fn test_multiline_payload_stays_on_one_line() {
        let line = DiagnosticLine::host_error("TypeError: x\n    at y").render(SENTINEL);
        assert!(!line.contains('\n'));
        let parsed = DiagnosticLine::parse(&line, SENTINEL).unwrap();
        assert_eq!(parsed.payload, "TypeError: x\n    at y");
    }

    #[test]
    fn test_parse_rejects_foreign_lines() {
        assert!(DiagnosticLine::parse("random output", SENTINEL).is_none());
        assert!(DiagnosticLine::parse("[BundleInterceptor] not-a-tag x", SENTINEL).is_none());
        assert_eq!(
            DiagnosticLine::parse("[BundleInterceptor] test-finished", SENTINEL).unwrap(),
            DiagnosticLine::finished()
        );
    }

    #[test]
    fn test_start_and_find_payloads() {
        let start = DiagnosticLine::start("Demo", "invalid regex");
        assert_eq!(start.as_bad_start(), Some(("Demo".to_string(), "invalid regex".to_string())));
        let find = DiagnosticLine::find("findByProps(\"a\")");
        assert_eq!(find.find_description(), Some("findByProps(\"a\")"));
    }
}
