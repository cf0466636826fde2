// Tue Jan 13 2026 - Alex

//! Shorthand expansion for patterns written against minified code.
//!
//! Extension authors cannot know the mangled identifier names the host's
//! minifier produces, so patterns use `\i` to mean "any identifier". The
//! expansion happens before compilation because the regex engine rejects `\i`.

/// What `\i` expands to.
pub const IDENTIFIER_PATTERN: &str = r"(?:[A-Za-z_$][\w$]*)";

pub fn canonicalize_pattern(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + 16);
    let mut chars = source.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('i') => out.push_str(IDENTIFIER_PATTERN),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }

    out
}

/// Collapses expanded identifier groups back to `\i` so reports show the
/// pattern the way its author wrote it.
pub fn uncanonicalize_pattern(source: &str) -> String {
    source.replace(IDENTIFIER_PATTERN, r"\i")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expands_identifier_shorthand() {
        let expanded = canonicalize_pattern(r"\i\.e\(");
        assert_eq!(expanded, format!(r"{}\.e\(", IDENTIFIER_PATTERN));
    }

    #[test]
    fn test_keeps_escaped_backslash() {
        // `\\i` is a literal backslash followed by `i`
        assert_eq!(canonicalize_pattern(r"a\\i"), r"a\\i");
        assert_eq!(canonicalize_pattern(r"trailing\"), r"trailing\");
    }

    #[test]
    fn test_expanded_pattern_compiles_and_matches() {
        let re = regex::Regex::new(&canonicalize_pattern(r"\i\.bind\(\i,")).unwrap();
        assert!(re.is_match("n.bind(n,\"42\")"));
        assert!(re.is_match("$e.bind(_t,1)"));
        assert!(!re.is_match("1.bind(2,"));
    }

    #[test]
    fn test_roundtrip_for_display() {
        let src = r"\i\.useState\(\i\)";
        assert_eq!(uncanonicalize_pattern(&canonicalize_pattern(src)), src);
    }
}
