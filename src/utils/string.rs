// Tue Jan 13 2026 - Alex

use std::borrow::Cow;

pub struct StringUtils;

impl StringUtils {
    /// Cuts `s` to at most `max_len` characters, ending in `...` when cut.
    pub fn truncate(s: &str, max_len: usize) -> Cow<'_, str> {
        if s.chars().count() <= max_len {
            Cow::Borrowed(s)
        } else if max_len >= 3 {
            let kept: String = s.chars().take(max_len - 3).collect();
            Cow::Owned(format!("{}...", kept))
        } else {
            Cow::Owned(s.chars().take(max_len).collect())
        }
    }

    /// Fenced markdown block. Triple backticks inside are broken up with
    /// zero-width spaces so they cannot close the fence.
    pub fn to_code_block(s: &str, indentation: usize) -> String {
        let escaped = s.replace("```", "`\u{200B}`\u{200B}`");
        let pad = " ".repeat(indentation);
        let body = escaped
            .split('\n')
            .map(|line| format!("{}{}", pad, line))
            .collect::<Vec<_>>()
            .join("\n");
        format!("```\n{}\n{}```", body, pad)
    }

    /// Makes text safe to carry on one line: `\` becomes `\\`, newline `\n`.
    pub fn escape_line(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c => out.push(c),
            }
        }
        out
    }

    pub fn unescape_line(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        }
        out
    }
}

pub fn truncate(s: &str, max_len: usize) -> String {
    StringUtils::truncate(s, max_len).into_owned()
}

pub fn to_code_block(s: &str, indentation: usize) -> String {
    StringUtils::to_code_block(s, indentation)
}
