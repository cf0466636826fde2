// Tue Jan 13 2026 - Alex

use crate::pattern::canonical::uncanonicalize_pattern;
use crate::pattern::matcher::{Rewrite, TextRewriter};
use crate::pattern::{Captures, PatternError, Regex};
use once_cell::unsync::OnceCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Group(usize),
    Named(String),
}

/// A parsed replacement string. Supports `$1`..`$99`, `$&`, `$<name>`, `$$`
/// and `$self`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementTemplate {
    pieces: Vec<Piece>,
}

impl ReplacementTemplate {
    pub fn compile(template: &str, regex: &Regex, self_reference: Option<&str>) -> Result<Self, PatternError> {
        let group_count = regex.captures_len();
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let bytes = template.as_bytes();
        let mut i = 0;

        while i < template.len() {
            let rest = &template[i..];
            let Some(c) = rest.chars().next() else { break };

            if c != '$' {
                literal.push(c);
                i += c.len_utf8();
                continue;
            }

            if rest.starts_with("$self") {
                match self_reference {
                    Some(reference) => literal.push_str(reference),
                    None => literal.push_str("$self"),
                }
                i += 5;
                continue;
            }

            match bytes.get(i + 1).copied() {
                Some(b'$') => {
                    literal.push('$');
                    i += 2;
                }
                Some(b'&') => {
                    flush(&mut literal, &mut pieces);
                    pieces.push(Piece::Group(0));
                    i += 2;
                }
                Some(d) if d.is_ascii_digit() => {
                    let first = (d - b'0') as usize;
                    let two = bytes
                        .get(i + 2)
                        .filter(|b| b.is_ascii_digit())
                        .map(|b| first * 10 + (b - b'0') as usize);

                    let (group, width) = match two {
                        Some(n) if n > 0 && n < group_count => (n, 3),
                        _ => (first, 2),
                    };

                    if group == 0 {
                        literal.push_str("$0");
                        i += 2;
                        continue;
                    }
                    if group >= group_count {
                        return Err(PatternError::MissingCaptureGroup {
                            group: group.to_string(),
                            pattern: display_regex(regex),
                        });
                    }

                    flush(&mut literal, &mut pieces);
                    pieces.push(Piece::Group(group));
                    i += width;
                }
                Some(b'<') => {
                    let Some(close) = template[i + 2..].find('>') else {
                        return Err(PatternError::InvalidTemplate(format!(
                            "unterminated named group reference in {:?}",
                            template
                        )));
                    };
                    let name = &template[i + 2..i + 2 + close];
                    if !regex.capture_names().flatten().any(|n| n == name) {
                        return Err(PatternError::MissingCaptureGroup {
                            group: name.to_string(),
                            pattern: display_regex(regex),
                        });
                    }

                    flush(&mut literal, &mut pieces);
                    pieces.push(Piece::Named(name.to_string()));
                    i += close + 3;
                }
                _ => {
                    literal.push('$');
                    i += 1;
                }
            }
        }

        flush(&mut literal, &mut pieces);
        Ok(Self { pieces })
    }

    pub fn expand(&self, caps: &Captures<'_>, out: &mut String) {
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Group(n) => out.push_str(caps.get(*n).map_or("", |m| m.as_str())),
                Piece::Named(name) => out.push_str(caps.name(name).map_or("", |m| m.as_str())),
            }
        }
    }
}

fn flush(literal: &mut String, pieces: &mut Vec<Piece>) {
    if !literal.is_empty() {
        pieces.push(Piece::Literal(std::mem::take(literal)));
    }
}

fn display_regex(regex: &Regex) -> String {
    format!("/{}/", uncanonicalize_pattern(regex.as_str()))
}

pub type ReplaceFn = Rc<dyn Fn(&Captures<'_>) -> Result<String, String>>;

#[derive(Clone)]
pub enum Replacement {
    Template(String),
    Function(ReplaceFn),
}

impl Replacement {
    pub fn template(s: impl Into<String>) -> Self {
        Replacement::Template(s.into())
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Captures<'_>) -> Result<String, String> + 'static,
    {
        Replacement::Function(Rc::new(f))
    }
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacement::Template(s) => f.debug_tuple("Template").field(s).finish(),
            Replacement::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// One substitution rule: a regex plus what to put in place of each match.
pub struct RegexRewrite {
    regex: Regex,
    replacement: Replacement,
    global: bool,
    self_reference: Option<String>,
    template: OnceCell<Result<ReplacementTemplate, PatternError>>,
}

impl RegexRewrite {
    pub fn new(regex: Regex, replacement: Replacement) -> Self {
        Self {
            regex,
            replacement,
            global: false,
            self_reference: None,
            template: OnceCell::new(),
        }
    }

    pub fn with_global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    pub fn with_self_reference(mut self, reference: impl Into<String>) -> Self {
        self.self_reference = Some(reference.into());
        self
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    fn match_failed(&self, e: fancy_regex::Error) -> PatternError {
        PatternError::MatchFailed {
            pattern: display_regex(&self.regex),
            reason: e.to_string(),
        }
    }

    fn substitute(&self, caps: &Captures<'_>, out: &mut String) -> Result<(), PatternError> {
        match &self.replacement {
            Replacement::Template(raw) => {
                let template = self
                    .template
                    .get_or_init(|| ReplacementTemplate::compile(raw, &self.regex, self.self_reference.as_deref()));
                match template {
                    Ok(t) => {
                        t.expand(caps, out);
                        Ok(())
                    }
                    Err(e) => Err(e.clone()),
                }
            }
            Replacement::Function(f) => {
                let s = f(caps).map_err(PatternError::ReplacementFailed)?;
                out.push_str(&s);
                Ok(())
            }
        }
    }
}

impl TextRewriter for RegexRewrite {
    fn apply(&self, text: &str) -> Result<Rewrite, PatternError> {
        let mut occurrences = 0;
        for found in self.regex.find_iter(text) {
            found.map_err(|e| self.match_failed(e))?;
            occurrences += 1;
        }
        if occurrences == 0 {
            return Ok(Rewrite::unchanged(text));
        }

        let mut output = String::with_capacity(text.len());
        let mut last = 0;

        for caps in self.regex.captures_iter(text) {
            let caps = caps.map_err(|e| self.match_failed(e))?;
            let Some(whole) = caps.get(0) else { continue };
            output.push_str(&text[last..whole.start()]);
            self.substitute(&caps, &mut output)?;
            last = whole.end();

            if !self.global {
                break;
            }
        }
        output.push_str(&text[last..]);

        Ok(Rewrite { output, occurrences })
    }

    fn describe(&self) -> String {
        display_regex(&self.regex)
    }
}

impl fmt::Debug for RegexRewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexRewrite")
            .field("regex", &self.describe())
            .field("replacement", &self.replacement)
            .field("global", &self.global)
            .finish()
    }
}
