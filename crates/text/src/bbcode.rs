//! BBCode tokenizer and parser.
//!
//! Grammar: `[name]`, `[name=value]`, `[/name]`. `[[` is a literal `[`.
//! Names start with an ASCII letter, continue with letters, digits or `_`,
//! and compare case-insensitively.
//!
//! Malformed input never fails:
//! - a closer with no matching opener is literal text
//! - openers past [`MAX_TAG_DEPTH`] are literal text
//! - from the earliest opener still unclosed at end of input, the rest of the
//!   input is literal text; text before it keeps its styling

use serde::Serialize;
use smallvec::SmallVec;

/// Nesting limit for open tags.
pub const MAX_TAG_DEPTH: usize = 50;

/// One opening tag, name lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub name: String,
    pub value: Option<String>,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_ascii_lowercase(), value: None }
    }

    pub fn with_value(name: &str, value: &str) -> Self {
        Self { name: name.to_ascii_lowercase(), value: Some(value.to_string()) }
    }
}

/// A run of text with the tags active over it, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    /// `[[`
    Escape,
    Open { tag: Tag, raw: &'a str },
    Close { name: String, raw: &'a str },
}

impl Token<'_> {
    fn literal(&self) -> &str {
        match self {
            Token::Text(s) => s,
            Token::Escape => "[",
            Token::Open { raw, .. } | Token::Close { raw, .. } => raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Role {
    Text,
    Literal,
    Open,
    /// Closes the opener at this token index.
    Close(usize),
}

fn is_tag_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'[' {
            i += 1;
            continue;
        }
        let tag = if bytes.get(i + 1) == Some(&b'[') {
            Some((Token::Escape, i + 2))
        } else {
            parse_tag(input, i)
        };
        match tag {
            Some((token, end)) => {
                if text_start < i {
                    tokens.push(Token::Text(&input[text_start..i]));
                }
                tokens.push(token);
                i = end;
                text_start = end;
            }
            None => i += 1,
        }
    }
    if text_start < input.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }
    tokens
}

/// Parse a tag starting at the `[` at `start`. Returns the token and the
/// byte index just past `]`.
fn parse_tag(input: &str, start: usize) -> Option<(Token<'_>, usize)> {
    let rest = &input[start + 1..];
    let close = rest.find(|c| c == ']' || c == '[')?;
    if rest.as_bytes()[close] != b']' {
        return None;
    }
    let body = &rest[..close];
    let end = start + 1 + close + 1;
    let raw = &input[start..end];

    if let Some(name) = body.strip_prefix('/') {
        let name = name.trim();
        return is_tag_name(name).then(|| (Token::Close { name: name.to_ascii_lowercase(), raw }, end));
    }
    let tag = match body.split_once('=') {
        Some((name, value)) => {
            let name = name.trim();
            is_tag_name(name).then(|| Tag::with_value(name, value.trim()))?
        }
        None => {
            let name = body.trim();
            is_tag_name(name).then(|| Tag::new(name))?
        }
    };
    Some((Token::Open { tag, raw }, end))
}

/// Parse BBCode into styled segments. Adjacent text with identical tag
/// lists is merged; empty segments are dropped.
pub fn parse(input: &str) -> Vec<Segment> {
    let tokens = tokenize(input);

    // pass 1: pair closers with openers
    let mut roles = vec![Role::Text; tokens.len()];
    let mut stack: SmallVec<[(usize, &str); 8]> = SmallVec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Text(_) => {}
            Token::Escape => roles[i] = Role::Literal,
            Token::Open { tag, .. } => {
                if stack.len() >= MAX_TAG_DEPTH {
                    roles[i] = Role::Literal;
                } else {
                    stack.push((i, tag.name.as_str()));
                    roles[i] = Role::Open;
                }
            }
            Token::Close { name, .. } => match stack.iter().rposition(|(_, n)| *n == name.as_str()) {
                Some(pos) => {
                    let (open, _) = stack.remove(pos);
                    roles[i] = Role::Close(open);
                }
                None => roles[i] = Role::Literal,
            },
        }
    }
    let cut = stack.iter().map(|(i, _)| *i).min().unwrap_or(tokens.len());

    // pass 2: emit
    let mut out = SegmentBuilder::default();
    let mut active: SmallVec<[(usize, &Tag); 8]> = SmallVec::new();
    for (i, token) in tokens.iter().enumerate() {
        if i >= cut {
            out.push(token.literal(), &[]);
            continue;
        }
        match roles[i] {
            Role::Text | Role::Literal => {
                let tags: SmallVec<[&Tag; 8]> = active.iter().map(|(_, t)| *t).collect();
                out.push(token.literal(), &tags);
            }
            Role::Open => {
                if let Token::Open { tag, .. } = token {
                    active.push((i, tag));
                }
            }
            Role::Close(open) => active.retain(|(j, _)| *j != open),
        }
    }
    out.segments
}

/// Plain text of `input` with every recognized tag removed, as the parser
/// would lay it out.
pub fn strip_tags(input: &str) -> String {
    parse(input).into_iter().map(|s| s.text).collect()
}

#[derive(Default)]
struct SegmentBuilder {
    segments: Vec<Segment>,
}

impl SegmentBuilder {
    fn push(&mut self, text: &str, tags: &[&Tag]) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.segments.last_mut() {
            if last.tags.len() == tags.len() && last.tags.iter().zip(tags).all(|(a, b)| a == *b) {
                last.text.push_str(text);
                return;
            }
        }
        self.segments.push(Segment {
            text: text.to_string(),
            tags: tags.iter().map(|t| (*t).clone()).collect(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, tags: &[&str]) -> Segment {
        Segment { text: text.into(), tags: tags.iter().map(|t| Tag::new(t)).collect() }
    }

    #[test]
    fn test_simple_bold() {
        assert_eq!(parse("[b]bold[/b] world"), vec![seg("bold", &["b"]), seg(" world", &[])]);
    }

    #[test]
    fn test_escape() {
        assert_eq!(parse("[[b]"), vec![seg("[b]", &[])]);
        assert_eq!(parse("a [[ b"), vec![seg("a [ b", &[])]);
    }

    #[test]
    fn test_unclosed_degrades_to_literal() {
        assert_eq!(parse("[b]unclosed"), vec![seg("[b]unclosed", &[])]);
    }

    #[test]
    fn test_text_before_unclosed_keeps_style() {
        let segments = parse("[i]x[/i] [b]y[u]z[/u]");
        assert_eq!(segments, vec![seg("x", &["i"]), seg(" [b]y[u]z[/u]", &[])]);
    }

    #[test]
    fn test_closer_matches_most_recent_same_name() {
        let segments = parse("[b]bold [i]x[/b] y[/i]");
        assert_eq!(
            segments,
            vec![seg("bold ", &["b"]), seg("x", &["b", "i"]), seg(" y", &["i"])]
        );
    }

    #[test]
    fn test_unmatched_closer_is_literal() {
        assert_eq!(parse("a[/b]c"), vec![seg("a[/b]c", &[])]);
        assert_eq!(
            parse("[b]a[/i]b[/b]"),
            vec![seg("a[/i]b", &["b"])]
        );
    }

    #[test]
    fn test_values_and_case() {
        let segments = parse("[COLOR=#ff0000]red[/color][size = 2 ]big[/SIZE]");
        assert_eq!(segments[0].tags, vec![Tag::with_value("color", "#ff0000")]);
        assert_eq!(segments[1].tags, vec![Tag::with_value("size", "2")]);
        assert_eq!(segments[1].text, "big");
    }

    #[test]
    fn test_non_tag_brackets_are_text() {
        assert_eq!(parse("a[1]b"), vec![seg("a[1]b", &[])]);
        assert_eq!(parse("x[ ]y [b"), vec![seg("x[ ]y [b", &[])]);
        assert_eq!(parse("[a [b]c[/b]"), vec![seg("[a ", &[]), seg("c", &["b"])]);
    }

    #[test]
    fn test_depth_limit() {
        let mut input = String::new();
        for _ in 0..MAX_TAG_DEPTH + 1 {
            input.push_str("[b]");
        }
        input.push('x');
        for _ in 0..MAX_TAG_DEPTH {
            input.push_str("[/b]");
        }
        let segments = parse(&input);
        // the 51st opener is text, all 50 real ones are closed
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "[b]x");
        assert_eq!(segments[0].tags.len(), MAX_TAG_DEPTH);
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("[b]a[/b][color=red]b[/color]"), "ab");
        assert_eq!(strip_tags("[b]a"), "[b]a");
    }
}
