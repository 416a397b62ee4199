//! Regex and bracket heuristic scope strategy
//!
//! Used when no syntax tree is available or the tree found nothing. The first
//! code line in the search window that looks like the wanted construct is the
//! anchor (a function header, a class header, a block opener, any statement),
//! and the construct is measured from it in one of three shapes:
//!
//!     braces       a `{` at bracket depth 0 opens the body; the matching `}`
//!                  closes the construct. The `{` may sit on the line after the
//!                  header.
//!     indentation  a header ending in `:` owns the following lines indented
//!                  deeper than itself.
//!     keyword      a Ruby/Lua style header closed by `end` at its own
//!                  indentation.
//!
//! Anything else is a statement, which ends where its brackets balance and no
//! trailing operator continues it. String contents and comments are skipped
//! while counting brackets. Node-kind modifiers (`+name`, `-name`) only mean
//! something to a syntax tree and are ignored here.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{LineSpan, ScopeQuery, ScopeSource, ScopeStrategy};
use crate::guard::document::Document;
use crate::guard::error::ProviderError;
use crate::guard::line_classification::{CommentSyntax, LineKind};
use crate::guard::tag::ScopeKind;

static FUNCTION_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s*(?:(?:export|default|public|private|protected|internal|static|async|abstract|final|",
        r"override|virtual|inline|extern|unsafe|const|open|suspend|synchronized|local|",
        r"pub(?:\([^)]*\))?)\s+)*",
        r"(?:def|fn|func|function\*?|fun|sub|proc)\b",
    ))
    .expect("function keyword pattern is valid")
});

/// `const f = (a) => ...`, `let g = function (...)`, `h: async () => ...`
static FUNCTION_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s*(?:export\s+)?(?:(?:const|let|var)\s+)?[A-Za-z_$][\w$.]*\s*",
        r"(?:(?::[^=]+)?=|:)\s*(?:async\s+)?",
        r"(?:function\b|(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=>)",
    ))
    .expect("function value pattern is valid")
});

/// A C-family definition: return type and qualifiers, then `name(`.
static C_LIKE_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[A-Za-z_$][\w$:<>,*&\[\]]*\s+)*[*&]*(?P<name>[A-Za-z_$~][\w$:]*)\s*\(")
        .expect("c-like function pattern is valid")
});

static CLASS_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s*(?:(?:export|default|public|private|protected|internal|static|abstract|final|",
        r"sealed|partial|data|open|unsafe|pub(?:\([^)]*\))?)\s+)*",
        r"(?:class|struct|interface|trait|enum|impl|object|module|type|union|record|namespace)",
        r"(?:\s|<|$)",
    ))
    .expect("class header pattern is valid")
});

/// Python/Java decorators and Rust/PHP attributes.
static DECORATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:@[A-Za-z_][\w.]*|#!?\[)").expect("decorator pattern is valid")
});

/// Headers whose body is closed by a bare `end`.
static KEYWORD_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?:(?:local|public|private|protected)\s+)*",
        r"(?:def|class|module|function|if|unless|while|until|case|begin|for)\b",
        r"|\bdo(?:\s*\|[^|]*\|)?$",
    ))
    .expect("keyword block pattern is valid")
});

static BLOCK_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^end\b").expect("block end pattern is valid"));

const CONTROL_WORDS: &[&str] = &[
    "if", "elif", "else", "for", "foreach", "while", "until", "unless", "switch", "match", "case",
    "catch", "return", "do", "new", "throw", "sizeof", "typeof", "await", "yield", "with",
    "using", "lock", "print", "assert", "delete",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body {
    /// `alone` when the `{` is the first thing on its line (Allman style).
    Braces { open: usize, close: usize, alone: bool },
    Indented { first: usize, last: usize },
    Keyword { end: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Construct {
    start: usize,
    header_end: usize,
    body: Option<Body>,
    end: usize,
}

impl Construct {
    fn statement(start: usize, end: usize) -> Self {
        Self {
            start,
            header_end: end,
            body: None,
            end,
        }
    }

    fn body_span(&self) -> Option<LineSpan> {
        let span = match self.body? {
            Body::Braces { open, close, alone } => {
                if alone || open == close {
                    LineSpan::new(open, close)
                } else {
                    LineSpan::new(open + 1, close)
                }
            }
            Body::Indented { first, last } => LineSpan::new(first, last),
            Body::Keyword { end } => LineSpan::new(self.header_end + 1, end.saturating_sub(1)),
        };
        Some(span)
    }
}

/// Finds constructs by their text alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicScopeStrategy;

impl ScopeStrategy for HeuristicScopeStrategy {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn source(&self) -> ScopeSource {
        ScopeSource::Heuristic
    }

    fn locate(&self, query: &ScopeQuery<'_>) -> Result<Option<LineSpan>, ProviderError> {
        let scanner = Scanner::new(query);
        let Some(construct) = scanner.anchor(query) else {
            return Ok(None);
        };
        let span = match query.kind {
            ScopeKind::Sig => Some(LineSpan::new(construct.start, construct.header_end)),
            ScopeKind::Body => construct.body_span(),
            _ => Some(LineSpan::new(construct.start, construct.end)),
        };
        Ok(span)
    }
}

struct Scanner<'q> {
    document: &'q Document<'q>,
    /// Text from this column on is the inline tag itself.
    cut: Option<(usize, usize)>,
    /// Rust: `'a` is a lifetime, only `'x'` is a literal.
    lifetimes: bool,
    comments: CommentSyntax,
}

impl<'q> Scanner<'q> {
    fn new(query: &ScopeQuery<'q>) -> Self {
        Self {
            document: query.document,
            cut: query.inline.then_some((query.tag.line, query.tag.column)),
            lifetimes: query.document.language() == Some("rust"),
            comments: query.document.comment_syntax(),
        }
    }

    /// Mid-line `--` needs a following space so `i--` stays code.
    fn starts_comment(&self, rest: &str) -> bool {
        if rest.starts_with("--") {
            return rest.starts_with("-- ") && self.comments.starts_comment(rest);
        }
        rest.starts_with("<!--") || self.comments.starts_comment(rest)
    }

    fn anchor(&self, query: &ScopeQuery<'_>) -> Option<Construct> {
        let mut decorated_from = None;
        for line in query.search_lines() {
            if self.document.kind(line) != LineKind::Code {
                continue;
            }
            if DECORATOR.is_match(self.text(line)) {
                decorated_from.get_or_insert(line);
                continue;
            }
            let found = match query.kind {
                ScopeKind::Func => self.function_at(line),
                ScopeKind::Class => self.class_at(line),
                ScopeKind::Sig => self.function_at(line).or_else(|| self.class_at(line)),
                ScopeKind::Body => self
                    .function_at(line)
                    .or_else(|| self.class_at(line))
                    .or_else(|| self.block_at(line))
                    .filter(|construct| construct.body.is_some()),
                ScopeKind::Block => self.block_at(line),
                ScopeKind::Stmt | ScopeKind::Expr => Some(self.measure(line)),
            };
            match found {
                Some(mut construct) => {
                    construct.start = decorated_from.unwrap_or(line);
                    return Some(construct);
                }
                None => decorated_from = None,
            }
        }
        None
    }

    fn function_at(&self, line: usize) -> Option<Construct> {
        let text = self.text(line);
        if FUNCTION_KEYWORD.is_match(text) || FUNCTION_VALUE.is_match(text) {
            return Some(self.measure(line));
        }
        let caps = C_LIKE_FUNCTION.captures(text)?;
        let name = caps.name("name")?.as_str();
        let first_word = text.split_whitespace().next().unwrap_or_default();
        if CONTROL_WORDS.contains(&name)
            || CONTROL_WORDS.contains(&first_word)
            || text.trim_end().ends_with(';')
        {
            return None;
        }
        let construct = self.measure(line);
        matches!(construct.body, Some(Body::Braces { .. })).then_some(construct)
    }

    fn class_at(&self, line: usize) -> Option<Construct> {
        if !CLASS_HEADER.is_match(self.text(line)) {
            return None;
        }
        Some(self.measure(line)).filter(|construct| construct.body.is_some())
    }

    fn block_at(&self, line: usize) -> Option<Construct> {
        Some(self.measure(line)).filter(|construct| construct.body.is_some())
    }

    /// Measures the construct whose header starts on `header`.
    fn measure(&self, header: usize) -> Construct {
        let document = self.document;
        let last = document.last_line().unwrap_or(header).max(header);
        let base = document.indentation(header);
        let mut parens = 0usize;
        let mut braces = 0usize;
        let mut open: Option<(usize, bool)> = None;
        let mut last_code = header;

        for line in header..=last {
            if line > header && document.kind(line) != LineKind::Code {
                continue;
            }
            let code = self.code(line);
            let trimmed = code.trim();
            if trimmed.is_empty() {
                continue;
            }
            last_code = line;

            for ch in trimmed.chars() {
                match ch {
                    '(' | '[' => parens += 1,
                    ')' | ']' => parens = parens.saturating_sub(1),
                    '{' => {
                        if open.is_none() && parens == 0 && braces == 0 {
                            open = Some((line, line > header && trimmed.starts_with('{')));
                        }
                        braces += 1;
                    }
                    '}' => {
                        braces = braces.saturating_sub(1);
                        if let (0, Some((open_line, alone))) = (braces, open) {
                            return Construct {
                                start: header,
                                header_end: signature_end(header, open_line, alone),
                                body: Some(Body::Braces {
                                    open: open_line,
                                    close: line,
                                    alone,
                                }),
                                end: line,
                            };
                        }
                    }
                    _ => {}
                }
            }

            if open.is_some() || parens > 0 || braces > 0 {
                continue;
            }
            if trimmed.ends_with(':') {
                return match self.indented_body(line, base) {
                    Some((first, end)) => Construct {
                        start: header,
                        header_end: line,
                        body: Some(Body::Indented { first, last: end }),
                        end,
                    },
                    None => Construct::statement(header, line),
                };
            }
            if continues(trimmed) || self.brace_follows(line) {
                continue;
            }
            if line == header && KEYWORD_BLOCK.is_match(trimmed) {
                if let Some(end) = self.keyword_end(header, base) {
                    return Construct {
                        start: header,
                        header_end: line,
                        body: Some(Body::Keyword { end }),
                        end,
                    };
                }
            }
            return Construct::statement(header, line);
        }

        // Brackets never balanced: the construct runs to the last code line.
        match open {
            Some((open_line, alone)) => Construct {
                start: header,
                header_end: signature_end(header, open_line, alone),
                body: Some(Body::Braces {
                    open: open_line,
                    close: last_code,
                    alone,
                }),
                end: last_code,
            },
            None => Construct::statement(header, last_code),
        }
    }

    /// First and last line indented deeper than `base` after a `:` header.
    fn indented_body(&self, header_end: usize, base: usize) -> Option<(usize, usize)> {
        let document = self.document;
        let last = document.last_line()?;
        let mut body: Option<(usize, usize)> = None;
        for line in header_end + 1..=last {
            if document.first_non_whitespace(line).is_none() {
                continue;
            }
            if document.indentation(line) <= base {
                break;
            }
            body = Some(body.map_or((line, line), |(first, _)| (first, line)));
        }
        body
    }

    fn keyword_end(&self, header: usize, base: usize) -> Option<usize> {
        let document = self.document;
        let last = document.last_line()?;
        for line in header + 1..=last {
            if document.kind(line) != LineKind::Code {
                continue;
            }
            let indentation = document.indentation(line);
            if indentation < base {
                return None;
            }
            if indentation == base && BLOCK_END.is_match(self.text(line).trim()) {
                return Some(line);
            }
        }
        None
    }

    /// True when the next code line opens with `{`.
    fn brace_follows(&self, line: usize) -> bool {
        let document = self.document;
        let last = document.last_line().unwrap_or(line);
        (line + 1..=last)
            .find(|&next| document.kind(next) == LineKind::Code)
            .is_some_and(|next| self.text(next).trim_start().starts_with('{'))
    }

    fn text(&self, line: usize) -> &'q str {
        let text = self.document.line(line).unwrap_or("");
        match self.cut {
            Some((cut_line, column)) if cut_line == line => text.get(..column).unwrap_or(text),
            _ => text,
        }
    }

    /// The line with string contents and comments removed. Quote characters
    /// are kept so `""` still reads as a value.
    fn code(&self, line: usize) -> String {
        let text = self.text(line);
        let mut code = String::with_capacity(text.len());
        let mut quote: Option<char> = None;
        let mut escaped = false;
        let mut skip_until = 0;

        for (index, ch) in text.char_indices() {
            if index < skip_until {
                continue;
            }
            if let Some(open) = quote {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == open {
                    quote = None;
                    code.push(ch);
                }
                continue;
            }

            let rest = &text[index..];
            if self.starts_comment(rest) {
                break;
            }
            if let Some(after) = rest.strip_prefix("/*") {
                match after.find("*/") {
                    Some(close) => {
                        skip_until = index + 2 + close + 2;
                        continue;
                    }
                    None => break,
                }
            }
            match ch {
                '"' | '`' => {
                    quote = Some(ch);
                    code.push(ch);
                }
                '\'' if self.lifetimes => match char_literal_len(rest) {
                    Some(len) => {
                        code.push_str("''");
                        skip_until = index + len;
                    }
                    None => code.push(ch),
                },
                '\'' => {
                    quote = Some(ch);
                    code.push(ch);
                }
                _ => code.push(ch),
            }
        }
        code
    }
}

fn signature_end(header: usize, open_line: usize, alone: bool) -> usize {
    if alone {
        open_line.saturating_sub(1).max(header)
    } else {
        open_line
    }
}

/// Byte length of a Rust char literal at the start of `rest`, if it is one.
fn char_literal_len(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices().skip(1);
    let (_, first) = chars.next()?;
    if first == '\\' {
        return rest[2..].find('\'').filter(|&pos| pos <= 8).map(|pos| pos + 3);
    }
    let (index, second) = chars.next()?;
    (second == '\'').then_some(index + 1)
}

/// A trailing operator or separator carries the statement onto the next line.
fn continues(code: &str) -> bool {
    if code.ends_with("++") || code.ends_with("--") {
        return false;
    }
    code.ends_with("=>")
        || code.ends_with(['\\', ',', '=', '+', '-', '*', '/', '&', '|', '.', '?'])
}
