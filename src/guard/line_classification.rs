//! Line Classification
//!
//! Labels every line of a document as blank, comment, documentation block or
//! code. Context regions may only cover documentation, and the heuristic scope
//! fallback skips comments when looking for the construct a tag points at.
//!
//! The classifier is stateful: block comments (`/* */`, `<!-- -->`) and
//! triple-quoted docstrings span lines, and every line inside one, blank lines
//! included, is documentation. Triple-quoted strings opened by code (an
//! assignment, a call argument) are tracked too, so their closing delimiter is
//! not mistaken for a docstring opener.
//!
//! Line comment prefixes depend on the language. `#` opens a comment in
//! Python, Ruby and shell, but in C and Rust it starts a preprocessor
//! directive or an attribute, which is code. See [`CommentSyntax`].

use serde::Serialize;

/// What a single line holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// Whitespace only, outside any block.
    Blank,
    /// A line comment (`//`, `#`, `--` where the language uses them) or a
    /// one-line block comment.
    Comment,
    /// Part of a multi-line block comment or docstring.
    DocBlock,
    Code,
}

impl LineKind {
    pub fn is_documentation(&self) -> bool {
        matches!(self, LineKind::Comment | LineKind::DocBlock)
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, LineKind::Blank)
    }
}

const DOCSTRING_DELIMITERS: [&str; 2] = ["\"\"\"", "'''"];

/// Languages where every `#` line is a comment.
const HASH_COMMENT_LANGUAGES: &[&str] = &[
    "python", "ruby", "shell", "bash", "sh", "zsh", "perl", "r", "yaml", "toml", "elixir",
    "julia", "powershell", "make", "dockerfile", "nim", "coffeescript",
];

/// Languages where `#` only ever starts an attribute, a directive or code.
const HASH_CODE_LANGUAGES: &[&str] = &[
    "javascript", "typescript", "tsx", "jsx", "rust", "go", "java", "kotlin", "scala",
    "swift", "dart", "c", "cpp", "csharp", "objc",
];

const DOUBLE_DASH_LANGUAGES: &[&str] = &["sql", "lua", "haskell", "ada", "elm", "vhdl"];

/// Words that make `#word` a preprocessor directive rather than a comment.
const DIRECTIVES: &[&str] = &[
    "include", "import", "define", "undef", "if", "ifdef", "ifndef", "elif", "else", "endif",
    "pragma", "error", "warning", "line", "region", "endregion",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashComment {
    Always,
    /// A comment unless it opens an attribute (`#[`, `#![`) or a directive.
    UnlessDirective,
    Never,
}

/// The line comment prefixes of one language.
///
/// `//` is a comment everywhere. Unknown languages accept `--` and any `#`
/// that is not an attribute or a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentSyntax {
    hash: HashComment,
    double_dash: bool,
}

impl CommentSyntax {
    /// Syntax used when the language is not known.
    pub const ANY: CommentSyntax = CommentSyntax {
        hash: HashComment::UnlessDirective,
        double_dash: true,
    };

    pub fn for_language(language: Option<&str>) -> Self {
        let Some(id) = language.map(str::to_ascii_lowercase) else {
            return Self::ANY;
        };
        let id = id.as_str();
        let hash_comments = HASH_COMMENT_LANGUAGES.contains(&id);
        let hash_code = HASH_CODE_LANGUAGES.contains(&id);
        let double_dash = DOUBLE_DASH_LANGUAGES.contains(&id);
        let hash = if hash_comments {
            HashComment::Always
        } else if hash_code {
            HashComment::Never
        } else {
            HashComment::UnlessDirective
        };
        Self {
            hash,
            double_dash: double_dash || !(hash_comments || hash_code),
        }
    }

    /// True when `text` begins with a line comment.
    pub fn starts_comment(&self, text: &str) -> bool {
        if text.starts_with("//") {
            return true;
        }
        if text.starts_with("--") {
            return self.double_dash;
        }
        match text.strip_prefix('#') {
            Some(rest) => match self.hash {
                HashComment::Always => true,
                HashComment::UnlessDirective => !is_directive(rest),
                HashComment::Never => false,
            },
            None => false,
        }
    }
}

impl Default for CommentSyntax {
    fn default() -> Self {
        Self::ANY
    }
}

/// `rest` is what follows a `#`.
fn is_directive(rest: &str) -> bool {
    if rest.starts_with('[') || rest.starts_with("![") {
        return true;
    }
    let word_end = rest
        .find(|ch: char| !ch.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    DIRECTIVES.contains(&&rest[..word_end])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenBlock {
    /// A comment or docstring; lines are documentation until `close`.
    Doc { close: &'static str },
    /// A triple-quoted string opened by code; lines are code until `close`.
    StringLiteral { close: &'static str },
}

/// A stateful classifier fed one line at a time, in document order.
pub struct LineClassifier {
    open: Option<OpenBlock>,
    comments: CommentSyntax,
}

impl LineClassifier {
    pub fn new() -> Self {
        Self::with_syntax(CommentSyntax::ANY)
    }

    pub fn with_syntax(comments: CommentSyntax) -> Self {
        Self {
            open: None,
            comments,
        }
    }

    /// Classifies the next line.
    pub fn classify(&mut self, line: &str) -> LineKind {
        let trimmed = line.trim();

        if let Some(open) = self.open {
            return match open {
                OpenBlock::Doc { close } => {
                    if trimmed.contains(close) {
                        self.open = None;
                    }
                    LineKind::DocBlock
                }
                OpenBlock::StringLiteral { close } => {
                    if trimmed.matches(close).count() % 2 == 1 {
                        self.open = None;
                    }
                    LineKind::Code
                }
            };
        }

        if trimmed.is_empty() {
            return LineKind::Blank;
        }

        if let Some(rest) = trimmed.strip_prefix("/*") {
            return self.open_doc_block(rest, "*/");
        }
        if let Some(rest) = trimmed.strip_prefix("<!--") {
            return self.open_doc_block(rest, "-->");
        }
        if let Some((delimiter, rest)) = strip_docstring_opener(trimmed) {
            return self.open_doc_block(rest, delimiter);
        }
        if self.comments.starts_comment(trimmed) {
            return LineKind::Comment;
        }

        self.track_code_line(trimmed);
        LineKind::Code
    }

    fn open_doc_block(&mut self, rest: &str, close: &'static str) -> LineKind {
        if rest.contains(close) {
            LineKind::Comment
        } else {
            self.open = Some(OpenBlock::Doc { close });
            LineKind::DocBlock
        }
    }

    /// Code can open a block comment or a triple-quoted string that runs onto
    /// the following lines.
    fn track_code_line(&mut self, trimmed: &str) {
        for delimiter in DOCSTRING_DELIMITERS {
            if trimmed.matches(delimiter).count() % 2 == 1 {
                self.open = Some(OpenBlock::StringLiteral { close: delimiter });
                return;
            }
        }
        if let Some(position) = trimmed.rfind("/*") {
            if !trimmed[position + 2..].contains("*/") {
                self.open = Some(OpenBlock::Doc { close: "*/" });
            }
        }
    }
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Matches a docstring opener, allowing a one-letter string prefix (`r"""`).
fn strip_docstring_opener(trimmed: &str) -> Option<(&'static str, &str)> {
    let unprefixed = match trimmed.chars().next() {
        Some('r' | 'R' | 'u' | 'U' | 'b' | 'B') => &trimmed[1..],
        _ => trimmed,
    };
    DOCSTRING_DELIMITERS.iter().find_map(|delimiter| {
        unprefixed
            .strip_prefix(delimiter)
            .map(|rest| (*delimiter, rest))
    })
}

/// Classifies every line of `lines` in order.
pub fn classify_lines<'a, I>(lines: I, comments: CommentSyntax) -> Vec<LineKind>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut classifier = LineClassifier::with_syntax(comments);
    lines
        .into_iter()
        .map(|line| classifier.classify(line))
        .collect()
}
