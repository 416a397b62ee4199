//! Source documents
//!
//! A [`Document`] borrows the text of one file, splits it into lines and
//! classifies each line up front, again once the language is known. Every
//! pipeline stage reads from it; none mutate it.

use super::line_classification::{classify_lines, CommentSyntax, LineKind};

/// One document's text, split into lines.
#[derive(Debug, Clone)]
pub struct Document<'a> {
    source: &'a str,
    lines: Vec<&'a str>,
    kinds: Vec<LineKind>,
    language: Option<String>,
}

impl<'a> Document<'a> {
    /// Splits `source` into lines. `\r\n` and `\n` both end a line; a trailing
    /// newline does not start an extra line.
    pub fn new(source: &'a str) -> Self {
        let lines: Vec<&'a str> = source.lines().collect();
        let kinds = classify_lines(lines.iter().copied(), CommentSyntax::ANY);
        Self {
            source,
            lines,
            kinds,
            language: None,
        }
    }

    /// Sets the language identifier used to pick syntax node kinds, and
    /// reclassifies the lines with that language's comment prefixes.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        let language = language.into();
        let comments = CommentSyntax::for_language(Some(&language));
        self.kinds = classify_lines(self.lines.iter().copied(), comments);
        self.language = Some(language);
        self
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn comment_syntax(&self) -> CommentSyntax {
        CommentSyntax::for_language(self.language())
    }

    pub fn lines(&self) -> &[&'a str] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&'a str> {
        self.lines.get(index).copied()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Index of the last line, `None` for an empty document.
    pub fn last_line(&self) -> Option<usize> {
        self.lines.len().checked_sub(1)
    }

    /// Classification of a line. Lines past the end read as blank.
    pub fn kind(&self, index: usize) -> LineKind {
        self.kinds.get(index).copied().unwrap_or(LineKind::Blank)
    }

    pub fn is_blank(&self, index: usize) -> bool {
        self.kind(index).is_blank()
    }

    pub fn is_documentation(&self, index: usize) -> bool {
        self.kind(index).is_documentation()
    }

    /// Byte column of the first non-whitespace character.
    pub fn first_non_whitespace(&self, index: usize) -> Option<usize> {
        let line = self.line(index)?;
        line.char_indices()
            .find(|(_, ch)| !ch.is_whitespace())
            .map(|(column, _)| column)
    }

    /// Byte column of the last non-whitespace character.
    pub fn last_non_whitespace(&self, index: usize) -> Option<usize> {
        let line = self.line(index)?;
        line.char_indices()
            .rev()
            .find(|(_, ch)| !ch.is_whitespace())
            .map(|(column, _)| column)
    }

    /// Width of the leading whitespace, tabs counted as four columns.
    pub fn indentation(&self, index: usize) -> usize {
        self.line(index)
            .map(|line| {
                line.chars()
                    .take_while(|ch| ch.is_whitespace())
                    .map(|ch| if ch == '\t' { 4 } else { 1 })
                    .sum()
            })
            .unwrap_or(0)
    }

    /// True when non-whitespace text precedes `column` on the line, i.e. a
    /// comment starting there trails code.
    pub fn has_code_before(&self, index: usize, column: usize) -> bool {
        self.line(index)
            .and_then(|line| line.get(..column))
            .is_some_and(|before| !before.trim().is_empty())
    }
}
