//! Error types and rendering.
//!
//! Matching itself never errors — the matcher hands back "no match" and the
//! entry points convert the furthest-failure record into a [`ParseError`].
//! Grammar compilation failures are [`GrammarError`]s; visitor failures live
//! in the `visitor` module. Errors own their input text so they can outlive
//! the call that produced them.

use std::fmt;

use annotate_snippets::{AnnotationKind, Group, Level, Renderer, Snippet};

/// What went wrong with a parse: no rule accepted the input, or the default
/// rule matched a prefix when the whole text was required.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParseErrorKind {
    /// No expression matched at the reported position.
    Mismatch,
    /// The rule matched but stopped short of the end of the input; the
    /// position is the first unconsumed offset.
    Incomplete,
}

/// A failed `parse` or `match` call.
///
/// Carries the input, the failure position, and the blamed expression (the
/// named expression that failed furthest into the input, or the deepest
/// anonymous one when no named expression reached as far). Line and column
/// are computed on demand.
#[derive(Debug, Clone)]
pub struct ParseError {
    kind: ParseErrorKind,
    text: String,
    pos: usize,
    rule_name: String,
    rule_text: String,
}

impl ParseError {
    pub(crate) fn mismatch(text: &str, pos: usize, rule_name: &str, rule_text: String) -> Self {
        Self {
            kind: ParseErrorKind::Mismatch,
            text: text.to_owned(),
            pos,
            rule_name: rule_name.to_owned(),
            rule_text,
        }
    }

    pub(crate) fn incomplete(text: &str, pos: usize, rule_name: &str, rule_text: String) -> Self {
        Self {
            kind: ParseErrorKind::Incomplete,
            text: text.to_owned(),
            pos,
            rule_name: rule_name.to_owned(),
            rule_text,
        }
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// The input the parse ran over.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte offset of the failure.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Name of the blamed expression; empty when an anonymous sub-expression
    /// is blamed.
    pub fn rule_name(&self) -> &str {
        &self.rule_name
    }

    /// The blamed expression in rule-syntax form.
    pub fn rule_text(&self) -> &str {
        &self.rule_text
    }

    /// The failure position, clamped onto a character boundary inside the
    /// text: a parse started past the end of the input (or inside a
    /// multi-byte character) reports the raw position but still renders.
    fn clamped_pos(&self) -> usize {
        let mut pos = self.pos.min(self.text.len());
        while !self.text.is_char_boundary(pos) {
            pos -= 1;
        }
        pos
    }

    /// 1-based line of the failure position.
    pub fn line(&self) -> usize {
        self.text[..self.clamped_pos()].matches('\n').count() + 1
    }

    /// 1-based column of the failure position, in characters since the last
    /// newline.
    pub fn column(&self) -> usize {
        let pos = self.clamped_pos();
        let line_start = self.text[..pos].rfind('\n').map_or(0, |nl| nl + 1);
        self.text[line_start..pos].chars().count() + 1
    }

    /// Renderer for an annotated-source report of this error.
    pub fn printer(&self) -> ErrorPrinter<'_> {
        ErrorPrinter::new(self)
    }

    /// One-line description without position information.
    fn summary(&self) -> String {
        let subject = if self.rule_name.is_empty() {
            format!("expression `{}`", self.rule_text)
        } else {
            format!("rule '{}'", self.rule_name)
        };
        match self.kind {
            ParseErrorKind::Mismatch => format!("{subject} didn't match"),
            ParseErrorKind::Incomplete => {
                format!("{subject} matched, but didn't consume the entire text")
            }
        }
    }

    /// Up to 20 characters of input starting at the failure position.
    fn snippet(&self) -> String {
        self.text[self.clamped_pos()..].chars().take(20).collect()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at line {}, column {}",
            self.summary(),
            self.line(),
            self.column()
        )?;
        let snippet = self.snippet();
        if snippet.is_empty() {
            write!(f, " (end of text)")
        } else {
            write!(f, " ({snippet:?})")
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors from compiling rule-syntax text into a grammar.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GrammarError {
    /// The rule syntax itself didn't parse.
    #[error("bad grammar: {0}")]
    BadGrammar(ParseError),

    /// A reference names a rule that was never defined.
    #[error("the label {label:?} was never defined")]
    UndefinedLabel { label: String },

    /// A `~"..."` pattern was rejected by the regex engine.
    #[error("regex {pattern:?} failed to compile: {message}")]
    BadRegex { pattern: String, message: String },

    /// A string literal contains a malformed escape sequence.
    #[error("bad escape sequence {escape:?} in literal")]
    BadEscape { escape: String },
}

/// Builder for rendering a [`ParseError`] as an annotated source snippet.
pub struct ErrorPrinter<'e> {
    error: &'e ParseError,
    path: Option<&'e str>,
    colored: bool,
}

impl<'e> ErrorPrinter<'e> {
    fn new(error: &'e ParseError) -> Self {
        Self {
            error,
            path: None,
            colored: false,
        }
    }

    pub fn path(mut self, path: &'e str) -> Self {
        self.path = Some(path);
        self
    }

    pub fn colored(mut self, value: bool) -> Self {
        self.colored = value;
        self
    }

    pub fn render(&self) -> String {
        let renderer = if self.colored {
            Renderer::styled()
        } else {
            Renderer::plain()
        };

        let source = self.error.text();
        let title = self.error.summary();
        let range = adjust_range(self.error.clamped_pos(), source.len());

        let mut snippet = Snippet::source(source)
            .line_start(1)
            .annotation(AnnotationKind::Primary.span(range).label(&title));
        if let Some(path) = self.path {
            snippet = snippet.path(path);
        }

        let report: Vec<Group> = vec![Level::ERROR.primary_title(&title).element(snippet)];
        renderer.render(&report)
    }
}

/// Failure positions are zero-width; widen to one column so the caret has
/// something to point at, clamped to the source length.
fn adjust_range(pos: usize, limit: usize) -> std::ops::Range<usize> {
    pos..(pos + 1).min(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParseError {
        ParseError::mismatch(
            "first line\nsecond line",
            13,
            "greeting",
            "greeting = \"hi\"".to_owned(),
        )
    }

    #[test]
    fn line_and_column_are_computed_on_demand() {
        let err = sample();
        assert_eq!(err.line(), 2);
        assert_eq!(err.column(), 3);
    }

    #[test]
    fn display_names_the_rule_and_position() {
        assert_eq!(
            sample().to_string(),
            "rule 'greeting' didn't match at line 2, column 3 (\"cond line\")"
        );
    }

    #[test]
    fn display_at_end_of_text() {
        let err = ParseError::mismatch("ab", 2, "g", "g = \"abc\"".to_owned());
        assert_eq!(
            err.to_string(),
            "rule 'g' didn't match at line 1, column 3 (end of text)"
        );
    }

    #[test]
    fn incomplete_display_mentions_leftover_text() {
        let err = ParseError::incomplete("chitty bangbang", 11, "g", String::new());
        assert_eq!(
            err.to_string(),
            "rule 'g' matched, but didn't consume the entire text at line 1, column 12 (\"bang\")"
        );
    }

    #[test]
    fn anonymous_expressions_are_blamed_by_their_text() {
        let err = ParseError::mismatch("zz", 0, "", "\" \"".to_owned());
        assert!(err.to_string().starts_with("expression `\" \"` didn't match"));
    }

    #[test]
    fn printer_renders_an_annotated_snippet() {
        let rendered = sample().printer().path("greetings.peg").render();
        assert!(rendered.contains("rule 'greeting' didn't match"));
        assert!(rendered.contains("greetings.peg"));
        assert!(rendered.contains("second line"));
    }

    #[test]
    fn column_counts_characters_not_bytes() {
        let err = ParseError::mismatch("héllo", 3, "g", String::new());
        assert_eq!(err.line(), 1);
        assert_eq!(err.column(), 3);
    }
}
