use crate::cursor::Position;
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// A syntactic error from the lexer or parser.
///
/// Syntax errors abort the parse: the session surfaces the first one as
/// a single-element diagnostic list. `begin`/`end` are 0-based with an
/// exclusive `end`; `span` carries the same region for miette rendering.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
#[error("{message}")]
#[diagnostic(code("tag-parse-syntax-error"))]
pub struct SyntaxError {
    pub message: String,
    #[label("{message}")]
    pub span: SourceSpan,
    pub begin: Position,
    pub end: Position,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, begin: Position, end: Position) -> Self {
        SyntaxError {
            message: message.into(),
            span: (begin.offset, end.offset.saturating_sub(begin.offset)).into(),
            begin,
            end,
        }
    }

    /// An error at a single point.
    pub fn at(message: impl Into<String>, at: Position) -> Self {
        Self::new(message, at, at)
    }
}

/// A semantic error from the interpreter, the reference resolver, or
/// the schema validator.
///
/// These are non-fatal: producers accumulate them and keep going. Each
/// carries a tree `path` of property names and `"[i]"` index tokens.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum SemanticError {
    #[error("cannot attach properties to a reference; use ':=' to clone it instead")]
    #[diagnostic(code("ref-with-properties"))]
    RefWithProperties { path: Vec<String> },

    #[error("clone reference {reference} could not be resolved: {reason}")]
    #[diagnostic(code("unresolved-clone-reference"))]
    UnresolvedClone {
        reference: String,
        reason: String,
        path: Vec<String>,
    },

    #[error("cloned reference {reference} escapes the clone boundary ({ups} level(s) up at depth {depth})")]
    #[diagnostic(code("clone-reference-out-of-scope"))]
    CloneOutOfScope {
        reference: String,
        ups: usize,
        depth: usize,
        path: Vec<String>,
    },

    #[error("reference {reference} could not be resolved: {reason}")]
    #[diagnostic(code("unresolved-reference"))]
    UnresolvedReference {
        reference: String,
        reason: String,
        path: Vec<String>,
    },

    #[error("missing required property {name:?}")]
    #[diagnostic(code("missing-required"))]
    MissingRequired { name: String, path: Vec<String> },

    #[error("expected {expected}, found {found}")]
    #[diagnostic(code("wrong-type"))]
    WrongType {
        expected: String,
        found: String,
        path: Vec<String>,
    },

    #[error("unknown property {name:?}")]
    #[diagnostic(code("unknown-property"))]
    UnknownProperty { name: String, path: Vec<String> },

    #[error("{message}")]
    #[diagnostic(code("invalid-schema"))]
    InvalidSchema { message: String, path: Vec<String> },

    #[error("value does not match any allowed enum value; allowed: [{allowed}]")]
    #[diagnostic(code("invalid-enum-value"))]
    InvalidEnumValue { allowed: String, path: Vec<String> },

    #[error("{message}")]
    #[diagnostic(code("pattern-mismatch"))]
    PatternMismatch { message: String, path: Vec<String> },
}

impl SemanticError {
    /// The stable error code string.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            SemanticError::RefWithProperties { .. } => "ref-with-properties",
            SemanticError::UnresolvedClone { .. } => "unresolved-clone-reference",
            SemanticError::CloneOutOfScope { .. } => "clone-reference-out-of-scope",
            SemanticError::UnresolvedReference { .. } => "unresolved-reference",
            SemanticError::MissingRequired { .. } => "missing-required",
            SemanticError::WrongType { .. } => "wrong-type",
            SemanticError::UnknownProperty { .. } => "unknown-property",
            SemanticError::InvalidSchema { .. } => "invalid-schema",
            SemanticError::InvalidEnumValue { .. } => "invalid-enum-value",
            SemanticError::PatternMismatch { .. } => "pattern-mismatch",
        }
    }

    /// The tree path the error is anchored to.
    #[must_use]
    pub fn path(&self) -> &[String] {
        match self {
            SemanticError::RefWithProperties { path }
            | SemanticError::UnresolvedClone { path, .. }
            | SemanticError::CloneOutOfScope { path, .. }
            | SemanticError::UnresolvedReference { path, .. }
            | SemanticError::MissingRequired { path, .. }
            | SemanticError::WrongType { path, .. }
            | SemanticError::UnknownProperty { path, .. }
            | SemanticError::InvalidSchema { path, .. }
            | SemanticError::InvalidEnumValue { path, .. }
            | SemanticError::PatternMismatch { path, .. } => path,
        }
    }
}

/// Any diagnostic the pipeline can produce.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotlyError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

// Forwarded by hand (rather than `#[diagnostic(transparent)]`) because
// `SemanticError` also has an inherent `code()` method: method-call syntax
// in the derived forwarding body would resolve to that inherent method
// instead of `Diagnostic::code`, so trait-qualified calls are used here to
// disambiguate.
impl Diagnostic for MotlyError {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            MotlyError::Syntax(e) => Diagnostic::code(e),
            MotlyError::Semantic(e) => Diagnostic::code(e),
        }
    }

    fn severity(&self) -> Option<miette::Severity> {
        match self {
            MotlyError::Syntax(e) => Diagnostic::severity(e),
            MotlyError::Semantic(e) => Diagnostic::severity(e),
        }
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            MotlyError::Syntax(e) => Diagnostic::help(e),
            MotlyError::Semantic(e) => Diagnostic::help(e),
        }
    }

    fn url(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            MotlyError::Syntax(e) => Diagnostic::url(e),
            MotlyError::Semantic(e) => Diagnostic::url(e),
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            MotlyError::Syntax(e) => Diagnostic::source_code(e),
            MotlyError::Semantic(e) => Diagnostic::source_code(e),
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        match self {
            MotlyError::Syntax(e) => Diagnostic::labels(e),
            MotlyError::Semantic(e) => Diagnostic::labels(e),
        }
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn Diagnostic> + 'a>> {
        match self {
            MotlyError::Syntax(e) => Diagnostic::related(e),
            MotlyError::Semantic(e) => Diagnostic::related(e),
        }
    }

    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        match self {
            MotlyError::Syntax(e) => Diagnostic::diagnostic_source(e),
            MotlyError::Semantic(e) => Diagnostic::diagnostic_source(e),
        }
    }
}

impl MotlyError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            MotlyError::Syntax(_) => "tag-parse-syntax-error",
            MotlyError::Semantic(err) => err.code(),
        }
    }

    /// The tree path for semantic errors; empty for syntax errors.
    #[must_use]
    pub fn path(&self) -> &[String] {
        match self {
            MotlyError::Syntax(_) => &[],
            MotlyError::Semantic(err) => err.path(),
        }
    }
}

/// Errors from the session surface itself.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session has been disposed")]
    #[diagnostic(code("session-disposed"))]
    Disposed,
}
