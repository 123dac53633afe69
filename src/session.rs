use crate::error::{MotlyError, SessionError};
use crate::tree::Node;
use crate::{interpreter, parser, resolver, schema};

/// The result of applying source text to a tree.
pub struct EvalOutcome {
    pub value: Node,
    pub diagnostics: Vec<MotlyError>,
}

/// Parse `source` and execute its statements against an owned root.
///
/// This is the primary entry point for processing MOTLY text. A syntax
/// error aborts before execution and is returned as a single
/// diagnostic with the tree unchanged; interpreter errors are non-fatal
/// and accumulate alongside the updated tree.
#[must_use]
pub fn evaluate(source: &str, mut value: Node) -> EvalOutcome {
    match parser::parse(source) {
        Ok(statements) => {
            let errors = interpreter::execute(&statements, &mut value);
            EvalOutcome {
                value,
                diagnostics: errors.into_iter().map(MotlyError::from).collect(),
            }
        }
        Err(err) => EvalOutcome {
            value,
            diagnostics: vec![err.into()],
        },
    }
}

/// An owned MOTLY session: one value tree, at most one schema tree.
///
/// Statements accumulate across [`Session::parse`] calls. The session
/// is synchronous and single-threaded; callers needing shared access
/// must serialise it themselves. After [`Session::dispose`], every
/// other method fails with [`SessionError::Disposed`].
#[derive(Debug, Default)]
pub struct Session {
    value: Node,
    schema: Option<Node>,
    disposed: bool,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Session::default()
    }

    fn live(&self) -> Result<(), SessionError> {
        if self.disposed {
            Err(SessionError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Apply source text to the session's tree.
    ///
    /// # Errors
    /// Fails only when the session is disposed; parse and execution
    /// problems are returned as diagnostics.
    pub fn parse(&mut self, source: &str) -> Result<Vec<MotlyError>, SessionError> {
        self.live()?;
        let current = std::mem::take(&mut self.value);
        let outcome = evaluate(source, current);
        self.value = outcome.value;
        Ok(outcome.diagnostics)
    }

    /// Parse source as a schema tree and install it, replacing any
    /// previously installed schema.
    ///
    /// # Errors
    /// Fails only when the session is disposed.
    pub fn parse_schema(&mut self, source: &str) -> Result<Vec<MotlyError>, SessionError> {
        self.live()?;
        let outcome = evaluate(source, Node::new());
        self.schema = Some(outcome.value);
        Ok(outcome.diagnostics)
    }

    /// Discard the value tree, keeping the schema.
    ///
    /// # Errors
    /// Fails only when the session is disposed.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.live()?;
        self.value = Node::new();
        Ok(())
    }

    /// A deep copy of the value tree.
    ///
    /// # Errors
    /// Fails only when the session is disposed.
    pub fn value(&self) -> Result<Node, SessionError> {
        self.live()?;
        Ok(self.value.clone())
    }

    /// Validate the tree against the installed schema; empty when no
    /// schema is installed.
    ///
    /// # Errors
    /// Fails only when the session is disposed.
    pub fn validate_schema(&self) -> Result<Vec<MotlyError>, SessionError> {
        self.live()?;
        Ok(match &self.schema {
            Some(schema) => schema::validate_schema(&self.value, schema)
                .into_iter()
                .map(MotlyError::from)
                .collect(),
            None => Vec::new(),
        })
    }

    /// Check that every link in the tree resolves.
    ///
    /// # Errors
    /// Fails only when the session is disposed.
    pub fn validate_references(&self) -> Result<Vec<MotlyError>, SessionError> {
        self.live()?;
        Ok(resolver::validate_references(&self.value)
            .into_iter()
            .map(MotlyError::from)
            .collect())
    }

    /// Mark the session dead. Idempotent.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.value = Node::new();
        self.schema = None;
    }
}
