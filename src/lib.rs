pub mod ast;
pub mod cursor;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod schema;
pub mod serialization;
pub mod tree;
mod session;

pub use error::{MotlyError, SemanticError, SessionError, SyntaxError};
pub use session::{evaluate, EvalOutcome, Session};
