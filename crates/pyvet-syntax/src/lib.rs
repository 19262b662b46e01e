//! # pyvet-syntax
//!
//! Parses source written in either of the analyzed language's two diverging
//! dialect families into one uniform [`SyntaxTree`]. The modern grammar is
//! attempted first; on a syntax error the legacy grammar gets the source; if
//! both reject it the file simply contributes no information — callers never
//! treat unparseable input as fatal.
//!
//! ```
//! let tree = pyvet_syntax::parse("import os\n").expect("parses under the modern grammar");
//! assert!(tree.dialect.is_modern());
//!
//! // Statement-form print only exists in the legacy grammar.
//! let tree = pyvet_syntax::parse("print \"hi\"\n").expect("falls back to legacy");
//! assert!(tree.dialect.is_legacy());
//!
//! assert!(pyvet_syntax::parse("def def def").is_none());
//! ```

mod ast;
mod parser;
mod token;


pub use ast::{
    Alias, Dialect, ExceptHandler, Expr, Keyword, Literal, Stmt, SyntaxTree, WithItem,
};

use thiserror::Error;

/// A syntax error from one grammar. Only surfaced when a caller targets a
/// specific dialect; the [`parse`] facade converts double failure to `None`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("syntax error at line {line}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

/// Parse under the modern grammar, falling back to the legacy grammar.
///
/// Returns `None` when both grammars reject the source.
pub fn parse(source: &str) -> Option<SyntaxTree> {
    match parse_dialect(source, Dialect::Modern) {
        Ok(tree) => Some(tree),
        Err(_) => parse_dialect(source, Dialect::Legacy).ok(),
    }
}

/// Parse under one specific dialect's grammar.
pub fn parse_dialect(source: &str, dialect: Dialect) -> Result<SyntaxTree, SyntaxError> {
    parser::parse_module(source, dialect)
}
