//! Lua front end: lexical analysis, scope resolution and syntactic analysis.
//!
//! # Example
//!
//! ```ignore
//! use lunaris_engine::parser::parse_chunk;
//!
//! let chunk = parse_chunk("local x = 1 return x + 1", "example")?;
//! assert_eq!(chunk.body.statements.len(), 2);
//! ```

pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod scope;
pub mod token;

pub use ast::*;
pub use lexer::{LexError, Lexer};
pub use parser::Parser;
pub use scope::{BuildTimeScope, RuntimeScopeBlock, RuntimeScopeFrame, SymbolRef};
pub use token::{Span, Token};

use crate::error::SyntaxError;

/// Parse a chunk of source code into a resolved AST.
pub fn parse_chunk(source: &str, chunk_name: &str) -> Result<ChunkStatement, SyntaxError> {
    Parser::new(source, chunk_name)?.parse_chunk()
}

/// Parse `function (params) ... end` into a chunk that returns that function.
pub fn parse_function(source: &str, chunk_name: &str) -> Result<ChunkStatement, SyntaxError> {
    Parser::new(source, chunk_name)?.parse_function()
}
