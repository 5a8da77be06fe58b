//! Recursive-descent parser producing a scope-resolved AST.

mod expr;
mod stmt;

use std::sync::Arc;

use crate::error::{SourceRef, SyntaxError};
use crate::parser::ast::*;
use crate::parser::lexer::Lexer;
use crate::parser::scope::{BuildTimeScope, RuntimeScopeBlock, VARARGS_NAME};
use crate::parser::token::{Span, Token};

pub use expr::parse_expression;
pub use stmt::{parse_block, parse_statement};

/// Maximum nesting depth of statements and expressions.
pub const MAX_PARSE_DEPTH: usize = 200;

/// Parser state
pub struct Parser {
    tokens: Vec<(Token, Span)>,
    position: usize,
    pub(crate) scope: BuildTimeScope,
    chunk_name: Arc<str>,
    pub(crate) depth: usize,
}

impl Parser {
    /// Tokenize `source`; the first lexical error aborts.
    pub fn new(source: &str, chunk_name: &str) -> Result<Self, SyntaxError> {
        let chunk_name: Arc<str> = Arc::from(chunk_name);
        let tokens = Lexer::new(source).tokenize().map_err(|errors| {
            let first = &errors[0];
            let span = first.span();
            SyntaxError::new(
                first.message(),
                Some(SourceRef::new(chunk_name.clone(), span.line, span.column)),
            )
        })?;
        Ok(Self {
            tokens,
            position: 0,
            scope: BuildTimeScope::new(),
            chunk_name,
            depth: 0,
        })
    }

    pub fn parse_chunk(mut self) -> Result<ChunkStatement, SyntaxError> {
        self.scope.push_chunk();
        let varargs = self.scope.define_local(VARARGS_NAME);
        let body = parse_block(&mut self)?;
        if !self.check(&Token::Eof) {
            return Err(self.expected("<eof>"));
        }
        Ok(self.finish_chunk(body, varargs))
    }

    pub fn parse_function(mut self) -> Result<ChunkStatement, SyntaxError> {
        self.scope.push_chunk();
        let varargs = self.scope.define_local(VARARGS_NAME);
        let start = self.current_span();
        self.expect(Token::Function)?;
        let function = expr::parse_function_body(&mut self, false, None, start)?;
        if !self.check(&Token::Eof) {
            return Err(self.expected("<eof>"));
        }
        let span = function.span;
        let body = CompositeStatement {
            statements: vec![Statement::Return(ReturnStatement {
                values: vec![Expression::Function(Box::new(function))],
                span,
            })],
            span,
        };
        Ok(self.finish_chunk(body, varargs))
    }

    fn finish_chunk(&mut self, body: CompositeStatement, varargs: crate::parser::SymbolRef) -> ChunkStatement {
        let to = self.scope.slot_mark();
        let frame = self.scope.pop_function();
        ChunkStatement {
            name: self.chunk_name.clone(),
            body,
            frame,
            varargs,
            scope: RuntimeScopeBlock { from: 0, to },
        }
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    pub fn current(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)].0
    }

    pub fn current_span(&self) -> Span {
        self.tokens[self.position.min(self.tokens.len() - 1)].1
    }

    pub fn peek(&self) -> &Token {
        &self.tokens[(self.position + 1).min(self.tokens.len() - 1)].0
    }

    pub fn previous_span(&self) -> Span {
        self.tokens[self.position.saturating_sub(1)].1
    }

    pub fn check(&self, token: &Token) -> bool {
        self.current() == token
    }

    pub fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    /// Consume `token` if it is current.
    pub fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, token: Token) -> Result<Span, SyntaxError> {
        if self.check(&token) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.expected(&token.to_string()))
        }
    }

    /// Expect the closing token of a construct opened at `opener`.
    pub fn expect_match(&mut self, token: Token, opener: &Token, opened_at: Span) -> Result<Span, SyntaxError> {
        if self.check(&token) {
            return self.expect(token);
        }
        if opened_at.line == self.current_span().line {
            Err(self.expected(&token.to_string()))
        } else {
            Err(self.error(format!(
                "'{}' expected (to close '{}' at line {}) near '{}'",
                token,
                opener,
                opened_at.line,
                self.current()
            )))
        }
    }

    pub fn expect_name(&mut self) -> Result<(String, Span), SyntaxError> {
        match self.current().clone() {
            Token::Name(name) => {
                let span = self.current_span();
                self.advance();
                Ok((name, span))
            }
            _ => Err(self.expected("<name>")),
        }
    }

    // ========================================================================
    // Errors
    // ========================================================================

    pub fn location(&self, span: Span) -> SourceRef {
        SourceRef::new(self.chunk_name.clone(), span.line, span.column)
    }

    pub fn error(&self, message: impl Into<String>) -> SyntaxError {
        self.error_at(self.current_span(), message)
    }

    pub fn error_at(&self, span: Span, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, Some(self.location(span)))
    }

    pub fn expected(&self, what: &str) -> SyntaxError {
        self.error(format!("'{}' expected near '{}'", what, self.current()))
    }

    pub fn unexpected_token(&self) -> SyntaxError {
        self.error(format!("unexpected symbol near '{}'", self.current()))
    }

    pub(crate) fn enter(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            self.depth -= 1;
            return Err(self.error("chunk has too many syntax levels"));
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }
}
