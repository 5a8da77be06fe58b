//! Expression nodes

use std::sync::Arc;

use crate::parser::scope::{RuntimeScopeFrame, SymbolRef};
use crate::parser::ast::statement::CompositeStatement;
use crate::parser::token::Span;

/// Expression node
#[derive(Debug, Clone)]
pub enum Expression {
    /// `nil`, `true`, numbers and strings
    Literal(LiteralExpression),

    /// `...`
    Varargs(VarargsExpression),

    /// A name resolved to a local, upvalue or global
    Symbol(SymbolRefExpression),

    /// `object[key]` and `object.name`
    Index(IndexExpression),

    /// `f(args)` and `object:method(args)`
    Call(FunctionCallExpression),

    /// `function(params) body end`
    Function(Box<FunctionDefinitionExpression>),

    /// `left op right`
    Binary(BinaryOperatorExpression),

    /// `op operand`
    Unary(UnaryOperatorExpression),

    /// `{ ... }`
    Table(TableConstructorExpression),

    /// `(expr)`, truncating multiple results to one
    Adjusted(AdjustedExpression),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Literal(e) => e.span,
            Expression::Varargs(e) => e.span,
            Expression::Symbol(e) => e.span,
            Expression::Index(e) => e.span,
            Expression::Call(e) => e.span,
            Expression::Function(e) => e.span,
            Expression::Binary(e) => e.span,
            Expression::Unary(e) => e.span,
            Expression::Table(e) => e.span,
            Expression::Adjusted(e) => e.span,
        }
    }

    /// Whether the expression may produce more than one value.
    pub fn is_multi_value(&self) -> bool {
        matches!(self, Expression::Call(_) | Expression::Varargs(_))
    }

    /// Whether the expression can appear on the left of `=`.
    pub fn is_lvalue(&self) -> bool {
        matches!(self, Expression::Symbol(_) | Expression::Index(_))
    }

    /// Short description of what the expression names, for error messages.
    pub fn describe(&self) -> Option<String> {
        match self {
            Expression::Symbol(s) => Some(s.symbol.describe()),
            Expression::Index(i) => match &*i.key {
                Expression::Literal(LiteralExpression {
                    value: LiteralValue::String(name),
                    ..
                }) => Some(format!("field '{}'", name)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Constant value
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Nil,
    Boolean(bool),
    Number(f64),
    String(Arc<str>),
}

#[derive(Debug, Clone)]
pub struct LiteralExpression {
    pub value: LiteralValue,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VarargsExpression {
    pub symbol: SymbolRef,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SymbolRefExpression {
    pub symbol: SymbolRef,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IndexExpression {
    pub object: Box<Expression>,
    pub key: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunctionCallExpression {
    pub callee: Box<Expression>,
    /// Method name for `object:method(...)` calls
    pub method: Option<Arc<str>>,
    pub arguments: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunctionDefinitionExpression {
    /// Declared parameters, `self` first for method definitions
    pub parameters: Vec<SymbolRef>,
    /// Hidden local receiving extra arguments of a variadic function
    pub varargs: Option<SymbolRef>,
    pub body: CompositeStatement,
    pub frame: RuntimeScopeFrame,
    /// Name used in stack traces, when the definition has one
    pub name: Option<Arc<str>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    NotEqual,
    Equal,
    Concat,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

impl BinaryOperator {
    /// (left, right) binding power; right-associative operators bind looser on the right.
    pub fn precedence(self) -> (u8, u8) {
        match self {
            BinaryOperator::Or => (1, 1),
            BinaryOperator::And => (2, 2),
            BinaryOperator::Less
            | BinaryOperator::Greater
            | BinaryOperator::LessEqual
            | BinaryOperator::GreaterEqual
            | BinaryOperator::NotEqual
            | BinaryOperator::Equal => (3, 3),
            BinaryOperator::Concat => (9, 8),
            BinaryOperator::Add | BinaryOperator::Subtract => (10, 10),
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => {
                (11, 11)
            }
            BinaryOperator::Power => (14, 13),
        }
    }
}

/// Binding power of unary operators, between `*` and `^`.
pub const UNARY_PRECEDENCE: u8 = 12;

#[derive(Debug, Clone)]
pub struct BinaryOperatorExpression {
    pub operator: BinaryOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    Length,
}

#[derive(Debug, Clone)]
pub struct UnaryOperatorExpression {
    pub operator: UnaryOperator,
    pub operand: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TableField {
    /// `value`, stored at the next array position
    Positional(Expression),
    /// `[key] = value` or `name = value`
    Keyed { key: Expression, value: Expression },
}

#[derive(Debug, Clone)]
pub struct TableConstructorExpression {
    pub fields: Vec<TableField>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AdjustedExpression {
    pub inner: Box<Expression>,
    pub span: Span,
}
