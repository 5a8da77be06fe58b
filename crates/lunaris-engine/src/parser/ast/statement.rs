//! Statement nodes

use std::sync::Arc;

use crate::parser::ast::expression::{Expression, FunctionCallExpression, FunctionDefinitionExpression};
use crate::parser::scope::{RuntimeScopeBlock, RuntimeScopeFrame, SymbolRef};
use crate::parser::token::Span;

/// Statement node
#[derive(Debug, Clone)]
pub enum Statement {
    /// `a, b.c = x, y` and `local a, b = x, y`
    Assignment(AssignmentStatement),

    /// `break`
    Break(BreakStatement),

    /// `;`
    Empty(EmptyStatement),

    /// `for i = start, end, step do ... end`
    ForNum(ForNumStatement),

    /// `for k, v in explist do ... end`
    ForEach(ForEachStatement),

    /// A call evaluated for its side effects
    Call(FunctionCallStatement),

    /// `function a.b:c() end`, `local function f() end`
    FunctionDefinition(FunctionDefinitionStatement),

    /// `goto name`
    Goto(GotoStatement),

    /// `if ... elseif ... else ... end`
    If(IfStatement),

    /// `::name::`
    Label(LabelStatement),

    /// `repeat ... until cond`
    Repeat(RepeatStatement),

    /// `return explist`
    Return(ReturnStatement),

    /// `do ... end`
    ScopeBlock(ScopeBlockStatement),

    /// `while cond do ... end`
    While(WhileStatement),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Assignment(s) => s.span,
            Statement::Break(s) => s.span,
            Statement::Empty(s) => s.span,
            Statement::ForNum(s) => s.span,
            Statement::ForEach(s) => s.span,
            Statement::Call(s) => s.span,
            Statement::FunctionDefinition(s) => s.span,
            Statement::Goto(s) => s.span,
            Statement::If(s) => s.span,
            Statement::Label(s) => s.span,
            Statement::Repeat(s) => s.span,
            Statement::Return(s) => s.span,
            Statement::ScopeBlock(s) => s.span,
            Statement::While(s) => s.span,
        }
    }

    /// Statements that generate no code and may trail a label at block end.
    pub fn is_void(&self) -> bool {
        matches!(self, Statement::Empty(_) | Statement::Label(_))
    }
}

/// Sequence of statements forming a block body.
#[derive(Debug, Clone, Default)]
pub struct CompositeStatement {
    pub statements: Vec<Statement>,
    pub span: Span,
}

/// Root of a compiled unit: a variadic function closed over `_ENV`.
#[derive(Debug, Clone)]
pub struct ChunkStatement {
    pub name: Arc<str>,
    pub body: CompositeStatement,
    pub frame: RuntimeScopeFrame,
    pub varargs: SymbolRef,
    /// Slot range of the chunk's top-level block
    pub scope: RuntimeScopeBlock,
}

#[derive(Debug, Clone)]
pub enum AssignmentTarget {
    Symbol(SymbolRef),
    Index { object: Expression, key: Expression },
}

#[derive(Debug, Clone)]
pub struct AssignmentStatement {
    pub targets: Vec<AssignmentTarget>,
    pub values: Vec<Expression>,
    pub is_local: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct BreakStatement {
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EmptyStatement {
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ForNumStatement {
    pub variable: SymbolRef,
    pub start: Expression,
    pub end: Expression,
    pub step: Option<Expression>,
    pub scope: RuntimeScopeBlock,
    pub body: CompositeStatement,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ForEachStatement {
    pub names: Vec<SymbolRef>,
    pub values: Vec<Expression>,
    pub scope: RuntimeScopeBlock,
    pub body: CompositeStatement,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunctionCallStatement {
    pub call: FunctionCallExpression,
    pub span: Span,
}

/// Where a named function definition stores its closure.
#[derive(Debug, Clone)]
pub enum FunctionTarget {
    /// `local function name`
    Local(SymbolRef),
    /// `function name`
    Symbol(SymbolRef),
    /// `function base.a.b` or `function base.a:b`
    Field {
        base: SymbolRef,
        path: Vec<Arc<str>>,
        name: Arc<str>,
        is_method: bool,
    },
}

#[derive(Debug, Clone)]
pub struct FunctionDefinitionStatement {
    pub target: FunctionTarget,
    pub function: FunctionDefinitionExpression,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct GotoStatement {
    pub label: Arc<str>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IfBranch {
    pub condition: Expression,
    pub scope: RuntimeScopeBlock,
    pub body: CompositeStatement,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ElseBranch {
    pub scope: RuntimeScopeBlock,
    pub body: CompositeStatement,
}

#[derive(Debug, Clone)]
pub struct IfStatement {
    pub branches: Vec<IfBranch>,
    pub else_branch: Option<ElseBranch>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct LabelStatement {
    pub label: SymbolRef,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct RepeatStatement {
    pub body: CompositeStatement,
    pub condition: Expression,
    pub scope: RuntimeScopeBlock,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ReturnStatement {
    pub values: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ScopeBlockStatement {
    pub body: CompositeStatement,
    pub scope: RuntimeScopeBlock,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct WhileStatement {
    pub condition: Expression,
    pub body: CompositeStatement,
    pub scope: RuntimeScopeBlock,
    pub span: Span,
}
