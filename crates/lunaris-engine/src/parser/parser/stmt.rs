//! Statement parsing

use std::sync::Arc;

use super::expr::{parse_expression, parse_expression_list, parse_function_body, parse_suffixed_expression};
use super::Parser;
use crate::error::SyntaxError;
use crate::parser::ast::*;
use crate::parser::token::{Span, Token};

/// Parse statements until a block terminator.
///
/// `return` is only accepted as the last statement of a block.
pub fn parse_block(parser: &mut Parser) -> Result<CompositeStatement, SyntaxError> {
    let start = parser.current_span();
    let mut statements = Vec::new();

    while !parser.current().is_block_end() {
        if parser.check(&Token::Return) {
            statements.push(parse_return_statement(parser)?);
            if !parser.current().is_block_end() {
                return Err(parser.expected("end"));
            }
            break;
        }
        statements.push(parse_statement(parser)?);
    }

    let span = statements
        .last()
        .map(|s| start.merge(&s.span()))
        .unwrap_or(start);
    Ok(CompositeStatement { statements, span })
}

/// Parse a statement.
pub fn parse_statement(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    parser.enter()?;
    let result = parse_statement_inner(parser);
    parser.leave();
    result
}

fn parse_statement_inner(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    match parser.current() {
        Token::Semicolon => {
            let span = parser.current_span();
            parser.advance();
            Ok(Statement::Empty(EmptyStatement { span }))
        }
        Token::If => parse_if_statement(parser),
        Token::While => parse_while_statement(parser),
        Token::Do => parse_do_statement(parser),
        Token::For => parse_for_statement(parser),
        Token::Repeat => parse_repeat_statement(parser),
        Token::Function => parse_function_statement(parser),
        Token::Local => {
            if parser.peek() == &Token::Function {
                parse_local_function(parser)
            } else {
                parse_local_assignment(parser)
            }
        }
        Token::DoubleColon => parse_label_statement(parser),
        Token::Break => parse_break_statement(parser),
        Token::Goto => parse_goto_statement(parser),
        _ => parse_expression_statement(parser),
    }
}

fn parse_if_statement(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    let start = parser.expect(Token::If)?;
    let mut branches = vec![parse_conditional_branch(parser, start)?];
    let mut else_branch = None;

    loop {
        match parser.current() {
            Token::ElseIf => {
                let span = parser.current_span();
                parser.advance();
                branches.push(parse_conditional_branch(parser, span)?);
            }
            Token::Else => {
                parser.advance();
                parser.scope.push_block();
                let body = parse_block(parser)?;
                let scope = parser.scope.pop_block();
                else_branch = Some(ElseBranch { scope, body });
                break;
            }
            _ => break,
        }
    }

    let end = parser.expect_match(Token::End, &Token::If, start)?;
    Ok(Statement::If(IfStatement {
        branches,
        else_branch,
        span: start.merge(&end),
    }))
}

fn parse_conditional_branch(parser: &mut Parser, start: Span) -> Result<IfBranch, SyntaxError> {
    let condition = parse_expression(parser)?;
    parser.expect(Token::Then)?;
    parser.scope.push_block();
    let body = parse_block(parser)?;
    let scope = parser.scope.pop_block();
    Ok(IfBranch {
        condition,
        scope,
        span: start.merge(&body.span),
        body,
    })
}

fn parse_while_statement(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    let start = parser.expect(Token::While)?;
    let condition = parse_expression(parser)?;
    parser.expect(Token::Do)?;
    parser.scope.push_loop_block();
    let body = parse_block(parser)?;
    let scope = parser.scope.pop_block();
    let end = parser.expect_match(Token::End, &Token::While, start)?;
    Ok(Statement::While(WhileStatement {
        condition,
        body,
        scope,
        span: start.merge(&end),
    }))
}

fn parse_do_statement(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    let start = parser.expect(Token::Do)?;
    parser.scope.push_block();
    let body = parse_block(parser)?;
    let scope = parser.scope.pop_block();
    let end = parser.expect_match(Token::End, &Token::Do, start)?;
    Ok(Statement::ScopeBlock(ScopeBlockStatement {
        body,
        scope,
        span: start.merge(&end),
    }))
}

fn parse_repeat_statement(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    let start = parser.expect(Token::Repeat)?;
    parser.scope.push_loop_block();
    let body = parse_block(parser)?;
    parser.expect_match(Token::Until, &Token::Repeat, start)?;
    // The condition sees the body's locals
    let condition = parse_expression(parser)?;
    let scope = parser.scope.pop_block();
    let span = start.merge(&condition.span());
    Ok(Statement::Repeat(RepeatStatement {
        body,
        condition,
        scope,
        span,
    }))
}

fn parse_for_statement(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    let start = parser.expect(Token::For)?;
    let (first, _) = parser.expect_name()?;

    match parser.current() {
        Token::Assign => parse_numeric_for(parser, start, first),
        Token::Comma | Token::In => parse_generic_for(parser, start, first),
        _ => Err(parser.expected("=' or 'in")),
    }
}

fn parse_numeric_for(parser: &mut Parser, start: Span, name: String) -> Result<Statement, SyntaxError> {
    parser.expect(Token::Assign)?;
    let from = parse_expression(parser)?;
    parser.expect(Token::Comma)?;
    let limit = parse_expression(parser)?;
    let step = if parser.eat(&Token::Comma) {
        let step = parse_expression(parser)?;
        if let Expression::Literal(LiteralExpression {
            value: LiteralValue::Number(n),
            span,
        }) = &step
        {
            if *n == 0.0 {
                return Err(parser.error_at(*span, "'for' step is zero"));
            }
        }
        Some(step)
    } else {
        None
    };
    parser.expect(Token::Do)?;

    parser.scope.push_loop_block();
    let variable = parser
        .scope
        .try_define_local(&name)
        .map_err(|msg| parser.error_at(start, msg))?;
    let body = parse_block(parser)?;
    let scope = parser.scope.pop_block();
    let end = parser.expect_match(Token::End, &Token::For, start)?;

    Ok(Statement::ForNum(ForNumStatement {
        variable,
        start: from,
        end: limit,
        step,
        scope,
        body,
        span: start.merge(&end),
    }))
}

fn parse_generic_for(parser: &mut Parser, start: Span, first: String) -> Result<Statement, SyntaxError> {
    let mut names = vec![first];
    while parser.eat(&Token::Comma) {
        names.push(parser.expect_name()?.0);
    }
    parser.expect(Token::In)?;
    let values = parse_expression_list(parser)?;
    parser.expect(Token::Do)?;

    parser.scope.push_loop_block();
    let mut symbols = Vec::with_capacity(names.len());
    for name in &names {
        let symbol = parser
            .scope
            .try_define_local(name)
            .map_err(|msg| parser.error_at(start, msg))?;
        symbols.push(symbol);
    }
    let body = parse_block(parser)?;
    let scope = parser.scope.pop_block();
    let end = parser.expect_match(Token::End, &Token::For, start)?;

    Ok(Statement::ForEach(ForEachStatement {
        names: symbols,
        values,
        scope,
        body,
        span: start.merge(&end),
    }))
}

fn parse_function_statement(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    let start = parser.expect(Token::Function)?;
    let (first, _) = parser.expect_name()?;
    let base = parser.scope.find(&first);

    let mut path: Vec<Arc<str>> = Vec::new();
    let mut full_name = first.clone();
    let mut is_method = false;
    while parser.eat(&Token::Dot) {
        let (part, _) = parser.expect_name()?;
        full_name.push('.');
        full_name.push_str(&part);
        path.push(Arc::from(part.as_str()));
    }
    if parser.eat(&Token::Colon) {
        let (part, _) = parser.expect_name()?;
        full_name.push(':');
        full_name.push_str(&part);
        path.push(Arc::from(part.as_str()));
        is_method = true;
    }

    let function = parse_function_body(parser, is_method, Some(Arc::from(full_name.as_str())), start)?;
    let target = match path.pop() {
        None => FunctionTarget::Symbol(base),
        Some(name) => FunctionTarget::Field {
            base,
            path,
            name,
            is_method,
        },
    };
    let span = start.merge(&function.span);
    Ok(Statement::FunctionDefinition(FunctionDefinitionStatement {
        target,
        function,
        span,
    }))
}

fn parse_local_function(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    let start = parser.expect(Token::Local)?;
    parser.expect(Token::Function)?;
    let (name, name_span) = parser.expect_name()?;
    // Declared before the body so the function can call itself
    let symbol = parser
        .scope
        .try_define_local(&name)
        .map_err(|msg| parser.error_at(name_span, msg))?;
    let function = parse_function_body(parser, false, Some(Arc::from(name.as_str())), start)?;
    let span = start.merge(&function.span);
    Ok(Statement::FunctionDefinition(FunctionDefinitionStatement {
        target: FunctionTarget::Local(symbol),
        function,
        span,
    }))
}

fn parse_local_assignment(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    let start = parser.expect(Token::Local)?;
    let mut names = vec![parser.expect_name()?];
    while parser.eat(&Token::Comma) {
        names.push(parser.expect_name()?);
    }

    let values = if parser.eat(&Token::Assign) {
        parse_expression_list(parser)?
    } else {
        Vec::new()
    };

    // Locals come into scope after their initializers
    let mut targets = Vec::with_capacity(names.len());
    for (name, span) in &names {
        let symbol = parser
            .scope
            .try_define_local(name)
            .map_err(|msg| parser.error_at(*span, msg))?;
        targets.push(AssignmentTarget::Symbol(symbol));
    }

    let end = values
        .last()
        .map(|v| v.span())
        .unwrap_or_else(|| names.last().map(|(_, s)| *s).unwrap_or(start));
    Ok(Statement::Assignment(AssignmentStatement {
        targets,
        values,
        is_local: true,
        span: start.merge(&end),
    }))
}

fn parse_label_statement(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    let start = parser.expect(Token::DoubleColon)?;
    let (name, _) = parser.expect_name()?;
    let end = parser.expect(Token::DoubleColon)?;
    let label = parser
        .scope
        .define_label(&name)
        .map_err(|msg| parser.error_at(start, msg))?;
    Ok(Statement::Label(LabelStatement {
        label,
        span: start.merge(&end),
    }))
}

fn parse_break_statement(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    let span = parser.expect(Token::Break)?;
    if !parser.scope.in_loop() {
        return Err(parser.error_at(span, format!("<break> at line {} not inside a loop", span.line)));
    }
    Ok(Statement::Break(BreakStatement { span }))
}

fn parse_goto_statement(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    let start = parser.expect(Token::Goto)?;
    let (label, end) = parser.expect_name()?;
    Ok(Statement::Goto(GotoStatement {
        label: Arc::from(label.as_str()),
        span: start.merge(&end),
    }))
}

fn parse_return_statement(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    let start = parser.expect(Token::Return)?;
    let values = if parser.current().is_block_end() || parser.check(&Token::Semicolon) {
        Vec::new()
    } else {
        parse_expression_list(parser)?
    };
    parser.eat(&Token::Semicolon);
    let span = values.last().map(|v| start.merge(&v.span())).unwrap_or(start);
    Ok(Statement::Return(ReturnStatement { values, span }))
}

/// A call statement or an assignment to one or more l-values.
fn parse_expression_statement(parser: &mut Parser) -> Result<Statement, SyntaxError> {
    let start = parser.current_span();
    let first = parse_suffixed_expression(parser)?;

    if parser.check(&Token::Assign) || parser.check(&Token::Comma) {
        let mut targets = vec![into_target(parser, first)?];
        while parser.eat(&Token::Comma) {
            let next = parse_suffixed_expression(parser)?;
            targets.push(into_target(parser, next)?);
        }
        parser.expect(Token::Assign)?;
        let values = parse_expression_list(parser)?;
        let span = values.last().map(|v| start.merge(&v.span())).unwrap_or(start);
        return Ok(Statement::Assignment(AssignmentStatement {
            targets,
            values,
            is_local: false,
            span,
        }));
    }

    match first {
        Expression::Call(call) => {
            let span = call.span;
            Ok(Statement::Call(FunctionCallStatement { call, span }))
        }
        _ => Err(parser.error(format!("syntax error near '{}'", parser.current()))),
    }
}

fn into_target(parser: &Parser, expression: Expression) -> Result<AssignmentTarget, SyntaxError> {
    match expression {
        Expression::Symbol(s) => Ok(AssignmentTarget::Symbol(s.symbol)),
        Expression::Index(i) => Ok(AssignmentTarget::Index {
            object: *i.object,
            key: *i.key,
        }),
        other => Err(parser.error_at(
            other.span(),
            format!("syntax error near '{}': expression is not assignable", parser.current()),
        )),
    }
}
