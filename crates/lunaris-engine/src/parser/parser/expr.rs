//! Expression parsing

use std::sync::Arc;

use super::stmt::parse_block;
use super::Parser;
use crate::error::SyntaxError;
use crate::parser::ast::*;
use crate::parser::scope::VARARGS_NAME;
use crate::parser::token::{Span, Token};

/// Parse an expression.
pub fn parse_expression(parser: &mut Parser) -> Result<Expression, SyntaxError> {
    parse_subexpression(parser, 0)
}

/// Parse `exp {, exp}`.
pub fn parse_expression_list(parser: &mut Parser) -> Result<Vec<Expression>, SyntaxError> {
    let mut list = vec![parse_expression(parser)?];
    while parser.eat(&Token::Comma) {
        list.push(parse_expression(parser)?);
    }
    Ok(list)
}

/// Precedence climbing: consume binary operators binding tighter than `limit`.
fn parse_subexpression(parser: &mut Parser, limit: u8) -> Result<Expression, SyntaxError> {
    parser.enter()?;
    let result = parse_subexpression_inner(parser, limit);
    parser.leave();
    result
}

fn parse_subexpression_inner(parser: &mut Parser, limit: u8) -> Result<Expression, SyntaxError> {
    let mut left = match unary_operator(parser.current()) {
        Some(operator) => {
            let start = parser.current_span();
            parser.advance();
            let operand = parse_subexpression(parser, UNARY_PRECEDENCE)?;
            let span = start.merge(&operand.span());
            fold_unary(operator, operand, span)
        }
        None => parse_simple_expression(parser)?,
    };

    while let Some(operator) = binary_operator(parser.current()) {
        let (left_power, right_power) = operator.precedence();
        if left_power <= limit {
            break;
        }
        parser.advance();
        let right = parse_subexpression(parser, right_power)?;
        let span = left.span().merge(&right.span());
        left = Expression::Binary(BinaryOperatorExpression {
            operator,
            left: Box::new(left),
            right: Box::new(right),
            span,
        });
    }

    Ok(left)
}

fn unary_operator(token: &Token) -> Option<UnaryOperator> {
    match token {
        Token::Not => Some(UnaryOperator::Not),
        Token::Minus => Some(UnaryOperator::Negate),
        Token::Hash => Some(UnaryOperator::Length),
        _ => None,
    }
}

fn binary_operator(token: &Token) -> Option<BinaryOperator> {
    Some(match token {
        Token::Or => BinaryOperator::Or,
        Token::And => BinaryOperator::And,
        Token::Less => BinaryOperator::Less,
        Token::Greater => BinaryOperator::Greater,
        Token::LessEqual => BinaryOperator::LessEqual,
        Token::GreaterEqual => BinaryOperator::GreaterEqual,
        Token::NotEqual => BinaryOperator::NotEqual,
        Token::EqualEqual => BinaryOperator::Equal,
        Token::Concat => BinaryOperator::Concat,
        Token::Plus => BinaryOperator::Add,
        Token::Minus => BinaryOperator::Subtract,
        Token::Star => BinaryOperator::Multiply,
        Token::Slash => BinaryOperator::Divide,
        Token::Percent => BinaryOperator::Modulo,
        Token::Caret => BinaryOperator::Power,
        _ => return None,
    })
}

/// Negated numeric literals become constants.
fn fold_unary(operator: UnaryOperator, operand: Expression, span: Span) -> Expression {
    match (operator, operand) {
        (
            UnaryOperator::Negate,
            Expression::Literal(LiteralExpression {
                value: LiteralValue::Number(n),
                ..
            }),
        ) => Expression::Literal(LiteralExpression {
            value: LiteralValue::Number(-n),
            span,
        }),
        (operator, operand) => Expression::Unary(UnaryOperatorExpression {
            operator,
            operand: Box::new(operand),
            span,
        }),
    }
}

fn literal(value: LiteralValue, span: Span) -> Expression {
    Expression::Literal(LiteralExpression { value, span })
}

fn parse_simple_expression(parser: &mut Parser) -> Result<Expression, SyntaxError> {
    let span = parser.current_span();
    match parser.current().clone() {
        Token::Nil => {
            parser.advance();
            Ok(literal(LiteralValue::Nil, span))
        }
        Token::True => {
            parser.advance();
            Ok(literal(LiteralValue::Boolean(true), span))
        }
        Token::False => {
            parser.advance();
            Ok(literal(LiteralValue::Boolean(false), span))
        }
        Token::Number(n) => {
            parser.advance();
            Ok(literal(LiteralValue::Number(n), span))
        }
        Token::String(s) => {
            parser.advance();
            Ok(literal(LiteralValue::String(Arc::from(s.as_str())), span))
        }
        Token::Ellipsis => {
            parser.advance();
            match parser.scope.varargs() {
                Some(symbol) => Ok(Expression::Varargs(VarargsExpression { symbol, span })),
                None => Err(parser.error_at(
                    span,
                    format!("cannot use '{}' outside a vararg function", VARARGS_NAME),
                )),
            }
        }
        Token::LeftBrace => parse_table_constructor(parser),
        Token::Function => {
            parser.advance();
            let function = parse_function_body(parser, false, None, span)?;
            Ok(Expression::Function(Box::new(function)))
        }
        _ => parse_suffixed_expression(parser),
    }
}

fn parse_primary_expression(parser: &mut Parser) -> Result<Expression, SyntaxError> {
    let span = parser.current_span();
    match parser.current().clone() {
        Token::Name(name) => {
            parser.advance();
            let symbol = parser.scope.find(&name);
            Ok(Expression::Symbol(SymbolRefExpression { symbol, span }))
        }
        Token::LeftParen => {
            parser.advance();
            let inner = parse_expression(parser)?;
            let end = parser.expect_match(Token::RightParen, &Token::LeftParen, span)?;
            Ok(Expression::Adjusted(AdjustedExpression {
                inner: Box::new(inner),
                span: span.merge(&end),
            }))
        }
        _ => Err(parser.unexpected_token()),
    }
}

/// Primary expression followed by field accesses, indexing and calls.
pub fn parse_suffixed_expression(parser: &mut Parser) -> Result<Expression, SyntaxError> {
    let mut expression = parse_primary_expression(parser)?;

    loop {
        match parser.current().clone() {
            Token::Dot => {
                parser.advance();
                let (name, name_span) = parser.expect_name()?;
                let span = expression.span().merge(&name_span);
                expression = Expression::Index(IndexExpression {
                    object: Box::new(expression),
                    key: Box::new(literal(LiteralValue::String(Arc::from(name.as_str())), name_span)),
                    span,
                });
            }
            Token::LeftBracket => {
                let open = parser.current_span();
                parser.advance();
                let key = parse_expression(parser)?;
                let end = parser.expect_match(Token::RightBracket, &Token::LeftBracket, open)?;
                let span = expression.span().merge(&end);
                expression = Expression::Index(IndexExpression {
                    object: Box::new(expression),
                    key: Box::new(key),
                    span,
                });
            }
            Token::Colon => {
                parser.advance();
                let (name, _) = parser.expect_name()?;
                let arguments = parse_call_arguments(parser)?;
                let span = expression.span().merge(&parser.previous_span());
                expression = Expression::Call(FunctionCallExpression {
                    callee: Box::new(expression),
                    method: Some(Arc::from(name.as_str())),
                    arguments,
                    span,
                });
            }
            Token::LeftParen | Token::String(_) | Token::LeftBrace => {
                let arguments = parse_call_arguments(parser)?;
                let span = expression.span().merge(&parser.previous_span());
                expression = Expression::Call(FunctionCallExpression {
                    callee: Box::new(expression),
                    method: None,
                    arguments,
                    span,
                });
            }
            _ => return Ok(expression),
        }
    }
}

fn parse_call_arguments(parser: &mut Parser) -> Result<Vec<Expression>, SyntaxError> {
    let span = parser.current_span();
    match parser.current().clone() {
        Token::String(s) => {
            parser.advance();
            Ok(vec![literal(LiteralValue::String(Arc::from(s.as_str())), span)])
        }
        Token::LeftBrace => Ok(vec![parse_table_constructor(parser)?]),
        Token::LeftParen => {
            parser.advance();
            if parser.eat(&Token::RightParen) {
                return Ok(Vec::new());
            }
            let arguments = parse_expression_list(parser)?;
            parser.expect_match(Token::RightParen, &Token::LeftParen, span)?;
            Ok(arguments)
        }
        _ => Err(parser.expected("function arguments")),
    }
}

fn parse_table_constructor(parser: &mut Parser) -> Result<Expression, SyntaxError> {
    let start = parser.expect(Token::LeftBrace)?;
    let mut fields = Vec::new();

    while !parser.check(&Token::RightBrace) {
        let field = match parser.current().clone() {
            Token::LeftBracket => {
                let open = parser.current_span();
                parser.advance();
                let key = parse_expression(parser)?;
                parser.expect_match(Token::RightBracket, &Token::LeftBracket, open)?;
                parser.expect(Token::Assign)?;
                let value = parse_expression(parser)?;
                TableField::Keyed { key, value }
            }
            Token::Name(name) if parser.peek() == &Token::Assign => {
                let span = parser.current_span();
                parser.advance();
                parser.advance();
                let value = parse_expression(parser)?;
                TableField::Keyed {
                    key: literal(LiteralValue::String(Arc::from(name.as_str())), span),
                    value,
                }
            }
            _ => TableField::Positional(parse_expression(parser)?),
        };
        fields.push(field);

        if !parser.eat(&Token::Comma) && !parser.eat(&Token::Semicolon) {
            break;
        }
    }

    let end = parser.expect_match(Token::RightBrace, &Token::LeftBrace, start)?;
    Ok(Expression::Table(TableConstructorExpression {
        fields,
        span: start.merge(&end),
    }))
}

/// Parse `(params) block end` after the `function` keyword (and name, if any).
pub fn parse_function_body(
    parser: &mut Parser,
    is_method: bool,
    name: Option<Arc<str>>,
    start: Span,
) -> Result<FunctionDefinitionExpression, SyntaxError> {
    parser.scope.push_function();
    let mut parameters = Vec::new();
    if is_method {
        parameters.push(parser.scope.define_local("self"));
    }

    let open = parser.expect(Token::LeftParen)?;
    let mut varargs = None;
    if !parser.check(&Token::RightParen) {
        loop {
            match parser.current().clone() {
                Token::Ellipsis => {
                    parser.advance();
                    varargs = Some(parser.scope.define_local(VARARGS_NAME));
                    break;
                }
                Token::Name(param) => {
                    let span = parser.current_span();
                    parser.advance();
                    let symbol = parser
                        .scope
                        .try_define_local(&param)
                        .map_err(|msg| parser.error_at(span, msg))?;
                    parameters.push(symbol);
                }
                _ => return Err(parser.expected("<name>")),
            }
            if !parser.eat(&Token::Comma) {
                break;
            }
        }
    }
    parser.expect_match(Token::RightParen, &Token::LeftParen, open)?;

    let body = parse_block(parser)?;
    let end = parser.expect_match(Token::End, &Token::Function, start)?;
    let frame = parser.scope.pop_function();

    Ok(FunctionDefinitionExpression {
        parameters,
        varargs,
        body,
        frame,
        name,
        span: start.merge(&end),
    })
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse_chunk;

    fn return_expression(source: &str) -> Expression {
        let chunk = parse_chunk(&format!("return {}", source), "test").expect("parse ok");
        match chunk.body.statements.into_iter().next() {
            Some(Statement::Return(mut ret)) => ret.values.remove(0),
            other => panic!("expected return, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_mul_over_add() {
        let Expression::Binary(add) = return_expression("1 + 2 * 3") else {
            panic!("expected binary");
        };
        assert_eq!(add.operator, BinaryOperator::Add);
        assert!(matches!(*add.right, Expression::Binary(BinaryOperatorExpression { operator: BinaryOperator::Multiply, .. })));
    }

    #[test]
    fn test_concat_and_power_are_right_associative() {
        let Expression::Binary(concat) = return_expression("a .. b .. c") else {
            panic!("expected binary");
        };
        assert!(matches!(*concat.left, Expression::Symbol(_)));
        assert!(matches!(*concat.right, Expression::Binary(_)));

        let Expression::Binary(pow) = return_expression("2 ^ 3 ^ 2") else {
            panic!("expected binary");
        };
        assert!(matches!(*pow.right, Expression::Binary(_)));
    }

    #[test]
    fn test_unary_binds_looser_than_power() {
        let Expression::Unary(neg) = return_expression("-x ^ 2") else {
            panic!("expected unary");
        };
        assert_eq!(neg.operator, UnaryOperator::Negate);
        assert!(matches!(*neg.operand, Expression::Binary(_)));
    }

    #[test]
    fn test_negative_literal_is_folded() {
        assert!(matches!(
            return_expression("-5"),
            Expression::Literal(LiteralExpression { value: LiteralValue::Number(n), .. }) if n == -5.0
        ));
    }

    #[test]
    fn test_call_sugar() {
        let Expression::Call(call) = return_expression("obj:method 'x'") else {
            panic!("expected call");
        };
        assert_eq!(call.method.as_deref(), Some("method"));
        assert_eq!(call.arguments.len(), 1);
    }

    #[test]
    fn test_table_constructor_fields() {
        let Expression::Table(table) = return_expression("{1, x = 2, [3] = 4; 5}") else {
            panic!("expected table");
        };
        assert_eq!(table.fields.len(), 4);
        assert!(matches!(table.fields[1], TableField::Keyed { .. }));
        assert!(matches!(table.fields[3], TableField::Positional(_)));
    }

    #[test]
    fn test_parenthesized_call_is_adjusted() {
        assert!(matches!(return_expression("(f())"), Expression::Adjusted(_)));
    }
}
