//! Lexer for Lua source code.
//!
//! Names, keywords, numbers and operators are recognised by a logos-generated
//! automaton. Whitespace, comments and string literals (short strings with
//! escapes and long-bracket strings) are scanned by hand because their shape
//! depends on context logos cannot express.

use crate::parser::token::{Span, Token};
use logos::Logos;

/// Logos-based token enum for lexing.
///
/// Converted to the public [`Token`] after each match.
#[derive(Logos, Debug, Clone, PartialEq)]
enum LogosToken {
    #[token("and")]
    And,
    #[token("break")]
    Break,
    #[token("do")]
    Do,
    #[token("else")]
    Else,
    #[token("elseif")]
    ElseIf,
    #[token("end")]
    End,
    #[token("false")]
    False,
    #[token("for")]
    For,
    #[token("function")]
    Function,
    #[token("goto")]
    Goto,
    #[token("if")]
    If,
    #[token("in")]
    In,
    #[token("local")]
    Local,
    #[token("nil")]
    Nil,
    #[token("not")]
    Not,
    #[token("or")]
    Or,
    #[token("repeat")]
    Repeat,
    #[token("return")]
    Return,
    #[token("then")]
    Then,
    #[token("true")]
    True,
    #[token("until")]
    Until,
    #[token("while")]
    While,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Name(String),

    #[regex(r"0[xX][0-9a-fA-F]+", parse_hex)]
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", parse_decimal)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", parse_decimal)]
    Number(f64),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("#")]
    Hash,
    #[token("==")]
    EqualEqual,
    #[token("~=")]
    NotEqual,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("=")]
    Assign,
    #[token("..")]
    Concat,
    #[token("...")]
    Ellipsis,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("::")]
    DoubleColon,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
}

fn parse_hex(lex: &mut logos::Lexer<'_, LogosToken>) -> Option<f64> {
    let digits = &lex.slice()[2..];
    // Lua wraps hex integers modulo 2^64
    let mut value: u64 = 0;
    for c in digits.chars() {
        value = value.wrapping_mul(16).wrapping_add(c.to_digit(16)? as u64);
    }
    Some(value as i64 as f64)
}

fn parse_decimal(lex: &mut logos::Lexer<'_, LogosToken>) -> Option<f64> {
    lex.slice().parse::<f64>().ok()
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    UnexpectedCharacter { char: char, span: Span },
    UnterminatedString { span: Span },
    UnterminatedComment { span: Span },
    InvalidNumber { text: String, span: Span },
    InvalidEscape { escape: String, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedCharacter { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedComment { span }
            | LexError::InvalidNumber { span, .. }
            | LexError::InvalidEscape { span, .. } => *span,
        }
    }

    pub fn message(&self) -> String {
        match self {
            LexError::UnexpectedCharacter { char, .. } => {
                format!("unexpected symbol near '{}'", char)
            }
            LexError::UnterminatedString { .. } => "unfinished string".to_string(),
            LexError::UnterminatedComment { .. } => "unfinished long comment".to_string(),
            LexError::InvalidNumber { text, .. } => format!("malformed number near '{}'", text),
            LexError::InvalidEscape { escape, .. } => {
                format!("invalid escape sequence '{}'", escape)
            }
        }
    }
}

/// Lexer for Lua source.
pub struct Lexer<'a> {
    source: &'a str,
    tokens: Vec<(Token, Span)>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<(Token, Span)>, Vec<LexError>> {
        let bytes = self.source.as_bytes();
        let mut pos = 0;
        let mut line = 1u32;
        let mut column = 1u32;

        // A leading shebang line is ignored
        if self.source.starts_with("#!") {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
        }

        while pos < bytes.len() {
            match bytes[pos] {
                b' ' | b'\t' | b'\r' => {
                    pos += 1;
                    column += 1;
                    continue;
                }
                b'\n' => {
                    pos += 1;
                    line += 1;
                    column = 1;
                    continue;
                }
                b'-' if bytes.get(pos + 1) == Some(&b'-') => {
                    let start = Span::new(pos, pos + 2, line, column);
                    let body = pos + 2;
                    match long_bracket_level(&bytes[body..]) {
                        Some(level) => match find_long_bracket_end(self.source, body + level + 2, level) {
                            Some((_, end)) => {
                                advance_position(&self.source[pos..end], &mut line, &mut column);
                                pos = end;
                            }
                            None => {
                                self.errors.push(LexError::UnterminatedComment { span: start });
                                break;
                            }
                        },
                        None => {
                            let end = self.source[body..]
                                .find('\n')
                                .map(|i| body + i)
                                .unwrap_or(bytes.len());
                            advance_position(&self.source[pos..end], &mut line, &mut column);
                            pos = end;
                        }
                    }
                    continue;
                }
                b'"' | b'\'' => {
                    let span_start = (pos, line, column);
                    match read_short_string(self.source, pos) {
                        Ok((text, end)) => {
                            let span = Span::new(pos, end, span_start.1, span_start.2);
                            self.tokens.push((Token::String(text), span));
                            advance_position(&self.source[pos..end], &mut line, &mut column);
                            pos = end;
                        }
                        Err(StringError::Unterminated(end)) => {
                            let span = Span::new(pos, end, line, column);
                            self.errors.push(LexError::UnterminatedString { span });
                            advance_position(&self.source[pos..end], &mut line, &mut column);
                            pos = end;
                        }
                        Err(StringError::InvalidEscape(escape, at)) => {
                            let span = Span::new(at, at + escape.len(), line, column);
                            self.errors.push(LexError::InvalidEscape { escape, span });
                            // Resume after the closing quote on this line if there is one
                            let end = self.source[pos..]
                                .find('\n')
                                .map(|i| pos + i)
                                .unwrap_or(bytes.len());
                            advance_position(&self.source[pos..end], &mut line, &mut column);
                            pos = end;
                        }
                    }
                    continue;
                }
                b'[' => {
                    if let Some(level) = long_bracket_level(&bytes[pos..]) {
                        let content_start = pos + level + 2;
                        match find_long_bracket_end(self.source, content_start, level) {
                            Some((content_end, end)) => {
                                let mut text = &self.source[content_start..content_end];
                                // A newline right after the opening bracket is skipped
                                if let Some(rest) = text.strip_prefix("\r\n") {
                                    text = rest;
                                } else if let Some(rest) = text.strip_prefix('\n') {
                                    text = rest;
                                }
                                let span = Span::new(pos, end, line, column);
                                self.tokens.push((Token::String(text.to_string()), span));
                                advance_position(&self.source[pos..end], &mut line, &mut column);
                                pos = end;
                            }
                            None => {
                                let span = Span::new(pos, bytes.len(), line, column);
                                self.errors.push(LexError::UnterminatedString { span });
                                break;
                            }
                        }
                        continue;
                    }
                }
                _ => {}
            }

            // Use logos for regular tokens
            let mut logos_lexer = LogosToken::lexer(&self.source[pos..]);
            let Some(token_result) = logos_lexer.next() else {
                break;
            };
            let range = logos_lexer.span();
            let abs_start = pos + range.start;
            let abs_end = pos + range.end;
            let span = Span::new(abs_start, abs_end, line, column);

            match token_result {
                Ok(LogosToken::Number(n)) => {
                    // A number glued to a name is malformed (e.g. `3x`)
                    let next = bytes.get(abs_end).copied();
                    if matches!(next, Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
                        let mut end = abs_end;
                        while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                            end += 1;
                        }
                        self.errors.push(LexError::InvalidNumber {
                            text: self.source[abs_start..end].to_string(),
                            span: Span::new(abs_start, end, line, column),
                        });
                        column += (end - abs_start) as u32;
                        pos = end;
                        continue;
                    }
                    self.tokens.push((Token::Number(n), span));
                }
                Ok(logos_token) => {
                    self.tokens.push((convert_token(logos_token), span));
                }
                Err(_) => {
                    let text = &self.source[abs_start..abs_end];
                    if text.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
                        self.errors.push(LexError::InvalidNumber {
                            text: text.to_string(),
                            span,
                        });
                    } else {
                        let char = self.source[abs_start..].chars().next().unwrap_or('\0');
                        self.errors.push(LexError::UnexpectedCharacter { char, span });
                    }
                }
            }

            advance_position(&self.source[abs_start..abs_end], &mut line, &mut column);
            pos = abs_end.max(pos + 1);
        }

        // Add EOF token
        let eof_span = Span::new(self.source.len(), self.source.len(), line, column);
        self.tokens.push((Token::Eof, eof_span));

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }
}

fn convert_token(token: LogosToken) -> Token {
    match token {
        LogosToken::And => Token::And,
        LogosToken::Break => Token::Break,
        LogosToken::Do => Token::Do,
        LogosToken::Else => Token::Else,
        LogosToken::ElseIf => Token::ElseIf,
        LogosToken::End => Token::End,
        LogosToken::False => Token::False,
        LogosToken::For => Token::For,
        LogosToken::Function => Token::Function,
        LogosToken::Goto => Token::Goto,
        LogosToken::If => Token::If,
        LogosToken::In => Token::In,
        LogosToken::Local => Token::Local,
        LogosToken::Nil => Token::Nil,
        LogosToken::Not => Token::Not,
        LogosToken::Or => Token::Or,
        LogosToken::Repeat => Token::Repeat,
        LogosToken::Return => Token::Return,
        LogosToken::Then => Token::Then,
        LogosToken::True => Token::True,
        LogosToken::Until => Token::Until,
        LogosToken::While => Token::While,
        LogosToken::Name(name) => Token::Name(name),
        LogosToken::Number(n) => Token::Number(n),
        LogosToken::Plus => Token::Plus,
        LogosToken::Minus => Token::Minus,
        LogosToken::Star => Token::Star,
        LogosToken::Slash => Token::Slash,
        LogosToken::Percent => Token::Percent,
        LogosToken::Caret => Token::Caret,
        LogosToken::Hash => Token::Hash,
        LogosToken::EqualEqual => Token::EqualEqual,
        LogosToken::NotEqual => Token::NotEqual,
        LogosToken::LessEqual => Token::LessEqual,
        LogosToken::GreaterEqual => Token::GreaterEqual,
        LogosToken::Less => Token::Less,
        LogosToken::Greater => Token::Greater,
        LogosToken::Assign => Token::Assign,
        LogosToken::Concat => Token::Concat,
        LogosToken::Ellipsis => Token::Ellipsis,
        LogosToken::LeftParen => Token::LeftParen,
        LogosToken::RightParen => Token::RightParen,
        LogosToken::LeftBrace => Token::LeftBrace,
        LogosToken::RightBrace => Token::RightBrace,
        LogosToken::LeftBracket => Token::LeftBracket,
        LogosToken::RightBracket => Token::RightBracket,
        LogosToken::DoubleColon => Token::DoubleColon,
        LogosToken::Semicolon => Token::Semicolon,
        LogosToken::Colon => Token::Colon,
        LogosToken::Comma => Token::Comma,
        LogosToken::Dot => Token::Dot,
    }
}

fn advance_position(text: &str, line: &mut u32, column: &mut u32) {
    for c in text.chars() {
        if c == '\n' {
            *line += 1;
            *column = 1;
        } else {
            *column += 1;
        }
    }
}

/// Level of a long bracket opening at the start of `bytes` (`[[` is 0, `[==[` is 2).
fn long_bracket_level(bytes: &[u8]) -> Option<usize> {
    if bytes.first() != Some(&b'[') {
        return None;
    }
    let level = bytes[1..].iter().take_while(|&&b| b == b'=').count();
    (bytes.get(level + 1) == Some(&b'[')).then_some(level)
}

/// Returns (content end, position after the closing bracket).
fn find_long_bracket_end(source: &str, content_start: usize, level: usize) -> Option<(usize, usize)> {
    let closing = format!("]{}]", "=".repeat(level));
    source
        .get(content_start..)?
        .find(&closing)
        .map(|i| (content_start + i, content_start + i + closing.len()))
}

enum StringError {
    Unterminated(usize),
    InvalidEscape(String, usize),
}

fn read_short_string(source: &str, start: usize) -> Result<(String, usize), StringError> {
    let quote = source.as_bytes()[start] as char;
    let body = start + 1;
    let mut out = String::new();
    let mut chars = source[body..].char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let at = body + i;
        match c {
            c if c == quote => return Ok((out, at + 1)),
            '\n' => return Err(StringError::Unterminated(at)),
            '\\' => {
                let Some((_, escape)) = chars.next() else {
                    return Err(StringError::Unterminated(source.len()));
                };
                match escape {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'a' => out.push('\u{07}'),
                    'b' => out.push('\u{08}'),
                    'f' => out.push('\u{0C}'),
                    'v' => out.push('\u{0B}'),
                    '\\' => out.push('\\'),
                    '"' => out.push('"'),
                    '\'' => out.push('\''),
                    '\n' => out.push('\n'),
                    'z' => {
                        while let Some(&(_, w)) = chars.peek() {
                            if !w.is_whitespace() {
                                break;
                            }
                            chars.next();
                        }
                    }
                    'x' => {
                        let mut value = 0u32;
                        for _ in 0..2 {
                            match chars.next().and_then(|(_, h)| h.to_digit(16)) {
                                Some(d) => value = value * 16 + d,
                                None => return Err(StringError::InvalidEscape("\\x".into(), at)),
                            }
                        }
                        out.push(char::from(value as u8));
                    }
                    'u' => {
                        if !matches!(chars.next(), Some((_, '{'))) {
                            return Err(StringError::InvalidEscape("\\u".into(), at));
                        }
                        let mut value = 0u32;
                        loop {
                            match chars.next() {
                                Some((_, '}')) => break,
                                Some((_, h)) if h.is_ascii_hexdigit() => {
                                    value = value.saturating_mul(16).saturating_add(h.to_digit(16).unwrap_or(0));
                                }
                                _ => return Err(StringError::InvalidEscape("\\u".into(), at)),
                            }
                        }
                        match char::from_u32(value) {
                            Some(ch) => out.push(ch),
                            None => return Err(StringError::InvalidEscape(format!("\\u{{{:x}}}", value), at)),
                        }
                    }
                    d if d.is_ascii_digit() => {
                        let mut value = d.to_digit(10).unwrap_or(0);
                        for _ in 0..2 {
                            match chars.peek() {
                                Some(&(_, n)) if n.is_ascii_digit() => {
                                    value = value * 10 + n.to_digit(10).unwrap_or(0);
                                    chars.next();
                                }
                                _ => break,
                            }
                        }
                        if value > 255 {
                            return Err(StringError::InvalidEscape(format!("\\{}", value), at));
                        }
                        out.push(char::from(value as u8));
                    }
                    other => return Err(StringError::InvalidEscape(format!("\\{}", other), at)),
                }
            }
            c => out.push(c),
        }
    }

    Err(StringError::Unterminated(source.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .expect("lex ok")
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_keywords_and_names() {
        assert_eq!(
            lex("local x = nil"),
            vec![
                Token::Local,
                Token::Name("x".into()),
                Token::Assign,
                Token::Nil,
                Token::Eof
            ]
        );
        assert_eq!(lex("ends")[0], Token::Name("ends".into()));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex("3 3.5 .5 1e3 0xff")[..5].to_vec(), vec![
            Token::Number(3.0),
            Token::Number(3.5),
            Token::Number(0.5),
            Token::Number(1000.0),
            Token::Number(255.0),
        ]);
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(lex(r#""a\tb""#)[0], Token::String("a\tb".into()));
        assert_eq!(lex(r"'\65\x42'")[0], Token::String("AB".into()));
        assert_eq!(lex("[[\nline]]")[0], Token::String("line".into()));
        assert_eq!(lex("[==[a]]b]==]")[0], Token::String("a]]b".into()));
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = lex("-- line\nx --[[ block\n comment ]] y");
        assert_eq!(
            tokens,
            vec![Token::Name("x".into()), Token::Name("y".into()), Token::Eof]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex("a .. b ... ~= :: <=")[..7].to_vec(),
            vec![
                Token::Name("a".into()),
                Token::Concat,
                Token::Name("b".into()),
                Token::Ellipsis,
                Token::NotEqual,
                Token::DoubleColon,
                Token::LessEqual,
            ]
        );
    }

    #[test]
    fn test_line_tracking() {
        let tokens = Lexer::new("a\n  b").tokenize().expect("lex ok");
        assert_eq!(tokens[1].1.line, 2);
        assert_eq!(tokens[1].1.column, 3);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Lexer::new("'abc").tokenize().unwrap_err()[0],
            LexError::UnterminatedString { .. }
        ));
        assert!(matches!(
            Lexer::new("x = 3x").tokenize().unwrap_err()[0],
            LexError::InvalidNumber { .. }
        ));
        assert!(matches!(
            Lexer::new("x = $").tokenize().unwrap_err()[0],
            LexError::UnexpectedCharacter { char: '$', .. }
        ));
    }
}
