//! Single-pass tokenizer for the textual query surface.
//!
//! Whitespace is skipped and newlines advance a line counter carried on
//! every token. Numeric literals absorb a leading sign only when it sits
//! directly against the digits, so `o.x - 1` lexes as a subtraction while
//! `-1` on its own is a signed integer. Keywords and the word comparison
//! operators (`IS CONTAINS MATCHES LIKE`) are case-insensitive; `IN` is
//! in both sets and keyword recognition wins, so a `COMPARE` token never
//! carries `IN` — the grammar has a dedicated `IN` production instead.

use nom::{
    branch::alt,
    bytes::complete::{escaped, tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, none_of, one_of},
    combinator::{opt, recognize},
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Select,
    Distinct,
    Where,
    Group,
    By,
    As,
    Returning,
    And,
    Or,
    Not,
    True,
    False,
    None,
    O,
    In,
    Id(String),
    Str(String),
    Int(i64),
    Float(f64),
    Compare(Cmp),
    Pow,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

/// Comparison operators carried by `COMPARE` tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Is,
    Contains,
    Like,
    Matches,
}

impl Cmp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Cmp::Eq => "==",
            Cmp::Ne => "!=",
            Cmp::Lt => "<",
            Cmp::Le => "<=",
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
            Cmp::Is => "IS",
            Cmp::Contains => "CONTAINS",
            Cmp::Like => "LIKE",
            Cmp::Matches => "MATCHES",
        }
    }
}

impl Token {
    /// The token class name used in parse error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Token::Select => "SELECT",
            Token::Distinct => "DISTINCT",
            Token::Where => "WHERE",
            Token::Group => "GROUP",
            Token::By => "BY",
            Token::As => "AS",
            Token::Returning => "RETURNING",
            Token::And => "AND",
            Token::Or => "OR",
            Token::Not => "NOT",
            Token::True => "TRUE",
            Token::False => "FALSE",
            Token::None => "NONE",
            Token::O => "O",
            Token::In => "IN",
            Token::Id(_) => "ID",
            Token::Str(_) => "STR",
            Token::Int(_) => "INT",
            Token::Float(_) => "FLOAT",
            Token::Compare(_) => "COMPARE",
            Token::Pow => "POW",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
        }
    }

    /// The token's value for parse error messages.
    pub fn text(&self) -> String {
        match self {
            Token::Id(s) | Token::Str(s) => s.clone(),
            Token::Int(i) => i.to_string(),
            Token::Float(f) => format!("{f:?}"),
            Token::Compare(c) => c.symbol().to_string(),
            Token::Pow => "**".to_string(),
            other => other.kind().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lexed {
    pub token: Token,
    pub line: u32,
}

pub fn tokenize(input: &str) -> Result<Vec<Lexed>> {
    let mut out = Vec::new();
    let mut rest = input;
    let mut line: u32 = 1;
    while let Some(c) = rest.chars().next() {
        if c == ' ' || c == '\t' {
            rest = &rest[c.len_utf8()..];
        } else if c == '\n' {
            line += 1;
            rest = &rest[1..];
        } else if c == '\'' {
            let (next, text) = str_literal(rest).map_err(|_| lex_error(rest, line))?;
            let inner = &text[1..text.len() - 1];
            out.push(Lexed {
                token: Token::Str(unescape(inner)),
                line,
            });
            line += text.matches('\n').count() as u32;
            rest = next;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let (next, text) = identifier(rest).map_err(|_| lex_error(rest, line))?;
            out.push(Lexed {
                token: classify_word(text),
                line,
            });
            rest = next;
        } else if starts_number(rest) {
            let (next, token) = scan_number(rest, line)?;
            out.push(Lexed { token, line });
            rest = next;
        } else {
            let (token, len) = scan_operator(rest).ok_or_else(|| lex_error(rest, line))?;
            out.push(Lexed { token, line });
            rest = &rest[len..];
        }
    }
    Ok(out)
}

fn lex_error(rest: &str, line: u32) -> Error {
    let found: String = rest.chars().take(16).collect();
    Error::Lex { found, line }
}

fn classify_word(word: &str) -> Token {
    let upper = word.to_ascii_uppercase();
    match upper.as_str() {
        "SELECT" => Token::Select,
        "DISTINCT" => Token::Distinct,
        "WHERE" => Token::Where,
        "GROUP" => Token::Group,
        "BY" => Token::By,
        "AS" => Token::As,
        "RETURNING" => Token::Returning,
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        "TRUE" => Token::True,
        "FALSE" => Token::False,
        "NONE" => Token::None,
        "O" => Token::O,
        // IN is also a comparison identifier, but the keyword wins.
        "IN" => Token::In,
        "IS" => Token::Compare(Cmp::Is),
        "CONTAINS" => Token::Compare(Cmp::Contains),
        "MATCHES" => Token::Compare(Cmp::Matches),
        "LIKE" => Token::Compare(Cmp::Like),
        _ => Token::Id(word.to_string()),
    }
}

fn scan_operator(rest: &str) -> Option<(Token, usize)> {
    for (text, token) in [
        ("**", Token::Pow),
        (">=", Token::Compare(Cmp::Ge)),
        ("<=", Token::Compare(Cmp::Le)),
        ("==", Token::Compare(Cmp::Eq)),
        ("!=", Token::Compare(Cmp::Ne)),
    ] {
        if rest.starts_with(text) {
            return Some((token, text.len()));
        }
    }
    let token = match rest.chars().next()? {
        '>' => Token::Compare(Cmp::Gt),
        '<' => Token::Compare(Cmp::Lt),
        '(' => Token::LParen,
        ')' => Token::RParen,
        '[' => Token::LBracket,
        ']' => Token::RBracket,
        ',' => Token::Comma,
        '.' => Token::Dot,
        '+' => Token::Plus,
        '-' => Token::Minus,
        '*' => Token::Star,
        '/' => Token::Slash,
        '%' => Token::Percent,
        _ => return None,
    };
    Some((token, 1))
}

/// Does the input start a numeric literal? A sign counts only when the
/// digits (or a point-float) follow it directly.
fn starts_number(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => matches!(chars.next(), Some(d) if d.is_ascii_digit()),
        Some('+' | '-') => match chars.next() {
            Some(d) if d.is_ascii_digit() => true,
            Some('.') => matches!(chars.next(), Some(d) if d.is_ascii_digit()),
            _ => false,
        },
        _ => false,
    }
}

fn scan_number(rest: &str, line: u32) -> Result<(&str, Token)> {
    if let Ok((next, text)) = float_literal(rest) {
        let value: f64 = text.parse().map_err(|_| lex_error(rest, line))?;
        return Ok((next, Token::Float(value)));
    }
    let (next, text) = int_literal(rest).map_err(|_| lex_error(rest, line))?;
    Ok((next, Token::Int(int_value(text).ok_or_else(|| lex_error(rest, line))?)))
}

fn int_value(text: &str) -> Option<i64> {
    let (sign, body) = match text.strip_prefix('-') {
        Some(rest) => (-1i128, rest),
        None => (1i128, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) = match body.get(..2) {
        Some("0b" | "0B") => (2, &body[2..]),
        Some("0o" | "0O") => (8, &body[2..]),
        Some("0x" | "0X") => (16, &body[2..]),
        _ => (10, body),
    };
    let magnitude = i128::from_str_radix(digits, radix).ok()?;
    i64::try_from(sign * magnitude).ok()
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            // The string grammar only escapes backslash and quote.
            match chars.next() {
                Some(e) => out.push(e),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

// Token recognizers. The float grammar is
// `[+-]?((\d+|pointfloat)exponent|pointfloat)` with
// `pointfloat = (\d+)?\.\d+|\d+\.`; the alternatives are ordered so the
// combinators see the same strings the backtracking regex would.

fn str_literal(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('\''),
        opt(escaped(none_of("\\'"), '\\', one_of("'\\"))),
        char('\''),
    ))
    .parse(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn point_float(input: &str) -> IResult<&str, &str> {
    alt((
        recognize((opt(digit1), char('.'), digit1)),
        recognize(pair(digit1, char('.'))),
    ))
    .parse(input)
}

fn exponent(input: &str) -> IResult<&str, &str> {
    recognize((one_of("eE"), opt(one_of("+-")), digit1)).parse(input)
}

fn float_literal(input: &str) -> IResult<&str, &str> {
    recognize((
        opt(one_of("+-")),
        alt((
            recognize(pair(point_float, exponent)),
            recognize(pair(digit1, exponent)),
            point_float,
        )),
    ))
    .parse(input)
}

fn int_literal(input: &str) -> IResult<&str, &str> {
    recognize((
        opt(one_of("+-")),
        alt((
            recognize(pair(one_of("123456789"), digit0)),
            recognize(preceded(
                alt((tag("0b"), tag("0B"))),
                take_while1(|c| c == '0' || c == '1'),
            )),
            recognize(preceded(
                alt((tag("0o"), tag("0O"))),
                take_while1(|c: char| ('0'..='7').contains(&c)),
            )),
            recognize(preceded(
                alt((tag("0x"), tag("0X"))),
                take_while1(|c: char| c.is_ascii_hexdigit()),
            )),
            tag("0"),
        )),
    ))
    .parse(input)
}
