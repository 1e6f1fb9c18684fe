//! Recursive-descent expression parsing over the token stream, one
//! function per precedence tier:
//!
//! ```text
//! fexpr       : fexpr OR predterm | predterm
//! predterm    : predterm AND prednfactor | prednfactor
//! prednfactor : NOT prednfactor | predfactor
//! predfactor  : predfactor IN fexprs | predfactor COMPARE arithexpr | arithexpr
//! arithexpr   : arithexpr ('+'|'-') term | term
//! term        : term ('*'|'/'|'%') expnt | expnt
//! expnt       : field POW expnt | field
//! field       : literal | O | O '.' ID | O '[' literal ']'
//!             | ID '(' fexprstar ')' | '(' fexpr ')' | field AS ID
//! ```
//!
//! Left-recursive productions become accumulation loops; `**` is
//! right-recursive and stays so.

use super::lexer::{Cmp, Lexed, Token};
use crate::error::{Error, Result};
use crate::field::{not, Field};
use crate::functions;
use crate::value::Value;

pub(super) struct TokenStream {
    tokens: Vec<Lexed>,
    pos: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<Lexed>) -> Self {
        TokenStream { tokens, pos: 0 }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|l| &l.token)
    }

    pub fn bump(&mut self) -> Option<&Lexed> {
        let lexed = self.tokens.get(self.pos);
        if lexed.is_some() {
            self.pos += 1;
        }
        lexed
    }

    /// Consume the next token if it equals `token`.
    pub fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, token: Token) -> Result<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    pub fn expect_id(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::Id(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// A parse error describing the current token, or end of input.
    pub fn unexpected(&self) -> Error {
        match self.tokens.get(self.pos) {
            Some(lexed) => Error::Parse {
                token: lexed.token.kind().to_string(),
                value: lexed.token.text(),
                line: lexed.line,
            },
            None => Error::Parse {
                token: "EOF".to_string(),
                value: "end of input".to_string(),
                line: self.tokens.last().map_or(1, |l| l.line),
            },
        }
    }
}

/// Can this token begin an `fexpr`?
pub(super) fn starts_fexpr(token: Option<&Token>) -> bool {
    matches!(
        token,
        Some(
            Token::Str(_)
                | Token::Int(_)
                | Token::Float(_)
                | Token::True
                | Token::False
                | Token::None
                | Token::O
                | Token::Id(_)
                | Token::LParen
                | Token::Not
        )
    )
}

/// One or more comma-separated expressions with an optional trailing
/// comma. Returns the fields and whether the source used the list form
/// (any comma at all): `o.x` is a lone expression, `o.x,` is a
/// one-element list.
pub(super) fn fexpr_list(p: &mut TokenStream) -> Result<(Vec<Field>, bool)> {
    let mut fields = vec![fexpr(p)?];
    let mut saw_comma = false;
    while p.eat(&Token::Comma) {
        saw_comma = true;
        if !starts_fexpr(p.peek()) {
            break;
        }
        fields.push(fexpr(p)?);
    }
    Ok((fields, saw_comma))
}

/// The list-only form used by `IN`: requires a comma.
fn fexprs(p: &mut TokenStream) -> Result<Vec<Field>> {
    let (fields, is_list) = fexpr_list(p)?;
    if !is_list {
        return Err(p.unexpected());
    }
    Ok(fields)
}

/// Call arguments: possibly empty, trailing comma allowed.
fn fexprstar(p: &mut TokenStream) -> Result<Vec<Field>> {
    if matches!(p.peek(), Some(Token::RParen)) {
        return Ok(Vec::new());
    }
    fexpr_list(p).map(|(fields, _)| fields)
}

pub(super) fn fexpr(p: &mut TokenStream) -> Result<Field> {
    let mut expr = predterm(p)?;
    while p.eat(&Token::Or) {
        expr = expr.or(predterm(p)?);
    }
    Ok(expr)
}

fn predterm(p: &mut TokenStream) -> Result<Field> {
    let mut expr = prednfactor(p)?;
    while p.eat(&Token::And) {
        expr = expr.and(prednfactor(p)?);
    }
    Ok(expr)
}

fn prednfactor(p: &mut TokenStream) -> Result<Field> {
    if p.eat(&Token::Not) {
        Ok(not(prednfactor(p)?))
    } else {
        predfactor(p)
    }
}

fn predfactor(p: &mut TokenStream) -> Result<Field> {
    let mut expr = arithexpr(p)?;
    loop {
        if p.eat(&Token::In) {
            expr = expr.in_(fexprs(p)?);
        } else if let Some(Token::Compare(cmp)) = p.peek() {
            let cmp = *cmp;
            p.bump();
            let right = arithexpr(p)?;
            expr = match cmp {
                Cmp::Eq => expr.eq(right),
                Cmp::Ne => expr.ne(right),
                Cmp::Lt => expr.lt(right),
                Cmp::Le => expr.le(right),
                Cmp::Gt => expr.gt(right),
                Cmp::Ge => expr.ge(right),
                Cmp::Is => expr.is(right),
                Cmp::Contains => expr.contains(right),
                Cmp::Like => expr.like(right),
                Cmp::Matches => expr.matches(right),
            };
        } else {
            break;
        }
    }
    Ok(expr)
}

fn arithexpr(p: &mut TokenStream) -> Result<Field> {
    let mut expr = term(p)?;
    loop {
        if p.eat(&Token::Plus) {
            expr = expr + term(p)?;
        } else if p.eat(&Token::Minus) {
            expr = expr - term(p)?;
        } else {
            break;
        }
    }
    Ok(expr)
}

fn term(p: &mut TokenStream) -> Result<Field> {
    let mut expr = expnt(p)?;
    loop {
        if p.eat(&Token::Star) {
            expr = expr * expnt(p)?;
        } else if p.eat(&Token::Slash) {
            expr = expr / expnt(p)?;
        } else if p.eat(&Token::Percent) {
            expr = expr % expnt(p)?;
        } else {
            break;
        }
    }
    Ok(expr)
}

fn expnt(p: &mut TokenStream) -> Result<Field> {
    let base = field(p)?;
    if p.eat(&Token::Pow) {
        Ok(base.pow(expnt(p)?))
    } else {
        Ok(base)
    }
}

fn field(p: &mut TokenStream) -> Result<Field> {
    let mut expr = primary(p)?;
    while p.eat(&Token::As) {
        let name = p.expect_id()?;
        expr = expr.alias(name);
    }
    Ok(expr)
}

fn primary(p: &mut TokenStream) -> Result<Field> {
    match p.peek() {
        Some(
            Token::Str(_)
            | Token::Int(_)
            | Token::Float(_)
            | Token::True
            | Token::False
            | Token::None,
        ) => literal(p).map(Field::Constant),
        Some(Token::O) => {
            p.bump();
            if p.eat(&Token::Dot) {
                Ok(Field::Attr(p.expect_id()?))
            } else if p.eat(&Token::LBracket) {
                let key = literal(p)?;
                p.expect(Token::RBracket)?;
                Ok(Field::Key(key))
            } else {
                Ok(Field::Identity)
            }
        }
        Some(Token::Id(_)) => {
            let name = p.expect_id()?;
            p.expect(Token::LParen)?;
            let args = fexprstar(p)?;
            p.expect(Token::RParen)?;
            functions::call(&name, args)
        }
        Some(Token::LParen) => {
            p.bump();
            let expr = fexpr(p)?;
            p.expect(Token::RParen)?;
            Ok(expr)
        }
        _ => Err(p.unexpected()),
    }
}

fn literal(p: &mut TokenStream) -> Result<Value> {
    let value = match p.peek() {
        Some(Token::Str(s)) => Value::Str(s.clone()),
        Some(Token::Int(i)) => Value::Int(*i),
        Some(Token::Float(f)) => Value::Float(*f),
        Some(Token::True) => Value::Bool(true),
        Some(Token::False) => Value::Bool(false),
        Some(Token::None) => Value::Null,
        _ => return Err(p.unexpected()),
    };
    p.bump();
    Ok(value)
}
