//! The textual query surface: `[SELECT] [DISTINCT] fields [WHERE expr]
//! [GROUP BY keys] [RETURNING name]`.
//!
//! The statement parser drives the query builder directly, so a textual
//! query goes through exactly the same validation as a programmatic one.

pub mod lexer;

mod expression;

use lexer::{tokenize, Token};

use crate::error::Result;
use crate::query::{select, Query};

use expression::{fexpr, fexpr_list, TokenStream};

/// Parse a textual statement into a [`Query`].
pub fn parse_statement(text: &str) -> Result<Query> {
    let mut p = TokenStream::new(tokenize(text)?);

    p.eat(&Token::Select);
    let distinct = p.eat(&Token::Distinct);

    let (fields, is_list) = fexpr_list(&mut p)?;
    let mut query = if is_list {
        select(fields)
    } else {
        // A lone projection expression flattens; `try_from` cannot fail
        // here, but spelling it out avoids indexing.
        match <[crate::field::Field; 1]>::try_from(fields) {
            Ok([field]) => select(field),
            Err(fields) => select(fields),
        }
    };
    if distinct {
        query = query.distinct();
    }

    if p.eat(&Token::Where) {
        query = query.where_(fexpr(&mut p)?)?;
    }
    if p.eat(&Token::Group) {
        p.expect(Token::By)?;
        let (keys, _) = fexpr_list(&mut p)?;
        query = query.group_by(keys)?;
    }
    if p.eat(&Token::Returning) {
        let name = p.expect_id()?;
        query = query.returning(&name)?;
    }

    if !p.at_end() {
        return Err(p.unexpected());
    }
    if log::log_enabled!(log::Level::Debug) {
        log::debug!("parsed: {}", query.to_string().replace('\n', " "));
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    /// Parse and render on one line, whitespace collapsed.
    fn p(text: &str) -> String {
        parse_statement(text)
            .unwrap()
            .to_string()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn projections() {
        assert_eq!(p("SELECT o.x"), "SELECT o.x");
        assert_eq!(p("SELECT o.x,"), "SELECT o.x,");
        assert_eq!(p("SELECT DISTINCT o,"), "SELECT DISTINCT o,");
        assert_eq!(p("SELECT o['x'], 'foo' AS bar"), "SELECT o['x'], 'foo' AS bar");
        assert_eq!(
            p("SELECT add(o.x, mul(o.y, o.z))"),
            "SELECT add(o.x, mul(o.y, o.z))"
        );
        assert_eq!(p("SELECT str()"), "SELECT str()");
    }

    #[test]
    fn clauses() {
        assert_eq!(
            p("SELECT o.x, sum(o.y)\nGROUP BY o.x"),
            "SELECT o.x, sum(o.y) GROUP BY o.x,"
        );
        assert_eq!(p("SELECT o.x WHERE o.x > 3"), "SELECT o.x WHERE (o.x > 3)");
        assert_eq!(
            p("select o['x'] as foo returning dict"),
            "SELECT o['x'] AS foo, RETURNING dict"
        );
    }

    #[test]
    fn in_lists() {
        assert_eq!(
            p("SELECT o.x WHERE o.x IN o.y, o.z"),
            "SELECT o.x WHERE (o.x IN o.y, o.z)"
        );
        assert_eq!(
            p("SELECT o.x WHERE NOT o.x IN o.y, o.z"),
            "SELECT o.x WHERE NOT (o.x IN o.y, o.z)"
        );
        // IN needs the list form on its right-hand side.
        assert!(parse_statement("SELECT o.x WHERE o.x IN o.y").is_err());
    }

    #[test]
    fn boolean_precedence() {
        assert_eq!(
            p("SELECT o.x WHERE NOT o.x == 0 AND o.y == 0"),
            "SELECT o.x WHERE (NOT (o.x == 0) AND (o.y == 0))"
        );
        assert_eq!(
            p("SELECT o.x WHERE NOT (o.x == 0 AND o.y == 0)"),
            "SELECT o.x WHERE NOT ((o.x == 0) AND (o.y == 0))"
        );
        assert_eq!(
            p("select o.x where o.x == 0 and o.y == 0 or o.a == 0 and o.b == 0"),
            "SELECT o.x WHERE (((o.x == 0) AND (o.y == 0)) OR ((o.a == 0) AND (o.b == 0)))"
        );
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(
            p("select o.x * o.y ** o.z where (o.x * o.y) > 5"),
            "SELECT (o.x * (o.y ** o.z)) WHERE ((o.x * o.y) > 5)"
        );
        // ** is right-associative.
        assert_eq!(p("select o.x ** o.y ** o.z"), "SELECT (o.x ** (o.y ** o.z))");
        assert_eq!(p("select o.x + o.y * o.z"), "SELECT (o.x + (o.y * o.z))");
        assert_eq!(p("select o.x - o.y - o.z"), "SELECT ((o.x - o.y) - o.z)");
    }

    #[test]
    fn word_comparisons() {
        assert_eq!(
            p("select o.s where o.s matches 'foo.*'"),
            "SELECT o.s WHERE (o.s MATCHES 'foo.*')"
        );
        assert_eq!(
            p("select o where o.s like 'f?o*'"),
            "SELECT o WHERE (o.s LIKE 'f?o*')"
        );
        assert_eq!(
            p("select o where o.xs contains 3"),
            "SELECT o WHERE (o.xs CONTAINS 3)"
        );
        assert_eq!(
            p("select o where o.x is none"),
            "SELECT o WHERE (o.x IS NONE)"
        );
    }

    #[test]
    fn keyed_access() {
        assert_eq!(p("SELECT o[0], o[1]"), "SELECT o[0], o[1]");
        assert_eq!(p("SELECT o['k']"), "SELECT o['k']");
    }

    #[test]
    fn parse_errors_carry_token_and_line() {
        match parse_statement("SELECT o.x WHERE\nWHERE").unwrap_err() {
            Error::Parse { token, line, .. } => {
                assert_eq!(token, "WHERE");
                assert_eq!(line, 2);
            }
            other => panic!("expected ParseError, got {other:?}"),
        }
        assert!(matches!(
            parse_statement("SELECT o.x WHERE"),
            Err(Error::Parse { token, .. }) if token == "EOF"
        ));
        assert!(matches!(
            parse_statement("SELECT nosuch(o.x)"),
            Err(Error::UnknownFunction(name)) if name == "nosuch"
        ));
        assert!(matches!(
            parse_statement("SELECT o.x RETURNING nosuch"),
            Err(Error::UnknownReturnType(name)) if name == "nosuch"
        ));
    }

    #[test]
    fn clause_validation_applies_to_text() {
        assert!(matches!(
            parse_statement("SELECT o.x WHERE sum(o.x)"),
            Err(Error::InvalidClause(_))
        ));
        assert!(matches!(
            parse_statement("SELECT o.y GROUP BY o.x"),
            Err(Error::UngroupedProjection(_))
        ));
    }
}
