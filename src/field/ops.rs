//! Operators and fluent field construction.
//!
//! `+ - * / %` come in through `std::ops` overloads and `NOT` through
//! `!`; comparisons and the word operators are methods, since Rust's
//! comparison traits must return `bool`. The right operand is coerced:
//! anything convertible to a [`Value`] becomes a constant field.

use std::ops;

use regex::Regex;

use crate::error::{Error, Result};
use crate::field::{list, Field};
use crate::record::Record;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Not,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Is,
    Contains,
    Like,
    Matches,
    In,
}

impl Op {
    pub fn symbol(&self) -> &'static str {
        match self {
            Op::Not => "NOT",
            Op::And => "AND",
            Op::Or => "OR",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Pow => "**",
            Op::Is => "IS",
            Op::Contains => "CONTAINS",
            Op::Like => "LIKE",
            Op::Matches => "MATCHES",
            Op::In => "IN",
        }
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, Op::Not)
    }

    /// Per-record evaluation. `AND`/`OR` short-circuit and return the
    /// deciding operand's value; everything else evaluates both sides.
    pub(crate) fn eval<R: Record + ?Sized>(&self, args: &[Field], record: &R) -> Result<Value> {
        match (self, args) {
            (Op::And, [left, right]) => {
                let l = left.eval(record)?;
                if l.truthy() {
                    right.eval(record)
                } else {
                    Ok(l)
                }
            }
            (Op::Or, [left, right]) => {
                let l = left.eval(record)?;
                if l.truthy() {
                    Ok(l)
                } else {
                    right.eval(record)
                }
            }
            _ => {
                let values = args
                    .iter()
                    .map(|a| a.eval(record))
                    .collect::<Result<Vec<_>>>()?;
                self.apply(&values)
            }
        }
    }

    /// Apply to already-evaluated operands.
    pub(crate) fn apply(&self, values: &[Value]) -> Result<Value> {
        match (self, values) {
            (Op::Not, [v]) => Ok(Value::Bool(!v.truthy())),
            (Op::And, [a, b]) => Ok(if a.truthy() { b.clone() } else { a.clone() }),
            (Op::Or, [a, b]) => Ok(if a.truthy() { a.clone() } else { b.clone() }),
            (Op::Eq, [a, b]) => Ok(Value::Bool(a == b)),
            (Op::Ne, [a, b]) => Ok(Value::Bool(a != b)),
            (Op::Lt, [a, b]) => Ok(Value::Bool(a.compare(b)?.is_lt())),
            (Op::Le, [a, b]) => Ok(Value::Bool(a.compare(b)?.is_le())),
            (Op::Gt, [a, b]) => Ok(Value::Bool(a.compare(b)?.is_gt())),
            (Op::Ge, [a, b]) => Ok(Value::Bool(a.compare(b)?.is_ge())),
            (Op::Add, [a, b]) => a.add(b),
            (Op::Sub, [a, b]) => a.sub(b),
            (Op::Mul, [a, b]) => a.mul(b),
            (Op::Div, [a, b]) => a.div(b),
            (Op::Mod, [a, b]) => a.rem(b),
            (Op::Pow, [a, b]) => a.pow(b),
            (Op::Is, [a, b]) => Ok(Value::Bool(a.strict_eq(b))),
            (Op::Contains, [a, b]) => a.contains(b).map(Value::Bool),
            (Op::In, [a, b]) => b.contains(a).map(Value::Bool),
            (Op::Like, [a, b]) => like(a, b),
            (Op::Matches, [a, b]) => matches(a, b),
            _ => Err(Error::Evaluation(format!(
                "operator {} applied to {} operand(s)",
                self.symbol(),
                values.len()
            ))),
        }
    }
}

/// Glob match: `*`, `?` and `[...]` wildcards, case-sensitive, matching
/// the whole string.
fn like(value: &Value, pattern: &Value) -> Result<Value> {
    let (s, pat) = str_operands("LIKE", value, pattern)?;
    let re = compile(&glob_to_regex(pat))?;
    Ok(Value::Bool(re.is_match(s)))
}

/// Regex match anchored at the start of the string.
fn matches(value: &Value, pattern: &Value) -> Result<Value> {
    let (s, pat) = str_operands("MATCHES", value, pattern)?;
    let re = compile(&format!("^(?:{pat})"))?;
    Ok(Value::Bool(re.is_match(s)))
}

fn str_operands<'a>(
    op: &str,
    value: &'a Value,
    pattern: &'a Value,
) -> Result<(&'a str, &'a str)> {
    match (value, pattern) {
        (Value::Str(s), Value::Str(p)) => Ok((s, p)),
        _ => Err(Error::Evaluation(format!(
            "{op} takes strings, got {} and {}",
            value.type_name(),
            pattern.type_name()
        ))),
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| Error::Evaluation(format!("invalid pattern: {e}")))
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    class.push(c);
                }
                if closed && !class.is_empty() {
                    out.push('[');
                    if let Some(rest) = class.strip_prefix('!') {
                        out.push('^');
                        out.push_str(&rest.replace('\\', "\\\\"));
                    } else {
                        out.push_str(&class.replace('\\', "\\\\"));
                    }
                    out.push(']');
                } else {
                    // Unclosed or empty class is a literal bracket.
                    out.push_str(&regex::escape("["));
                    out.push_str(&regex::escape(&class));
                    if closed {
                        out.push_str(&regex::escape("]"));
                    }
                }
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

/// Logical negation of a field.
pub fn not(field: impl Into<Field>) -> Field {
    Field::Op {
        op: Op::Not,
        args: vec![field.into()],
    }
}

impl Field {
    fn binop(self, op: Op, other: impl Into<Field>) -> Field {
        Field::Op {
            op,
            args: vec![self, other.into()],
        }
    }

    pub fn eq(self, other: impl Into<Field>) -> Field {
        self.binop(Op::Eq, other)
    }

    pub fn ne(self, other: impl Into<Field>) -> Field {
        self.binop(Op::Ne, other)
    }

    pub fn lt(self, other: impl Into<Field>) -> Field {
        self.binop(Op::Lt, other)
    }

    pub fn le(self, other: impl Into<Field>) -> Field {
        self.binop(Op::Le, other)
    }

    pub fn gt(self, other: impl Into<Field>) -> Field {
        self.binop(Op::Gt, other)
    }

    pub fn ge(self, other: impl Into<Field>) -> Field {
        self.binop(Op::Ge, other)
    }

    pub fn and(self, other: impl Into<Field>) -> Field {
        self.binop(Op::And, other)
    }

    pub fn or(self, other: impl Into<Field>) -> Field {
        self.binop(Op::Or, other)
    }

    pub fn is(self, other: impl Into<Field>) -> Field {
        self.binop(Op::Is, other)
    }

    pub fn contains(self, other: impl Into<Field>) -> Field {
        self.binop(Op::Contains, other)
    }

    pub fn like(self, other: impl Into<Field>) -> Field {
        self.binop(Op::Like, other)
    }

    pub fn matches(self, other: impl Into<Field>) -> Field {
        self.binop(Op::Matches, other)
    }

    pub fn pow(self, other: impl Into<Field>) -> Field {
        self.binop(Op::Pow, other)
    }

    /// Membership in a list of fields: `x.in_([a, b])` builds
    /// `x IN (a, b)`.
    pub fn in_<I, F>(self, others: I) -> Field
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.binop(Op::In, list(others))
    }
}

impl<T: Into<Field>> ops::Add<T> for Field {
    type Output = Field;

    fn add(self, other: T) -> Field {
        self.binop(Op::Add, other)
    }
}

impl<T: Into<Field>> ops::Sub<T> for Field {
    type Output = Field;

    fn sub(self, other: T) -> Field {
        self.binop(Op::Sub, other)
    }
}

impl<T: Into<Field>> ops::Mul<T> for Field {
    type Output = Field;

    fn mul(self, other: T) -> Field {
        self.binop(Op::Mul, other)
    }
}

impl<T: Into<Field>> ops::Div<T> for Field {
    type Output = Field;

    fn div(self, other: T) -> Field {
        self.binop(Op::Div, other)
    }
}

impl<T: Into<Field>> ops::Rem<T> for Field {
    type Output = Field;

    fn rem(self, other: T) -> Field {
        self.binop(Op::Mod, other)
    }
}

impl ops::Not for Field {
    type Output = Field;

    fn not(self) -> Field {
        not(self)
    }
}
