//! The field expression algebra.
//!
//! A [`Field`] is a node in an immutable expression tree: the whole
//! record (`o`), an attribute or keyed access, a constant, a list, a
//! scalar or aggregate function call, an operator application, or an
//! alias. Trees are built through the fluent methods and operator
//! overloads in [`ops`], by the parser, or by hand, and are evaluated
//! per record ([`Field::eval`]) or per group ([`Field::eval_group`]).

mod ops;

pub use ops::{not, Op};

use std::fmt;

use crate::error::{Error, Result};
use crate::functions::{AggregateFn, ScalarFn};
use crate::record::Record;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Field {
    /// The whole input record, `o`.
    Identity,
    /// Named attribute access, `o.x`.
    Attr(String),
    /// Keyed access with a literal key, `o['x']` or `o[0]`.
    Key(Value),
    /// A literal value.
    Constant(Value),
    /// An ordered sequence of fields (projection lists, `IN` right-hand
    /// sides).
    List(Vec<Field>),
    /// A scalar function applied to per-record argument values.
    Call { func: ScalarFn, args: Vec<Field> },
    /// An aggregate function applied to per-argument columns collected
    /// across a group.
    Aggregate { func: AggregateFn, args: Vec<Field> },
    /// An operator application; unary `NOT`, binary everything else.
    Op { op: Op, args: Vec<Field> },
    /// A named subtree. Transparent for classification and equality; the
    /// name only matters for display and `RETURNING`.
    Alias { field: Box<Field>, name: String },
}

/// The identity field, `o`.
pub fn o() -> Field {
    Field::Identity
}

/// Attribute access, `o.<name>`.
pub fn attr(name: impl Into<String>) -> Field {
    Field::Attr(name.into())
}

/// Keyed access, `o[<key>]`.
pub fn key(k: impl Into<Value>) -> Field {
    Field::Key(k.into())
}

/// A constant field.
pub fn constant(v: impl Into<Value>) -> Field {
    Field::Constant(v.into())
}

/// A list field; non-field items become constants.
pub fn list<I, F>(items: I) -> Field
where
    I: IntoIterator<Item = F>,
    F: Into<Field>,
{
    Field::List(items.into_iter().map(Into::into).collect())
}

impl Field {
    /// Does this field evaluate per record?
    pub fn is_scalar(&self) -> bool {
        match self {
            Field::Identity | Field::Attr(_) | Field::Key(_) => true,
            Field::Constant(_) => true,
            Field::List(fields) => fields.iter().all(Field::is_scalar),
            Field::Call { args, .. } | Field::Op { args, .. } => {
                args.iter().all(Field::is_scalar)
            }
            Field::Aggregate { .. } => false,
            Field::Alias { field, .. } => field.is_scalar(),
        }
    }

    /// Does this field evaluate per group? Constants are both scalar and
    /// aggregate; a compound is aggregate when all of its children are,
    /// or when it is an aggregate call over scalar arguments.
    pub fn is_aggregate(&self) -> bool {
        match self {
            Field::Identity | Field::Attr(_) | Field::Key(_) => false,
            Field::Constant(_) => true,
            Field::List(fields) => fields.iter().all(Field::is_aggregate),
            Field::Call { args, .. } | Field::Op { args, .. } => {
                args.iter().all(Field::is_aggregate)
            }
            Field::Aggregate { args, .. } => args.iter().all(Field::is_scalar),
            Field::Alias { field, .. } => field.is_aggregate(),
        }
    }

    fn unalias(&self) -> &Field {
        let mut f = self;
        while let Field::Alias { field, .. } = f {
            f = field;
        }
        f
    }

    /// Structural equality: same variant and recursively equal semantic
    /// fields, with aliases unwrapped on both sides. Function calls
    /// compare registry handle identity, not name.
    pub fn structural_eq(&self, other: &Field) -> bool {
        fn all_eq(a: &[Field], b: &[Field]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structural_eq(y))
        }
        match (self.unalias(), other.unalias()) {
            (Field::Identity, Field::Identity) => true,
            (Field::Attr(a), Field::Attr(b)) => a == b,
            (Field::Key(a), Field::Key(b)) => a == b,
            (Field::Constant(a), Field::Constant(b)) => a == b,
            (Field::List(a), Field::List(b)) => all_eq(a, b),
            (
                Field::Call { func: f1, args: a1 },
                Field::Call { func: f2, args: a2 },
            ) => f1.same(f2) && all_eq(a1, a2),
            (
                Field::Aggregate { func: f1, args: a1 },
                Field::Aggregate { func: f2, args: a2 },
            ) => f1.same(f2) && all_eq(a1, a2),
            (Field::Op { op: o1, args: a1 }, Field::Op { op: o2, args: a2 }) => {
                o1 == o2 && all_eq(a1, a2)
            }
            _ => false,
        }
    }

    /// The name a `RETURNING` shape sees for this field: the attribute or
    /// key itself, the alias name, or the printed form for compounds.
    pub fn display_name(&self) -> String {
        match self {
            Field::Identity => "o".to_string(),
            Field::Attr(name) => name.clone(),
            Field::Key(k) => k.to_string(),
            Field::Constant(v) => v.to_string(),
            Field::List(fields) => {
                let names: Vec<String> = fields.iter().map(Field::display_name).collect();
                names.join(",")
            }
            Field::Alias { name, .. } => name.clone(),
            _ => self.to_string(),
        }
    }

    /// Wrap in an alias.
    ///
    /// # Panics
    ///
    /// If `name` is not a valid identifier (`[A-Za-z_][A-Za-z0-9_]*`).
    pub fn alias(self, name: impl Into<String>) -> Field {
        let name = name.into();
        assert!(
            is_identifier(&name),
            "alias {name:?} is not a valid identifier"
        );
        Field::Alias {
            field: Box::new(self),
            name,
        }
    }

    /// Evaluate against a single record.
    pub fn eval<R: Record + ?Sized>(&self, record: &R) -> Result<Value> {
        match self {
            Field::Identity => Ok(record.to_value()),
            Field::Attr(name) => record.attr(name),
            Field::Key(k) => record.key(k),
            Field::Constant(v) => Ok(v.clone()),
            Field::List(fields) => fields
                .iter()
                .map(|f| f.eval(record))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Field::Call { func, args } => {
                let values = args
                    .iter()
                    .map(|a| a.eval(record))
                    .collect::<Result<Vec<_>>>()?;
                func.invoke(&values)
            }
            Field::Aggregate { func, .. } => Err(Error::Evaluation(format!(
                "aggregate function {} used in a per-record context",
                func.name()
            ))),
            Field::Op { op, args } => op.eval(args, record),
            Field::Alias { field, .. } => field.eval(record),
        }
    }

    /// Evaluate against a group of records. Aggregate calls evaluate each
    /// argument scalarly across the group into one column per argument;
    /// scalar compounds over aggregate children evaluate the children
    /// per group, then apply.
    pub fn eval_group<R: Record>(&self, records: &[R]) -> Result<Value> {
        match self {
            Field::Constant(v) => Ok(v.clone()),
            Field::List(fields) => fields
                .iter()
                .map(|f| f.eval_group(records))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Field::Aggregate { func, args } => {
                let columns = args
                    .iter()
                    .map(|arg| {
                        records
                            .iter()
                            .map(|r| arg.eval(r))
                            .collect::<Result<Vec<_>>>()
                    })
                    .collect::<Result<Vec<_>>>()?;
                func.invoke(&columns)
            }
            Field::Call { func, args } => {
                let values = args
                    .iter()
                    .map(|a| a.eval_group(records))
                    .collect::<Result<Vec<_>>>()?;
                func.invoke(&values)
            }
            Field::Op { op, args } => {
                let values = args
                    .iter()
                    .map(|a| a.eval_group(records))
                    .collect::<Result<Vec<_>>>()?;
                op.apply(&values)
            }
            Field::Alias { field, .. } => field.eval_group(records),
            Field::Identity | Field::Attr(_) | Field::Key(_) => {
                Err(Error::Evaluation(format!(
                    "{self} evaluates per record, not per group"
                )))
            }
        }
    }
}

/// Structural equality; see [`Field::structural_eq`].
impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.structural_eq(other)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Query-text form of a field sequence. A single field keeps a trailing
/// comma so the list form survives reparsing.
pub(crate) fn fields_text(fields: &[Field]) -> String {
    match fields {
        [] => "()".to_string(),
        [field] => format!("{field},"),
        _ => {
            let parts: Vec<String> = fields.iter().map(ToString::to_string).collect();
            parts.join(", ")
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Identity => write!(f, "o"),
            Field::Attr(name) => write!(f, "o.{name}"),
            Field::Key(k) => write!(f, "o[{}]", k.repr()),
            Field::Constant(v) => write!(f, "{}", v.repr()),
            Field::List(fields) => write!(f, "{}", fields_text(fields)),
            Field::Call { func, args } => {
                let parts: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{}({})", func.name(), parts.join(", "))
            }
            Field::Aggregate { func, args } => {
                let parts: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{}({})", func.name(), parts.join(", "))
            }
            Field::Op { op, args } => {
                if op.is_unary() {
                    write!(f, "{} {}", op.symbol(), args[0])
                } else {
                    write!(f, "({} {} {})", args[0], op.symbol(), args[1])
                }
            }
            Field::Alias { field, name } => write!(f, "{field} AS {name}"),
        }
    }
}

impl From<Value> for Field {
    fn from(v: Value) -> Self {
        Field::Constant(v)
    }
}

impl From<bool> for Field {
    fn from(v: bool) -> Self {
        constant(v)
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        constant(v)
    }
}

impl From<i64> for Field {
    fn from(v: i64) -> Self {
        constant(v)
    }
}

impl From<f64> for Field {
    fn from(v: f64) -> Self {
        constant(v)
    }
}

impl From<&str> for Field {
    fn from(v: &str) -> Self {
        constant(v)
    }
}

impl From<String> for Field {
    fn from(v: String) -> Self {
        constant(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions;

    #[test]
    fn classification_of_leaves() {
        assert!(o().is_scalar() && !o().is_aggregate());
        assert!(attr("x").is_scalar() && !attr("x").is_aggregate());
        // Constants are both.
        assert!(constant(1).is_scalar() && constant(1).is_aggregate());
    }

    #[test]
    fn classification_of_compounds() {
        let sum = functions::call("sum", [attr("x")]).unwrap();
        assert!(!sum.is_scalar());
        assert!(sum.is_aggregate());

        // Scalar function over aggregate children is aggregate.
        let rounded = functions::call("round", [sum.clone(), constant(2)]).unwrap();
        assert!(!rounded.is_scalar());
        assert!(rounded.is_aggregate());

        // Aggregate over aggregate is neither.
        let nested = functions::call("sum", [sum]).unwrap();
        assert!(!nested.is_scalar());
        assert!(!nested.is_aggregate());

        let cmp = attr("x").gt(constant(3));
        assert!(cmp.is_scalar());
        assert!(!cmp.is_aggregate());
    }

    #[test]
    fn alias_is_transparent() {
        let plain = attr("x");
        let aliased = attr("x").alias("renamed");
        assert_eq!(plain.is_scalar(), aliased.is_scalar());
        assert_eq!(plain.is_aggregate(), aliased.is_aggregate());
        assert!(plain.structural_eq(&aliased));
        assert!(aliased.structural_eq(&plain));
        assert_eq!(aliased.display_name(), "renamed");
        assert_eq!(plain.display_name(), "x");
    }

    #[test]
    #[should_panic(expected = "not a valid identifier")]
    fn alias_rejects_invalid_identifiers() {
        attr("x").alias("not an ident");
    }

    #[test]
    fn structural_equality_compares_function_identity() {
        let a = functions::call("sum", [attr("x")]).unwrap();
        let b = functions::call("sum", [attr("x")]).unwrap();
        let c = functions::call("count", [attr("x")]).unwrap();
        assert!(a.structural_eq(&b));
        assert!(!a.structural_eq(&c));
        assert!(!a.structural_eq(&functions::call("sum", [attr("y")]).unwrap()));
    }

    #[test]
    fn rendering() {
        assert_eq!(o().to_string(), "o");
        assert_eq!(attr("x").to_string(), "o.x");
        assert_eq!(key("x").to_string(), "o['x']");
        assert_eq!(key(0).to_string(), "o[0]");
        assert_eq!(constant("foo").to_string(), "'foo'");
        assert_eq!(
            attr("x").eq(constant(0)).to_string(),
            "(o.x == 0)"
        );
        assert_eq!(
            ops::not(attr("x").eq(constant(0))).to_string(),
            "NOT (o.x == 0)"
        );
        assert_eq!(
            attr("x").alias("foo").to_string(),
            "o.x AS foo"
        );
        assert_eq!(
            functions::call("add", [attr("x"), attr("y")]).unwrap().to_string(),
            "add(o.x, o.y)"
        );
    }

    #[test]
    fn display_name_of_compounds_is_printed_form() {
        let f = functions::call("sum", [attr("y")]).unwrap();
        assert_eq!(f.display_name(), "sum(o.y)");
        assert_eq!(key(0).display_name(), "0");
    }

    #[test]
    fn eval_basics() {
        let rec = Value::from(serde_json::json!({"x": 12, "y": 15}));
        assert_eq!(o().eval(&rec).unwrap(), rec);
        assert_eq!(attr("x").eval(&rec).unwrap(), Value::Int(12));
        assert_eq!(key("y").eval(&rec).unwrap(), Value::Int(15));
        assert_eq!(constant(7).eval(&rec).unwrap(), Value::Int(7));
        let sum = (attr("x") + attr("y")).eval(&rec).unwrap();
        assert_eq!(sum, Value::Int(27));
    }

    #[test]
    fn eval_group_collects_columns() {
        let recs: Vec<Value> = [1, 2, 3, 4]
            .iter()
            .map(|&x| Value::from(serde_json::json!({"x": x})))
            .collect();
        let total = functions::call("sum", [attr("x")]).unwrap();
        assert_eq!(total.eval_group(&recs).unwrap(), Value::Int(10));

        // Scalar function over the aggregate result.
        let doubled = functions::call("mul", [total, constant(2)]).unwrap();
        assert_eq!(doubled.eval_group(&recs).unwrap(), Value::Int(20));
    }
}
