//! The value domain queries evaluate over.
//!
//! Records, group keys, projected rows and function results are all
//! [`Value`]s. Equality coerces across the numeric variants — `Int(1)`
//! equals `Float(1.0)`, and booleans count as the integers `0` and `1`,
//! so `Bool(true)` equals `Int(1)` — and hashing is consistent with
//! that, so rows can be deduplicated with a hash set. Only the `IS`
//! operator compares without coercion. Objects keep insertion order.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Insertion-ordered map. Keys are unique; the constructors below and
    /// the JSON bridge uphold that.
    Object(Vec<(String, Value)>),
}

impl Value {
    /// `Null`, `false`, zero and empty containers are falsy, everything
    /// else is truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(vs) => !vs.is_empty(),
            Value::Object(es) => !es.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Source-text form of the value: strings quoted and escaped, `TRUE`/
    /// `FALSE`/`NONE` keywords for booleans and null. What the renderer
    /// emits for constants, and what the parser reads back.
    pub fn repr(&self) -> String {
        match self {
            Value::Null => "NONE".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{f:?}"),
            Value::Str(s) => {
                let escaped = s.replace('\\', "\\\\").replace('\'', "\\'");
                format!("'{escaped}'")
            }
            Value::List(vs) => {
                let items: Vec<String> = vs.iter().map(Value::repr).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Object(es) => {
                let items: Vec<String> = es
                    .iter()
                    .map(|(k, v)| format!("'{}': {}", k, v.repr()))
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
        }
    }

    /// Strict same-variant equality, no numeric or boolean coercion.
    /// Backs the `IS` operator.
    pub fn strict_eq(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other) && self == other
    }

    /// Ordering for comparisons, `max`/`min` and friends. Numbers compare
    /// across `Int`/`Float`; strings, booleans and lists compare within
    /// their own kind; everything else is an error.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        other => return Ok(other),
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| {
                    Error::Evaluation("cannot compare with NaN".to_string())
                }),
                _ => Err(Error::Evaluation(format!(
                    "cannot compare {} with {}",
                    self.type_name(),
                    other.type_name()
                ))),
            },
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| Error::Evaluation("integer overflow in +".to_string())),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                let mut out = a.clone();
                out.extend(b.iter().cloned());
                Ok(Value::List(out))
            }
            _ => self.numeric_binop(other, "+", |a, b| a + b),
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_sub(*b)
                .map(Value::Int)
                .ok_or_else(|| Error::Evaluation("integer overflow in -".to_string())),
            _ => self.numeric_binop(other, "-", |a, b| a - b),
        }
    }

    pub fn mul(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_mul(*b)
                .map(Value::Int)
                .ok_or_else(|| Error::Evaluation("integer overflow in *".to_string())),
            _ => self.numeric_binop(other, "*", |a, b| a * b),
        }
    }

    /// Division always produces a float, even between integers.
    pub fn div(&self, other: &Value) -> Result<Value> {
        match (self.as_f64(), other.as_f64()) {
            (Some(_), Some(b)) if b == 0.0 => {
                Err(Error::Evaluation("division by zero".to_string()))
            }
            _ => self.numeric_binop(other, "/", |a, b| a / b),
        }
    }

    pub fn rem(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(_), Value::Int(0)) => {
                Err(Error::Evaluation("modulo by zero".to_string()))
            }
            (Value::Int(a), Value::Int(b)) => a
                .checked_rem(*b)
                .map(Value::Int)
                .ok_or_else(|| Error::Evaluation("integer overflow in %".to_string())),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(_), Some(b)) if b == 0.0 => {
                    Err(Error::Evaluation("modulo by zero".to_string()))
                }
                _ => self.numeric_binop(other, "%", |a, b| a % b),
            },
        }
    }

    /// Exponentiation stays integral for an integer base with a
    /// non-negative integer exponent, otherwise goes through floats.
    pub fn pow(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) if *b >= 0 => {
                let exp = u32::try_from(*b).map_err(|_| {
                    Error::Evaluation("integer overflow in **".to_string())
                })?;
                a.checked_pow(exp)
                    .map(Value::Int)
                    .ok_or_else(|| Error::Evaluation("integer overflow in **".to_string()))
            }
            _ => self.numeric_binop(other, "**", f64::powf),
        }
    }

    fn numeric_binop(
        &self,
        other: &Value,
        op: &str,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Value> {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(f(a, b))),
            _ => Err(Error::Evaluation(format!(
                "unsupported operand types for {}: {} and {}",
                op,
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Membership: is `item` contained in `self`? Strings test substrings,
    /// lists test elements, objects test keys.
    pub fn contains(&self, item: &Value) -> Result<bool> {
        match self {
            Value::Str(s) => match item {
                Value::Str(sub) => Ok(s.contains(sub.as_str())),
                _ => Err(Error::Evaluation(format!(
                    "cannot search for {} in str",
                    item.type_name()
                ))),
            },
            Value::List(vs) => Ok(vs.iter().any(|v| v == item)),
            Value::Object(es) => match item {
                Value::Str(k) => Ok(es.iter().any(|(ek, _)| ek == k)),
                _ => Err(Error::Evaluation(format!(
                    "cannot search for {} key in object",
                    item.type_name()
                ))),
            },
            _ => Err(Error::Evaluation(format!(
                "{} is not a container",
                self.type_name()
            ))),
        }
    }
}

fn float_eq(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn canonical_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => float_eq(*a, *b),
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                float_eq(*a as f64, *b)
            }
            // Booleans count as the integers 0 and 1.
            (Value::Bool(a), Value::Int(b)) | (Value::Int(b), Value::Bool(a)) => {
                i64::from(*a) == *b
            }
            (Value::Bool(a), Value::Float(b)) | (Value::Float(b), Value::Bool(a)) => {
                float_eq(i64::from(*a) as f64, *b)
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter().any(|(ok, ov)| ok == k && ov == v)
                    })
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => state.write_u8(0),
            // Bool, Int and Float share a tag and canonical bits so
            // coercing equality and hashing agree.
            Value::Bool(b) => {
                state.write_u8(2);
                state.write_u64(canonical_bits(i64::from(*b) as f64));
            }
            Value::Int(i) => {
                state.write_u8(2);
                state.write_u64(canonical_bits(*i as f64));
            }
            Value::Float(f) => {
                state.write_u8(2);
                state.write_u64(canonical_bits(*f));
            }
            Value::Str(s) => {
                state.write_u8(3);
                s.hash(state);
            }
            Value::List(vs) => {
                state.write_u8(4);
                state.write_usize(vs.len());
                for v in vs {
                    v.hash(state);
                }
            }
            // Key order is irrelevant for object equality, so fold the
            // entry hashes with a commutative operation.
            Value::Object(es) => {
                state.write_u8(5);
                state.write_usize(es.len());
                let mut folded = 0u64;
                for (k, v) in es {
                    let mut entry = DefaultHasher::new();
                    k.hash(&mut entry);
                    v.hash(&mut entry);
                    folded ^= entry.finish();
                }
                state.write_u64(folded);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(_) | Value::Object(_) => write!(f, "{}", self.repr()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(vs: Vec<T>) -> Self {
        Value::List(vs.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(vs) => {
                Value::List(vs.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(es) => Value::Object(
                es.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => {
                serde_json::Number::from_f64(f).map_or(serde_json::Value::Null, Into::into)
            }
            Value::Str(s) => serde_json::Value::String(s),
            Value::List(vs) => {
                serde_json::Value::Array(vs.into_iter().map(Into::into).collect())
            }
            Value::Object(es) => serde_json::Value::Object(
                es.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(vs) => {
                let mut seq = serializer.serialize_seq(Some(vs.len()))?;
                for v in vs {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Value::Object(es) => {
                let mut map = serializer.serialize_map(Some(es.len()))?;
                for (k, v) in es {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}
