//! How the engine reads records.
//!
//! A record is anything that can answer attribute and keyed lookups and
//! hand back a [`Value`] form of itself. [`Value`] is itself a record, so
//! JSON-shaped data queries out of the box: objects answer both `o.x` and
//! `o['x']`, lists index by integer (negative indices count from the
//! end), and plain scalars act as opaque records reachable through `o`.

use crate::error::{Error, Result};
use crate::field::{attr, Field};
use crate::query::{select, Query};
use crate::value::Value;

pub trait Record {
    /// Read a named attribute, failing with [`Error::MissingAttribute`]
    /// when the record has no such attribute.
    fn attr(&self, name: &str) -> Result<Value>;

    /// Read a key-indexed value. [`Error::UnsupportedLookup`] when the
    /// record is not indexable at all, [`Error::MissingKey`] when it is
    /// but the key is absent.
    fn key(&self, key: &Value) -> Result<Value>;

    /// The record as a value, used when the whole record is projected.
    fn to_value(&self) -> Value;
}

impl<T: Record + ?Sized> Record for &T {
    fn attr(&self, name: &str) -> Result<Value> {
        (**self).attr(name)
    }

    fn key(&self, key: &Value) -> Result<Value> {
        (**self).key(key)
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl Record for Value {
    fn attr(&self, name: &str) -> Result<Value> {
        match self {
            Value::Object(entries) => entries
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| Error::MissingAttribute(name.to_string())),
            _ => Err(Error::MissingAttribute(name.to_string())),
        }
    }

    fn key(&self, key: &Value) -> Result<Value> {
        match (self, key) {
            (Value::Object(entries), Value::Str(k)) => entries
                .iter()
                .find(|(ek, _)| ek == k)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| Error::MissingKey(key.repr())),
            (Value::Object(_), _) => Err(Error::MissingKey(key.repr())),
            (Value::List(items), Value::Int(i)) => {
                index(items.len(), *i)
                    .map(|idx| items[idx].clone())
                    .ok_or_else(|| Error::MissingKey(key.repr()))
            }
            (Value::Str(s), Value::Int(i)) => {
                let chars: Vec<char> = s.chars().collect();
                index(chars.len(), *i)
                    .map(|idx| Value::Str(chars[idx].to_string()))
                    .ok_or_else(|| Error::MissingKey(key.repr()))
            }
            (Value::List(_) | Value::Str(_), _) => {
                Err(Error::UnsupportedLookup(format!("{}-keyed", key.type_name())))
            }
            _ => Err(Error::UnsupportedLookup("keyed".to_string())),
        }
    }

    fn to_value(&self) -> Value {
        self.clone()
    }
}

fn index(len: usize, i: i64) -> Option<usize> {
    let idx = if i < 0 { i + len as i64 } else { i };
    usize::try_from(idx).ok().filter(|&idx| idx < len)
}

/// Pre-built attribute fields for a record type: build one per record
/// type, pull fields out by name, or project them all at once.
#[derive(Debug, Clone)]
pub struct FieldSet {
    fields: Vec<Field>,
}

impl FieldSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSet {
            fields: names.into_iter().map(|n| attr(n.into())).collect(),
        }
    }

    /// The attribute field registered under `name`, if any.
    pub fn field(&self, name: &str) -> Option<Field> {
        self.fields
            .iter()
            .find(|f| matches!(f, Field::Attr(a) if a == name))
            .cloned()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// A query projecting every field, in declaration order.
    pub fn select(&self) -> Query {
        select(self.fields.clone())
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_records_answer_attr_and_key() {
        let rec = Value::from(serde_json::json!({"x": 12, "y": 15}));
        assert_eq!(rec.attr("x").unwrap(), Value::Int(12));
        assert_eq!(rec.key(&Value::Str("y".into())).unwrap(), Value::Int(15));
        assert!(matches!(
            rec.attr("z"),
            Err(Error::MissingAttribute(name)) if name == "z"
        ));
        assert!(matches!(rec.key(&Value::Str("z".into())), Err(Error::MissingKey(_))));
    }

    #[test]
    fn list_records_index_by_integer() {
        let rec = Value::from(vec![10, 20, 30]);
        assert_eq!(rec.key(&Value::Int(0)).unwrap(), Value::Int(10));
        assert_eq!(rec.key(&Value::Int(-1)).unwrap(), Value::Int(30));
        assert!(matches!(rec.key(&Value::Int(3)), Err(Error::MissingKey(_))));
        assert!(matches!(
            rec.key(&Value::Str("x".into())),
            Err(Error::UnsupportedLookup(_))
        ));
    }

    #[test]
    fn scalar_records_support_neither_lookup() {
        let rec = Value::Int(1);
        assert!(matches!(rec.attr("x"), Err(Error::MissingAttribute(_))));
        assert!(matches!(
            rec.key(&Value::Int(0)),
            Err(Error::UnsupportedLookup(_))
        ));
    }

    #[test]
    fn field_set_builds_attribute_fields() {
        let fields = FieldSet::new(["name", "age"]);
        assert_eq!(fields.field("age").unwrap().to_string(), "o.age");
        assert!(fields.field("height").is_none());
        assert_eq!(fields.iter().count(), 2);
    }
}
