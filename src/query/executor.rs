//! The streaming execution pipeline.
//!
//! Stages run in clause order: filter, group-or-project, flatten,
//! distinct, return-shape. Everything is pulled lazily from the input
//! except grouping, which must see all filtered records before the first
//! group row can be emitted; groups come out in first-seen key order.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use crate::error::{Error, Result};
use crate::field::Field;
use crate::query::Query;
use crate::record::Record;
use crate::value::Value;

/// Lazy result sequence. Each pull may fail (a missing attribute, a
/// function error), so items are `Result`s; [`Rows::list`] and
/// [`Rows::one`] collect with the first error winning.
pub struct Rows<'a> {
    inner: Box<dyn Iterator<Item = Result<Value>> + 'a>,
}

impl Iterator for Rows<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl fmt::Debug for Rows<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Rows(..)")
    }
}

impl Rows<'_> {
    /// Materialize the remaining rows in order.
    pub fn list(self) -> Result<Vec<Value>> {
        self.collect()
    }

    /// Consume the sequence expecting exactly one row.
    pub fn one(mut self) -> Result<Value> {
        let first = match self.next() {
            None => return Err(Error::EmptyResult),
            Some(row) => row?,
        };
        match self.next() {
            None => Ok(first),
            Some(Err(e)) => Err(e),
            Some(Ok(_)) => Err(Error::AmbiguousResult),
        }
    }
}

pub(super) fn run<'a, I>(query: &Query, records: I) -> Result<Rows<'a>>
where
    I: IntoIterator + 'a,
    I::Item: Record,
    I::IntoIter: 'a,
{
    if log::log_enabled!(log::Level::Debug) {
        log::debug!("executing: {}", query.to_string().replace('\n', " "));
    }

    if query.group_by.is_none() {
        if let Some(field) = query.fields.iter().find(|f| !f.is_scalar()) {
            return Err(Error::AggregateWithoutGroup(field.to_string()));
        }
    }

    let predicate = query.where_.clone();
    let filtered = records.into_iter().filter_map(move |record| match &predicate {
        None => Some(Ok(record)),
        Some(p) => match p.eval(&record) {
            Ok(v) if v.truthy() => Some(Ok(record)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        },
    });

    let projected: Box<dyn Iterator<Item = Result<Vec<Value>>> + 'a> = match &query.group_by {
        None => {
            let fields = query.fields.clone();
            Box::new(filtered.map(move |record| {
                let record = record?;
                fields.iter().map(|f| f.eval(&record)).collect()
            }))
        }
        Some(keys) => Box::new(GroupRows {
            source: Some(filtered),
            keys: keys.clone(),
            fields: query.fields.clone(),
            pending: VecDeque::new(),
        }),
    };

    let flatten = query.flatten;
    let shaped = projected.map(move |row| {
        row.map(|values| {
            if flatten {
                match <[Value; 1]>::try_from(values) {
                    Ok([value]) => value,
                    Err(values) => Value::List(values),
                }
            } else {
                Value::List(values)
            }
        })
    });

    let deduped: Box<dyn Iterator<Item = Result<Value>> + 'a> = if query.distinct {
        Box::new(Distinct {
            source: shaped,
            seen: HashSet::new(),
        })
    } else {
        Box::new(shaped)
    };

    let out: Box<dyn Iterator<Item = Result<Value>> + 'a> = match &query.return_shape {
        None => deduped,
        Some(shape) => {
            let shape = shape.clone();
            let names: Vec<String> = query.fields.iter().map(Field::display_name).collect();
            Box::new(deduped.map(move |row| {
                let row = row?;
                match row {
                    Value::List(values) if values.len() == names.len() => {
                        shape.make(names.iter().cloned().zip(values).collect())
                    }
                    other => Err(Error::ReturningShapeMismatch(format!(
                        "expected a {}-column row for {}, got {}",
                        names.len(),
                        shape.name(),
                        other.type_name()
                    ))),
                }
            }))
        }
    };

    Ok(Rows { inner: out })
}

/// The grouping barrier: drains its source on the first pull, partitions
/// by key tuple in first-seen order, then serves one row per group.
struct GroupRows<I> {
    source: Option<I>,
    keys: Vec<Field>,
    fields: Vec<Field>,
    pending: VecDeque<Result<Vec<Value>>>,
}

impl<I, R> Iterator for GroupRows<I>
where
    I: Iterator<Item = Result<R>>,
    R: Record,
{
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(source) = self.source.take() {
            self.pending = group_rows(source, &self.keys, &self.fields);
        }
        self.pending.pop_front()
    }
}

fn group_rows<I, R>(source: I, keys: &[Field], fields: &[Field]) -> VecDeque<Result<Vec<Value>>>
where
    I: Iterator<Item = Result<R>>,
    R: Record,
{
    let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut buckets: Vec<(Vec<Value>, Vec<R>)> = Vec::new();
    for item in source {
        let record = match item {
            Ok(record) => record,
            Err(e) => return VecDeque::from([Err(e)]),
        };
        let key: Vec<Value> = match keys.iter().map(|k| k.eval(&record)).collect() {
            Ok(key) => key,
            Err(e) => return VecDeque::from([Err(e)]),
        };
        match index.get(&key) {
            Some(&at) => buckets[at].1.push(record),
            None => {
                index.insert(key.clone(), buckets.len());
                buckets.push((key, vec![record]));
            }
        }
    }
    buckets
        .into_iter()
        .map(|(key, members)| {
            fields
                .iter()
                .map(|field| {
                    // A field matching a group key reads the key value;
                    // anything else is an aggregate over the members.
                    match keys.iter().position(|k| k.structural_eq(field)) {
                        Some(at) => Ok(key[at].clone()),
                        None => field.eval_group(&members),
                    }
                })
                .collect()
        })
        .collect()
}

struct Distinct<I> {
    source: I,
    seen: HashSet<Value>,
}

impl<I> Iterator for Distinct<I>
where
    I: Iterator<Item = Result<Value>>,
{
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.source.next()? {
                Err(e) => return Some(Err(e)),
                Ok(value) => {
                    if self.seen.insert(value.clone()) {
                        return Some(Ok(value));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{attr, constant, o};
    use crate::functions;
    use crate::query::select;

    fn points() -> Vec<Value> {
        [(2, 5), (5, 5), (7, 0)]
            .iter()
            .map(|&(x, y)| Value::from(serde_json::json!({"x": x, "y": y})))
            .collect()
    }

    #[test]
    fn filter_preserves_order() {
        let rows = select((attr("x"), attr("y")))
            .where_(attr("x").ge(attr("y")))
            .unwrap()
            .execute(points())
            .unwrap()
            .list()
            .unwrap();
        assert_eq!(
            rows,
            vec![
                Value::from(vec![5, 5]),
                Value::from(vec![7, 0]),
            ]
        );
    }

    #[test]
    fn identity_projection_returns_records() {
        let input = points();
        let rows = select(())
            .execute(&input)
            .unwrap()
            .list()
            .unwrap();
        assert_eq!(rows, input);
    }

    #[test]
    fn flatten_unwraps_single_fields() {
        let rows = select(attr("x"))
            .execute(points())
            .unwrap()
            .list()
            .unwrap();
        assert_eq!(rows, vec![Value::Int(2), Value::Int(5), Value::Int(7)]);
        // List form keeps one-element tuples.
        let rows = select([attr("x")])
            .execute(points())
            .unwrap()
            .list()
            .unwrap();
        assert_eq!(rows[0], Value::from(vec![2]));
    }

    #[test]
    fn aggregate_without_group_is_rejected_at_execution() {
        let total = functions::call("sum", [attr("x")]).unwrap();
        let err = select(total).execute(points()).unwrap_err();
        assert!(matches!(err, Error::AggregateWithoutGroup(_)));
    }

    #[test]
    fn grouping_uses_first_seen_order() {
        let input: Vec<Value> = ["b", "a", "b", "c", "a"]
            .iter()
            .map(|&n| Value::from(serde_json::json!({"name": n})))
            .collect();
        let count = functions::call("count", [attr("name")]).unwrap();
        let rows = select((attr("name"), count))
            .group_by(attr("name"))
            .unwrap()
            .execute(&input)
            .unwrap()
            .list()
            .unwrap();
        assert_eq!(
            rows,
            vec![
                Value::List(vec![Value::Str("b".into()), Value::Int(2)]),
                Value::List(vec![Value::Str("a".into()), Value::Int(2)]),
                Value::List(vec![Value::Str("c".into()), Value::Int(1)]),
            ]
        );
    }

    #[test]
    fn grouping_with_no_keys_makes_one_group() {
        let input: Vec<Value> = [1, 2, 3, 4]
            .iter()
            .map(|&x| Value::from(serde_json::json!({"x": x})))
            .collect();
        let count = functions::call("count", [attr("x")]).unwrap();
        let row = select(count)
            .group_by(())
            .unwrap()
            .execute(&input)
            .unwrap()
            .one()
            .unwrap();
        assert_eq!(row, Value::Int(4));
    }

    #[test]
    fn distinct_keeps_first_seen() {
        let input: Vec<Value> = [1, 2, 3, 4, 1, 2, 2]
            .iter()
            .map(|&x| Value::Int(x))
            .collect();
        let rows = select(())
            .distinct()
            .execute(&input)
            .unwrap()
            .list()
            .unwrap();
        assert_eq!(
            rows,
            vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]
        );
    }

    #[test]
    fn returning_builds_shapes_from_display_names() {
        let input = vec![
            Value::from(serde_json::json!({"x": 12, "y": 15})),
            Value::from(serde_json::json!({"x": 0, "y": 0})),
        ];
        let rows = select([crate::field::key("x")])
            .returning("dict")
            .unwrap()
            .execute(&input)
            .unwrap()
            .list()
            .unwrap();
        assert_eq!(
            rows,
            vec![
                Value::Object(vec![("x".into(), Value::Int(12))]),
                Value::Object(vec![("x".into(), Value::Int(0))]),
            ]
        );
    }

    #[test]
    fn one_row_results() {
        let input = vec![Value::Int(1), Value::Int(2)];
        assert!(matches!(
            select(()).execute(&input).unwrap().one(),
            Err(Error::AmbiguousResult)
        ));
        let empty: Vec<Value> = Vec::new();
        assert!(matches!(
            select(()).execute(&empty).unwrap().one(),
            Err(Error::EmptyResult)
        ));
        let one = vec![Value::Int(9)];
        assert_eq!(select(()).execute(&one).unwrap().one().unwrap(), Value::Int(9));
    }

    #[test]
    fn evaluation_errors_surface_lazily() {
        let input = vec![
            Value::from(serde_json::json!({"x": 1})),
            Value::from(serde_json::json!({"y": 2})),
        ];
        let mut rows = select(attr("x")).execute(&input).unwrap();
        assert_eq!(rows.next().unwrap().unwrap(), Value::Int(1));
        assert!(matches!(
            rows.next().unwrap(),
            Err(Error::MissingAttribute(name)) if name == "x"
        ));
    }

    #[test]
    fn queries_are_reusable() {
        let q = select(attr("x")).where_(attr("x").gt(2)).unwrap();
        let a: Vec<Value> = vec![Value::from(serde_json::json!({"x": 3}))];
        let b: Vec<Value> = vec![Value::from(serde_json::json!({"x": 1}))];
        assert_eq!(q.execute(&a).unwrap().list().unwrap(), vec![Value::Int(3)]);
        assert_eq!(q.execute(&b).unwrap().list().unwrap(), Vec::<Value>::new());
        assert_eq!(q.execute(&a).unwrap().list().unwrap(), vec![Value::Int(3)]);
    }

    #[test]
    fn constant_group_key_reads_from_key() {
        // Projection fields equal to a key read the key value, even
        // through an alias.
        let input: Vec<Value> = [1, 2].iter().map(|&x| Value::Int(x)).collect();
        let count = functions::call("count", [o()]).unwrap();
        let rows = select((constant(true).alias("always"), count))
            .group_by(constant(true))
            .unwrap()
            .execute(&input)
            .unwrap()
            .list()
            .unwrap();
        assert_eq!(
            rows,
            vec![Value::List(vec![Value::Bool(true), Value::Int(2)])]
        );
    }
}
