//! Seeded aggregate functions. Each receives one column per argument
//! field, already evaluated across the records of a group.

use std::cmp::Ordering;
use std::collections::HashSet;

use super::{AggregateFn, Registry};
use crate::error::{Error, Result};
use crate::value::Value;

pub(super) fn install(registry: &mut Registry) {
    registry.add_aggregate(AggregateFn::new("count", |cols| {
        let col = column("count", cols, 0)?;
        Ok(Value::Int(col.len() as i64))
    }));
    registry.add_aggregate(AggregateFn::new("sum", |cols| {
        fold("sum", column("sum", cols, 0)?, Value::Int(0), Value::add)
    }));
    registry.add_aggregate(AggregateFn::new("max", |cols| {
        extremum("max", column("max", cols, 0)?, Ordering::Greater)
    }));
    registry.add_aggregate(AggregateFn::new("min", |cols| {
        extremum("min", column("min", cols, 0)?, Ordering::Less)
    }));
    registry.add_aggregate(AggregateFn::new("list", |cols| {
        Ok(Value::List(column("list", cols, 0)?.to_vec()))
    }));
    registry.add_aggregate(AggregateFn::new("tuple", |cols| {
        Ok(Value::List(column("tuple", cols, 0)?.to_vec()))
    }));
    registry.add_aggregate(AggregateFn::new("set", |cols| {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for v in column("set", cols, 0)? {
            if seen.insert(v.clone()) {
                out.push(v.clone());
            }
        }
        Ok(Value::List(out))
    }));
    registry.add_aggregate(AggregateFn::new("product", |cols| {
        fold(
            "product",
            column("product", cols, 0)?,
            Value::Int(1),
            Value::mul,
        )
    }));
    registry.add_aggregate(AggregateFn::new("join", |cols| {
        let mut out = String::new();
        for v in column("join", cols, 0)? {
            match v {
                Value::Str(s) => out.push_str(s),
                other => {
                    return Err(Error::Evaluation(format!(
                        "join() over a column of {}",
                        other.type_name()
                    )))
                }
            }
        }
        Ok(Value::Str(out))
    }));
    registry.add_aggregate(AggregateFn::new("first", |cols| {
        column("first", cols, 0)?
            .first()
            .cloned()
            .ok_or_else(|| Error::Evaluation("first() of an empty group".to_string()))
    }));
    registry.add_aggregate(AggregateFn::new("average", |cols| {
        let col = column("average", cols, 0)?;
        let total = fold("average", col, Value::Int(0), Value::add)?;
        total.div(&Value::Int(col.len() as i64))
    }));
    registry.add_aggregate(AggregateFn::new("weighted_average", |cols| {
        let xs = column("weighted_average", cols, 0)?;
        let weights = column("weighted_average", cols, 1)?;
        let mut total = Value::Int(0);
        let mut total_weight = Value::Int(0);
        for (x, w) in xs.iter().zip(weights.iter()) {
            total = total.add(&x.mul(w)?)?;
            total_weight = total_weight.add(w)?;
        }
        total.div(&total_weight)
    }));
}

fn column<'a>(name: &str, cols: &'a [Vec<Value>], idx: usize) -> Result<&'a Vec<Value>> {
    cols.get(idx).ok_or_else(|| {
        Error::Evaluation(format!(
            "{name}() takes at least {} argument{}, got {}",
            idx + 1,
            if idx == 0 { "" } else { "s" },
            cols.len()
        ))
    })
}

fn fold(
    name: &str,
    col: &[Value],
    init: Value,
    f: impl Fn(&Value, &Value) -> Result<Value>,
) -> Result<Value> {
    let mut acc = init;
    for v in col {
        acc = f(&acc, v).map_err(|e| match e {
            Error::Evaluation(msg) => Error::Evaluation(format!("{name}(): {msg}")),
            other => other,
        })?;
    }
    Ok(acc)
}

fn extremum(name: &str, col: &[Value], keep: Ordering) -> Result<Value> {
    let mut iter = col.iter();
    let mut best = iter
        .next()
        .ok_or_else(|| Error::Evaluation(format!("{name}() of an empty group")))?;
    for v in iter {
        if v.compare(best)? == keep {
            best = v;
        }
    }
    Ok(best.clone())
}

#[cfg(test)]
mod tests {
    use crate::functions::aggregate_fn;
    use crate::value::Value;

    fn invoke(name: &str, cols: &[Vec<Value>]) -> crate::error::Result<Value> {
        aggregate_fn(name).unwrap().invoke(cols)
    }

    fn ints(vs: &[i64]) -> Vec<Value> {
        vs.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn count_and_sum() {
        let col = ints(&[1, 2, 3, 4]);
        assert_eq!(invoke("count", &[col.clone()]).unwrap(), Value::Int(4));
        assert_eq!(invoke("sum", &[col]).unwrap(), Value::Int(10));
        assert_eq!(invoke("sum", &[vec![]]).unwrap(), Value::Int(0));
    }

    #[test]
    fn sum_promotes_to_float() {
        let col = vec![Value::Int(1), Value::Float(0.5)];
        assert_eq!(invoke("sum", &[col]).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn extrema() {
        let col = ints(&[3, 1, 4, 1, 5]);
        assert_eq!(invoke("max", &[col.clone()]).unwrap(), Value::Int(5));
        assert_eq!(invoke("min", &[col]).unwrap(), Value::Int(1));
        assert!(invoke("max", &[vec![]]).is_err());
    }

    #[test]
    fn set_deduplicates_in_first_seen_order() {
        let col = ints(&[3, 1, 3, 2, 1]);
        assert_eq!(
            invoke("set", &[col]).unwrap(),
            Value::List(ints(&[3, 1, 2]))
        );
    }

    #[test]
    fn product_and_join_and_first() {
        assert_eq!(
            invoke("product", &[ints(&[2, 3, 4])]).unwrap(),
            Value::Int(24)
        );
        let strs = vec![Value::Str("ab".into()), Value::Str("cd".into())];
        assert_eq!(
            invoke("join", &[strs]).unwrap(),
            Value::Str("abcd".into())
        );
        assert_eq!(
            invoke("first", &[ints(&[7, 8])]).unwrap(),
            Value::Int(7)
        );
    }

    #[test]
    fn averages() {
        assert_eq!(
            invoke("average", &[ints(&[1, 2, 3])]).unwrap(),
            Value::Float(2.0)
        );
        // weighted_average(xs, ws) = sum(x * w) / sum(w)
        let prices = vec![Value::Float(1.0), Value::Float(0.75), Value::Float(3.0)];
        let qtys = ints(&[10, 20, 10]);
        assert_eq!(
            invoke("weighted_average", &[prices, qtys]).unwrap(),
            Value::Float(1.375)
        );
        assert!(invoke("average", &[vec![]]).is_err());
    }
}
