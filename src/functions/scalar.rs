//! Seeded scalar functions.

use rand::Rng;

use super::{Registry, ScalarFn};
use crate::error::{Error, Result};
use crate::value::Value;

pub(super) fn install(registry: &mut Registry) {
    registry.add_scalar(ScalarFn::new("add", |args| {
        expect_args("add", args, 2)?;
        args[0].add(&args[1])
    }));
    registry.add_scalar(ScalarFn::new("sub", |args| {
        expect_args("sub", args, 2)?;
        args[0].sub(&args[1])
    }));
    registry.add_scalar(ScalarFn::new("mul", |args| {
        expect_args("mul", args, 2)?;
        args[0].mul(&args[1])
    }));
    registry.add_scalar(ScalarFn::new("div", |args| {
        expect_args("div", args, 2)?;
        args[0].div(&args[1])
    }));
    registry.add_scalar(ScalarFn::new("mod", |args| {
        expect_args("mod", args, 2)?;
        args[0].rem(&args[1])
    }));
    registry.add_scalar(ScalarFn::new("pow", |args| {
        expect_args("pow", args, 2)?;
        args[0].pow(&args[1])
    }));
    registry.add_scalar(ScalarFn::new("abs", |args| {
        expect_args("abs", args, 1)?;
        abs(&args[0])
    }));
    registry.add_scalar(ScalarFn::new("round", round));
    registry.add_scalar(ScalarFn::new("str", |args| match args {
        [] => Ok(Value::Str(String::new())),
        [v] => Ok(Value::Str(v.to_string())),
        _ => Err(arity_error("str", "0 or 1 arguments", args.len())),
    }));
    registry.add_scalar(ScalarFn::new("upper", |args| {
        expect_args("upper", args, 1)?;
        as_str("upper", &args[0]).map(|s| Value::Str(s.to_uppercase()))
    }));
    registry.add_scalar(ScalarFn::new("lower", |args| {
        expect_args("lower", args, 1)?;
        as_str("lower", &args[0]).map(|s| Value::Str(s.to_lowercase()))
    }));
    registry.add_scalar(ScalarFn::new("replace", |args| {
        expect_args("replace", args, 3)?;
        let s = as_str("replace", &args[0])?;
        let from = as_str("replace", &args[1])?;
        let to = as_str("replace", &args[2])?;
        Ok(Value::Str(s.replace(from, to)))
    }));
    registry.add_scalar(ScalarFn::new("len", |args| {
        expect_args("len", args, 1)?;
        let n = match &args[0] {
            Value::Str(s) => s.chars().count(),
            Value::List(vs) => vs.len(),
            Value::Object(es) => es.len(),
            other => {
                return Err(Error::Evaluation(format!(
                    "len() of {}",
                    other.type_name()
                )))
            }
        };
        Ok(Value::Int(n as i64))
    }));
    registry.add_scalar(ScalarFn::new("concat", |args| {
        expect_args("concat", args, 2)?;
        match (&args[0], &args[1]) {
            (Value::Str(_), Value::Str(_)) | (Value::List(_), Value::List(_)) => {
                args[0].add(&args[1])
            }
            _ => Err(Error::Evaluation(format!(
                "concat() of {} and {}",
                args[0].type_name(),
                args[1].type_name()
            ))),
        }
    }));
    registry.add_scalar(ScalarFn::new("randint", |args| {
        expect_args("randint", args, 2)?;
        match (&args[0], &args[1]) {
            (Value::Int(a), Value::Int(b)) if a <= b => {
                Ok(Value::Int(rand::thread_rng().gen_range(*a..=*b)))
            }
            (Value::Int(_), Value::Int(_)) => {
                Err(Error::Evaluation("randint() with empty range".to_string()))
            }
            _ => Err(Error::Evaluation(
                "randint() takes integer bounds".to_string(),
            )),
        }
    }));
    registry.add_scalar(ScalarFn::new("random", |args| {
        expect_args("random", args, 0)?;
        Ok(Value::Float(rand::thread_rng().gen::<f64>()))
    }));
}

fn expect_args(name: &str, args: &[Value], n: usize) -> Result<()> {
    if args.len() == n {
        Ok(())
    } else {
        Err(arity_error(
            name,
            &format!("{n} argument{}", if n == 1 { "" } else { "s" }),
            args.len(),
        ))
    }
}

fn arity_error(name: &str, expected: &str, got: usize) -> Error {
    Error::Evaluation(format!("{name}() takes {expected}, got {got}"))
}

fn as_str<'a>(name: &str, v: &'a Value) -> Result<&'a str> {
    match v {
        Value::Str(s) => Ok(s),
        other => Err(Error::Evaluation(format!(
            "{name}() takes a str, got {}",
            other.type_name()
        ))),
    }
}

fn abs(v: &Value) -> Result<Value> {
    match v {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| Error::Evaluation("integer overflow in abs()".to_string())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(Error::Evaluation(format!(
            "abs() of {}",
            other.type_name()
        ))),
    }
}

fn round(args: &[Value]) -> Result<Value> {
    let (value, digits) = match args {
        [v] => (v, 0i64),
        [v, Value::Int(n)] => (v, *n),
        [_, other] => {
            return Err(Error::Evaluation(format!(
                "round() digits must be an int, got {}",
                other.type_name()
            )))
        }
        _ => return Err(arity_error("round", "1 or 2 arguments", args.len())),
    };
    match value {
        Value::Int(i) if digits >= 0 => Ok(Value::Int(*i)),
        Value::Int(i) => {
            let factor = 10f64.powi(-digits as i32);
            Ok(Value::Int((round_half_even(*i as f64 / factor) * factor) as i64))
        }
        Value::Float(f) => {
            let factor = 10f64.powi(digits as i32);
            Ok(Value::Float(round_half_even(f * factor) / factor))
        }
        other => Err(Error::Evaluation(format!(
            "round() of {}",
            other.type_name()
        ))),
    }
}

/// Round to the nearest integer; ties go to the even neighbor, so
/// `round(2.5)` is `2` and `round(1.5)` is `2`.
fn round_half_even(x: f64) -> f64 {
    let floor = x.floor();
    let fraction = x - floor;
    if fraction > 0.5 {
        floor + 1.0
    } else if fraction < 0.5 {
        floor
    } else if floor % 2.0 == 0.0 {
        floor
    } else {
        floor + 1.0
    }
}
