//! Scalar and aggregate function registries.
//!
//! Each registry maps a case-sensitive name to a shared handle. Fields
//! built from a handle carry the handle itself, so structural equality of
//! two call expressions compares function identity, not just the name.
//! The registries are populated at startup and may be extended with
//! [`register_scalar_fn`], [`register_aggregate_fn`] and
//! [`register_return_type`]; registration concurrent with query execution
//! is not supported.

mod aggregate;
mod scalar;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lazy_static::lazy_static;

use crate::error::{Error, Result};
use crate::field::Field;
use crate::value::Value;

type ScalarImpl = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;
type AggregateImpl = dyn Fn(&[Vec<Value>]) -> Result<Value> + Send + Sync;
type ShapeImpl = dyn Fn(Vec<(String, Value)>) -> Result<Value> + Send + Sync;

/// Handle to a registered scalar function: applied per record to the
/// evaluations of its argument fields.
#[derive(Clone)]
pub struct ScalarFn {
    name: String,
    f: Arc<ScalarImpl>,
}

impl ScalarFn {
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        ScalarFn {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build a call expression over the given argument fields.
    pub fn call<I, F>(&self, args: I) -> Field
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        Field::Call {
            func: self.clone(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn invoke(&self, args: &[Value]) -> Result<Value> {
        (self.f)(args)
    }

    pub(crate) fn same(&self, other: &ScalarFn) -> bool {
        Arc::ptr_eq(&self.f, &other.f)
    }
}

impl fmt::Debug for ScalarFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScalarFn({})", self.name)
    }
}

/// Handle to a registered aggregate function: applied once per group to
/// one column per argument field.
#[derive(Clone)]
pub struct AggregateFn {
    name: String,
    f: Arc<AggregateImpl>,
}

impl AggregateFn {
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(&[Vec<Value>]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        AggregateFn {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call<I, F>(&self, args: I) -> Field
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        Field::Aggregate {
            func: self.clone(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn invoke(&self, columns: &[Vec<Value>]) -> Result<Value> {
        (self.f)(columns)
    }

    pub(crate) fn same(&self, other: &AggregateFn) -> bool {
        Arc::ptr_eq(&self.f, &other.f)
    }
}

impl fmt::Debug for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AggregateFn({})", self.name)
    }
}

/// Handle to a `RETURNING` row constructor: receives the projection's
/// display names zipped with the row values.
#[derive(Clone)]
pub struct ReturnShape {
    name: String,
    make: Arc<ShapeImpl>,
}

impl ReturnShape {
    pub fn new(
        name: impl Into<String>,
        make: impl Fn(Vec<(String, Value)>) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        ReturnShape {
            name: name.into(),
            make: Arc::new(make),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn make(&self, pairs: Vec<(String, Value)>) -> Result<Value> {
        (self.make)(pairs)
    }
}

impl fmt::Debug for ReturnShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReturnShape({})", self.name)
    }
}

struct Registry {
    scalars: HashMap<String, ScalarFn>,
    aggregates: HashMap<String, AggregateFn>,
    shapes: HashMap<String, ReturnShape>,
}

impl Registry {
    fn seeded() -> Self {
        let mut registry = Registry {
            scalars: HashMap::new(),
            aggregates: HashMap::new(),
            shapes: HashMap::new(),
        };
        scalar::install(&mut registry);
        aggregate::install(&mut registry);
        registry.add_shape(ReturnShape::new("dict", |pairs| {
            let mut entries: Vec<(String, Value)> = Vec::with_capacity(pairs.len());
            for (key, value) in pairs {
                match entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = value,
                    None => entries.push((key, value)),
                }
            }
            Ok(Value::Object(entries))
        }));
        registry
    }

    fn add_scalar(&mut self, f: ScalarFn) {
        self.scalars.insert(f.name.clone(), f);
    }

    fn add_aggregate(&mut self, f: AggregateFn) {
        self.aggregates.insert(f.name.clone(), f);
    }

    fn add_shape(&mut self, shape: ReturnShape) {
        self.shapes.insert(shape.name.clone(), shape);
    }
}

lazy_static! {
    static ref REGISTRY: RwLock<Registry> = RwLock::new(Registry::seeded());
}

fn read() -> RwLockReadGuard<'static, Registry> {
    REGISTRY.read().unwrap_or_else(PoisonError::into_inner)
}

fn write() -> RwLockWriteGuard<'static, Registry> {
    REGISTRY.write().unwrap_or_else(PoisonError::into_inner)
}

/// Register a scalar function under `name`, replacing any previous entry.
pub fn register_scalar_fn(
    name: &str,
    f: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
) -> ScalarFn {
    let handle = ScalarFn::new(name, f);
    log::debug!("registering scalar function '{name}'");
    write().add_scalar(handle.clone());
    handle
}

/// Register an aggregate function under `name`, replacing any previous
/// entry.
pub fn register_aggregate_fn(
    name: &str,
    f: impl Fn(&[Vec<Value>]) -> Result<Value> + Send + Sync + 'static,
) -> AggregateFn {
    let handle = AggregateFn::new(name, f);
    log::debug!("registering aggregate function '{name}'");
    write().add_aggregate(handle.clone());
    handle
}

/// Register a `RETURNING` row constructor under `name`.
pub fn register_return_type(
    name: &str,
    make: impl Fn(Vec<(String, Value)>) -> Result<Value> + Send + Sync + 'static,
) -> ReturnShape {
    let handle = ReturnShape::new(name, make);
    log::debug!("registering return type '{name}'");
    write().add_shape(handle.clone());
    handle
}

pub fn scalar_fn(name: &str) -> Option<ScalarFn> {
    read().scalars.get(name).cloned()
}

pub fn aggregate_fn(name: &str) -> Option<AggregateFn> {
    read().aggregates.get(name).cloned()
}

pub fn return_shape(name: &str) -> Option<ReturnShape> {
    read().shapes.get(name).cloned()
}

/// Look up `name` in the scalar registry, then the aggregate registry,
/// and build a call expression over `args`.
pub fn call<I, F>(name: &str, args: I) -> Result<Field>
where
    I: IntoIterator<Item = F>,
    F: Into<Field>,
{
    let registry = read();
    if let Some(f) = registry.scalars.get(name) {
        return Ok(f.call(args));
    }
    if let Some(f) = registry.aggregates.get(name) {
        return Ok(f.call(args));
    }
    Err(Error::UnknownFunction(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::constant;

    #[test]
    fn seeded_functions_resolve() {
        assert!(scalar_fn("add").is_some());
        assert!(scalar_fn("upper").is_some());
        assert!(aggregate_fn("sum").is_some());
        assert!(aggregate_fn("weighted_average").is_some());
        assert!(return_shape("dict").is_some());
        assert!(scalar_fn("no_such_fn").is_none());
    }

    #[test]
    fn call_prefers_scalar_then_aggregate() {
        let f = call("sum", [constant(1)]).unwrap();
        assert!(f.is_aggregate());
        assert!(matches!(
            call("missing", [constant(1)]),
            Err(Error::UnknownFunction(name)) if name == "missing"
        ));
    }

    #[test]
    fn registered_functions_are_callable() {
        let double = register_scalar_fn("test_double", |args| {
            args[0].mul(&Value::Int(2))
        });
        let field = double.call([constant(21)]);
        assert_eq!(field.to_string(), "test_double(21)");
    }

    #[test]
    fn dict_shape_keeps_last_duplicate() {
        let dict = return_shape("dict").unwrap();
        let row = dict
            .make(vec![
                ("x".into(), Value::Int(1)),
                ("x".into(), Value::Int(2)),
            ])
            .unwrap();
        assert_eq!(row, Value::Object(vec![("x".into(), Value::Int(2))]));
    }
}
