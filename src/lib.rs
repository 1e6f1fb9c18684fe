//! memql - query in-memory collections of records with a SQL-inspired API.
//!
//! Queries are expression trees over record fields, compiled from text or
//! composed through a fluent builder, and executed lazily against any
//! iterable of records:
//!
//! ```
//! use memql::{query, Value};
//!
//! let people: Vec<Value> = [("Joe", 25), ("Bill", 50), ("Jack", 75)]
//!     .iter()
//!     .map(|&(name, age)| Value::from(serde_json::json!({"name": name, "age": age})))
//!     .collect();
//!
//! let q = query("SELECT o.name WHERE o.age < 40")?;
//! assert_eq!(q.execute(&people)?.list()?, vec![Value::Str("Joe".into())]);
//! # Ok::<(), memql::Error>(())
//! ```
//!
//! The same query, composed programmatically:
//!
//! ```
//! use memql::{attr, select, Value};
//! # let people: Vec<Value> = [("Joe", 25), ("Bill", 50)]
//! #     .iter()
//! #     .map(|&(name, age)| Value::from(serde_json::json!({"name": name, "age": age})))
//! #     .collect();
//!
//! let q = select(attr("name")).where_(attr("age").lt(40))?;
//! assert_eq!(q.execute(&people)?.list()?, vec![Value::Str("Joe".into())]);
//! # Ok::<(), memql::Error>(())
//! ```
//!
//! Aggregation groups records by key tuples and reduces each group:
//!
//! ```
//! use memql::{query, Value};
//!
//! let sales = [("apple", 10), ("banana", 20), ("apple", 100)]
//!     .iter()
//!     .map(|&(name, qty)| Value::from(serde_json::json!({"name": name, "qty": qty})))
//!     .collect::<Vec<_>>();
//!
//! let q = query("SELECT o.name, sum(o.qty) AS total GROUP BY o.name RETURNING dict")?;
//! let rows = q.execute(&sales)?.list()?;
//! assert_eq!(rows[0], Value::from(serde_json::json!({"name": "apple", "total": 110})));
//! # Ok::<(), memql::Error>(())
//! ```

pub mod error;
pub mod field;
pub mod functions;
pub mod parser;
pub mod query;
pub mod record;
pub mod value;

pub use error::{Error, Result};
pub use field::{attr, constant, key, list, not, o, Field, Op};
pub use functions::{
    register_aggregate_fn, register_return_type, register_scalar_fn, AggregateFn,
    ReturnShape, ScalarFn,
};
pub use query::{select, Query, Rows};
pub use record::{FieldSet, Record};
pub use value::Value;

/// Parse a textual statement into a reusable [`Query`].
pub fn query(text: &str) -> Result<Query> {
    parser::parse_statement(text)
}
