//! The immutable query builder.
//!
//! [`select`] decides the projection shape from its argument: no
//! projection (`()`) selects the whole record and flattens, a single
//! field flattens, and a list/tuple/array keeps tuple rows. The chainable
//! methods validate their clause and return a fresh query; a query value
//! can be executed any number of times against different inputs.

mod executor;

pub use executor::Rows;

use std::fmt;

use crate::error::{Error, Result};
use crate::field::{fields_text, Field};
use crate::functions::{self, ReturnShape};
use crate::record::Record;

#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) fields: Vec<Field>,
    pub(crate) flatten: bool,
    pub(crate) distinct: bool,
    pub(crate) where_: Option<Field>,
    pub(crate) group_by: Option<Vec<Field>>,
    pub(crate) return_shape: Option<ReturnShape>,
}

/// A projection list plus the flattening decision; see [`select`].
pub struct Projection {
    fields: Vec<Field>,
    flatten: bool,
}

impl From<()> for Projection {
    fn from((): ()) -> Self {
        Projection {
            fields: vec![Field::Identity],
            flatten: true,
        }
    }
}

impl From<Field> for Projection {
    fn from(field: Field) -> Self {
        Projection {
            fields: vec![field],
            flatten: true,
        }
    }
}

impl<T: Into<Field>> From<Vec<T>> for Projection {
    fn from(fields: Vec<T>) -> Self {
        Projection {
            fields: fields.into_iter().map(Into::into).collect(),
            flatten: false,
        }
    }
}

impl<T: Into<Field>, const N: usize> From<[T; N]> for Projection {
    fn from(fields: [T; N]) -> Self {
        Projection {
            fields: fields.into_iter().map(Into::into).collect(),
            flatten: false,
        }
    }
}

/// The keys of a `GROUP BY` clause. `()` means no keys: the whole input
/// becomes a single group.
pub struct GroupKeys(Vec<Field>);

impl From<()> for GroupKeys {
    fn from((): ()) -> Self {
        GroupKeys(Vec::new())
    }
}

impl From<Field> for GroupKeys {
    fn from(field: Field) -> Self {
        GroupKeys(vec![field])
    }
}

impl<T: Into<Field>> From<Vec<T>> for GroupKeys {
    fn from(fields: Vec<T>) -> Self {
        GroupKeys(fields.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Field>, const N: usize> From<[T; N]> for GroupKeys {
    fn from(fields: [T; N]) -> Self {
        GroupKeys(fields.into_iter().map(Into::into).collect())
    }
}

macro_rules! tuple_conversions {
    ($($T:ident),+) => {
        impl<$($T: Into<Field>),+> From<($($T,)+)> for Projection {
            #[allow(non_snake_case)]
            fn from(($($T,)+): ($($T,)+)) -> Self {
                Projection {
                    fields: vec![$($T.into()),+],
                    flatten: false,
                }
            }
        }

        impl<$($T: Into<Field>),+> From<($($T,)+)> for GroupKeys {
            #[allow(non_snake_case)]
            fn from(($($T,)+): ($($T,)+)) -> Self {
                GroupKeys(vec![$($T.into()),+])
            }
        }
    };
}

tuple_conversions!(A, B);
tuple_conversions!(A, B, C);
tuple_conversions!(A, B, C, D);
tuple_conversions!(A, B, C, D, E);
tuple_conversions!(A, B, C, D, E, F);

/// Start a query over the given projection.
pub fn select(projection: impl Into<Projection>) -> Query {
    let projection = projection.into();
    Query {
        fields: projection.fields,
        flatten: projection.flatten,
        distinct: false,
        where_: None,
        group_by: None,
        return_shape: None,
    }
}

impl Query {
    /// Keep only the first occurrence of each row value.
    pub fn distinct(mut self) -> Query {
        self.distinct = true;
        self
    }

    /// Filter records by a scalar predicate.
    pub fn where_(mut self, predicate: impl Into<Field>) -> Result<Query> {
        let predicate = predicate.into();
        if !predicate.is_scalar() {
            return Err(Error::InvalidClause(format!(
                "cannot use aggregate function {predicate} in WHERE"
            )));
        }
        self.where_ = Some(predicate);
        Ok(self)
    }

    /// Group records by the given scalar keys. Every projection field
    /// must either equal one of the keys or be an aggregate.
    pub fn group_by(mut self, keys: impl Into<GroupKeys>) -> Result<Query> {
        let GroupKeys(keys) = keys.into();
        for k in &keys {
            if !k.is_scalar() {
                return Err(Error::InvalidClause(format!(
                    "cannot use aggregate function {k} in GROUP BY"
                )));
            }
        }
        for field in &self.fields {
            if !keys.iter().any(|k| k.structural_eq(field)) && !field.is_aggregate() {
                return Err(Error::UngroupedProjection(field.to_string()));
            }
        }
        self.group_by = Some(keys);
        Ok(self)
    }

    /// Materialize rows through the return type registered under `name`.
    pub fn returning(self, name: &str) -> Result<Query> {
        let shape = functions::return_shape(name)
            .ok_or_else(|| Error::UnknownReturnType(name.to_string()))?;
        Ok(self.returning_shape(shape))
    }

    /// Materialize rows through the given constructor. Disables
    /// flattening: the shape always receives the full row.
    pub fn returning_shape(mut self, shape: ReturnShape) -> Query {
        self.flatten = false;
        self.return_shape = Some(shape);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Run against a sequence of records, producing a lazy row stream.
    pub fn execute<'a, I>(&self, records: I) -> Result<Rows<'a>>
    where
        I: IntoIterator + 'a,
        I::Item: Record,
        I::IntoIter: 'a,
    {
        executor::run(self, records)
    }
}

/// Structural equality over all clauses; return shapes compare by name.
impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
            && self.flatten == other.flatten
            && self.distinct == other.distinct
            && self.where_ == other.where_
            && self.group_by == other.group_by
            && self.return_shape.as_ref().map(ReturnShape::name)
                == other.return_shape.as_ref().map(ReturnShape::name)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let select = if self.distinct {
            "SELECT DISTINCT"
        } else {
            "SELECT"
        };
        let projection = match (self.flatten, self.fields.as_slice()) {
            (true, [field]) => field.to_string(),
            _ => fields_text(&self.fields),
        };
        write!(f, "{select} {projection}")?;
        if let Some(predicate) = &self.where_ {
            write!(f, "\nWHERE {predicate}")?;
        }
        if let Some(keys) = &self.group_by {
            write!(f, "\nGROUP BY {}", fields_text(keys))?;
        }
        if let Some(shape) = &self.return_shape {
            write!(f, "\nRETURNING {}", shape.name())?;
        }
        Ok(())
    }
}
