//! Projection binding
//!
//! Turns result tuples into typed output structs. A [`Bindable`] type
//! declares its output fields; a [`Binder`] built by [`FieldMapping`] (by
//! name) or [`Constructor`] (by position) supplies the matching selections
//! and binds every tuple of a query that projects them.
//!
//! ```ignore
//! let binder = FieldMapping::<MemberDto>::new()
//!     .map("username", member.col("username"))?
//!     .map("age", member.col("age"))?
//!     .build()?;
//! let plan = Query::select(binder.selections()).from(&member).build()?;
//! let dtos = executor.fetch_as(&plan, &binder)?;
//! ```

use crate::error::{Error, Result};
use crate::types::expression::{Expr, IntoExpr};
use crate::types::query::Selection;
use crate::types::tuple::Tuple;
use querykit_value::{DataType, Value};
use std::fmt;
use std::marker::PhantomData;

/// One field of a bindable output type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputField {
    pub name: &'static str,
    pub data_type: DataType,
    pub nullable: bool,
}

impl OutputField {
    pub const fn required(name: &'static str, data_type: DataType) -> Self {
        OutputField {
            name,
            data_type,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, data_type: DataType) -> Self {
        OutputField {
            name,
            data_type,
            nullable: true,
        }
    }

    fn mismatch(&self, found: impl fmt::Display) -> Error {
        Error::ProjectionTypeMismatch {
            field: self.name.to_string(),
            expected: self.data_type.to_string(),
            found: found.to_string(),
        }
    }

    /// Whether an expression of type `found` can feed this field.
    fn check_type(&self, found: DataType) -> Result<()> {
        let ok = if found.is_null() {
            self.nullable
        } else {
            self.data_type.accepts(&found)
        };
        if ok { Ok(()) } else { Err(self.mismatch(found)) }
    }

    fn bind(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(self.mismatch("NULL"))
            };
        }
        let found = value.data_type();
        if !self.data_type.accepts(&found) {
            return Err(self.mismatch(found));
        }
        value.coerce_to(self.data_type).map_err(|_| self.mismatch(found))
    }
}

/// An output type a [`Binder`] can produce.
pub trait Bindable: Sized {
    /// Output fields in declaration order.
    const FIELDS: &'static [OutputField];

    /// Build the value from one value per field, in `FIELDS` order. Values
    /// have already been checked against the declared types.
    fn from_values(values: Vec<Value>) -> Result<Self>;
}

/// Binds result tuples to `T`.
pub struct Binder<T> {
    selections: Vec<Selection>,
    /// Tuple position feeding each field of `T`, `None` binds NULL.
    positions: Vec<Option<usize>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Binder<T> {
    fn clone(&self) -> Self {
        Binder {
            selections: self.selections.clone(),
            positions: self.positions.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Binder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("selections", &self.selections)
            .field("positions", &self.positions)
            .finish()
    }
}

impl<T: Bindable> Binder<T> {
    /// The selections a query must project, in order.
    pub fn selections(&self) -> Vec<Selection> {
        self.selections.clone()
    }

    pub fn arity(&self) -> usize {
        self.selections.len()
    }

    pub fn bind(&self, tuple: &Tuple) -> Result<T> {
        if tuple.len() != self.arity() {
            return Err(Error::ProjectionArityMismatch(format!(
                "binder expects {} columns, tuple has {}",
                self.arity(),
                tuple.len()
            )));
        }
        let values = T::FIELDS
            .iter()
            .zip(&self.positions)
            .map(|(field, position)| match position {
                Some(i) => {
                    let value = tuple.value(*i).cloned().ok_or_else(|| field.mismatch("entity"))?;
                    field.bind(value)
                }
                None => Ok(Value::Null),
            })
            .collect::<Result<Vec<_>>>()?;
        T::from_values(values)
    }
}

/// Binding by field name.
#[derive(Debug)]
pub struct FieldMapping<T> {
    mapped: Vec<Option<Expr>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Bindable> Default for FieldMapping<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Bindable> FieldMapping<T> {
    pub fn new() -> Self {
        FieldMapping {
            mapped: vec![None; T::FIELDS.len()],
            _marker: PhantomData,
        }
    }

    /// Feed field `name` from `expr`.
    pub fn map(mut self, name: &str, expr: impl IntoExpr) -> Result<Self> {
        let index = T::FIELDS
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| {
                Error::ProjectionArityMismatch(format!("output type has no field {}", name))
            })?;
        if self.mapped[index].is_some() {
            return Err(Error::ProjectionArityMismatch(format!(
                "field {} mapped twice",
                name
            )));
        }
        let expr = expr.into_expr()?;
        T::FIELDS[index].check_type(expr.data_type())?;
        self.mapped[index] = Some(expr);
        Ok(self)
    }

    /// Seal the mapping. Every required field must be mapped.
    pub fn build(self) -> Result<Binder<T>> {
        let mut selections = Vec::new();
        let mut positions = Vec::with_capacity(T::FIELDS.len());
        for (field, expr) in T::FIELDS.iter().zip(self.mapped) {
            match expr {
                Some(expr) => {
                    positions.push(Some(selections.len()));
                    selections.push(Selection::Expr {
                        expr,
                        alias: Some(field.name.to_string()),
                    });
                }
                None if field.nullable => positions.push(None),
                None => {
                    return Err(Error::ProjectionArityMismatch(format!(
                        "required field {} is not mapped",
                        field.name
                    )));
                }
            }
        }
        Ok(Binder {
            selections,
            positions,
            _marker: PhantomData,
        })
    }
}

/// Binding by position.
pub struct Constructor<T>(PhantomData<fn() -> T>);

impl<T: Bindable> Constructor<T> {
    /// One expression per field of `T`, in declaration order.
    pub fn new<I>(exprs: I) -> Result<Binder<T>>
    where
        I: IntoIterator,
        I::Item: IntoExpr,
    {
        let exprs = exprs
            .into_iter()
            .map(IntoExpr::into_expr)
            .collect::<Result<Vec<_>>>()?;
        if exprs.len() != T::FIELDS.len() {
            return Err(Error::ProjectionArityMismatch(format!(
                "constructor takes {} arguments, got {}",
                T::FIELDS.len(),
                exprs.len()
            )));
        }
        for (field, expr) in T::FIELDS.iter().zip(&exprs) {
            field.check_type(expr.data_type())?;
        }
        Ok(Binder {
            positions: (0..exprs.len()).map(Some).collect(),
            selections: exprs.into_iter().map(Selection::from).collect(),
            _marker: PhantomData,
        })
    }
}

/// Results taken as they come.
pub struct PassThrough;

impl PassThrough {
    /// The value of a one-column tuple.
    pub fn value(tuple: Tuple) -> Result<Value> {
        tuple.into_value()
    }

    pub fn tuple(tuple: Tuple) -> Tuple {
        tuple
    }
}
