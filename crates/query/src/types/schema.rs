//! Record type schemas (fields and references)
//!
//! Record types are immutable once built. Every record type has exactly one
//! primary key field; stores additionally assign a row identity to each row.

use crate::error::{Error, Result};
use querykit_value::{DataType, Row, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;

/// A record type, which specifies a row's fields and their constraints.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RecordType {
    /// Unique name of the record type. Can't be empty.
    name: String,
    /// Index of the primary key field.
    primary_key: usize,
    /// The record type's fields, in row order.
    fields: Vec<Field>,
}

impl RecordType {
    /// Creates a new record type.
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidSchema("Record type name cannot be empty".into()));
        }
        if fields.is_empty() {
            return Err(Error::InvalidSchema(format!("Record type {} has no fields", name)));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if field.name.is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "Record type {} has a field with an empty name",
                    name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "Duplicate field {}.{}",
                    name, field.name
                )));
            }
            if field.data_type.is_null() {
                return Err(Error::InvalidSchema(format!(
                    "Field {}.{} cannot have type NULL",
                    name, field.name
                )));
            }
        }

        let primary_keys: Vec<_> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.primary_key)
            .map(|(i, _)| i)
            .collect();
        let primary_key = match primary_keys.as_slice() {
            [] => {
                return Err(Error::InvalidSchema(format!(
                    "Record type {} has no primary key",
                    name
                )));
            }
            [pk] => *pk,
            _ => {
                return Err(Error::InvalidSchema(format!(
                    "Record type {} has more than one primary key",
                    name
                )));
            }
        };
        if fields[primary_key].nullable {
            return Err(Error::InvalidSchema(format!(
                "Primary key {}.{} cannot be nullable",
                name, fields[primary_key].name
            )));
        }

        Ok(RecordType {
            name,
            primary_key,
            fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the field with the given name, if it exists.
    pub fn field(&self, name: &str) -> Option<(usize, &Field)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }

    /// Returns the primary key field and its index.
    pub fn primary_key(&self) -> (usize, &Field) {
        (self.primary_key, &self.fields[self.primary_key])
    }

    /// Fields that reference another record type.
    pub fn references(&self) -> impl Iterator<Item = (usize, &Field, &Reference)> {
        self.fields
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.reference.as_ref().map(|r| (i, f, r)))
    }

    /// Validates a row against this schema, coercing values into the field
    /// types.
    pub fn validate_row(&self, row: Row) -> Result<Row> {
        if row.len() != self.fields.len() {
            return Err(Error::InvalidSchema(format!(
                "Row has {} values, record type {} has {} fields",
                row.len(),
                self.name,
                self.fields.len()
            )));
        }
        self.fields
            .iter()
            .zip(row)
            .map(|(field, value)| field.validate_value(value))
            .collect()
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A declared foreign key: this field holds the key of a row of another
/// record type.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Reference {
    /// Name of the referenced record type.
    pub record_type: String,
    /// Name of the referenced key field.
    pub key: String,
}

/// A record type field.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Field {
    /// Field name. Can't be empty.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
    /// Whether this is the primary key field.
    pub primary_key: bool,
    /// Whether the field allows null values. Not legal for primary keys.
    pub nullable: bool,
    /// If set, this field references another record type.
    pub reference: Option<Reference>,
}

impl Field {
    /// Creates a new nullable field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Field {
            name: name.into(),
            data_type,
            primary_key: false,
            nullable: true,
            reference: None,
        }
    }

    /// Sets this field as the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Sets whether this field is nullable.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Declares this field as a reference to `record_type.key`.
    pub fn references(mut self, record_type: impl Into<String>, key: impl Into<String>) -> Self {
        self.reference = Some(Reference {
            record_type: record_type.into(),
            key: key.into(),
        });
        self
    }

    /// Validates a value against this field, returning it coerced into the
    /// field's type.
    pub fn validate_value(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            if !self.nullable {
                return Err(Error::InvalidSchema(format!(
                    "NULL value for non-nullable field {}",
                    self.name
                )));
            }
            return Ok(value);
        }
        if !self.data_type.accepts(&value.data_type())
            && !(self.data_type.is_numeric() && value.is_numeric())
        {
            return Err(Error::InvalidSchema(format!(
                "Field {} expects {}, found {}",
                self.name,
                self.data_type,
                value.data_type()
            )));
        }
        Ok(value.coerce_to(self.data_type)?)
    }
}

/// A relationship as declared to a store: `field` on the owning record type
/// references `target_key` on `target`.
#[derive(Clone, Debug, PartialEq)]
pub struct Relationship {
    pub field: String,
    pub target: Arc<RecordType>,
    pub target_key: String,
}
