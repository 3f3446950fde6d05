use crate::error::Result;
use polars::prelude::DataType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Declared schema for one dataset shape, loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub columns: BTreeMap<String, ColumnSpec>,
}

/// Declared type and constraints for a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Datetime,
}

/// Value-level constraint attached to a column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Constraint {
    /// Column may contain only the listed values.
    Enum { values: Vec<ScalarValue> },
    /// Numeric column must fall within [min, max], both ends inclusive.
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

/// A constraint scalar as it appears in the schema file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int(v) => Some(*v as f64),
            ScalarValue::Float(v) => Some(*v),
            ScalarValue::Text(_) => None,
        }
    }
}

impl ColumnType {
    /// Whether a concrete frame dtype satisfies this declared type.
    ///
    /// The sets are strict: an integer column does not satisfy a `float`
    /// declaration, widening happens explicitly in the transform stage.
    pub fn accepts(&self, dtype: &DataType) -> bool {
        match self {
            ColumnType::String => {
                matches!(dtype, DataType::String | DataType::Categorical(_, _))
            }
            ColumnType::Integer => matches!(
                dtype,
                DataType::UInt8
                    | DataType::UInt16
                    | DataType::UInt32
                    | DataType::UInt64
                    | DataType::Int8
                    | DataType::Int16
                    | DataType::Int32
                    | DataType::Int64
            ),
            ColumnType::Float => matches!(dtype, DataType::Float32 | DataType::Float64),
            ColumnType::Boolean => matches!(dtype, DataType::Boolean),
            ColumnType::Datetime => matches!(dtype, DataType::Date | DataType::Datetime(_, _)),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Datetime => "datetime",
        }
    }
}

impl ColumnSpec {
    /// Allowed values from an `enum` constraint, if one is declared.
    pub fn enum_values(&self) -> Option<&[ScalarValue]> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::Enum { values } => Some(values.as_slice()),
            _ => None,
        })
    }

    /// (min, max) from a `range` constraint, if one is declared.
    pub fn range(&self) -> Option<(Option<f64>, Option<f64>)> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::Range { min, max } => Some((*min, *max)),
            _ => None,
        })
    }
}

impl DatasetSchema {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let schema: DatasetSchema = serde_yaml::from_str(&content)?;
        debug!(
            "Loaded schema with {} columns from {}",
            schema.columns.len(),
            path.display()
        );
        Ok(schema)
    }
}
