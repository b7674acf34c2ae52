//! Row data handed over by the data source
//!
//! - `Value`: a single typed field value
//! - `Row`: values plus a shared column header
//! - `RowCursor`: positioned, forward-iterable handle over a result set

use std::sync::Arc;

use serde_json::Value as Json;

use crate::error::{BinderyError, Result};

/// Identity column every result set carries first
pub const ID_COLUMN: &str = "_id";

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// String form of the value; `None` for null and blobs
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Null | Value::Blob(_) => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(r.to_string()),
            Value::Text(s) => Some(s.clone()),
        }
    }

    /// Integer form of the value; text is parsed, reals are truncated
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(r) => Some(*r as i64),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null | Value::Blob(_) => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&Json> for Value {
    /// Arrays of small integers become blobs; objects are kept as JSON text
    fn from(json: &Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Integer(i64::from(*b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Real(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::Text(s.clone()),
            Json::Array(items) => {
                let bytes: Option<Vec<u8>> = items
                    .iter()
                    .map(|v| v.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect();
                match bytes {
                    Some(bytes) => Value::Blob(bytes),
                    None => Value::Text(json.to_string()),
                }
            }
            Json::Object(_) => Value::Text(json.to_string()),
        }
    }
}

/// Ordered column header shared by every row of a result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns(Vec<String>);

impl Columns {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|c| c == name)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One row of a result set
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<Columns>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row; missing trailing values are padded with nulls
    pub fn new(columns: Arc<Columns>, mut values: Vec<Value>) -> Self {
        values.resize(columns.len(), Value::Null);
        Self { columns, values }
    }

    pub fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.index_of(name)
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.column_index(name).and_then(|i| self.get(i))
    }

    pub fn get_string(&self, index: usize) -> Option<String> {
        self.get(index).and_then(Value::as_string)
    }

    pub fn get_int(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(Value::as_int)
    }

    pub fn get_blob(&self, index: usize) -> Option<&[u8]> {
        self.get(index).and_then(Value::as_blob)
    }
}

/// Positioned handle over query results
///
/// The adapter owns exactly one cursor at a time and calls `close` on the
/// previous cursor before installing a new one.
pub trait RowCursor: Send {
    fn columns(&self) -> &Arc<Columns>;

    fn count(&self) -> usize;

    /// Position on `position`; false when out of range or closed
    fn move_to(&mut self, position: usize) -> bool;

    /// Row at the current position
    fn current(&self) -> Option<&Row>;

    /// Release the underlying handle
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Cursor over rows held in memory
#[derive(Debug)]
pub struct VecCursor {
    columns: Arc<Columns>,
    rows: Vec<Row>,
    position: Option<usize>,
    closed: bool,
}

impl VecCursor {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let columns = Arc::new(Columns::new(columns));
        let rows = rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect();
        Self {
            columns,
            rows,
            position: None,
            closed: false,
        }
    }

    /// Empty result set with the given header
    pub fn empty(columns: Vec<String>) -> Self {
        Self::new(columns, Vec::new())
    }

    /// Project JSON objects onto `columns`; absent keys read as null
    pub fn from_json_rows(columns: &[String], rows: &[Json]) -> Result<Self> {
        let mut projected = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let object = row.as_object().ok_or_else(|| BinderyError::Query {
                uri: String::new(),
                details: format!("row {i} is not a JSON object"),
            })?;
            projected.push(
                columns
                    .iter()
                    .map(|c| object.get(c).map(Value::from).unwrap_or(Value::Null))
                    .collect(),
            );
        }
        Ok(Self::new(columns.to_vec(), projected))
    }
}

impl RowCursor for VecCursor {
    fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    fn count(&self) -> usize {
        if self.closed {
            0
        } else {
            self.rows.len()
        }
    }

    fn move_to(&mut self, position: usize) -> bool {
        if self.closed || position >= self.rows.len() {
            return false;
        }
        self.position = Some(position);
        true
    }

    fn current(&self) -> Option<&Row> {
        if self.closed {
            return None;
        }
        self.position.and_then(|p| self.rows.get(p))
    }

    fn close(&mut self) {
        self.closed = true;
        self.position = None;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
