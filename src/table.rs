use chrono::NaiveDateTime;
use std::fmt::Display;

/// A typed cell value as read from, or written to, a worksheet.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Value {
    /// True for an empty cell or a text cell holding only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_owned())
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(datetime: NaiveDateTime) -> Self {
        Value::DateTime(datetime)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Text(text) => write!(f, "{}", text),
            Value::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => write!(f, "{:.0}", number),
            Value::Number(number) => write!(f, "{}", number),
            Value::Bool(flag) => write!(f, "{}", if *flag { "TRUE" } else { "FALSE" }),
            Value::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Row-oriented in-memory table. Every row holds exactly one value per column,
/// matched to the header by position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table { columns, rows: Vec::new() }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Names from `required` that this table does not have, in the given order.
    pub fn missing_columns<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        required
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| self.column_index(name).is_none())
            .map(str::to_owned)
            .collect()
    }

    /// Appends a row, padding with `Empty` or dropping cells past the header width.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Empty);
        self.rows.push(row);
    }

    /// Appends all rows of `other`, fitted to this table's columns by position.
    pub fn append(&mut self, other: Table) {
        self.rows.reserve(other.rows.len());
        for row in other.rows {
            self.push_row(row);
        }
    }

    /// New table with the same columns and the rows accepted by `keep`, order preserved.
    pub fn select_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Value]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }
}
