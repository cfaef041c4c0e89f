//! Column model: named, typed extractors over opaque rows.
//!
//! ```text
//!   Row (&dyn Any) ──offsets──▶ Row (&Host) ──getter──▶ Value
//!        services                 host_ columns
//! ```
//!
//! A table registers each column once with a chain of offsets that walks
//! from the table's row type to the object the column reads. The chain is
//! built at registration time, so per-row evaluation is a few downcasts
//! and closure calls, never a name lookup.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::auth::User;

/// Borrowed handle to one row of some table.
#[derive(Clone, Copy)]
pub struct Row<'a>(&'a dyn Any);

impl<'a> Row<'a> {
    pub fn new<T: Any>(value: &'a T) -> Self {
        Row(value)
    }

    /// The row as `T`, if it is one.
    pub fn raw<T: Any>(self) -> Option<&'a T> {
        self.0.downcast_ref::<T>()
    }
}

type Offset = dyn for<'a> Fn(Row<'a>) -> Option<Row<'a>> + Send + Sync;

/// Navigation from a table's row to the object a column is defined on.
#[derive(Clone, Default)]
pub struct ColumnOffsets {
    steps: Vec<Arc<Offset>>,
}

impl ColumnOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one step; `None` means the related object is absent.
    pub fn add<F>(&self, step: F) -> Self
    where
        F: for<'a> Fn(Row<'a>) -> Option<Row<'a>> + Send + Sync + 'static,
    {
        let mut steps = self.steps.clone();
        steps.push(Arc::new(step));
        Self { steps }
    }

    pub fn resolve<'a>(&self, row: Row<'a>) -> Option<Row<'a>> {
        self.steps.iter().try_fold(row, |row, step| step(row))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Double,
    String,
    Time,
    List,
    Dict,
    Blob,
}

impl ColumnType {
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Int => "int",
            ColumnType::Double => "float",
            ColumnType::String => "string",
            ColumnType::Time => "time",
            ColumnType::List => "list",
            ColumnType::Dict => "dict",
            ColumnType::Blob => "blob",
        }
    }
}

/// A column value for one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Double(f64),
    Str(String),
    /// Seconds since the epoch, before timezone adjustment.
    Time(i64),
    List(Vec<Value>),
    Dict(Vec<(String, Value)>),
    Blob(Vec<u8>),
}

impl Value {
    /// The value a column of `kind` yields for a row it cannot resolve.
    pub fn default_for(kind: ColumnType) -> Self {
        match kind {
            ColumnType::Int => Value::Int(0),
            ColumnType::Double => Value::Double(0.0),
            ColumnType::String => Value::Str(String::new()),
            ColumnType::Time => Value::Time(0),
            ColumnType::List => Value::List(Vec::new()),
            ColumnType::Dict => Value::Dict(Vec::new()),
            ColumnType::Blob => Value::Null,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) | Value::Time(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Text used when a value is compared as a string. Nested lists
    /// compare by their first element.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(v) | Value::Time(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => items.first().map(Value::to_text).unwrap_or_default(),
            Value::Dict(_) => String::new(),
            Value::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Value::Str(s.into())).collect())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

pub type Getter = Box<dyn for<'a> Fn(Row<'a>, &User) -> Value + Send + Sync>;

pub struct Column {
    name: String,
    description: String,
    kind: ColumnType,
    getter: Getter,
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Column {
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: ColumnType, getter: Getter) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            getter,
        }
    }

    /// Typed column over rows of `T` reached through `offsets`.
    fn typed<T, F>(name: &str, description: &str, kind: ColumnType, offsets: &ColumnOffsets, f: F) -> Self
    where
        T: Any,
        F: Fn(&T, &User) -> Value + Send + Sync + 'static,
    {
        let offsets = offsets.clone();
        Self::new(
            name,
            description,
            kind,
            Box::new(move |row: Row<'_>, user: &User| {
                match offsets.resolve(row).and_then(|row| row.raw::<T>()) {
                    Some(object) => f(object, user),
                    None => Value::default_for(kind),
                }
            }),
        )
    }

    pub fn int<T: Any>(
        name: &str,
        description: &str,
        offsets: &ColumnOffsets,
        f: impl Fn(&T) -> i64 + Send + Sync + 'static,
    ) -> Self {
        Self::typed(name, description, ColumnType::Int, offsets, move |t: &T, _: &User| Value::Int(f(t)))
    }

    pub fn int_for_user<T: Any>(
        name: &str,
        description: &str,
        offsets: &ColumnOffsets,
        f: impl Fn(&T, &User) -> i64 + Send + Sync + 'static,
    ) -> Self {
        Self::typed(name, description, ColumnType::Int, offsets, move |t: &T, user: &User| {
            Value::Int(f(t, user))
        })
    }

    pub fn bool<T: Any>(
        name: &str,
        description: &str,
        offsets: &ColumnOffsets,
        f: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::int(name, description, offsets, move |t: &T| i64::from(f(t)))
    }

    pub fn double<T: Any>(
        name: &str,
        description: &str,
        offsets: &ColumnOffsets,
        f: impl Fn(&T) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self::typed(name, description, ColumnType::Double, offsets, move |t: &T, _: &User| {
            Value::Double(f(t))
        })
    }

    pub fn string<T: Any>(
        name: &str,
        description: &str,
        offsets: &ColumnOffsets,
        f: impl Fn(&T) -> String + Send + Sync + 'static,
    ) -> Self {
        Self::typed(name, description, ColumnType::String, offsets, move |t: &T, _: &User| {
            Value::Str(f(t))
        })
    }

    pub fn time<T: Any>(
        name: &str,
        description: &str,
        offsets: &ColumnOffsets,
        f: impl Fn(&T) -> i64 + Send + Sync + 'static,
    ) -> Self {
        Self::typed(name, description, ColumnType::Time, offsets, move |t: &T, _: &User| Value::Time(f(t)))
    }

    pub fn string_list<T: Any>(
        name: &str,
        description: &str,
        offsets: &ColumnOffsets,
        f: impl Fn(&T) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        Self::typed(name, description, ColumnType::List, offsets, move |t: &T, _: &User| {
            Value::strings(f(t))
        })
    }

    /// List whose content depends on what the user may see.
    pub fn list<T: Any>(
        name: &str,
        description: &str,
        offsets: &ColumnOffsets,
        f: impl Fn(&T, &User) -> Vec<Value> + Send + Sync + 'static,
    ) -> Self {
        Self::typed(name, description, ColumnType::List, offsets, move |t: &T, user: &User| {
            Value::List(f(t, user))
        })
    }

    pub fn dict<T: Any>(
        name: &str,
        description: &str,
        offsets: &ColumnOffsets,
        f: impl Fn(&T) -> Vec<(String, Value)> + Send + Sync + 'static,
    ) -> Self {
        Self::typed(name, description, ColumnType::Dict, offsets, move |t: &T, _: &User| Value::Dict(f(t)))
    }

    pub fn blob<T: Any>(
        name: &str,
        description: &str,
        offsets: &ColumnOffsets,
        f: impl Fn(&T) -> Option<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        Self::typed(name, description, ColumnType::Blob, offsets, move |t: &T, _: &User| {
            f(t).map_or(Value::Null, Value::Blob)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> ColumnType {
        self.kind
    }

    pub fn get(&self, row: Row<'_>, user: &User) -> Value {
        (self.getter)(row, user)
    }
}

/// Columns of one table, in registration order.
#[derive(Default)]
pub struct ColumnCatalog {
    columns: Vec<Arc<Column>>,
    index: HashMap<String, usize>,
}

impl ColumnCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a column; a later column with the same name replaces the
    /// earlier one in place.
    pub fn add(&mut self, column: Column) {
        let column = Arc::new(column);
        match self.index.get(column.name()) {
            Some(&i) => self.columns[i] = column,
            None => {
                self.index.insert(column.name().to_string(), self.columns.len());
                self.columns.push(column);
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<Arc<Column>> {
        self.index.get(name).map(|&i| Arc::clone(&self.columns[i]))
    }

    pub fn columns(&self) -> &[Arc<Column>] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Outer {
        inner: Option<Inner>,
        label: String,
    }

    struct Inner {
        size: i64,
    }

    fn inner_offsets() -> ColumnOffsets {
        ColumnOffsets::new().add(|row| row.raw::<Outer>().and_then(|o| o.inner.as_ref()).map(Row::new))
    }

    #[test]
    fn test_offsets_navigate_to_related_object() {
        let column = Column::int("inner_size", "size of the inner object", &inner_offsets(), |i: &Inner| i.size);
        let outer = Outer {
            inner: Some(Inner { size: 42 }),
            label: "x".into(),
        };
        assert_eq!(column.get(Row::new(&outer), &User::NoAuth), Value::Int(42));
    }

    #[test]
    fn test_missing_related_object_yields_default() {
        let column = Column::int("inner_size", "", &inner_offsets(), |i: &Inner| i.size);
        let outer = Outer {
            inner: None,
            label: "x".into(),
        };
        assert_eq!(column.get(Row::new(&outer), &User::NoAuth), Value::Int(0));
    }

    #[test]
    fn test_wrong_row_type_yields_default() {
        let column = Column::string("label", "", &ColumnOffsets::new(), |o: &Outer| o.label.clone());
        assert_eq!(column.get(Row::new(&17i32), &User::NoAuth), Value::Str(String::new()));
        let blob = Column::blob("data", "", &ColumnOffsets::new(), |_: &Outer| Some(vec![1]));
        assert_eq!(blob.get(Row::new(&17i32), &User::NoAuth), Value::Null);
    }

    #[test]
    fn test_catalog_lookup_and_replace() {
        let mut catalog = ColumnCatalog::new();
        catalog.add(Column::string("label", "first", &ColumnOffsets::new(), |o: &Outer| o.label.clone()));
        catalog.add(Column::int("size", "", &inner_offsets(), |i: &Inner| i.size));
        catalog.add(Column::string("label", "second", &ColumnOffsets::new(), |o: &Outer| o.label.clone()));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.columns()[0].description(), "second");
        assert!(catalog.find("size").is_some());
        assert!(catalog.find("Size").is_none());
    }

    #[test]
    fn test_value_text() {
        assert_eq!(Value::List(vec![Value::strings(["a", "b"])]).to_text(), "a");
        assert_eq!(Value::Double(2.5).to_text(), "2.5");
        assert_eq!(Value::Time(10).as_f64(), Some(10.0));
        assert_eq!(Value::Str("x".into()).as_f64(), None);
    }
}
