//! The `columns` table: every column of every table, itself included.

use super::{RowSink, Scope, Table};
use crate::column::{Column, ColumnCatalog, ColumnOffsets, Row};
use crate::error::RequestError;

pub struct ColumnRow {
    pub table: &'static str,
    pub name: String,
    pub description: String,
    pub kind: &'static str,
}

impl ColumnRow {
    fn of(table: &'static str, column: &Column) -> Self {
        Self {
            table,
            name: column.name().to_string(),
            description: column.description().to_string(),
            kind: column.kind().name(),
        }
    }
}

pub struct ColumnsTable {
    catalog: ColumnCatalog,
    rows: Vec<ColumnRow>,
}

impl ColumnsTable {
    pub fn new(tables: &[Box<dyn Table>]) -> Self {
        let offsets = ColumnOffsets::new();
        let mut catalog = ColumnCatalog::new();
        catalog.add(Column::string("table", "The name of the table", &offsets, |r: &ColumnRow| r.table.to_string()));
        catalog.add(Column::string("name", "The name of the column within the table", &offsets, |r: &ColumnRow| {
            r.name.clone()
        }));
        catalog.add(Column::string("description", "A description of the column", &offsets, |r: &ColumnRow| {
            r.description.clone()
        }));
        catalog.add(Column::string("type", "The data type of the column (int, float, string, list)", &offsets, |r: &ColumnRow| {
            r.kind.to_string()
        }));

        let mut rows: Vec<ColumnRow> = tables
            .iter()
            .flat_map(|table| table.catalog().columns().iter().map(move |c| ColumnRow::of(table.name(), c)))
            .collect();
        rows.extend(catalog.columns().iter().map(|c| ColumnRow::of("columns", c)));
        Self { catalog, rows }
    }
}

impl Table for ColumnsTable {
    fn name(&self) -> &'static str {
        "columns"
    }

    fn name_prefix(&self) -> &'static str {
        "column_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, _scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        for row in &self.rows {
            if !sink(Row::new(row)) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::User;
    use crate::column::Value;
    use crate::tables::commands::CommandsTable;
    use crate::tables::testing::{context, rows};

    #[test]
    fn test_lists_other_tables_and_itself() {
        let tables: Vec<Box<dyn Table>> = vec![Box::new(CommandsTable::new(&context()))];
        let table = ColumnsTable::new(&tables);
        let result = rows(&table, &User::NoAuth, &["table", "name", "type"]);
        assert_eq!(result.len(), 6);
        assert_eq!(
            result[0],
            vec![Value::from("commands"), Value::from("name"), Value::from("string")]
        );
        assert_eq!(result[5][..2], [Value::from("columns"), Value::from("type")]);
    }
}
