//! The `commands` table.

use std::sync::Arc;

use super::{Context, RowSink, Scope, Table};
use crate::column::{Column, ColumnCatalog, ColumnOffsets, Row};
use crate::core::{Command, MonitoringCore};
use crate::error::RequestError;

pub struct CommandsTable {
    core: Arc<dyn MonitoringCore>,
    catalog: ColumnCatalog,
}

impl CommandsTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let offsets = ColumnOffsets::new();
        let mut catalog = ColumnCatalog::new();
        catalog.add(Column::string("name", "The name of the command", &offsets, |c: &Command| c.name.clone()));
        catalog.add(Column::string("line", "The shell command line", &offsets, |c: &Command| c.line.clone()));
        Self {
            core: Arc::clone(&ctx.core),
            catalog,
        }
    }
}

impl Table for CommandsTable {
    fn name(&self) -> &'static str {
        "commands"
    }

    fn name_prefix(&self) -> &'static str {
        "command_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, _scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        self.core.all_of_commands(&mut |command| sink(Row::new(&**command)));
        Ok(())
    }
}
