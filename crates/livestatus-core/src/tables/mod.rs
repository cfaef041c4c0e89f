//! Row sources and their column catalogs.
//!
//! ```text
//!   Store ──name──▶ Box<dyn Table> ──answer_query──▶ Row ──▶ Query sink
//!                        │
//!                        └─ ColumnCatalog (own columns + joined prefixes)
//! ```
//!
//! Every table registers its columns once at startup. Joined columns
//! (`host_` columns of services, `current_service_` columns of the log)
//! reuse the other table's `add_columns` with a prefix and an offset
//! chain leading from this table's row to the joined object.

pub mod by_group;
pub mod check_columns;
pub mod columns;
pub mod commands;
pub mod comments;
pub mod contacts;
pub mod crash_reports;
pub mod downtimes;
pub mod event_console;
pub mod groups;
pub mod hosts;
pub mod labels;
pub mod log;
pub mod services;
pub mod statehist;
pub mod status;
pub mod timeperiods;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::auth::User;
use crate::column::{Column, ColumnCatalog, Row};
use crate::config::Settings;
use crate::core::MonitoringCore;
use crate::counters::Counters;
use crate::error::RequestError;
use crate::filter::Filter;
use crate::logs::LogCache;
use crate::timeperiods_cache::TimeperiodsCache;
use crate::triggers::Triggers;

/// Shared engine state the tables and their columns read from.
pub struct Context {
    pub core: Arc<dyn MonitoringCore>,
    pub settings: Settings,
    pub timeperiods: TimeperiodsCache,
    pub counters: Arc<Counters>,
    pub triggers: Triggers,
    pub log_cache: LogCache,
    pub should_terminate: Arc<AtomicBool>,
}

impl Context {
    pub fn new(core: Arc<dyn MonitoringCore>, settings: Settings, should_terminate: Arc<AtomicBool>) -> Self {
        let counters = Arc::new(Counters::new());
        let log_cache = LogCache::new(
            settings.log_file.clone(),
            settings.log_archive_path.clone(),
            settings.max_cached_messages,
            settings.max_lines_per_logfile,
        )
        .with_counters(Arc::clone(&counters));
        Self {
            core,
            settings,
            timeperiods: TimeperiodsCache::new(),
            counters,
            triggers: Triggers::new(),
            log_cache,
            should_terminate,
        }
    }

    pub fn should_terminate(&self) -> bool {
        self.should_terminate.load(Ordering::Relaxed)
    }
}

/// What a table may look at while producing rows.
pub struct Scope<'q> {
    pub filter: &'q Filter,
    pub user: &'q User,
    pub timezone_offset: i64,
}

/// Receives rows; returning `false` stops the table.
pub type RowSink<'s> = &'s mut dyn for<'r> FnMut(Row<'r>) -> bool;

pub trait Table: Send + Sync {
    fn name(&self) -> &'static str;

    /// Prefix that may be omitted from column names, e.g. `host_`.
    fn name_prefix(&self) -> &'static str;

    fn catalog(&self) -> &ColumnCatalog;

    fn column(&self, name: &str) -> Result<Arc<Column>, RequestError> {
        find_column(self.catalog(), self.name(), self.name_prefix(), name)
    }

    /// Feeds every row the user may see into `sink`.
    fn answer_query(&self, scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError>;

    /// Looks up one row by primary key and hands it to `check`.
    fn with_row(
        &self,
        key: &str,
        _user: &User,
        _check: &mut dyn for<'r> FnMut(Row<'r>) -> bool,
    ) -> Result<bool, RequestError> {
        Err(RequestError::bad_request(format!(
            "Table '{}' has no primary key, cannot wait for object '{}'",
            self.name(),
            key
        )))
    }
}

/// Exact name first, then the name without the table prefix.
pub fn find_column(
    catalog: &ColumnCatalog,
    table: &str,
    prefix: &str,
    name: &str,
) -> Result<Arc<Column>, RequestError> {
    catalog
        .find(name)
        .or_else(|| name.strip_prefix(prefix).and_then(|rest| catalog.find(rest)))
        .ok_or_else(|| RequestError::bad_request(format!("Table '{table}' has no column '{name}'")))
}

pub(crate) fn primary_key_not_found(table: &str, key: &str) -> RequestError {
    RequestError::bad_request(format!("primary key '{key}' not found in table '{table}'"))
}

/// Table without columns or rows. Requests for unknown tables parse
/// their headers against it, so `ResponseHeader:` and `KeepAlive:` still
/// apply to the error answer.
#[derive(Default)]
pub struct DummyTable {
    catalog: ColumnCatalog,
}

impl Table for DummyTable {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn name_prefix(&self) -> &'static str {
        "dummy_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, _scope: &Scope<'_>, _sink: RowSink<'_>) -> Result<(), RequestError> {
        Ok(())
    }
}

/// Every table, in the order `columns` lists them.
pub fn all_tables(ctx: &Arc<Context>) -> Vec<Box<dyn Table>> {
    let mut tables: Vec<Box<dyn Table>> = vec![
        Box::new(hosts::HostsTable::new(ctx)),
        Box::new(services::ServicesTable::new(ctx)),
        Box::new(groups::HostGroupsTable::new(ctx)),
        Box::new(groups::ServiceGroupsTable::new(ctx)),
        Box::new(groups::ContactGroupsTable::new(ctx)),
        Box::new(by_group::HostsByGroupTable::new(ctx)),
        Box::new(by_group::ServicesByGroupTable::new(ctx)),
        Box::new(by_group::ServicesByHostGroupTable::new(ctx)),
        Box::new(contacts::ContactsTable::new(ctx)),
        Box::new(commands::CommandsTable::new(ctx)),
        Box::new(downtimes::DowntimesTable::new(ctx)),
        Box::new(comments::CommentsTable::new(ctx)),
        Box::new(timeperiods::TimeperiodsTable::new(ctx)),
        Box::new(labels::LabelsTable::new(ctx)),
        Box::new(status::StatusTable::new(ctx)),
        Box::new(log::LogTable::new(ctx)),
        Box::new(statehist::StateHistoryTable::new(ctx)),
        Box::new(crash_reports::CrashReportsTable::new(ctx)),
        Box::new(event_console::EventConsoleTable::events(ctx)),
        Box::new(event_console::EventConsoleTable::history(ctx)),
        Box::new(event_console::EventConsoleTable::status(ctx)),
        Box::new(event_console::EventConsoleTable::rules(ctx)),
    ];
    let columns = columns::ColumnsTable::new(&tables);
    tables.push(Box::new(columns));
    tables
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::core::{InMemoryCore, ObjectDefinitions};

    pub fn context() -> Arc<Context> {
        context_with(Settings::default())
    }

    pub fn context_with(settings: Settings) -> Arc<Context> {
        let core = Arc::new(InMemoryCore::new(ObjectDefinitions::typical_site()));
        Arc::new(Context::new(core, settings, Arc::new(AtomicBool::new(false))))
    }

    /// Values of `columns` for every row the table yields.
    pub fn rows(table: &dyn Table, user: &User, columns: &[&str]) -> Vec<Vec<crate::column::Value>> {
        let columns: Vec<_> = columns.iter().map(|c| table.column(c).unwrap()).collect();
        let filter = Filter::tautology();
        let scope = Scope {
            filter: &filter,
            user,
            timezone_offset: 0,
        };
        let mut result = Vec::new();
        table
            .answer_query(&scope, &mut |row| {
                result.push(columns.iter().map(|c| c.get(row, user)).collect());
                true
            })
            .unwrap();
        result
    }
}
