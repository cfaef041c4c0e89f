//! The `log` table: history entries, newest first.
//!
//! The `time` bounds of the filter select which history files are
//! loaded at all. Entries are joined with the objects that currently
//! exist under the logged names (`current_host_*`, `current_service_*`,
//! `current_contact_*`).

use std::sync::Arc;

use chrono::Utc;

use super::{Context, RowSink, Scope, Table, contacts, find_column, hosts, services};
use crate::column::{Column, ColumnCatalog, ColumnOffsets, Row};
use crate::core::{Contact, Host, Service};
use crate::error::RequestError;
use crate::logs::{LogEntry, Logfile};

pub struct LogRow {
    pub file: Logfile,
    pub index: usize,
    pub host: Option<Arc<Host>>,
    pub service: Option<Arc<Service>>,
    pub contact: Option<Arc<Contact>>,
}

impl LogRow {
    pub fn entry(&self) -> &LogEntry {
        &self.file[self.index]
    }
}

/// Lookup falling back to the joined `current_` columns, so `host_alias`
/// finds `current_host_alias`.
pub(crate) fn find_with_current(table: &dyn Table, name: &str) -> Result<Arc<Column>, RequestError> {
    find_column(table.catalog(), table.name(), table.name_prefix(), name)
        .or_else(|e| table.catalog().find(&format!("current_{name}")).ok_or(e))
}

pub struct LogTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

impl LogTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let offsets = ColumnOffsets::new().add(|row| row.raw::<LogRow>().map(|r| Row::new(r.entry())));
        let mut catalog = ColumnCatalog::new();
        catalog.add(Column::time("time", "Time of the log event (UNIX timestamp)", &offsets, |e: &LogEntry| e.time));
        catalog.add(Column::int("lineno", "The number of the line in the log file", &offsets, |e: &LogEntry| {
            e.lineno as i64
        }));
        catalog.add(Column::int(
            "class",
            "The class of the message as integer (0:info, 1:state, 2:program, 3:notification, 4:passive, 5:command)",
            &offsets,
            |e: &LogEntry| e.class as i64,
        ));
        catalog.add(Column::string("message", "The complete message line including the timestamp", &offsets, |e: &LogEntry| {
            e.message.clone()
        }));
        catalog.add(Column::string("type", "The type of the message (text before the colon), the message itself for info messages", &offsets, |e: &LogEntry| {
            e.type_name.clone()
        }));
        catalog.add(Column::string("options", "The part of the message after the ':'", &offsets, |e: &LogEntry| {
            e.options.clone()
        }));
        catalog.add(Column::string("comment", "A comment field used in various message types", &offsets, |e: &LogEntry| {
            e.comment.clone()
        }));
        catalog.add(Column::string("plugin_output", "The output of the check, if any is associated with the message", &offsets, |e: &LogEntry| {
            e.plugin_output.clone()
        }));
        catalog.add(Column::string(
            "long_plugin_output",
            "The complete output of the check, if any is associated with the message",
            &offsets,
            |e: &LogEntry| e.long_plugin_output.clone(),
        ));
        catalog.add(Column::int("state", "The state of the host or service in question", &offsets, |e: &LogEntry| {
            i64::from(e.state)
        }));
        catalog.add(Column::string("state_type", "The type of the state (varies on different log classes)", &offsets, |e: &LogEntry| {
            e.state_type.clone()
        }));
        catalog.add(Column::string("state_info", "Additional information about the state", &offsets, |e: &LogEntry| {
            e.state_info()
        }));
        catalog.add(Column::int("attempt", "The number of the check attempt", &offsets, |e: &LogEntry| {
            i64::from(e.attempt)
        }));
        catalog.add(Column::string("service_description", "The description of the service log entry is about (might be empty)", &offsets, |e: &LogEntry| {
            e.service_description.clone()
        }));
        catalog.add(Column::string("host_name", "The name of the host the log entry is about (might be empty)", &offsets, |e: &LogEntry| {
            e.host_name.clone()
        }));
        catalog.add(Column::string("contact_name", "The name of the contact the log entry is about (might be empty)", &offsets, |e: &LogEntry| {
            e.contact_name.clone()
        }));
        catalog.add(Column::string("command_name", "The name of the command of the log entry (e.g. for notifications)", &offsets, |e: &LogEntry| {
            e.command_name.clone()
        }));

        let root = ColumnOffsets::new();
        hosts::add_columns(
            &mut catalog,
            ctx,
            "current_host_",
            &root.add(|row| row.raw::<LogRow>().and_then(|r| r.host.as_deref()).map(Row::new)),
        );
        services::add_columns(
            &mut catalog,
            ctx,
            "current_service_",
            &root.add(|row| row.raw::<LogRow>().and_then(|r| r.service.as_deref()).map(Row::new)),
            false,
        );
        contacts::add_columns(
            &mut catalog,
            ctx,
            "current_contact_",
            &root.add(|row| row.raw::<LogRow>().and_then(|r| r.contact.as_deref()).map(Row::new)),
        );
        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }

    fn row(&self, file: &Logfile, index: usize) -> LogRow {
        let entry = &file[index];
        let core = &self.ctx.core;
        let host = (!entry.host_name.is_empty())
            .then(|| core.find_host(&entry.host_name))
            .flatten();
        let service = (!entry.service_description.is_empty())
            .then(|| core.find_service(&entry.host_name, &entry.service_description))
            .flatten();
        let contact = (!entry.contact_name.is_empty())
            .then(|| core.find_contact(&entry.contact_name))
            .flatten();
        LogRow {
            file: Arc::clone(file),
            index,
            host,
            service,
            contact,
        }
    }
}

impl Table for LogTable {
    fn name(&self) -> &'static str {
        "log"
    }

    fn name_prefix(&self) -> &'static str {
        "log_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn column(&self, name: &str) -> Result<Arc<Column>, RequestError> {
        find_with_current(self, name)
    }

    fn answer_query(&self, scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        let since = scope.filter.greatest_lower_bound_for("time", scope.timezone_offset).unwrap_or(0);
        let until = scope
            .filter
            .least_upper_bound_for("time", scope.timezone_offset)
            .unwrap_or_else(|| Utc::now().timestamp());
        if since > until {
            return Ok(());
        }

        for file in self.ctx.log_cache.logfiles_between(since, until).iter().rev() {
            for index in (0..file.len()).rev() {
                let entry = &file[index];
                if entry.time > until {
                    continue;
                }
                if entry.time < since {
                    return Ok(());
                }
                let row = self.row(file, index);
                // Entries without a host, e.g. program messages, are public.
                if !scope
                    .user
                    .is_authorized_for_object(row.host.as_deref(), row.service.as_deref(), entry.host_name.is_empty())
                {
                    continue;
                }
                if !sink(Row::new(&row)) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use crate::auth::User;
    use crate::column::Value;
    use crate::config::Settings;
    use crate::filter::{ColumnFilter, Filter, RelationalOperator};
    use crate::tables::testing::{context_with, rows};

    fn history(dir: &Path) -> Settings {
        let archive = dir.join("archive");
        fs::create_dir(&archive).unwrap();
        fs::write(
            archive.join("1.log"),
            "[1000] LOG VERSION: 2.0\n\
             [1010] HOST ALERT: otherhost;DOWN;HARD;1;timeout\n\
             [1020] SERVICE ALERT: myhost;CPU load;CRITICAL;HARD;3;load too high\n",
        )
        .unwrap();
        let log_file = dir.join("current.log");
        fs::write(
            &log_file,
            "[2000] LOG VERSION: 2.0\n\
             [2010] HOST NOTIFICATION: alice;myhost;DOWN;notify-by-mail;gone\n\
             [2020] EXTERNAL COMMAND: SCHEDULE_FORCED_HOST_CHECK;myhost;2020\n",
        )
        .unwrap();
        Settings {
            log_file: Some(log_file),
            log_archive_path: Some(archive),
            ..Settings::default()
        }
    }

    #[test]
    fn test_newest_first_with_joins() {
        let dir = tempfile::tempdir().unwrap();
        let table = LogTable::new(&context_with(history(dir.path())));
        let result = rows(&table, &User::NoAuth, &["time", "type", "host_name", "current_host_address", "state"]);
        assert_eq!(result.len(), 6);
        assert_eq!(result[0][0], Value::Time(2020));
        assert_eq!(result[0][1], Value::from("EXTERNAL COMMAND"));
        assert_eq!(result[1][3], Value::from("127.0.0.1"));
        assert_eq!(result[1][4], Value::Int(1));
        assert_eq!(result[5][0], Value::Time(1000));
    }

    #[test]
    fn test_current_prefix_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let table = LogTable::new(&context_with(history(dir.path())));
        assert_eq!(table.column("host_alias").unwrap().name(), "current_host_alias");
        assert_eq!(table.column("host_name").unwrap().name(), "host_name");
        assert!(table.column("bogus").is_err());
    }

    #[test]
    fn test_time_bounds_and_authorization() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_with(history(dir.path()));
        let table = LogTable::new(&ctx);
        let time = table.column("time").unwrap();
        let filter = Filter::and(vec![
            Filter::Column(ColumnFilter::new(Arc::clone(&time), RelationalOperator::GreaterOrEqual, "1010").unwrap()),
            Filter::Column(ColumnFilter::new(time, RelationalOperator::Less, "2000").unwrap()),
        ]);
        let alice = User::resolve(ctx.core.as_ref(), "alice", Default::default());
        let scope = Scope {
            filter: &filter,
            user: &alice,
            timezone_offset: 0,
        };
        let message = table.column("message").unwrap();
        let mut messages = Vec::new();
        table
            .answer_query(&scope, &mut |row| {
                messages.push(message.get(row, &alice));
                true
            })
            .unwrap();
        // otherhost is not visible to alice.
        assert_eq!(
            messages,
            vec![Value::from("[1020] SERVICE ALERT: myhost;CPU load;CRITICAL;HARD;3;load too high")]
        );
    }
}
