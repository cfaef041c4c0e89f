//! The `status` table: one row of program state and engine statistics.

use std::sync::Arc;

use super::{Context, RowSink, Scope, Table};
use crate::auth::User;
use crate::column::{Column, ColumnCatalog, ColumnOffsets, Row};
use crate::core::ProgramStatus;
use crate::counters::Counter;
use crate::error::RequestError;

/// Version reported in `livestatus_version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct StatusRow {
    pub program: ProgramStatus,
}

macro_rules! program_flags {
    ($catalog:expr, $offsets:expr, $($field:ident: $desc:literal),* $(,)?) => {
        $(
            $catalog.add(Column::bool(stringify!($field), $desc, $offsets, |s: &StatusRow| s.program.$field));
        )*
    };
}

pub struct StatusTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

impl StatusTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let offsets = ColumnOffsets::new();
        let mut catalog = ColumnCatalog::new();

        for counter in Counter::ALL {
            let c = Arc::clone(ctx);
            catalog.add(Column::double(
                counter.column_name(),
                &format!("The number of {} since program start", counter.column_name().replace('_', " ")),
                &offsets,
                move |_: &StatusRow| c.counters.value(counter) as f64,
            ));
            let c = Arc::clone(ctx);
            catalog.add(Column::double(
                &format!("{}_rate", counter.column_name()),
                &format!("The averaged number of {} per second", counter.column_name().replace('_', " ")),
                &offsets,
                move |_: &StatusRow| c.counters.rate(counter),
            ));
        }

        catalog.add(Column::string("program_version", "The version of the monitoring daemon", &offsets, |s: &StatusRow| {
            s.program.program_version.clone()
        }));
        catalog.add(Column::time("program_start", "The time of the last program start as UNIX timestamp", &offsets, |s: &StatusRow| {
            s.program.program_start
        }));
        catalog.add(Column::int("nagios_pid", "The process ID of the monitoring core", &offsets, |s: &StatusRow| {
            s.program.pid
        }));
        catalog.add(Column::int("interval_length", "The default interval length", &offsets, |s: &StatusRow| {
            s.program.interval_length
        }));
        catalog.add(Column::time("last_log_rotation", "Time of the last log file rotation", &offsets, |s: &StatusRow| {
            s.program.last_log_rotation
        }));
        catalog.add(Column::time("last_command_check", "The time of the last check for a command as UNIX timestamp", &offsets, |s: &StatusRow| {
            s.program.last_command_check
        }));
        program_flags!(catalog, &offsets,
            enable_notifications: "Whether notifications are enabled in general (0/1)",
            execute_service_checks: "Whether active service checks are activated in general (0/1)",
            accept_passive_service_checks: "Whether passive service checks are activated in general (0/1)",
            execute_host_checks: "Whether host checks are executed in general (0/1)",
            accept_passive_host_checks: "Whether passive host checks are accepted in general (0/1)",
            enable_event_handlers: "Whether event handlers are activated in general (0/1)",
            obsess_over_services: "Whether the core will obsess over service checks (0/1)",
            obsess_over_hosts: "Whether the core will obsess over host checks (0/1)",
            check_service_freshness: "Whether service freshness checking is activated in general (0/1)",
            check_host_freshness: "Whether host freshness checking is activated in general (0/1)",
            enable_flap_detection: "Whether flap detection is activated in general (0/1)",
            process_performance_data: "Whether processing of performance data is activated in general (0/1)",
            check_external_commands: "Whether the core checks for external commands at its command pipe (0/1)",
        );

        catalog.add(Column::string("livestatus_version", "The version of the query engine", &offsets, |_: &StatusRow| {
            VERSION.to_string()
        }));
        let c = Arc::clone(ctx);
        catalog.add(Column::int("livestatus_active_connections", "The current number of active connections", &offsets, move |_: &StatusRow| {
            c.counters.active_connections()
        }));
        let c = Arc::clone(ctx);
        catalog.add(Column::int("livestatus_queued_connections", "The current number of queued connections", &offsets, move |_: &StatusRow| {
            c.counters.queued_connections()
        }));
        let threads = ctx.settings.num_client_threads as i64;
        catalog.add(Column::int("livestatus_threads", "The maximum number of connections handled in parallel", &offsets, move |_: &StatusRow| {
            threads
        }));
        let c = Arc::clone(ctx);
        catalog.add(Column::int("cached_log_messages", "The current number of log messages held in the cache", &offsets, move |_: &StatusRow| {
            c.log_cache.cached_messages() as i64
        }));
        let c = Arc::clone(ctx);
        catalog.add(Column::int("num_hosts", "The total number of hosts", &offsets, move |_: &StatusRow| {
            let mut n = 0;
            c.core.all_of_hosts(&mut |_| {
                n += 1;
                true
            });
            n
        }));
        let c = Arc::clone(ctx);
        catalog.add(Column::int("num_services", "The total number of services", &offsets, move |_: &StatusRow| {
            let mut n = 0;
            c.core.all_of_services(&mut |_| {
                n += 1;
                true
            });
            n
        }));

        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }

    fn row(&self) -> StatusRow {
        StatusRow {
            program: self.ctx.core.program_status(),
        }
    }
}

impl Table for StatusTable {
    fn name(&self) -> &'static str {
        "status"
    }

    fn name_prefix(&self) -> &'static str {
        "status_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, _scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        sink(Row::new(&self.row()));
        Ok(())
    }

    /// The single row matches any key.
    fn with_row(
        &self,
        _key: &str,
        _user: &User,
        check: &mut dyn for<'r> FnMut(Row<'r>) -> bool,
    ) -> Result<bool, RequestError> {
        Ok(check(Row::new(&self.row())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Value;
    use crate::tables::testing::{context, rows};

    #[test]
    fn test_single_row() {
        let ctx = context();
        ctx.counters.increment(Counter::Requests);
        ctx.counters.increment(Counter::Requests);
        let table = StatusTable::new(&ctx);
        let result = rows(
            &table,
            &User::NoAuth,
            &["program_version", "nagios_pid", "requests", "enable_notifications", "num_services", "livestatus_threads"],
        );
        assert_eq!(
            result,
            vec![vec![
                Value::from("2.3.0"),
                Value::Int(4711),
                Value::Double(2.0),
                Value::Int(1),
                Value::Int(5),
                Value::Int(10),
            ]]
        );
    }

    #[test]
    fn test_counter_columns() {
        let table = StatusTable::new(&context());
        for name in ["connections", "external_commands_rate", "livestatus_overflows", "log_messages_rate"] {
            assert!(table.column(name).is_ok(), "{name}");
        }
        assert!(table.with_row("anything", &User::NoAuth, &mut |_| true).unwrap());
    }
}
