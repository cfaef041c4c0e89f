//! Event console tables, answered by the event daemon over its status socket.
//!
//! ```text
//!   GET events ──▶ UNIX socket (mkeventd_socket) ──▶ tab separated rows
//!                                                    first row: column names
//! ```
//!
//! List values are separated by `\x01`. Rows of `events` and `history`
//! are joined with the `host_` columns of the event's host; `status` and
//! `rules` rows belong to the daemon itself and are public.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::{Context, RowSink, Scope, Table, hosts};
use crate::auth::User;
use crate::column::{Column, ColumnCatalog, ColumnOffsets, ColumnType, Row};
use crate::core::Host;
use crate::error::RequestError;
use crate::util::strings::{parse_leading_double, parse_leading_int};

const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

const LIST_SEPARATOR: char = '\x01';

const EVENT_COLUMNS: &[(&str, ColumnType, &str)] = &[
    ("event_id", ColumnType::Int, "The unique ID for this event"),
    ("event_count", ColumnType::Int, "The number of occurrences of this event within period"),
    ("event_text", ColumnType::String, "The textual description of the event"),
    ("event_first", ColumnType::Time, "Time of the first occurrence of the event (UNIX timestamp)"),
    ("event_last", ColumnType::Time, "Time of the last occurrence of this event (UNIX timestamp)"),
    ("event_comment", ColumnType::String, "Event comment"),
    ("event_sl", ColumnType::Int, "The service level for this event"),
    ("event_host", ColumnType::String, "Host name for this event"),
    ("event_contact", ColumnType::String, "Contact information"),
    ("event_application", ColumnType::String, "Syslog tag/application"),
    ("event_pid", ColumnType::Int, "The process ID of the originating process"),
    ("event_priority", ColumnType::Int, "Syslog priority"),
    ("event_facility", ColumnType::Int, "The syslog facility"),
    ("event_rule_id", ColumnType::String, "The ID of the rule"),
    ("event_state", ColumnType::Int, "The state of the event (0/1/2/3)"),
    ("event_phase", ColumnType::String, "The phase the event is currently in (one of open/closed/delayed/counting/ack)"),
    ("event_owner", ColumnType::String, "The owner of the event"),
    ("event_match_groups", ColumnType::List, "Text groups from regular expression match"),
    ("event_contact_groups", ColumnType::List, "Contact groups"),
    ("event_ipaddress", ColumnType::String, "The IP address where the event originated"),
    ("event_core_host", ColumnType::String, "Host name in the monitoring core"),
];

const HISTORY_COLUMNS: &[(&str, ColumnType, &str)] = &[
    ("history_line", ColumnType::Int, "The line number of the event in the history file"),
    ("history_time", ColumnType::Time, "Time when the event was written into the history file (UNIX timestamp)"),
    ("history_what", ColumnType::String, "What happened (one of ARCHIVED/AUTODELETE/CANCELLED/CHANGESTATE/COUNTFAILED/COUNTREACHED/DELAYOVER/DELETE/EMAIL/EXPIRED/NEW/NOCOUNT/ORPHANED/SCRIPT/UPDATE)"),
    ("history_who", ColumnType::String, "The user who triggered the command"),
    ("history_addinfo", ColumnType::String, "Additional information, like email recipient/subject or action ID"),
];

const STATUS_COLUMNS: &[(&str, ColumnType, &str)] = &[
    ("status_config_load_time", ColumnType::Time, "The time when the configuration was loaded"),
    ("status_num_open_events", ColumnType::Int, "The number of currently open events"),
    ("status_virtual_memory_size", ColumnType::Int, "The current virtual memory size in bytes"),
    ("status_messages", ColumnType::Int, "The number of messages received since startup"),
    ("status_message_rate", ColumnType::Double, "The incoming message rate"),
    ("status_average_message_rate", ColumnType::Double, "The averaged incoming message rate"),
    ("status_connects", ColumnType::Int, "The number of connects since startup"),
    ("status_connect_rate", ColumnType::Double, "The connect rate"),
    ("status_rule_tries", ColumnType::Int, "The number of rule tries since startup"),
    ("status_rule_hits", ColumnType::Int, "The number of rule hits since startup"),
    ("status_rule_hit_rate", ColumnType::Double, "The rule hit rate"),
    ("status_drops", ColumnType::Int, "The number of message drops since startup"),
    ("status_events", ColumnType::Int, "The number of events received since startup"),
    ("status_event_rate", ColumnType::Double, "The event rate"),
    ("status_replication_slavemode", ColumnType::String, "The replication slave mode (empty if not running as slave)"),
    ("status_replication_last_sync", ColumnType::Time, "Time of the last replication (UNIX timestamp)"),
    ("status_replication_success", ColumnType::Int, "Whether the replication succeeded (0/1)"),
    ("status_event_limit_active_overall", ColumnType::Int, "Whether the overall event limit is active (0/1)"),
];

const RULE_COLUMNS: &[(&str, ColumnType, &str)] = &[
    ("rule_id", ColumnType::String, "The ID of the rule"),
    ("rule_hits", ColumnType::Int, "The number of rule hits since startup"),
];

/// One row of the event daemon's answer.
pub struct EventRow {
    pub values: HashMap<String, String>,
    pub host: Option<Arc<Host>>,
}

impl EventRow {
    fn get(&self, column: &str) -> &str {
        self.values.get(column).map_or("", String::as_str)
    }

    fn contact_groups(&self) -> Vec<String> {
        split_list(self.get("event_contact_groups"))
    }

    /// Events with contact groups are visible to their members, the
    /// others follow the rules of their host. Unknown hosts are public.
    fn is_authorized(&self, user: &User) -> bool {
        let groups = self.contact_groups();
        if !groups.is_empty() {
            return user.is_member_of_any(&groups);
        }
        match &self.host {
            Some(host) => user.is_authorized_for_host(host),
            None => true,
        }
    }
}

fn split_list(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(LIST_SEPARATOR).map(str::to_string).collect()
}

fn remote_column(name: &str, kind: ColumnType, description: &str, offsets: &ColumnOffsets) -> Column {
    let key = name.to_string();
    match kind {
        ColumnType::Int => Column::int(name, description, offsets, move |r: &EventRow| parse_leading_int(r.get(&key))),
        ColumnType::Double => Column::double(name, description, offsets, move |r: &EventRow| parse_leading_double(r.get(&key))),
        ColumnType::Time => Column::time(name, description, offsets, move |r: &EventRow| parse_leading_int(r.get(&key))),
        ColumnType::List => Column::string_list(name, description, offsets, move |r: &EventRow| split_list(r.get(&key))),
        _ => Column::string(name, description, offsets, move |r: &EventRow| r.get(&key).to_string()),
    }
}

pub struct EventConsoleTable {
    ctx: Arc<Context>,
    name: &'static str,
    /// Table name on the event daemon side.
    remote: &'static str,
    socket: Option<PathBuf>,
    /// Rows refer to a host and follow its authorization.
    per_host: bool,
    catalog: ColumnCatalog,
}

impl EventConsoleTable {
    fn new(
        ctx: &Arc<Context>,
        name: &'static str,
        remote: &'static str,
        per_host: bool,
        groups: &[&[(&str, ColumnType, &str)]],
    ) -> Self {
        let offsets = ColumnOffsets::new();
        let mut catalog = ColumnCatalog::new();
        for (column, kind, description) in groups.iter().flat_map(|g| g.iter()) {
            catalog.add(remote_column(column, *kind, description, &offsets));
        }
        if per_host {
            hosts::add_columns(
                &mut catalog,
                ctx,
                "host_",
                &offsets.add(|row| row.raw::<EventRow>().and_then(|r| r.host.as_deref()).map(Row::new)),
            );
        }
        Self {
            ctx: Arc::clone(ctx),
            name,
            remote,
            socket: ctx.settings.mkeventd_socket.clone(),
            per_host,
            catalog,
        }
    }

    pub fn events(ctx: &Arc<Context>) -> Self {
        Self::new(ctx, "eventconsoleevents", "events", true, &[EVENT_COLUMNS])
    }

    pub fn history(ctx: &Arc<Context>) -> Self {
        Self::new(ctx, "eventconsolehistory", "history", true, &[HISTORY_COLUMNS, EVENT_COLUMNS])
    }

    pub fn status(ctx: &Arc<Context>) -> Self {
        Self::new(ctx, "eventconsolestatus", "status", false, &[STATUS_COLUMNS])
    }

    pub fn rules(ctx: &Arc<Context>) -> Self {
        Self::new(ctx, "eventconsolerules", "rules", false, &[RULE_COLUMNS])
    }

    /// Sends the query and returns the header and the data rows.
    fn fetch(&self) -> Result<(Vec<String>, Vec<Vec<String>>), RequestError> {
        let path = self
            .socket
            .as_ref()
            .ok_or_else(|| RequestError::bad_gateway("event console socket not configured"))?;
        let unreachable =
            |e: std::io::Error| RequestError::bad_gateway(format!("cannot query event console at {}: {}", path.display(), e));

        let mut stream = UnixStream::connect(path).map_err(unreachable)?;
        stream.set_read_timeout(Some(SOCKET_TIMEOUT)).map_err(unreachable)?;
        stream.set_write_timeout(Some(SOCKET_TIMEOUT)).map_err(unreachable)?;
        write!(stream, "GET {}\nOutputFormat: plain\n", self.remote).map_err(unreachable)?;
        stream.shutdown(Shutdown::Write).map_err(unreachable)?;

        let mut lines = BufReader::new(stream).lines();
        let header = match lines.next() {
            Some(line) => line.map_err(unreachable)?.split('\t').map(str::to_string).collect(),
            None => return Ok((Vec::new(), Vec::new())),
        };
        let mut rows = Vec::new();
        for line in lines {
            let line = line.map_err(unreachable)?;
            if !line.is_empty() {
                rows.push(line.split('\t').map(str::to_string).collect());
            }
        }
        debug!("event console answered {} rows for {}", rows.len(), self.remote);
        Ok((header, rows))
    }

    fn row(&self, header: &[String], fields: Vec<String>) -> EventRow {
        let values: HashMap<String, String> = header.iter().cloned().zip(fields).collect();
        if !self.per_host {
            return EventRow { values, host: None };
        }
        let host = values
            .get("event_core_host")
            .filter(|h| !h.is_empty())
            .or_else(|| values.get("event_host"))
            .and_then(|name| self.ctx.core.find_host(name));
        EventRow { values, host }
    }
}

impl Table for EventConsoleTable {
    fn name(&self) -> &'static str {
        self.name
    }

    fn name_prefix(&self) -> &'static str {
        "eventconsole_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        let (header, rows) = self.fetch()?;
        for fields in rows {
            let row = self.row(&header, fields);
            if self.per_host && !row.is_authorized(scope.user) {
                continue;
            }
            if !sink(Row::new(&row)) {
                break;
            }
        }
        Ok(())
    }
}
