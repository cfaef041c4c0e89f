//! The `statehist` table: availability spans reconstructed from history.
//!
//! ```text
//!   history ──replay──▶ HostServiceState per object ──span closed──▶ row
//!   [.. since)  only update the states
//!   [since .. until)  every state change closes a span
//!   until  close every open span
//! ```
//!
//! A query must bound `time` from below. Objects that vanish after a
//! core restart (no `INITIAL ... STATE` line after `logging initial
//! states`) become UNMONITORED (-1) until they reappear.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use super::log::find_with_current;
use super::{Context, RowSink, Scope, Table, hosts, services};
use crate::auth::User;
use crate::column::{Column, ColumnCatalog, ColumnOffsets, Row};
use crate::core::{Host, Service};
use crate::error::RequestError;
use crate::filter::Filter;
use crate::logs::{LogEntry, LogEntryKind};

/// Newly seen objects get this long before a late appearance counts as
/// unmonitored time.
const STARTUP_GRACE_SECS: i64 = 600;

const UNMONITORED: i32 = -1;

#[derive(Debug, Clone, Default)]
pub struct HostServiceState {
    pub is_host: bool,
    pub host: Option<Arc<Host>>,
    pub service: Option<Arc<Service>>,
    pub host_name: String,
    pub service_description: String,

    pub time: i64,
    pub lineno: usize,
    pub from: i64,
    pub until: i64,
    pub duration: i64,
    pub duration_part: f64,
    /// Durations split by state: unmonitored, ok, warning, critical, unknown.
    pub durations: [i64; 5],
    pub duration_parts: [f64; 5],

    pub state: i32,
    pub host_down: bool,
    pub in_downtime: bool,
    pub in_host_downtime: bool,
    pub is_flapping: bool,
    pub in_notification_period: i32,
    pub in_service_period: i32,
    pub notification_period: String,
    pub service_period: String,
    pub debug_info: String,
    pub log_output: String,
    pub long_log_output: String,

    may_no_longer_exist: bool,
    has_vanished: bool,
    last_known_time: i64,
    /// Indices of this host's service states.
    services: Vec<usize>,
}

impl HostServiceState {
    fn new(entry: &LogEntry, host: Option<Arc<Host>>, service: Option<Arc<Service>>) -> Self {
        let (notification_period, service_period) = match (&service, &host) {
            (Some(s), _) => (s.notification_period.clone(), s.service_period.clone()),
            (None, Some(h)) => (h.notification_period.clone(), h.service_period.clone()),
            (None, None) => Default::default(),
        };
        Self {
            is_host: entry.service_description.is_empty(),
            host,
            service,
            host_name: entry.host_name.clone(),
            service_description: entry.service_description.clone(),
            notification_period,
            service_period,
            in_notification_period: 1,
            in_service_period: 1,
            ..Default::default()
        }
    }

    fn apply_periods(&mut self, periods: &HashMap<String, i32>) {
        self.in_notification_period = periods.get(&self.notification_period).copied().unwrap_or(1);
        self.in_service_period = periods.get(&self.service_period).copied().unwrap_or(1);
    }

    fn is_authorized(&self, user: &User) -> bool {
        match (&self.host, &self.service) {
            (None, _) => *user == User::NoAuth,
            (Some(host), None) => user.is_authorized_for_host(host),
            (Some(_), Some(service)) => user.is_authorized_for_service(service),
        }
    }
}

/// `name;from;to` of a `TIMEPERIOD TRANSITION` line.
fn parse_transition(options: &str) -> Option<(&str, i32)> {
    let fields: Vec<&str> = options.split(';').collect();
    match fields.as_slice() {
        [name, from, to] => {
            from.trim().parse::<i32>().ok()?;
            Some((name, to.trim().parse().ok()?))
        }
        _ => None,
    }
}

fn started(entry: &LogEntry) -> bool {
    entry.state_type.starts_with("STARTED")
}

pub struct StateHistoryTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

macro_rules! state_durations {
    ($catalog:expr, $offsets:expr, $($index:literal => $name:literal, $label:literal);* $(;)?) => {
        $(
            $catalog.add(Column::int(
                concat!("duration_", $name),
                concat!($label, " duration of state (until - from)"),
                $offsets,
                |s: &HostServiceState| s.durations[$index],
            ));
            $catalog.add(Column::double(
                concat!("duration_part_", $name),
                concat!($label, " duration part in regard to the query timeframe"),
                $offsets,
                |s: &HostServiceState| s.duration_parts[$index],
            ));
        )*
    };
}

impl StateHistoryTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let offsets = ColumnOffsets::new();
        let mut catalog = ColumnCatalog::new();
        catalog.add(Column::time("time", "Time of the log event (UNIX timestamp)", &offsets, |s: &HostServiceState| s.time));
        catalog.add(Column::int("lineno", "The number of the line in the log file", &offsets, |s: &HostServiceState| {
            s.lineno as i64
        }));
        catalog.add(Column::time("from", "Start time of state (UNIX timestamp)", &offsets, |s: &HostServiceState| s.from));
        catalog.add(Column::time("until", "End time of state (UNIX timestamp)", &offsets, |s: &HostServiceState| s.until));
        catalog.add(Column::int("duration", "Duration of state (until - from)", &offsets, |s: &HostServiceState| {
            s.duration
        }));
        catalog.add(Column::double("duration_part", "Duration part in regard to the query timeframe", &offsets, |s: &HostServiceState| {
            s.duration_part
        }));
        catalog.add(Column::int(
            "state",
            "The state of the host or service in question - OK(0) / WARNING(1) / CRITICAL(2) / UNKNOWN(3) / UNMONITORED(-1)",
            &offsets,
            |s: &HostServiceState| i64::from(s.state),
        ));
        catalog.add(Column::bool("host_down", "Shows if the host of this service is down", &offsets, |s: &HostServiceState| {
            s.host_down
        }));
        catalog.add(Column::bool("in_downtime", "Shows if the host or service is in downtime", &offsets, |s: &HostServiceState| {
            s.in_downtime
        }));
        catalog.add(Column::bool("in_host_downtime", "Shows if the host of this service is in downtime", &offsets, |s: &HostServiceState| {
            s.in_host_downtime
        }));
        catalog.add(Column::bool("is_flapping", "Shows if the host or service is flapping", &offsets, |s: &HostServiceState| {
            s.is_flapping
        }));
        catalog.add(Column::int(
            "in_notification_period",
            "Shows if the host or service is within its notification period",
            &offsets,
            |s: &HostServiceState| i64::from(s.in_notification_period),
        ));
        catalog.add(Column::string(
            "notification_period",
            "The notification period of the host or service in question",
            &offsets,
            |s: &HostServiceState| s.notification_period.clone(),
        ));
        catalog.add(Column::int(
            "in_service_period",
            "Shows if the host or service is within its service period",
            &offsets,
            |s: &HostServiceState| i64::from(s.in_service_period),
        ));
        catalog.add(Column::string("service_period", "The service period of the host or service in question", &offsets, |s: &HostServiceState| {
            s.service_period.clone()
        }));
        catalog.add(Column::string("debug_info", "Debug information", &offsets, |s: &HostServiceState| {
            s.debug_info.clone()
        }));
        catalog.add(Column::string("host_name", "Host name", &offsets, |s: &HostServiceState| s.host_name.clone()));
        catalog.add(Column::string("service_description", "Description of the service", &offsets, |s: &HostServiceState| {
            s.service_description.clone()
        }));
        catalog.add(Column::string("log_output", "Logfile output relevant for this state", &offsets, |s: &HostServiceState| {
            s.log_output.clone()
        }));
        catalog.add(Column::string("long_log_output", "Complete logfile output relevant for this state", &offsets, |s: &HostServiceState| {
            s.long_log_output.clone()
        }));
        state_durations!(catalog, &offsets,
            1 => "ok", "OK";
            2 => "warning", "WARNING";
            3 => "critical", "CRITICAL";
            4 => "unknown", "UNKNOWN";
            0 => "unmonitored", "UNMONITORED";
        );

        hosts::add_columns(
            &mut catalog,
            ctx,
            "current_host_",
            &offsets.add(|row| row.raw::<HostServiceState>().and_then(|s| s.host.as_deref()).map(Row::new)),
        );
        services::add_columns(
            &mut catalog,
            ctx,
            "current_service_",
            &offsets.add(|row| row.raw::<HostServiceState>().and_then(|s| s.service.as_deref()).map(Row::new)),
            false,
        );
        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }
}

/// Emits closed spans and remembers whether the sink asked to stop.
struct Spans<'q, 's> {
    user: &'q User,
    sink: RowSink<'s>,
    timeframe: i64,
    aborted: bool,
}

impl Spans<'_, '_> {
    fn close(&mut self, state: &mut HostServiceState) {
        state.duration = state.until.saturating_sub(state.from);
        state.duration_part = state.duration as f64 / self.timeframe as f64;
        state.durations = [0; 5];
        state.duration_parts = [0.0; 5];
        if let Ok(slot) = usize::try_from(state.state + 1)
            && slot < state.durations.len()
        {
            state.durations[slot] = state.duration;
            state.duration_parts[slot] = state.duration_part;
        }
        if !self.aborted && state.is_authorized(self.user) && !(self.sink)(Row::new(&*state)) {
            self.aborted = true;
        }
        state.from = state.until;
    }
}

/// Replay of the history through one state per host and service.
struct Replay<'q, 's> {
    spans: Spans<'q, 's>,
    states: Vec<HostServiceState>,
    index: HashMap<(String, String), usize>,
    rejected: HashSet<(String, String)>,
    periods: HashMap<String, i32>,
    only_update: bool,
}

impl Replay<'_, '_> {
    /// Applies `entry` to the state at `i`; `false` if nothing changed.
    fn update(&mut self, entry: &LogEntry, i: usize) -> bool {
        let only_update = self.only_update;
        let state = &mut self.states[i];
        let spans = &mut self.spans;
        let mut close = |state: &mut HostServiceState| {
            if !only_update {
                spans.close(state);
            }
        };
        let mut changed = true;
        let is_transition = entry.kind == LogEntryKind::TimeperiodTransition;

        if !is_transition && state.has_vanished {
            state.time = state.last_known_time;
            state.until = state.last_known_time;
            close(state);
            state.may_no_longer_exist = false;
            state.has_vanished = false;
            state.state = UNMONITORED;
            state.debug_info = "UNMONITORED".to_string();
            state.in_downtime = false;
            state.is_flapping = false;
            state.log_output.clear();
            state.long_log_output.clear();
            state.apply_periods(&self.periods);
        }

        state.time = entry.time;
        state.lineno = entry.lineno;
        state.until = entry.time;
        if !is_transition {
            state.may_no_longer_exist = false;
        }

        match entry.kind {
            LogEntryKind::StateHost | LogEntryKind::StateHostInitial | LogEntryKind::AlertHost => {
                let down = entry.state > 0;
                if state.is_host {
                    if state.state != entry.state {
                        close(state);
                        state.state = entry.state;
                        state.host_down = down;
                        state.debug_info = "HOST STATE".to_string();
                    } else {
                        changed = false;
                    }
                } else if state.host_down != down {
                    close(state);
                    state.host_down = down;
                    state.debug_info = "SVC HOST STATE".to_string();
                }
            }
            LogEntryKind::StateService | LogEntryKind::StateServiceInitial | LogEntryKind::AlertService => {
                if state.state != entry.state {
                    close(state);
                    state.debug_info = "SVC ALERT".to_string();
                    state.state = entry.state;
                }
            }
            LogEntryKind::DowntimeAlertHost => {
                let active = started(entry);
                if state.in_host_downtime != active {
                    close(state);
                    state.debug_info = if state.is_host { "HOST DOWNTIME" } else { "SVC HOST DOWNTIME" }.to_string();
                    state.in_host_downtime = active;
                    if state.is_host {
                        state.in_downtime = active;
                    }
                } else {
                    changed = false;
                }
            }
            LogEntryKind::DowntimeAlertService => {
                let active = started(entry);
                if state.in_downtime != active {
                    close(state);
                    state.debug_info = "DOWNTIME SERVICE".to_string();
                    state.in_downtime = active;
                }
            }
            LogEntryKind::FlappingHost | LogEntryKind::FlappingService => {
                let active = started(entry);
                if state.is_flapping != active {
                    close(state);
                    state.debug_info = "FLAPPING ".to_string();
                    state.is_flapping = active;
                } else {
                    changed = false;
                }
            }
            LogEntryKind::TimeperiodTransition => {
                // Without a current object the periods stay at their defaults.
                if let Some((name, to)) = parse_transition(&entry.options)
                    && state.host.is_some()
                {
                    if name == state.notification_period && to != state.in_notification_period {
                        close(state);
                        state.debug_info = "TIMEPERIOD ".to_string();
                        state.in_notification_period = to;
                    }
                    if name == state.service_period && to != state.in_service_period {
                        close(state);
                        state.debug_info = "TIMEPERIOD ".to_string();
                        state.in_service_period = to;
                    }
                }
            }
            _ => {}
        }

        if !is_transition {
            let initial = matches!(entry.kind, LogEntryKind::StateHostInitial | LogEntryKind::StateServiceInitial);
            state.log_output = if initial && entry.plugin_output == "(null)" {
                String::new()
            } else {
                entry.plugin_output.clone()
            };
            state.long_log_output = entry.long_plugin_output.clone();
        }
        changed
    }

    /// State index for the object `entry` is about, created on first sight.
    fn state_for(&mut self, ctx: &Context, entry: &LogEntry, object_filter: &Filter, scope: &Scope<'_>, since: i64) -> Option<usize> {
        let key = (entry.host_name.clone(), entry.service_description.clone());
        if let Some(&i) = self.index.get(&key) {
            return Some(i);
        }
        if self.rejected.contains(&key) {
            return None;
        }
        let host = ctx.core.find_host(&entry.host_name);
        let service = if entry.service_description.is_empty() {
            None
        } else {
            Some(ctx.core.find_service(&entry.host_name, &entry.service_description)?)
        };
        host.as_ref()?;

        let mut state = HostServiceState::new(entry, host, service);
        // Hosts are always kept, their services may need them.
        if !state.is_host && !object_filter.accepts(Row::new(&state), scope.user, scope.timezone_offset) {
            self.rejected.insert(key);
            return None;
        }

        let i = self.states.len();
        let host_key = (entry.host_name.clone(), String::new());
        if state.is_host {
            state.services = self
                .states
                .iter()
                .enumerate()
                .filter(|(_, s)| !s.is_host && s.host_name == state.host_name)
                .map(|(j, _)| j)
                .collect();
        } else if let Some(&h) = self.index.get(&host_key) {
            self.states[h].services.push(i);
            state.in_host_downtime = self.states[h].in_host_downtime;
            state.host_down = self.states[h].host_down;
        }
        state.from = since;
        state.apply_periods(&self.periods);
        if !self.only_update && entry.time.saturating_sub(since) > STARTUP_GRACE_SECS {
            state.debug_info = "UNMONITORED ".to_string();
            state.state = UNMONITORED;
        }
        self.states.push(state);
        self.index.insert(key, i);
        Some(i)
    }
}

impl Table for StateHistoryTable {
    fn name(&self) -> &'static str {
        "statehist"
    }

    fn name_prefix(&self) -> &'static str {
        "statehist_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn column(&self, name: &str) -> Result<Arc<Column>, RequestError> {
        find_with_current(self, name)
    }

    fn answer_query(&self, scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        // History has no entries before the epoch.
        let since = scope
            .filter
            .greatest_lower_bound_for("time", scope.timezone_offset)
            .ok_or_else(|| RequestError::bad_request("Start of timeframe required. e.g. Filter: time > 1234567890"))?
            .max(0);
        let until = scope
            .filter
            .least_upper_bound_for("time", scope.timezone_offset)
            .unwrap_or_else(|| Utc::now().timestamp())
            .saturating_add(1);
        // Both bounds are inclusive.
        let timeframe = until.saturating_sub(since).saturating_sub(1);
        if timeframe <= 0 {
            return Ok(());
        }

        let object_filter = scope
            .filter
            .partial_filter(&|name| name.starts_with("current_") || name.starts_with("host_") || name.starts_with("service_"));
        let mut replay = Replay {
            spans: Spans {
                user: scope.user,
                sink,
                timeframe,
                aborted: false,
            },
            states: Vec::new(),
            index: HashMap::new(),
            rejected: HashSet::new(),
            periods: HashMap::new(),
            only_update: true,
        };
        let mut in_initial_states = false;

        'files: for file in self.ctx.log_cache.logfiles_between(since, until) {
            for entry in file.iter() {
                if replay.spans.aborted {
                    break 'files;
                }
                if entry.time >= until {
                    break 'files;
                }
                if replay.only_update && entry.time >= since {
                    for state in &mut replay.states {
                        state.from = since;
                        state.until = since;
                    }
                    replay.only_update = false;
                }
                if in_initial_states
                    && !matches!(entry.kind, LogEntryKind::StateHostInitial | LogEntryKind::StateServiceInitial)
                {
                    for state in &mut replay.states {
                        if state.may_no_longer_exist {
                            state.has_vanished = true;
                        }
                    }
                    in_initial_states = false;
                }

                match entry.kind {
                    LogEntryKind::AlertHost
                    | LogEntryKind::StateHost
                    | LogEntryKind::StateHostInitial
                    | LogEntryKind::DowntimeAlertHost
                    | LogEntryKind::FlappingHost
                    | LogEntryKind::AlertService
                    | LogEntryKind::StateService
                    | LogEntryKind::StateServiceInitial
                    | LogEntryKind::DowntimeAlertService
                    | LogEntryKind::FlappingService => {
                        let Some(i) = replay.state_for(&self.ctx, entry, &object_filter, scope, since) else {
                            continue;
                        };
                        let changed = replay.update(entry, i);
                        let host_change = matches!(
                            entry.kind,
                            LogEntryKind::AlertHost | LogEntryKind::StateHost | LogEntryKind::DowntimeAlertHost
                        );
                        if host_change && changed {
                            for j in replay.states[i].services.clone() {
                                replay.update(entry, j);
                            }
                        }
                    }
                    LogEntryKind::TimeperiodTransition => match parse_transition(&entry.options) {
                        Some((name, to)) => {
                            replay.periods.insert(name.to_string(), to);
                            for i in 0..replay.states.len() {
                                replay.update(entry, i);
                            }
                        }
                        None => warn!("invalid syntax of TIMEPERIOD TRANSITION: {}", entry.message),
                    },
                    LogEntryKind::LogInitialStates => {
                        for state in &mut replay.states {
                            if !state.has_vanished {
                                state.last_known_time = entry.time;
                                state.may_no_longer_exist = true;
                            }
                        }
                        in_initial_states = true;
                    }
                    _ => {}
                }
            }
        }

        if replay.spans.aborted {
            return Ok(());
        }
        let Replay { mut spans, mut states, .. } = replay;
        for state in &mut states {
            if state.may_no_longer_exist {
                state.time = state.last_known_time;
                state.until = state.last_known_time;
                spans.close(state);
                state.state = UNMONITORED;
                state.debug_info = "UNMONITORED".to_string();
                state.log_output.clear();
                state.long_log_output.clear();
            }
            state.time = until - 1;
            state.until = state.time;
            spans.close(state);
            if spans.aborted {
                break;
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

    use crate::column::Value;
    use crate::config::Settings;
    use crate::error::ResponseCode;
    use crate::filter::{ColumnFilter, RelationalOperator};
    use crate::tables::testing::context_with;

    fn history(dir: &Path, lines: &str) -> Settings {
        let log_file = dir.join("history.log");
        fs::write(&log_file, lines).unwrap();
        Settings {
            log_file: Some(log_file),
            ..Settings::default()
        }
    }

    fn query(table: &StateHistoryTable, filter: Filter, columns: &[&str]) -> Result<Vec<Vec<Value>>, RequestError> {
        let columns: Vec<_> = columns.iter().map(|c| table.column(c).unwrap()).collect();
        let scope = Scope {
            filter: &filter,
            user: &User::NoAuth,
            timezone_offset: 0,
        };
        let mut result = Vec::new();
        table.answer_query(&scope, &mut |row| {
            result.push(columns.iter().map(|c| c.get(row, &User::NoAuth)).collect());
            true
        })?;
        Ok(result)
    }

    fn between(table: &StateHistoryTable, since: &str, before: &str) -> Filter {
        let time = table.column("time").unwrap();
        Filter::and(vec![
            Filter::Column(ColumnFilter::new(Arc::clone(&time), RelationalOperator::GreaterOrEqual, since).unwrap()),
            Filter::Column(ColumnFilter::new(time, RelationalOperator::Less, before).unwrap()),
        ])
    }

    const HISTORY: &str = "[1000] LOG VERSION: 2.0\n\
        [1000] INITIAL HOST STATE: myhost;UP;HARD;1;all fine\n\
        [1000] INITIAL SERVICE STATE: myhost;CPU load;OK;HARD;1;load ok\n\
        [1500] SERVICE ALERT: myhost;CPU load;CRITICAL;HARD;3;load too high\n";

    #[test]
    fn test_spans() {
        let dir = tempfile::tempdir().unwrap();
        let table = StateHistoryTable::new(&context_with(history(dir.path(), HISTORY)));
        let filter = between(&table, "1000", "2000");
        let result = query(
            &table,
            filter,
            &["host_name", "service_description", "from", "until", "state", "duration_ok", "duration_critical", "log_output"],
        )
        .unwrap();
        assert_eq!(
            result,
            vec![
                vec![
                    Value::from("myhost"),
                    Value::from("CPU load"),
                    Value::Time(1000),
                    Value::Time(1500),
                    Value::Int(0),
                    Value::Int(500),
                    Value::Int(0),
                    Value::from("load ok"),
                ],
                vec![
                    Value::from("myhost"),
                    Value::from(""),
                    Value::Time(1000),
                    Value::Time(1999),
                    Value::Int(0),
                    Value::Int(999),
                    Value::Int(0),
                    Value::from("all fine"),
                ],
                vec![
                    Value::from("myhost"),
                    Value::from("CPU load"),
                    Value::Time(1500),
                    Value::Time(1999),
                    Value::Int(2),
                    Value::Int(0),
                    Value::Int(499),
                    Value::from("load too high"),
                ],
            ]
        );
    }

    #[test]
    fn test_duration_part() {
        let dir = tempfile::tempdir().unwrap();
        let table = StateHistoryTable::new(&context_with(history(dir.path(), HISTORY)));
        let filter = between(&table, "1000", "2000");
        let result = query(&table, filter, &["duration_part", "duration_part_unmonitored"]).unwrap();
        assert_eq!(result[1], vec![Value::Double(1.0), Value::Double(0.0)]);
    }

    #[test]
    fn test_host_down_reaches_services() {
        let dir = tempfile::tempdir().unwrap();
        let lines = format!("{HISTORY}[1600] HOST ALERT: myhost;DOWN;HARD;1;gone\n");
        let table = StateHistoryTable::new(&context_with(history(dir.path(), &lines)));
        let filter = between(&table, "1000", "2000");
        let result = query(&table, filter, &["service_description", "from", "host_down", "debug_info"]).unwrap();
        assert!(result.contains(&vec![
            Value::from("CPU load"),
            Value::Time(1600),
            Value::Int(1),
            Value::from("SVC HOST STATE"),
        ]));
        assert!(result.contains(&vec![
            Value::from(""),
            Value::Time(1600),
            Value::Int(1),
            Value::from("HOST STATE"),
        ]));
    }

    #[test]
    fn test_vanished_objects_become_unmonitored() {
        let dir = tempfile::tempdir().unwrap();
        let lines = format!(
            "{HISTORY}[1700] logging initial states\n\
             [1700] INITIAL HOST STATE: myhost;UP;HARD;1;still here\n\
             [1701] LOG VERSION: 2.0\n"
        );
        let table = StateHistoryTable::new(&context_with(history(dir.path(), &lines)));
        let filter = between(&table, "1000", "2000");
        let result = query(&table, filter, &["service_description", "from", "until", "state"]).unwrap();
        assert!(result.contains(&vec![Value::from("CPU load"), Value::Time(1500), Value::Time(1700), Value::Int(2)]));
        assert!(result.contains(&vec![Value::from("CPU load"), Value::Time(1700), Value::Time(1999), Value::Int(-1)]));
    }

    #[test]
    fn test_service_filter_on_current_columns() {
        let dir = tempfile::tempdir().unwrap();
        let table = StateHistoryTable::new(&context_with(history(dir.path(), HISTORY)));
        let description = table.column("service_description").unwrap();
        let filter = Filter::and(vec![
            between(&table, "1000", "2000"),
            Filter::Column(ColumnFilter::new(description, RelationalOperator::Equal, "Disk /").unwrap()),
        ]);
        // Only the host survives; the remaining filter runs in the query.
        assert_eq!(
            query(&table, filter, &["host_name", "service_description"]).unwrap(),
            vec![vec![Value::from("myhost"), Value::from("")]]
        );
    }

    fn bounded(table: &StateHistoryTable, lower: (RelationalOperator, &str), upper: (RelationalOperator, &str)) -> Filter {
        let time = table.column("time").unwrap();
        Filter::and(vec![
            Filter::Column(ColumnFilter::new(Arc::clone(&time), lower.0, lower.1).unwrap()),
            Filter::Column(ColumnFilter::new(time, upper.0, upper.1).unwrap()),
        ])
    }

    #[test]
    fn test_extreme_time_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let table = StateHistoryTable::new(&context_with(history(dir.path(), HISTORY)));

        let filter = bounded(
            &table,
            (RelationalOperator::GreaterOrEqual, "1"),
            (RelationalOperator::LessOrEqual, "9223372036854775807"),
        );
        let result = query(&table, filter, &["service_description", "from", "until"]).unwrap();
        assert!(result.contains(&vec![Value::from("CPU load"), Value::Time(1000), Value::Time(1500)]));
        assert!(result.contains(&vec![Value::from("CPU load"), Value::Time(1500), Value::Time(i64::MAX - 1)]));

        let filter = bounded(
            &table,
            (RelationalOperator::Greater, "-9223372036854775808"),
            (RelationalOperator::Less, "-9223372036854775808"),
        );
        assert!(query(&table, filter, &["state"]).unwrap().is_empty());

        let filter = bounded(
            &table,
            (RelationalOperator::GreaterOrEqual, "-9223372036854775808"),
            (RelationalOperator::Less, "2000"),
        );
        let result = query(&table, filter, &["service_description", "from", "state"]).unwrap();
        assert!(result.contains(&vec![Value::from("CPU load"), Value::Time(1500), Value::Int(2)]));
    }

    #[test]
    fn test_start_required() {
        let dir = tempfile::tempdir().unwrap();
        let table = StateHistoryTable::new(&context_with(history(dir.path(), HISTORY)));
        let err = query(&table, Filter::tautology(), &["state"]).unwrap_err();
        assert_eq!(err.code, ResponseCode::BadRequest);
        assert!(err.message.starts_with("Start of timeframe required"));
    }

    #[test]
    fn test_transition_syntax() {
        assert_eq!(parse_transition("24X7;-1;1"), Some(("24X7", 1)));
        assert_eq!(parse_transition("24X7;0"), None);
        assert_eq!(parse_transition("24X7;x;1"), None);
    }
}
