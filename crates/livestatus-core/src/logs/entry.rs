//! One line of the monitoring history log.
//!
//! ```text
//!   [1551424323] SERVICE ALERT: huey;PING;CRITICAL;HARD;3;timeout
//!    └─ time ─┘  └── type ───┘  └──────── options ─────────────┘
//! ```

use crate::core::{host_state_name, service_state_name};
use crate::util::strings::unescape_newlines;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogClass {
    Info = 0,
    Alert = 1,
    Program = 2,
    HsNotification = 3,
    PassiveCheck = 4,
    ExtCommand = 5,
    State = 6,
    Text = 7,
    AlertHandlers = 8,
}

impl LogClass {
    pub const ALL: [LogClass; 9] = [
        LogClass::Info,
        LogClass::Alert,
        LogClass::Program,
        LogClass::HsNotification,
        LogClass::PassiveCheck,
        LogClass::ExtCommand,
        LogClass::State,
        LogClass::Text,
        LogClass::AlertHandlers,
    ];

    pub fn from_index(index: i64) -> Option<Self> {
        LogClass::ALL.get(usize::try_from(index).ok()?).copied()
    }

    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Entries the state history replay cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogEntryKind {
    None,
    AlertHost,
    AlertService,
    DowntimeAlertHost,
    DowntimeAlertService,
    StateHost,
    StateHostInitial,
    StateService,
    StateServiceInitial,
    FlappingHost,
    FlappingService,
    TimeperiodTransition,
    AcknowledgeAlertHost,
    AcknowledgeAlertService,
    CoreStarting,
    CoreStopping,
    LogVersion,
    LogInitialStates,
}

#[derive(Debug, Clone, Copy)]
enum Param {
    HostName,
    ServiceDescription,
    CommandName,
    ContactName,
    HostState,
    ServiceState,
    /// A service state name standing for a process exit code.
    ExitCode,
    /// A numeric state.
    State,
    StateType,
    Attempt,
    Comment,
    PluginOutput,
    LongPluginOutput,
    Ignore,
}

use Param::*;

struct LogDef {
    prefix: &'static str,
    class: LogClass,
    kind: LogEntryKind,
    params: &'static [Param],
}

const HOST_STATE: &[Param] = &[HostName, HostState, StateType, Attempt, PluginOutput, LongPluginOutput];
const SERVICE_STATE: &[Param] = &[
    HostName,
    ServiceDescription,
    ServiceState,
    StateType,
    Attempt,
    PluginOutput,
    LongPluginOutput,
];

const LOG_DEFS: &[LogDef] = &[
    LogDef { prefix: "INITIAL HOST STATE", class: LogClass::State, kind: LogEntryKind::StateHostInitial, params: HOST_STATE },
    LogDef { prefix: "CURRENT HOST STATE", class: LogClass::State, kind: LogEntryKind::StateHost, params: HOST_STATE },
    LogDef { prefix: "HOST ALERT", class: LogClass::Alert, kind: LogEntryKind::AlertHost, params: HOST_STATE },
    LogDef { prefix: "HOST DOWNTIME ALERT", class: LogClass::Alert, kind: LogEntryKind::DowntimeAlertHost, params: &[HostName, StateType, Comment] },
    LogDef { prefix: "HOST ACKNOWLEDGE ALERT", class: LogClass::Alert, kind: LogEntryKind::AcknowledgeAlertHost, params: &[HostName, StateType, ContactName, Comment] },
    LogDef { prefix: "HOST FLAPPING ALERT", class: LogClass::Alert, kind: LogEntryKind::FlappingHost, params: &[HostName, StateType, Comment] },
    LogDef { prefix: "INITIAL SERVICE STATE", class: LogClass::State, kind: LogEntryKind::StateServiceInitial, params: SERVICE_STATE },
    LogDef { prefix: "CURRENT SERVICE STATE", class: LogClass::State, kind: LogEntryKind::StateService, params: SERVICE_STATE },
    LogDef { prefix: "SERVICE ALERT", class: LogClass::Alert, kind: LogEntryKind::AlertService, params: SERVICE_STATE },
    LogDef { prefix: "SERVICE DOWNTIME ALERT", class: LogClass::Alert, kind: LogEntryKind::DowntimeAlertService, params: &[HostName, ServiceDescription, StateType, Comment] },
    LogDef { prefix: "SERVICE ACKNOWLEDGE ALERT", class: LogClass::Alert, kind: LogEntryKind::AcknowledgeAlertService, params: &[HostName, ServiceDescription, StateType, ContactName, Comment] },
    LogDef { prefix: "SERVICE FLAPPING ALERT", class: LogClass::Alert, kind: LogEntryKind::FlappingService, params: &[HostName, ServiceDescription, StateType, Comment] },
    LogDef { prefix: "TIMEPERIOD TRANSITION", class: LogClass::State, kind: LogEntryKind::TimeperiodTransition, params: &[] },
    LogDef { prefix: "HOST NOTIFICATION", class: LogClass::HsNotification, kind: LogEntryKind::None, params: &[ContactName, HostName, StateType, CommandName, PluginOutput, Ignore, Comment, LongPluginOutput] },
    LogDef { prefix: "SERVICE NOTIFICATION", class: LogClass::HsNotification, kind: LogEntryKind::None, params: &[ContactName, HostName, ServiceDescription, StateType, CommandName, PluginOutput, Ignore, Comment, LongPluginOutput] },
    LogDef { prefix: "HOST NOTIFICATION RESULT", class: LogClass::HsNotification, kind: LogEntryKind::None, params: &[ContactName, HostName, StateType, CommandName, PluginOutput, Comment] },
    LogDef { prefix: "SERVICE NOTIFICATION RESULT", class: LogClass::HsNotification, kind: LogEntryKind::None, params: &[ContactName, HostName, ServiceDescription, StateType, CommandName, PluginOutput, Comment] },
    LogDef { prefix: "HOST NOTIFICATION PROGRESS", class: LogClass::HsNotification, kind: LogEntryKind::None, params: &[ContactName, HostName, StateType, CommandName, PluginOutput] },
    LogDef { prefix: "SERVICE NOTIFICATION PROGRESS", class: LogClass::HsNotification, kind: LogEntryKind::None, params: &[ContactName, HostName, ServiceDescription, StateType, CommandName, PluginOutput] },
    LogDef { prefix: "HOST ALERT HANDLER STARTED", class: LogClass::AlertHandlers, kind: LogEntryKind::None, params: &[HostName, CommandName] },
    LogDef { prefix: "SERVICE ALERT HANDLER STARTED", class: LogClass::AlertHandlers, kind: LogEntryKind::None, params: &[HostName, ServiceDescription, CommandName] },
    LogDef { prefix: "HOST ALERT HANDLER STOPPED", class: LogClass::AlertHandlers, kind: LogEntryKind::None, params: &[HostName, CommandName, ExitCode, PluginOutput] },
    LogDef { prefix: "SERVICE ALERT HANDLER STOPPED", class: LogClass::AlertHandlers, kind: LogEntryKind::None, params: &[HostName, ServiceDescription, CommandName, ExitCode, PluginOutput] },
    LogDef { prefix: "PASSIVE SERVICE CHECK", class: LogClass::PassiveCheck, kind: LogEntryKind::None, params: &[HostName, ServiceDescription, State, PluginOutput] },
    LogDef { prefix: "PASSIVE HOST CHECK", class: LogClass::PassiveCheck, kind: LogEntryKind::None, params: &[HostName, State, PluginOutput] },
    LogDef { prefix: "EXTERNAL COMMAND", class: LogClass::ExtCommand, kind: LogEntryKind::None, params: &[] },
    LogDef { prefix: "LOG VERSION", class: LogClass::Program, kind: LogEntryKind::LogVersion, params: &[] },
];

/// Program messages without a `TYPE:` prefix.
const PROGRAM_MESSAGES: &[(&str, LogEntryKind)] = &[
    ("logging initial states", LogEntryKind::LogInitialStates),
    ("starting...", LogEntryKind::CoreStarting),
    ("active mode...", LogEntryKind::CoreStarting),
    ("restarting...", LogEntryKind::CoreStarting),
    ("shutting down...", LogEntryKind::CoreStopping),
    ("Bailing out", LogEntryKind::CoreStopping),
    ("standby mode...", LogEntryKind::CoreStopping),
];

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub lineno: usize,
    pub time: i64,
    pub class: LogClass,
    pub kind: LogEntryKind,
    pub message: String,
    pub type_name: String,
    pub options: String,
    pub host_name: String,
    pub service_description: String,
    pub command_name: String,
    pub contact_name: String,
    pub state: i32,
    pub state_type: String,
    pub attempt: i32,
    pub plugin_output: String,
    pub long_plugin_output: String,
    pub comment: String,
}

fn host_state_from_name(name: &str) -> i32 {
    match name {
        "DOWN" => 1,
        "UNREACHABLE" => 2,
        _ => 0,
    }
}

fn service_state_from_name(name: &str) -> i32 {
    match name {
        "WARNING" => 1,
        "CRITICAL" => 2,
        "UNKNOWN" => 3,
        _ => 0,
    }
}

fn exit_code_name(code: i32) -> &'static str {
    match code {
        0 => "SUCCESS",
        1 => "TEMPORARY_FAILURE",
        2 => "PERMANENT_FAILURE",
        _ => "FUNNY_EXIT_CODE_3",
    }
}

/// Splits `REASON (STATE)` into its parts.
fn split_reason(state_type: &str) -> Option<(&str, &str)> {
    let (reason, rest) = state_type.split_once(" (")?;
    Some((reason, rest.strip_suffix(')')?))
}

impl LogEntry {
    /// Parses one log line; `None` if it has no `[<epoch>] ` prefix.
    pub fn parse(lineno: usize, line: &str) -> Option<Self> {
        let rest = line.strip_prefix('[')?;
        let (time, rest) = rest.split_once("] ")?;
        if time.is_empty() || !time.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let time: i64 = time.parse().ok()?;

        let (type_name, options) = match rest.split_once(": ") {
            Some((t, o)) => (t, o),
            None => (rest, ""),
        };
        let mut entry = LogEntry {
            lineno,
            time,
            class: LogClass::Info,
            kind: LogEntryKind::None,
            message: line.to_string(),
            type_name: type_name.to_string(),
            options: options.to_string(),
            host_name: String::new(),
            service_description: String::new(),
            command_name: String::new(),
            contact_name: String::new(),
            state: 0,
            state_type: String::new(),
            attempt: 0,
            plugin_output: String::new(),
            long_plugin_output: String::new(),
            comment: String::new(),
        };

        if let Some(def) = LOG_DEFS.iter().find(|d| d.prefix == type_name) {
            entry.class = def.class;
            entry.kind = def.kind;
            entry.assign(def.params, options);
            entry.fix_notification();
        } else if let Some((_, kind)) = PROGRAM_MESSAGES.iter().find(|(m, _)| rest.starts_with(m)) {
            entry.class = LogClass::Program;
            entry.kind = *kind;
        } else if rest.contains("Caught SIG") || rest.contains("Auto-save of retention data") {
            entry.class = LogClass::Program;
        }
        Some(entry)
    }

    fn assign(&mut self, params: &[Param], options: &str) {
        let mut fields = options.splitn(params.len().max(1), ';');
        for param in params {
            let Some(field) = fields.next() else {
                break;
            };
            match param {
                HostName => self.host_name = field.to_string(),
                ServiceDescription => self.service_description = field.to_string(),
                CommandName => self.command_name = field.to_string(),
                ContactName => self.contact_name = field.to_string(),
                HostState => self.state = host_state_from_name(field),
                ServiceState | ExitCode => self.state = service_state_from_name(field),
                State => self.state = field.trim().parse().unwrap_or(0),
                StateType => self.state_type = field.to_string(),
                Attempt => self.attempt = field.trim().parse().unwrap_or(0),
                Comment => self.comment = field.to_string(),
                PluginOutput => self.plugin_output = field.to_string(),
                LongPluginOutput => self.long_plugin_output = unescape_newlines(field),
                Ignore => {}
            }
        }
    }

    /// Notification lines carry their state inside the state type.
    fn fix_notification(&mut self) {
        if self.class != LogClass::HsNotification {
            return;
        }
        // Legacy lines had the notification command and the state swapped.
        if self.state_type == "check-mk-notify" {
            std::mem::swap(&mut self.state_type, &mut self.command_name);
        }
        let is_host = self.service_description.is_empty();
        let name = match split_reason(&self.state_type) {
            Some(("ALERTHANDLER", code)) => {
                self.state = service_state_from_name(code);
                return;
            }
            Some((_, name)) => name,
            None => self.state_type.as_str(),
        };
        self.state = if is_host && !self.is_notification_result() {
            host_state_from_name(name)
        } else {
            service_state_from_name(name)
        };
    }

    fn is_notification_result(&self) -> bool {
        self.type_name.ends_with("RESULT") || self.type_name.ends_with("PROGRESS")
    }

    pub fn is_host_entry(&self) -> bool {
        self.service_description.is_empty()
    }

    /// Human readable summary of the state fields, e.g. `HARD (DOWN)`.
    pub fn state_info(&self) -> String {
        let state_name = |state| {
            if self.is_host_entry() {
                host_state_name(state)
            } else {
                service_state_name(state)
            }
        };
        match self.class {
            LogClass::Alert | LogClass::State => match self.kind {
                LogEntryKind::AlertHost
                | LogEntryKind::AlertService
                | LogEntryKind::StateHost
                | LogEntryKind::StateHostInitial
                | LogEntryKind::StateService
                | LogEntryKind::StateServiceInitial => {
                    format!("{} ({})", self.state_type, state_name(self.state))
                }
                LogEntryKind::TimeperiodTransition => String::new(),
                _ => self.state_type.clone(),
            },
            LogClass::HsNotification => {
                if self.is_notification_result() {
                    return format!("EXIT_CODE ({})", exit_code_name(self.state));
                }
                match split_reason(&self.state_type) {
                    Some(("ALERTHANDLER", _)) => format!("EXIT_CODE ({})", exit_code_name(self.state)),
                    Some(_) => self.state_type.clone(),
                    None => format!("NOTIFY ({})", self.state_type),
                }
            }
            LogClass::PassiveCheck => format!("PASSIVE ({})", state_name(self.state)),
            LogClass::AlertHandlers if self.type_name.ends_with("STOPPED") => {
                format!("EXIT_CODE ({})", exit_code_name(self.state))
            }
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> LogEntry {
        LogEntry::parse(42, line).unwrap()
    }

    #[test]
    fn test_initial_host_state() {
        let e = parse("[1551424305] INITIAL HOST STATE: huey;UNREACHABLE;SOFT;7;Krasser Output;Laaanger\\nLong\\nOutput");
        assert_eq!(e.lineno, 42);
        assert_eq!(e.time, 1551424305);
        assert_eq!(e.class, LogClass::State);
        assert_eq!(e.kind, LogEntryKind::StateHostInitial);
        assert_eq!(e.type_name, "INITIAL HOST STATE");
        assert_eq!(e.options, "huey;UNREACHABLE;SOFT;7;Krasser Output;Laaanger\\nLong\\nOutput");
        assert_eq!(e.host_name, "huey");
        assert_eq!(e.state, 2);
        assert_eq!(e.state_type, "SOFT");
        assert_eq!(e.attempt, 7);
        assert_eq!(e.plugin_output, "Krasser Output");
        assert_eq!(e.long_plugin_output, "Laaanger\nLong\nOutput");
        assert_eq!(e.state_info(), "SOFT (UNREACHABLE)");
    }

    #[test]
    fn test_service_alert() {
        let e = parse("[1551424323] SERVICE ALERT: huey;hi!;CRITICAL;HARD;1234;Komisch...;lang");
        assert_eq!(e.class, LogClass::Alert);
        assert_eq!(e.kind, LogEntryKind::AlertService);
        assert_eq!(e.service_description, "hi!");
        assert_eq!(e.state, 2);
        assert_eq!(e.attempt, 1234);
        assert_eq!(e.long_plugin_output, "lang");
        assert_eq!(e.state_info(), "HARD (CRITICAL)");
    }

    #[test]
    fn test_downtime_and_acknowledge_alerts() {
        let e = parse("[1551424323] SERVICE DOWNTIME ALERT: huey;hi, ho!;STARTED;Komisch...");
        assert_eq!(e.kind, LogEntryKind::DowntimeAlertService);
        assert_eq!(e.service_description, "hi, ho!");
        assert_eq!(e.comment, "Komisch...");
        assert_eq!(e.state_info(), "STARTED");

        let e = parse("[1551424323] HOST ACKNOWLEDGE ALERT: huey;EXPIRED;King Kong;foo bar");
        assert_eq!(e.kind, LogEntryKind::AcknowledgeAlertHost);
        assert_eq!(e.contact_name, "King Kong");
        assert_eq!(e.comment, "foo bar");
    }

    #[test]
    fn test_notifications() {
        let e = parse(
            "[1551424305] SERVICE NOTIFICATION: King Kong;donald;duck;CUSTOM (WARNING);commando;viel output...;Tolkien;The Hobbit;lalala",
        );
        assert_eq!(e.class, LogClass::HsNotification);
        assert_eq!(e.contact_name, "King Kong");
        assert_eq!(e.host_name, "donald");
        assert_eq!(e.service_description, "duck");
        assert_eq!(e.command_name, "commando");
        assert_eq!(e.state, 1);
        assert_eq!(e.comment, "The Hobbit");
        assert_eq!(e.long_plugin_output, "lalala");
        assert_eq!(e.state_info(), "CUSTOM (WARNING)");

        let e = parse("[1551424305] HOST NOTIFICATION: King Kong;donald;DOWN;commando;out;Tolkien;The Hobbit;x");
        assert_eq!(e.state, 1);
        assert_eq!(e.state_info(), "NOTIFY (DOWN)");

        let e = parse("[1551424305] HOST NOTIFICATION: King Kong;donald;ALERTHANDLER (CRITICAL);commando;out;T;C;L");
        assert_eq!(e.state, 2);
        assert_eq!(e.state_info(), "EXIT_CODE (PERMANENT_FAILURE)");
    }

    #[test]
    fn test_swapped_notification() {
        let e = parse("[1551424305] HOST NOTIFICATION: King Kong;donald;check-mk-notify;UNREACHABLE;out;T;C;L");
        assert_eq!(e.command_name, "check-mk-notify");
        assert_eq!(e.state_type, "UNREACHABLE");
        assert_eq!(e.state, 2);
    }

    #[test]
    fn test_notification_result() {
        let e = parse("[1551424305] HOST NOTIFICATION RESULT: King Kong;donald;WARNING;commando;viel output...;blah blubb");
        assert_eq!(e.state, 1);
        assert_eq!(e.state_type, "WARNING");
        assert_eq!(e.comment, "blah blubb");
        assert_eq!(e.state_info(), "EXIT_CODE (TEMPORARY_FAILURE)");
    }

    #[test]
    fn test_alert_handlers_and_passive_checks() {
        let e = parse("[1551424305] SERVICE ALERT HANDLER STOPPED: donald;duck;commando;UNKNOWN;once upon a time...");
        assert_eq!(e.class, LogClass::AlertHandlers);
        assert_eq!(e.state, 3);
        assert_eq!(e.plugin_output, "once upon a time...");
        assert_eq!(e.state_info(), "EXIT_CODE (FUNNY_EXIT_CODE_3)");

        let e = parse("[1551424305] HOST ALERT HANDLER STARTED: donald;commando");
        assert_eq!(e.command_name, "commando");
        assert_eq!(e.state_info(), "");

        let e = parse("[1551424305] PASSIVE HOST CHECK: donald;1;Isch hab Ruecken!");
        assert_eq!(e.class, LogClass::PassiveCheck);
        assert_eq!(e.state, 1);
        assert_eq!(e.state_info(), "PASSIVE (DOWN)");
    }

    #[test]
    fn test_program_messages() {
        assert_eq!(parse("[1551424305] LOG VERSION: 2.0").kind, LogEntryKind::LogVersion);
        assert_eq!(parse("[1551424305] logging initial states").kind, LogEntryKind::LogInitialStates);
        assert_eq!(parse("[1551424305] starting...").kind, LogEntryKind::CoreStarting);
        assert_eq!(parse("[1551424305] Bailing out").kind, LogEntryKind::CoreStopping);
        assert_eq!(parse("[1551424305] Bailing out").class, LogClass::Program);
        let e = parse("[1551424305] EXTERNAL COMMAND: commando");
        assert_eq!(e.class, LogClass::ExtCommand);
        assert_eq!(e.options, "commando");
    }

    #[test]
    fn test_unknown_and_invalid_lines() {
        let e = parse("[1551424305] this is total;nonsense");
        assert_eq!(e.class, LogClass::Info);
        assert_eq!(e.type_name, "this is total;nonsense");
        assert_eq!(e.options, "");
        assert!(LogEntry::parse(1, "[oh no...").is_none());
        assert!(LogEntry::parse(1, "[nonsense!!] this is total;nonsense").is_none());
    }
}
