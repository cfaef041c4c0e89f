//! Monitoring objects as the core exposes them.
//!
//! The structs deserialize from the JSON object document with every field
//! optional. Fields marked `#[serde(skip)]` are filled in by
//! [`ObjectGraph::new`](super::ObjectGraph::new) when the graph is linked.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use serde::Deserialize;

pub type Attributes = BTreeMap<String, String>;

pub fn host_state_name(state: i32) -> &'static str {
    match state {
        0 => "UP",
        1 => "DOWN",
        2 => "UNREACHABLE",
        _ => "UNKNOWN",
    }
}

pub fn service_state_name(state: i32) -> &'static str {
    match state {
        0 => "OK",
        1 => "WARNING",
        2 => "CRITICAL",
        3 => "UNKNOWN",
        _ => "UNKNOWN",
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Host {
    pub name: String,
    pub display_name: String,
    pub alias: String,
    pub address: String,
    pub check_command: String,
    pub event_handler: String,
    pub notification_period: String,
    pub check_period: String,
    pub service_period: String,
    pub notes: String,
    pub notes_url: String,
    pub action_url: String,
    pub icon_image: String,
    pub icon_image_alt: String,
    pub filename: String,
    pub plugin_output: String,
    pub long_plugin_output: String,
    pub perf_data: String,
    pub initial_state: i32,
    pub max_check_attempts: i32,
    pub current_attempt: i32,
    pub state: i32,
    pub state_type: i32,
    pub last_state: i32,
    pub last_hard_state: i32,
    pub has_been_checked: bool,
    pub acknowledged: bool,
    pub acknowledgement_type: i32,
    pub check_type: i32,
    pub active_checks_enabled: bool,
    pub notifications_enabled: bool,
    pub accept_passive_checks: bool,
    pub event_handler_enabled: bool,
    pub flap_detection_enabled: bool,
    pub is_flapping: bool,
    pub is_executing: bool,
    pub scheduled_downtime_depth: i32,
    pub pending_flex_downtime: i32,
    pub no_more_notifications: bool,
    pub last_check: i64,
    pub next_check: i64,
    pub last_state_change: i64,
    pub last_hard_state_change: i64,
    pub last_notification: i64,
    pub next_notification: i64,
    pub last_time_up: i64,
    pub last_time_down: i64,
    pub last_time_unreachable: i64,
    pub current_notification_number: i32,
    pub check_interval: f64,
    pub retry_interval: f64,
    pub notification_interval: f64,
    pub first_notification_delay: f64,
    pub latency: f64,
    pub execution_time: f64,
    pub percent_state_change: f64,
    pub staleness: f64,
    pub modified_attributes: i64,
    pub parents: Vec<String>,
    pub contacts: Vec<String>,
    pub contact_groups: Vec<String>,
    pub custom_variables: Attributes,
    pub labels: Attributes,
    pub tags: Attributes,
    /// Host groups this host belongs to.
    #[serde(skip)]
    pub groups: Vec<String>,
    /// Direct contacts plus members of the contact groups.
    #[serde(skip)]
    pub all_contacts: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Service {
    pub host_name: String,
    pub description: String,
    pub display_name: String,
    pub check_command: String,
    pub event_handler: String,
    pub notification_period: String,
    pub check_period: String,
    pub service_period: String,
    pub notes: String,
    pub notes_url: String,
    pub action_url: String,
    pub icon_image: String,
    pub icon_image_alt: String,
    pub plugin_output: String,
    pub long_plugin_output: String,
    pub perf_data: String,
    pub initial_state: i32,
    pub max_check_attempts: i32,
    pub current_attempt: i32,
    pub state: i32,
    pub state_type: i32,
    pub last_state: i32,
    pub last_hard_state: i32,
    pub has_been_checked: bool,
    pub acknowledged: bool,
    pub acknowledgement_type: i32,
    pub check_type: i32,
    pub active_checks_enabled: bool,
    pub notifications_enabled: bool,
    pub accept_passive_checks: bool,
    pub event_handler_enabled: bool,
    pub flap_detection_enabled: bool,
    pub is_flapping: bool,
    pub is_executing: bool,
    pub scheduled_downtime_depth: i32,
    pub no_more_notifications: bool,
    pub last_check: i64,
    pub next_check: i64,
    pub last_state_change: i64,
    pub last_hard_state_change: i64,
    pub last_notification: i64,
    pub next_notification: i64,
    pub last_time_ok: i64,
    pub last_time_warning: i64,
    pub last_time_critical: i64,
    pub last_time_unknown: i64,
    pub current_notification_number: i32,
    pub check_interval: f64,
    pub retry_interval: f64,
    pub notification_interval: f64,
    pub first_notification_delay: f64,
    pub latency: f64,
    pub execution_time: f64,
    pub percent_state_change: f64,
    pub staleness: f64,
    pub modified_attributes: i64,
    pub contacts: Vec<String>,
    pub contact_groups: Vec<String>,
    pub custom_variables: Attributes,
    pub labels: Attributes,
    pub tags: Attributes,
    #[serde(skip)]
    pub host: Arc<Host>,
    /// Service groups this service belongs to.
    #[serde(skip)]
    pub groups: Vec<String>,
    #[serde(skip)]
    pub all_contacts: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Downtime {
    pub id: i64,
    pub author: String,
    pub comment: String,
    pub host_name: String,
    pub service_description: Option<String>,
    pub entry_time: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub fixed: bool,
    pub duration: i64,
    pub triggered_by: i64,
    #[serde(skip)]
    pub host: Arc<Host>,
    #[serde(skip)]
    pub service: Option<Arc<Service>>,
}

impl Downtime {
    pub fn is_service(&self) -> bool {
        self.service.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Comment {
    pub id: i64,
    pub author: String,
    pub comment: String,
    pub host_name: String,
    pub service_description: Option<String>,
    pub entry_time: i64,
    /// 1 user, 2 downtime, 3 flapping, 4 acknowledgement.
    pub entry_type: i32,
    pub expires: bool,
    pub expire_time: i64,
    pub persistent: bool,
    /// 0 internal, 1 external.
    pub source: i32,
    #[serde(skip)]
    pub host: Arc<Host>,
    #[serde(skip)]
    pub service: Option<Arc<Service>>,
}

impl Comment {
    pub fn is_service(&self) -> bool {
        self.service.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub name: String,
    pub alias: String,
    pub email: String,
    pub pager: String,
    pub host_notification_period: String,
    pub service_notification_period: String,
    pub host_notifications_enabled: bool,
    pub service_notifications_enabled: bool,
    pub can_submit_commands: bool,
    pub modified_attributes: i64,
    pub custom_variables: Attributes,
    /// Contact groups this contact belongs to.
    #[serde(skip)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContactGroup {
    pub name: String,
    pub alias: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostGroup {
    pub name: String,
    pub alias: String,
    pub notes: String,
    pub notes_url: String,
    pub action_url: String,
    pub members: Vec<String>,
    #[serde(skip)]
    pub hosts: Vec<Arc<Host>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceGroup {
    pub name: String,
    pub alias: String,
    pub notes: String,
    pub notes_url: String,
    pub action_url: String,
    /// `(host_name, service_description)` pairs.
    pub members: Vec<(String, String)>,
    #[serde(skip)]
    pub services: Vec<Arc<Service>>,
}

/// Weekly schedule, e.g. `{"monday": "09:00-12:00,13:00-17:00"}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Timeperiod {
    pub name: String,
    pub alias: String,
    pub ranges: BTreeMap<String, String>,
    /// Names of timeperiods whose active times are subtracted.
    pub exclude: Vec<String>,
}

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

impl Timeperiod {
    /// Checks the weekly ranges, ignoring exclusions.
    pub fn contains<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        let day = WEEKDAYS[at.weekday().num_days_from_monday() as usize];
        let minute = at.hour() * 60 + at.minute();
        self.ranges
            .get(day)
            .is_some_and(|spec| spec.split(',').filter_map(parse_range).any(|(from, to)| from <= minute && minute < to))
    }
}

/// Parses `HH:MM-HH:MM` into minutes since midnight.
fn parse_range(spec: &str) -> Option<(u32, u32)> {
    let (from, to) = spec.trim().split_once('-')?;
    Some((parse_clock(from)?, parse_clock(to)?))
}

fn parse_clock(text: &str) -> Option<u32> {
    let (hours, minutes) = text.trim().split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    (hours <= 24 && minutes < 60).then_some(hours * 60 + minutes)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Command {
    pub name: String,
    pub line: String,
}

/// Global state of the monitoring core.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgramStatus {
    pub program_version: String,
    pub program_start: i64,
    pub pid: i64,
    pub interval_length: i64,
    pub last_log_rotation: i64,
    pub last_command_check: i64,
    pub enable_notifications: bool,
    pub execute_service_checks: bool,
    pub accept_passive_service_checks: bool,
    pub execute_host_checks: bool,
    pub accept_passive_host_checks: bool,
    pub enable_event_handlers: bool,
    pub obsess_over_services: bool,
    pub obsess_over_hosts: bool,
    pub check_service_freshness: bool,
    pub check_host_freshness: bool,
    pub enable_flap_detection: bool,
    pub process_performance_data: bool,
    pub check_external_commands: bool,
}

impl Default for ProgramStatus {
    fn default() -> Self {
        Self {
            program_version: String::new(),
            program_start: 0,
            pid: 0,
            interval_length: 60,
            last_log_rotation: 0,
            last_command_check: 0,
            enable_notifications: true,
            execute_service_checks: true,
            accept_passive_service_checks: true,
            execute_host_checks: true,
            accept_passive_host_checks: true,
            enable_event_handlers: true,
            obsess_over_services: false,
            obsess_over_hosts: false,
            check_service_freshness: true,
            check_host_freshness: false,
            enable_flap_detection: true,
            process_performance_data: true,
            check_external_commands: true,
        }
    }
}

/// The object document the in-memory core is loaded from.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObjectDefinitions {
    pub hosts: Vec<Host>,
    pub services: Vec<Service>,
    pub downtimes: Vec<Downtime>,
    pub comments: Vec<Comment>,
    pub contacts: Vec<Contact>,
    pub contact_groups: Vec<ContactGroup>,
    pub host_groups: Vec<HostGroup>,
    pub service_groups: Vec<ServiceGroup>,
    pub timeperiods: Vec<Timeperiod>,
    pub commands: Vec<Command>,
    pub status: ProgramStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_timeperiod_ranges() {
        let mut tp = Timeperiod {
            name: "workhours".into(),
            ..Default::default()
        };
        tp.ranges.insert("monday".into(), "09:00-12:00, 13:00-17:00".into());

        // 2024-01-15 is a Monday.
        let at = |h, m| Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap();
        assert!(tp.contains(&at(9, 0)));
        assert!(tp.contains(&at(11, 59)));
        assert!(!tp.contains(&at(12, 30)));
        assert!(tp.contains(&at(16, 0)));
        assert!(!tp.contains(&at(17, 0)));
        assert!(!tp.contains(&Utc.with_ymd_and_hms(2024, 1, 16, 10, 0, 0).unwrap()));
    }

    #[test]
    fn test_full_day_range() {
        let mut tp = Timeperiod::default();
        tp.ranges.insert("sunday".into(), "00:00-24:00".into());
        let late = Utc.with_ymd_and_hms(2024, 1, 14, 23, 59, 0).unwrap();
        assert!(tp.contains(&late));
    }

    #[test]
    fn test_definitions_deserialize_with_defaults() {
        let defs: ObjectDefinitions = serde_json::from_str(
            r#"{"hosts": [{"name": "h1", "state": 1}],
                "services": [{"host_name": "h1", "description": "PING"}],
                "service_groups": [{"name": "g", "members": [["h1", "PING"]]}]}"#,
        )
        .unwrap();
        assert_eq!(defs.hosts[0].name, "h1");
        assert_eq!(defs.hosts[0].state, 1);
        assert_eq!(defs.services[0].description, "PING");
        assert_eq!(defs.service_groups[0].members[0].1, "PING");
        assert!(defs.status.enable_notifications);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(host_state_name(1), "DOWN");
        assert_eq!(service_state_name(2), "CRITICAL");
    }
}
