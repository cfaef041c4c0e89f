//! Pre-built object sets for tests and demos.

use super::model::{
    Attributes, Command, Comment, Contact, ContactGroup, Downtime, Host, HostGroup,
    ObjectDefinitions, ProgramStatus, Service, ServiceGroup, Timeperiod,
};

/// Reference timestamp all fixture times are relative to.
pub const FIXTURE_NOW: i64 = 1_700_000_000;

fn attributes(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const WEEK: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

fn week(days: &[&str], range: &str) -> Attributes {
    days.iter()
        .map(|day| (day.to_string(), range.to_string()))
        .collect()
}

fn host(name: &str, state: i32) -> Host {
    Host {
        name: name.to_string(),
        display_name: name.to_string(),
        alias: name.to_string(),
        state,
        last_hard_state: state,
        state_type: 1,
        has_been_checked: true,
        max_check_attempts: 3,
        current_attempt: 1,
        active_checks_enabled: true,
        notifications_enabled: true,
        accept_passive_checks: true,
        event_handler_enabled: true,
        flap_detection_enabled: true,
        check_interval: 1.0,
        retry_interval: 1.0,
        last_check: FIXTURE_NOW - 30,
        next_check: FIXTURE_NOW + 30,
        last_state_change: FIXTURE_NOW - 3600,
        last_hard_state_change: FIXTURE_NOW - 3600,
        check_command: "check-host-alive".to_string(),
        notification_period: "24x7".to_string(),
        check_period: "24x7".to_string(),
        ..Default::default()
    }
}

fn service(host_name: &str, description: &str, state: i32, output: &str) -> Service {
    Service {
        host_name: host_name.to_string(),
        description: description.to_string(),
        display_name: description.to_string(),
        state,
        last_hard_state: state,
        state_type: 1,
        has_been_checked: true,
        max_check_attempts: 3,
        current_attempt: 1,
        active_checks_enabled: true,
        notifications_enabled: true,
        accept_passive_checks: true,
        flap_detection_enabled: true,
        check_interval: 1.0,
        retry_interval: 1.0,
        plugin_output: output.to_string(),
        last_check: FIXTURE_NOW - 20,
        next_check: FIXTURE_NOW + 40,
        last_state_change: FIXTURE_NOW - 600,
        notification_period: "24x7".to_string(),
        check_period: "24x7".to_string(),
        ..Default::default()
    }
}

#[allow(dead_code)]
impl ObjectDefinitions {
    /// A small site: three hosts, five services (three critical), two
    /// host groups, one service group, contacts with groups, downtimes,
    /// comments and a few timeperiods.
    pub fn typical_site() -> Self {
        let mut myhost = host("myhost", 0);
        myhost.alias = "My Host".to_string();
        myhost.address = "127.0.0.1".to_string();
        myhost.contacts = strings(&["alice"]);
        myhost.contact_groups = strings(&["admins"]);
        myhost.parents = strings(&["router"]);
        myhost.plugin_output = "PING OK - rta 0.05ms".to_string();
        myhost.custom_variables = attributes(&[("TAGS", "prod linux"), ("SITE", "muc")]);
        myhost.labels = attributes(&[("os", "linux")]);
        myhost.latency = 0.25;

        let mut otherhost = host("otherhost", 1);
        otherhost.address = "10.0.0.2".to_string();
        otherhost.contacts = strings(&["bob"]);
        otherhost.parents = strings(&["router"]);
        otherhost.plugin_output = "CRITICAL - Host Unreachable".to_string();
        otherhost.scheduled_downtime_depth = 1;
        otherhost.latency = 0.75;
        otherhost.labels = attributes(&[("os", "linux")]);

        let mut router = host("router", 0);
        router.address = "10.0.0.1".to_string();
        router.contact_groups = strings(&["network"]);
        router.plugin_output = "PING OK".to_string();
        router.latency = 0.5;

        let mut cpu = service("myhost", "CPU load", 2, "CRIT - 15min load 5.20");
        cpu.perf_data = "load1=5.2;4;8;0; load15=3.1;4;8;0;".to_string();
        cpu.acknowledged = true;
        cpu.acknowledgement_type = 1;
        cpu.contacts = strings(&["alice"]);
        cpu.execution_time = 0.5;
        let mut memory = service("myhost", "Memory", 0, "OK - 42% used");
        memory.perf_data = "mem_used=42%;80;90;0;100".to_string();
        memory.execution_time = 1.5;
        let mut disk = service("myhost", "Disk /", 2, "CRIT - 98% used");
        disk.custom_variables = attributes(&[("FS", "/")]);
        disk.scheduled_downtime_depth = 1;
        disk.execution_time = 1.0;
        let mut ping = service("otherhost", "PING", 2, "CRIT - 100% packet loss");
        ping.contacts = strings(&["bob"]);
        ping.execution_time = 4.0;
        ping.labels = attributes(&[("proto", "icmp")]);
        let mut interface = service("router", "Interface 1", 1, "WARN - errors on eth0");
        interface.long_plugin_output = "rx errors: 12\ntx errors: 3".to_string();
        interface.execution_time = 3.0;

        Self {
            hosts: vec![myhost, otherhost, router],
            services: vec![cpu, memory, disk, ping, interface],
            downtimes: vec![
                Downtime {
                    id: 1,
                    author: "bob".to_string(),
                    comment: "network maintenance".to_string(),
                    host_name: "otherhost".to_string(),
                    entry_time: FIXTURE_NOW - 7200,
                    start_time: FIXTURE_NOW - 3600,
                    end_time: FIXTURE_NOW + 3600,
                    fixed: true,
                    duration: 7200,
                    ..Default::default()
                },
                Downtime {
                    id: 2,
                    author: "alice".to_string(),
                    comment: "disk replacement".to_string(),
                    host_name: "myhost".to_string(),
                    service_description: Some("Disk /".to_string()),
                    entry_time: FIXTURE_NOW - 600,
                    start_time: FIXTURE_NOW - 300,
                    end_time: FIXTURE_NOW + 300,
                    fixed: true,
                    duration: 600,
                    ..Default::default()
                },
            ],
            comments: vec![
                Comment {
                    id: 1,
                    author: "alice".to_string(),
                    comment: "looking into it".to_string(),
                    host_name: "myhost".to_string(),
                    service_description: Some("CPU load".to_string()),
                    entry_time: FIXTURE_NOW - 100,
                    entry_type: 4,
                    persistent: true,
                    source: 1,
                    ..Default::default()
                },
                Comment {
                    id: 2,
                    author: "carol".to_string(),
                    comment: "new firmware".to_string(),
                    host_name: "router".to_string(),
                    entry_time: FIXTURE_NOW - 50,
                    entry_type: 1,
                    ..Default::default()
                },
            ],
            contacts: vec![
                Contact {
                    name: "alice".to_string(),
                    alias: "Alice Admin".to_string(),
                    email: "alice@example.com".to_string(),
                    host_notification_period: "24x7".to_string(),
                    service_notification_period: "workhours".to_string(),
                    host_notifications_enabled: true,
                    service_notifications_enabled: true,
                    can_submit_commands: true,
                    ..Default::default()
                },
                Contact {
                    name: "bob".to_string(),
                    alias: "Bob".to_string(),
                    email: "bob@example.com".to_string(),
                    ..Default::default()
                },
                Contact {
                    name: "carol".to_string(),
                    alias: "Carol Network".to_string(),
                    pager: "+49 89 1234".to_string(),
                    custom_variables: attributes(&[("TEAM", "network")]),
                    ..Default::default()
                },
            ],
            contact_groups: vec![
                ContactGroup {
                    name: "admins".to_string(),
                    alias: "Administrators".to_string(),
                    members: strings(&["alice"]),
                },
                ContactGroup {
                    name: "network".to_string(),
                    alias: "Network Team".to_string(),
                    members: strings(&["carol"]),
                },
            ],
            host_groups: vec![
                HostGroup {
                    name: "linux-servers".to_string(),
                    alias: "Linux Servers".to_string(),
                    members: strings(&["myhost", "otherhost"]),
                    ..Default::default()
                },
                HostGroup {
                    name: "network".to_string(),
                    alias: "Network Devices".to_string(),
                    members: strings(&["router"]),
                    ..Default::default()
                },
            ],
            service_groups: vec![ServiceGroup {
                name: "critical-stuff".to_string(),
                alias: "Critical Stuff".to_string(),
                members: vec![
                    ("myhost".to_string(), "CPU load".to_string()),
                    ("otherhost".to_string(), "PING".to_string()),
                ],
                ..Default::default()
            }],
            timeperiods: vec![
                Timeperiod {
                    name: "24x7".to_string(),
                    alias: "Always".to_string(),
                    ranges: week(&WEEK, "00:00-24:00"),
                    exclude: Vec::new(),
                },
                Timeperiod {
                    name: "workhours".to_string(),
                    alias: "Work Hours".to_string(),
                    ranges: week(&WEEK[..5], "09:00-17:00"),
                    exclude: Vec::new(),
                },
                Timeperiod {
                    name: "never".to_string(),
                    alias: "Never".to_string(),
                    ..Default::default()
                },
                Timeperiod {
                    name: "24x7-except-24x7".to_string(),
                    alias: "Always, but not".to_string(),
                    ranges: week(&WEEK, "00:00-24:00"),
                    exclude: strings(&["24x7"]),
                },
            ],
            commands: vec![
                Command {
                    name: "check-host-alive".to_string(),
                    line: "check_icmp -H $HOSTADDRESS$".to_string(),
                },
                Command {
                    name: "check_cpu".to_string(),
                    line: "check_cpu -w 4 -c 8".to_string(),
                },
            ],
            status: ProgramStatus {
                program_version: "2.3.0".to_string(),
                program_start: FIXTURE_NOW - 86400,
                pid: 4711,
                ..Default::default()
            },
        }
    }
}
