//! Columns hosts and services have in common.
//!
//! Hosts and services carry the same check state under the same field
//! names, so their shared columns are generated by one macro instead of
//! two hand-kept lists.

use crate::core::model::Attributes;
use crate::core::{Host, MonitoringCore, Service};
use crate::column::Value;
use crate::util::PerformanceData;

/// Names of the `modified_attributes` bits, lowest bit first.
const MODIFIED_ATTRIBUTES: [&str; 17] = [
    "notifications_enabled",
    "active_checks_enabled",
    "passive_checks_enabled",
    "event_handler_enabled",
    "flap_detection_enabled",
    "failure_prediction_enabled",
    "performance_data_enabled",
    "obsessive_handler_enabled",
    "event_handler_command",
    "check_command",
    "normal_check_interval",
    "retry_check_interval",
    "max_check_attempts",
    "freshness_checks_enabled",
    "check_timeperiod",
    "custom_variable",
    "notification_timeperiod",
];

pub fn modified_attributes_list(bits: i64) -> Vec<String> {
    MODIFIED_ATTRIBUTES
        .iter()
        .enumerate()
        .filter(|(i, _)| bits & (1 << i) != 0)
        .map(|(_, name)| name.to_string())
        .collect()
}

pub fn attribute_names(attributes: &Attributes) -> Vec<String> {
    attributes.keys().cloned().collect()
}

pub fn attribute_values(attributes: &Attributes) -> Vec<String> {
    attributes.values().cloned().collect()
}

pub fn attribute_dict(attributes: &Attributes) -> Vec<(String, Value)> {
    attributes
        .iter()
        .map(|(k, v)| (k.clone(), Value::Str(v.clone())))
        .collect()
}

pub fn metric_names(perf_data: &str) -> Vec<String> {
    PerformanceData::parse(perf_data)
        .metrics()
        .iter()
        .map(|m| m.name.clone())
        .collect()
}

/// `performance_data`: metric name to value.
pub fn performance_data(perf_data: &str) -> Vec<(String, Value)> {
    PerformanceData::parse(perf_data)
        .metrics()
        .iter()
        .map(|m| (m.name.clone(), Value::Double(m.value)))
        .collect()
}

/// The state a soft problem will be reported with once it turns hard.
pub fn hard_state(state: i32, state_type: i32, last_hard_state: i32) -> i64 {
    if state == 0 {
        0
    } else if state_type == 1 {
        i64::from(state)
    } else {
        i64::from(last_hard_state)
    }
}

/// Detail level of the `downtimes*` and `comments*` list columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    Ids,
    Info,
}

pub fn downtime_list(core: &dyn MonitoringCore, host: &str, service: Option<&str>, detail: Detail) -> Vec<Value> {
    core.downtimes_of(host, service)
        .iter()
        .map(|d| match detail {
            Detail::Ids => Value::Int(d.id),
            Detail::Info => Value::List(vec![
                Value::Int(d.id),
                Value::from(d.author.as_str()),
                Value::from(d.comment.as_str()),
            ]),
        })
        .collect()
}

pub fn comment_list(core: &dyn MonitoringCore, host: &str, service: Option<&str>, detail: Detail) -> Vec<Value> {
    core.comments_of(host, service)
        .iter()
        .map(|c| match detail {
            Detail::Ids => Value::Int(c.id),
            Detail::Info => Value::List(vec![
                Value::Int(c.id),
                Value::from(c.author.as_str()),
                Value::from(c.comment.as_str()),
            ]),
        })
        .collect()
}

fn expand_custom(text: &mut String, kind: &str, attributes: &Attributes) {
    for (name, value) in attributes {
        *text = text.replace(&format!("$_{kind}{}$", name.to_uppercase()), value);
    }
}

pub fn expand_host_macros(text: &str, host: &Host) -> String {
    let mut text = text
        .replace("$HOSTNAME$", &host.name)
        .replace("$HOSTDISPLAYNAME$", &host.display_name)
        .replace("$HOSTALIAS$", &host.alias)
        .replace("$HOSTADDRESS$", &host.address);
    expand_custom(&mut text, "HOST", &host.custom_variables);
    text
}

pub fn expand_service_macros(text: &str, service: &Service) -> String {
    let mut text = text
        .replace("$SERVICEDESC$", &service.description)
        .replace("$SERVICEDISPLAYNAME$", &service.display_name);
    expand_custom(&mut text, "SERVICE", &service.custom_variables);
    expand_host_macros(&text, &service.host)
}

/// Registers the shared columns for `$ty` (`Host` or `Service`).
///
/// `key` yields the host name and service description used to find
/// downtimes and comments; `expand` resolves `$MACRO$`s in a field.
macro_rules! add_check_columns {
    ($catalog:expr, $ctx:expr, $prefix:expr, $offsets:expr, $ty:ty, key = $key:expr, expand = $expand:expr) => {{
        use std::sync::Arc;
        use $crate::column::Column;
        use $crate::tables::check_columns::*;

        let catalog: &mut $crate::column::ColumnCatalog = $catalog;
        let ctx: &Arc<$crate::tables::Context> = $ctx;
        let prefix: &str = $prefix;
        let offsets: &$crate::column::ColumnOffsets = $offsets;
        let key: fn(&$ty) -> (&str, Option<&str>) = $key;
        let expand: fn(&$ty, &str) -> String = $expand;
        let name = |n: &str| format!("{prefix}{n}");

        add_check_columns!(@fields catalog, prefix, offsets, $ty, string, std::convert::identity,
            display_name: "Optional display name",
            check_command: "Logical command name for active checks",
            event_handler: "Command used as event handler",
            notification_period: "Time period in which problems are notified",
            check_period: "Time period in which checks are executed",
            service_period: "Time period used for availability",
            notes: "Optional notes",
            notes_url: "An optional URL with further information",
            action_url: "An optional URL to custom actions or information",
            icon_image: "The name of an image file to be used in the web pages",
            icon_image_alt: "Alternative text for the icon_image",
            plugin_output: "Output of the last check",
            long_plugin_output: "Long (extra) output of the last check",
            perf_data: "Optional performance data of the last check",
        );
        add_check_columns!(@fields catalog, prefix, offsets, $ty, int, i64::from,
            initial_state: "Initial state",
            max_check_attempts: "Maximum attempts for active checks before a hard state",
            current_attempt: "Number of the current check attempts",
            state: "The current state",
            state_type: "Type of the current state (0: soft, 1: hard)",
            last_state: "State before the last state change",
            last_hard_state: "Last hard state",
            has_been_checked: "Whether a check has already been executed (0/1)",
            acknowledged: "Whether the current problem has been acknowledged (0/1)",
            acknowledgement_type: "Type of acknowledgement (0: none, 1: normal, 2: sticky)",
            check_type: "Type of check (0: active, 1: passive)",
            active_checks_enabled: "Whether active checks are enabled (0/1)",
            notifications_enabled: "Whether notifications are enabled (0/1)",
            accept_passive_checks: "Whether passive checks are accepted (0/1)",
            event_handler_enabled: "Whether event handling is enabled (0/1)",
            flap_detection_enabled: "Whether flap detection is enabled (0/1)",
            is_flapping: "Whether the state is flapping (0/1)",
            is_executing: "Whether a check is currently being executed (0/1)",
            scheduled_downtime_depth: "The number of downtimes this object is currently in",
            no_more_notifications: "Whether no further notifications are sent (0/1)",
            current_notification_number: "Number of the current notification",
            modified_attributes: "A bitmask specifying which attributes have been modified",
        );
        add_check_columns!(@fields catalog, prefix, offsets, $ty, time, i64::from,
            last_check: "Time of the last check (Unix timestamp)",
            next_check: "Scheduled time for the next check (Unix timestamp)",
            last_state_change: "Time of the last state change (Unix timestamp)",
            last_hard_state_change: "Time of the last hard state change (Unix timestamp)",
            last_notification: "Time of the last notification (Unix timestamp)",
            next_notification: "Time of the next notification (Unix timestamp)",
        );
        add_check_columns!(@fields catalog, prefix, offsets, $ty, double, f64::from,
            check_interval: "Number of basic interval lengths between two scheduled checks",
            retry_interval: "Number of basic interval lengths between checks when retrying after a soft error",
            notification_interval: "Interval of periodic notification in minutes or 0 if its off",
            first_notification_delay: "Delay before the first notification",
            latency: "Time difference between scheduled check time and actual check time",
            execution_time: "Time the check needed for execution",
            percent_state_change: "Percent state change",
            staleness: "The staleness of this object",
        );

        catalog.add(Column::bool(&name("checks_enabled"), "Whether checks are enabled (0/1)", offsets, |o: &$ty| {
            o.active_checks_enabled
        }));
        catalog.add(Column::int(&name("hard_state"), "The effective hard state", offsets, |o: &$ty| {
            hard_state(o.state, o.state_type, o.last_hard_state)
        }));
        catalog.add(Column::double(&name("flappiness"), "The current level of flappiness", offsets, |o: &$ty| {
            o.percent_state_change
        }));
        catalog.add(Column::string(&name("check_command_expanded"), "Check command with macros expanded", offsets, move |o: &$ty| {
            expand(o, &o.check_command)
        }));
        catalog.add(Column::string(&name("notes_expanded"), "Notes with macros expanded", offsets, move |o: &$ty| {
            expand(o, &o.notes)
        }));
        catalog.add(Column::string(&name("notes_url_expanded"), "Notes URL with macros expanded", offsets, move |o: &$ty| {
            expand(o, &o.notes_url)
        }));
        catalog.add(Column::string(&name("action_url_expanded"), "Action URL with macros expanded", offsets, move |o: &$ty| {
            expand(o, &o.action_url)
        }));
        catalog.add(Column::string(&name("icon_image_expanded"), "Icon image with macros expanded", offsets, move |o: &$ty| {
            expand(o, &o.icon_image)
        }));

        let c = Arc::clone(ctx);
        catalog.add(Column::bool(&name("in_notification_period"), "Whether we are in the notification period (0/1)", offsets, move |o: &$ty| {
            c.timeperiods.in_timeperiod(&o.notification_period)
        }));
        let c = Arc::clone(ctx);
        catalog.add(Column::bool(&name("in_check_period"), "Whether we are in the check period (0/1)", offsets, move |o: &$ty| {
            c.timeperiods.in_timeperiod(&o.check_period)
        }));
        let c = Arc::clone(ctx);
        catalog.add(Column::bool(&name("in_service_period"), "Whether we are in the service period (0/1)", offsets, move |o: &$ty| {
            c.timeperiods.in_timeperiod(&o.service_period)
        }));

        catalog.add(Column::string_list(&name("contacts"), "A list of all contacts, direct or via contact groups", offsets, |o: &$ty| {
            o.all_contacts.iter().cloned().collect()
        }));
        catalog.add(Column::string_list(&name("contact_groups"), "A list of all contact groups", offsets, |o: &$ty| {
            o.contact_groups.clone()
        }));
        catalog.add(Column::string_list(&name("groups"), "A list of all groups this object is in", offsets, |o: &$ty| {
            o.groups.clone()
        }));
        catalog.add(Column::string_list(&name("custom_variable_names"), "A list of the names of the custom variables", offsets, |o: &$ty| {
            attribute_names(&o.custom_variables)
        }));
        catalog.add(Column::string_list(&name("custom_variable_values"), "A list of the values of the custom variables", offsets, |o: &$ty| {
            attribute_values(&o.custom_variables)
        }));
        catalog.add(Column::dict(&name("custom_variables"), "A dictionary of the custom variables", offsets, |o: &$ty| {
            attribute_dict(&o.custom_variables)
        }));
        catalog.add(Column::string_list(&name("tag_names"), "A list of the names of the tags", offsets, |o: &$ty| {
            attribute_names(&o.tags)
        }));
        catalog.add(Column::string_list(&name("tag_values"), "A list of the values of the tags", offsets, |o: &$ty| {
            attribute_values(&o.tags)
        }));
        catalog.add(Column::dict(&name("tags"), "A dictionary of the tags", offsets, |o: &$ty| {
            attribute_dict(&o.tags)
        }));
        catalog.add(Column::string_list(&name("label_names"), "A list of the names of the labels", offsets, |o: &$ty| {
            attribute_names(&o.labels)
        }));
        catalog.add(Column::string_list(&name("label_values"), "A list of the values of the labels", offsets, |o: &$ty| {
            attribute_values(&o.labels)
        }));
        catalog.add(Column::dict(&name("labels"), "A dictionary of the labels", offsets, |o: &$ty| {
            attribute_dict(&o.labels)
        }));
        catalog.add(Column::string_list(&name("metrics"), "A list of all metrics of this object", offsets, |o: &$ty| {
            metric_names(&o.perf_data)
        }));
        catalog.add(Column::dict(&name("performance_data"), "Optional performance data as a dictionary", offsets, |o: &$ty| {
            performance_data(&o.perf_data)
        }));
        catalog.add(Column::string_list(&name("modified_attributes_list"), "A list of all modified attributes", offsets, |o: &$ty| {
            modified_attributes_list(o.modified_attributes)
        }));

        for (column, detail, description) in [
            ("downtimes", Detail::Ids, "A list of the ids of all scheduled downtimes"),
            ("downtimes_with_info", Detail::Info, "A list of the scheduled downtimes with id, author and comment"),
        ] {
            let c = Arc::clone(ctx);
            catalog.add(Column::list(&name(column), description, offsets, move |o: &$ty, _: &$crate::auth::User| {
                let (host, service) = key(o);
                downtime_list(c.core.as_ref(), host, service, detail)
            }));
        }
        for (column, detail, description) in [
            ("comments", Detail::Ids, "A list of the ids of all comments"),
            ("comments_with_info", Detail::Info, "A list of all comments with id, author and comment"),
        ] {
            let c = Arc::clone(ctx);
            catalog.add(Column::list(&name(column), description, offsets, move |o: &$ty, _: &$crate::auth::User| {
                let (host, service) = key(o);
                comment_list(c.core.as_ref(), host, service, detail)
            }));
        }
    }};

    (@fields $catalog:ident, $prefix:ident, $offsets:ident, $ty:ty, $kind:ident, $conv:expr, $($field:ident: $desc:literal),* $(,)?) => {
        $(
            $catalog.add(add_check_columns!(@column $kind, &format!("{}{}", $prefix, stringify!($field)), $desc, $offsets, |o: &$ty| ($conv)(o.$field.clone())));
        )*
    };
    (@column string, $name:expr, $desc:expr, $offsets:expr, $f:expr) => { Column::string($name, $desc, $offsets, $f) };
    (@column int, $name:expr, $desc:expr, $offsets:expr, $f:expr) => { Column::int($name, $desc, $offsets, $f) };
    (@column time, $name:expr, $desc:expr, $offsets:expr, $f:expr) => { Column::time($name, $desc, $offsets, $f) };
    (@column double, $name:expr, $desc:expr, $offsets:expr, $f:expr) => { Column::double($name, $desc, $offsets, $f) };
}

pub(crate) use add_check_columns;
