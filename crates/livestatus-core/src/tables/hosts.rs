//! The `hosts` table.

use std::sync::Arc;

use super::check_columns::{add_check_columns, expand_host_macros};
use super::{Context, RowSink, Scope, Table, primary_key_not_found};
use crate::auth::User;
use crate::column::{Column, ColumnCatalog, ColumnOffsets, Row, Value};
use crate::core::{Host, MonitoringCore, Service};
use crate::error::RequestError;

fn key(host: &Host) -> (&str, Option<&str>) {
    (&host.name, None)
}

fn expand(host: &Host, text: &str) -> String {
    expand_host_macros(text, host)
}

/// Orders service states by badness: OK < WARNING < UNKNOWN < CRITICAL.
pub fn service_state_rank(state: i32) -> i32 {
    match state {
        2 => 3,
        3 => 2,
        other => other,
    }
}

/// The worse of two service states.
pub fn worse_service_state(a: i32, b: i32) -> i32 {
    if service_state_rank(b) > service_state_rank(a) { b } else { a }
}

fn visible_services(core: &dyn MonitoringCore, host: &Host, user: &User) -> Vec<Arc<Service>> {
    core.services_of_host(&host.name)
        .into_iter()
        .filter(|s| user.is_authorized_for_service(s))
        .collect()
}

/// A filter on one host's services, counted into `num_services_*`.
type ServicePredicate = fn(&Service) -> bool;

pub(crate) const SERVICE_COUNTS: [(&str, &str, ServicePredicate); 11] = [
    ("num_services", "The total number of services", |_| true),
    ("num_services_pending", "The number of services that have not been checked yet", |s| !s.has_been_checked),
    ("num_services_ok", "The number of services with state OK", |s| s.has_been_checked && s.state == 0),
    ("num_services_warn", "The number of services with state WARN", |s| s.has_been_checked && s.state == 1),
    ("num_services_crit", "The number of services with state CRIT", |s| s.has_been_checked && s.state == 2),
    ("num_services_unknown", "The number of services with state UNKNOWN", |s| s.has_been_checked && s.state == 3),
    ("num_services_handled_problems", "The number of services with a handled problem", |s| {
        s.has_been_checked && s.state != 0 && (s.acknowledged || s.scheduled_downtime_depth > 0)
    }),
    ("num_services_unhandled_problems", "The number of services with an unhandled problem", |s| {
        s.has_been_checked && s.state != 0 && !s.acknowledged && s.scheduled_downtime_depth == 0
    }),
    ("num_services_hard_ok", "The number of services with hard state OK", |s| s.has_been_checked && s.last_hard_state == 0),
    ("num_services_hard_warn", "The number of services with hard state WARN", |s| s.has_been_checked && s.last_hard_state == 1),
    ("num_services_hard_crit", "The number of services with hard state CRIT", |s| s.has_been_checked && s.last_hard_state == 2),
];

/// Registers the host columns under `prefix`; `offsets` lead from the
/// table's row to a [`Host`].
pub fn add_columns(catalog: &mut ColumnCatalog, ctx: &Arc<Context>, prefix: &str, offsets: &ColumnOffsets) {
    let name = |n: &str| format!("{prefix}{n}");

    catalog.add(Column::string(&name("name"), "Host name", offsets, |h: &Host| h.name.clone()));
    catalog.add(Column::string(&name("alias"), "An alias name for the host", offsets, |h: &Host| h.alias.clone()));
    catalog.add(Column::string(&name("address"), "IP address", offsets, |h: &Host| h.address.clone()));
    catalog.add(Column::string(&name("filename"), "The value of the custom variable FILENAME", offsets, |h: &Host| {
        h.filename.clone()
    }));
    catalog.add(Column::int(&name("pending_flex_downtime"), "Number of pending flexible downtimes", offsets, |h: &Host| {
        i64::from(h.pending_flex_downtime)
    }));
    catalog.add(Column::time(&name("last_time_up"), "The last time the host was UP (Unix timestamp)", offsets, |h: &Host| {
        h.last_time_up
    }));
    catalog.add(Column::time(&name("last_time_down"), "The last time the host was DOWN (Unix timestamp)", offsets, |h: &Host| {
        h.last_time_down
    }));
    catalog.add(Column::time(
        &name("last_time_unreachable"),
        "The last time the host was UNREACHABLE (Unix timestamp)",
        offsets,
        |h: &Host| h.last_time_unreachable,
    ));
    catalog.add(Column::string_list(&name("parents"), "A list of all direct parents of the host", offsets, |h: &Host| {
        h.parents.clone()
    }));

    add_check_columns!(catalog, ctx, prefix, offsets, Host, key = key, expand = expand);

    let c = Arc::clone(ctx);
    catalog.add(Column::string_list(&name("childs"), "A list of all direct children of the host", offsets, move |h: &Host| {
        c.core.children_of_host(&h.name)
    }));

    let c = Arc::clone(ctx);
    catalog.add(Column::list(&name("services"), "A list of all services of the host", offsets, move |h: &Host, user: &User| {
        visible_services(c.core.as_ref(), h, user)
            .iter()
            .map(|s| Value::from(s.description.as_str()))
            .collect()
    }));
    let c = Arc::clone(ctx);
    catalog.add(Column::list(
        &name("services_with_state"),
        "A list of all services including their state and whether they have been checked",
        offsets,
        move |h: &Host, user: &User| {
            visible_services(c.core.as_ref(), h, user)
                .iter()
                .map(|s| {
                    Value::List(vec![
                        Value::from(s.description.as_str()),
                        Value::Int(i64::from(s.state)),
                        Value::Int(i64::from(s.has_been_checked)),
                    ])
                })
                .collect()
        },
    ));
    let c = Arc::clone(ctx);
    catalog.add(Column::list(
        &name("services_with_info"),
        "A list of all services including state, whether checked and plugin output",
        offsets,
        move |h: &Host, user: &User| {
            visible_services(c.core.as_ref(), h, user)
                .iter()
                .map(|s| {
                    Value::List(vec![
                        Value::from(s.description.as_str()),
                        Value::Int(i64::from(s.state)),
                        Value::Int(i64::from(s.has_been_checked)),
                        Value::from(s.plugin_output.as_str()),
                    ])
                })
                .collect()
        },
    ));

    for (column, description, predicate) in SERVICE_COUNTS {
        let c = Arc::clone(ctx);
        catalog.add(Column::int_for_user(&name(column), description, offsets, move |h: &Host, user: &User| {
            visible_services(c.core.as_ref(), h, user)
                .iter()
                .filter(|s| predicate(s))
                .count() as i64
        }));
    }

    let c = Arc::clone(ctx);
    catalog.add(Column::int_for_user(
        &name("worst_service_state"),
        "The worst soft state of all of the host's services (OK <= WARN <= UNKNOWN <= CRIT)",
        offsets,
        move |h: &Host, user: &User| {
            let worst = visible_services(c.core.as_ref(), h, user)
                .iter()
                .filter(|s| s.has_been_checked)
                .fold(0, |worst, s| worse_service_state(worst, s.state));
            i64::from(worst)
        },
    ));
    let c = Arc::clone(ctx);
    catalog.add(Column::int_for_user(
        &name("worst_service_hard_state"),
        "The worst hard state of all of the host's services (OK <= WARN <= UNKNOWN <= CRIT)",
        offsets,
        move |h: &Host, user: &User| {
            let worst = visible_services(c.core.as_ref(), h, user)
                .iter()
                .filter(|s| s.has_been_checked)
                .fold(0, |worst, s| worse_service_state(worst, s.last_hard_state));
            i64::from(worst)
        },
    ));
}

pub struct HostsTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

impl HostsTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let mut catalog = ColumnCatalog::new();
        add_columns(&mut catalog, ctx, "", &ColumnOffsets::new());
        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }
}

impl Table for HostsTable {
    fn name(&self) -> &'static str {
        "hosts"
    }

    fn name_prefix(&self) -> &'static str {
        "host_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        // A filter on the host name selects at most one host.
        if let Some(name) = scope.filter.string_value_restriction_for("name") {
            if let Some(host) = self.ctx.core.find_host(&name)
                && scope.user.is_authorized_for_host(&host)
            {
                sink(Row::new(&*host));
            }
            return Ok(());
        }
        self.ctx.core.all_of_hosts(&mut |host| {
            !scope.user.is_authorized_for_host(host) || sink(Row::new(&**host))
        });
        Ok(())
    }

    fn with_row(
        &self,
        key: &str,
        user: &User,
        check: &mut dyn for<'r> FnMut(Row<'r>) -> bool,
    ) -> Result<bool, RequestError> {
        match self.ctx.core.find_host(key) {
            Some(host) if user.is_authorized_for_host(&host) => Ok(check(Row::new(&*host))),
            _ => Err(primary_key_not_found(self.name(), key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Authorization;
    use crate::filter::{Filter, RelationalOperator};
    use crate::tables::testing::{context, rows};

    #[test]
    fn test_basic_columns() {
        let table = HostsTable::new(&context());
        let result = rows(&table, &User::NoAuth, &["name", "host_address", "parents", "childs"]);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0][0], Value::from("myhost"));
        assert_eq!(result[0][1], Value::from("127.0.0.1"));
        assert_eq!(result[0][2], Value::strings(["router"]));
        assert_eq!(result[2][3], Value::strings(["myhost", "otherhost"]));
    }

    #[test]
    fn test_service_counts_and_worst_state() {
        let table = HostsTable::new(&context());
        let result = rows(
            &table,
            &User::NoAuth,
            &["num_services", "num_services_crit", "num_services_ok", "worst_service_state", "num_services_unhandled_problems"],
        );
        assert_eq!(
            result[0],
            vec![Value::Int(3), Value::Int(2), Value::Int(1), Value::Int(2), Value::Int(0)]
        );
        assert_eq!(result[2][3], Value::Int(1));
    }

    #[test]
    fn test_check_columns() {
        let table = HostsTable::new(&context());
        let result = rows(
            &table,
            &User::NoAuth,
            &["hard_state", "custom_variable_names", "labels", "downtimes", "comments_with_info", "check_command_expanded"],
        );
        assert_eq!(result[0][1], Value::strings(["SITE", "TAGS"]));
        assert_eq!(result[0][2], Value::Dict(vec![("os".to_string(), Value::from("linux"))]));
        assert_eq!(result[1][0], Value::Int(1));
        assert_eq!(result[1][3], Value::List(vec![Value::Int(1)]));
        assert_eq!(
            result[2][4],
            Value::List(vec![Value::List(vec![
                Value::Int(2),
                Value::from("carol"),
                Value::from("new firmware")
            ])])
        );
        assert_eq!(result[0][5], Value::from("check-host-alive"));
    }

    #[test]
    fn test_authorization_hides_hosts() {
        let ctx = context();
        let table = HostsTable::new(&ctx);
        let alice = User::resolve(ctx.core.as_ref(), "alice", Authorization::default());
        let result = rows(&table, &alice, &["name", "num_services"]);
        assert_eq!(result, vec![vec![Value::from("myhost"), Value::Int(3)]]);

        let nobody = User::Unknown("mallory".to_string());
        assert!(rows(&table, &nobody, &["name"]).is_empty());
    }

    #[test]
    fn test_name_filter_uses_lookup() {
        let table = HostsTable::new(&context());
        let column = table.column("name").unwrap();
        let filter = Filter::Column(crate::filter::ColumnFilter::new(column, RelationalOperator::Equal, "router").unwrap());
        let scope = Scope {
            filter: &filter,
            user: &User::NoAuth,
            timezone_offset: 0,
        };
        let mut names = Vec::new();
        let name = table.column("name").unwrap();
        table
            .answer_query(&scope, &mut |row| {
                names.push(name.get(row, &User::NoAuth));
                true
            })
            .unwrap();
        assert_eq!(names, vec![Value::from("router")]);
    }

    #[test]
    fn test_with_row() {
        let table = HostsTable::new(&context());
        let state = table.column("state").unwrap();
        let down = table
            .with_row("otherhost", &User::NoAuth, &mut |row| state.get(row, &User::NoAuth) == Value::Int(1))
            .unwrap();
        assert!(down);
        assert!(table.with_row("nohost", &User::NoAuth, &mut |_| true).is_err());
    }

    #[test]
    fn test_worse_service_state() {
        assert_eq!(worse_service_state(3, 2), 2);
        assert_eq!(worse_service_state(1, 3), 3);
        assert_eq!(worse_service_state(0, 1), 1);
    }
}
