//! The `hostgroups`, `servicegroups` and `contactgroups` tables.

use std::sync::Arc;

use super::hosts::{SERVICE_COUNTS, worse_service_state};
use super::{Context, RowSink, Scope, Table, primary_key_not_found};
use crate::auth::User;
use crate::column::{Column, ColumnCatalog, ColumnOffsets, Row, Value};
use crate::core::{ContactGroup, Host, HostGroup, Service, ServiceGroup};
use crate::error::RequestError;

/// Orders host states by badness: UP < UNREACHABLE < DOWN.
pub fn worse_host_state(a: i32, b: i32) -> i32 {
    let rank = |state: i32| match state {
        1 => 2,
        2 => 1,
        other => other,
    };
    if rank(b) > rank(a) { b } else { a }
}

fn visible_hosts<'g>(group: &'g HostGroup, user: &User) -> Vec<&'g Arc<Host>> {
    group.hosts.iter().filter(|h| user.is_authorized_for_host(h)).collect()
}

fn visible_services_of_hosts(ctx: &Context, group: &HostGroup, user: &User) -> Vec<Arc<Service>> {
    visible_hosts(group, user)
        .iter()
        .flat_map(|h| ctx.core.services_of_host(&h.name))
        .filter(|s| user.is_authorized_for_service(s))
        .collect()
}

fn visible_members<'g>(group: &'g ServiceGroup, user: &User) -> Vec<&'g Arc<Service>> {
    group.services.iter().filter(|s| user.is_authorized_for_service(s)).collect()
}

// ============================================================
// Host groups
// ============================================================

/// Host group columns under `prefix`; `offsets` lead to a [`HostGroup`].
pub fn add_host_group_columns(catalog: &mut ColumnCatalog, ctx: &Arc<Context>, prefix: &str, offsets: &ColumnOffsets) {
    let name = |n: &str| format!("{prefix}{n}");

    catalog.add(Column::string(&name("name"), "Name of the hostgroup", offsets, |g: &HostGroup| g.name.clone()));
    catalog.add(Column::string(&name("alias"), "An alias of the hostgroup", offsets, |g: &HostGroup| g.alias.clone()));
    catalog.add(Column::string(&name("notes"), "Optional additional notes about the hostgroup", offsets, |g: &HostGroup| {
        g.notes.clone()
    }));
    catalog.add(Column::string(&name("notes_url"), "An optional URL to further notes on the hostgroup", offsets, |g: &HostGroup| {
        g.notes_url.clone()
    }));
    catalog.add(Column::string(&name("action_url"), "An optional URL to custom notes or actions", offsets, |g: &HostGroup| {
        g.action_url.clone()
    }));
    catalog.add(Column::list(&name("members"), "A list of all host names that are members of the hostgroup", offsets, |g: &HostGroup, user: &User| {
        visible_hosts(g, user).iter().map(|h| Value::from(h.name.as_str())).collect()
    }));
    catalog.add(Column::list(
        &name("members_with_state"),
        "A list of all host names that are members of the hostgroup together with state and has_been_checked",
        offsets,
        |g: &HostGroup, user: &User| {
            visible_hosts(g, user)
                .iter()
                .map(|h| {
                    Value::List(vec![
                        Value::from(h.name.as_str()),
                        Value::Int(i64::from(h.state)),
                        Value::Int(i64::from(h.has_been_checked)),
                    ])
                })
                .collect()
        },
    ));

    type HostPredicate = fn(&Host) -> bool;
    const HOST_COUNTS: [(&str, &str, HostPredicate); 5] = [
        ("num_hosts", "The total number of hosts in the group", |_| true),
        ("num_hosts_pending", "The number of hosts in the group that are pending", |h| !h.has_been_checked),
        ("num_hosts_up", "The number of hosts in the group that are up", |h| h.has_been_checked && h.state == 0),
        ("num_hosts_down", "The number of hosts in the group that are down", |h| h.has_been_checked && h.state == 1),
        ("num_hosts_unreach", "The number of hosts in the group that are unreachable", |h| {
            h.has_been_checked && h.state == 2
        }),
    ];
    for (column, description, predicate) in HOST_COUNTS {
        catalog.add(Column::int_for_user(&name(column), description, offsets, move |g: &HostGroup, user: &User| {
            visible_hosts(g, user).into_iter().filter(|h| predicate(h)).count() as i64
        }));
    }
    catalog.add(Column::int_for_user(
        &name("worst_host_state"),
        "The worst state of all of the groups' hosts (UP <= UNREACHABLE <= DOWN)",
        offsets,
        |g: &HostGroup, user: &User| {
            let worst = visible_hosts(g, user)
                .into_iter()
                .filter(|h| h.has_been_checked)
                .fold(0, |worst, h| worse_host_state(worst, h.state));
            i64::from(worst)
        },
    ));

    for (column, description, predicate) in SERVICE_COUNTS {
        let c = Arc::clone(ctx);
        catalog.add(Column::int_for_user(&name(column), description, offsets, move |g: &HostGroup, user: &User| {
            visible_services_of_hosts(&c, g, user).iter().filter(|s| predicate(s)).count() as i64
        }));
    }
    let c = Arc::clone(ctx);
    catalog.add(Column::int_for_user(
        &name("worst_service_state"),
        "The worst state of all services that belong to a host of this group (OK <= WARN <= UNKNOWN <= CRIT)",
        offsets,
        move |g: &HostGroup, user: &User| {
            let worst = visible_services_of_hosts(&c, g, user)
                .iter()
                .filter(|s| s.has_been_checked)
                .fold(0, |worst, s| worse_service_state(worst, s.state));
            i64::from(worst)
        },
    ));
}

pub struct HostGroupsTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

impl HostGroupsTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let mut catalog = ColumnCatalog::new();
        add_host_group_columns(&mut catalog, ctx, "", &ColumnOffsets::new());
        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }
}

impl Table for HostGroupsTable {
    fn name(&self) -> &'static str {
        "hostgroups"
    }

    fn name_prefix(&self) -> &'static str {
        "hostgroup_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        self.ctx.core.all_of_host_groups(&mut |group| {
            !scope.user.is_authorized_for_host_group(group) || sink(Row::new(&**group))
        });
        Ok(())
    }

    fn with_row(
        &self,
        key: &str,
        user: &User,
        check: &mut dyn for<'r> FnMut(Row<'r>) -> bool,
    ) -> Result<bool, RequestError> {
        match self.ctx.core.find_host_group(key) {
            Some(group) if user.is_authorized_for_host_group(&group) => Ok(check(Row::new(&*group))),
            _ => Err(primary_key_not_found(self.name(), key)),
        }
    }
}

// ============================================================
// Service groups
// ============================================================

/// Service group columns under `prefix`; `offsets` lead to a [`ServiceGroup`].
pub fn add_service_group_columns(catalog: &mut ColumnCatalog, prefix: &str, offsets: &ColumnOffsets) {
    let name = |n: &str| format!("{prefix}{n}");

    catalog.add(Column::string(&name("name"), "Name of the servicegroup", offsets, |g: &ServiceGroup| g.name.clone()));
    catalog.add(Column::string(&name("alias"), "An alias of the servicegroup", offsets, |g: &ServiceGroup| {
        g.alias.clone()
    }));
    catalog.add(Column::string(&name("notes"), "Optional additional notes about the servicegroup", offsets, |g: &ServiceGroup| {
        g.notes.clone()
    }));
    catalog.add(Column::string(&name("notes_url"), "An optional URL to further notes on the servicegroup", offsets, |g: &ServiceGroup| {
        g.notes_url.clone()
    }));
    catalog.add(Column::string(&name("action_url"), "An optional URL to custom notes or actions", offsets, |g: &ServiceGroup| {
        g.action_url.clone()
    }));
    catalog.add(Column::list(
        &name("members"),
        "A list of all members of the service group as host/service pairs",
        offsets,
        |g: &ServiceGroup, user: &User| {
            visible_members(g, user)
                .iter()
                .map(|s| Value::strings([s.host_name.as_str(), s.description.as_str()]))
                .collect()
        },
    ));
    catalog.add(Column::list(
        &name("members_with_state"),
        "A list of all members of the service group with state and has_been_checked",
        offsets,
        |g: &ServiceGroup, user: &User| {
            visible_members(g, user)
                .iter()
                .map(|s| {
                    Value::List(vec![
                        Value::from(s.host_name.as_str()),
                        Value::from(s.description.as_str()),
                        Value::Int(i64::from(s.state)),
                        Value::Int(i64::from(s.has_been_checked)),
                    ])
                })
                .collect()
        },
    ));
    for (column, description, predicate) in SERVICE_COUNTS {
        catalog.add(Column::int_for_user(&name(column), description, offsets, move |g: &ServiceGroup, user: &User| {
            visible_members(g, user).into_iter().filter(|s| predicate(s)).count() as i64
        }));
    }
    catalog.add(Column::int_for_user(
        &name("worst_service_state"),
        "The worst soft state of all of the groups services (OK <= WARN <= UNKNOWN <= CRIT)",
        offsets,
        |g: &ServiceGroup, user: &User| {
            let worst = visible_members(g, user)
                .into_iter()
                .filter(|s| s.has_been_checked)
                .fold(0, |worst, s| worse_service_state(worst, s.state));
            i64::from(worst)
        },
    ));
}

pub struct ServiceGroupsTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

impl ServiceGroupsTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let mut catalog = ColumnCatalog::new();
        add_service_group_columns(&mut catalog, "", &ColumnOffsets::new());
        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }
}

impl Table for ServiceGroupsTable {
    fn name(&self) -> &'static str {
        "servicegroups"
    }

    fn name_prefix(&self) -> &'static str {
        "servicegroup_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        self.ctx.core.all_of_service_groups(&mut |group| {
            !scope.user.is_authorized_for_service_group(group) || sink(Row::new(&**group))
        });
        Ok(())
    }

    fn with_row(
        &self,
        key: &str,
        user: &User,
        check: &mut dyn for<'r> FnMut(Row<'r>) -> bool,
    ) -> Result<bool, RequestError> {
        match self.ctx.core.find_service_group(key) {
            Some(group) if user.is_authorized_for_service_group(&group) => Ok(check(Row::new(&*group))),
            _ => Err(primary_key_not_found(self.name(), key)),
        }
    }
}

// ============================================================
// Contact groups
// ============================================================

pub struct ContactGroupsTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

impl ContactGroupsTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let offsets = ColumnOffsets::new();
        let mut catalog = ColumnCatalog::new();
        catalog.add(Column::string("name", "Name of the contact group", &offsets, |g: &ContactGroup| g.name.clone()));
        catalog.add(Column::string("alias", "The alias of the contact group", &offsets, |g: &ContactGroup| {
            g.alias.clone()
        }));
        catalog.add(Column::string_list("members", "A list of all members of this contactgroup", &offsets, |g: &ContactGroup| {
            g.members.clone()
        }));
        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }
}

impl Table for ContactGroupsTable {
    fn name(&self) -> &'static str {
        "contactgroups"
    }

    fn name_prefix(&self) -> &'static str {
        "contactgroup_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, _scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        self.ctx.core.all_of_contact_groups(&mut |group| sink(Row::new(&**group)));
        Ok(())
    }

    fn with_row(
        &self,
        key: &str,
        _user: &User,
        check: &mut dyn for<'r> FnMut(Row<'r>) -> bool,
    ) -> Result<bool, RequestError> {
        match self.ctx.core.find_contact_group(key) {
            Some(group) => Ok(check(Row::new(&*group))),
            None => Err(primary_key_not_found(self.name(), key)),
        }
    }
}
