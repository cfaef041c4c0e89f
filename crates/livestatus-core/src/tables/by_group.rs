//! Objects listed once per group they belong to: `hostsbygroup`,
//! `servicesbygroup` and `servicesbyhostgroup`.

use std::sync::Arc;

use super::groups::{add_host_group_columns, add_service_group_columns};
use super::{Context, RowSink, Scope, Table, hosts, services};
use crate::column::{ColumnCatalog, ColumnOffsets, Row};
use crate::core::{Host, HostGroup, Service, ServiceGroup};
use crate::error::RequestError;

pub struct HostByGroup {
    pub host: Arc<Host>,
    pub group: Arc<HostGroup>,
}

pub struct ServiceByGroup {
    pub service: Arc<Service>,
    pub group: Arc<ServiceGroup>,
}

pub struct ServiceByHostGroup {
    pub service: Arc<Service>,
    pub group: Arc<HostGroup>,
}

// ============================================================
// hostsbygroup
// ============================================================

pub struct HostsByGroupTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

impl HostsByGroupTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let offsets = ColumnOffsets::new();
        let mut catalog = ColumnCatalog::new();
        hosts::add_columns(
            &mut catalog,
            ctx,
            "",
            &offsets.add(|row| row.raw::<HostByGroup>().map(|r| Row::new(&*r.host))),
        );
        add_host_group_columns(
            &mut catalog,
            ctx,
            "hostgroup_",
            &offsets.add(|row| row.raw::<HostByGroup>().map(|r| Row::new(&*r.group))),
        );
        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }
}

impl Table for HostsByGroupTable {
    fn name(&self) -> &'static str {
        "hostsbygroup"
    }

    fn name_prefix(&self) -> &'static str {
        "host_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        self.ctx.core.all_of_host_groups(&mut |group| {
            for host in &group.hosts {
                if !scope.user.is_authorized_for_host(host) {
                    continue;
                }
                let row = HostByGroup {
                    host: Arc::clone(host),
                    group: Arc::clone(group),
                };
                if !sink(Row::new(&row)) {
                    return false;
                }
            }
            true
        });
        Ok(())
    }
}

// ============================================================
// servicesbygroup
// ============================================================

pub struct ServicesByGroupTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

impl ServicesByGroupTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let offsets = ColumnOffsets::new();
        let mut catalog = ColumnCatalog::new();
        services::add_columns(
            &mut catalog,
            ctx,
            "",
            &offsets.add(|row| row.raw::<ServiceByGroup>().map(|r| Row::new(&*r.service))),
            true,
        );
        add_service_group_columns(
            &mut catalog,
            "servicegroup_",
            &offsets.add(|row| row.raw::<ServiceByGroup>().map(|r| Row::new(&*r.group))),
        );
        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }
}

impl Table for ServicesByGroupTable {
    fn name(&self) -> &'static str {
        "servicesbygroup"
    }

    fn name_prefix(&self) -> &'static str {
        "service_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        self.ctx.core.all_of_service_groups(&mut |group| {
            for service in &group.services {
                if !scope.user.is_authorized_for_service(service) {
                    continue;
                }
                let row = ServiceByGroup {
                    service: Arc::clone(service),
                    group: Arc::clone(group),
                };
                if !sink(Row::new(&row)) {
                    return false;
                }
            }
            true
        });
        Ok(())
    }
}

// ============================================================
// servicesbyhostgroup
// ============================================================

pub struct ServicesByHostGroupTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

impl ServicesByHostGroupTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let offsets = ColumnOffsets::new();
        let mut catalog = ColumnCatalog::new();
        services::add_columns(
            &mut catalog,
            ctx,
            "",
            &offsets.add(|row| row.raw::<ServiceByHostGroup>().map(|r| Row::new(&*r.service))),
            true,
        );
        add_host_group_columns(
            &mut catalog,
            ctx,
            "hostgroup_",
            &offsets.add(|row| row.raw::<ServiceByHostGroup>().map(|r| Row::new(&*r.group))),
        );
        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }
}

impl Table for ServicesByHostGroupTable {
    fn name(&self) -> &'static str {
        "servicesbyhostgroup"
    }

    fn name_prefix(&self) -> &'static str {
        "service_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        let core = &self.ctx.core;
        core.all_of_host_groups(&mut |group| {
            for host in &group.hosts {
                for service in core.services_of_host(&host.name) {
                    if !scope.user.is_authorized_for_service(&service) {
                        continue;
                    }
                    let row = ServiceByHostGroup {
                        service,
                        group: Arc::clone(group),
                    };
                    if !sink(Row::new(&row)) {
                        return false;
                    }
                }
            }
            true
        });
        Ok(())
    }
}
