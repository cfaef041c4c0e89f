//! The `services` table; host columns are joined with a `host_` prefix.

use std::sync::Arc;

use super::check_columns::{add_check_columns, expand_service_macros};
use super::{Context, RowSink, Scope, Table, hosts, primary_key_not_found};
use crate::auth::User;
use crate::column::{Column, ColumnCatalog, ColumnOffsets, Row};
use crate::core::Service;
use crate::error::RequestError;

fn key(service: &Service) -> (&str, Option<&str>) {
    (&service.host_name, Some(&service.description))
}

fn expand(service: &Service, text: &str) -> String {
    expand_service_macros(text, service)
}

/// Registers the service columns under `prefix`. With `with_host`, the
/// host columns are joined as `{prefix}host_*`.
pub fn add_columns(
    catalog: &mut ColumnCatalog,
    ctx: &Arc<Context>,
    prefix: &str,
    offsets: &ColumnOffsets,
    with_host: bool,
) {
    let name = |n: &str| format!("{prefix}{n}");

    catalog.add(Column::string(&name("description"), "Service description", offsets, |s: &Service| {
        s.description.clone()
    }));
    catalog.add(Column::time(&name("last_time_ok"), "The last time the service was OK (Unix timestamp)", offsets, |s: &Service| {
        s.last_time_ok
    }));
    catalog.add(Column::time(
        &name("last_time_warning"),
        "The last time the service was in WARNING state (Unix timestamp)",
        offsets,
        |s: &Service| s.last_time_warning,
    ));
    catalog.add(Column::time(
        &name("last_time_critical"),
        "The last time the service was CRITICAL (Unix timestamp)",
        offsets,
        |s: &Service| s.last_time_critical,
    ));
    catalog.add(Column::time(
        &name("last_time_unknown"),
        "The last time the service was UNKNOWN (Unix timestamp)",
        offsets,
        |s: &Service| s.last_time_unknown,
    ));

    add_check_columns!(catalog, ctx, prefix, offsets, Service, key = key, expand = expand);

    if with_host {
        let to_host = offsets.add(|row| row.raw::<Service>().map(|s| Row::new(&*s.host)));
        hosts::add_columns(catalog, ctx, &format!("{prefix}host_"), &to_host);
    }
}

/// Splits a wait object key into host name and service description.
/// The separator is a semicolon, or the first space if there is none.
pub fn split_service_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(';').or_else(|| key.split_once(' '))
}

pub struct ServicesTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

impl ServicesTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let mut catalog = ColumnCatalog::new();
        add_columns(&mut catalog, ctx, "", &ColumnOffsets::new(), true);
        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }
}

impl Table for ServicesTable {
    fn name(&self) -> &'static str {
        "services"
    }

    fn name_prefix(&self) -> &'static str {
        "service_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        let user = scope.user;
        // Services of a single host are found without a full scan.
        if let Some(host_name) = scope.filter.string_value_restriction_for("host_name") {
            for service in self.ctx.core.services_of_host(&host_name) {
                if user.is_authorized_for_service(&service) && !sink(Row::new(&*service)) {
                    break;
                }
            }
            return Ok(());
        }
        self.ctx.core.all_of_services(&mut |service| {
            !user.is_authorized_for_service(service) || sink(Row::new(&**service))
        });
        Ok(())
    }

    fn with_row(
        &self,
        key: &str,
        user: &User,
        check: &mut dyn for<'r> FnMut(Row<'r>) -> bool,
    ) -> Result<bool, RequestError> {
        let service = split_service_key(key)
            .and_then(|(host_name, description)| self.ctx.core.find_service(host_name, description));
        match service {
            Some(service) if user.is_authorized_for_service(&service) => Ok(check(Row::new(&*service))),
            _ => Err(primary_key_not_found(self.name(), key)),
        }
    }
}
