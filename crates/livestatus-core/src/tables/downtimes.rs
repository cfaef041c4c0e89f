//! The `downtimes` table, joined with `host_` and `service_` columns.

use std::sync::Arc;

use chrono::Utc;

use super::{Context, RowSink, Scope, Table, hosts, primary_key_not_found, services};
use crate::auth::User;
use crate::column::{Column, ColumnCatalog, ColumnOffsets, Row};
use crate::core::Downtime;
use crate::error::RequestError;

pub struct DowntimesTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

impl DowntimesTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let offsets = ColumnOffsets::new();
        let mut catalog = ColumnCatalog::new();
        catalog.add(Column::int("id", "The id of the downtime", &offsets, |d: &Downtime| d.id));
        catalog.add(Column::string("author", "The contact that scheduled the downtime", &offsets, |d: &Downtime| {
            d.author.clone()
        }));
        catalog.add(Column::string("comment", "A comment text", &offsets, |d: &Downtime| d.comment.clone()));
        catalog.add(Column::time("entry_time", "The time the entry was made as UNIX timestamp", &offsets, |d: &Downtime| {
            d.entry_time
        }));
        catalog.add(Column::time("start_time", "The start time of the downtime as UNIX timestamp", &offsets, |d: &Downtime| {
            d.start_time
        }));
        catalog.add(Column::time("end_time", "The end time of the downtime as UNIX timestamp", &offsets, |d: &Downtime| {
            d.end_time
        }));
        catalog.add(Column::bool("fixed", "A 1 if the downtime is fixed, a 0 if it is flexible", &offsets, |d: &Downtime| {
            d.fixed
        }));
        catalog.add(Column::int("duration", "The duration of the downtime in seconds", &offsets, |d: &Downtime| {
            d.duration
        }));
        catalog.add(Column::int("triggered_by", "The id of the downtime this downtime was triggered by or 0", &offsets, |d: &Downtime| {
            d.triggered_by
        }));
        catalog.add(Column::int("type", "1 if the downtime is pending, 0 if it is active", &offsets, |d: &Downtime| {
            i64::from(Utc::now().timestamp() < d.start_time)
        }));
        catalog.add(Column::bool("is_service", "0, if this entry is for a host, 1 if it is for a service", &offsets, |d: &Downtime| {
            d.is_service()
        }));

        hosts::add_columns(
            &mut catalog,
            ctx,
            "host_",
            &offsets.add(|row| row.raw::<Downtime>().map(|d| Row::new(&*d.host))),
        );
        services::add_columns(
            &mut catalog,
            ctx,
            "service_",
            &offsets.add(|row| row.raw::<Downtime>().and_then(|d| d.service.as_deref()).map(Row::new)),
            false,
        );
        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }
}

impl Table for DowntimesTable {
    fn name(&self) -> &'static str {
        "downtimes"
    }

    fn name_prefix(&self) -> &'static str {
        "downtime_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        self.ctx.core.all_of_downtimes(&mut |downtime| {
            !scope
                .user
                .is_authorized_for_object(Some(&downtime.host), downtime.service.as_deref(), false)
                || sink(Row::new(&**downtime))
        });
        Ok(())
    }

    fn with_row(
        &self,
        key: &str,
        user: &User,
        check: &mut dyn for<'r> FnMut(Row<'r>) -> bool,
    ) -> Result<bool, RequestError> {
        let id: i64 = key.trim().parse().map_err(|_| primary_key_not_found(self.name(), key))?;
        let mut found = None;
        self.ctx.core.all_of_downtimes(&mut |downtime| {
            if downtime.id == id {
                found = Some(Arc::clone(downtime));
                return false;
            }
            true
        });
        match found {
            Some(downtime) if user.is_authorized_for_object(Some(&downtime.host), downtime.service.as_deref(), false) => {
                Ok(check(Row::new(&*downtime)))
            }
            _ => Err(primary_key_not_found(self.name(), key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Value;
    use crate::tables::testing::{context, rows};

    #[test]
    fn test_host_and_service_downtimes() {
        let table = DowntimesTable::new(&context());
        let result = rows(
            &table,
            &User::NoAuth,
            &["id", "host_name", "service_description", "is_service", "fixed", "author"],
        );
        assert_eq!(
            result,
            vec![
                vec![
                    Value::Int(1),
                    Value::from("otherhost"),
                    Value::from(""),
                    Value::Int(0),
                    Value::Int(1),
                    Value::from("bob")
                ],
                vec![
                    Value::Int(2),
                    Value::from("myhost"),
                    Value::from("Disk /"),
                    Value::Int(1),
                    Value::Int(1),
                    Value::from("alice")
                ],
            ]
        );
    }

    #[test]
    fn test_authorization() {
        let ctx = context();
        let table = DowntimesTable::new(&ctx);
        let bob = User::resolve(ctx.core.as_ref(), "bob", Default::default());
        assert_eq!(rows(&table, &bob, &["id"]), vec![vec![Value::Int(1)]]);
    }
}
