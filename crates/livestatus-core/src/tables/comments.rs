//! The `comments` table, joined with `host_` and `service_` columns.

use std::sync::Arc;

use super::{Context, RowSink, Scope, Table, hosts, primary_key_not_found, services};
use crate::auth::User;
use crate::column::{Column, ColumnCatalog, ColumnOffsets, Row};
use crate::core::Comment;
use crate::error::RequestError;

pub struct CommentsTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

impl CommentsTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let offsets = ColumnOffsets::new();
        let mut catalog = ColumnCatalog::new();
        catalog.add(Column::int("id", "The id of the comment", &offsets, |c: &Comment| c.id));
        catalog.add(Column::string("author", "The contact that entered the comment", &offsets, |c: &Comment| {
            c.author.clone()
        }));
        catalog.add(Column::string("comment", "A comment text", &offsets, |c: &Comment| c.comment.clone()));
        catalog.add(Column::time("entry_time", "The time the entry was made as UNIX timestamp", &offsets, |c: &Comment| {
            c.entry_time
        }));
        catalog.add(Column::int(
            "entry_type",
            "The type of the comment: 1 is user, 2 is downtime, 3 is flapping and 4 is acknowledgement",
            &offsets,
            |c: &Comment| i64::from(c.entry_type),
        ));
        catalog.add(Column::bool("expires", "Whether this comment expires", &offsets, |c: &Comment| c.expires));
        catalog.add(Column::time("expire_time", "The time of expiry of this comment as a UNIX timestamp", &offsets, |c: &Comment| {
            c.expire_time
        }));
        catalog.add(Column::bool("persistent", "Whether this comment is persistent (0/1)", &offsets, |c: &Comment| {
            c.persistent
        }));
        catalog.add(Column::int("source", "The source of the comment (0 is internal and 1 is external)", &offsets, |c: &Comment| {
            i64::from(c.source)
        }));
        catalog.add(Column::int("type", "The type of the comment: 1 is host, 2 is service", &offsets, |c: &Comment| {
            if c.is_service() { 2 } else { 1 }
        }));
        catalog.add(Column::bool("is_service", "0, if this entry is for a host, 1 if it is for a service", &offsets, |c: &Comment| {
            c.is_service()
        }));

        hosts::add_columns(
            &mut catalog,
            ctx,
            "host_",
            &offsets.add(|row| row.raw::<Comment>().map(|c| Row::new(&*c.host))),
        );
        services::add_columns(
            &mut catalog,
            ctx,
            "service_",
            &offsets.add(|row| row.raw::<Comment>().and_then(|c| c.service.as_deref()).map(Row::new)),
            false,
        );
        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }
}

impl Table for CommentsTable {
    fn name(&self) -> &'static str {
        "comments"
    }

    fn name_prefix(&self) -> &'static str {
        "comment_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        self.ctx.core.all_of_comments(&mut |comment| {
            !scope
                .user
                .is_authorized_for_object(Some(&comment.host), comment.service.as_deref(), false)
                || sink(Row::new(&**comment))
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
        self.ctx.core.all_of_comments(&mut |comment| {
            if comment.id == id {
                found = Some(Arc::clone(comment));
                return false;
            }
            true
        });
        match found {
            Some(comment) if user.is_authorized_for_object(Some(&comment.host), comment.service.as_deref(), false) => {
                Ok(check(Row::new(&*comment)))
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
    fn test_comments() {
        let table = CommentsTable::new(&context());
        let result = rows(
            &table,
            &User::NoAuth,
            &["id", "type", "entry_type", "host_name", "service_state", "comment"],
        );
        assert_eq!(
            result[0],
            vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(4),
                Value::from("myhost"),
                Value::Int(2),
                Value::from("looking into it")
            ]
        );
        // Host comments yield defaults for service columns.
        assert_eq!(result[1][4], Value::Int(0));
        assert_eq!(result[1][1], Value::Int(1));
    }

    #[test]
    fn test_authorization() {
        let ctx = context();
        let table = CommentsTable::new(&ctx);
        let carol = User::resolve(ctx.core.as_ref(), "carol", Default::default());
        assert_eq!(rows(&table, &carol, &["id"]), vec![vec![Value::Int(2)]]);
    }
}
