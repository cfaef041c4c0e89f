//! The `timeperiods` table.

use std::sync::Arc;

use super::{Context, RowSink, Scope, Table, primary_key_not_found};
use crate::auth::User;
use crate::column::{Column, ColumnCatalog, ColumnOffsets, Row, Value};
use crate::core::Timeperiod;
use crate::error::RequestError;

pub struct TimeperiodsTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

impl TimeperiodsTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let offsets = ColumnOffsets::new();
        let mut catalog = ColumnCatalog::new();
        catalog.add(Column::string("name", "The name of the timeperiod", &offsets, |t: &Timeperiod| t.name.clone()));
        catalog.add(Column::string("alias", "The alias of the timeperiod", &offsets, |t: &Timeperiod| t.alias.clone()));
        let c = Arc::clone(ctx);
        catalog.add(Column::bool("in", "Whether we are currently in this period (0/1)", &offsets, move |t: &Timeperiod| {
            c.timeperiods.in_timeperiod(&t.name)
        }));
        catalog.add(Column::dict("ranges", "The weekly ranges, by day", &offsets, |t: &Timeperiod| {
            t.ranges
                .iter()
                .map(|(day, spec)| (day.clone(), Value::from(spec.as_str())))
                .collect()
        }));
        catalog.add(Column::string_list("exclusions", "Timeperiods whose active times are excluded", &offsets, |t: &Timeperiod| {
            t.exclude.clone()
        }));
        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }
}

impl Table for TimeperiodsTable {
    fn name(&self) -> &'static str {
        "timeperiods"
    }

    fn name_prefix(&self) -> &'static str {
        "timeperiod_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, _scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        self.ctx.core.all_of_timeperiods(&mut |period| sink(Row::new(&**period)));
        Ok(())
    }

    fn with_row(
        &self,
        key: &str,
        _user: &User,
        check: &mut dyn for<'r> FnMut(Row<'r>) -> bool,
    ) -> Result<bool, RequestError> {
        match self.ctx.core.find_timeperiod(key) {
            Some(period) => Ok(check(Row::new(&*period))),
            None => Err(primary_key_not_found(self.name(), key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    use crate::tables::testing::{context, rows};

    #[test]
    fn test_in_column_follows_cache() {
        let ctx = context();
        ctx.timeperiods.update(&Local::now(), ctx.core.as_ref());
        let table = TimeperiodsTable::new(&ctx);
        let result = rows(&table, &User::NoAuth, &["name", "in", "exclusions"]);
        assert_eq!(result.len(), 4);
        assert_eq!(result[0][..2], [Value::from("24x7"), Value::Int(1)]);
        assert_eq!(result[2][..2], [Value::from("never"), Value::Int(0)]);
        assert_eq!(result[3][1], Value::Int(0));
        assert_eq!(result[3][2], Value::strings(["24x7"]));
    }
}
