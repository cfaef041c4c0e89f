//! The `labels` table: every distinct label of the visible hosts and
//! services, ordered by name and value.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::{Context, RowSink, Scope, Table};
use crate::column::{Column, ColumnCatalog, ColumnOffsets, Row};
use crate::core::MonitoringCore;
use crate::error::RequestError;

pub struct Label {
    pub name: String,
    pub value: String,
}

pub struct LabelsTable {
    core: Arc<dyn MonitoringCore>,
    catalog: ColumnCatalog,
}

impl LabelsTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let offsets = ColumnOffsets::new();
        let mut catalog = ColumnCatalog::new();
        catalog.add(Column::string("name", "The name of the label", &offsets, |l: &Label| l.name.clone()));
        catalog.add(Column::string("value", "The value of the label", &offsets, |l: &Label| l.value.clone()));
        Self {
            core: Arc::clone(&ctx.core),
            catalog,
        }
    }
}

impl Table for LabelsTable {
    fn name(&self) -> &'static str {
        "labels"
    }

    fn name_prefix(&self) -> &'static str {
        "label_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        let mut labels = BTreeSet::new();
        self.core.all_of_hosts(&mut |host| {
            if scope.user.is_authorized_for_host(host) {
                labels.extend(host.labels.iter().map(|(n, v)| (n.clone(), v.clone())));
            }
            true
        });
        self.core.all_of_services(&mut |service| {
            if scope.user.is_authorized_for_service(service) {
                labels.extend(service.labels.iter().map(|(n, v)| (n.clone(), v.clone())));
            }
            true
        });
        for (name, value) in labels {
            if !sink(Row::new(&Label { name, value })) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::User;
    use crate::column::Value;
    use crate::tables::testing::{context, rows};

    fn pairs(result: Vec<Vec<Value>>) -> Vec<(String, String)> {
        result.into_iter().map(|r| (r[0].to_text(), r[1].to_text())).collect()
    }

    #[test]
    fn test_distinct_labels() {
        let table = LabelsTable::new(&context());
        let result = rows(&table, &User::NoAuth, &["name", "label_value"]);
        assert_eq!(
            pairs(result),
            vec![
                ("os".to_string(), "linux".to_string()),
                ("proto".to_string(), "icmp".to_string()),
            ]
        );
    }

    #[test]
    fn test_labels_follow_authorization() {
        let ctx = context();
        let table = LabelsTable::new(&ctx);
        let alice = User::resolve(ctx.core.as_ref(), "alice", Default::default());
        assert_eq!(pairs(rows(&table, &alice, &["name", "value"])), vec![("os".to_string(), "linux".to_string())]);
        let nobody = User::resolve(ctx.core.as_ref(), "nobody", Default::default());
        assert!(rows(&table, &nobody, &["name"]).is_empty());
    }
}
