//! The `contacts` table.

use std::sync::Arc;

use super::check_columns::{attribute_dict, attribute_names, attribute_values, modified_attributes_list};
use super::{Context, RowSink, Scope, Table, primary_key_not_found};
use crate::auth::User;
use crate::column::{Column, ColumnCatalog, ColumnOffsets, Row};
use crate::core::Contact;
use crate::error::RequestError;

/// Contact columns under `prefix`; `offsets` lead to a [`Contact`].
pub fn add_columns(catalog: &mut ColumnCatalog, ctx: &Arc<Context>, prefix: &str, offsets: &ColumnOffsets) {
    let name = |n: &str| format!("{prefix}{n}");

    catalog.add(Column::string(&name("name"), "The login name of the contact person", offsets, |c: &Contact| {
        c.name.clone()
    }));
    catalog.add(Column::string(&name("alias"), "The full name of the contact", offsets, |c: &Contact| c.alias.clone()));
    catalog.add(Column::string(&name("email"), "The email address of the contact", offsets, |c: &Contact| c.email.clone()));
    catalog.add(Column::string(&name("pager"), "The pager address of the contact", offsets, |c: &Contact| c.pager.clone()));
    catalog.add(Column::string(
        &name("host_notification_period"),
        "The time period in which the contact will be notified about host problems",
        offsets,
        |c: &Contact| c.host_notification_period.clone(),
    ));
    catalog.add(Column::string(
        &name("service_notification_period"),
        "The time period in which the contact will be notified about service problems",
        offsets,
        |c: &Contact| c.service_notification_period.clone(),
    ));
    catalog.add(Column::bool(
        &name("host_notifications_enabled"),
        "Whether the contact will be notified about host problems in general (0/1)",
        offsets,
        |c: &Contact| c.host_notifications_enabled,
    ));
    catalog.add(Column::bool(
        &name("service_notifications_enabled"),
        "Whether the contact will be notified about service problems in general (0/1)",
        offsets,
        |c: &Contact| c.service_notifications_enabled,
    ));
    catalog.add(Column::bool(&name("can_submit_commands"), "Whether the contact is allowed to submit commands (0/1)", offsets, |c: &Contact| {
        c.can_submit_commands
    }));
    let tp = Arc::clone(ctx);
    catalog.add(Column::bool(
        &name("in_host_notification_period"),
        "Whether the contact is currently in his/her host notification period (0/1)",
        offsets,
        move |c: &Contact| tp.timeperiods.in_timeperiod(&c.host_notification_period),
    ));
    let tp = Arc::clone(ctx);
    catalog.add(Column::bool(
        &name("in_service_notification_period"),
        "Whether the contact is currently in his/her service notification period (0/1)",
        offsets,
        move |c: &Contact| tp.timeperiods.in_timeperiod(&c.service_notification_period),
    ));
    catalog.add(Column::string_list(&name("contactgroups"), "A list of all contact groups this contact is in", offsets, |c: &Contact| {
        c.groups.clone()
    }));
    catalog.add(Column::string_list(&name("custom_variable_names"), "A list of all custom variables of the contact", offsets, |c: &Contact| {
        attribute_names(&c.custom_variables)
    }));
    catalog.add(Column::string_list(&name("custom_variable_values"), "A list of the values of all custom variables of the contact", offsets, |c: &Contact| {
        attribute_values(&c.custom_variables)
    }));
    catalog.add(Column::dict(&name("custom_variables"), "A dictionary of the custom variables", offsets, |c: &Contact| {
        attribute_dict(&c.custom_variables)
    }));
    catalog.add(Column::int(&name("modified_attributes"), "A bitmask specifying which attributes have been modified", offsets, |c: &Contact| {
        c.modified_attributes
    }));
    catalog.add(Column::string_list(&name("modified_attributes_list"), "A list of all modified attributes", offsets, |c: &Contact| {
        modified_attributes_list(c.modified_attributes)
    }));
}

pub struct ContactsTable {
    ctx: Arc<Context>,
    catalog: ColumnCatalog,
}

impl ContactsTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let mut catalog = ColumnCatalog::new();
        add_columns(&mut catalog, ctx, "", &ColumnOffsets::new());
        Self {
            ctx: Arc::clone(ctx),
            catalog,
        }
    }
}

impl Table for ContactsTable {
    fn name(&self) -> &'static str {
        "contacts"
    }

    fn name_prefix(&self) -> &'static str {
        "contact_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn answer_query(&self, _scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        self.ctx.core.all_of_contacts(&mut |contact| sink(Row::new(&**contact)));
        Ok(())
    }

    fn with_row(
        &self,
        key: &str,
        _user: &User,
        check: &mut dyn for<'r> FnMut(Row<'r>) -> bool,
    ) -> Result<bool, RequestError> {
        match self.ctx.core.find_contact(key) {
            Some(contact) => Ok(check(Row::new(&*contact))),
            None => Err(primary_key_not_found(self.name(), key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Value;
    use crate::tables::testing::{context, rows};

    #[test]
    fn test_contacts() {
        let table = ContactsTable::new(&context());
        let result = rows(&table, &User::NoAuth, &["name", "contact_email", "contactgroups", "can_submit_commands"]);
        assert_eq!(result.len(), 3);
        assert_eq!(
            result[0],
            vec![
                Value::from("alice"),
                Value::from("alice@example.com"),
                Value::strings(["admins"]),
                Value::Int(1)
            ]
        );
        assert_eq!(result[2][2], Value::strings(["network"]));
    }

    #[test]
    fn test_custom_variables() {
        let table = ContactsTable::new(&context());
        let result = rows(&table, &User::NoAuth, &["custom_variables"]);
        assert_eq!(result[2][0], Value::Dict(vec![("TEAM".to_string(), Value::from("network"))]));
    }
}
