//! Read-only accessor interface to the monitoring core.
//!
//! ```text
//!   ┌──────────────┐   all_of_* / find_* / services_of_host ...  ┌──────────┐
//!   │   tables     │ ──────────────────────────────────────────▶ │  core    │
//!   │ (row sources)│ ◀── &Arc<Host>, &Arc<Service>, ...          │ (trait)  │
//!   └──────────────┘                                             └──────────┘
//! ```
//!
//! Tables never own core objects beyond the callback. The in-memory
//! implementation hands out snapshots, so iteration is consistent even
//! while the daemon swaps in a reloaded object graph.

pub mod graph;
pub mod memory;
pub mod model;
pub mod scenarios;

use std::sync::Arc;

use chrono::{DateTime, Local};

pub use graph::ObjectGraph;
pub use memory::InMemoryCore;
pub use model::{
    Command, Comment, Contact, ContactGroup, Downtime, Host, HostGroup, ObjectDefinitions,
    ProgramStatus, Service, ServiceGroup, Timeperiod, host_state_name, service_state_name,
};

/// Callback over core objects; returning `false` stops the iteration.
pub type Visitor<'f, T> = &'f mut dyn FnMut(&Arc<T>) -> bool;

/// Accessors Livestatus needs from the embedding monitoring core.
///
/// Every `all_of_*` method returns `false` if the visitor stopped early.
pub trait MonitoringCore: Send + Sync {
    fn all_of_hosts(&self, visitor: Visitor<'_, Host>) -> bool;
    fn all_of_services(&self, visitor: Visitor<'_, Service>) -> bool;
    fn all_of_downtimes(&self, visitor: Visitor<'_, Downtime>) -> bool;
    fn all_of_comments(&self, visitor: Visitor<'_, Comment>) -> bool;
    fn all_of_contacts(&self, visitor: Visitor<'_, Contact>) -> bool;
    fn all_of_contact_groups(&self, visitor: Visitor<'_, ContactGroup>) -> bool;
    fn all_of_host_groups(&self, visitor: Visitor<'_, HostGroup>) -> bool;
    fn all_of_service_groups(&self, visitor: Visitor<'_, ServiceGroup>) -> bool;
    fn all_of_timeperiods(&self, visitor: Visitor<'_, Timeperiod>) -> bool;
    fn all_of_commands(&self, visitor: Visitor<'_, Command>) -> bool;

    fn find_host(&self, name: &str) -> Option<Arc<Host>>;
    fn find_service(&self, host_name: &str, description: &str) -> Option<Arc<Service>>;
    fn find_contact(&self, name: &str) -> Option<Arc<Contact>>;

    fn services_of_host(&self, host_name: &str) -> Vec<Arc<Service>>;
    fn children_of_host(&self, host_name: &str) -> Vec<String>;

    fn program_status(&self) -> ProgramStatus;

    /// Forwards an external command line verbatim.
    fn submit_command(&self, command: &str);

    fn find_contact_group(&self, name: &str) -> Option<Arc<ContactGroup>> {
        find_by(|v| self.all_of_contact_groups(v), |g| g.name == name)
    }

    fn find_host_group(&self, name: &str) -> Option<Arc<HostGroup>> {
        find_by(|v| self.all_of_host_groups(v), |g| g.name == name)
    }

    fn find_service_group(&self, name: &str) -> Option<Arc<ServiceGroup>> {
        find_by(|v| self.all_of_service_groups(v), |g| g.name == name)
    }

    fn find_timeperiod(&self, name: &str) -> Option<Arc<Timeperiod>> {
        find_by(|v| self.all_of_timeperiods(v), |t| t.name == name)
    }

    fn find_command(&self, name: &str) -> Option<Arc<Command>> {
        find_by(|v| self.all_of_commands(v), |c| c.name == name)
    }

    /// Downtimes of a host (`None`) or of one of its services.
    fn downtimes_of(&self, host_name: &str, description: Option<&str>) -> Vec<Arc<Downtime>> {
        let mut result = Vec::new();
        self.all_of_downtimes(&mut |d| {
            if d.host_name == host_name && d.service_description.as_deref() == description {
                result.push(Arc::clone(d));
            }
            true
        });
        result
    }

    fn comments_of(&self, host_name: &str, description: Option<&str>) -> Vec<Arc<Comment>> {
        let mut result = Vec::new();
        self.all_of_comments(&mut |c| {
            if c.host_name == host_name && c.service_description.as_deref() == description {
                result.push(Arc::clone(c));
            }
            true
        });
        result
    }

    /// Is `at` inside the named timeperiod? Unknown or empty names count
    /// as always active.
    fn is_in_timeperiod(&self, name: &str, at: &DateTime<Local>) -> bool {
        if name.is_empty() {
            return true;
        }
        in_timeperiod(self, name, at, 0)
    }
}

fn find_by<T>(
    iterate: impl FnOnce(Visitor<'_, T>) -> bool,
    matches: impl Fn(&T) -> bool,
) -> Option<Arc<T>> {
    let mut found = None;
    iterate(&mut |item| {
        if matches(item) {
            found = Some(Arc::clone(item));
            return false;
        }
        true
    });
    found
}

/// Exclusion chains deeper than this are treated as cycles.
const MAX_EXCLUDE_DEPTH: usize = 8;

fn in_timeperiod<C: MonitoringCore + ?Sized>(
    core: &C,
    name: &str,
    at: &DateTime<Local>,
    depth: usize,
) -> bool {
    let Some(period) = core.find_timeperiod(name) else {
        return true;
    };
    if !period.contains(at) {
        return false;
    }
    depth >= MAX_EXCLUDE_DEPTH
        || !period
            .exclude
            .iter()
            .any(|excluded| core.find_timeperiod(excluded).is_some() && in_timeperiod(core, excluded, at, depth + 1))
}
