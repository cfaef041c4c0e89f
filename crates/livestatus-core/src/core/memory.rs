//! In-memory monitoring core backed by a JSON object document.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use super::graph::ObjectGraph;
use super::model::{
    Command, Comment, Contact, ContactGroup, Downtime, Host, HostGroup, ObjectDefinitions,
    ProgramStatus, Service, ServiceGroup, Timeperiod,
};
use super::{MonitoringCore, Visitor};
use crate::error::CoreError;

/// A core whose objects live in an [`ObjectGraph`] snapshot.
///
/// Readers clone the current `Arc<ObjectGraph>` and iterate without holding
/// the lock; [`InMemoryCore::replace`] swaps in a new graph atomically.
pub struct InMemoryCore {
    graph: RwLock<Arc<ObjectGraph>>,
    command_file: Option<PathBuf>,
    submitted: Mutex<Vec<String>>,
}

impl InMemoryCore {
    pub fn new(defs: ObjectDefinitions) -> Self {
        Self {
            graph: RwLock::new(Arc::new(ObjectGraph::new(defs))),
            command_file: None,
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Appends every submitted command to `path`, one per line.
    pub fn with_command_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.command_file = Some(path.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn load_definitions(path: &Path) -> Result<ObjectDefinitions, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|source| CoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| CoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replaces all objects. Queries already running keep their snapshot.
    pub fn replace(&self, defs: ObjectDefinitions) {
        let graph = Arc::new(ObjectGraph::new(defs));
        info!(
            "object graph replaced: {} hosts, {} services",
            graph.hosts.len(),
            graph.services.len()
        );
        *self.graph.write() = graph;
    }

    pub fn snapshot(&self) -> Arc<ObjectGraph> {
        Arc::clone(&self.graph.read())
    }

    /// Commands submitted so far, oldest first.
    pub fn submitted_commands(&self) -> Vec<String> {
        self.submitted.lock().clone()
    }
}

fn visit<T>(items: &[Arc<T>], visitor: Visitor<'_, T>) -> bool {
    items.iter().all(|item| visitor(item))
}

impl MonitoringCore for InMemoryCore {
    fn all_of_hosts(&self, visitor: Visitor<'_, Host>) -> bool {
        visit(&self.snapshot().hosts, visitor)
    }

    fn all_of_services(&self, visitor: Visitor<'_, Service>) -> bool {
        visit(&self.snapshot().services, visitor)
    }

    fn all_of_downtimes(&self, visitor: Visitor<'_, Downtime>) -> bool {
        visit(&self.snapshot().downtimes, visitor)
    }

    fn all_of_comments(&self, visitor: Visitor<'_, Comment>) -> bool {
        visit(&self.snapshot().comments, visitor)
    }

    fn all_of_contacts(&self, visitor: Visitor<'_, Contact>) -> bool {
        visit(&self.snapshot().contacts, visitor)
    }

    fn all_of_contact_groups(&self, visitor: Visitor<'_, ContactGroup>) -> bool {
        visit(&self.snapshot().contact_groups, visitor)
    }

    fn all_of_host_groups(&self, visitor: Visitor<'_, HostGroup>) -> bool {
        visit(&self.snapshot().host_groups, visitor)
    }

    fn all_of_service_groups(&self, visitor: Visitor<'_, ServiceGroup>) -> bool {
        visit(&self.snapshot().service_groups, visitor)
    }

    fn all_of_timeperiods(&self, visitor: Visitor<'_, Timeperiod>) -> bool {
        visit(&self.snapshot().timeperiods, visitor)
    }

    fn all_of_commands(&self, visitor: Visitor<'_, Command>) -> bool {
        visit(&self.snapshot().commands, visitor)
    }

    fn find_host(&self, name: &str) -> Option<Arc<Host>> {
        self.snapshot().find_host(name)
    }

    fn find_service(&self, host_name: &str, description: &str) -> Option<Arc<Service>> {
        self.snapshot().find_service(host_name, description)
    }

    fn find_contact(&self, name: &str) -> Option<Arc<Contact>> {
        self.snapshot().find_contact(name)
    }

    fn services_of_host(&self, host_name: &str) -> Vec<Arc<Service>> {
        self.snapshot().services_of_host(host_name)
    }

    fn children_of_host(&self, host_name: &str) -> Vec<String> {
        self.snapshot().children_of_host(host_name)
    }

    fn program_status(&self) -> ProgramStatus {
        self.snapshot().status.clone()
    }

    fn submit_command(&self, command: &str) {
        info!("external command: {}", command);
        self.submitted.lock().push(command.to_string());
        let Some(path) = &self.command_file else {
            return;
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{}", command));
        if let Err(e) = result {
            warn!("cannot write command to {}: {}", path.display(), e);
        }
    }
}
