//! Linked, immutable snapshot of all monitoring objects.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use super::model::{
    Command, Comment, Contact, ContactGroup, Downtime, Host, HostGroup, ObjectDefinitions,
    ProgramStatus, Service, ServiceGroup, Timeperiod,
};

/// Objects with their relations resolved.
///
/// Services hold their host, downtimes and comments hold their host and
/// service, and groups hold their members. References to unknown objects
/// are dropped with a warning.
#[derive(Debug, Default)]
pub struct ObjectGraph {
    pub(crate) hosts: Vec<Arc<Host>>,
    host_index: HashMap<String, usize>,
    pub(crate) services: Vec<Arc<Service>>,
    service_index: HashMap<(String, String), usize>,
    services_by_host: HashMap<String, Vec<usize>>,
    children: HashMap<String, Vec<String>>,
    pub(crate) downtimes: Vec<Arc<Downtime>>,
    pub(crate) comments: Vec<Arc<Comment>>,
    pub(crate) contacts: Vec<Arc<Contact>>,
    contact_index: HashMap<String, usize>,
    pub(crate) contact_groups: Vec<Arc<ContactGroup>>,
    pub(crate) host_groups: Vec<Arc<HostGroup>>,
    pub(crate) service_groups: Vec<Arc<ServiceGroup>>,
    pub(crate) timeperiods: Vec<Arc<Timeperiod>>,
    pub(crate) commands: Vec<Arc<Command>>,
    pub(crate) status: ProgramStatus,
}

impl ObjectGraph {
    pub fn new(defs: ObjectDefinitions) -> Self {
        let mut graph = Self {
            status: defs.status,
            ..Default::default()
        };

        // Contact group membership, needed by contacts and by host/service contacts.
        let mut groups_of_contact: HashMap<&str, Vec<String>> = HashMap::new();
        let mut members_of_contact_group: HashMap<&str, &[String]> = HashMap::new();
        for group in &defs.contact_groups {
            members_of_contact_group.insert(group.name.as_str(), group.members.as_slice());
            for member in &group.members {
                groups_of_contact
                    .entry(member.as_str())
                    .or_default()
                    .push(group.name.clone());
            }
        }
        let effective_contacts = |contacts: &[String], groups: &[String]| -> BTreeSet<String> {
            let mut all: BTreeSet<String> = contacts.iter().cloned().collect();
            for group in groups {
                if let Some(members) = members_of_contact_group.get(group.as_str()) {
                    all.extend(members.iter().cloned());
                }
            }
            all
        };

        for mut contact in defs.contacts.iter().cloned() {
            contact.groups = groups_of_contact
                .get(contact.name.as_str())
                .cloned()
                .unwrap_or_default();
            graph
                .contact_index
                .insert(contact.name.clone(), graph.contacts.len());
            graph.contacts.push(Arc::new(contact));
        }

        let mut groups_of_host: HashMap<&str, Vec<String>> = HashMap::new();
        for group in &defs.host_groups {
            for member in &group.members {
                groups_of_host
                    .entry(member.as_str())
                    .or_default()
                    .push(group.name.clone());
            }
        }
        for mut host in defs.hosts.iter().cloned() {
            if graph.host_index.contains_key(&host.name) {
                warn!("duplicate host '{}' ignored", host.name);
                continue;
            }
            host.groups = groups_of_host
                .get(host.name.as_str())
                .cloned()
                .unwrap_or_default();
            host.all_contacts = effective_contacts(&host.contacts, &host.contact_groups);
            for parent in &host.parents {
                graph
                    .children
                    .entry(parent.clone())
                    .or_default()
                    .push(host.name.clone());
            }
            graph.host_index.insert(host.name.clone(), graph.hosts.len());
            graph.hosts.push(Arc::new(host));
        }

        let mut groups_of_service: HashMap<(&str, &str), Vec<String>> = HashMap::new();
        for group in &defs.service_groups {
            for (host_name, description) in &group.members {
                groups_of_service
                    .entry((host_name.as_str(), description.as_str()))
                    .or_default()
                    .push(group.name.clone());
            }
        }
        for mut service in defs.services.iter().cloned() {
            let Some(host) = graph.find_host(&service.host_name) else {
                warn!(
                    "service '{}' references unknown host '{}'",
                    service.description, service.host_name
                );
                continue;
            };
            let key = (service.host_name.clone(), service.description.clone());
            if graph.service_index.contains_key(&key) {
                warn!("duplicate service '{};{}' ignored", key.0, key.1);
                continue;
            }
            service.host = host;
            service.groups = groups_of_service
                .get(&(service.host_name.as_str(), service.description.as_str()))
                .cloned()
                .unwrap_or_default();
            service.all_contacts = effective_contacts(&service.contacts, &service.contact_groups);
            let index = graph.services.len();
            graph
                .services_by_host
                .entry(service.host_name.clone())
                .or_default()
                .push(index);
            graph.service_index.insert(key, index);
            graph.services.push(Arc::new(service));
        }

        for mut group in defs.host_groups {
            group.hosts = group
                .members
                .iter()
                .filter_map(|name| {
                    let host = graph.find_host(name);
                    if host.is_none() {
                        debug!("host group '{}' references unknown host '{}'", group.name, name);
                    }
                    host
                })
                .collect();
            graph.host_groups.push(Arc::new(group));
        }

        for mut group in defs.service_groups {
            group.services = group
                .members
                .iter()
                .filter_map(|(host_name, description)| graph.find_service(host_name, description))
                .collect();
            graph.service_groups.push(Arc::new(group));
        }

        graph.contact_groups = defs.contact_groups.into_iter().map(Arc::new).collect();

        for mut downtime in defs.downtimes {
            match graph.link(&downtime.host_name, downtime.service_description.as_deref()) {
                Some((host, service)) => {
                    downtime.host = host;
                    downtime.service = service;
                    graph.downtimes.push(Arc::new(downtime));
                }
                None => warn!("downtime {} references an unknown object", downtime.id),
            }
        }
        for mut comment in defs.comments {
            match graph.link(&comment.host_name, comment.service_description.as_deref()) {
                Some((host, service)) => {
                    comment.host = host;
                    comment.service = service;
                    graph.comments.push(Arc::new(comment));
                }
                None => warn!("comment {} references an unknown object", comment.id),
            }
        }

        graph.timeperiods = defs.timeperiods.into_iter().map(Arc::new).collect();
        graph.commands = defs.commands.into_iter().map(Arc::new).collect();
        graph
    }

    fn link(&self, host_name: &str, description: Option<&str>) -> Option<(Arc<Host>, Option<Arc<Service>>)> {
        let host = self.find_host(host_name)?;
        match description {
            Some(description) => Some((host, Some(self.find_service(host_name, description)?))),
            None => Some((host, None)),
        }
    }

    pub fn find_host(&self, name: &str) -> Option<Arc<Host>> {
        self.host_index.get(name).map(|&i| Arc::clone(&self.hosts[i]))
    }

    pub fn find_service(&self, host_name: &str, description: &str) -> Option<Arc<Service>> {
        self.service_index
            .get(&(host_name.to_string(), description.to_string()))
            .map(|&i| Arc::clone(&self.services[i]))
    }

    pub fn find_contact(&self, name: &str) -> Option<Arc<Contact>> {
        self.contact_index
            .get(name)
            .map(|&i| Arc::clone(&self.contacts[i]))
    }

    pub fn services_of_host(&self, host_name: &str) -> Vec<Arc<Service>> {
        self.services_by_host
            .get(host_name)
            .map(|indices| indices.iter().map(|&i| Arc::clone(&self.services[i])).collect())
            .unwrap_or_default()
    }

    pub fn children_of_host(&self, host_name: &str) -> Vec<String> {
        self.children.get(host_name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linking() {
        let graph = ObjectGraph::new(ObjectDefinitions::typical_site());

        let cpu = graph.find_service("myhost", "CPU load").unwrap();
        assert_eq!(cpu.host.name, "myhost");
        assert_eq!(cpu.groups, vec!["critical-stuff"]);

        let myhost = graph.find_host("myhost").unwrap();
        assert_eq!(myhost.groups, vec!["linux-servers"]);
        assert!(myhost.all_contacts.contains("alice"));

        let router = graph.find_host("router").unwrap();
        assert!(router.all_contacts.contains("carol"));
        let mut children = graph.children_of_host("router");
        children.sort();
        assert_eq!(children, vec!["myhost", "otherhost"]);

        assert_eq!(graph.services_of_host("myhost").len(), 3);
        assert_eq!(graph.find_contact("alice").unwrap().groups, vec!["admins"]);
        assert!(graph.downtimes.iter().any(|d| d.is_service()));
    }

    #[test]
    fn test_dangling_references_are_dropped() {
        let mut defs = ObjectDefinitions::default();
        defs.services.push(Service {
            host_name: "ghost".into(),
            description: "PING".into(),
            ..Default::default()
        });
        defs.downtimes.push(Downtime {
            id: 1,
            host_name: "ghost".into(),
            ..Default::default()
        });
        let graph = ObjectGraph::new(defs);
        assert!(graph.services.is_empty());
        assert!(graph.downtimes.is_empty());
    }
}
