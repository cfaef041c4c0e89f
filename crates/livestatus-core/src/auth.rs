//! Per-request authorization.
//!
//! `AuthUser: <contact>` restricts a query to objects the contact may see.
//! Without that header every row is visible.

use std::collections::HashSet;
use std::str::FromStr;

use crate::core::{Host, HostGroup, MonitoringCore, Service, ServiceGroup};

/// How service visibility is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceAuthorization {
    /// Contacts of the host may also see all of its services.
    #[default]
    Loose,
    /// Only contacts of the service itself.
    Strict,
}

/// How group visibility is derived from the members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupAuthorization {
    /// At least one member is visible.
    Loose,
    /// Every member is visible.
    #[default]
    Strict,
}

impl FromStr for ServiceAuthorization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loose" => Ok(Self::Loose),
            "strict" => Ok(Self::Strict),
            _ => Err("expected 'strict' or 'loose'".to_string()),
        }
    }
}

impl FromStr for GroupAuthorization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loose" => Ok(Self::Loose),
            "strict" => Ok(Self::Strict),
            _ => Err("expected 'strict' or 'loose'".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Authorization {
    pub service: ServiceAuthorization,
    pub group: GroupAuthorization,
}

/// The identity a query runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum User {
    /// No `AuthUser` header.
    NoAuth,
    /// `AuthUser` named a contact the core does not know.
    Unknown(String),
    Contact {
        name: String,
        contact_groups: HashSet<String>,
        authorization: Authorization,
    },
}

impl User {
    /// Resolves an `AuthUser` name against the core's contacts.
    pub fn resolve(core: &dyn MonitoringCore, name: &str, authorization: Authorization) -> Self {
        match core.find_contact(name) {
            Some(contact) => User::Contact {
                name: contact.name.clone(),
                contact_groups: contact.groups.iter().cloned().collect(),
                authorization,
            },
            None => User::Unknown(name.to_string()),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            User::NoAuth => None,
            User::Unknown(name) | User::Contact { name, .. } => Some(name.as_str()),
        }
    }

    pub fn is_authorized_for_host(&self, host: &Host) -> bool {
        match self {
            User::NoAuth => true,
            User::Unknown(_) => false,
            User::Contact { name, .. } => host.all_contacts.contains(name),
        }
    }

    pub fn is_authorized_for_service(&self, service: &Service) -> bool {
        match self {
            User::NoAuth => true,
            User::Unknown(_) => false,
            User::Contact {
                name, authorization, ..
            } => {
                service.all_contacts.contains(name)
                    || (authorization.service == ServiceAuthorization::Loose
                        && service.host.all_contacts.contains(name))
            }
        }
    }

    pub fn is_authorized_for_host_group(&self, group: &HostGroup) -> bool {
        self.is_authorized_for_group(group.hosts.iter().map(|h| self.is_authorized_for_host(h)))
    }

    pub fn is_authorized_for_service_group(&self, group: &ServiceGroup) -> bool {
        self.is_authorized_for_group(
            group
                .services
                .iter()
                .map(|s| self.is_authorized_for_service(s)),
        )
    }

    fn is_authorized_for_group(&self, mut members: impl Iterator<Item = bool>) -> bool {
        match self {
            User::NoAuth => true,
            User::Unknown(_) => false,
            User::Contact { authorization, .. } => match authorization.group {
                GroupAuthorization::Strict => members.all(|visible| visible),
                GroupAuthorization::Loose => members.any(|visible| visible),
            },
        }
    }

    /// Rule for rows that hang off a host or service (downtimes, comments, log).
    ///
    /// Rows without any object are visible only if `authorized_if_no_host`.
    pub fn is_authorized_for_object(
        &self,
        host: Option<&Host>,
        service: Option<&Service>,
        authorized_if_no_host: bool,
    ) -> bool {
        if *self == User::NoAuth {
            return true;
        }
        match (host, service) {
            (_, Some(service)) => self.is_authorized_for_service(service),
            (Some(host), None) => self.is_authorized_for_host(host),
            (None, None) => authorized_if_no_host,
        }
    }

    /// Contact group membership check, used for event console rows.
    pub fn is_member_of_any(&self, groups: &[String]) -> bool {
        match self {
            User::NoAuth => true,
            User::Unknown(_) => false,
            User::Contact { contact_groups, .. } => {
                groups.iter().any(|g| contact_groups.contains(g))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InMemoryCore, ObjectDefinitions};

    fn setup() -> InMemoryCore {
        InMemoryCore::new(ObjectDefinitions::typical_site())
    }

    #[test]
    fn test_host_visibility() {
        let core = setup();
        let alice = User::resolve(&core, "alice", Authorization::default());
        let carol = User::resolve(&core, "carol", Authorization::default());
        let myhost = core.find_host("myhost").unwrap();
        let router = core.find_host("router").unwrap();

        assert!(alice.is_authorized_for_host(&myhost));
        assert!(!alice.is_authorized_for_host(&router));
        // Via contact group "network".
        assert!(carol.is_authorized_for_host(&router));
        assert!(User::NoAuth.is_authorized_for_host(&router));
        assert!(!User::Unknown("mallory".into()).is_authorized_for_host(&router));
    }

    #[test]
    fn test_service_loose_vs_strict() {
        let core = setup();
        let memory = core.find_service("myhost", "Memory").unwrap();
        let loose = User::resolve(&core, "alice", Authorization::default());
        let strict = User::resolve(
            &core,
            "alice",
            Authorization {
                service: ServiceAuthorization::Strict,
                ..Default::default()
            },
        );
        // Memory has no own contacts; alice is a contact of the host.
        assert!(loose.is_authorized_for_service(&memory));
        assert!(!strict.is_authorized_for_service(&memory));

        let cpu = core.find_service("myhost", "CPU load").unwrap();
        assert!(strict.is_authorized_for_service(&cpu));
    }

    #[test]
    fn test_group_strict_vs_loose() {
        let core = setup();
        let group = core.find_host_group("linux-servers").unwrap();
        let strict = User::resolve(&core, "alice", Authorization::default());
        let loose = User::resolve(
            &core,
            "alice",
            Authorization {
                group: GroupAuthorization::Loose,
                ..Default::default()
            },
        );
        // alice sees myhost but not otherhost.
        assert!(!strict.is_authorized_for_host_group(&group));
        assert!(loose.is_authorized_for_host_group(&group));
    }

    #[test]
    fn test_object_rule() {
        let core = setup();
        let bob = User::resolve(&core, "bob", Authorization::default());
        let otherhost = core.find_host("otherhost").unwrap();
        assert!(bob.is_authorized_for_object(Some(&otherhost), None, false));
        assert!(!bob.is_authorized_for_object(None, None, false));
        assert!(bob.is_authorized_for_object(None, None, true));
        assert!(User::NoAuth.is_authorized_for_object(None, None, false));
    }

    #[test]
    fn test_unknown_contact() {
        let core = setup();
        assert_eq!(
            User::resolve(&core, "nobody", Authorization::default()),
            User::Unknown("nobody".into())
        );
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("strict".parse::<ServiceAuthorization>(), Ok(ServiceAuthorization::Strict));
        assert!("sloppy".parse::<GroupAuthorization>().is_err());
    }
}
