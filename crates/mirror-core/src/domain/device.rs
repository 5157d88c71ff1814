//! Device identities and the fixed master/slave set of a session.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque identifier understood by the device bridge (serial or `host:port`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceEndpoint(String);

impl DeviceEndpoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceEndpoint {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceEndpoint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Role of a device within the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    /// The device the operator drives; coordinates are never rescaled for it.
    Master,
    /// A device that replays the master's input.
    Slave,
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRole::Master => f.write_str("master"),
            DeviceRole::Slave => f.write_str("slave"),
        }
    }
}

/// Errors raised while building a [`DeviceSet`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceSetError {
    #[error("device identifiers must not be empty")]
    EmptyIdentifier,

    #[error("device {0} is configured as both master and slave")]
    MasterListedAsSlave(DeviceEndpoint),

    #[error("slave {0} is listed more than once")]
    DuplicateSlave(DeviceEndpoint),
}

/// A device together with its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<'a> {
    pub role: DeviceRole,
    pub endpoint: &'a DeviceEndpoint,
}

/// Exactly one master plus zero or more distinct slaves, fixed for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSet {
    master: DeviceEndpoint,
    slaves: Vec<DeviceEndpoint>,
}

impl DeviceSet {
    /// Validates and builds the set.
    ///
    /// # Errors
    ///
    /// - [`DeviceSetError::EmptyIdentifier`] for a blank identifier.
    /// - [`DeviceSetError::MasterListedAsSlave`] if the master also appears as a slave.
    /// - [`DeviceSetError::DuplicateSlave`] if a slave appears twice.
    pub fn new(master: DeviceEndpoint, slaves: Vec<DeviceEndpoint>) -> Result<Self, DeviceSetError> {
        if master.as_str().trim().is_empty() {
            return Err(DeviceSetError::EmptyIdentifier);
        }
        let mut seen = HashSet::with_capacity(slaves.len());
        for slave in &slaves {
            if slave.as_str().trim().is_empty() {
                return Err(DeviceSetError::EmptyIdentifier);
            }
            if *slave == master {
                return Err(DeviceSetError::MasterListedAsSlave(slave.clone()));
            }
            if !seen.insert(slave) {
                return Err(DeviceSetError::DuplicateSlave(slave.clone()));
            }
        }
        Ok(Self { master, slaves })
    }

    pub fn master(&self) -> &DeviceEndpoint {
        &self.master
    }

    pub fn slaves(&self) -> &[DeviceEndpoint] {
        &self.slaves
    }

    /// Number of devices including the master.
    pub fn len(&self) -> usize {
        1 + self.slaves.len()
    }

    /// Always `false`: a set has a master.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates master first, then slaves in configured order.
    pub fn iter(&self) -> impl Iterator<Item = Target<'_>> {
        std::iter::once(Target { role: DeviceRole::Master, endpoint: &self.master }).chain(
            self.slaves.iter().map(|endpoint| Target { role: DeviceRole::Slave, endpoint }),
        )
    }

    /// All endpoints, master first.
    pub fn endpoints(&self) -> Vec<DeviceEndpoint> {
        self.iter().map(|t| t.endpoint.clone()).collect()
    }

    pub fn role_of(&self, endpoint: &DeviceEndpoint) -> Option<DeviceRole> {
        if *endpoint == self.master {
            Some(DeviceRole::Master)
        } else if self.slaves.contains(endpoint) {
            Some(DeviceRole::Slave)
        } else {
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(s: &str) -> DeviceEndpoint {
        DeviceEndpoint::new(s)
    }

    #[test]
    fn test_iter_yields_master_first_then_slaves_in_order() {
        let set = DeviceSet::new(ep("m"), vec![ep("b"), ep("a")]).unwrap();
        let order: Vec<_> = set.iter().map(|t| (t.role, t.endpoint.as_str())).collect();
        assert_eq!(
            order,
            [(DeviceRole::Master, "m"), (DeviceRole::Slave, "b"), (DeviceRole::Slave, "a")]
        );
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_master_only_set_is_valid() {
        let set = DeviceSet::new(ep("192.168.1.10:5555"), vec![]).unwrap();
        assert!(set.slaves().is_empty());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_master_listed_as_slave_is_rejected() {
        let err = DeviceSet::new(ep("m"), vec![ep("s1"), ep("m")]).unwrap_err();
        assert_eq!(err, DeviceSetError::MasterListedAsSlave(ep("m")));
    }

    #[test]
    fn test_duplicate_slave_is_rejected() {
        let err = DeviceSet::new(ep("m"), vec![ep("s1"), ep("s1")]).unwrap_err();
        assert_eq!(err, DeviceSetError::DuplicateSlave(ep("s1")));
    }

    #[test]
    fn test_blank_identifier_is_rejected() {
        assert_eq!(DeviceSet::new(ep(" "), vec![]).unwrap_err(), DeviceSetError::EmptyIdentifier);
        assert_eq!(
            DeviceSet::new(ep("m"), vec![ep("")]).unwrap_err(),
            DeviceSetError::EmptyIdentifier
        );
    }

    #[test]
    fn test_role_of_distinguishes_master_slave_and_unknown() {
        let set = DeviceSet::new(ep("m"), vec![ep("s")]).unwrap();
        assert_eq!(set.role_of(&ep("m")), Some(DeviceRole::Master));
        assert_eq!(set.role_of(&ep("s")), Some(DeviceRole::Slave));
        assert_eq!(set.role_of(&ep("x")), None);
    }

    #[test]
    fn test_endpoint_displays_as_plain_string() {
        let e: DeviceEndpoint = "abc".into();
        assert_eq!(e.to_string(), "abc");
    }
}
