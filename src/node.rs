//! Node identity and the local node's configuration.
use crate::flags::DistributionFlags;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum NodeNameError {
    #[error("node name length must be less than 256, but got {size} characters")]
    TooLongName { size: usize },

    #[error("node name must contain an '@' character")]
    MissingAtmark,
}

/// A `name@host` node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeName {
    name: String,
    host: String,
}

impl NodeName {
    pub fn new(name: &str, host: &str) -> Result<Self, NodeNameError> {
        let size = name.len() + 1 + host.len();
        if size > 255 {
            Err(NodeNameError::TooLongName { size })
        } else {
            Ok(Self {
                name: name.to_owned(),
                host: host.to_owned(),
            })
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl std::str::FromStr for NodeName {
    type Err = NodeNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.splitn(2, '@');
        if let (Some(name), Some(host)) = (tokens.next(), tokens.next()) {
            Self::new(name, host)
        } else {
            Err(NodeNameError::MissingAtmark)
        }
    }
}

impl std::fmt::Display for NodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.host)
    }
}

/// Type of a distributed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum NodeType {
    /// Hidden node (C-node).
    Hidden = 72,

    /// Normal node, published and visible to every other node in the cluster.
    Normal = 77,
}

impl TryFrom<u8> for NodeType {
    type Error = crate::epmd::EpmdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            72 => Ok(Self::Hidden),
            77 => Ok(Self::Normal),
            _ => Err(crate::epmd::EpmdError::UnknownNodeType { value }),
        }
    }
}

/// The network transport a node accepts distribution connections over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TransportProtocol {
    /// Plain TCP over IPv4.
    TcpIpV4 = 0,
}

impl TryFrom<u8> for TransportProtocol {
    type Error = crate::epmd::EpmdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::TcpIpV4),
            _ => Err(crate::epmd::EpmdError::UnknownProtocol { value }),
        }
    }
}

/// A distribution protocol version number as negotiated during the handshake
/// (see [`crate::handshake::LOWEST_DISTRIBUTION_VERSION`] /
/// [`crate::handshake::HIGHEST_DISTRIBUTION_VERSION`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DistributionProtocolVersion {
    V5 = 5,
    V6 = 6,
    V7 = 7,
}

impl TryFrom<u16> for DistributionProtocolVersion {
    type Error = crate::epmd::EpmdError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(Self::V5),
            6 => Ok(Self::V6),
            7 => Ok(Self::V7),
            _ => Err(crate::epmd::EpmdError::UnknownVersion { value }),
        }
    }
}

/// The generation number of a distributed node.
///
/// If a node restarts under the same name, peers use this to tell the new
/// incarnation apart from the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Creation(u32);

impl Creation {
    /// Wraps a raw creation value as reported by (or sent to) EPMD.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Picks a fresh creation value at random, for nodes that do not
    /// register with EPMD and so never get one assigned.
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// Returns the raw creation value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

/// The local node's identity and the options it hands, read-only, to every
/// [`crate::connection::Connection`] it accepts.
///
/// The cookie is deliberately not a field here: it authenticates the
/// handshake and is passed directly to the handshake types instead of being
/// cloned around with the rest of the node's public identity.
#[derive(Debug, Clone)]
pub struct LocalNode {
    /// This node's own `name@host`.
    pub name: NodeName,

    /// This node's creation, as assigned by EPMD (or generated locally).
    pub creation: Creation,

    /// The distribution capability flags this node advertises.
    pub flags: DistributionFlags,

    /// How often a `Connected`-stage connection expects to see traffic
    /// before considering the peer unresponsive.
    ///
    /// A connection is closed after two consecutive intervals with no frame
    /// received at all (including keepalive ticks).
    pub network_tick_interval: Duration,
}

impl LocalNode {
    /// Creates a new [`LocalNode`] with the default flags and a 60-second
    /// tick interval.
    pub fn new(name: NodeName, creation: Creation) -> Self {
        Self {
            name,
            creation,
            flags: DistributionFlags::default(),
            network_tick_interval: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_name_round_trips_through_display_and_parse() {
        let n: NodeName = "foo@host.example".parse().unwrap();
        assert_eq!(n.name(), "foo");
        assert_eq!(n.host(), "host.example");
        assert_eq!(n.to_string(), "foo@host.example");
    }

    #[test]
    fn node_name_requires_atmark() {
        assert!(matches!(
            "no-atmark".parse::<NodeName>(),
            Err(NodeNameError::MissingAtmark)
        ));
    }

    #[test]
    fn node_name_rejects_oversized_names() {
        let name = "a".repeat(300);
        assert!(matches!(
            NodeName::new(&name, "h"),
            Err(NodeNameError::TooLongName { .. })
        ));
    }

    #[test]
    fn local_node_defaults_include_mandatory_flags() {
        let local = LocalNode::new("a@b".parse().unwrap(), Creation::new(1));
        assert!(local
            .flags
            .contains(DistributionFlags::EXTENDED_REFERENCES));
        assert_eq!(local.network_tick_interval, Duration::from_secs(60));
    }
}
