//! Incoming node-to-node distribution protocol for a clustered actor runtime.
//!
//! This crate implements the server side of the protocol spoken between
//! nodes of a distributed cluster: the authentication handshake, the
//! external term wire format, and dispatch of the resulting control
//! messages (send, register-send, monitor, demonitor, monitor-exit) to an
//! application-supplied [`registry::NodeRegistry`].
//!
//! # Examples
//!
//! - Server side: `demos/recv_msg.rs`
//! - Client side: `demos/send_msg.rs`
#![warn(missing_docs)]

pub use node::{Creation, DistributionProtocolVersion, LocalNode, NodeName, TransportProtocol};

pub mod channel;
pub mod connection;
pub mod digest;
pub mod dispatch;
pub mod eetf_ext;
pub mod epmd;
pub mod flags;
pub mod framer;
pub mod handshake;
pub mod io;
pub mod message;
pub mod node;
pub mod registry;
pub mod session;
pub mod socket;
pub mod term;

pub use flags::DistributionFlags;
