//! The interface a [`crate::connection::Connection`] uses to deliver decoded
//! control messages to, and be addressed back through, the local actor
//! registry.
//!
//! The registry's own mailbox and locking discipline live entirely outside
//! this crate; this trait only pins down the calls a connection makes into
//! it and the handle it hands back.
use crate::node::NodeName;
use crate::session::PeerHandle;
use crate::term::PidOrAtom;
use eetf::{Pid, Reference, Term};

/// A local actor registry, as seen from a connected peer.
///
/// Every method is synchronous: implementations must not block on I/O, since
/// they are called from inside a connection's single-threaded run loop.
pub trait NodeRegistry: Send + Sync {
    /// A peer finished its handshake and reached the `Connected` stage.
    fn node_connected(&self, peer: &NodeName, session: PeerHandle);

    /// A previously connected peer's connection closed, for any reason.
    ///
    /// Called at most once per [`Self::node_connected`] call for the same
    /// peer.
    fn node_disconnected(&self, peer: &NodeName);

    /// A `Send` or `RegSend` control message arrived; `sender` is the atom
    /// `""` for a `Send` (the wire format carries no sender pid for it).
    fn send(&self, sender: PidOrAtom, receiver: PidOrAtom, message: Term);

    /// A `MonitorP` control message arrived: `origin` wants to monitor
    /// `target`, identified by `reference`.
    fn monitor_process(&self, origin: Pid, target: PidOrAtom, reference: Reference);

    /// A `DemonitorP` control message arrived, cancelling a previously
    /// established monitor.
    fn demonitor_process(&self, origin: Pid, target: PidOrAtom, reference: Reference);

    /// A `MonitorPExit` control message arrived: the monitored `from`
    /// process exited with `reason`.
    fn deliver_exit(&self, from: PidOrAtom, to: PidOrAtom, reference: Reference, reason: Term);
}

/// A [`NodeRegistry`] test double that records every call instead of acting
/// on it.
pub mod fake {
    use super::NodeRegistry;
    use crate::node::NodeName;
    use crate::session::PeerHandle;
    use crate::term::PidOrAtom;
    use eetf::{Pid, Reference, Term};
    use std::sync::Mutex;

    /// One recorded call to a [`FakeRegistry`].
    #[derive(Debug, Clone, PartialEq)]
    #[allow(missing_docs)]
    pub enum RecordedCall {
        NodeConnected { peer: NodeName },
        NodeDisconnected { peer: NodeName },
        Send {
            sender: PidOrAtom,
            receiver: PidOrAtom,
            message: Term,
        },
        MonitorProcess {
            origin: Pid,
            target: PidOrAtom,
            reference: Reference,
        },
        DemonitorProcess {
            origin: Pid,
            target: PidOrAtom,
            reference: Reference,
        },
        DeliverExit {
            from: PidOrAtom,
            to: PidOrAtom,
            reference: Reference,
            reason: Term,
        },
    }

    /// Records every [`NodeRegistry`] call it receives, in order, behind a
    /// mutex, along with the [`PeerHandle`] of the most recently connected
    /// peer (so a test can drive outbound traffic back through it).
    #[derive(Debug, Default)]
    pub struct FakeRegistry {
        calls: Mutex<Vec<RecordedCall>>,
        last_session: Mutex<Option<PeerHandle>>,
    }

    impl FakeRegistry {
        /// Creates an empty recorder.
        pub fn new() -> Self {
            Self::default()
        }

        /// Returns a copy of every call recorded so far, in order.
        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Returns the [`PeerHandle`] passed to the most recent
        /// [`NodeRegistry::node_connected`] call, if any.
        pub fn last_session(&self) -> Option<PeerHandle> {
            self.last_session.lock().unwrap().clone()
        }
    }

    impl NodeRegistry for FakeRegistry {
        fn node_connected(&self, peer: &NodeName, session: PeerHandle) {
            *self.last_session.lock().unwrap() = Some(session);
            self.calls.lock().unwrap().push(RecordedCall::NodeConnected {
                peer: peer.clone(),
            });
        }

        fn node_disconnected(&self, peer: &NodeName) {
            self.calls
                .lock()
                .unwrap()
                .push(RecordedCall::NodeDisconnected { peer: peer.clone() });
        }

        fn send(&self, sender: PidOrAtom, receiver: PidOrAtom, message: Term) {
            self.calls.lock().unwrap().push(RecordedCall::Send {
                sender,
                receiver,
                message,
            });
        }

        fn monitor_process(&self, origin: Pid, target: PidOrAtom, reference: Reference) {
            self.calls
                .lock()
                .unwrap()
                .push(RecordedCall::MonitorProcess {
                    origin,
                    target,
                    reference,
                });
        }

        fn demonitor_process(&self, origin: Pid, target: PidOrAtom, reference: Reference) {
            self.calls
                .lock()
                .unwrap()
                .push(RecordedCall::DemonitorProcess {
                    origin,
                    target,
                    reference,
                });
        }

        fn deliver_exit(&self, from: PidOrAtom, to: PidOrAtom, reference: Reference, reason: Term) {
            self.calls.lock().unwrap().push(RecordedCall::DeliverExit {
                from,
                to,
                reference,
                reason,
            });
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn records_calls_in_order() {
            let registry = FakeRegistry::new();
            let peer: NodeName = "a@b".parse().unwrap();
            registry.node_disconnected(&peer);
            registry.node_disconnected(&peer);

            let calls = registry.calls();
            assert_eq!(calls.len(), 2);
            assert_eq!(
                calls[0],
                RecordedCall::NodeDisconnected { peer: peer.clone() }
            );
        }
    }
}
