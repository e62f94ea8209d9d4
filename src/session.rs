//! The facade a [`crate::registry::NodeRegistry`] uses to address a
//! connected peer without reaching into its socket.
use crate::node::NodeName;
use crate::term::PidOrAtom;
use eetf::{Pid, Reference, Term};
use futures::channel::{mpsc, oneshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Something the registry wants a connection to encode and send to its peer.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum OutboundCommand {
    /// Encodes as a `Send` control message (op 2).
    Send { to: Pid, message: Term },
    /// Encodes as a `MonitorPExit` control message (op 21).
    MonitorPExit {
        from: PidOrAtom,
        to: PidOrAtom,
        reference: Reference,
        reason: Term,
    },
}

/// A handle the registry holds for one connected peer.
///
/// Cloning shares the same underlying connection: every clone enqueues onto
/// the same outbound queue and closes the same connection.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    peer_name: NodeName,
    outbound: mpsc::Sender<OutboundCommand>,
    close_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    closed: Arc<AtomicBool>,
}

impl PeerHandle {
    pub(crate) fn new(
        peer_name: NodeName,
        outbound: mpsc::Sender<OutboundCommand>,
        close_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            peer_name,
            outbound,
            close_tx: Arc::new(Mutex::new(Some(close_tx))),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The peer's resolved node name.
    pub fn peer_name(&self) -> &NodeName {
        &self.peer_name
    }

    /// Enqueues `command` for the connection to send, without blocking.
    ///
    /// Fails if the outbound queue is full or the connection already closed;
    /// in either case the command is returned to the caller.
    pub fn try_enqueue(&self, command: OutboundCommand) -> Result<(), OutboundCommand> {
        self.outbound
            .clone()
            .try_send(command)
            .map_err(|e| e.into_inner())
    }

    /// Signals the connection's run loop to close. Idempotent: only the
    /// first call has any effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = self.close_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_is_idempotent() {
        let (tx, _rx) = mpsc::channel(1);
        let (close_tx, mut close_rx) = oneshot::channel();
        let handle = PeerHandle::new("a@b".parse().unwrap(), tx, close_tx);

        handle.close();
        handle.close();

        assert_eq!(close_rx.try_recv().unwrap(), Some(()));
    }

    #[test]
    fn try_enqueue_fails_once_the_queue_is_full() {
        let (tx, _rx) = mpsc::channel(0);
        let (close_tx, _close_rx) = oneshot::channel();
        let handle = PeerHandle::new("a@b".parse().unwrap(), tx, close_tx);

        let command = OutboundCommand::Send {
            to: Pid {
                node: eetf::Atom::from("a@b"),
                id: 1,
                serial: 0,
                creation: 1,
            },
            message: Term::from(eetf::Atom::from("hi")),
        };
        assert!(handle.try_enqueue(command).is_err());
    }
}
