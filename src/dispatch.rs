//! Maps decoded control messages to [`NodeRegistry`] calls, and
//! [`OutboundCommand`]s back to the control messages that carry them.
use crate::eetf_ext::TryFromTerm;
use crate::message::{DemonitorP, Message, MonitorP, MonitorPExit, RegSend, Send as SendMsg};
use crate::registry::NodeRegistry;
use crate::session::OutboundCommand;
use crate::term::PidOrAtom;
use eetf::Atom;

/// Dispatches one decoded inbound control message to `registry`.
///
/// `Tick` never reaches here: the connection handles the keepalive frame
/// directly. A `to_proc` term that decodes as neither a pid nor an atom is
/// logged and dropped rather than treated as fatal, since it cannot be
/// addressed back to anything in the registry.
pub fn dispatch_inbound(registry: &dyn NodeRegistry, message: Message) {
    match message {
        Message::Send(SendMsg {
            from_pid,
            to_pid,
            message,
        }) => {
            registry.send(PidOrAtom::Pid(from_pid), PidOrAtom::Pid(to_pid), message);
        }
        Message::RegSend(RegSend {
            from_pid,
            to_name,
            message,
        }) => {
            registry.send(PidOrAtom::Pid(from_pid), PidOrAtom::Atom(to_name), message);
        }
        Message::MonitorP(MonitorP {
            from_pid,
            to_proc,
            reference,
        }) => match PidOrAtom::try_from_term(to_proc) {
            Ok(target) => registry.monitor_process(from_pid, target, reference),
            Err(_) => log::warn!("dropping MonitorP: target is neither a pid nor an atom"),
        },
        Message::DemonitorP(DemonitorP {
            from_pid,
            to_proc,
            reference,
        }) => match PidOrAtom::try_from_term(to_proc) {
            Ok(target) => registry.demonitor_process(from_pid, target, reference),
            Err(_) => log::warn!("dropping DemonitorP: target is neither a pid nor an atom"),
        },
        Message::MonitorPExit(MonitorPExit {
            from_pid,
            to_proc,
            reference,
            reason,
        }) => match PidOrAtom::try_from_term(to_proc) {
            Ok(target) => {
                registry.deliver_exit(PidOrAtom::Pid(from_pid), target, reference, reason)
            }
            Err(_) => log::warn!("dropping MonitorPExit: target is neither a pid nor an atom"),
        },
        Message::Tick => {}
    }
}

/// Encodes a registry-issued [`OutboundCommand`] as the [`Message`] to write
/// to the wire.
pub fn encode_outbound(command: OutboundCommand) -> Message {
    match command {
        OutboundCommand::Send { to, message } => {
            // This node never has a pid of its own to report as the
            // sender; the wire position is filled by an unused placeholder
            // regardless, as for every frame this crate originates.
            let from_pid = eetf::Pid {
                node: Atom::from(""),
                id: 0,
                serial: 0,
                creation: 0,
            };
            Message::send(from_pid, to, message)
        }
        OutboundCommand::MonitorPExit {
            from,
            to,
            reference,
            reason,
        } => Message::MonitorPExit(MonitorPExit {
            from_pid: match from {
                PidOrAtom::Pid(pid) => pid,
                PidOrAtom::Atom(_) => {
                    log::warn!("MonitorPExit.from was an atom, not a pid; wire format requires a pid");
                    eetf::Pid {
                        node: Atom::from(""),
                        id: 0,
                        serial: 0,
                        creation: 0,
                    }
                }
            },
            to_proc: to.into(),
            reference,
            reason,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fake::{FakeRegistry, RecordedCall};
    use eetf::{Pid, Reference, Term};

    fn pid(id: u32) -> Pid {
        Pid {
            node: Atom::from("a@b"),
            id,
            serial: 0,
            creation: 1,
        }
    }

    #[test]
    fn dispatches_send_with_the_decoded_sender_pid() {
        let registry = FakeRegistry::new();
        let message = Message::send(pid(1), pid(2), Term::from(Atom::from("hi")));
        dispatch_inbound(&registry, message);

        let calls = registry.calls();
        assert_eq!(
            calls,
            vec![RecordedCall::Send {
                sender: PidOrAtom::Pid(pid(1)),
                receiver: PidOrAtom::Pid(pid(2)),
                message: Term::from(Atom::from("hi")),
            }]
        );
    }

    #[test]
    fn dispatches_reg_send_with_pid_sender_and_atom_receiver() {
        let registry = FakeRegistry::new();
        let message = Message::reg_send(pid(1), Atom::from("my_server"), Term::from(Atom::from("ping")));
        dispatch_inbound(&registry, message);

        let calls = registry.calls();
        assert_eq!(
            calls,
            vec![RecordedCall::Send {
                sender: PidOrAtom::Pid(pid(1)),
                receiver: PidOrAtom::Atom(Atom::from("my_server")),
                message: Term::from(Atom::from("ping")),
            }]
        );
    }

    #[test]
    fn dropping_tick_dispatches_nothing() {
        let registry = FakeRegistry::new();
        dispatch_inbound(&registry, Message::Tick);
        assert!(registry.calls().is_empty());
    }

    #[test]
    fn encodes_outbound_monitor_exit() {
        let command = OutboundCommand::MonitorPExit {
            from: PidOrAtom::Pid(pid(1)),
            to: PidOrAtom::Pid(pid(2)),
            reference: Reference {
                id: vec![1, 2, 3],
                node: Atom::from("a@b"),
                creation: 1,
            },
            reason: Term::from(Atom::from("normal")),
        };
        let message = encode_outbound(command);
        assert!(matches!(message, Message::MonitorPExit(_)));
    }
}
