//! Control messages exchanged over a connected (post-handshake) connection.
//!
//! Reference: [12.3 Protocol between Connected Nodes]
//! (http://erlang.org/doc/apps/erts/erl_dist_protocol.html#id105440).
//!
//! Distribution headers (atom caching) are not supported; every control
//! message and its optional payload is encoded as plain external term
//! format, one term at a time.
use crate::io::{ReadTermExt, TupleExt, WriteTermExt};
use eetf::{Atom, DecodeError, EncodeError, FixInteger, Pid, Reference, Term, Tuple};
use std::io::{Read, Write};

pub use crate::channel::{channel, Receiver, Sender};

trait DistributionMessage: Sized {
    const OP: i32;
    fn write_into<W: Write>(self, writer: &mut W) -> Result<(), EncodeError>;
    fn read_from<R: Read>(reader: &mut R, ctrl_msg: Tuple) -> Result<Self, DecodeError>;
}

/// `{2, FromPid, Unused, ToPid}` followed by the message term: asynchronous
/// send to a pid.
#[derive(Debug, Clone, PartialEq)]
pub struct Send {
    pub from_pid: Pid,
    pub to_pid: Pid,
    pub message: Term,
}

impl DistributionMessage for Send {
    const OP: i32 = 2;

    fn write_into<W: Write>(self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_tagged_tuple4(Self::OP, self.from_pid, Tuple::nil(), self.to_pid)?;
        writer.write_term(self.message)?;
        Ok(())
    }

    fn read_from<R: Read>(reader: &mut R, mut ctrl_msg: Tuple) -> Result<Self, DecodeError> {
        ctrl_msg.check_len(4)?;
        let from_pid = ctrl_msg.take_as::<Pid>(1, "pid")?;
        let to_pid = ctrl_msg.take_as::<Pid>(3, "pid")?;
        let message = reader.read_term()?;
        Ok(Self {
            from_pid,
            to_pid,
            message,
        })
    }
}

/// `{6, FromPid, Unused, ToName}` followed by the message term: send to a
/// registered name.
#[derive(Debug, Clone, PartialEq)]
pub struct RegSend {
    pub from_pid: Pid,
    pub to_name: Atom,
    pub message: Term,
}

impl DistributionMessage for RegSend {
    const OP: i32 = 6;

    fn write_into<W: Write>(self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_tagged_tuple4(Self::OP, self.from_pid, Tuple::nil(), self.to_name)?;
        writer.write_term(self.message)?;
        Ok(())
    }

    fn read_from<R: Read>(reader: &mut R, mut ctrl_msg: Tuple) -> Result<Self, DecodeError> {
        ctrl_msg.check_len(4)?;
        let from_pid = ctrl_msg.take_as::<Pid>(1, "pid")?;
        let to_name = ctrl_msg.take_as::<Atom>(3, "atom")?;
        let message = reader.read_term()?;
        Ok(Self {
            from_pid,
            to_name,
            message,
        })
    }
}

/// `{19, FromPid, ToProc, Reference}`: monitor a pid or a registered name.
///
/// `to_proc` is a `Pid` or an `Atom` depending on whether the target was a
/// pid or a registered name; this crate does not attempt to tell them apart
/// beyond that (see [`crate::eetf_ext::PidOrAtom`] for a helper if the
/// caller needs to).
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorP {
    pub from_pid: Pid,
    pub to_proc: Term,
    pub reference: Reference,
}

impl DistributionMessage for MonitorP {
    const OP: i32 = 19;

    fn write_into<W: Write>(self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_tagged_tuple4(Self::OP, self.from_pid, self.to_proc, self.reference)?;
        Ok(())
    }

    fn read_from<R: Read>(_reader: &mut R, mut ctrl_msg: Tuple) -> Result<Self, DecodeError> {
        ctrl_msg.check_len(4)?;
        let from_pid = ctrl_msg.take_as::<Pid>(1, "pid")?;
        let to_proc = ctrl_msg.take(2);
        let reference = ctrl_msg.take_as::<Reference>(3, "ref")?;
        Ok(Self {
            from_pid,
            to_proc,
            reference,
        })
    }
}

/// `{20, FromPid, ToProc, Reference}`: cancel a previously-established
/// monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct DemonitorP {
    pub from_pid: Pid,
    pub to_proc: Term,
    pub reference: Reference,
}

impl DistributionMessage for DemonitorP {
    const OP: i32 = 20;

    fn write_into<W: Write>(self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_tagged_tuple4(Self::OP, self.from_pid, self.to_proc, self.reference)?;
        Ok(())
    }

    fn read_from<R: Read>(_reader: &mut R, mut ctrl_msg: Tuple) -> Result<Self, DecodeError> {
        ctrl_msg.check_len(4)?;
        let from_pid = ctrl_msg.take_as::<Pid>(1, "pid")?;
        let to_proc = ctrl_msg.take(2);
        let reference = ctrl_msg.take_as::<Reference>(3, "ref")?;
        Ok(Self {
            from_pid,
            to_proc,
            reference,
        })
    }
}

/// `{21, FromPid, ToProc, Reference, Reason}`: delivered when a monitored
/// process exits.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorPExit {
    pub from_pid: Pid,
    pub to_proc: Term,
    pub reference: Reference,
    pub reason: Term,
}

impl DistributionMessage for MonitorPExit {
    const OP: i32 = 21;

    fn write_into<W: Write>(self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_tagged_tuple5(
            Self::OP,
            self.from_pid,
            self.to_proc,
            self.reference,
            self.reason,
        )?;
        Ok(())
    }

    fn read_from<R: Read>(_reader: &mut R, mut ctrl_msg: Tuple) -> Result<Self, DecodeError> {
        ctrl_msg.check_len(5)?;
        let from_pid = ctrl_msg.take_as::<Pid>(1, "pid")?;
        let to_proc = ctrl_msg.take(2);
        let reference = ctrl_msg.take_as::<Reference>(3, "ref")?;
        let reason = ctrl_msg.take(4);
        Ok(Self {
            from_pid,
            to_proc,
            reference,
            reason,
        })
    }
}

/// A control message read from, or to be written to, a connected node.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Send(Send),
    RegSend(RegSend),
    MonitorP(MonitorP),
    DemonitorP(DemonitorP),
    MonitorPExit(MonitorPExit),

    /// Not an on-the-wire control message: the empty-length keepalive frame
    /// ("network tick") that keeps an idle connection from timing out.
    Tick,
}

impl Message {
    pub fn send(from_pid: Pid, to_pid: Pid, message: Term) -> Self {
        Self::Send(Send {
            from_pid,
            to_pid,
            message,
        })
    }

    pub fn reg_send(from_pid: Pid, to_name: Atom, message: Term) -> Self {
        Self::RegSend(RegSend {
            from_pid,
            to_name,
            message,
        })
    }

    pub fn write_into<W: Write>(self, writer: &mut W) -> Result<(), crate::channel::SendError> {
        match self {
            Self::Send(x) => x.write_into(writer)?,
            Self::RegSend(x) => x.write_into(writer)?,
            Self::MonitorP(x) => x.write_into(writer)?,
            Self::DemonitorP(x) => x.write_into(writer)?,
            Self::MonitorPExit(x) => x.write_into(writer)?,
            Self::Tick => {}
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, crate::channel::RecvError> {
        let mut ctrl_msg = reader.read_tuple()?;
        if ctrl_msg.elements.is_empty() {
            return Err(DecodeError::UnexpectedType {
                value: ctrl_msg.into(),
                expected: "non empty tuple".to_owned(),
            }
            .into());
        }
        let op = ctrl_msg.take_as::<FixInteger>(0, "integer")?;
        let msg = match op.value {
            Send::OP => Send::read_from(reader, ctrl_msg).map(Self::Send)?,
            RegSend::OP => RegSend::read_from(reader, ctrl_msg).map(Self::RegSend)?,
            MonitorP::OP => MonitorP::read_from(reader, ctrl_msg).map(Self::MonitorP)?,
            DemonitorP::OP => DemonitorP::read_from(reader, ctrl_msg).map(Self::DemonitorP)?,
            MonitorPExit::OP => {
                MonitorPExit::read_from(reader, ctrl_msg).map(Self::MonitorPExit)?
            }
            op => return Err(crate::channel::RecvError::UnsupportedOp { op }),
        };
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eetf::Atom;

    fn pid(id: u32) -> Pid {
        Pid {
            node: Atom::from("a@b"),
            id,
            serial: 0,
            creation: 1,
        }
    }

    #[test]
    fn send_round_trips_through_the_wire_format() {
        let original = Message::send(pid(1), pid(2), Term::from(Atom::from("hello")));
        let mut buf = Vec::new();
        original.clone().write_into(&mut buf).unwrap();

        let decoded = Message::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn reg_send_round_trips_through_the_wire_format() {
        let original = Message::reg_send(
            pid(1),
            Atom::from("my_server"),
            Term::from(Atom::from("ping")),
        );
        let mut buf = Vec::new();
        original.clone().write_into(&mut buf).unwrap();

        let decoded = Message::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn unsupported_op_is_reported_distinctly() {
        let mut ctrl_msg = Tuple {
            elements: vec![Term::from(FixInteger { value: 999 })],
        };
        let mut buf = Vec::new();
        Term::from(std::mem::replace(&mut ctrl_msg, Tuple { elements: vec![] }))
            .encode(&mut buf)
            .unwrap();

        let err = Message::read_from(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            crate::channel::RecvError::UnsupportedOp { op: 999 }
        ));
    }
}
