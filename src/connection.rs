//! The per-peer connection state machine: handshake through to the
//! `Connected` stage, and the I/O loop that keeps it alive once there.
//!
//! See [12 Distribution Protocol]
//! (http://erlang.org/doc/apps/erts/erl_dist_protocol.html) for the protocol
//! this drives.
use crate::channel::{RecvError, SendError};
use crate::dispatch;
use crate::handshake::{HandshakeError, HandshakeStatus, ServerSideHandshake};
use crate::message::{self, Message};
use crate::node::{LocalNode, NodeName};
use crate::registry::NodeRegistry;
use crate::session::{OutboundCommand, PeerHandle};
use futures::channel::{mpsc, oneshot};
use futures::io::{AsyncRead, AsyncWrite};
use futures::{select, FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// How many outbound commands the registry may have enqueued and unsent at
/// once before [`PeerHandle::try_enqueue`] starts failing.
const OUTBOUND_QUEUE_SIZE: usize = 64;

/// Stages a connection passes through, in order. A connection never goes
/// backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Not yet connected (purely notional; a [`Connection`] is only ever
    /// constructed once a socket is accepted).
    Disconnected,
    /// Waiting for the peer's NAME packet.
    AwaitingName,
    /// NAME received and STATUS/CHALLENGE sent; waiting for CHALLENGE_REPLY.
    AwaitingChallengeReply,
    /// CHALLENGE_ACK sent; the peer may now send control messages.
    Connected,
}

/// Errors that end a connection's run loop.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConnectionError {
    /// The handshake failed.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// A `Connected`-stage frame could not be decoded.
    #[error(transparent)]
    Recv(#[from] RecvError),

    /// Sending to the peer failed.
    #[error(transparent)]
    Send(#[from] SendError),

    /// The peer's node name did not parse as a `name@host` identifier.
    #[error("peer declared an invalid node name: {0}")]
    InvalidPeerName(#[from] crate::node::NodeNameError),

    /// No frame (including keepalive ticks) was received within two network
    /// tick intervals.
    #[error("network tick timeout: no frame received within {0:?}")]
    TickTimeout(Duration),
}

/// Drives one accepted peer connection from handshake through to close.
///
/// `T` is the raw transport (e.g. a TCP stream); `R` is the application's
/// [`NodeRegistry`], which the connection notifies of connect/disconnect and
/// dispatches decoded control messages to.
pub struct Connection<T, R> {
    stream: T,
    local: Arc<LocalNode>,
    cookie: String,
    registry: Arc<R>,
}

impl<T, R> Connection<T, R>
where
    T: AsyncRead + AsyncWrite + Unpin + Clone + Send + 'static,
    R: NodeRegistry + 'static,
{
    /// Wraps a freshly accepted socket, ready to be driven with [`Self::run`].
    pub fn new(stream: T, local: Arc<LocalNode>, cookie: String, registry: Arc<R>) -> Self {
        Self {
            stream,
            local,
            cookie,
            registry,
        }
    }

    /// Runs the connection: the handshake, then the `Connected`-stage I/O
    /// loop, until the peer disconnects or a protocol error ends it.
    ///
    /// [`NodeRegistry::node_disconnected`] is guaranteed to be called exactly
    /// once for this peer if (and only if) [`NodeRegistry::node_connected`]
    /// was called, regardless of which branch below returns.
    pub async fn run(self) -> Result<(), ConnectionError> {
        let Self {
            stream,
            local,
            cookie,
            registry,
        } = self;

        log::debug!("stage: {:?}", Stage::AwaitingName);
        let mut handshake = ServerSideHandshake::new(stream, (*local).clone(), &cookie);
        let declared_name = handshake.execute_recv_name().await?;

        let resolved_name = declared_name
            .clone()
            .unwrap_or_else(|| local.name.to_string());
        let peer_name: NodeName = resolved_name.parse()?;

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);
        let (close_tx, close_rx) = oneshot::channel();
        let handle = PeerHandle::new(peer_name.clone(), outbound_tx, close_tx);
        registry.node_connected(&peer_name, handle);

        let result = Self::finish(
            handshake,
            declared_name,
            resolved_name,
            local.clone(),
            registry.as_ref(),
            outbound_rx,
            close_rx,
        )
        .await;

        registry.node_disconnected(&peer_name);
        result
    }

    /// Runs the rest of the handshake (STATUS through CHALLENGE_ACK) and then
    /// the `Connected`-stage I/O loop.
    ///
    /// Split out of [`Self::run`] so that [`NodeRegistry::node_connected`] can
    /// fire right after the NAME packet is accepted, before cookie
    /// authentication -- any failure from here on is still guaranteed a
    /// matching `node_disconnected` by the caller.
    async fn finish(
        mut handshake: ServerSideHandshake<T>,
        declared_name: Option<String>,
        resolved_name: String,
        local: Arc<LocalNode>,
        registry: &R,
        outbound_rx: mpsc::Receiver<OutboundCommand>,
        close_rx: oneshot::Receiver<()>,
    ) -> Result<(), ConnectionError> {
        log::debug!("stage: {:?}", Stage::AwaitingChallengeReply);
        let status = match declared_name {
            Some(_) => HandshakeStatus::Ok,
            None => HandshakeStatus::Named {
                name: resolved_name,
                creation: local.creation,
            },
        };
        let (stream, peer) = handshake.execute_rest(status).await?;

        log::debug!("stage: {:?}", Stage::Connected);
        let flags = local.flags & peer.flags;
        Self::run_connected(stream, flags, &local, registry, outbound_rx, close_rx).await
    }

    async fn run_connected(
        stream: T,
        flags: crate::DistributionFlags,
        local: &LocalNode,
        registry: &R,
        mut outbound_rx: mpsc::Receiver<OutboundCommand>,
        close_rx: oneshot::Receiver<()>,
    ) -> Result<(), ConnectionError> {
        let (mut tx, mut rx) = message::channel(stream, flags);
        let tick_timeout = local.network_tick_interval * 2;
        let close_rx = close_rx.fuse();
        futures::pin_mut!(close_rx);

        loop {
            let recv_fut = rx.recv().fuse();
            let outbound_fut = outbound_rx.next().fuse();
            let timeout_fut = futures_timer::Delay::new(tick_timeout).fuse();
            futures::pin_mut!(recv_fut, outbound_fut, timeout_fut);

            select! {
                received = recv_fut => {
                    match received {
                        Ok(Message::Tick) => tx.send(Message::Tick).await?,
                        Ok(message) => dispatch::dispatch_inbound(registry, message),
                        Err(RecvError::Closed) => return Ok(()),
                        Err(e) => return Err(e.into()),
                    }
                }
                command = outbound_fut => {
                    match command {
                        Some(command) => {
                            let message = dispatch::encode_outbound(command);
                            tx.send(message).await?;
                        }
                        None => return Ok(()),
                    }
                }
                _ = timeout_fut => {
                    log::warn!("no frame received within {tick_timeout:?}, closing");
                    return Err(ConnectionError::TickTimeout(tick_timeout));
                }
                _ = close_rx => {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Creation;
    use crate::registry::fake::{FakeRegistry, RecordedCall};
    use crate::session::OutboundCommand;
    use crate::term::PidOrAtom;
    use eetf::{Atom, Pid, Term};
    use futures::future::try_join;

    fn local_node(name: &str) -> Arc<LocalNode> {
        Arc::new(LocalNode::new(name.parse().unwrap(), Creation::new(1)))
    }

    async fn loopback_pair() -> (smol::net::TcpStream, smol::net::TcpStream) {
        let listener = smol::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = listener.accept();
        let connect = smol::net::TcpStream::connect(addr);
        let (accepted, connected) = try_join(accept, connect).await.unwrap();
        (accepted.0, connected)
    }

    fn pid(id: u32) -> Pid {
        Pid {
            node: Atom::from("client@host"),
            id,
            serial: 0,
            creation: 1,
        }
    }

    #[test]
    fn successful_handshake_then_pass_through_send_reaches_the_registry() {
        smol::block_on(async {
            let (server_stream, client_stream) = loopback_pair().await;
            let local = local_node("server@host");
            let registry = Arc::new(FakeRegistry::new());

            let server = Connection::new(server_stream, local, "cookie".to_owned(), registry.clone());
            let server_task = smol::spawn(server.run());

            let (client_stream, client_peer) = crate::handshake::ClientSideHandshake::new(
                client_stream,
                LocalNode::new("client@host".parse().unwrap(), Creation::new(1)),
                "cookie",
            )
            .execute()
            .await
            .unwrap();
            assert_eq!(client_peer.name, "server@host");

            let (mut client_tx, _client_rx) =
                message::channel(client_stream, client_peer.flags);
            client_tx
                .send(Message::send(pid(1), pid(7), Term::from(Atom::from("hello"))))
                .await
                .unwrap();

            // Give the server's run loop a turn to read and dispatch the frame,
            // then ask it to close so `run()` returns.
            smol::Timer::after(Duration::from_millis(50)).await;
            if let Some(session) = registry.last_session() {
                session.close();
            }
            server_task.await.unwrap();

            let calls = registry.calls();
            assert!(calls
                .iter()
                .any(|c| matches!(c, RecordedCall::NodeConnected { .. })));
            assert!(calls.contains(&RecordedCall::Send {
                sender: PidOrAtom::Pid(pid(1)),
                receiver: PidOrAtom::Pid(pid(7)),
                message: Term::from(Atom::from("hello")),
            }));
            assert!(calls
                .iter()
                .any(|c| matches!(c, RecordedCall::NodeDisconnected { .. })));
        });
    }

    #[test]
    fn cookie_mismatch_connects_then_disconnects_without_an_ack() {
        smol::block_on(async {
            let (server_stream, client_stream) = loopback_pair().await;
            let local = local_node("server@host");
            let registry = Arc::new(FakeRegistry::new());

            let server = Connection::new(server_stream, local, "right".to_owned(), registry.clone());
            let server_task = smol::spawn(server.run());

            let client_result = crate::handshake::ClientSideHandshake::new(
                client_stream,
                LocalNode::new("client@host".parse().unwrap(), Creation::new(1)),
                "wrong",
            )
            .execute()
            .await;
            assert!(client_result.is_err());

            let result = server_task.await;
            assert!(result.is_err());

            let calls = registry.calls();
            assert_eq!(calls.len(), 2);
            assert!(matches!(calls[0], RecordedCall::NodeConnected { .. }));
            assert!(matches!(calls[1], RecordedCall::NodeDisconnected { .. }));
        });
    }

    #[test]
    fn registry_initiated_monitor_exit_is_delivered_to_the_peer() {
        smol::block_on(async {
            let (server_stream, client_stream) = loopback_pair().await;
            let local = local_node("server@host");
            let registry = Arc::new(FakeRegistry::new());

            let server = Connection::new(server_stream, local, "cookie".to_owned(), registry.clone());
            let server_task = smol::spawn(server.run());

            let (client_stream, client_peer) = crate::handshake::ClientSideHandshake::new(
                client_stream,
                LocalNode::new("client@host".parse().unwrap(), Creation::new(1)),
                "cookie",
            )
            .execute()
            .await
            .unwrap();

            smol::Timer::after(Duration::from_millis(50)).await;
            let session = registry.last_session().expect("peer connected");

            let reference = eetf::Reference {
                id: vec![1, 0, 0],
                node: Atom::from("server@host"),
                creation: 1,
            };
            session
                .try_enqueue(OutboundCommand::MonitorPExit {
                    from: PidOrAtom::Pid(pid(1)),
                    to: PidOrAtom::Pid(pid(2)),
                    reference,
                    reason: Term::from(Atom::from("normal")),
                })
                .unwrap();

            let (_, mut client_rx) = message::channel(client_stream, client_peer.flags);
            let received = client_rx.recv().await.unwrap();
            assert!(matches!(received, Message::MonitorPExit(_)));

            session.close();
            server_task.await.unwrap();
        });
    }
}
