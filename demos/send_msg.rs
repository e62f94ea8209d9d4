//! Client Node Example.
//!
//! The node sends a message to the specified erlang process on a peer node.
//!
//! # Usage Examples
//!
//! ```bash
//! $ cargo run --example send_msg -- --help
//! $ cargo run --example send_msg -- --peer foo --destination foo --cookie erlang_cookie -m hello
//! ```
use clap::Parser;

#[derive(Debug, Parser)]
#[clap(name = "send_msg")]
struct Args {
    #[clap(long, default_value = "127.0.0.1")]
    epmd_host: String,

    #[clap(long, default_value_t = dist_proto::epmd::DEFAULT_EPMD_PORT)]
    epmd_port: u16,

    #[clap(long = "peer", default_value = "foo")]
    peer_name: String,

    #[clap(long, default_value = "WPKYDIOSJIMJUURLRUHV")]
    cookie: String,

    #[clap(long = "self", default_value = "bar@localhost")]
    self_node: dist_proto::node::NodeName,

    #[clap(long, short, default_value = "foo")]
    destination: String,

    #[clap(long, short, default_value = "hello_world")]
    message: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    smol::block_on(async {
        let epmd_stream =
            smol::net::TcpStream::connect((args.epmd_host.as_str(), args.epmd_port)).await?;
        let peer_entry = dist_proto::epmd::EpmdClient::new(epmd_stream)
            .get_node_info(&args.peer_name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("node {} is not registered", args.peer_name))?;

        let peer_addr = (args.self_node.host(), peer_entry.port);
        let stream = smol::net::TcpStream::connect(peer_addr).await?;

        let local_node = dist_proto::node::LocalNode::new(
            args.self_node.clone(),
            dist_proto::node::Creation::random(),
        );
        let (stream, peer_node) =
            dist_proto::handshake::ClientSideHandshake::new(stream, local_node, &args.cookie)
                .execute()
                .await?;
        println!("# Connected: {}", peer_node.name);
        println!("# Distribution Flags: {:?}", peer_node.flags);

        let (mut tx, _rx) = dist_proto::message::channel(stream, peer_node.flags);
        let from_pid = eetf::Pid {
            node: eetf::Atom::from(args.self_node.to_string()),
            id: 0,
            serial: 0,
            creation: 0,
        };
        let message = dist_proto::message::Message::reg_send(
            from_pid,
            eetf::Atom::from(args.destination),
            eetf::Term::from(eetf::Atom::from(args.message)),
        );
        println!("# Send: {:?}", message);
        tx.send(message).await?;
        println!("# DONE");
        Ok(())
    })
}
