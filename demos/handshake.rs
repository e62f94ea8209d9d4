//! Handshake-only Example.
//!
//! Looks a peer node up in EPMD, runs the client-side handshake against it,
//! and prints the resolved peer identity without exchanging any further
//! messages.
//!
//! # Usage Examples
//!
//! ```bash
//! $ cargo run --example handshake -- --help
//! $ cargo run --example handshake -- -n foo -l bar@127.0.0.1 -c erlang_cookie
//! ```
use clap::Parser;

#[derive(Debug, Parser)]
#[clap(name = "handshake")]
struct Args {
    #[clap(long = "epmd-host", short = 'h', default_value = "127.0.0.1")]
    epmd_host: String,

    #[clap(long = "epmd-port", short = 'p', default_value_t = dist_proto::epmd::DEFAULT_EPMD_PORT)]
    epmd_port: u16,

    #[clap(long = "node-name", short = 'n', default_value = "foo")]
    node_name: String,

    #[clap(long, short = 'c', default_value = "WPKYDIOSJIMJUURLRUHV")]
    cookie: String,

    #[clap(long = "local-node", short = 'l', default_value = "bar@127.0.0.1")]
    local_node: dist_proto::node::NodeName,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    smol::block_on(async {
        let epmd_stream =
            smol::net::TcpStream::connect((args.epmd_host.as_str(), args.epmd_port)).await?;
        let entry = dist_proto::epmd::EpmdClient::new(epmd_stream)
            .get_node_info(&args.node_name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("node {} is not registered", args.node_name))?;

        let stream =
            smol::net::TcpStream::connect((args.local_node.host(), entry.port)).await?;
        let local_node = dist_proto::node::LocalNode::new(
            args.local_node,
            dist_proto::node::Creation::random(),
        );
        let (_stream, peer_node) =
            dist_proto::handshake::ClientSideHandshake::new(stream, local_node, &args.cookie)
                .execute()
                .await?;
        println!("R: {:?}", peer_node);
        Ok(())
    })
}
