//! EPMD Client Example.
//!
//! # Usage Examples
//!
//! ```bash
//! $ cargo run --example epmd_cli -- names
//! ```
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(name = "epmd_cli")]
struct Args {
    #[clap(long = "epmd-host", short = 'h', default_value = "127.0.0.1")]
    epmd_host: String,

    #[clap(long = "epmd-port", short = 'p', default_value_t = dist_proto::epmd::DEFAULT_EPMD_PORT)]
    epmd_port: u16,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Lists the names currently registered with EPMD.
    Names,
    /// Dumps EPMD's internal table, for debugging.
    Dump,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    smol::block_on(async {
        let stream =
            smol::net::TcpStream::connect((args.epmd_host.as_str(), args.epmd_port)).await?;
        let client = dist_proto::epmd::EpmdClient::new(stream);
        match args.command {
            Command::Names => {
                for (name, port) in client.get_names().await? {
                    println!("{name} at port {port}");
                }
            }
            Command::Dump => {
                println!("{}", client.dump().await?);
            }
        }
        Ok(())
    })
}
