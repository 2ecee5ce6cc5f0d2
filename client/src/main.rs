//! Monitor for the broadcast hub: subscribes over TCP or UDP and prints
//! every packet it receives as hex.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use clap::{ArgGroup, Parser};
use futures::StreamExt;
use log::*;
use tokio::net::{TcpStream, UdpSocket};
use tokio_util::codec::{BytesCodec, FramedRead};

/// Receive buffer; hub packets never exceed one frame payload.
const MAX_DATAGRAM: usize = 1024;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("target").required(true).args(["tcp", "udp"])))]
struct Args {
    /// Hub TCP server address, e.g. 127.0.0.1:5353
    #[arg(short, long)]
    tcp: Option<SocketAddr>,

    /// Hub UDP server address, e.g. 127.0.0.1:5050
    #[arg(short, long)]
    udp: Option<SocketAddr>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let monitor = async {
        match (args.tcp, args.udp) {
            (Some(addr), _) => monitor_tcp(addr).await,
            (None, Some(addr)) => monitor_udp(addr).await,
            (None, None) => Ok(()),
        }
    };

    tokio::select! {
        result = monitor => {
            if let Err(e) = result {
                error!("Monitor stopped: {}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }
}

async fn monitor_tcp(addr: SocketAddr) -> std::io::Result<()> {
    info!("Connecting to {}...", addr);
    let stream = TcpStream::connect(addr).await?;
    info!("Connected!");

    let mut chunks = FramedRead::new(stream, BytesCodec::new());
    while let Some(chunk) = chunks.next().await {
        println!("{}", hex_line(&chunk?));
    }
    info!("Server closed the connection");
    Ok(())
}

async fn monitor_udp(addr: SocketAddr) -> std::io::Result<()> {
    let local = if addr.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket = UdpSocket::bind(local).await?;

    // Any datagram registers us as a peer.
    socket.send_to(&[], addr).await?;
    info!("Registered with {} from {}", addr, socket.local_addr()?);

    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        let (n, from) = socket.recv_from(&mut buf).await?;
        if from != addr {
            debug!("Ignoring {} bytes from {}", n, from);
            continue;
        }
        println!("{}", hex_line(&buf[..n]));
    }
}

fn hex_line(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_line() {
        assert_eq!(hex_line(&[0x00, 0xAB, 0xFF]), "00 ab ff");
        assert_eq!(hex_line(&[]), "");
    }

    #[test]
    fn test_target_required() {
        assert!(Args::try_parse_from(["framelink-client"]).is_err());
        assert!(Args::try_parse_from(["framelink-client", "-t", "127.0.0.1:5353"]).is_ok());
        assert!(
            Args::try_parse_from(["framelink-client", "-t", "127.0.0.1:1", "-u", "127.0.0.1:2"]).is_err()
        );
    }
}
