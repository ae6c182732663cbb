//! Command line options shared by the calculator binaries.

use std::path::PathBuf;

use anyhow::Result;
use calc_rpc::net::Encoding;
use calc_rpc::{Endpoint, Transport, DEFAULT_HOST, DEFAULT_PORT};
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// The network host to bind to / connect to
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,
    /// The network port to use
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Use a unix domain socket at this path instead of tcp
    #[arg(long, conflicts_with_all = ["host", "port"])]
    pub socket: Option<PathBuf>,
    /// Payload encoding, must be the same on both sides
    #[arg(long, default_value_t = Encoding::Bincode)]
    pub encoding: Encoding,
}

impl ConnectionArgs {
    pub fn transport(&self) -> Result<Transport> {
        match self.socket.clone() {
            #[cfg(unix)]
            Some(path) => Ok(Transport::Unix(path)),
            #[cfg(not(unix))]
            Some(_) => anyhow::bail!("unix domain sockets are not supported on this platform"),
            None => Ok(Transport::Tcp(Endpoint::new(self.host.clone(), self.port))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        conn: ConnectionArgs,
    }

    fn parse(args: &[&str]) -> Result<ConnectionArgs, clap::Error> {
        Cli::try_parse_from(std::iter::once("calc").chain(args.iter().copied())).map(|c| c.conn)
    }

    #[test]
    fn defaults_to_the_well_known_endpoint() {
        let conn = parse(&[]).unwrap();
        assert_eq!(conn.encoding, Encoding::Bincode);
        match conn.transport().unwrap() {
            Transport::Tcp(ep) => assert_eq!(ep, Endpoint::default()),
            #[cfg(unix)]
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn host_port_and_encoding() {
        let conn = parse(&["--host", "0.0.0.0", "--port", "1234", "--encoding", "json"]).unwrap();
        assert_eq!(conn.encoding, Encoding::Json);
        assert_eq!(
            conn.transport().unwrap().to_string(),
            "tcp://0.0.0.0:1234"
        );
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        assert!(parse(&["--encoding", "xml"]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn socket_selects_unix_transport() {
        let conn = parse(&["--socket", "/tmp/calc.sock"]).unwrap();
        assert_eq!(
            conn.transport().unwrap(),
            Transport::Unix(PathBuf::from("/tmp/calc.sock"))
        );
        assert!(parse(&["--socket", "/tmp/calc.sock", "--port", "1"]).is_err());
    }
}
