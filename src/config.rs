//! Configuration shared by the server and the client.
//!
//! Components take these structs as they are; the named defaults live in the
//! `Default` impls and are picked by whoever builds the config.
use std::fmt;
use std::io;
#[cfg(unix)]
use std::path::PathBuf;
use std::time::Duration;

use may::net::TcpStream;
#[cfg(unix)]
use may::os::unix::net::UnixStream;
use serde::{Deserialize, Serialize};

use crate::net::{Encoding, Stream};

/// default host the server binds to and the client connects to
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// default port the server binds to and the client connects to
pub const DEFAULT_PORT: u16 = 9876;

/// Host and port of a tcp endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// host name or ip address
    pub host: String,
    /// tcp port, `0` lets the server pick one
    pub port: u16,
}

impl Endpoint {
    /// create an endpoint from its parts
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            host: host.into(),
            port,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Where the server listens and the client connects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// tcp socket
    Tcp(Endpoint),
    /// unix domain socket at the given path
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Default for Transport {
    fn default() -> Self {
        Transport::Tcp(Endpoint::default())
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp(endpoint) => write!(f, "tcp://{endpoint}"),
            #[cfg(unix)]
            Transport::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl Transport {
    /// open a channel to the endpoint
    pub fn connect(&self) -> io::Result<Stream> {
        match self {
            Transport::Tcp(endpoint) => {
                let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))?;
                stream.set_nodelay(true)?;
                Ok(Stream::Tcp(stream))
            }
            #[cfg(unix)]
            Transport::Unix(path) => UnixStream::connect(path).map(Stream::Unix),
        }
    }
}

/// Server side configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// endpoint to bind
    pub transport: Transport,
    /// codec for requests and responses
    pub encoding: Encoding,
}

/// Client side configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// endpoint to connect
    pub transport: Transport,
    /// codec for requests and responses, must match the server
    pub encoding: Encoding,
    /// how long a call waits for its response, `None` waits forever
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// a client config talking to whatever `server` is configured for
    pub fn for_server(server: &ServerConfig) -> Self {
        ClientConfig {
            transport: server.transport.clone(),
            encoding: server.encoding,
            timeout: None,
        }
    }
}
