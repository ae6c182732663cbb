use std::io;

use thiserror::Error;

/// All errors that can occur while serving or calling the rpc service.
#[derive(Debug, Error)]
pub enum Error {
    /// The server failed to acquire its listening endpoint.
    #[error("failed to bind the listening endpoint: {0}")]
    Bind(#[source] io::Error),
    /// The server could not spawn the coroutine of its accept loop.
    #[error("failed to spawn the accept loop: {0}")]
    Spawn(#[source] io::Error),
    /// The connection was refused, reset or closed in the middle of a call.
    #[error("connection err: {0}")]
    Connection(#[from] io::Error),
    /// The server was unable to reply to the rpc client within some time.
    ///
    /// The timeout value is set in the client instance
    #[error("the server was unable to reply to the rpc client within some time")]
    Timeout,
    /// Error in encoding a client request.
    #[error("encoding a client request err: {0}")]
    Encode(String),
    /// Error in decoding a server response.
    ///
    /// Covers both a malformed frame and a payload the codec can't read.
    #[error("decoding a server response err: {0}")]
    Decode(String),
    /// The server failed to decode the request.
    ///
    /// Typically this indicates the two sides use different encodings.
    #[error("the server failed to decode the request: {0}")]
    ServerDecode(String),
    /// The server failed to encode the response.
    #[error("the server failed to encode the response: {0}")]
    ServerEncode(String),
    /// The server returns a status error for a request it could not serve.
    ///
    /// Typically this indicates that the service implementation panicked
    #[error("the server returns a status error: {0}")]
    Status(String),
    /// The client connection is not open.
    #[error("the client is not connected")]
    NotConnected,
}

impl Error {
    /// classify an io error that happened while waiting for a response
    pub(crate) fn from_read(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout,
            io::ErrorKind::InvalidData => Error::Decode(err.to_string()),
            _ => Error::Connection(err),
        }
    }
}

/// A server-supplied error, carried in the response frame type.
#[derive(Debug, Error)]
pub enum WireError {
    /// Deserializing a client request failed
    #[error("deserializing a client request: {0}")]
    ServerDeserialize(String),
    /// Serializing the server response failed
    #[error("serializing server response: {0}")]
    ServerSerialize(String),
    /// Server Status
    #[error("server status: {0}")]
    Status(String),
}

impl From<WireError> for Error {
    fn from(err: WireError) -> Self {
        match err {
            WireError::ServerDeserialize(s) => Error::ServerDecode(s),
            WireError::ServerSerialize(s) => Error::ServerEncode(s),
            WireError::Status(s) => Error::Status(s),
        }
    }
}
