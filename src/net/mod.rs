//! the request/response layer underneath the calculator, based on coroutines.
//!
//! the general communication procedure is as below
//! 1. client send request to server
//! 2. server recv request from client
//! 3. server parsing and process the request
//! 4. server send out response to client
//! 5. client recv response from server
//!
//! every message is wrapped in a versioned, length prefixed `Frame`. the payload
//! inside the frame is produced by a [`Codec`], the bytes travel over a [`Channel`].
//! both are traits so the generated service code never depends on a concrete
//! encoding or socket type.
//!
use std::sync::Arc;

pub use channel::{Channel, Stream};
pub use codec::{Bincode, Codec, Encoding, Json};
pub use errors::{Error, WireError};
pub use frame::{Frame, ReqBuf, RspBuf, FRAME_MAX_LEN, FRAME_VERSION};
pub use server::{ServerInstance, TcpServer};
pub use stream_client::StreamClient;

#[cfg(unix)]
pub use server::UdsServer;

/// must impl this trait for your server
pub trait Server: Send + Sync + Sized + 'static {
    /// the service that would run in a coroutine
    /// the real request should be decoded from the input with `codec`
    /// the real response should be encoded into the RspBuf with `codec`
    /// if decode/encode error happened, return an Err(WireError)
    /// application error should be encapsulated into the RspBuf
    fn service<K: Codec>(&self, codec: &K, req: &[u8], rsp: &mut RspBuf) -> Result<(), WireError>;
}

impl<T: Server> Server for Arc<T> {
    fn service<K: Codec>(&self, codec: &K, req: &[u8], rsp: &mut RspBuf) -> Result<(), WireError> {
        (**self).service(codec, req, rsp)
    }
}

/// Byte stream abstraction
mod channel;
/// Payload encodings
mod codec;
/// Provides a few different error types
mod errors;
/// raw frame protocol
mod frame;
/// Provides server framework
mod server;
/// Provide stream client
mod stream_client;
