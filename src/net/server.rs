use std::io::{self, BufReader, Write};
use std::net::{SocketAddr, ToSocketAddrs};
#[cfg(unix)]
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::channel::Channel;
use super::codec::Codec;
use super::errors::{Error, WireError};
use super::frame::{Frame, RspBuf};
use super::Server;

use bytes::BytesMut;
use may::net::TcpListener;
#[cfg(unix)]
use may::os::unix::net::{UnixListener, UnixStream};
use may::{coroutine, go};

macro_rules! t {
    ($e: expr) => {
        match $e {
            Ok(val) => val,
            Err(err) => {
                error!("call = {:?}\nerr = {:?}", stringify!($e), err);
                continue;
            }
        }
    };
}

/// service instance, the handle of a running accept loop
pub struct ServerInstance {
    handle: Option<coroutine::JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    stopped: bool,
}

impl ServerInstance {
    fn new(handle: coroutine::JoinHandle<()>, local_addr: Option<SocketAddr>) -> Self {
        ServerInstance {
            handle: Some(handle),
            local_addr,
            stopped: false,
        }
    }

    /// the address the tcp listener is bound to, `None` for unix sockets
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// whether `stop` was called
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// stop accepting connections, this would not wait for the loop to exit
    ///
    /// connections that are already accepted are served until the peer
    /// closes them
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(h) = self.handle.as_ref() {
            info!("cancel the accept loop");
            // dropping the listener inside the coroutine closes it
            unsafe { h.coroutine().cancel() };
        }
    }

    /// join the service, this would wait until the service is stopped
    pub fn join(&mut self) -> std::thread::Result<()> {
        match self.handle.take() {
            Some(handle) => {
                let ret = handle.join();
                // a cancelled coroutine always reports the cancel panic
                if self.stopped {
                    Ok(())
                } else {
                    ret
                }
            }
            None => Ok(()),
        }
    }
}

impl Drop for ServerInstance {
    fn drop(&mut self) {
        self.stop();
        self.join().ok();
    }
}

/// serve one connection request by request until the peer closes it
fn serve_conn<T: Server, K: Codec, S: Channel>(server: &T, codec: &K, stream: S) {
    // the write half of the stream
    let mut ws = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            error!("failed to clone stream: err = {e:?}");
            return;
        }
    };
    // the read half of the stream
    let mut rs = BufReader::new(stream);
    let mut buf = BytesMut::with_capacity(1024 * 32);

    loop {
        let req = match Frame::decode_from(&mut rs, &mut buf) {
            Ok(r) => r,
            Err(ref e) => {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    info!("server decode req: connection closed");
                } else {
                    error!("server decode req: err = {e:?}");
                }
                break;
            }
        };

        debug!("get request: id={}", req.id);
        let mut rsp = RspBuf::new();
        let ret = server.service(codec, req.decode_req(), &mut rsp);
        let bad_request = matches!(ret, Err(WireError::ServerDeserialize(_)));
        let data = rsp.finish(req.id, ret);

        debug!("send rsp: id={}", req.id);
        if let Err(e) = ws.write_all(&data).and_then(|()| ws.flush()) {
            error!("server write rsp: err = {e:?}");
            break;
        }

        // the stream can't be trusted after a request we failed to read
        if bad_request {
            warn!("close the connection after undecodable request id={}", req.id);
            break;
        }
    }
}

/// bind through std, which leaves `SO_REUSEPORT` off, so a port that is
/// already listened on fails with `AddrInUse`
fn bind_tcp<L: ToSocketAddrs>(addr: L) -> io::Result<TcpListener> {
    let listener = std::net::TcpListener::bind(addr)?;
    #[cfg(unix)]
    {
        use std::os::unix::io::{FromRawFd, IntoRawFd};
        Ok(unsafe { TcpListener::from_raw_fd(listener.into_raw_fd()) })
    }
    #[cfg(windows)]
    {
        use std::os::windows::io::{FromRawSocket, IntoRawSocket};
        Ok(unsafe { TcpListener::from_raw_socket(listener.into_raw_socket()) })
    }
}

/// Provides a function for starting the tcp service.
pub trait TcpServer: Server {
    /// Spawns the service, binding to the given address
    /// return an instance that you can stop when need to stop the service
    fn start<L: ToSocketAddrs, K: Codec>(self, addr: L, codec: K) -> Result<ServerInstance, Error> {
        let listener = bind_tcp(addr).map_err(Error::Bind)?;
        let local_addr = listener.local_addr().ok();
        info!("tcp server listening on {local_addr:?}");

        let instance = go!(
            coroutine::Builder::new().name("TcpServer".to_owned()),
            move || {
                let server = Arc::new(self);
                for stream in listener.incoming() {
                    let stream = t!(stream);
                    t!(stream.set_nodelay(true));
                    info!("accept connection from {:?}", stream.peer_addr().ok());
                    let server = server.clone();
                    let codec = codec.clone();
                    go!(move || serve_conn(&*server, &codec, stream));
                }
            }
        )
        .map_err(Error::Spawn)?;
        Ok(ServerInstance::new(instance, local_addr))
    }
}

/// Provides a function for starting the unix domain socket service.
#[cfg(unix)]
pub trait UdsServer: Server {
    /// Spawns the service, binding to the given path
    /// return an instance that you can stop when need to stop the service
    fn start<P: AsRef<Path>, K: Codec>(self, path: P, codec: K) -> Result<ServerInstance, Error> {
        struct AutoDrop(UnixListener, PathBuf);
        impl Drop for AutoDrop {
            fn drop(&mut self) {
                std::fs::remove_file(&self.1).ok();
            }
        }

        let path = path.as_ref();
        if path.exists() {
            // a socket file somebody still answers on is not ours to take
            if UnixStream::connect(path).is_ok() {
                let msg = format!("{} is already listened on", path.display());
                return Err(Error::Bind(io::Error::new(io::ErrorKind::AddrInUse, msg)));
            }
            info!("remove stale socket file {path:?}");
            std::fs::remove_file(path).ok();
        }
        let listener = UnixListener::bind(path).map_err(Error::Bind)?;
        let listener = AutoDrop(listener, path.to_owned());
        info!("uds server listening on {:?}", listener.1);

        let instance = go!(
            coroutine::Builder::new().name("Unix Socket Server".to_owned()),
            move || {
                let server = Arc::new(self);
                for stream in listener.0.incoming() {
                    let stream = t!(stream);
                    let server = server.clone();
                    let codec = codec.clone();
                    go!(move || serve_conn(&*server, &codec, stream));
                }
            }
        )
        .map_err(Error::Spawn)?;
        Ok(ServerInstance::new(instance, None))
    }
}

impl<T: Server> TcpServer for T {}
#[cfg(unix)]
impl<T: Server> UdsServer for T {}
