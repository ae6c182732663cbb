use std::fmt;
use std::io::{self, Read, Write};
use std::time::Duration;

use may::net::TcpStream;
#[cfg(unix)]
use may::os::unix::net::UnixStream;

/// A bidirectional byte stream between one client and the server.
///
/// Opening is up to the transport (`connect`/`accept`), closing is dropping
/// the last handle of the stream.
pub trait Channel: Sized + Read + Write + Send + 'static {
    /// try clone the stream, the clone shares the same connection
    fn try_clone(&self) -> io::Result<Self>;
    /// set read timeout, `None` blocks forever
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

macro_rules! impl_channel {
    ($name: ty) => {
        impl Channel for $name {
            fn try_clone(&self) -> io::Result<Self> {
                (*self).try_clone()
            }
            fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
                (*self).set_read_timeout(timeout)
            }
        }
    };
}

impl_channel!(TcpStream);
#[cfg(unix)]
impl_channel!(UnixStream);

/// A channel over any of the supported transports
pub enum Stream {
    /// tcp connection
    Tcp(TcpStream),
    /// unix domain socket connection
    #[cfg(unix)]
    Unix(UnixStream),
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Tcp(_) => f.write_str("Stream::Tcp"),
            #[cfg(unix)]
            Stream::Unix(_) => f.write_str("Stream::Unix"),
        }
    }
}

macro_rules! each_stream {
    ($me: expr, $s: ident => $e: expr) => {
        match $me {
            Stream::Tcp($s) => $e,
            #[cfg(unix)]
            Stream::Unix($s) => $e,
        }
    };
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        each_stream!(self, s => s.read(buf))
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        each_stream!(self, s => s.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        each_stream!(self, s => s.flush())
    }
}

impl Channel for Stream {
    fn try_clone(&self) -> io::Result<Self> {
        match self {
            Stream::Tcp(s) => Channel::try_clone(s).map(Stream::Tcp),
            #[cfg(unix)]
            Stream::Unix(s) => Channel::try_clone(s).map(Stream::Unix),
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        each_stream!(self, s => Channel::set_read_timeout(s, timeout))
    }
}
