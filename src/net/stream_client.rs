use std::io::{self, BufReader, Write};
use std::time::Duration;

use bytes::BytesMut;

use super::channel::Channel;
use super::errors::Error;
use super::frame::{Frame, ReqBuf};

/// Stream Client
///
/// Issues one call at a time over a single channel, so every response must
/// carry the id of the request just sent.
#[derive(Debug)]
pub struct StreamClient<C: Channel> {
    // each request would have a unique id
    id: u64,
    // the connection
    stream: BufReader<C>,
    // rsp frame buf
    buf: BytesMut,
}

impl<C: Channel> StreamClient<C> {
    /// wrap a connected channel
    pub fn new(stream: C) -> Self {
        StreamClient {
            id: 0,
            stream: BufReader::with_capacity(1024, stream),
            buf: BytesMut::with_capacity(1024),
        }
    }

    /// set the read timeout, `None` waits forever
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.get_mut().set_read_timeout(timeout)
    }

    /// call the server
    /// the request must be encoded into the ReqBuf
    /// the response is the raw frame, you should parse it into final response
    pub fn call_service(&mut self, req: ReqBuf) -> Result<Frame, Error> {
        let id = self.id;
        self.id = self.id.wrapping_add(1);
        debug!("request id = {id}");

        let data = req.finish(id)?;
        let w = self.stream.get_mut();
        w.write_all(&data)?;
        w.flush()?;

        // read the response
        let rsp_frame =
            Frame::decode_from(&mut self.stream, &mut self.buf).map_err(Error::from_read)?;
        // one call in flight, any other id means the stream is out of sync
        if rsp_frame.id != id {
            let s = format!("response id {} for request id {id}", rsp_frame.id);
            error!("{s}");
            return Err(Error::Decode(s));
        }
        debug!("get response id = {id}");
        Ok(rsp_frame)
    }
}
