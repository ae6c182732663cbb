use std::io::{self, ErrorKind, Read, Write};

use super::errors::{Error, WireError};
use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use bytes::{Bytes, BytesMut};

// Frame layout
// ver(u8) + id(u64) + len(u64) + payload([u8; len])

// req frame layout
// ver(u8) + id(u64) + len(u64) + req_data([u8; len])

// rsp frame layout
// ver(u8) + id(u64) + len(u64) + ty(u8) + rsp_data([u8; len - 1])

/// the frame version written and accepted by this crate
pub const FRAME_VERSION: u8 = 1;
/// max payload len of a frame
pub const FRAME_MAX_LEN: u64 = 1024 * 1024;
// ver + id + len
const HEAD_LEN: usize = 17;

const RSP_OK: u8 = 0;
const RSP_SERVER_DESERIALIZE: u8 = 1;
const RSP_SERVER_SERIALIZE: u8 = 2;
const RSP_STATUS: u8 = 3;

fn write_head(buf: &mut [u8], id: u64, len: u64) {
    buf[0] = FRAME_VERSION;
    BigEndian::write_u64(&mut buf[1..9], id);
    BigEndian::write_u64(&mut buf[9..HEAD_LEN], len);
}

/// raw frame wrapper, low level protocol
#[derive(Debug)]
pub struct Frame {
    /// frame id, req and rsp has the same id
    pub id: u64,
    /// payload data, without the head
    data: Bytes,
}

impl Frame {
    /// decode a frame from the reader
    ///
    /// an unknown version or a too big length is reported as `InvalidData`,
    /// a closed or truncated stream as `UnexpectedEof`
    pub fn decode_from<R: Read>(r: &mut R, buf: &mut BytesMut) -> io::Result<Self> {
        let ver = r.read_u8()?;
        if ver != FRAME_VERSION {
            let s = format!("decode unsupported frame version. ver={ver}");
            error!("{s}");
            return Err(io::Error::new(ErrorKind::InvalidData, s));
        }

        let id = r.read_u64::<BigEndian>()?;
        let len = r.read_u64::<BigEndian>()?;
        debug!("decode frame id={id}, len={len}");

        if len > FRAME_MAX_LEN {
            let s = format!("decode too big frame length. len={len}");
            error!("{s}");
            return Err(io::Error::new(ErrorKind::InvalidData, s));
        }

        let len = len as usize;
        buf.resize(len, 0);
        r.read_exact(&mut buf[..len])?;
        let data = buf.split_to(len).freeze();

        Ok(Frame { id, data })
    }

    /// decode a request from the frame, this would return the req raw buffer
    /// you need to deserialize from it into the real type
    pub fn decode_req(&self) -> &[u8] {
        &self.data
    }

    /// decode a response from the frame, this would return the rsp raw buffer
    /// you need to deserialize from it into the real type
    pub fn decode_rsp(&self) -> Result<&[u8], Error> {
        let (&ty, data) = self
            .data
            .split_first()
            .ok_or_else(|| Error::Decode("empty response frame".to_owned()))?;
        let msg = || String::from_utf8_lossy(data).into_owned();

        match ty {
            RSP_OK => Ok(data),
            RSP_SERVER_DESERIALIZE => Err(Error::ServerDecode(msg())),
            RSP_SERVER_SERIALIZE => Err(Error::ServerEncode(msg())),
            RSP_STATUS => Err(Error::Status(msg())),
            _ => {
                let s = format!("invalid response type. ty={ty}");
                error!("{s}");
                Err(Error::Decode(s))
            }
        }
    }
}

/// req frame buffer that can be serialized into
#[derive(Debug)]
pub struct ReqBuf(Vec<u8>);

impl Default for ReqBuf {
    fn default() -> Self {
        ReqBuf::new()
    }
}

impl ReqBuf {
    /// crate a new `ReqBuf` instance
    pub fn new() -> Self {
        // leave enough space to write the head
        let mut buf = Vec::with_capacity(128);
        buf.resize(HEAD_LEN, 0);
        ReqBuf(buf)
    }

    /// convert self into raw buf that can be send as a frame
    pub fn finish(self, id: u64) -> Result<Vec<u8>, Error> {
        let mut buf = self.0;
        let len = (buf.len() - HEAD_LEN) as u64;
        if len > FRAME_MAX_LEN {
            return Err(Error::Encode(format!("request too big. len={len}")));
        }

        write_head(&mut buf, id, len);
        debug!("encode req id={id}, len={len}");
        Ok(buf)
    }
}

impl Write for ReqBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// rsp frame buffer that can be serialized into
#[derive(Debug)]
pub struct RspBuf(Vec<u8>);

impl Default for RspBuf {
    fn default() -> Self {
        RspBuf::new()
    }
}

impl RspBuf {
    /// crate a new `RspBuf` instance
    pub fn new() -> Self {
        // head + ty
        let mut buf = Vec::with_capacity(64);
        buf.resize(HEAD_LEN + 1, 0);
        RspBuf(buf)
    }

    /// convert self into raw buf that can be send as a frame
    ///
    /// a failed `ret` replaces whatever was written with the error message
    pub fn finish(self, id: u64, ret: Result<(), WireError>) -> Vec<u8> {
        let mut buf = self.0;

        let mut ty = match ret {
            Ok(()) => RSP_OK,
            Err(e) => {
                let (ty, msg) = match e {
                    WireError::ServerDeserialize(s) => (RSP_SERVER_DESERIALIZE, s),
                    WireError::ServerSerialize(s) => (RSP_SERVER_SERIALIZE, s),
                    WireError::Status(s) => (RSP_STATUS, s),
                };
                buf.truncate(HEAD_LEN + 1);
                buf.extend_from_slice(msg.as_bytes());
                ty
            }
        };

        if (buf.len() - HEAD_LEN) as u64 > FRAME_MAX_LEN {
            error!("encode too big response, id={id}");
            buf.truncate(HEAD_LEN + 1);
            buf.extend_from_slice(b"response too big");
            ty = RSP_STATUS;
        }

        buf[HEAD_LEN] = ty;
        let len = (buf.len() - HEAD_LEN) as u64;
        write_head(&mut buf, id, len);
        debug!("encode rsp id={id}, ty={ty}, len={len}");
        buf
    }
}

impl Write for RspBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
