use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Converts requests and responses to and from the frame payload.
///
/// Both sides of a connection must use the same codec. Errors are reported
/// as plain messages, they end up in `Error::Encode`/`Error::Decode` on the
/// client and in a `WireError` on the server.
pub trait Codec: Clone + Send + Sync + 'static {
    /// serialize `value` into the writer
    fn encode<W: Write, T: Serialize + ?Sized>(&self, w: W, value: &T) -> Result<(), String>;
    /// deserialize a value from the whole buffer
    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, String>;
}

/// Compact binary encoding, the default.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Bincode;

impl Codec for Bincode {
    fn encode<W: Write, T: Serialize + ?Sized>(&self, w: W, value: &T) -> Result<(), String> {
        bincode::serialize_into(w, value).map_err(|e| e.to_string())
    }

    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, String> {
        bincode::deserialize(buf).map_err(|e| e.to_string())
    }
}

/// Self describing text encoding, handy when sniffing the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Json;

impl Codec for Json {
    fn encode<W: Write, T: Serialize + ?Sized>(&self, w: W, value: &T) -> Result<(), String> {
        serde_json::to_writer(w, value).map_err(|e| e.to_string())
    }

    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, String> {
        serde_json::from_slice(buf).map_err(|e| e.to_string())
    }
}

/// Run time selection of a codec.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// see [`Bincode`]
    #[default]
    Bincode,
    /// see [`Json`]
    Json,
}

impl Codec for Encoding {
    fn encode<W: Write, T: Serialize + ?Sized>(&self, w: W, value: &T) -> Result<(), String> {
        match self {
            Encoding::Bincode => Bincode.encode(w, value),
            Encoding::Json => Json.encode(w, value),
        }
    }

    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, String> {
        match self {
            Encoding::Bincode => Bincode.decode(buf),
            Encoding::Json => Json.decode(buf),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Bincode => f.write_str("bincode"),
            Encoding::Json => f.write_str("json"),
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bincode" => Ok(Encoding::Bincode),
            "json" => Ok(Encoding::Json),
            _ => Err(format!("unknown encoding `{s}`, expected `bincode` or `json`")),
        }
    }
}
