//! calc_rpc is a calculator service exposed over a small RPC layer based on coroutines.
//!
//! The service is defined once, as a trait, and `#[calc_rpc::service]` generates the
//! rest: the request enum sent over the wire, a client stub, and the dispatch code
//! the server runs for each request. The transport and the encoding are pluggable,
//! see [`net::Channel`] and [`net::Codec`].
//!
//! ## What is an RPC framework?
//! "RPC" stands for "Remote Procedure Call," a function call where the work of
//! producing the return value is being done somewhere else. When an rpc function is
//! invoked, behind the scenes the function contacts some other process somewhere
//! and asks them to evaluate the function instead. The original function then
//! returns the value produced by the other process.
//!
//! Example usage:
//!
//! ```no_run
//! use calc_rpc::calculator::{CalculatorError, CalculatorServer, Client};
//! use calc_rpc::{ClientConfig, ServerConfig};
//!
//! let mut server = CalculatorServer::with_config(ServerConfig::default());
//! server.start().unwrap();
//!
//! Client::scoped(ClientConfig::default(), |client| {
//!     assert_eq!(client.add(1, 2)?, 3);
//!     assert!(matches!(client.divide(4, 0), Err(CalculatorError::DivideByZero(_))));
//!     Ok(())
//! })
//! .unwrap();
//!
//! server.stop();
//! server.join().unwrap();
//! ```
//!

#![deny(missing_docs)]

#[macro_use]
extern crate log;

// lets the generated code name this crate from the inside as well
extern crate self as calc_rpc;

pub use serde;

pub use calc_rpc_derive::{derive_serde, service, Server};

pub mod calculator;
mod config;
pub mod net;

pub use config::{ClientConfig, Endpoint, ServerConfig, Transport, DEFAULT_HOST, DEFAULT_PORT};
pub use net::{Error, Server, TcpServer};
#[cfg(unix)]
pub use net::UdsServer;
