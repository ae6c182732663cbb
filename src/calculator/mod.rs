//! The calculator service: its contract, the default implementation, and the
//! server and client wrappers around the generated code.
//!
//! `#[service]` expands the `Calculator` trait below into
//!
//! * `CalculatorRequest`, the operation sent over the wire,
//! * `CalculatorClient<C, K>`, the raw client stub over a channel and a codec,
//! * `CalculatorServiceDispatch`, the server side routing.
//!
use thiserror::Error;

pub use client::Client;
pub use handler::CalculatorHandler;
pub use server::{CalculatorServer, ServerState};

mod client;
mod handler;
mod server;

/// The divisor of a division was zero.
#[crate::derive_serde]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("division by zero")]
pub struct DivideByZeroError;

/// Integer arithmetic exposed over rpc
#[crate::service]
pub trait Calculator {
    /// Returns `a + b`, wrapping on overflow.
    fn add(&self, a: i64, b: i64) -> i64;
    /// Returns `a - b`, wrapping on overflow.
    fn subtract(&self, a: i64, b: i64) -> i64;
    /// Returns `a * b`, wrapping on overflow.
    fn multiply(&self, a: i64, b: i64) -> i64;
    /// Returns `a / b` truncated toward zero, fails when `b` is zero.
    fn divide(&self, a: i64, b: i64) -> Result<i64, DivideByZeroError>;
}

/// Failure of a calculator call as seen by the client.
#[derive(Debug, Error)]
pub enum CalculatorError {
    /// The server refused to divide by zero.
    #[error(transparent)]
    DivideByZero(#[from] DivideByZeroError),
    /// The call itself failed: connection, timeout, encoding or server status.
    #[error(transparent)]
    Rpc(#[from] crate::net::Error),
}
