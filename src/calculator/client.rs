use super::{CalculatorClient, CalculatorError};
use crate::config::ClientConfig;
use crate::net::{Encoding, Error, Stream};

type Stub = CalculatorClient<Stream, Encoding>;

/// Calculator client owning one connection.
///
/// ```no_run
/// use calc_rpc::calculator::Client;
/// use calc_rpc::ClientConfig;
///
/// let sum = Client::scoped(ClientConfig::default(), |client| client.add(1, 2)).unwrap();
/// assert_eq!(sum, 3);
/// ```
///
/// The connection is closed by `close`, or when the client is dropped. A call
/// that fails on the channel (reset, timeout, unreadable response) closes it
/// too, since the stream can no longer be trusted; `open` reconnects.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    stub: Option<Stub>,
}

impl Client {
    /// a closed client, nothing is connected until `open`
    pub fn new(config: ClientConfig) -> Self {
        Client { config, stub: None }
    }

    /// `new` followed by `open`
    pub fn connect(config: ClientConfig) -> Result<Self, Error> {
        let mut client = Client::new(config);
        client.open()?;
        Ok(client)
    }

    /// open a client, run `body` with it and close it again
    ///
    /// the body does not run when the connection can't be opened, the
    /// connection is closed on every way out of the body
    pub fn scoped<T, F>(config: ClientConfig, body: F) -> Result<T, CalculatorError>
    where
        F: FnOnce(&mut Client) -> Result<T, CalculatorError>,
    {
        let mut client = Client::connect(config)?;
        let ret = body(&mut client);
        client.close();
        ret
    }

    /// the configuration the client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// connect to the configured endpoint, does nothing when already open
    pub fn open(&mut self) -> Result<(), Error> {
        if self.stub.is_some() {
            return Ok(());
        }

        let stream = self.config.transport.connect()?;
        let mut stub = CalculatorClient::new(stream, self.config.encoding);
        stub.set_timeout(self.config.timeout)?;
        info!("connected to {}", self.config.transport);
        self.stub = Some(stub);
        Ok(())
    }

    /// release the connection, does nothing when already closed
    pub fn close(&mut self) {
        if self.stub.take().is_some() {
            info!("closed connection to {}", self.config.transport);
        }
    }

    /// whether a connection is held
    pub fn is_open(&self) -> bool {
        self.stub.is_some()
    }

    fn call<T>(&mut self, f: impl FnOnce(&mut Stub) -> Result<T, Error>) -> Result<T, Error> {
        let stub = self.stub.as_mut().ok_or(Error::NotConnected)?;
        let ret = f(stub);
        if let Err(
            e @ (Error::Connection(_) | Error::Timeout | Error::Decode(_) | Error::ServerDecode(_)),
        ) = &ret
        {
            warn!("drop the connection to {}: {e}", self.config.transport);
            self.close();
        }
        ret
    }

    /// `a + b`
    pub fn add(&mut self, a: i64, b: i64) -> Result<i64, CalculatorError> {
        Ok(self.call(|c| c.add(a, b))?)
    }

    /// `a - b`
    pub fn subtract(&mut self, a: i64, b: i64) -> Result<i64, CalculatorError> {
        Ok(self.call(|c| c.subtract(a, b))?)
    }

    /// `a * b`
    pub fn multiply(&mut self, a: i64, b: i64) -> Result<i64, CalculatorError> {
        Ok(self.call(|c| c.multiply(a, b))?)
    }

    /// `a / b` truncated toward zero, `CalculatorError::DivideByZero` when `b == 0`
    pub fn divide(&mut self, a: i64, b: i64) -> Result<i64, CalculatorError> {
        Ok(self.call(|c| c.divide(a, b))??)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}
