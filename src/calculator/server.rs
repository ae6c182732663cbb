use std::net::SocketAddr;
use std::sync::Arc;

use super::CalculatorHandler;
use crate::config::{ServerConfig, Transport};
#[cfg(unix)]
use crate::net::UdsServer;
use crate::net::{Error, Server, ServerInstance, TcpServer};

/// Lifecycle of a [`CalculatorServer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// not accepting connections
    Stopped,
    /// the accept loop is running
    Running,
}

/// Serves a calculator implementation on the configured transport.
///
/// `start` spawns the accept loop in a background coroutine, `stop` cancels
/// it and `join` waits for it. Every accepted connection is served in its own
/// coroutine and outlives `stop` until the peer hangs up.
///
/// Dropping the server stops and joins it.
pub struct CalculatorServer<H: Server = CalculatorHandler> {
    config: ServerConfig,
    handler: Arc<H>,
    instance: Option<ServerInstance>,
}

impl CalculatorServer<CalculatorHandler> {
    /// a server running the default [`CalculatorHandler`]
    pub fn with_config(config: ServerConfig) -> Self {
        CalculatorServer::new(config, CalculatorHandler)
    }
}

impl<H: Server> CalculatorServer<H> {
    /// a server running `handler`, nothing is bound until `start`
    pub fn new(config: ServerConfig, handler: H) -> Self {
        CalculatorServer {
            config,
            handler: Arc::new(handler),
            instance: None,
        }
    }

    /// the configuration the server was built with
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// current lifecycle state
    pub fn state(&self) -> ServerState {
        match self.instance {
            Some(ref instance) if !instance.is_stopped() => ServerState::Running,
            _ => ServerState::Stopped,
        }
    }

    /// shorthand for `state() == ServerState::Running`
    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    /// the bound tcp address while running, handy when the port is `0`
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.instance {
            Some(ref instance) if !instance.is_stopped() => instance.local_addr(),
            _ => None,
        }
    }

    /// bind the endpoint and start accepting connections in the background
    ///
    /// returns `Error::Bind` when the endpoint is in use or invalid, and does
    /// nothing when the server is already running
    pub fn start(&mut self) -> Result<(), Error> {
        if self.is_running() {
            warn!("calculator server already running on {}", self.config.transport);
            return Ok(());
        }
        // reap the accept loop of a previous run
        if self.join().is_err() {
            error!("previous accept loop panicked");
        }

        let handler = self.handler.clone();
        let codec = self.config.encoding;
        let instance = match self.config.transport {
            Transport::Tcp(ref endpoint) => {
                TcpServer::start(handler, (endpoint.host.as_str(), endpoint.port), codec)?
            }
            #[cfg(unix)]
            Transport::Unix(ref path) => UdsServer::start(handler, path, codec)?,
        };

        info!(
            "calculator server running on {} ({}), bound to {:?}",
            self.config.transport,
            codec,
            instance.local_addr()
        );
        self.instance = Some(instance);
        Ok(())
    }

    /// stop accepting connections, does not wait for the accept loop to exit
    pub fn stop(&mut self) {
        if let Some(instance) = self.instance.as_mut() {
            if !instance.is_stopped() {
                info!("stopping calculator server on {}", self.config.transport);
                instance.stop();
            }
        }
    }

    /// wait until the accept loop has exited
    ///
    /// blocks forever on a running server that nobody stops, returns at once
    /// when the server was never started or is already joined
    pub fn join(&mut self) -> std::thread::Result<()> {
        match self.instance.as_mut() {
            Some(instance) => instance.join(),
            None => Ok(()),
        }
    }
}
