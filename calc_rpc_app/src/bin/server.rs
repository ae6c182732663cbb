#[macro_use]
extern crate log;

use anyhow::{Context, Result};
use calc_rpc::calculator::CalculatorServer;
use calc_rpc::ServerConfig;
use calc_rpc_app::ConnectionArgs;
use clap::Parser;

/// Serve the calculator until CTRL-C
#[derive(Parser, Debug)]
#[command(name = "calculator-server", version)]
struct Cli {
    #[command(flatten)]
    conn: ConnectionArgs,
    /// Number of may worker threads
    #[arg(long)]
    workers: Option<usize>,
}

fn wait_for_ctrl_c() -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the signal runtime")?;
    rt.block_on(tokio::signal::ctrl_c())
        .context("failed to listen for CTRL-C")
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if let Some(workers) = cli.workers {
        may::config().set_workers(workers);
    }

    let config = ServerConfig {
        transport: cli.conn.transport()?,
        encoding: cli.conn.encoding,
    };
    let mut server = CalculatorServer::with_config(config);

    println!("Running the CalculatorService (Press CTRL-C to stop)...");
    server
        .start()
        .with_context(|| format!("failed to start on {}", server.config().transport))?;

    wait_for_ctrl_c()?;
    info!("CTRL-C received, shutting down");

    server.stop();
    if server.join().is_err() {
        anyhow::bail!("accept loop panicked");
    }
    println!("Stopped.");
    Ok(())
}
