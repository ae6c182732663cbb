use std::time::Duration;

use anyhow::Result;
use calc_rpc::calculator::{CalculatorError, Client};
use calc_rpc::ClientConfig;
use calc_rpc_app::ConnectionArgs;
use clap::Parser;

/// Run a few calculations against a calculator server
#[derive(Parser, Debug)]
#[command(name = "calculator-client", version)]
struct Cli {
    #[command(flatten)]
    conn: ConnectionArgs,
    /// Give up on a response after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = ClientConfig {
        transport: cli.conn.transport()?,
        encoding: cli.conn.encoding,
        timeout: cli.timeout_ms.map(Duration::from_millis),
    };

    Client::scoped(config, |client| {
        println!("1+2 = {}", client.add(1, 2)?);
        println!("2-1 = {}", client.subtract(2, 1)?);
        println!("2*3 = {}", client.multiply(2, 3)?);
        println!("4/2 = {}", client.divide(4, 2)?);
        match client.divide(4, 0) {
            Err(CalculatorError::DivideByZero(_)) => println!("Caught DivideByZeroError"),
            Ok(v) => println!("4/0 = {v}"),
            Err(e) => return Err(e),
        }
        Ok(())
    })?;
    Ok(())
}
