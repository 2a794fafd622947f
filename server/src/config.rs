//! Command-line configuration for the server binary.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "rts-server", about = "Authoritative server for an RTS match")]
pub struct Args {
    /// Address to listen on, host:port.
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    pub listen: String,

    /// Seconds to wait for in-flight work to flush during graceful shutdown.
    #[arg(short, long, default_value_t = 10)]
    pub shutdown_timeout_secs: u64,
}
