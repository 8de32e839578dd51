// tcplisten - list the TCP sockets listening on this host
// Single-shot: collect once, print, exit

mod app;
mod error;
mod net;

use app::ListerConfig;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Logs stay off unless RUST_LOG asks for them, stderr is reserved for errors
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = ListerConfig::default();
    let facility = config.enumerator();

    let stdout = io::stdout();
    let stderr = io::stderr();
    let code = app::run(facility.as_ref(), &mut stdout.lock(), &mut stderr.lock());

    ExitCode::from(code)
}
