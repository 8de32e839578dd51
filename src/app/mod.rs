// Application entry logic
//
// Collects the listening set once, prints it, and turns any failure into
// a single `Error: ...` line plus a non-zero exit code.

pub mod config;

pub use config::{ListerConfig, EXIT_FAILURE, EXIT_SUCCESS};

use crate::net::{self, TcpEnumerator};
use anyhow::Result;
use std::io::Write;
use tracing::debug;

/// Run one listing and return the process exit code
///
/// Nothing reaches `out` unless the whole set was collected, so a failure
/// never leaves a partial listing behind.
pub fn run<O: Write, E: Write>(facility: &dyn TcpEnumerator, out: &mut O, err: &mut E) -> u8 {
    debug!(facility = facility.name(), "listing listening TCP sockets");

    match print_listening(facility, out) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            // stderr is the last channel left, nothing to do if it fails too
            let _ = writeln!(err, "Error: {}", e);
            EXIT_FAILURE
        }
    }
}

fn print_listening<O: Write>(facility: &dyn TcpEnumerator, out: &mut O) -> Result<()> {
    let set = net::list_listening_tcp(facility)?;
    if set.is_empty() {
        debug!("no listening TCP sockets");
        return Ok(());
    }
    write!(out, "{}", set)?;
    out.flush()?;
    Ok(())
}
