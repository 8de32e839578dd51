// External netstat facility
// Fallback for platforms without a kernel table or native API: run the
// system utility once and keep its stdout lines verbatim

use super::{SocketRecord, TcpEnumerator};
use crate::error::ListError;
use std::io;
use std::process::Command;
use tracing::debug;

/// Runs a netstat-like program and reads one socket per stdout line
#[derive(Debug, Clone)]
pub struct CommandEnumerator {
    program: String,
    args: Vec<String>,
}

impl CommandEnumerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl TcpEnumerator for CommandEnumerator {
    fn name(&self) -> &str {
        &self.program
    }

    /// Any text on stderr fails the call, even when the exit status is zero
    fn enumerate_tcp_connections(&self) -> Result<Vec<SocketRecord>, ListError> {
        debug!(program = %self.program, args = ?self.args, "running enumeration command");

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| ListError::invocation(self.name(), e))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let diagnostic = stderr.trim();

        if !output.status.success() {
            let reason = if diagnostic.is_empty() {
                format!("{}", output.status)
            } else {
                format!("{}: {}", output.status, diagnostic)
            };
            return Err(ListError::invocation(self.name(), io::Error::other(reason)));
        }

        if !diagnostic.is_empty() {
            return Err(ListError::diagnostic(self.name(), diagnostic));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let records: Vec<SocketRecord> = stdout.lines().map(SocketRecord::from_line).collect();

        debug!(lines = records.len(), "enumeration command finished");
        Ok(records)
    }
}
