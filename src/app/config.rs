// Application configuration types
//
// This module contains:
// - Kernel table locations and netstat invocation per platform
// - Exit codes
// - Facility detection and construction

use crate::net::command::CommandEnumerator;
use crate::net::native::NativeEnumerator;
use crate::net::proc_net::{AddressFamily, ProcNetEnumerator, ProcTable};
use crate::net::TcpEnumerator;
use std::path::{Path, PathBuf};

// ============================================================================
// Constants
// ============================================================================

/// IPv4 kernel connection table
pub const PROC_NET_TCP: &str = "/proc/net/tcp";

/// IPv6 kernel connection table, absent when IPv6 is disabled
pub const PROC_NET_TCP6: &str = "/proc/net/tcp6";

/// Program used by the text fallback
pub const NETSTAT_PROGRAM: &str = "netstat";

/// netstat arguments: all sockets, numeric, TCP only
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
pub const NETSTAT_ARGS: &[&str] = &["-an", "-p", "tcp"];

#[cfg(target_os = "windows")]
pub const NETSTAT_ARGS: &[&str] = &["-an", "-p", "TCP"];

#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly",
    target_os = "windows"
)))]
pub const NETSTAT_ARGS: &[&str] = &["-ant"];

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

// ============================================================================
// Enums
// ============================================================================

/// Which OS facility enumerates the sockets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facility {
    /// /proc/net/tcp{,6} kernel tables (Linux)
    ProcNet,
    /// Native socket-table API via netstat2
    Native,
    /// External netstat process, text output
    Command,
}

impl Facility {
    /// Pick the most structured facility this host offers
    pub fn detect() -> Self {
        if cfg!(target_os = "linux") {
            if Path::new(PROC_NET_TCP).exists() {
                Facility::ProcNet
            } else {
                Facility::Native
            }
        } else if cfg!(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "windows"
        )) {
            Facility::Native
        } else {
            Facility::Command
        }
    }
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Everything needed to build the enumeration facility
#[derive(Debug, Clone)]
pub struct ListerConfig {
    pub facility: Facility,

    /// Tables read by the ProcNet facility, in report order
    pub proc_tables: Vec<ProcTable>,

    /// Program and arguments run by the Command facility
    pub netstat_program: String,
    pub netstat_args: Vec<String>,
}

impl ListerConfig {
    /// Build the configured facility
    pub fn enumerator(&self) -> Box<dyn TcpEnumerator> {
        match self.facility {
            Facility::ProcNet => Box::new(ProcNetEnumerator::new(self.proc_tables.clone())),
            Facility::Native => Box::new(NativeEnumerator),
            Facility::Command => Box::new(CommandEnumerator::new(
                self.netstat_program.clone(),
                self.netstat_args.clone(),
            )),
        }
    }
}

impl Default for ListerConfig {
    fn default() -> Self {
        Self {
            facility: Facility::detect(),
            proc_tables: default_proc_tables(),
            netstat_program: NETSTAT_PROGRAM.to_string(),
            netstat_args: NETSTAT_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// tcp is required, tcp6 may be missing
pub fn default_proc_tables() -> Vec<ProcTable> {
    vec![
        ProcTable {
            path: PathBuf::from(PROC_NET_TCP),
            family: AddressFamily::Inet,
            required: true,
        },
        ProcTable {
            path: PathBuf::from(PROC_NET_TCP6),
            family: AddressFamily::Inet6,
            required: false,
        },
    ]
}
