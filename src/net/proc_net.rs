// Kernel connection table reader (Linux)
// Reads /proc/net/tcp and /proc/net/tcp6 directly instead of spawning netstat

use super::{ConnectionState, SocketRecord, TcpEnumerator};
use crate::error::ListError;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use tracing::debug;

/// Address family of a kernel table, decides how addresses are decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Inet,
    Inet6,
}

/// One kernel table to read
#[derive(Debug, Clone)]
pub struct ProcTable {
    pub path: PathBuf,
    pub family: AddressFamily,
    /// A missing optional table is skipped (tcp6 is absent when IPv6 is disabled)
    pub required: bool,
}

/// Enumerates TCP sockets from the /proc/net connection tables
#[derive(Debug, Clone)]
pub struct ProcNetEnumerator {
    tables: Vec<ProcTable>,
}

impl ProcNetEnumerator {
    pub fn new(tables: Vec<ProcTable>) -> Self {
        Self { tables }
    }
}

impl TcpEnumerator for ProcNetEnumerator {
    fn name(&self) -> &str {
        "procfs"
    }

    fn enumerate_tcp_connections(&self) -> Result<Vec<SocketRecord>, ListError> {
        let mut records = Vec::new();

        for table in &self.tables {
            let content = match fs::read_to_string(&table.path) {
                Ok(c) => c,
                Err(e) if e.kind() == io::ErrorKind::NotFound && !table.required => {
                    debug!(path = %table.path.display(), "optional table missing, skipping");
                    continue;
                }
                Err(e) => {
                    return Err(ListError::invocation(
                        format!("reading {}", table.path.display()),
                        e,
                    ));
                }
            };

            let mut parsed = parse_table(&content, table.family).map_err(|message| {
                ListError::diagnostic(table.path.display().to_string(), message)
            })?;

            debug!(path = %table.path.display(), rows = parsed.len(), "read kernel table");
            records.append(&mut parsed);
        }

        Ok(records)
    }
}

/// Parse a whole table, header included
///
/// Any row that does not decode makes the table untrustworthy, so the
/// first malformed row is reported instead of being skipped.
fn parse_table(content: &str, family: AddressFamily) -> Result<Vec<SocketRecord>, String> {
    let mut records = Vec::new();

    // Skip header line
    for (idx, line) in content.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        match parse_tcp_line(line, family) {
            Some(record) => records.push(record),
            None => {
                return Err(format!(
                    "malformed entry at line {}: {}",
                    idx + 1,
                    line.trim()
                ))
            }
        }
    }

    Ok(records)
}

/// Parse a single row of /proc/net/tcp or /proc/net/tcp6
fn parse_tcp_line(line: &str, family: AddressFamily) -> Option<SocketRecord> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    // sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
    // 0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 12345
    if parts.len() < 10 {
        return None;
    }

    let local = parse_address(parts[1], family)?;
    let remote = parse_address(parts[2], family)?;
    let state = ConnectionState::from_hex(parts[3]);

    Some(SocketRecord::from_tcp(local, remote, state))
}

/// Parse HEXIP:HEXPORT (e.g. "0100007F:1F90" = 127.0.0.1:8080)
fn parse_address(addr_str: &str, family: AddressFamily) -> Option<SocketAddr> {
    let (ip_hex, port_hex) = addr_str.split_once(':')?;

    let ip = match family {
        AddressFamily::Inet => IpAddr::V4(parse_hex_ipv4(ip_hex)?),
        AddressFamily::Inet6 => IpAddr::V6(parse_hex_ipv6(ip_hex)?),
    };
    let port = u16::from_str_radix(hex_digits(port_hex)?, 16).ok()?;

    Some(SocketAddr::new(ip, port))
}

/// from_str_radix tolerates a leading sign, the kernel never writes one
fn hex_digits(field: &str) -> Option<&str> {
    if !field.is_empty() && field.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(field)
    } else {
        None
    }
}

/// The kernel prints the address as a u32 in host byte order
fn parse_hex_ipv4(hex_ip: &str) -> Option<Ipv4Addr> {
    if hex_ip.len() != 8 {
        return None;
    }
    let word = u32::from_str_radix(hex_digits(hex_ip)?, 16).ok()?;
    Some(Ipv4Addr::from(word.to_ne_bytes()))
}

/// Four host-order u32 words, 32 hex digits in total
fn parse_hex_ipv6(hex_ip: &str) -> Option<Ipv6Addr> {
    if hex_ip.len() != 32 {
        return None;
    }
    let hex_ip = hex_digits(hex_ip)?;

    let mut octets = [0u8; 16];
    for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
        let word = u32::from_str_radix(&hex_ip[i * 8..i * 8 + 8], 16).ok()?;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }

    Some(Ipv6Addr::from(octets))
}
