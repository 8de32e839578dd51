// Native socket table facility
// Queries the OS socket table through netstat2 (sysctl, iphlpapi or sock_diag)

use super::{ConnectionState, SocketRecord, TcpEnumerator};
use crate::error::ListError;
use netstat2::{get_sockets_info, AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, TcpState};
use std::io;
use std::net::SocketAddr;
use tracing::debug;

/// Enumerates TCP sockets with the platform's native socket-table API
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEnumerator;

impl TcpEnumerator for NativeEnumerator {
    fn name(&self) -> &str {
        "native socket table"
    }

    fn enumerate_tcp_connections(&self) -> Result<Vec<SocketRecord>, ListError> {
        let af_flags = AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6;
        let proto_flags = ProtocolFlags::TCP;

        let sockets =
            get_sockets_info(af_flags, proto_flags).map_err(|e| map_error(self.name(), e))?;

        let records: Vec<SocketRecord> = sockets
            .iter()
            .filter_map(|si| match &si.protocol_socket_info {
                ProtocolSocketInfo::Tcp(tcp) => Some(tcp_record(
                    SocketAddr::new(tcp.local_addr, tcp.local_port),
                    SocketAddr::new(tcp.remote_addr, tcp.remote_port),
                    &tcp.state,
                )),
                ProtocolSocketInfo::Udp(_) => None,
            })
            .collect();

        debug!(sockets = records.len(), "native socket table read");
        Ok(records)
    }
}

/// Keep the OS error itself as the source when netstat2 carries one
fn map_error(facility: &str, err: netstat2::error::Error) -> ListError {
    use netstat2::error::Error;

    match err {
        Error::OsError(e)
        | Error::FailedToListProcesses(e)
        | Error::FailedToQueryFileDescriptors(e) => ListError::invocation(facility, e),
        other => ListError::invocation(facility, io::Error::other(other)),
    }
}

fn tcp_record(local: SocketAddr, remote: SocketAddr, state: &TcpState) -> SocketRecord {
    SocketRecord::from_tcp(local, remote, map_state(state))
}

fn map_state(state: &TcpState) -> ConnectionState {
    match state {
        TcpState::Listen => ConnectionState::Listen,
        TcpState::Established => ConnectionState::Established,
        TcpState::SynSent => ConnectionState::SynSent,
        TcpState::SynReceived => ConnectionState::SynRecv,
        TcpState::FinWait1 => ConnectionState::FinWait1,
        TcpState::FinWait2 => ConnectionState::FinWait2,
        TcpState::TimeWait => ConnectionState::TimeWait,
        TcpState::Closed => ConnectionState::Close,
        TcpState::CloseWait => ConnectionState::CloseWait,
        TcpState::LastAck => ConnectionState::LastAck,
        TcpState::Closing => ConnectionState::Closing,
        _ => ConnectionState::Unknown,
    }
}
