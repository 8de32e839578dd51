// Network socket enumeration module
// Read-only operations: nothing here modifies system state

pub mod command;
pub mod native;
pub mod proc_net;

use crate::error::ListError;
use std::fmt;
use std::net::SocketAddr;
use tracing::debug;

/// TCP connection states as reported by the kernel and by netstat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    Unknown,
}

impl ConnectionState {
    /// Parse hex state value from /proc/net/tcp
    pub fn from_hex(hex_str: &str) -> Self {
        match hex_str {
            "01" => ConnectionState::Established,
            "02" => ConnectionState::SynSent,
            "03" => ConnectionState::SynRecv,
            "04" => ConnectionState::FinWait1,
            "05" => ConnectionState::FinWait2,
            "06" => ConnectionState::TimeWait,
            "07" => ConnectionState::Close,
            "08" => ConnectionState::CloseWait,
            "09" => ConnectionState::LastAck,
            "0A" => ConnectionState::Listen,
            "0B" => ConnectionState::Closing,
            _ => ConnectionState::Unknown,
        }
    }

    /// Parse a state column written by netstat (Linux, BSD and Windows spellings)
    ///
    /// Only exact tokens match, so `LISTEN` inside a host name or a process
    /// name is not mistaken for a state.
    pub fn from_name(token: &str) -> Option<Self> {
        let state = match token {
            "ESTABLISHED" => ConnectionState::Established,
            "SYN_SENT" => ConnectionState::SynSent,
            "SYN_RECV" | "SYN_RCVD" | "SYN_RECEIVED" => ConnectionState::SynRecv,
            "FIN_WAIT1" | "FIN_WAIT_1" => ConnectionState::FinWait1,
            "FIN_WAIT2" | "FIN_WAIT_2" => ConnectionState::FinWait2,
            "TIME_WAIT" => ConnectionState::TimeWait,
            "CLOSE" | "CLOSED" => ConnectionState::Close,
            "CLOSE_WAIT" => ConnectionState::CloseWait,
            "LAST_ACK" => ConnectionState::LastAck,
            "LISTEN" | "LISTENING" => ConnectionState::Listen,
            "CLOSING" => ConnectionState::Closing,
            _ => return None,
        };
        Some(state)
    }

    /// netstat-style name used when rendering structured records
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Established => "ESTABLISHED",
            ConnectionState::SynSent => "SYN_SENT",
            ConnectionState::SynRecv => "SYN_RECV",
            ConnectionState::FinWait1 => "FIN_WAIT1",
            ConnectionState::FinWait2 => "FIN_WAIT2",
            ConnectionState::TimeWait => "TIME_WAIT",
            ConnectionState::Close => "CLOSE",
            ConnectionState::CloseWait => "CLOSE_WAIT",
            ConnectionState::LastAck => "LAST_ACK",
            ConnectionState::Listen => "LISTEN",
            ConnectionState::Closing => "CLOSING",
            ConnectionState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of socket information as the facility reported it
///
/// The line itself is what gets printed. Protocol and state are recognized
/// once, when the record is built, and only drive the LISTEN filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketRecord {
    line: String,
    protocol: String,
    state: ConnectionState,
}

impl SocketRecord {
    /// Wrap a raw text line from a netstat-like utility
    ///
    /// The protocol is the first token. The state is the first later token
    /// that spells a TCP state; lines without one get `Unknown`.
    pub fn from_line(line: impl Into<String>) -> Self {
        let line = line.into();
        let mut tokens = line.split_whitespace();
        let protocol = tokens.next().unwrap_or_default().to_ascii_lowercase();
        let state = tokens
            .find_map(ConnectionState::from_name)
            .unwrap_or(ConnectionState::Unknown);

        Self {
            line,
            protocol,
            state,
        }
    }

    /// Render a record obtained from a structured source (kernel table or API)
    pub fn from_tcp(local: SocketAddr, remote: SocketAddr, state: ConnectionState) -> Self {
        let protocol = if local.is_ipv4() { "tcp4" } else { "tcp6" };
        let remote_str = if remote.port() == 0 && remote.ip().is_unspecified() {
            "*:*".to_string()
        } else {
            remote.to_string()
        };
        let line = format!(
            "{:<5} {:<23} {:<23} {}",
            protocol,
            local.to_string(),
            remote_str,
            state
        );

        Self {
            line,
            protocol: protocol.to_string(),
            state,
        }
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_tcp(&self) -> bool {
        self.protocol.starts_with("tcp")
    }

    /// True for a TCP socket passively accepting connections
    pub fn is_listening_tcp(&self) -> bool {
        self.is_tcp() && self.state() == ConnectionState::Listen
    }
}

impl fmt::Display for SocketRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

/// Listening TCP sockets in facility report order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListeningSet {
    records: Vec<SocketRecord>,
}

impl ListeningSet {
    /// Keep only listening TCP records, preserving their relative order
    pub fn from_records(records: impl IntoIterator<Item = SocketRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .filter(SocketRecord::is_listening_tcp)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(SocketRecord::line)
    }
}

/// Each line newline-terminated; an empty set renders as nothing
impl fmt::Display for ListeningSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// A platform mechanism that reports the host's TCP sockets
pub trait TcpEnumerator {
    /// Short name used in error messages and logs
    fn name(&self) -> &str;

    /// Report every TCP socket the facility knows about, in its own order
    fn enumerate_tcp_connections(&self) -> Result<Vec<SocketRecord>, ListError>;
}

/// Collect the TCP sockets currently in LISTEN state
///
/// Runs the facility exactly once. No sorting or deduplication happens:
/// the result follows the facility's report order.
pub fn list_listening_tcp(facility: &dyn TcpEnumerator) -> Result<ListeningSet, ListError> {
    let records = facility.enumerate_tcp_connections()?;
    let total = records.len();
    let set = ListeningSet::from_records(records);

    debug!(
        facility = facility.name(),
        records = total,
        listening = set.len(),
        "list_listening_tcp: filtered socket records"
    );

    Ok(set)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Facility that replays canned output, for tests across the crate
    pub(crate) struct ScriptedFacility {
        pub output: &'static str,
        pub diagnostic: Option<&'static str>,
    }

    impl TcpEnumerator for ScriptedFacility {
        fn name(&self) -> &str {
            "scripted"
        }

        fn enumerate_tcp_connections(&self) -> Result<Vec<SocketRecord>, ListError> {
            if let Some(message) = self.diagnostic {
                return Err(ListError::diagnostic(self.name(), message));
            }
            Ok(self.output.lines().map(SocketRecord::from_line).collect())
        }
    }

    /// Facility over generated lines, re-read on every call
    struct LinesFacility {
        lines: Vec<String>,
    }

    impl TcpEnumerator for LinesFacility {
        fn name(&self) -> &str {
            "lines"
        }

        fn enumerate_tcp_connections(&self) -> Result<Vec<SocketRecord>, ListError> {
            Ok(self
                .lines
                .iter()
                .map(|line| SocketRecord::from_line(line.as_str()))
                .collect())
        }
    }

    const SAMPLE: &str = "\
tcp4  0  0  127.0.0.1.8080  *.*  LISTEN
tcp4  0  0  127.0.0.1.9000  10.0.0.5.4410  ESTABLISHED
tcp6  0  0  ::1.22          *.*  LISTEN
";

    #[test]
    fn test_end_to_end_sample() {
        let facility = ScriptedFacility {
            output: SAMPLE,
            diagnostic: None,
        };
        let set = list_listening_tcp(&facility).unwrap();

        assert_eq!(
            set.to_string(),
            "tcp4  0  0  127.0.0.1.8080  *.*  LISTEN\n\
             tcp6  0  0  ::1.22          *.*  LISTEN\n"
        );
    }

    #[test]
    fn test_connection_state_from_hex() {
        assert_eq!(ConnectionState::from_hex("01"), ConnectionState::Established);
        assert_eq!(ConnectionState::from_hex("0A"), ConnectionState::Listen);
        assert_eq!(ConnectionState::from_hex("06"), ConnectionState::TimeWait);
        assert_eq!(ConnectionState::from_hex("ZZ"), ConnectionState::Unknown);
    }

    #[test]
    fn test_connection_state_from_name() {
        assert_eq!(ConnectionState::from_name("LISTEN"), Some(ConnectionState::Listen));
        assert_eq!(ConnectionState::from_name("LISTENING"), Some(ConnectionState::Listen));
        assert_eq!(ConnectionState::from_name("SYN_RCVD"), Some(ConnectionState::SynRecv));
        assert_eq!(ConnectionState::from_name("CLOSED"), Some(ConnectionState::Close));
        assert_eq!(ConnectionState::from_name("listen"), None);
        assert_eq!(ConnectionState::from_name("LISTEN.8080"), None);
    }

    #[test]
    fn test_excludes_udp_and_headers() {
        let lines = [
            "Active Internet connections (including servers)",
            "Proto Recv-Q Send-Q  Local Address          Foreign Address        (state)",
            "udp4       0      0  *.5353                 *.*                    LISTEN",
            "tcp        0      0 0.0.0.0:22              0.0.0.0:*               LISTEN",
        ];
        let set = ListeningSet::from_records(lines.into_iter().map(SocketRecord::from_line));

        assert_eq!(set.len(), 1);
        assert_eq!(set.lines().next(), Some(lines[3]));
    }

    #[test]
    fn test_state_token_must_be_exact() {
        // "LISTEN" only appears inside an address, the real state is ESTABLISHED
        let record = SocketRecord::from_line("tcp4 0 0 LISTEN.local.80 10.0.0.2.5000 ESTABLISHED");
        assert_eq!(record.state(), ConnectionState::Established);
        assert!(!record.is_listening_tcp());

        // Windows netstat spelling and upper-case protocol
        let record = SocketRecord::from_line("  TCP    0.0.0.0:135    0.0.0.0:0    LISTENING");
        assert!(record.is_listening_tcp());
    }

    #[test]
    fn test_no_matches_is_empty_success() {
        let facility = ScriptedFacility {
            output: "tcp4 0 0 10.0.0.1.5000 10.0.0.2.443 ESTABLISHED\n",
            diagnostic: None,
        };
        let set = list_listening_tcp(&facility).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.to_string(), "");
    }

    #[test]
    fn test_diagnostic_propagates() {
        let facility = ScriptedFacility {
            output: SAMPLE,
            diagnostic: Some("partial results"),
        };
        let err = list_listening_tcp(&facility).unwrap_err();
        assert!(matches!(err, ListError::DiagnosticOutput { .. }));
    }

    #[test]
    fn test_from_tcp_formatting() {
        let local: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let remote: SocketAddr = "0.0.0.0:0".parse().unwrap();
        let record = SocketRecord::from_tcp(local, remote, ConnectionState::Listen);

        assert!(record.is_listening_tcp());
        assert!(record.line().starts_with("tcp4  127.0.0.1:8080"));
        assert!(record.line().contains("*:*"));
        assert!(record.line().ends_with("LISTEN"));

        let local: SocketAddr = "[::1]:22".parse().unwrap();
        let remote: SocketAddr = "[::1]:51000".parse().unwrap();
        let record = SocketRecord::from_tcp(local, remote, ConnectionState::Established);
        assert!(record.line().starts_with("tcp6  [::1]:22"));
        assert!(record.line().contains("[::1]:51000"));
        assert!(!record.is_listening_tcp());
    }

    fn arb_line() -> impl Strategy<Value = (String, bool)> {
        let port = 1u16..65535;
        prop_oneof![
            port.clone()
                .prop_map(|p| (format!("tcp4  0  0  127.0.0.1.{p}  *.*  LISTEN"), true)),
            port.clone()
                .prop_map(|p| (format!("tcp6  0  0  ::1.{p}  *.*  LISTEN"), true)),
            port.clone().prop_map(|p| (
                format!("tcp4  0  0  127.0.0.1.{p}  10.0.0.5.4410  ESTABLISHED"),
                false
            )),
            port.clone()
                .prop_map(|p| (format!("udp4  0  0  *.{p}  *.*  LISTEN"), false)),
            port.prop_map(|p| (format!("tcp4  0  0  *.{p}  *.*  TIME_WAIT"), false)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The result is exactly the tcp/LISTEN lines, in their original order
        #[test]
        fn prop_filter_keeps_exact_ordered_subset(lines in prop::collection::vec(arb_line(), 0..40)) {
            let expected: Vec<&str> = lines
                .iter()
                .filter(|(_, listening)| *listening)
                .map(|(line, _)| line.as_str())
                .collect();

            let set = ListeningSet::from_records(
                lines.iter().map(|(line, _)| SocketRecord::from_line(line.as_str())),
            );
            let actual: Vec<&str> = set.lines().collect();

            prop_assert_eq!(actual, expected);
        }

        /// Listing the same facility twice yields the same set, in the same order
        #[test]
        fn prop_listing_is_idempotent(lines in prop::collection::vec(arb_line(), 0..40)) {
            let facility = LinesFacility {
                lines: lines.into_iter().map(|(line, _)| line).collect(),
            };

            let first = list_listening_tcp(&facility).unwrap();
            let second = list_listening_tcp(&facility).unwrap();
            prop_assert_eq!(first.to_string(), second.to_string());
            prop_assert_eq!(first, second);
        }
    }
}
