//! Shared types used across Fleetplace crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of an execution host.
pub type HostId = String;

/// Network location of a host's agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("missing port in address: {s}"))?;
        if host.is_empty() {
            return Err(format!("missing host in address: {s}"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port in address {s}: {e}"))?;
        Ok(Self::new(host, port))
    }
}

/// Host-reported fitness for a resource.
///
/// Ordering is lexicographic: `utilization` first, `transfer` breaks ties.
/// Higher is better on both.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Score {
    /// Primary, utilization-derived component.
    pub utilization: i32,
    /// Tie-break transfer ratio.
    pub transfer: i32,
}

impl Score {
    pub fn new(utilization: i32, transfer: i32) -> Self {
        Self {
            utilization,
            transfer,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.utilization, self.transfer)
    }
}

/// Result classification of a placement or of a single host's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    Ok,
    NoSuchResource,
    NotEnoughCpuResource,
    NotEnoughMemoryResource,
    NotEnoughDatastoreCapacity,
    SystemError,
    InvalidState,
}

impl ResultCode {
    pub fn is_ok(self) -> bool {
        self == ResultCode::Ok
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::NoSuchResource => "NO_SUCH_RESOURCE",
            Self::NotEnoughCpuResource => "NOT_ENOUGH_CPU_RESOURCE",
            Self::NotEnoughMemoryResource => "NOT_ENOUGH_MEMORY_RESOURCE",
            Self::NotEnoughDatastoreCapacity => "NOT_ENOUGH_DATASTORE_CAPACITY",
            Self::SystemError => "SYSTEM_ERROR",
            Self::InvalidState => "INVALID_STATE",
        };
        f.write_str(s)
    }
}

/// Reduction result of one placement attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementOutcome {
    pub result: ResultCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<HostId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<ServerAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlacementOutcome {
    /// A winning host was selected.
    pub fn selected(host_id: impl Into<HostId>, address: ServerAddress, score: Score) -> Self {
        Self {
            result: ResultCode::Ok,
            host_id: Some(host_id.into()),
            address: Some(address),
            score: Some(score),
            error: None,
        }
    }

    /// Placement did not produce a host.
    pub fn failed(result: ResultCode, error: impl Into<String>) -> Self {
        Self {
            result,
            host_id: None,
            address: None,
            score: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_orders_by_utilization_then_transfer() {
        assert!(Score::new(10, 9) > Score::new(10, 5));
        assert!(Score::new(11, 0) > Score::new(10, 99));
        assert_eq!(Score::new(3, 3).cmp(&Score::new(3, 3)), std::cmp::Ordering::Equal);
    }

    #[test]
    fn server_address_parses_host_and_port() {
        let addr: ServerAddress = "10.0.0.7:8835".parse().unwrap();
        assert_eq!(addr, ServerAddress::new("10.0.0.7", 8835));
        assert_eq!(addr.to_string(), "10.0.0.7:8835");

        assert!("10.0.0.7".parse::<ServerAddress>().is_err());
        assert!(":80".parse::<ServerAddress>().is_err());
        assert!("h:notaport".parse::<ServerAddress>().is_err());
    }

    #[test]
    fn result_code_wire_names() {
        let s = serde_json::to_string(&ResultCode::NoSuchResource).unwrap();
        assert_eq!(s, "\"NO_SUCH_RESOURCE\"");
        assert_eq!(ResultCode::SystemError.to_string(), "SYSTEM_ERROR");
    }

    #[test]
    fn failed_outcome_has_no_host() {
        let o = PlacementOutcome::failed(ResultCode::SystemError, "boom");
        assert!(!o.is_ok());
        assert!(o.host_id.is_none());
        assert_eq!(o.error.as_deref(), Some("boom"));
    }
}
