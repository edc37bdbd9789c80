//! JSON bodies exchanged with a host agent's place endpoint.

use serde::{Deserialize, Serialize};

use fleetplace_core::{Resource, ResultCode, Score};
use fleetplace_placement::HostCallError;

/// Path on the host agent that scores a resource.
pub const PLACE_PATH: &str = "/v1/place";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceRequest {
    pub resource: Resource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceResponse {
    pub result: ResultCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlaceResponse {
    pub fn ok(score: Score) -> Self {
        Self {
            result: ResultCode::Ok,
            score: Some(score),
            error: None,
        }
    }

    pub fn rejected(result: ResultCode, error: impl Into<String>) -> Self {
        Self {
            result,
            score: None,
            error: Some(error.into()),
        }
    }

    /// Turn a reply into a score or the reason there is none.
    pub fn into_score(self) -> Result<Score, HostCallError> {
        if !self.result.is_ok() {
            return Err(HostCallError::Rejected {
                code: self.result,
                message: self.error,
            });
        }
        self.score
            .ok_or_else(|| HostCallError::Protocol("OK reply without score".to_string()))
    }
}

/// Decode a host agent's reply body.
///
/// A score is only taken from a 2xx reply. An error status is a rejection
/// when the body names a non-OK result, and a protocol error otherwise.
pub fn decode_reply(status: http::StatusCode, body: &[u8]) -> Result<Score, HostCallError> {
    let parsed = serde_json::from_slice::<PlaceResponse>(body);
    if status.is_success() {
        return parsed
            .map_err(|e| HostCallError::Protocol(e.to_string()))?
            .into_score();
    }
    match parsed {
        Ok(reply) if !reply.result.is_ok() => reply.into_score(),
        _ => Err(HostCallError::Protocol(format!("unexpected status {status}"))),
    }
}
