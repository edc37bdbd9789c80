//! Placement error types.

use thiserror::Error;

use fleetplace_core::ResultCode;

/// Errors raised before fan-out begins.
///
/// Each one ends the task FAILED with the code from [`PlacementError::result_code`].
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("Place failure, constraints cannot be satisfied for request")]
    NoCandidates,

    #[error("No seeded image datastores found for image {image_id}")]
    UnknownImageLocality { image_id: String },

    #[error("Image id not found for vm {vm_id}")]
    MalformedResource { vm_id: String },

    #[error("candidate sampler failed: {0}")]
    Sampler(String),

    #[error("image locality lookup failed: {0}")]
    Locality(String),
}

impl PlacementError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::NoCandidates | Self::UnknownImageLocality { .. } => ResultCode::NoSuchResource,
            Self::MalformedResource { .. } | Self::Sampler(_) | Self::Locality(_) => {
                ResultCode::SystemError
            }
        }
    }
}

/// Why a single host did not produce a score.
///
/// Absorbed by the fan-out reduction; never surfaced per host.
#[derive(Debug, Error)]
pub enum HostCallError {
    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("host rejected placement: {code}")]
    Rejected { code: ResultCode, message: Option<String> },

    #[error("host call timed out")]
    Timeout,

    #[error("malformed host response: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_codes() {
        assert_eq!(PlacementError::NoCandidates.result_code(), ResultCode::NoSuchResource);
        assert_eq!(
            PlacementError::UnknownImageLocality { image_id: "i".into() }.result_code(),
            ResultCode::NoSuchResource
        );
        assert_eq!(
            PlacementError::MalformedResource { vm_id: "vm".into() }.result_code(),
            ResultCode::SystemError
        );
        assert_eq!(
            PlacementError::Sampler("down".into()).result_code(),
            ResultCode::SystemError
        );
    }

    #[test]
    fn messages() {
        let e = PlacementError::UnknownImageLocality { image_id: "ubuntu".into() };
        assert_eq!(e.to_string(), "No seeded image datastores found for image ubuntu");
        let e = PlacementError::MalformedResource { vm_id: "vm-1".into() };
        assert_eq!(e.to_string(), "Image id not found for vm vm-1");
    }
}
