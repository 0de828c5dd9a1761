use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Upstream build result code as exported by Bitrise (`BITRISE_BUILD_STATUS`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildOutcome(String);

impl BuildOutcome {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BuildOutcome {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BuildOutcome {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Commit status states accepted by `POST /projects/:id/statuses/:sha`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
}

impl HostStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Running,
        Self::Success,
        Self::Failed,
        Self::Canceled,
        Self::Skipped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostStatus {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                RelayError::Configuration(format!(
                    "'{s}' is not a commit status GitLab accepts \
                     (expected one of pending, running, success, failed, canceled, skipped)"
                ))
            })
    }
}

/// Maps a Bitrise build result onto a GitLab commit status.
///
/// Total over all inputs: anything that is not exactly `"0"` or `"1"` is
/// reported as `pending`, including padded values.
pub fn translate(outcome: &BuildOutcome) -> HostStatus {
    match outcome.as_str() {
        "0" => HostStatus::Success,
        "1" => HostStatus::Failed,
        _ => HostStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_success_and_failure() {
        assert_eq!(translate(&"0".into()), HostStatus::Success);
        assert_eq!(translate(&"1".into()), HostStatus::Failed);
    }

    #[test]
    fn test_translate_defaults_to_pending() {
        for code in [
            "", "2", "-1", "00", "success", "failed", "abc", "01", "1.0", " 0", "0\n", "1 ", " 1 ",
        ] {
            assert_eq!(
                translate(&BuildOutcome::from(code)),
                HostStatus::Pending,
                "outcome {code:?}"
            );
        }
    }

    #[test]
    fn test_parse_accepts_closed_set() {
        for status in HostStatus::ALL {
            assert_eq!(status.as_str().parse::<HostStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_values() {
        for value in ["passed", "SUCCESS", "", "manual", "error"] {
            let err = value.parse::<HostStatus>().unwrap_err();
            assert!(matches!(err, RelayError::Configuration(_)), "{value:?}");
        }
    }
}
