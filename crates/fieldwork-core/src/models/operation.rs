//! Remote operation kinds carried by queue items

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The server mutation a queued item performs when it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// GPS ping for an active work session
    UpdateLocation,
    /// Begin a tracked work session
    StartSession,
    /// Finish a tracked work session
    EndSession,
    /// Upload a photo taken in the field
    UploadPhoto,
    /// Update fields of an existing session
    UpdateSession,
}

impl OperationType {
    /// Every known operation type, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::UpdateLocation,
        Self::StartSession,
        Self::EndSession,
        Self::UploadPhoto,
        Self::UpdateSession,
    ];

    /// Stable snake_case name, identical to the persisted form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpdateLocation => "update_location",
            Self::StartSession => "start_session",
            Self::EndSession => "end_session",
            Self::UploadPhoto => "upload_photo",
            Self::UpdateSession => "update_session",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = Error;

    /// Accepts snake_case, kebab-case and SCREAMING_SNAKE_CASE names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                let valid = Self::ALL
                    .iter()
                    .map(|kind| kind.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                Error::InvalidInput(format!(
                    "unknown operation type '{}' (expected one of: {valid})",
                    s.trim()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_common_spellings() {
        assert_eq!(
            "update_location".parse::<OperationType>().unwrap(),
            OperationType::UpdateLocation
        );
        assert_eq!(
            "end-session".parse::<OperationType>().unwrap(),
            OperationType::EndSession
        );
        assert_eq!(
            " UPLOAD_PHOTO ".parse::<OperationType>().unwrap(),
            OperationType::UploadPhoto
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let error = "teleport".parse::<OperationType>().unwrap_err();
        assert!(error.to_string().contains("teleport"));
        assert!(error.to_string().contains("update_session"));
    }

    #[test]
    fn test_serde_name_matches_as_str() {
        for kind in OperationType::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
