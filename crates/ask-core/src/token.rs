//! Session identifiers handed out by the pairing site.
//!
//! A token looks like `ASK-XMD~;;;<fileId>#<key>`. Anything in front of the
//! marker is ignored, and the payload ends at the next marker if one follows.
//! The payload must split on exactly one `#` into two non-empty halves.

use crate::error::BootstrapError;

pub const SESSION_MARKER: &str = "ASK-XMD~;;;";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub file_id: String,
    pub key: String,
}

impl SessionToken {
    /// Parse a raw configuration value. Absent or blank input is a
    /// configuration problem, anything else that does not match is a format
    /// problem.
    pub fn parse(raw: Option<&str>) -> Result<Self, BootstrapError> {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(BootstrapError::Configuration);
        }
        let payload = raw
            .split(SESSION_MARKER)
            .nth(1)
            .ok_or(BootstrapError::Format)?;
        let (file_id, key) = payload.split_once('#').ok_or(BootstrapError::Format)?;
        if file_id.is_empty() || key.is_empty() || key.contains('#') {
            return Err(BootstrapError::Format);
        }
        Ok(Self {
            file_id: file_id.to_string(),
            key: key.to_string(),
        })
    }
}

impl std::str::FromStr for SessionToken {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(Some(s))
    }
}
