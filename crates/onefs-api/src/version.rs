// Platform API version discovery.

use std::fmt;

use serde::Deserialize;

use crate::error::Error;

/// Path of the version-discovery endpoint.
pub const LATEST_PATH: &str = "/platform/latest";

/// Oldest supported major version.
pub const MIN_MAJOR_VERSION: u8 = 3;

/// Major version assumed when the cluster does not report one.
const DEFAULT_MAJOR_VERSION: u8 = 2;

/// The cluster's latest platform API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u8,
    pub minor: u8,
}

impl ApiVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Parse `"<major>.<minor>"`; a missing minor component means 0.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidVersion { raw: raw.to_owned() };
        let mut parts = raw.trim().splitn(2, '.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let minor = match parts.next() {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None => 0,
        };
        Ok(Self { major, minor })
    }

    /// Reject versions below [`MIN_MAJOR_VERSION`].
    pub fn ensure_supported(self) -> Result<Self, Error> {
        if self.major < MIN_MAJOR_VERSION {
            return Err(Error::UnsupportedVersion {
                version: self,
                minimum: MIN_MAJOR_VERSION,
            });
        }
        Ok(self)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Body of `GET /platform/latest`.
#[derive(Debug, Default, Deserialize)]
pub struct LatestResponse {
    pub latest: Option<String>,
}

impl LatestResponse {
    /// Resolve the reported version, defaulting to an unsupported major
    /// version when none is reported, and check it is supported.
    pub fn into_version(self) -> Result<ApiVersion, Error> {
        let version = match self.latest.as_deref() {
            Some(raw) if !raw.trim().is_empty() => ApiVersion::parse(raw)?,
            _ => ApiVersion::new(DEFAULT_MAJOR_VERSION, 0),
        };
        version.ensure_supported()
    }
}
