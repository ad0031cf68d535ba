//! Service build and instance information

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identifies the deployed build of the service
///
/// Commit details are baked in at compile time from the `GIT_COMMIT_HASH`,
/// `GIT_COMMIT_DATE` and `BUILD_DATE` environment variables when the build
/// provides them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceVersion {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_date: Option<String>,
}

impl ServiceVersion {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit_hash: option_env!("GIT_COMMIT_HASH").map(str::to_string),
            commit_date: option_env!("GIT_COMMIT_DATE").map(str::to_string),
            build_date: option_env!("BUILD_DATE").map(str::to_string),
        }
    }

    /// First 7 characters of the commit hash, or "unknown"
    pub fn short_hash(&self) -> &str {
        match &self.commit_hash {
            Some(hash) if hash.len() >= 7 => &hash[..7],
            Some(hash) => hash,
            None => "unknown",
        }
    }
}

/// A running instance of the service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInstance {
    pub name: String,
    pub version: ServiceVersion,
    pub pid: u32,
    pub startup_time: DateTime<Utc>,
}

impl ServiceInstance {
    pub fn new(name: impl Into<String>, startup_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            version: ServiceVersion::current(),
            pid: std::process::id(),
            startup_time,
        }
    }
}
