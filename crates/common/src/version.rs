use serde::{Deserialize, Serialize};

/// Build metadata captured by `build.rs` at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: String,
    pub repo_version: String,
    pub build_profile: String,
    pub build_timestamp: String,
    pub build_target: String,
    pub rust_version: String,
}

impl BuildInfo {
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            repo_version: env!("REPO_VERSION").to_string(),
            build_profile: env!("BUILD_PROFILE").to_string(),
            build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
            build_target: env!("BUILD_TARGET").to_string(),
            rust_version: env!("RUST_VERSION").to_string(),
        }
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "bucketvol {} ({}, {} build for {}, built {} with {})",
            self.version,
            self.repo_version,
            self.build_profile,
            self.build_target,
            self.build_timestamp,
            self.rust_version
        )
    }
}

pub fn build_info() -> BuildInfo {
    BuildInfo::new()
}
