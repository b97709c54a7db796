//! Build metadata embedded by the build script.

use serde::Serialize;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

const GIT_BRANCH: &str = match option_env!("VERGEN_GIT_BRANCH") {
    Some(branch) => branch,
    None => "unknown",
};

const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

const BUILD_TIMESTAMP: Option<&str> = option_env!("VERGEN_BUILD_TIMESTAMP");

/// What `byokd` reports about itself.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub branch: &'static str,
    pub sha: &'static str,
    pub dirty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_at: Option<&'static str>,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: PKG_VERSION,
            branch: GIT_BRANCH,
            sha: GIT_SHA,
            dirty: option_env!("VERGEN_GIT_DIRTY") == Some("true"),
            built_at: BUILD_TIMESTAMP,
        }
    }

    /// Abbreviated commit.
    pub fn short_sha(&self) -> &'static str {
        &self.sha[..7.min(self.sha.len())]
    }
}

/// `{version}+{branch}.{sha}`, with a `.dirty` suffix for modified trees.
pub fn version_string() -> String {
    let info = BuildInfo::current();
    let dirty_suffix = if info.dirty { ".dirty" } else { "" };
    format!(
        "{}+{}.{}{dirty_suffix}",
        info.version,
        info.branch,
        info.short_sha()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_pkg_version() {
        assert!(version_string().starts_with(PKG_VERSION));
    }

    #[test]
    fn short_sha_is_bounded() {
        let info = BuildInfo {
            sha: "0123456789abcdef",
            ..BuildInfo::current()
        };
        assert_eq!(info.short_sha(), "0123456");
        let info = BuildInfo {
            sha: "abc",
            ..BuildInfo::current()
        };
        assert_eq!(info.short_sha(), "abc");
    }
}
