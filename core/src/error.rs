use thiserror::Error;

/// Failure taxonomy for the index/query core.
///
/// Only `ManifestLoad` (before any write) and `IndexUnavailable` (surfaced as
/// an empty result set) reach callers; the remaining classes are recovered
/// in place and logged.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to load manifest: {0}")]
    ManifestLoad(String),

    #[error("index unavailable at {path}: {reason}")]
    IndexUnavailable { path: String, reason: String },

    #[error("missing blob {path} for {url}")]
    MissingBlob { url: String, path: String },

    #[error("extraction failed for {url}: {reason}")]
    Extract { url: String, reason: String },

    #[error("stoplist unavailable at {0}")]
    StoplistUnavailable(String),

    #[error("profile build failed for {user}: {reason}")]
    ProfileBuild { user: String, reason: String },
}
