use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of a failure, used by callers that react differently
/// to bad input and to registry trouble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid local input, detected before any I/O
    Configuration,
    /// The destination reference could not be derived
    Resolution,
    /// A registry fetch or push failed
    Transport,
    /// Content could not be encoded or decoded
    Serialization,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("architecture is required for bundling")]
    MissingArchitecture,

    #[error("failed to read {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse bundle file {path}")]
    BundleParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("bundle name is required for publishing")]
    MissingName,

    #[error("version is required for publishing")]
    MissingVersion,

    #[error("invalid reference `{reference}`: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("registry request for `{reference}` failed")]
    Registry {
        reference: String,
        #[source]
        source: oci_distribution::errors::OciDistributionError,
    },

    #[error("`{reference}` not found")]
    NotFound { reference: String },

    #[error("no manifest for platform {platform} in index at `{reference}`")]
    PlatformNotFound { reference: String, platform: String },

    #[error("digest mismatch for `{reference}`: expected {expected}, got {actual}")]
    DigestMismatch {
        reference: String,
        expected: String,
        actual: String,
    },

    #[error("registry transport error for `{reference}`: {message}")]
    Transport { reference: String, message: String },

    #[error("failed to encode bundle metadata: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to encode or decode json: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingArchitecture
            | Error::FileRead { .. }
            | Error::FileWrite { .. }
            | Error::BundleParse { .. }
            | Error::ConfigParse(_) => ErrorKind::Configuration,
            Error::MissingName | Error::MissingVersion | Error::InvalidReference { .. } => {
                ErrorKind::Resolution
            }
            Error::Registry { .. }
            | Error::NotFound { .. }
            | Error::PlatformNotFound { .. }
            | Error::DigestMismatch { .. }
            | Error::Transport { .. } => ErrorKind::Transport,
            Error::Yaml(_) | Error::Json(_) => ErrorKind::Serialization,
        }
    }
}
