use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("unknown OS {0}")]
    UnknownOs(String),

    #[error("license key not found")]
    LicenseNotFound,

    #[error("failed to read license store: {0}")]
    LicenseStore(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid version {0:?}")]
    InvalidVersion(String),

    /// The update-check body did not have the expected shape.
    #[error("malformed update response: {0}")]
    MalformedResponse(String),

    #[error("no {0} build available for this update")]
    NoBuildForPlatform(String),

    /// The download response did not name the artifact.
    #[error("missing or malformed Content-Disposition header: {0}")]
    ContentDisposition(String),

    #[error("failed to run {program}: {reason}")]
    Spawn {
        program: String,
        reason: String,
    },

    #[error("{0} produced no output")]
    NoOutput(String),

    #[error("{program} failed with return code: {code}")]
    ExitCode {
        program: String,
        code: i32,
    },

    /// A child process was killed before it could report a status.
    #[error("{0} was terminated by a signal")]
    Terminated(String),

    #[error("unexpected hdiutil output: {0:?}")]
    MountOutput(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for UpdateError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for UpdateError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

impl From<ureq::Error> for UpdateError {
    fn from(err: ureq::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<regex::Error> for UpdateError {
    fn from(err: regex::Error) -> Self {
        Self::MountOutput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UpdateError>;
