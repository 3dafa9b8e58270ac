use std::path::PathBuf;

// ── Bootstrap ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("no session identifier provided")]
    Configuration,
    #[error("malformed session identifier")]
    Format,
    #[error("remote fetch failed: {0}")]
    RemoteFetch(#[from] FetchError),
    #[error("credential write failed: {0}")]
    Filesystem(#[from] StoreError),
}

// ── Remote store ────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid decryption key: {0}")]
    InvalidKey(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("storage api error code {code} ({})", describe_api_code(.code))]
    Api { code: i64 },
    #[error("unexpected storage response: {0}")]
    UnexpectedResponse(String),
    #[error("download status {0}")]
    Status(u16),
    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("mac verification failed")]
    MacMismatch,
}

fn describe_api_code(code: &i64) -> &'static str {
    match *code {
        -1 => "internal error",
        -2 => "bad arguments",
        -3 => "try again",
        -4 => "rate limited",
        -9 => "not found",
        -11 => "access denied",
        -16 => "blocked",
        -17 => "over quota",
        -18 => "temporarily unavailable",
        _ => "unknown",
    }
}

// ── Credential store ────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
