use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to spawn acquisition process `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("acquisition process exposes no stdout pipe")]
    NoStdout,
    #[error("read from line source failed: {0}")]
    Read(#[from] std::io::Error),
}

/// Non-fatal reasons a protocol line is rejected by the parser.
///
/// Rejections never abort the stream; the session counts them and moves on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("empty line")]
    Empty,
    #[error("unknown tag `{0}`")]
    UnknownTag(String),
    #[error("{tag}: expected {expected} fields, got {got}")]
    FieldCount {
        tag: &'static str,
        expected: &'static str,
        got: usize,
    },
    #[error("{field}: cannot parse `{value}` as a number")]
    Numeric {
        field: &'static str,
        value: String,
    },
}
