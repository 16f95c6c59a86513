use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Io,
    Network,
    /// Backend answered with a non-success HTTP status.
    Status(u16),
    Validation,
    Decode,
    Other,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
}

impl Error {
    pub fn msg<M: Into<String>>(msg: M) -> Self {
        Self {
            kind: ErrorKind::Other,
            msg: msg.into(),
        }
    }

    pub fn with_kind<M: Into<String>>(kind: ErrorKind, msg: M) -> Self {
        Self {
            kind,
            msg: msg.into(),
        }
    }

    pub fn config<M: Into<String>>(msg: M) -> Self {
        Self::with_kind(ErrorKind::Config, msg)
    }

    pub fn network<M: Into<String>>(msg: M) -> Self {
        Self::with_kind(ErrorKind::Network, msg)
    }

    pub fn validation<M: Into<String>>(msg: M) -> Self {
        Self::with_kind(ErrorKind::Validation, msg)
    }

    pub fn status<M: Into<String>>(code: u16, msg: M) -> Self {
        Self::with_kind(ErrorKind::Status(code), msg)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Transport failures and 5xx answers are worth offering a retry for.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ErrorKind::Network => true,
            ErrorKind::Status(code) => code >= 500 || code == 429,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::with_kind(ErrorKind::Io, err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::with_kind(ErrorKind::Decode, err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::status(status.as_u16(), err.to_string()),
            None if err.is_decode() => Self::with_kind(ErrorKind::Decode, err.to_string()),
            None => Self::network(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        assert!(Error::status(503, "unavailable").is_retryable());
        assert!(Error::status(429, "slow down").is_retryable());
        assert!(!Error::status(403, "forbidden").is_retryable());
        assert!(Error::network("connection refused").is_retryable());
        assert!(!Error::validation("no status").is_retryable());
    }

    #[test]
    fn io_errors_keep_their_kind() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.to_string(), "gone");
    }
}
