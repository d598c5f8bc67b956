use std::fmt;
use thiserror::Error;

/// Whether retrying the same request could succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    /// Network, timeout or overloaded service.
    Transient,
    /// Malformed input, missing model files, schema mismatch.
    Permanent,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Transient => f.write_str("transient"),
            Cause::Permanent => f.write_str("permanent"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("embedding failed ({cause}): {message}")]
    Embedding { cause: Cause, message: String },

    #[error("retrieval failed ({cause}): {message}")]
    Retrieval { cause: Cause, message: String },

    #[error("rerank failed ({cause}): {message}")]
    Rerank { cause: Cause, message: String },

    #[error("generation failed ({cause}): {message}")]
    Generation { cause: Cause, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn embedding(cause: Cause, message: impl fmt::Display) -> Self {
        Error::Embedding { cause, message: message.to_string() }
    }

    pub fn retrieval(cause: Cause, message: impl fmt::Display) -> Self {
        Error::Retrieval { cause, message: message.to_string() }
    }

    pub fn rerank(cause: Cause, message: impl fmt::Display) -> Self {
        Error::Rerank { cause, message: message.to_string() }
    }

    pub fn generation(cause: Cause, message: impl fmt::Display) -> Self {
        Error::Generation { cause, message: message.to_string() }
    }

    pub fn cause(&self) -> Cause {
        match self {
            Error::Embedding { cause, .. }
            | Error::Retrieval { cause, .. }
            | Error::Rerank { cause, .. }
            | Error::Generation { cause, .. } => *cause,
            Error::InvalidConfig(_) | Error::InvalidData(_) => Cause::Permanent,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted => Cause::Transient,
                _ => Cause::Permanent,
            },
        }
    }

    pub fn is_transient(&self) -> bool {
        self.cause() == Cause::Transient
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cause_is_reported_per_variant() {
        assert!(Error::generation(Cause::Transient, "connection refused").is_transient());
        assert!(!Error::embedding(Cause::Permanent, "bad tokenizer").is_transient());
        assert!(!Error::InvalidConfig("k".into()).is_transient());
        assert!(!Error::InvalidData("articles.json".into()).is_transient());
    }

    #[test]
    fn display_names_stage_and_cause() {
        let e = Error::retrieval(Cause::Transient, "connection refused");
        assert_eq!(e.to_string(), "retrieval failed (transient): connection refused");
    }
}
