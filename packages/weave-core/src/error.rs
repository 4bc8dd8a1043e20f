use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Hard failures. Ordinary insertion outcomes (duplicates, missing causes, ...) are
/// reported through [`crate::AddResult`] instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed atom: {0}")]
    MalformedAtom(String),
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
