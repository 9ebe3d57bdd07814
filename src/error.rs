use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("dataset error: {0}")]
    Dataset(String),
    #[error("training failed: {0}")]
    Training(String),
    #[error("table does not exist")]
    TableNotExist,
    #[error("malformed index stream: {0}")]
    Format(String),
    #[error("operation not allowed: {0}")]
    State(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
