use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("Invalid lyrics: {0}")]
    InvalidLyrics(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
