use thiserror::Error;

#[derive(Debug, Error)]
pub enum UxMirrorError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already exists: {0}")]
    DuplicateSession(String),

    #[error("Invalid iteration data: {0}")]
    InvalidIterationData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl serde::Serialize for UxMirrorError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type UxMirrorResult<T> = Result<T, UxMirrorError>;
