use thiserror::Error;

#[derive(Debug, Error)]
pub enum RlncError {
    /// Invalid construction parameters. Fatal to the instance being built.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A payload that cannot be parsed. The caller drops it; decoder state is untouched.
    #[error("framing error: {0}")]
    Framing(String),
    #[error("division by zero in finite field")]
    DivideByZero,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl RlncError {
    /// Returns true when the error invalidates the instance rather than a single payload.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RlncError::Framing(_))
    }
}

pub type Result<T> = std::result::Result<T, RlncError>;
