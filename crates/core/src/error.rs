use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVariable(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
