use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("execution error: {0}")]
    Exec(String),
}
