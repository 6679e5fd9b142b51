use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input error: {0}")]
    Input(#[from] iptv_engine::IptvError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Tuning failed: {0}")]
    Tuning(String),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
