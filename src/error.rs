use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection timeout")]
    Timeout,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Malformed instrument reply: {0:?}")]
    Malformed(String),
    #[error(
        "Gave up on current reading at bias {voltage} V after {attempts} attempts, last reply {raw:?}"
    )]
    RetryExhausted {
        voltage: f64,
        attempts: u32,
        raw: String,
    },
    #[error("VNA error: {0}")]
    Vna(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
}
