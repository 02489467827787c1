use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
#[error("Clock error: {0}")]
pub struct ClockError(pub String);

#[derive(Debug, Error)]
#[error("Subscription lookup failed: {0}")]
pub struct SubscriptionError(pub String);

#[derive(Debug, Error)]
pub enum LimitError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}
