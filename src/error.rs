use super::types::RequestStatus;

/// A single request line that could not be covered by current stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortage {
    pub material_id: String,
    pub requested: u64,
    pub available: u64,
}

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("Request {0} does not exist")]
    NotFound(String),
    #[error("Material {0} is not in the inventory")]
    MaterialNotFound(String),
    #[error("Insufficient stock to fulfil request {request_id}: {} line(s) short", .shortages.len())]
    InsufficientStock {
        request_id: String,
        shortages: Vec<Shortage>,
    },
    #[error("Quantity must be greater than zero")]
    InvalidQuantity,
    #[error("Request cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Remote(#[from] SyncError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("sled failure: {0}")]
    Sled(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),
    #[error("failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("corrupt record at key {0}")]
    Corrupt(String),
}

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("Remote mirroring is not configured")]
    Disabled,
    #[error("Remote request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Remote answered with status {0}")]
    Status(u16),
    #[error("Remote payload could not be read: {0}")]
    Decode(String),
    #[error("Sync worker exited without reporting")]
    Dropped,
}
