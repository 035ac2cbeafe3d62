use thiserror::Error;

/// Errors raised while decoding addresses and ranges
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid cell address: {0}")]
    InvalidAddress(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("range too large: {cells} cells (max {max})")]
    RangeTooLarge { cells: u64, max: u64 },
}

pub type Result<T> = std::result::Result<T, AddressError>;
