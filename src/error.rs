use thiserror::Error;

pub type RoostResult<T, E = RoostError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum RoostError {
    #[error("Bad index info: {0}")]
    BadIndexInfo(String),

    #[error("Scan operators must be GT/GTE for the low bound and LT/LTE for the high bound")]
    BadOpcodes,

    #[error("Scan range low bound is greater than high bound")]
    BadScanRange,

    #[error("No key in the index satisfies the scan predicate")]
    NoSuchKeyFound,

    #[error("No scan has been initialized")]
    ScanNotInitialized,

    #[error("Index scan completed")]
    IndexScanCompleted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
