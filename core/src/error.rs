use crate::types::{CustomerId, Dimension};
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RfmError {
    #[error("Customer '{customer_id}' has no resolvable activity: {reason}")]
    MissingActivity { customer_id: CustomerId, reason: String },

    #[error("Reference date {reference} precedes last order {last_order} of customer '{customer_id}'")]
    InvalidReference {
        customer_id: CustomerId,
        reference:   NaiveDate,
        last_order:  NaiveDate,
    },

    #[error("Order count of customer '{customer_id}' overflows when merging duplicate records")]
    CountOverflow { customer_id: CustomerId },

    #[error("Cannot bin {dimension} into quintiles: {reason}")]
    BinningError { dimension: Dimension, reason: String },

    #[error("Score pair ({recency}, {monetary}) has no segment")]
    UnmappedScore { recency: u8, monetary: u8 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RfmResult<T> = Result<T, RfmError>;
