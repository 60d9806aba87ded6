//! RFM customer segmentation.
//!
//! Order-history snapshots go in; per-customer recency, frequency and
//! monetary scores, a behavioral segment, and campaign target lists
//! come out. See `pipeline` for the stage order.

pub mod campaign;
pub mod config;
pub mod customer;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod rng;
pub mod scoring;
pub mod segment;
pub mod sink;
pub mod synth;
pub mod types;

pub use config::RfmConfig;
pub use error::{RfmError, RfmResult};
pub use pipeline::{SegmentationPipeline, SegmentationRun};
