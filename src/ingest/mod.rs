//! Live ingestion of the monitored account's stream.

pub mod consumer;

pub use consumer::{echo_line, ConsumeOutcome, ConsumeReport, StreamConsumer};
