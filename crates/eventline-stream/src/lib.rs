//! eventline-stream: the streaming half of the Eventline TDT pipeline
//!
//! This crate provides:
//! - The FIFO queue shared by the reader and a consumer
//! - A simulated file reader that replays a corpus in real time
//! - The ELD and volume-based streaming consumers
//! - Document scoring and the summariser seam used when nodes close
//!
//! A pipeline run wires a [`SimulatedFileReader`] and one consumer to the
//! same [`PostQueue`] and runs both as tokio tasks; the consumer returns
//! the finished [`eventline_tdt::Timeline`].

pub mod consumer;
pub mod queue;
pub mod reader;
pub mod scoring;
pub mod summary;

pub use consumer::{
    ConsumerError, ConsumerResult, EldConsumer, EldConsumerConfig, ZhaoConsumer,
    ZhaoConsumerConfig,
};
pub use queue::PostQueue;
pub use reader::{ReaderConfig, ReaderError, ReaderResult, SimulatedFileReader};
pub use summary::{LeadSummarizer, Summarizer};
