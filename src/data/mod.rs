//! Streaming ingest stages: line source, record transcoder, and the two record consumers.
pub mod binary;
pub mod line_source;
pub mod stats;
pub mod transcoder;
