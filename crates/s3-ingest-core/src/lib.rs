//! # s3-ingest core
//!
//! Runtime-free logic shared by the `s3-ingest` service: the record model,
//! the transform step, the [`store::ObjectStore`] and [`source::RecordSource`]
//! abstractions, the ingestion sequence and the retrieval facade.
//!
//! This crate contains no tokio, reqwest, or other native I/O dependencies.
//! Concrete S3 and HTTP implementations live in the `s3-ingest` crate.

pub mod error;
pub mod ingest;
pub mod models;
pub mod retrieve;
pub mod source;
pub mod store;
pub mod transform;

pub use error::{Error, Result};
