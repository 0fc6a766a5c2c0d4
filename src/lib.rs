//! # s3-ingest
//!
//! Pulls a batch of JSON records from an upstream API, stamps each record
//! with `ingested_at` and `source`, stores the batch as a new artifact in
//! S3 and points `logs/latest_ingestion.json` at it. A small JSON HTTP API
//! reads, lists and deletes what has been stored.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────────────────┐
//! │  Upstream  │──▶│  Transform   │──▶│  S3                      │
//! │  JSON API  │   │ +ingested_at │   │  logs/data_<uuid>.json   │
//! └────────────┘   │ +source      │   │  logs/latest_ingestion…  │
//!                  └──────────────┘   └────────────┬─────────────┘
//!                                                  │
//!                              ┌───────────────────┤
//!                              ▼                   ▼
//!                        ┌──────────┐        ┌──────────┐
//!                        │   CLI    │        │   HTTP   │
//!                        └──────────┘        └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`s3`] | Signed S3 REST client |
//! | [`source`] | HTTP upstream source |
//! | [`bootstrap`] | One-time bucket check and creation |
//! | [`server`] | JSON HTTP API |
//!
//! The record model, transform, ingestion sequence and retrieval facade
//! live in the `s3-ingest-core` crate.

pub mod bootstrap;
pub mod config;
pub mod s3;
pub mod server;
pub mod source;
