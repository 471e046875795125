//! Call Record Sync Library
//!
//! A Rust library for replicating call detail records from a hosted telephony
//! provider's reports API into a relational store. Each run covers one
//! configurable block of history and is safe to repeat: overlapping windows
//! never produce duplicate call legs in the permanent tables.
//!
//! ## Pipeline
//!
//! A run flows through these stages in order:
//!
//! 1. **Window selection**: [`window`] turns the block index argument into an
//!    absolute `[start, end)` UTC pair before anything touches the network
//! 2. **Token acquisition**: [`auth`] exchanges stored credentials for a
//!    short-lived bearer token without interactive consent
//! 3. **Fetch**: [`fetch`] pulls the caller summary, then each caller's call
//!    activity, with pagination, rate limiting, and bounded retry
//! 4. **Normalization**: [`normalize`] maps raw activity objects to fixed
//!    row shapes, preserving absent timestamps as nulls
//! 5. **Load**: [`store`] stages the batch, merges only novel rows into the
//!    permanent tables, and clears staging, all in one transaction
//!
//! ## Key Types
//!
//! - [`pipeline::SyncPipeline`] - Orchestrates a complete run
//! - [`window::TimeWindow`] - The immutable per-run time window
//! - [`store::CallStore`] - The staged, deduplicating loader
//! - [`store::MergeReport`] - Attempted vs. merged counts for a batch
//! - [`config::Config`] - Explicit run configuration, injected into each
//!   component rather than read from ambient global state

pub mod auth;
pub mod config;
pub mod credentials;
pub mod fetch;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod store;
pub mod window;

pub use config::Config;
pub use credentials::Credentials;
pub use pipeline::{RunSummary, SyncPipeline};
pub use window::TimeWindow;
