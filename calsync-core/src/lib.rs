//! Core of the calsync remote calendar merge pipeline.
//!
//! This crate provides everything between a remote change stream and the local store:
//! - `remote` and `stream` for the notifications a calendar parser announces
//! - `format` and `ids` for turning them into local records with stable ids
//! - `pull` for sessions that queue those records and commit them atomically
//! - `store` and `registry` for persisted records and account lifecycles

pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod ics;
pub mod ids;
pub mod pull;
pub mod records;
pub mod registry;
pub mod remote;
pub mod store;
pub mod stream;
pub mod time;

pub use error::{CalSyncError, CalSyncResult};
pub use pull::{CommitOutcome, PullSession};
pub use store::Store;
