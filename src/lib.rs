//! Strata - Layer cache consistency engine
//!
//! Keeps the layers of a published release mirrored in a local work
//! directory. A network-free check decides whether a rebuild is needed;
//! rebuilds crawl the remote manifest tree, load only what is missing and
//! run at most once per release at a time.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod layer;
pub mod release;
pub mod task;
pub mod transport;
pub mod ui;

pub use error::{StrataError, StrataResult};
