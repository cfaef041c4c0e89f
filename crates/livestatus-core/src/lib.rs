//! livestatus - query engine for the live state and history of a
//! monitoring core.
//!
//! Clients send line-based requests over a UNIX or TCP socket:
//!
//! ```text
//!   GET services
//!   Columns: host_name description state
//!   Filter: state > 0
//!   OutputFormat: json
//!
//! ```
//!
//! and get rows of the requested table back. Used by:
//! - `livestatusd` - the standalone daemon serving an object file
//! - tests, through [`core::InMemoryCore`] and [`io::MemoryChannel`]

pub mod auth;
pub mod column;
pub mod config;
pub mod core;
pub mod counters;
pub mod error;
pub mod filter;
pub mod io;
pub mod logs;
pub mod query;
pub mod queue;
pub mod render;
pub mod server;
pub mod stats;
pub mod store;
pub mod tables;
pub mod timeperiods_cache;
pub mod triggers;
pub mod util;
