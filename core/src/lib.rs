/// Birdfeed - remote timeline ingestion for chat clients
///
/// Turns XML listing responses from a microblogging API into typed records,
/// follows their pagination cursors, tracks a per-session timeline watermark
/// and delivers statuses into a chat host as group or private messages.

pub mod error;
pub mod config;
pub mod xml;
pub mod materialize;
pub mod pagination;
pub mod watermark;
pub mod roster;
pub mod format;
pub mod delivery;
pub mod session;
pub mod host;
pub mod transport;
pub mod client;
pub mod console;

pub use client::TwitterSession;
pub use config::AccountConfig;
pub use error::{BirdfeedError, Result};
