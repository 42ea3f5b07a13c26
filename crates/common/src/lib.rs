//! Error-context helpers and small utilities shared by the shelfsync crates.

pub mod error;
pub mod time;

pub use error::FromMessage;
