pub mod config;
pub mod logging;

pub mod channel;
pub mod connection;
pub mod error;
pub mod forwarder;
pub mod queue;
pub mod recognition;

pub use error::CoreError;
