pub mod config;
pub mod connection;
pub mod error;
pub mod line;
pub mod listener;
pub mod logging;
pub mod traits;

pub use tracing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Stop accepting connections and wind down open sessions
    Shutdown,
}
