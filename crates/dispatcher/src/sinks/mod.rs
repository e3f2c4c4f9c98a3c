//! Sink implementations
//!
//! Contains LogSink, FileSink, and NetworkSink.

mod annotate;
mod file;
mod log;
mod network;

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use contracts::ContractError;

pub use self::annotate::annotate_frame;
pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
pub use self::network::{NetworkFormat, NetworkSink, NetworkSinkConfig};

/// Parse the sink parameter `key`, `None` when absent
pub(crate) fn param<T>(params: &HashMap<String, String>, key: &str) -> Result<Option<T>, ContractError>
where
    T: FromStr,
    T::Err: Display,
{
    params
        .get(key)
        .map(|raw| {
            raw.parse().map_err(|e| {
                ContractError::config_validation(
                    format!("params.{key}"),
                    format!("'{raw}' is not a valid {key}: {e}"),
                )
            })
        })
        .transpose()
}
