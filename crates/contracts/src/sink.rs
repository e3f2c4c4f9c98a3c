//! ResultSink trait - Dispatcher output interface
//!
//! Durable storage / UI consumers of published snapshots. Delivery is
//! fire-and-forget from the pipeline's perspective.

use crate::{AnalysisSnapshot, ContractError};

/// Snapshot output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(ResultSink: Send)]
pub trait LocalResultSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one published snapshot
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, snapshot: &AnalysisSnapshot) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
