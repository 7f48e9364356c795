//! # Transfer sources
//!
//! A transfer source is the engine's view of one external ledger: a blockchain explorer API for a given chain, or an
//! exchange's deposit history. Sources only observe; they never move funds. Concrete adapters live outside the
//! engine and are plugged in through the [`SourceRegistry`], keyed by [`crate::db_types::Chain`].
mod registry;
mod transfer_source;

pub use registry::SourceRegistry;
#[cfg(test)]
pub use transfer_source::MockTransferSource;
pub use transfer_source::{SourceError, TransferSource};
