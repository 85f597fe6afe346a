#![allow(clippy::result_large_err)]

pub mod deleter;
pub mod fingerprint;
pub mod indexer;
pub mod ledger;
pub mod store;

pub use deleter::delete_by_filter;
pub use indexer::{clear_dataset, index_dataset, IndexCounters, IndexOptions, ReconcileOutcome};
pub use ledger::{LedgerEntry, RecordLedger};
pub use store::{SurrealVectorStore, VectorStore};

#[cfg(test)]
mod tests;
