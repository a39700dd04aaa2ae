//! Ledger-state sync for prediction markets: decodes market accounts straight
//! from the ledger, caches live snapshots, and reconciles settlement and
//! drift into a secondary store.

pub mod cache;
pub mod classify;
pub mod codec;
pub mod config;
pub mod drift;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod ledger;
pub mod participants;
pub mod reconcile;
pub mod stats;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::SyncEngine;
pub use error::{Result, SyncError};
