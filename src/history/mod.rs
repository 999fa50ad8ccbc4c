// src/history/mod.rs
//! The cumulative practice → supplier record, one column per month.

pub mod store;
pub mod table;

pub use store::HistoryStore;
pub use table::{HistoryTable, MergeStats, KEY_COLUMN};
