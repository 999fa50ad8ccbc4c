// src/process/mod.rs
//! Raw practice-level tables → one main supplier per practice.

pub mod aggregate;
pub mod records;
pub mod utils;

pub use aggregate::{main_supplier, AggregateStats, MonthAssignments, SupplierAggregator};
pub use records::{parse_table, ParsedTable, PracticeRecord};
pub use utils::SupplierNormalizer;
