pub mod config;
pub mod error;
pub mod fetch;
pub mod history;
pub mod month;
pub mod pipeline;
pub mod process;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Config;
pub use error::{Error, Result};
pub use month::MonthKey;
pub use pipeline::{Pipeline, RunSummary};
