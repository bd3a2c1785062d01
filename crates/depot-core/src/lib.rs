pub mod config;
pub mod error;
pub mod fleet;
pub mod io;
pub mod ledger;
pub mod notify;
pub mod paths;
pub mod policy;
pub mod report;
pub mod scanner;
pub mod stock;
pub mod store;

pub use error::{DepotError, Result};
