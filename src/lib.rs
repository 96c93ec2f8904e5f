pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod service;

pub use error::LedgerError;
pub use service::TenderLedger;
