pub mod app;
pub mod config;
pub mod domain;
pub mod ena;
pub mod error;
pub mod http;
pub mod journal;
pub mod ledger;
pub mod ncbi;
pub mod output;
pub mod stages;
pub mod store;
pub mod submissions;
