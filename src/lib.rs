pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod policy;
pub mod profile;
pub mod results;
pub mod runner;
pub mod session;
