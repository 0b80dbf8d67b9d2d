pub mod cli;
pub mod config;
pub mod controller;
pub mod fetch;
pub mod finalize;
pub mod host;
pub mod metrics;
pub mod notify;
pub mod processor;
pub mod report;
pub mod scheduler;
pub mod secrets;
pub mod sheet;
pub mod state;
pub mod store;
pub mod util;
