//! soil-hub: ingest soil sensor readings, keep the latest in memory and a
//! short history in the realtime database, and serve an operator dashboard.

pub mod app;
pub mod config;
pub mod domain;
pub mod firebase;
pub mod history;
pub mod ingest;
pub mod logging;
pub mod pages;
pub mod session;
