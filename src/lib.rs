//! Gitrelay library
//!
//! Receives Git platform webhooks, turns them into chat messages and fans
//! them out to the configured destinations. Exposed as a library for tests.

pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod ingest;
pub mod models;
pub mod routes;
pub mod services;
