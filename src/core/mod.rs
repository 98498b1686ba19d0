//! Core modules for store seeding and reconciliation.
//!
//! Leaves first: `store`, `record`, `seed`, `identity`, `lifecycle`, `task`;
//! then the provider seam and its SQLite implementation; then `context`,
//! `dedup` and finally `engine`.

pub mod config;
pub mod context;
pub mod db;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod migration;
pub mod pool;
pub mod provider;
pub mod record;
pub mod schemas;
pub mod seed;
pub mod sqlite;
pub mod store;
pub mod task;
pub mod time;
