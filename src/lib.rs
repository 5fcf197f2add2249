//! Per-user monthly budget snapshots: Ready-To-Assign and per-category
//! assigned/activity/available, cached per period and rebuilt lazily after
//! forward invalidation.

pub mod config;
pub mod db;
pub mod engine;
pub mod export;
pub mod models;
pub mod run;
pub mod service;
