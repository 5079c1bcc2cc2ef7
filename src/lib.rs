//! DynamoDB migration runner library.
//!
//! This library provides the core functionality for the migration runner,
//! including the store seam, version tracking, plan sequencing and revision
//! scaffolding.

pub mod config;
pub mod db;
pub mod error;
pub mod migration;
pub mod models;
pub mod services;
