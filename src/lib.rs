//! Self-hosted server for notes published from the Share Note plugin.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
