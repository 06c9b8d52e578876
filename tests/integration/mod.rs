//! Integration tests for perspective-aware content resolution

mod cache_behavior;
mod cli_binary;
mod config_integration;
mod store_failures;
