//! service-core: Shared infrastructure for the occasion site workspace.
pub mod config;
pub mod error;
pub mod observability;
