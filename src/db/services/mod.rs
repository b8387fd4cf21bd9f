//! The `services` module provides a high-level API for interacting with the
//! database. It encapsulates the query logic so the engines work with domain
//! models without knowing about the underlying schema.
//!
//! One sub-module per entity.

pub mod alert_service;
pub mod backup_service;
pub mod check_service;
pub mod scan_service;
pub mod user_service;
pub mod website_service;
